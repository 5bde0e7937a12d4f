use std::collections::HashMap;

/// Share of pages on which a first (or last) line must recur to count as a
/// running header (or footer).
pub const REPEATED_LINE_THRESHOLD: f64 = 0.6;
/// Below this many non-empty pages no line is treated as repeated. A single
/// page has nothing to repeat against.
pub const MIN_PAGES_FOR_MARGINS: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepeatedMargins {
    pub header: Option<String>,
    pub footer: Option<String>,
}

impl RepeatedMargins {
    pub fn is_empty(&self) -> bool {
        self.header.is_none() && self.footer.is_none()
    }
}

pub fn detect_repeated_margins<S: AsRef<str>>(pages: &[S]) -> RepeatedMargins {
    let mut firsts = Vec::new();
    let mut lasts = Vec::new();

    for page in pages {
        let mut lines = page
            .as_ref()
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty());
        if let Some(first) = lines.next() {
            firsts.push(first);
            lasts.push(lines.last().unwrap_or(first));
        }
    }

    if firsts.len() < MIN_PAGES_FOR_MARGINS {
        return RepeatedMargins::default();
    }

    RepeatedMargins {
        header: majority_line(&firsts),
        footer: majority_line(&lasts),
    }
}

/// Most frequent line (earliest wins ties) if it clears the threshold.
fn majority_line(lines: &[&str]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for line in lines {
        *counts.entry(*line).or_default() += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for line in lines {
        let count = counts[line];
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((*line, count));
        }
    }

    best.filter(|(_, count)| *count as f64 / lines.len() as f64 >= REPEATED_LINE_THRESHOLD)
        .map(|(line, _)| line.to_string())
}

/// Drops every line equal (after trimming) to the detected header or footer.
pub fn strip_repeated_margins(text: &str, margins: &RepeatedMargins) -> String {
    if margins.is_empty() {
        return text.to_string();
    }

    text.lines()
        .filter(|line| {
            let trimmed = line.trim();
            margins.header.as_deref() != Some(trimmed)
                && margins.footer.as_deref() != Some(trimmed)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
