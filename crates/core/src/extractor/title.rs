//! Best-effort paper title detection.
//!
//! Each strategy sees the first page as text lines plus positioned words and
//! either proposes a title or passes. [`TITLE_STRATEGIES`] is tried in order.

use super::layout::{group_lines, LayoutWord};
use crate::chunking::normalize_whitespace;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::debug;

pub type TitleStrategy = fn(&[String], &[LayoutWord]) -> Option<String>;

pub const TITLE_STRATEGIES: [(&str, TitleStrategy); 3] = [
    ("pre_abstract", pre_abstract_title),
    ("font_size", font_size_title),
    ("first_lines", first_plausible_line),
];

const MIN_AUTHOR_BLOCK_LINE: usize = 8;
const FONT_TIERS: usize = 4;
const TITLE_LINE_Y_TOLERANCE: f32 = 3.0;
const FALLBACK_LINE_WINDOW: usize = 10;
const MIN_TITLE_CHARS: usize = 5;
const MAX_TITLE_CHARS: usize = 250;

const INSTITUTION_KEYWORDS: [&str; 12] = [
    "university",
    "department",
    "dept.",
    "institute",
    "school of",
    "college",
    "laboratory",
    "faculty",
    "centre for",
    "center for",
    "corporation",
    "inc.",
];

fn boilerplate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(page\s*)?\d+(\s*(of|/)\s*\d+)?$|https?://|www\.|©|\bcopyright\b|all rights reserved|arxiv|\bdoi\b",
        )
        .expect("boilerplate pattern is valid")
    })
}

fn abstract_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\babstract\b").expect("abstract pattern is valid"))
}

fn hyphen_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\p{L})-\s+").expect("hyphen pattern is valid"))
}

pub fn extract_title(lines: &[String], words: &[LayoutWord]) -> String {
    for (name, strategy) in TITLE_STRATEGIES {
        if let Some(candidate) = strategy(lines, words) {
            let title = clean_title(&candidate);
            if !title.is_empty() {
                debug!(strategy = name, title = %title, "title detected");
                return title;
            }
        }
    }
    String::new()
}

pub fn is_plausible_title(line: &str) -> bool {
    let line = line.trim();
    let length = line.chars().count();
    (MIN_TITLE_CHARS..=MAX_TITLE_CHARS).contains(&length)
        && line.chars().any(char::is_alphabetic)
        && !boilerplate_re().is_match(line)
}

/// Joins words split across lines ("Retrie- val"), flattens newlines and
/// collapses whitespace.
pub fn clean_title(raw: &str) -> String {
    let unhyphenated = hyphen_break_re().replace_all(raw, "$1");
    normalize_whitespace(&unhyphenated.replace('\n', " "))
}

fn is_affiliation(line: &str) -> bool {
    let lowered = line.to_lowercase();
    INSTITUTION_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// Text before the first word "abstract", minus short lines, e-mail lines and
/// affiliations; the first two surviving lines form the title.
pub fn pre_abstract_title(lines: &[String], _words: &[LayoutWord]) -> Option<String> {
    let text = lines.join("\n");
    let position = abstract_heading_re().find(&text)?.start();

    let kept = text[..position]
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| line.chars().count() >= MIN_AUTHOR_BLOCK_LINE)
        .filter(|line| !line.contains('@'))
        .filter(|line| !is_affiliation(line))
        .take(2)
        .collect::<Vec<_>>();

    if kept.is_empty() {
        None
    } else {
        Some(kept.join(" "))
    }
}

/// Looks at the four most common (rounded) font sizes, largest first, and
/// returns the first plausible line set in that size.
pub fn font_size_title(_lines: &[String], words: &[LayoutWord]) -> Option<String> {
    let mut frequencies: BTreeMap<i32, usize> = BTreeMap::new();
    for word in words {
        *frequencies.entry(word.size.round() as i32).or_default() += 1;
    }

    let mut by_frequency = frequencies.into_iter().collect::<Vec<_>>();
    by_frequency.sort_by(|left, right| right.1.cmp(&left.1).then(right.0.cmp(&left.0)));
    let mut tiers = by_frequency
        .into_iter()
        .take(FONT_TIERS)
        .map(|(size, _)| size)
        .collect::<Vec<_>>();
    tiers.sort_unstable_by(|left, right| right.cmp(left));

    for size in tiers {
        let tier_words = words
            .iter()
            .filter(|word| word.size.round() as i32 == size)
            .collect::<Vec<_>>();
        let candidate = group_lines(&tier_words, TITLE_LINE_Y_TOLERANCE)
            .into_iter()
            .map(|line| line.text)
            .find(|line| is_plausible_title(line));
        if candidate.is_some() {
            return candidate;
        }
    }
    None
}

pub fn first_plausible_line(lines: &[String], _words: &[LayoutWord]) -> Option<String> {
    lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .take(FALLBACK_LINE_WINDOW)
        .find(|line| is_plausible_title(line))
        .map(str::to_string)
}
