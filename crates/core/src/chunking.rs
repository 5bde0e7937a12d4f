use crate::error::IngestError;
use crate::models::{Chunk, Page};
use serde::{Deserialize, Serialize};

/// Word-window sizes. Both values count whitespace-separated words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, IngestError> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// 800 words with 150 words of overlap.
    pub fn compact() -> Self {
        Self {
            chunk_size: 800,
            overlap: 150,
        }
    }

    /// 1200 words with 200 words of overlap.
    pub fn extended() -> Self {
        Self {
            chunk_size: 1_200,
            overlap: 200,
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "compact" => Some(Self::compact()),
            "extended" => Some(Self::extended()),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be at least one word".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::extended()
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{a0}', " ")
}

/// Splits pages into overlapping word windows. Construction validates the
/// configuration so that chunking itself can never loop.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self, IngestError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    /// Windows of `chunk_size` words advancing by `chunk_size - overlap`.
    /// The last window is the first one that reaches the end of the text.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let words = text.split_whitespace().collect::<Vec<_>>();
        let mut windows = Vec::new();
        let mut start = 0;

        while start < words.len() {
            let end = (start + self.config.chunk_size).min(words.len());
            let window = words[start..end].join(" ");
            if !window.is_empty() {
                windows.push(window);
            }
            if end == words.len() {
                break;
            }
            start += self.config.step();
        }

        windows
    }

    pub fn chunk(&self, pages: &[Page]) -> Vec<Chunk> {
        pages
            .iter()
            .flat_map(|page| {
                self.chunk_text(&page.text)
                    .into_iter()
                    .enumerate()
                    .map(move |(index, text)| Chunk {
                        page_number: page.page_number,
                        chunk_id: index as u32,
                        text,
                    })
            })
            .collect()
    }
}

pub fn chunk_pages(
    pages: &[Page],
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, IngestError> {
    let chunker = Chunker::new(ChunkingConfig::new(chunk_size, overlap)?)?;
    Ok(chunker.chunk(pages))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(count: usize) -> String {
        (0..count)
            .map(|index| format!("w{index}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn page(number: u32, text: &str) -> Page {
        Page {
            page_number: number,
            text: text.to_string(),
        }
    }

    #[test]
    fn whitespace_is_normalized() {
        let input = "A  \t  lot\nof   spacing";
        let normalized = normalize_whitespace(input);
        assert_eq!(normalized, "A lot of spacing");
    }

    #[test]
    fn window_count_matches_step_formula() {
        for (total, size, overlap) in [(10, 4, 2), (5, 4, 2), (1_000, 120, 20), (37, 10, 0)] {
            let chunker = Chunker::new(ChunkingConfig::new(size, overlap).unwrap()).unwrap();
            let windows = chunker.chunk_text(&words(total));
            let expected = (total - overlap).div_ceil(size - overlap);
            assert_eq!(windows.len(), expected, "W={total} c={size} o={overlap}");
        }
    }

    #[test]
    fn short_page_yields_single_window() {
        let chunker = Chunker::new(ChunkingConfig::new(50, 10).unwrap()).unwrap();
        let windows = chunker.chunk_text("only a few words here");
        assert_eq!(windows, vec!["only a few words here".to_string()]);
    }

    #[test]
    fn every_word_is_covered() {
        let text = words(233);
        let chunker = Chunker::new(ChunkingConfig::new(40, 7).unwrap()).unwrap();
        let windows = chunker.chunk_text(&text);

        for word in text.split_whitespace() {
            assert!(
                windows
                    .iter()
                    .any(|window| window.split_whitespace().any(|w| w == word)),
                "{word} missing"
            );
        }
        assert!(windows
            .iter()
            .all(|window| window.split_whitespace().count() <= 40));
    }

    #[test]
    fn consecutive_windows_share_overlap() {
        let chunker = Chunker::new(ChunkingConfig::new(4, 2).unwrap()).unwrap();
        let windows = chunker.chunk_text("a b c d e f g");
        assert_eq!(windows, vec!["a b c d", "c d e f", "e f g"]);
    }

    #[test]
    fn overlap_not_smaller_than_size_is_rejected() {
        assert!(matches!(
            ChunkingConfig::new(100, 100),
            Err(IngestError::InvalidChunkConfig(_))
        ));
        assert!(matches!(
            chunk_pages(&[page(1, "a b c")], 10, 25),
            Err(IngestError::InvalidChunkConfig(_))
        ));
        let raw = ChunkingConfig {
            chunk_size: 0,
            overlap: 0,
        };
        assert!(Chunker::new(raw).is_err());
    }

    #[test]
    fn chunk_ids_restart_per_page() {
        let pages = vec![page(1, &words(9)), page(3, &words(5))];
        let chunks = chunk_pages(&pages, 4, 1).unwrap();

        let first_page: Vec<_> = chunks.iter().filter(|c| c.page_number == 1).collect();
        let third_page: Vec<_> = chunks.iter().filter(|c| c.page_number == 3).collect();
        assert_eq!(
            first_page.iter().map(|c| c.chunk_id).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(
            third_page.iter().map(|c| c.chunk_id).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn presets_are_valid() {
        assert!(ChunkingConfig::compact().validate().is_ok());
        assert!(ChunkingConfig::extended().validate().is_ok());
        assert_eq!(ChunkingConfig::preset("compact"), Some(ChunkingConfig::compact()));
        assert_eq!(ChunkingConfig::preset("nope"), None);
        assert_eq!(ChunkingConfig::default(), ChunkingConfig::extended());
    }
}
