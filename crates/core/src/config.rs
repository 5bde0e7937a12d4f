use crate::chunking::ChunkingConfig;
use std::path::PathBuf;

pub const DEFAULT_COLLECTION: &str = "papers";
pub const DEFAULT_PERSIST_DIR: &str = "data/vector_store";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";
pub const DEFAULT_COMPLETION_ENDPOINT: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_COMPLETION_MODEL: &str = "llama-3.1-8b-instant";
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a research paper assistant. \
Answer questions using only the numbered excerpts of the paper you are given. \
Be precise and concise, and keep the paper's terminology. \
Do not append a citations, references or sources section to your answer.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Local,
    Qdrant,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Directory holding one JSON file per collection for the local backend.
    pub persist_dir: PathBuf,
    pub collection: String,
    pub qdrant_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Local,
            persist_dir: PathBuf::from(DEFAULT_PERSIST_DIR),
            collection: DEFAULT_COLLECTION.to_string(),
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
        }
    }
}

/// Layout tolerances used when rebuilding words and lines from positioned glyph runs.
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    /// Horizontal gap (text-space units) above which two runs are separate words.
    pub x_tolerance: f32,
    /// Vertical distance within which two words sit on the same line.
    pub y_tolerance: f32,
    pub strip_repeated_margins: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            x_tolerance: 1.5,
            y_tolerance: 3.0,
            strip_repeated_margins: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Lower bound on how many candidates are requested from the store before
    /// deduplication and truncation to `top_k`.
    pub min_candidates: usize,
    pub max_chars_per_chunk: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            min_candidates: 15,
            max_chars_per_chunk: 1_200,
        }
    }
}

impl RetrievalConfig {
    pub fn fetch_limit(&self, top_k: usize) -> usize {
        top_k.max(self.min_candidates)
    }
}

#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub api_key: Option<String>,
    pub system_prompt: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_COMPLETION_ENDPOINT.to_string(),
            model: DEFAULT_COMPLETION_MODEL.to_string(),
            temperature: 0.2,
            api_key: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RagConfig {
    pub store: StoreConfig,
    pub chunking: ChunkingConfig,
    pub extraction: ExtractionOptions,
    pub retrieval: RetrievalConfig,
    pub completion: CompletionConfig,
}
