use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("pdf extraction error: {0}")]
    Extraction(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("no extractable text in {0}")]
    NoExtractableText(String),

    #[error("vector store error: {0}")]
    Store(#[from] SearchError),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("retrieval requires a document scope (doc_id)")]
    ScopeMissing,

    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("search request failed: {0}")]
    Request(String),

    #[error("store not available yet: {0}")]
    NotReady(String),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
