use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of normalized text. `page_number` is 1-based and refers to the
/// physical page in the source PDF, so gaps appear where blank pages were dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page_number: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub title: String,
    pub source_name: String,
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub page_number: u32,
    /// 0-based position within the page; restarts at 0 on every page.
    pub chunk_id: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub doc_id: String,
    pub title: String,
    pub page: u32,
    pub chunk_id: u32,
}

/// A persisted chunk: record id, embedding, metadata and the chunk text itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedVector {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
    pub document: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalHit {
    /// 1-based position in the ranked result list.
    pub rank: usize,
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Backend similarity; not comparable across store backends.
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub tag: String,
    pub source: String,
    pub page: u32,
    pub chunk_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub query: String,
    pub answer_raw: String,
    pub answer_clean: String,
    pub citations: Vec<Citation>,
    pub used_title_lookup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    pub doc_id: String,
    pub source_name: String,
    pub title: String,
    pub pages: usize,
    pub chunks_written: usize,
    pub already_indexed: bool,
    pub ingested_at: DateTime<Utc>,
}
