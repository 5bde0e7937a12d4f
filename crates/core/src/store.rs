use crate::models::{ChunkMetadata, IndexedVector};
use serde::{Deserialize, Serialize};

/// Key/value constraints on record metadata. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub doc_id: Option<String>,
}

impl MetadataFilter {
    pub fn for_document(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: Some(doc_id.into()),
        }
    }

    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        self.doc_id
            .as_deref()
            .map_or(true, |doc_id| metadata.doc_id == doc_id)
    }
}

/// A record as returned by a store, with its similarity when it came from a query.
#[derive(Debug, Clone)]
pub struct StoreHit {
    pub id: String,
    pub score: f64,
    pub metadata: ChunkMetadata,
    pub document: String,
}

impl StoreHit {
    pub fn from_record(record: &IndexedVector, score: f64) -> Self {
        Self {
            id: record.id.clone(),
            score,
            metadata: record.metadata.clone(),
            document: record.document.clone(),
        }
    }
}
