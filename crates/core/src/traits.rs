use crate::models::IndexedVector;
use crate::store::{MetadataFilter, StoreHit};
use crate::SearchError;
use async_trait::async_trait;

/// Filterable nearest-neighbour collection holding the chunks of every
/// ingested document.
#[async_trait]
pub trait VectorStore {
    /// Inserts records, replacing any existing record with the same id.
    async fn upsert(&self, records: &[IndexedVector]) -> Result<(), SearchError>;

    /// Most similar records matching `filter`, best first.
    async fn query(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<StoreHit>, SearchError>;

    /// Records matching `filter` in insertion order, no similarity involved.
    async fn get(&self, filter: &MetadataFilter, limit: usize)
        -> Result<Vec<StoreHit>, SearchError>;

    async fn count(&self, filter: &MetadataFilter) -> Result<usize, SearchError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub model: String,
    pub temperature: f32,
}

#[async_trait]
pub trait CompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, SearchError>;
}
