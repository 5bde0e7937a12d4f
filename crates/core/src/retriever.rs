use crate::config::RetrievalConfig;
use crate::embeddings::Embedder;
use crate::models::RetrievalHit;
use crate::store::MetadataFilter;
use crate::traits::VectorStore;
use crate::SearchError;
use std::collections::HashSet;
use tracing::debug;

/// Scoped similarity search over one document's chunks.
pub struct Retriever<'a, E, S> {
    embedder: &'a E,
    store: &'a S,
    config: RetrievalConfig,
}

impl<'a, E, S> Retriever<'a, E, S>
where
    E: Embedder + Sync,
    S: VectorStore + Sync,
{
    pub fn new(embedder: &'a E, store: &'a S, config: RetrievalConfig) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    /// Requests `max(top_k, min_candidates)` candidates restricted to `doc_id`,
    /// drops repeated chunk texts and keeps the best `top_k`, ranked from 1.
    pub async fn retrieve(
        &self,
        query: &str,
        doc_id: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<RetrievalHit>, SearchError> {
        let doc_id = doc_id
            .map(str::trim)
            .filter(|doc_id| !doc_id.is_empty())
            .ok_or(SearchError::ScopeMissing)?;

        let query_vector = self.embedder.embed(query);
        let filter = MetadataFilter::for_document(doc_id);
        let fetch = self.config.fetch_limit(top_k);
        let candidates = self.store.query(&query_vector, fetch, &filter).await?;
        debug!(doc_id, fetch, candidates = candidates.len(), "retrieved candidates");

        let mut seen = HashSet::new();
        Ok(candidates
            .into_iter()
            // A store that ignores the filter must still not leak other papers.
            .filter(|hit| hit.metadata.doc_id == doc_id)
            .filter(|hit| seen.insert(hit.document.trim().to_string()))
            .take(top_k)
            .enumerate()
            .map(|(index, hit)| RetrievalHit {
                rank: index + 1,
                id: hit.id,
                text: hit.document,
                metadata: hit.metadata,
                score: hit.score,
            })
            .collect())
    }
}
