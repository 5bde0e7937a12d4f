use crate::embeddings::Embedder;
use crate::models::{Chunk, ChunkMetadata, IndexedVector};
use crate::traits::VectorStore;
use crate::SearchError;
use tracing::debug;

/// Record id for one chunk. `sequence` counts chunks across the whole
/// document, starting at 1, so ids stay unique even if a page/chunk pair repeats.
pub fn record_id(doc_id: &str, page: u32, chunk_id: u32, sequence: u64) -> String {
    format!("{doc_id}_p{page}_c{chunk_id}_{sequence}")
}

/// Pairs chunks with their embeddings and attaches metadata and record ids.
pub fn build_records(
    doc_id: &str,
    source_name: &str,
    title: &str,
    chunks: &[Chunk],
    embeddings: Vec<Vec<f32>>,
) -> Result<Vec<IndexedVector>, SearchError> {
    if chunks.len() != embeddings.len() {
        return Err(SearchError::Request(format!(
            "embedding count {} doesn't match chunk count {}",
            embeddings.len(),
            chunks.len()
        )));
    }

    Ok(chunks
        .iter()
        .zip(embeddings)
        .zip(1u64..)
        .map(|((chunk, embedding), sequence)| IndexedVector {
            id: record_id(doc_id, chunk.page_number, chunk.chunk_id, sequence),
            embedding,
            metadata: ChunkMetadata {
                source: source_name.to_string(),
                doc_id: doc_id.to_string(),
                title: title.to_string(),
                page: chunk.page_number,
                chunk_id: chunk.chunk_id,
            },
            document: chunk.text.clone(),
        })
        .collect())
}

/// Embeds chunks and persists them. Does not check for an existing copy of
/// the document; callers skip documents that are already indexed.
pub struct IndexWriter<'a, E, S> {
    embedder: &'a E,
    store: &'a S,
}

impl<'a, E, S> IndexWriter<'a, E, S>
where
    E: Embedder + Sync,
    S: VectorStore + Sync,
{
    pub fn new(embedder: &'a E, store: &'a S) -> Self {
        Self { embedder, store }
    }

    pub async fn write(
        &self,
        doc_id: &str,
        source_name: &str,
        title: &str,
        chunks: &[Chunk],
    ) -> Result<usize, SearchError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts = chunks.iter().map(|chunk| chunk.text.clone()).collect::<Vec<_>>();
        let embeddings = self.embedder.embed_batch(&texts);
        let records = build_records(doc_id, source_name, title, chunks, embeddings)?;
        debug!(
            doc_id,
            records = records.len(),
            model = %self.embedder.model_name(),
            "upserting chunk vectors"
        );

        self.store.upsert(&records).await?;
        Ok(records.len())
    }
}
