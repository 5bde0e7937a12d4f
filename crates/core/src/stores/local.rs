use crate::models::IndexedVector;
use crate::store::{MetadataFilter, StoreHit};
use crate::traits::VectorStore;
use crate::SearchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Collection {
    dimensions: Option<usize>,
    records: Vec<IndexedVector>,
}

/// Collection persisted as `{persist_dir}/{collection}.json`. Search is a
/// brute-force cosine scan. Each upsert rewrites the whole file and only then
/// becomes visible in memory.
pub struct LocalStore {
    path: PathBuf,
    collection: RwLock<Collection>,
}

fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();
    if left_norm < f32::EPSILON || right_norm < f32::EPSILON {
        0.0
    } else {
        f64::from(dot / (left_norm * right_norm))
    }
}

impl LocalStore {
    pub async fn open(
        persist_dir: impl AsRef<Path>,
        collection: &str,
    ) -> Result<Self, SearchError> {
        let persist_dir = persist_dir.as_ref();
        tokio::fs::create_dir_all(persist_dir).await?;
        let path = persist_dir.join(format!("{collection}.json"));

        let loaded = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Collection>(&bytes)?,
            Err(error) if error.kind() == ErrorKind::NotFound => Collection::default(),
            Err(error) => return Err(error.into()),
        };
        debug!(path = %path.display(), records = loaded.records.len(), "opened local collection");

        Ok(Self {
            path,
            collection: RwLock::new(loaded),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, collection: &Collection) -> Result<(), SearchError> {
        let bytes = serde_json::to_vec(collection)?;
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for LocalStore {
    async fn upsert(&self, records: &[IndexedVector]) -> Result<(), SearchError> {
        if records.is_empty() {
            return Ok(());
        }

        // Held across the write so concurrent upserts cannot interleave.
        let mut current = self.collection.write().await;
        let expected = current.dimensions.unwrap_or(records[0].embedding.len());
        if let Some(record) = records.iter().find(|r| r.embedding.len() != expected) {
            return Err(SearchError::Request(format!(
                "embedding dimension {} != collection dimension {} for {}",
                record.embedding.len(),
                expected,
                record.id
            )));
        }

        let mut next = Collection {
            dimensions: Some(expected),
            records: current.records.clone(),
        };
        for record in records {
            match next.records.iter().position(|r| r.id == record.id) {
                Some(index) => next.records[index] = record.clone(),
                None => next.records.push(record.clone()),
            }
        }

        self.persist(&next).await?;
        *current = next;
        Ok(())
    }

    async fn query(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<StoreHit>, SearchError> {
        let collection = self.collection.read().await;
        if let Some(dimensions) = collection.dimensions {
            if query_vector.len() != dimensions {
                return Err(SearchError::Request(format!(
                    "query vector dim {} is not {}",
                    query_vector.len(),
                    dimensions
                )));
            }
        }

        let mut hits = collection
            .records
            .iter()
            .filter(|record| filter.matches(&record.metadata))
            .map(|record| {
                StoreHit::from_record(record, cosine_similarity(query_vector, &record.embedding))
            })
            .collect::<Vec<_>>();
        hits.sort_by(|left, right| right.score.total_cmp(&left.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn get(
        &self,
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<StoreHit>, SearchError> {
        let collection = self.collection.read().await;
        Ok(collection
            .records
            .iter()
            .filter(|record| filter.matches(&record.metadata))
            .take(limit)
            .map(|record| StoreHit::from_record(record, 0.0))
            .collect())
    }

    async fn count(&self, filter: &MetadataFilter) -> Result<usize, SearchError> {
        let collection = self.collection.read().await;
        Ok(collection
            .records
            .iter()
            .filter(|record| filter.matches(&record.metadata))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;
    use tempfile::tempdir;

    fn record(id: &str, doc_id: &str, embedding: Vec<f32>) -> IndexedVector {
        IndexedVector {
            id: id.to_string(),
            embedding,
            metadata: ChunkMetadata {
                source: format!("{doc_id}.pdf"),
                doc_id: doc_id.to_string(),
                title: format!("Title {doc_id}"),
                page: 1,
                chunk_id: 0,
            },
            document: format!("text of {id}"),
        }
    }

    #[tokio::test]
    async fn scoped_query_never_leaks_other_documents() -> Result<(), SearchError> {
        let dir = tempdir()?;
        let store = LocalStore::open(dir.path(), "papers").await?;
        store
            .upsert(&[
                record("a1", "A", vec![0.0, 1.0]),
                record("b1", "B", vec![1.0, 0.0]),
                record("a2", "A", vec![0.3, 0.7]),
            ])
            .await?;

        // B's vector is identical to the query, yet the scope is A.
        let hits = store
            .query(&[1.0, 0.0], 10, &MetadataFilter::for_document("A"))
            .await?;
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|hit| hit.metadata.doc_id == "A"));
        assert_eq!(hits[0].id, "a2");
        Ok(())
    }

    #[tokio::test]
    async fn collection_survives_reopen() -> Result<(), SearchError> {
        let dir = tempdir()?;
        {
            let store = LocalStore::open(dir.path(), "papers").await?;
            store.upsert(&[record("a1", "A", vec![1.0, 0.0])]).await?;
        }

        let reopened = LocalStore::open(dir.path(), "papers").await?;
        assert_eq!(reopened.count(&MetadataFilter::for_document("A")).await?, 1);
        let other = LocalStore::open(dir.path(), "other").await?;
        assert_eq!(other.count(&MetadataFilter::default()).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() -> Result<(), SearchError> {
        let dir = tempdir()?;
        let store = LocalStore::open(dir.path(), "papers").await?;
        store.upsert(&[record("a1", "A", vec![1.0, 0.0])]).await?;
        let mut replacement = record("a1", "A", vec![0.0, 1.0]);
        replacement.document = "replaced".to_string();
        store.upsert(&[replacement]).await?;

        let stored = store.get(&MetadataFilter::default(), 10).await?;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].document, "replaced");
        Ok(())
    }

    #[tokio::test]
    async fn mixed_dimensions_are_rejected() -> Result<(), SearchError> {
        let dir = tempdir()?;
        let store = LocalStore::open(dir.path(), "papers").await?;
        store.upsert(&[record("a1", "A", vec![1.0, 0.0])]).await?;

        let result = store.upsert(&[record("a2", "A", vec![1.0, 0.0, 0.0])]).await;
        assert!(matches!(result, Err(SearchError::Request(_))));
        let query = store
            .query(&[1.0], 5, &MetadataFilter::for_document("A"))
            .await;
        assert!(matches!(query, Err(SearchError::Request(_))));
        Ok(())
    }

    #[tokio::test]
    async fn failed_persist_leaves_collection_untouched() -> Result<(), SearchError> {
        let dir = tempdir()?;
        let store = LocalStore::open(dir.path(), "papers").await?;
        store.upsert(&[record("a1", "A", vec![1.0, 0.0])]).await?;

        // A directory in place of the collection file makes the rename fail.
        std::fs::remove_file(store.path())?;
        std::fs::create_dir(store.path())?;
        let result = store.upsert(&[record("b1", "B", vec![0.0, 1.0])]).await;

        assert!(result.is_err());
        assert_eq!(store.count(&MetadataFilter::for_document("B")).await?, 0);
        assert_eq!(store.count(&MetadataFilter::default()).await?, 1);
        let hits = store
            .query(&[0.0, 1.0], 5, &MetadataFilter::for_document("B"))
            .await?;
        assert!(hits.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn get_respects_limit_and_filter() -> Result<(), SearchError> {
        let dir = tempdir()?;
        let store = LocalStore::open(dir.path(), "papers").await?;
        store
            .upsert(&[
                record("a1", "A", vec![1.0, 0.0]),
                record("a2", "A", vec![1.0, 0.0]),
                record("b1", "B", vec![1.0, 0.0]),
            ])
            .await?;

        let first = store.get(&MetadataFilter::for_document("A"), 1).await?;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].metadata.title, "Title A");
        assert!(store.get(&MetadataFilter::for_document("C"), 1).await?.is_empty());
        Ok(())
    }
}
