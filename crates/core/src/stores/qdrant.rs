use crate::models::{ChunkMetadata, IndexedVector};
use crate::store::{MetadataFilter, StoreHit};
use crate::traits::VectorStore;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use serde_with::skip_serializing_none;
use sha2::{Digest, Sha256};
use url::Url;
use uuid::{Builder, Uuid};

pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
    vector_size: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct PointPayload {
    record_id: String,
    document: String,
    #[serde(flatten)]
    metadata: ChunkMetadata,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    #[serde(default)]
    score: f64,
    payload: PointPayload,
}

impl From<ScoredPoint> for StoreHit {
    fn from(point: ScoredPoint) -> Self {
        StoreHit {
            id: point.payload.record_id,
            score: point.score,
            metadata: point.payload.metadata,
            document: point.payload.document,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScrollResponse {
    result: ScrollPage,
}

#[derive(Debug, Deserialize)]
struct ScrollPage {
    points: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    result: CountResult,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: usize,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
struct SearchBody<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
    filter: Option<Value>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
struct ScrollBody {
    limit: usize,
    with_payload: bool,
    with_vector: bool,
    filter: Option<Value>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
struct CountBody {
    exact: bool,
    filter: Option<Value>,
}

/// Qdrant point ids must be integers or UUIDs, so record ids are hashed into one.
pub fn point_id(record_id: &str) -> Uuid {
    let digest = Sha256::digest(record_id.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Builder::from_random_bytes(bytes).into_uuid()
}

fn filter_body(filter: &MetadataFilter) -> Option<Value> {
    filter.doc_id.as_ref().map(|doc_id| {
        json!({
            "must": [
                { "key": "doc_id", "match": { "value": doc_id } }
            ]
        })
    })
}

impl QdrantStore {
    pub fn new(
        endpoint: impl Into<String>,
        collection: impl Into<String>,
        vector_size: usize,
    ) -> Result<Self, SearchError> {
        let endpoint = endpoint.into();
        Url::parse(&endpoint)?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            collection: collection.into(),
            client: Client::new(),
            vector_size,
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.endpoint, self.collection, suffix)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SearchError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(SearchError::BackendResponse {
            backend: "qdrant".to_string(),
            details: format!("{status}: {body}"),
        })
    }

    pub async fn ensure_collection(&self) -> Result<(), SearchError> {
        let response = self.client.get(self.collection_url("")).send().await?;
        if response.status() == StatusCode::OK {
            return Ok(());
        }
        if response.status() != StatusCode::NOT_FOUND {
            return Self::check(response).await.map(|_| ());
        }

        let response = self
            .client
            .put(self.collection_url(""))
            .json(&json!({
                "vectors": { "size": self.vector_size, "distance": "Cosine" }
            }))
            .send()
            .await?;
        Self::check(response).await?;

        let response = self
            .client
            .put(self.collection_url("/index"))
            .json(&json!({ "field_name": "doc_id", "field_schema": "keyword" }))
            .send()
            .await?;
        Self::check(response).await.map(|_| ())
    }

    fn check_dimension(&self, length: usize, what: &str) -> Result<(), SearchError> {
        if length != self.vector_size {
            return Err(SearchError::Request(format!(
                "{what} dimension {length} != {}",
                self.vector_size
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn upsert(&self, records: &[IndexedVector]) -> Result<(), SearchError> {
        let points = records
            .iter()
            .map(|record| -> Result<Value, SearchError> {
                self.check_dimension(record.embedding.len(), "embedding")?;
                let payload = PointPayload {
                    record_id: record.id.clone(),
                    document: record.document.clone(),
                    metadata: record.metadata.clone(),
                };
                Ok(json!({
                    "id": point_id(&record.id).to_string(),
                    "vector": record.embedding,
                    "payload": serde_json::to_value(payload)?,
                }))
            })
            .collect::<Result<Vec<_>, SearchError>>()?;

        if points.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .put(self.collection_url("/points?wait=true"))
            .json(&json!({ "points": points }))
            .send()
            .await?;
        Self::check(response).await.map(|_| ())
    }

    async fn query(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<StoreHit>, SearchError> {
        self.check_dimension(query_vector.len(), "query vector")?;

        let body = SearchBody {
            vector: query_vector,
            limit: top_k,
            with_payload: true,
            filter: filter_body(filter),
        };
        let response = self
            .client
            .post(self.collection_url("/points/search"))
            .json(&body)
            .send()
            .await?;
        let parsed: SearchResponse = Self::check(response).await?.json().await?;
        Ok(parsed.result.into_iter().map(StoreHit::from).collect())
    }

    async fn get(
        &self,
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<StoreHit>, SearchError> {
        let body = ScrollBody {
            limit,
            with_payload: true,
            with_vector: false,
            filter: filter_body(filter),
        };
        let response = self
            .client
            .post(self.collection_url("/points/scroll"))
            .json(&body)
            .send()
            .await?;
        let parsed: ScrollResponse = Self::check(response).await?.json().await?;
        Ok(parsed.result.points.into_iter().map(StoreHit::from).collect())
    }

    async fn count(&self, filter: &MetadataFilter) -> Result<usize, SearchError> {
        let body = CountBody {
            exact: true,
            filter: filter_body(filter),
        };
        let response = self
            .client
            .post(self.collection_url("/points/count"))
            .json(&body)
            .send()
            .await?;
        let parsed: CountResponse = Self::check(response).await?.json().await?;
        Ok(parsed.result.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_ids_are_stable_uuids() {
        let first = point_id("abc_p1_c0_1");
        assert_eq!(first, point_id("abc_p1_c0_1"));
        assert_ne!(first, point_id("abc_p1_c0_2"));
        assert_eq!(first.get_version_num(), 4);
    }

    #[test]
    fn unscoped_bodies_omit_filter() -> Result<(), serde_json::Error> {
        let body = serde_json::to_value(CountBody {
            exact: true,
            filter: filter_body(&MetadataFilter::default()),
        })?;
        assert_eq!(body, json!({ "exact": true }));
        Ok(())
    }

    #[test]
    fn scoped_bodies_match_on_doc_id() -> Result<(), serde_json::Error> {
        let vector = [0.5f32, 0.5];
        let body = serde_json::to_value(SearchBody {
            vector: &vector,
            limit: 15,
            with_payload: true,
            filter: filter_body(&MetadataFilter::for_document("abc")),
        })?;
        assert_eq!(body["filter"]["must"][0]["key"], "doc_id");
        assert_eq!(body["filter"]["must"][0]["match"]["value"], "abc");
        assert_eq!(body["limit"], 15);
        Ok(())
    }

    #[test]
    fn payload_round_trips_flattened_metadata() -> Result<(), serde_json::Error> {
        let point: ScoredPoint = serde_json::from_value(json!({
            "id": "00000000-0000-4000-8000-000000000000",
            "score": 0.87,
            "payload": {
                "record_id": "abc_p2_c1_5",
                "document": "chunk text",
                "source": "paper.pdf",
                "doc_id": "abc",
                "title": "A Paper",
                "page": 2,
                "chunk_id": 1
            }
        }))?;

        let hit = StoreHit::from(point);
        assert_eq!(hit.id, "abc_p2_c1_5");
        assert_eq!(hit.metadata.page, 2);
        assert_eq!(hit.metadata.title, "A Paper");
        assert_eq!(hit.document, "chunk text");
        Ok(())
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        assert!(matches!(
            QdrantStore::new("not a url", "papers", 4),
            Err(SearchError::Url(_))
        ));
    }

    #[tokio::test]
    async fn wrong_query_dimension_fails_before_any_request() -> Result<(), SearchError> {
        let store = QdrantStore::new("http://127.0.0.1:1", "papers", 4)?;
        let result = store
            .query(&[1.0, 0.0], 3, &MetadataFilter::for_document("abc"))
            .await;
        assert!(matches!(result, Err(SearchError::Request(_))));
        Ok(())
    }
}
