use crate::answer::{is_title_request, AnswerComposer};
use crate::chunking::Chunker;
use crate::config::RagConfig;
use crate::context::assemble;
use crate::embeddings::Embedder;
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::identity::{identify, read_source, source_name};
use crate::ingest::IndexWriter;
use crate::models::{Answer, Document, IngestionReport};
use crate::retriever::Retriever;
use crate::store::MetadataFilter;
use crate::traits::{CompletionClient, VectorStore};
use crate::{IngestError, SearchError};
use chrono::Utc;
use std::path::Path;
use tracing::{debug, info};

/// Ingestion and question answering over one shared collection, every
/// query scoped to a single paper.
pub struct PaperRag<E, S, C> {
    config: RagConfig,
    extractor: LopdfExtractor,
    chunker: Chunker,
    embedder: E,
    store: S,
    completion: C,
}

impl<E, S, C> PaperRag<E, S, C>
where
    E: Embedder + Sync,
    S: VectorStore + Sync,
    C: CompletionClient + Sync,
{
    pub fn new(
        config: RagConfig,
        embedder: E,
        store: S,
        completion: C,
    ) -> Result<Self, IngestError> {
        let chunker = Chunker::new(config.chunking)?;
        let extractor = LopdfExtractor::new(config.extraction.clone());
        Ok(Self {
            config,
            extractor,
            chunker,
            embedder,
            store,
            completion,
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Skips extraction entirely when vectors for the file's content hash
    /// already exist. Nothing is written unless chunking produced text.
    pub async fn ingest(&self, path: &Path) -> Result<IngestionReport, IngestError> {
        let bytes = read_source(path)?;
        let source_name = source_name(path)?;
        let doc_id = identify(&bytes);
        let scope = MetadataFilter::for_document(doc_id.as_str());

        if self.store.count(&scope).await? > 0 {
            let title = self.stored_title(&doc_id).await?.unwrap_or_default();
            info!(doc_id = %doc_id, source = %source_name, "document already indexed");
            return Ok(IngestionReport {
                doc_id,
                source_name,
                title,
                pages: 0,
                chunks_written: 0,
                already_indexed: true,
                ingested_at: Utc::now(),
            });
        }

        let extracted = self.extractor.extract_bytes(&bytes)?;
        let document = Document {
            doc_id,
            title: extracted.title,
            source_name,
            pages: extracted.pages,
        };
        debug!(
            doc_id = %document.doc_id,
            pages = document.pages.len(),
            page_count = extracted.metadata.page_count,
            pdf_version = %extracted.metadata.pdf_version,
            "extracted document"
        );

        let chunks = self.chunker.chunk(&document.pages);
        if chunks.is_empty() {
            return Err(IngestError::NoExtractableText(document.source_name));
        }

        let writer = IndexWriter::new(&self.embedder, &self.store);
        let chunks_written = writer
            .write(&document.doc_id, &document.source_name, &document.title, &chunks)
            .await?;
        info!(
            doc_id = %document.doc_id,
            source = %document.source_name,
            title = %document.title,
            chunks = chunks_written,
            "document ingested"
        );

        Ok(IngestionReport {
            doc_id: document.doc_id,
            source_name: document.source_name,
            title: document.title,
            pages: document.pages.len(),
            chunks_written,
            already_indexed: false,
            ingested_at: Utc::now(),
        })
    }

    /// Title recorded at ingestion, read from any one chunk of the document.
    pub async fn stored_title(&self, doc_id: &str) -> Result<Option<String>, SearchError> {
        let hits = self
            .store
            .get(&MetadataFilter::for_document(doc_id), 1)
            .await?;
        Ok(hits
            .into_iter()
            .map(|hit| hit.metadata.title)
            .find(|title| !title.trim().is_empty()))
    }

    pub async fn answer(
        &self,
        query: &str,
        doc_id: Option<&str>,
        top_k: usize,
    ) -> Result<Answer, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }
        let doc_id = doc_id
            .map(str::trim)
            .filter(|doc_id| !doc_id.is_empty())
            .ok_or(SearchError::ScopeMissing)?;

        if is_title_request(query) {
            let text = match self.stored_title(doc_id).await? {
                Some(title) => format!("Title: {title}"),
                None => "Title: not found".to_string(),
            };
            return Ok(Answer {
                query: query.to_string(),
                answer_raw: text.clone(),
                answer_clean: text,
                citations: Vec::new(),
                used_title_lookup: true,
            });
        }

        let retriever = Retriever::new(&self.embedder, &self.store, self.config.retrieval.clone());
        let hits = retriever.retrieve(query, Some(doc_id), top_k).await?;
        let context = assemble(&hits, self.config.retrieval.max_chars_per_chunk);

        let completion = &self.config.completion;
        let composer =
            AnswerComposer::new(&self.completion, &completion.model, completion.temperature);
        let composed = composer
            .compose(query, &context.text, &completion.system_prompt)
            .await?;

        Ok(Answer {
            query: query.to_string(),
            answer_raw: composed.answer_raw,
            answer_clean: composed.answer_clean,
            citations: context.citations,
            used_title_lookup: false,
        })
    }
}
