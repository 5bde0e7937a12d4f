pub mod answer;
pub mod chunking;
pub mod completion;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod retriever;
pub mod store;
pub mod stores;
pub mod traits;

#[cfg(test)]
mod testing;

pub use answer::{clean_answer, is_title_request, AnswerComposer, ComposedAnswer};
pub use chunking::{chunk_pages, normalize_whitespace, Chunker, ChunkingConfig};
pub use completion::ChatCompletionClient;
pub use config::{
    CompletionConfig, ExtractionOptions, RagConfig, RetrievalConfig, StoreBackend, StoreConfig,
};
pub use context::{assemble, AssembledContext};
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{IngestError, SearchError};
pub use extractor::{DocumentMetadata, ExtractedDocument, LopdfExtractor, PdfExtractor};
pub use identity::{identify, identify_file};
pub use ingest::IndexWriter;
pub use models::{
    Answer, Chunk, ChunkMetadata, Citation, Document, IndexedVector, IngestionReport, Page,
    RetrievalHit,
};
pub use orchestrator::PaperRag;
pub use retriever::Retriever;
pub use store::{MetadataFilter, StoreHit};
pub use stores::{LocalStore, QdrantStore};
pub use traits::{CompletionClient, CompletionRequest, VectorStore};
