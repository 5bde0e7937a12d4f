use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use paper_rag_core::config::{
    API_KEY_ENV, DEFAULT_COLLECTION, DEFAULT_COMPLETION_ENDPOINT, DEFAULT_COMPLETION_MODEL,
    DEFAULT_PERSIST_DIR, DEFAULT_QDRANT_URL,
};
use paper_rag_core::{
    Answer, CharacterNgramEmbedder, ChatCompletionClient, ChunkingConfig, CompletionClient,
    CompletionConfig, CompletionRequest, Embedder, IngestionReport, LocalStore, PaperRag,
    QdrantStore, RagConfig, RetrievalConfig, SearchError, StoreBackend, StoreConfig, VectorStore,
};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "paper-rag", version)]
struct Cli {
    /// Without a subcommand, asks for a PDF and then answers questions until "exit".
    #[command(subcommand)]
    command: Option<Command>,

    /// Vector store backend
    #[arg(long, value_enum, default_value = "local", env = "PAPER_RAG_BACKEND")]
    backend: Backend,

    /// Directory for the local backend's collection files
    #[arg(long, default_value = DEFAULT_PERSIST_DIR, env = "PAPER_RAG_PERSIST_DIR")]
    persist_dir: PathBuf,

    /// Collection holding every ingested paper
    #[arg(long, default_value = DEFAULT_COLLECTION, env = "PAPER_RAG_COLLECTION")]
    collection: String,

    /// Qdrant base URL
    #[arg(long, default_value = DEFAULT_QDRANT_URL, env = "PAPER_RAG_QDRANT_URL")]
    qdrant_url: String,

    /// Chunking preset: compact (800/150 words) or extended (1200/200 words)
    #[arg(long, default_value = "extended")]
    chunk_preset: String,

    /// Overrides the preset's window size in words.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Overrides the preset's overlap in words.
    #[arg(long)]
    chunk_overlap: Option<usize>,

    /// Number of excerpts given to the model.
    #[arg(long, default_value_t = 8)]
    top_k: usize,

    /// Completion model
    #[arg(long, default_value = DEFAULT_COMPLETION_MODEL, env = "PAPER_RAG_MODEL")]
    model: String,

    /// OpenAI-compatible endpoint base URL
    #[arg(long, default_value = DEFAULT_COMPLETION_ENDPOINT, env = "PAPER_RAG_ENDPOINT")]
    endpoint: String,

    /// Completion API key
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, default_value_t = 0.2)]
    temperature: f32,

    /// File whose contents replace the built-in system prompt.
    #[arg(long)]
    system_prompt_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Index one PDF unless it is already in the collection.
    Ingest {
        #[arg(long)]
        file: PathBuf,
    },
    /// Index a PDF if needed and answer one question about it.
    Ask {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        query: String,
        /// Print the excerpt list after the answer.
        #[arg(long, default_value_t = false)]
        show_citations: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Local,
    Qdrant,
}

impl From<Backend> for StoreBackend {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Local => StoreBackend::Local,
            Backend::Qdrant => StoreBackend::Qdrant,
        }
    }
}

impl Cli {
    fn rag_config(&self) -> anyhow::Result<RagConfig> {
        let preset = ChunkingConfig::preset(&self.chunk_preset)
            .ok_or_else(|| anyhow!("unknown chunk preset: {}", self.chunk_preset))?;
        let chunking = ChunkingConfig::new(
            self.chunk_size.unwrap_or(preset.chunk_size),
            self.chunk_overlap.unwrap_or(preset.overlap),
        )?;

        let mut completion = CompletionConfig {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            api_key: self.api_key.clone(),
            ..CompletionConfig::default()
        };
        if let Some(path) = &self.system_prompt_file {
            completion.system_prompt = std::fs::read_to_string(path)
                .with_context(|| format!("reading system prompt {}", path.display()))?;
        }

        Ok(RagConfig {
            store: StoreConfig {
                backend: self.backend.into(),
                persist_dir: self.persist_dir.clone(),
                collection: self.collection.clone(),
                qdrant_url: self.qdrant_url.clone(),
            },
            chunking,
            extraction: Default::default(),
            retrieval: RetrievalConfig {
                top_k: self.top_k,
                ..RetrievalConfig::default()
            },
            completion,
        })
    }
}

/// Ingest-only runs work without an API key; the credential error surfaces
/// on the first question instead.
struct Completion(Result<ChatCompletionClient, String>);

#[async_trait]
impl CompletionClient for Completion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, SearchError> {
        match &self.0 {
            Ok(client) => client.complete(request).await,
            Err(reason) => Err(SearchError::MissingCredential(reason.clone())),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli.rag_config()?;
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        collection = %config.store.collection,
        "paper-rag boot"
    );

    let embedder = CharacterNgramEmbedder::default();
    let completion = Completion(
        ChatCompletionClient::from_config(&config.completion).map_err(|error| error.to_string()),
    );
    let top_k = config.retrieval.top_k;
    let backend = config.store.backend;

    match backend {
        StoreBackend::Local => {
            let store =
                LocalStore::open(&config.store.persist_dir, &config.store.collection).await?;
            info!(path = %store.path().display(), "using local store");
            run(PaperRag::new(config, embedder, store, completion)?, cli.command, top_k).await
        }
        StoreBackend::Qdrant => {
            let store = QdrantStore::new(
                &config.store.qdrant_url,
                &config.store.collection,
                embedder.dimensions(),
            )?;
            store.ensure_collection().await?;
            run(PaperRag::new(config, embedder, store, completion)?, cli.command, top_k).await
        }
    }
}

async fn run<S>(
    rag: PaperRag<CharacterNgramEmbedder, S, Completion>,
    command: Option<Command>,
    top_k: usize,
) -> anyhow::Result<()>
where
    S: VectorStore + Sync,
{
    match command {
        Some(Command::Ingest { file }) => {
            let report = rag.ingest(&file).await?;
            print_report(&report);
        }
        Some(Command::Ask {
            file,
            query,
            show_citations,
        }) => {
            let report = rag.ingest(&file).await?;
            let answer = rag.answer(&query, Some(report.doc_id.as_str()), top_k).await?;
            print_answer(&answer, show_citations);
        }
        None => interactive(&rag, top_k).await?,
    }
    Ok(())
}

fn prompt(text: &str) -> anyhow::Result<()> {
    print!("{text}");
    std::io::stdout().flush()?;
    Ok(())
}

async fn read_input(lines: &mut Lines<BufReader<Stdin>>) -> anyhow::Result<Option<String>> {
    Ok(lines.next_line().await?.map(|line| line.trim().to_string()))
}

async fn interactive<S>(
    rag: &PaperRag<CharacterNgramEmbedder, S, Completion>,
    top_k: usize,
) -> anyhow::Result<()>
where
    S: VectorStore + Sync,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let pdf = loop {
        prompt("Enter PDF path: ")?;
        match read_input(&mut lines).await? {
            None => return Ok(()),
            Some(path) if path.is_empty() => continue,
            Some(path) => break PathBuf::from(path),
        }
    };
    let report = rag.ingest(&pdf).await?;
    print_report(&report);

    loop {
        prompt("\nAsk a question (or type exit): ")?;
        let Some(question) = read_input(&mut lines).await? else {
            break;
        };
        if question.eq_ignore_ascii_case("exit") {
            break;
        }
        if question.is_empty() {
            println!("Please type a question.");
            continue;
        }

        let answer = rag.answer(&question, Some(report.doc_id.as_str()), top_k).await?;
        print_answer(&answer, false);
    }
    Ok(())
}

fn print_report(report: &IngestionReport) {
    if report.already_indexed {
        println!(
            "{} already indexed (doc_id={})",
            report.source_name, report.doc_id
        );
    } else {
        println!(
            "{} chunks from {} pages ingested at {} (doc_id={})",
            report.chunks_written,
            report.pages,
            report.ingested_at.to_rfc3339(),
            report.doc_id
        );
    }
    if !report.title.is_empty() {
        println!("title: {}", report.title);
    }
}

fn print_answer(answer: &Answer, show_citations: bool) {
    println!("\nANSWER:\n{}", answer.answer_clean);
    if show_citations {
        for citation in &answer.citations {
            println!(
                "{} {} page={} chunk={}",
                citation.tag, citation.source, citation.page, citation.chunk_id
            );
        }
    }
}
