use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_retrieval_core::config::default_artifact_path;
use pdf_retrieval_core::{
    embedder_from_config, process_pdf, ChunkingConfig, DocumentIndexer, EmbeddingConfig,
    FailureMode, IngestionOptions, LopdfExtractor, QdrantConfig, QdrantStore, RetrievalConfig,
    RetrievalService, SearchFilters, DEFAULT_EMBEDDING_DIMENSIONS,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-retrieval", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333", global = true)]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, env = "QDRANT_COLLECTION", default_value = "pdf_chunks", global = true)]
    qdrant_collection: String,

    /// Embedding vector length
    #[arg(long, env = "EMBEDDING_DIMENSIONS", default_value_t = DEFAULT_EMBEDDING_DIMENSIONS, global = true)]
    embedding_dimensions: usize,

    /// Remote embedding endpoint. The local n-gram embedder is used when unset.
    #[arg(long, env = "EMBEDDING_ENDPOINT", global = true)]
    embedding_endpoint: Option<String>,

    #[arg(long, env = "EMBEDDING_API_KEY", hide_env_values = true, global = true)]
    embedding_api_key: Option<String>,

    #[arg(long, env = "EMBEDDING_MODEL", global = true)]
    embedding_model: Option<String>,

    #[arg(long, env = "FAILURE_MODE", value_enum, default_value_t = FailureModeArg::Degrade, global = true)]
    failure_mode: FailureModeArg,
}

/// What to do when embedding or a retrieval backend fails.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum FailureModeArg {
    /// Zero vectors for failed embeddings, empty results for failed searches.
    Degrade,
    /// Surface every failure as an error.
    Strict,
}

impl From<FailureModeArg> for FailureMode {
    fn from(value: FailureModeArg) -> Self {
        match value {
            FailureModeArg::Degrade => FailureMode::Degrade,
            FailureModeArg::Strict => FailureMode::Strict,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Chunk one PDF and replace the collection contents with it.
    Ingest {
        /// PDF to ingest.
        pdf: PathBuf,
        /// Stop after chunking; nothing is sent to Qdrant.
        #[arg(long, default_value_t = false)]
        skip_qdrant: bool,
        /// Use large-font lines as chapters when the PDF has no outline.
        #[arg(long, default_value_t = false)]
        font_header_fallback: bool,
        #[arg(long, env = "CHUNK_SIZE", default_value_t = pdf_retrieval_core::config::DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        #[arg(long, env = "CHUNK_OVERLAP", default_value_t = pdf_retrieval_core::config::DEFAULT_CHUNK_OVERLAP)]
        chunk_overlap: usize,
        /// Where the JSON dump of all chunks is written.
        #[arg(long, env = "CHUNK_ARTIFACT_PATH")]
        artifact_path: Option<PathBuf>,
    },
    /// Nearest chunks to a query, best first.
    Search {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Chunks matching outline metadata, in document order.
    Filter {
        #[arg(long)]
        chapter: Option<String>,
        #[arg(long)]
        heading: Option<String>,
        #[arg(long)]
        subheading: Option<String>,
        #[arg(long)]
        page_number: Option<u32>,
        #[arg(long)]
        limit: Option<usize>,
    },
}

impl Cli {
    fn qdrant(&self) -> QdrantConfig {
        QdrantConfig {
            url: self.qdrant_url.clone(),
            collection: self.qdrant_collection.clone(),
        }
    }

    fn embedding(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            dimensions: self.embedding_dimensions,
            endpoint: self.embedding_endpoint.clone(),
            api_key: self.embedding_api_key.clone(),
            model: self.embedding_model.clone(),
        }
    }

    fn retrieval(&self) -> RetrievalConfig {
        RetrievalConfig {
            failure_mode: self.failure_mode.into(),
            ..RetrievalConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-retrieval boot"
    );

    let qdrant = cli.qdrant();
    let embedding = cli.embedding();

    match &cli.command {
        Command::Ingest {
            pdf,
            skip_qdrant,
            font_header_fallback,
            chunk_size,
            chunk_overlap,
            artifact_path,
        } => {
            let options = IngestionOptions {
                chunking: ChunkingConfig::new(*chunk_size, *chunk_overlap),
                font_header_fallback: *font_header_fallback,
                artifact_path: Some(artifact_path.clone().unwrap_or_else(default_artifact_path)),
            };

            let chunks = process_pdf(pdf, &LopdfExtractor, &options)?;
            info!(pdf = %pdf.display(), chunk_count = chunks.len(), "chunked pdf");

            if *skip_qdrant {
                println!("{} chunks written, qdrant upload skipped", chunks.len());
                return Ok(());
            }

            let store = QdrantStore::new(&qdrant.url, &qdrant.collection)?;
            let indexer = DocumentIndexer::new(
                store,
                embedder_from_config(&embedding),
                embedding.dimensions,
                cli.failure_mode.into(),
            );
            let count = indexer.index(&chunks).await?;

            println!(
                "{count} chunks stored in {} at {}",
                qdrant.collection,
                Utc::now().to_rfc3339()
            );
        }
        Command::Search { query, limit } => {
            let service = RetrievalService::new(
                QdrantStore::new(&qdrant.url, &qdrant.collection)?,
                embedder_from_config(&embedding),
                cli.retrieval(),
            );
            let hits = service.similarity_search(query, *limit).await?;
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
        Command::Filter {
            chapter,
            heading,
            subheading,
            page_number,
            limit,
        } => {
            let filters = SearchFilters {
                chapter: chapter.clone(),
                heading: heading.clone(),
                subheading: subheading.clone(),
                page_number: *page_number,
            };
            let service = RetrievalService::new(
                QdrantStore::new(&qdrant.url, &qdrant.collection)?,
                embedder_from_config(&embedding),
                cli.retrieval(),
            );
            let hits = service.filtered_search(&filters, *limit).await?;
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
    }

    Ok(())
}
