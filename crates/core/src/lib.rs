pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod font_runs;
pub mod indexer;
pub mod ingest;
pub mod models;
pub mod outline;
pub mod retrieval;
pub mod store;
pub mod stores;
pub mod traits;

pub use chunking::{chunk_text, chunk_text_with_outline_metadata, hierarchy_from_font_headers};
pub use config::{
    ChunkingConfig, EmbeddingConfig, FailureMode, IngestionOptions, QdrantConfig, RetrievalConfig,
};
pub use embeddings::{
    embedder_from_config, CharacterNgramEmbedder, Embedder, HttpEmbedder,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{EmbedError, IngestError, SearchError};
pub use extractor::{LopdfExtractor, PdfExtractor, RawDocument};
pub use font_runs::{deduplicate_text, extract_font_runs, FontRun, TextPosition};
pub use indexer::DocumentIndexer;
pub use ingest::{process_document, process_pdf, write_chunk_artifact};
pub use models::{
    Chunk, ChunkMetadata, HierarchyPath, PageHierarchyMap, PageText, SearchFilters, SearchHit,
};
pub use outline::{resolve_outline, Destination, DestinationIndex, OutlineEntry};
pub use retrieval::RetrievalService;
pub use stores::QdrantStore;
pub use traits::VectorStore;
