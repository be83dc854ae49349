use crate::embeddings::DEFAULT_EMBEDDING_DIMENSIONS;
use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;
pub const DEFAULT_SIMILARITY_LIMIT: usize = 3;
pub const DEFAULT_FILTER_LIMIT: usize = 50;
pub const ARTIFACT_FILE_NAME: &str = "chunked-output.json";

/// What to do when a dependency fails on a path that can tolerate it.
///
/// `Degrade` substitutes a zero vector for a failed chunk embedding and turns
/// backend failures during retrieval into an empty result. `Strict` surfaces
/// both as errors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    #[default]
    Degrade,
    Strict,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be at least 1 character".to_string(),
            ));
        }
        Ok(())
    }

    /// Window size and overlap as the splitter uses them: size is at least 1
    /// and overlap is strictly smaller than size.
    pub fn effective(&self) -> (usize, usize) {
        let size = self.chunk_size.max(1);
        (size, self.overlap.min(size - 1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbeddingConfig {
    pub dimensions: usize,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            endpoint: None,
            api_key: None,
            model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            collection: "pdf_chunks".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrievalConfig {
    pub similarity_limit: usize,
    pub filter_limit: usize,
    pub failure_mode: FailureMode,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_limit: DEFAULT_SIMILARITY_LIMIT,
            filter_limit: DEFAULT_FILTER_LIMIT,
            failure_mode: FailureMode::Degrade,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunking: ChunkingConfig,
    /// Derive chapters from large-font header lines when the outline is empty.
    pub font_header_fallback: bool,
    /// Where the indented JSON dump of every chunk goes. `None` skips it.
    pub artifact_path: Option<PathBuf>,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            font_header_fallback: false,
            artifact_path: Some(default_artifact_path()),
        }
    }
}

pub fn default_artifact_path() -> PathBuf {
    std::env::temp_dir().join(ARTIFACT_FILE_NAME)
}
