use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("embedding dimension {actual} does not match configured {expected} (chunk {chunk_id})")]
    DimensionMismatch {
        chunk_id: String,
        expected: usize,
        actual: usize,
    },

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("serialize error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("vector store error: {0}")]
    Store(#[from] SearchError),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("malformed response body: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbedError),
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding endpoint {endpoint} returned {details}")]
    Response { endpoint: String, details: String },
}
