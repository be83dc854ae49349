use crate::config::FailureMode;
use crate::embeddings::Embedder;
use crate::error::IngestError;
use crate::models::Chunk;
use crate::store::{Distance, StorePoint};
use crate::traits::VectorStore;
use tracing::{info, warn};

/// Embeds chunks and writes them to a vector store, replacing whatever the
/// collection held before.
pub struct DocumentIndexer<S, E> {
    store: S,
    embedder: E,
    dimensions: usize,
    failure_mode: FailureMode,
}

impl<S, E> DocumentIndexer<S, E>
where
    S: VectorStore,
    E: Embedder,
{
    pub fn new(store: S, embedder: E, dimensions: usize, failure_mode: FailureMode) -> Self {
        Self {
            store,
            embedder,
            dimensions,
            failure_mode,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a cosine collection of `dimensions` unless one already exists.
    /// A failed existence check is treated as "missing".
    pub async fn create_collection_if_not_exists(&self, dimensions: usize) -> Result<(), IngestError> {
        match self.store.collection_exists().await {
            Ok(true) => {
                info!("collection already exists");
                Ok(())
            }
            Ok(false) => {
                info!(dimensions, "creating collection");
                Ok(self
                    .store
                    .create_collection(dimensions, Distance::Cosine)
                    .await?)
            }
            Err(error) => {
                info!(%error, dimensions, "collection lookup failed, creating collection");
                Ok(self
                    .store
                    .create_collection(dimensions, Distance::Cosine)
                    .await?)
            }
        }
    }

    /// One vector per chunk, in chunk order. Under [`FailureMode::Degrade`] a
    /// chunk whose embedding fails gets a zero vector. A vector of the wrong
    /// length always fails the batch.
    pub async fn generate_embeddings(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>, IngestError> {
        info!(
            chunk_count = chunks.len(),
            dimensions = self.dimensions,
            "generating embeddings"
        );

        let mut embeddings = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            match self.embedder.embed(&chunk.content).await {
                Ok(vector) => {
                    self.check_dimensions(&chunk.id, &vector)?;
                    embeddings.push(vector);
                }
                Err(error) => match self.failure_mode {
                    FailureMode::Degrade => {
                        warn!(chunk_id = %chunk.id, %error, "embedding failed, using zero vector");
                        embeddings.push(vec![0.0; self.dimensions]);
                    }
                    FailureMode::Strict => return Err(error.into()),
                },
            }
        }

        Ok(embeddings)
    }

    /// Clears the collection and writes every chunk with its embedding in a
    /// single batch. Counts and dimensions are checked before the store is
    /// touched.
    pub async fn upsert(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<(), IngestError> {
        if chunks.len() != embeddings.len() {
            return Err(IngestError::InvalidArgument(format!(
                "number of chunks ({}) must match number of embeddings ({})",
                chunks.len(),
                embeddings.len()
            )));
        }

        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            self.check_dimensions(&chunk.id, embedding)?;
        }

        info!("clearing existing points before inserting new document");
        self.store.delete_all_points().await?;

        let points = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| StorePoint {
                id: chunk.id.clone(),
                vector: embedding.clone(),
                payload: chunk.payload(),
            })
            .collect::<Vec<_>>();

        let count = points.len();
        if count == 0 {
            info!("no chunks to upsert");
            return Ok(());
        }

        self.store.upsert(points).await?;
        info!(point_count = count, "upserted document chunks");
        Ok(())
    }

    /// Embeds, ensures the collection and replaces its contents.
    pub async fn index(&self, chunks: &[Chunk]) -> Result<usize, IngestError> {
        let embeddings = self.generate_embeddings(chunks).await?;
        self.create_collection_if_not_exists(self.dimensions).await?;
        self.upsert(chunks, &embeddings).await?;
        Ok(chunks.len())
    }

    fn check_dimensions(&self, chunk_id: &str, vector: &[f32]) -> Result<(), IngestError> {
        if vector.len() != self.dimensions {
            return Err(IngestError::DimensionMismatch {
                chunk_id: chunk_id.to_string(),
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}
