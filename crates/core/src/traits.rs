use crate::store::{Distance, PayloadFilter, RetrievedPoint, ScoredPoint, StorePoint};
use crate::SearchError;
use async_trait::async_trait;

/// Operations the pipeline needs from a vector database, scoped to one
/// collection.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn collection_exists(&self) -> Result<bool, SearchError>;

    async fn create_collection(
        &self,
        dimensions: usize,
        distance: Distance,
    ) -> Result<(), SearchError>;

    async fn delete_all_points(&self) -> Result<(), SearchError>;

    async fn upsert(&self, points: Vec<StorePoint>) -> Result<(), SearchError>;

    async fn nearest_neighbors(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, SearchError>;

    async fn scroll_with_filter(
        &self,
        filter: &PayloadFilter,
        limit: usize,
    ) -> Result<Vec<RetrievedPoint>, SearchError>;
}
