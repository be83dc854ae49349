use crate::config::{FailureMode, RetrievalConfig};
use crate::embeddings::Embedder;
use crate::models::{non_blank, SearchFilters, SearchHit};
use crate::store::{Payload, PayloadFilter};
use crate::traits::VectorStore;
use crate::SearchError;
use serde_json::Value;
use std::cmp::Ordering;
use tracing::{info, warn};

/// Payload keys that may carry a chunk's position, tried in this order.
pub const CHUNK_ORDER_KEYS: [&str; 5] = ["chunkIndex", "chunk_index", "index", "order", "sequence"];

/// Read-only search over one collection. Holds no mutable state, so a single
/// instance can serve concurrent callers.
pub struct RetrievalService<S, E> {
    store: S,
    embedder: E,
    config: RetrievalConfig,
}

impl<S, E> RetrievalService<S, E>
where
    S: VectorStore,
    E: Embedder,
{
    pub fn new(store: S, embedder: E, config: RetrievalConfig) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Nearest neighbours of `query`, best score first.
    pub async fn similarity_search(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let limit = limit.unwrap_or(self.config.similarity_limit);
        info!(query, limit, "searching for similar chunks");

        match self.similar(query, limit).await {
            Ok(hits) => {
                info!(hit_count = hits.len(), query, "found similar chunks");
                Ok(hits)
            }
            Err(error) => self.degrade(error, "similarity search failed"),
        }
    }

    async fn similar(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        let vector = self.embedder.embed(query).await?;
        let points = self.store.nearest_neighbors(&vector, limit).await?;

        let mut hits = points
            .into_iter()
            .map(|point| SearchHit {
                id: point.id,
                score: Some(point.score),
                payload: point.payload,
            })
            .collect::<Vec<_>>();

        sort_by_score(&mut hits);
        Ok(hits)
    }

    /// Chunks matching every supplied filter, in document order. At least one
    /// filter must be set; that check is never suppressed.
    pub async fn filtered_search(
        &self,
        filters: &SearchFilters,
        limit: Option<usize>,
    ) -> Result<Vec<SearchHit>, SearchError> {
        if filters.is_empty() {
            let error = SearchError::InvalidArgument(
                "at least one filter (chapter, heading, subheading, page_number) must be provided"
                    .to_string(),
            );
            warn!(%error, "invalid filter parameters");
            return Err(error);
        }

        let limit = limit.unwrap_or(self.config.filter_limit);
        info!(?filters, limit, "searching with filters");

        let filter = build_filter(filters);
        match self.store.scroll_with_filter(&filter, limit).await {
            Ok(points) => {
                let mut hits = points
                    .into_iter()
                    .map(|point| SearchHit {
                        id: point.id,
                        score: None,
                        payload: point.payload,
                    })
                    .collect::<Vec<_>>();
                sort_by_chunk_order(&mut hits);
                info!(hit_count = hits.len(), "found filtered chunks");
                Ok(hits)
            }
            Err(error) => self.degrade(error, "filtered search failed"),
        }
    }

    fn degrade(&self, error: SearchError, message: &str) -> Result<Vec<SearchHit>, SearchError> {
        match self.config.failure_mode {
            FailureMode::Degrade => {
                warn!(%error, "{message}, returning no results");
                Ok(Vec::new())
            }
            FailureMode::Strict => Err(error),
        }
    }
}

pub fn build_filter(filters: &SearchFilters) -> PayloadFilter {
    let mut filter = PayloadFilter::default();
    for (key, value) in [
        ("chapter", &filters.chapter),
        ("heading", &filters.heading),
        ("subheading", &filters.subheading),
    ] {
        if let Some(text) = non_blank(value) {
            filter = filter.text(key, text);
        }
    }
    if let Some(page) = filters.page_number {
        filter = filter.integer("page_number", i64::from(page));
    }
    filter
}

pub fn sort_by_score(hits: &mut [SearchHit]) {
    hits.sort_by(|left, right| {
        let left = left.score.unwrap_or(f64::NEG_INFINITY);
        let right = right.score.unwrap_or(f64::NEG_INFINITY);
        right.total_cmp(&left)
    });
}

/// Ascending by [`chunk_order`]; hits without one go last, in their
/// original relative order.
pub fn sort_by_chunk_order(hits: &mut [SearchHit]) {
    hits.sort_by(|left, right| {
        match (chunk_order(&left.payload), chunk_order(&right.payload)) {
            (Some(left), Some(right)) => left.cmp(&right),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

/// The value of the first [`CHUNK_ORDER_KEYS`] entry present in `payload`.
/// Integers are taken as-is and strings are parsed; anything else, or a
/// string that does not parse, counts as no order.
pub fn chunk_order(payload: &Payload) -> Option<i64> {
    let value = CHUNK_ORDER_KEYS
        .iter()
        .find_map(|key| payload.get(*key).filter(|value| !value.is_null()))?;

    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbedError;
    use crate::store::{Distance, RetrievedPoint, ScoredPoint, StorePoint};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        scored: Vec<ScoredPoint>,
        retrieved: Vec<RetrievedPoint>,
        fail: bool,
        filters: Mutex<Vec<(PayloadFilter, usize)>>,
        limits: Mutex<Vec<usize>>,
    }

    impl FakeStore {
        fn unavailable(&self) -> SearchError {
            SearchError::BackendResponse {
                backend: "fake".to_string(),
                details: "503 Service Unavailable".to_string(),
            }
        }
    }

    #[async_trait]
    impl VectorStore for FakeStore {
        async fn collection_exists(&self) -> Result<bool, SearchError> {
            Ok(true)
        }

        async fn create_collection(&self, _: usize, _: Distance) -> Result<(), SearchError> {
            Ok(())
        }

        async fn delete_all_points(&self) -> Result<(), SearchError> {
            Ok(())
        }

        async fn upsert(&self, _points: Vec<StorePoint>) -> Result<(), SearchError> {
            Ok(())
        }

        async fn nearest_neighbors(
            &self,
            _vector: &[f32],
            limit: usize,
        ) -> Result<Vec<ScoredPoint>, SearchError> {
            self.limits.lock().unwrap().push(limit);
            if self.fail {
                return Err(self.unavailable());
            }
            Ok(self.scored.clone())
        }

        async fn scroll_with_filter(
            &self,
            filter: &PayloadFilter,
            limit: usize,
        ) -> Result<Vec<RetrievedPoint>, SearchError> {
            self.filters.lock().unwrap().push((filter.clone(), limit));
            if self.fail {
                return Err(self.unavailable());
            }
            Ok(self.retrieved.clone())
        }
    }

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn dimensions(&self) -> usize {
            2
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            Ok(vec![0.6, 0.8])
        }
    }

    fn payload(value: serde_json::Value) -> Payload {
        value.as_object().cloned().unwrap_or_default()
    }

    fn retrieved(id: &str, value: serde_json::Value) -> RetrievedPoint {
        RetrievedPoint {
            id: id.to_string(),
            payload: payload(value),
        }
    }

    fn service(store: FakeStore, mode: FailureMode) -> RetrievalService<FakeStore, FixedEmbedder> {
        RetrievalService::new(
            store,
            FixedEmbedder,
            RetrievalConfig {
                failure_mode: mode,
                ..RetrievalConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn similarity_results_are_sorted_by_descending_score() {
        let store = FakeStore {
            scored: vec![
                ScoredPoint {
                    id: "low".to_string(),
                    score: 0.2,
                    payload: Payload::new(),
                },
                ScoredPoint {
                    id: "high".to_string(),
                    score: 0.9,
                    payload: Payload::new(),
                },
                ScoredPoint {
                    id: "mid".to_string(),
                    score: 0.5,
                    payload: Payload::new(),
                },
            ],
            ..Default::default()
        };
        let service = service(store, FailureMode::Degrade);

        let hits = service.similarity_search("iron vow", None).await.unwrap();

        let ids = hits.iter().map(|hit| hit.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["high", "mid", "low"]);
        assert_eq!(hits[0].score, Some(0.9));
        assert_eq!(*service.store.limits.lock().unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn similarity_backend_failure_degrades_to_empty() {
        let store = FakeStore {
            fail: true,
            ..Default::default()
        };
        let service = service(store, FailureMode::Degrade);

        let hits = service.similarity_search("anything", Some(5)).await.unwrap();

        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn similarity_backend_failure_surfaces_in_strict_mode() {
        let store = FakeStore {
            fail: true,
            ..Default::default()
        };
        let service = service(store, FailureMode::Strict);

        let result = service.similarity_search("anything", Some(5)).await;

        assert!(matches!(result, Err(SearchError::BackendResponse { .. })));
    }

    #[tokio::test]
    async fn filtered_search_without_filters_is_rejected() {
        let service = service(FakeStore::default(), FailureMode::Degrade);
        let filters = SearchFilters {
            chapter: Some("  ".to_string()),
            heading: Some(String::new()),
            subheading: None,
            page_number: None,
        };

        let result = service.filtered_search(&filters, None).await;

        assert!(matches!(result, Err(SearchError::InvalidArgument(_))));
        assert!(service.store.filters.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn filtered_search_with_one_filter_succeeds() {
        let store = FakeStore {
            retrieved: vec![retrieved("a", json!({ "chunk_index": 1 }))],
            ..Default::default()
        };
        let service = service(store, FailureMode::Degrade);
        let filters = SearchFilters {
            page_number: Some(7),
            ..Default::default()
        };

        let hits = service.filtered_search(&filters, None).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, None);
        let recorded = service.store.filters.lock().unwrap().clone();
        assert_eq!(
            recorded,
            vec![(PayloadFilter::default().integer("page_number", 7), 50)]
        );
    }

    #[tokio::test]
    async fn filtered_search_combines_supplied_fields() {
        let service = service(FakeStore::default(), FailureMode::Degrade);
        let filters = SearchFilters {
            chapter: Some("Moves".to_string()),
            heading: None,
            subheading: Some("Face Danger".to_string()),
            page_number: Some(3),
        };

        service.filtered_search(&filters, Some(10)).await.unwrap();

        let recorded = service.store.filters.lock().unwrap().clone();
        let expected = PayloadFilter::default()
            .text("chapter", "Moves")
            .text("subheading", "Face Danger")
            .integer("page_number", 3);
        assert_eq!(recorded, vec![(expected, 10)]);
    }

    #[tokio::test]
    async fn filtered_results_follow_chunk_order() {
        let store = FakeStore {
            retrieved: vec![
                retrieved("none", json!({ "content": "no order" })),
                retrieved("nine", json!({ "index": 9 })),
                retrieved("seven", json!({ "chunk_index": "7" })),
                retrieved("two", json!({ "chunkIndex": 2 })),
            ],
            ..Default::default()
        };
        let service = service(store, FailureMode::Degrade);
        let filters = SearchFilters {
            chapter: Some("Moves".to_string()),
            ..Default::default()
        };

        let hits = service.filtered_search(&filters, None).await.unwrap();

        let ids = hits.iter().map(|hit| hit.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["two", "seven", "nine", "none"]);
    }

    #[tokio::test]
    async fn filtered_backend_failure_follows_failure_mode() {
        let filters = SearchFilters {
            chapter: Some("Moves".to_string()),
            ..Default::default()
        };

        let degraded = service(
            FakeStore {
                fail: true,
                ..Default::default()
            },
            FailureMode::Degrade,
        );
        assert!(degraded.filtered_search(&filters, None).await.unwrap().is_empty());

        let strict = service(
            FakeStore {
                fail: true,
                ..Default::default()
            },
            FailureMode::Strict,
        );
        assert!(strict.filtered_search(&filters, None).await.is_err());
    }

    #[test]
    fn chunk_order_uses_first_present_key() {
        assert_eq!(chunk_order(&payload(json!({ "chunk_index": "7" }))), Some(7));
        assert_eq!(chunk_order(&payload(json!({ "index": 9 }))), Some(9));
        assert_eq!(
            chunk_order(&payload(json!({ "chunkIndex": 1, "chunk_index": 5 }))),
            Some(1)
        );
        assert_eq!(chunk_order(&payload(json!({ "sequence": 4, "order": "x" }))), None);
        assert_eq!(chunk_order(&payload(json!({ "order": null, "sequence": 4 }))), Some(4));
        assert_eq!(chunk_order(&payload(json!({ "index": 2.5 }))), None);
        assert_eq!(chunk_order(&payload(json!({ "content": "x" }))), None);
    }

    #[test]
    fn unordered_hits_keep_relative_order_at_the_end() {
        let mut hits = vec![
            SearchHit {
                id: "b".to_string(),
                score: None,
                payload: Payload::new(),
            },
            SearchHit {
                id: "first".to_string(),
                score: None,
                payload: payload(json!({ "chunk_index": 0 })),
            },
            SearchHit {
                id: "c".to_string(),
                score: None,
                payload: Payload::new(),
            },
        ];

        sort_by_chunk_order(&mut hits);

        let ids = hits.iter().map(|hit| hit.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["first", "b", "c"]);
    }
}
