use crate::store::{
    Distance, MatchValue, Payload, PayloadFilter, RetrievedPoint, ScoredPoint, StorePoint,
};
use crate::traits::VectorStore;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tracing::info;
use url::Url;

const BACKEND: &str = "qdrant";

pub struct QdrantStore {
    base: Url,
    collection: String,
    client: Client,
}

impl QdrantStore {
    pub fn new(endpoint: &str, collection: impl Into<String>) -> Result<Self, SearchError> {
        let mut base = Url::parse(endpoint)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            base,
            collection: collection.into(),
            client: Client::new(),
        })
    }

    fn url(&self, suffix: &str) -> Result<Url, SearchError> {
        let path = if suffix.is_empty() {
            format!("collections/{}", self.collection)
        } else {
            format!("collections/{}/{}", self.collection, suffix)
        };
        Ok(self.base.join(&path)?)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, SearchError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("{status}: {body}"),
            });
        }
        parse_body(&response.text().await?)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn collection_exists(&self) -> Result<bool, SearchError> {
        let response = self.client.get(self.url("")?).send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(SearchError::BackendResponse {
                backend: BACKEND.to_string(),
                details: status.to_string(),
            }),
        }
    }

    async fn create_collection(
        &self,
        dimensions: usize,
        distance: Distance,
    ) -> Result<(), SearchError> {
        let body = json!({
            "vectors": {
                "size": dimensions,
                "distance": distance.as_str(),
            }
        });
        self.send(self.client.put(self.url("")?).json(&body)).await?;
        info!(collection = %self.collection, dimensions, "created qdrant collection");
        Ok(())
    }

    async fn delete_all_points(&self) -> Result<(), SearchError> {
        let mut url = self.url("points/delete")?;
        url.set_query(Some("wait=true"));
        self.send(self.client.post(url).json(&json!({ "filter": {} })))
            .await?;
        Ok(())
    }

    async fn upsert(&self, points: Vec<StorePoint>) -> Result<(), SearchError> {
        if points.is_empty() {
            return Ok(());
        }

        let points = points.iter().map(point_to_json).collect::<Vec<_>>();
        let mut url = self.url("points")?;
        url.set_query(Some("wait=true"));
        self.send(self.client.put(url).json(&json!({ "points": points })))
            .await?;
        Ok(())
    }

    async fn nearest_neighbors(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, SearchError> {
        let body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        let parsed = self
            .send(self.client.post(self.url("points/search")?).json(&body))
            .await?;
        parse_scored_points(&parsed)
    }

    async fn scroll_with_filter(
        &self,
        filter: &PayloadFilter,
        limit: usize,
    ) -> Result<Vec<RetrievedPoint>, SearchError> {
        let body = json!({
            "filter": filter_to_json(filter),
            "limit": limit,
            "with_payload": true,
            "with_vector": false,
        });
        let parsed = self
            .send(self.client.post(self.url("points/scroll")?).json(&body))
            .await?;
        parse_retrieved_points(&parsed)
    }
}

fn parse_body(body: &str) -> Result<Value, SearchError> {
    Ok(serde_json::from_str(body)?)
}

fn point_to_json(point: &StorePoint) -> Value {
    json!({
        "id": point.id,
        "vector": point.vector,
        "payload": point.payload,
    })
}

fn filter_to_json(filter: &PayloadFilter) -> Value {
    let must = filter
        .must
        .iter()
        .map(|condition| {
            let matcher = match &condition.matcher {
                MatchValue::Text(text) => json!({ "text": text }),
                MatchValue::Integer(value) => json!({ "value": value }),
            };
            json!({ "key": condition.key, "match": matcher })
        })
        .collect::<Vec<_>>();
    json!({ "must": must })
}

fn point_id(value: &Value) -> String {
    match value {
        Value::String(id) => id.clone(),
        Value::Number(id) => id.to_string(),
        _ => String::new(),
    }
}

fn point_payload(value: &Value) -> Payload {
    value
        .get("payload")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn malformed(details: &str) -> SearchError {
    SearchError::BackendResponse {
        backend: BACKEND.to_string(),
        details: details.to_string(),
    }
}

fn parse_scored_points(parsed: &Value) -> Result<Vec<ScoredPoint>, SearchError> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("search response has no result array"))?;

    Ok(hits
        .iter()
        .map(|hit| ScoredPoint {
            id: hit.get("id").map(point_id).unwrap_or_default(),
            score: hit.get("score").and_then(Value::as_f64).unwrap_or(0.0),
            payload: point_payload(hit),
        })
        .collect())
}

fn parse_retrieved_points(parsed: &Value) -> Result<Vec<RetrievedPoint>, SearchError> {
    let points = parsed
        .pointer("/result/points")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("scroll response has no result.points array"))?;

    Ok(points
        .iter()
        .map(|point| RetrievedPoint {
            id: point.get("id").map(point_id).unwrap_or_default(),
            payload: point_payload(point),
        })
        .collect())
}
