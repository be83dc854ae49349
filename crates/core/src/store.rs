use serde_json::{Map, Value};

pub type Payload = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    Cosine,
}

impl Distance {
    pub fn as_str(self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
        }
    }
}

/// A point as written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StorePoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// A nearest-neighbor result.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f64,
    pub payload: Payload,
}

/// A point returned by a filtered scroll; carries no score.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedPoint {
    pub id: String,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchValue {
    /// Full-text match on a string field.
    Text(String),
    /// Exact match on an integer field.
    Integer(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    pub key: String,
    pub matcher: MatchValue,
}

/// Conjunction of field conditions. An empty filter matches every point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayloadFilter {
    pub must: Vec<FieldCondition>,
}

impl PayloadFilter {
    pub fn text(mut self, key: &str, text: &str) -> Self {
        self.must.push(FieldCondition {
            key: key.to_string(),
            matcher: MatchValue::Text(text.to_string()),
        });
        self
    }

    pub fn integer(mut self, key: &str, value: i64) -> Self {
        self.must.push(FieldCondition {
            key: key.to_string(),
            matcher: MatchValue::Integer(value),
        });
        self
    }
}
