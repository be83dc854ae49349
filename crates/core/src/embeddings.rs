use crate::config::EmbeddingConfig;
use crate::error::EmbedError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

#[async_trait]
impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        (**self).embed(text).await
    }
}

/// Picks the HTTP embedder when an endpoint is configured, the local n-gram
/// embedder otherwise.
pub fn embedder_from_config(config: &EmbeddingConfig) -> Box<dyn Embedder> {
    match &config.endpoint {
        Some(endpoint) if !endpoint.trim().is_empty() => Box::new(HttpEmbedder::new(
            endpoint.trim(),
            config.api_key.clone(),
            config.model.clone(),
            config.dimensions,
        )),
        _ => Box::new(CharacterNgramEmbedder {
            dimensions: config.dimensions,
        }),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return Ok(vector);
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        Ok(vector)
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Data { data: Vec<EmbeddingDatum> },
    Single { embedding: Vec<f32> },
    Batch(Vec<Vec<f32>>),
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Calls a remote embedding endpoint, one request per text.
pub struct HttpEmbedder {
    endpoint: String,
    api_key: Option<String>,
    model: Option<String>,
    dimensions: usize,
    client: Client,
}

impl HttpEmbedder {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        model: Option<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key,
            model,
            dimensions,
            client: Client::new(),
        }
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let payload = EmbeddingRequest {
            input: text,
            model: self.model.as_deref(),
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(EmbedError::Response {
                endpoint: self.endpoint.clone(),
                details: response.status().to_string(),
            });
        }

        let parsed: EmbeddingResponse = response.json().await?;
        response_to_vector(parsed, &self.endpoint)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.request(text).await
    }
}

fn response_to_vector(response: EmbeddingResponse, endpoint: &str) -> Result<Vec<f32>, EmbedError> {
    let vector = match response {
        EmbeddingResponse::Data { data } => data.into_iter().next().map(|datum| datum.embedding),
        EmbeddingResponse::Single { embedding } => Some(embedding),
        EmbeddingResponse::Batch(batch) => batch.into_iter().next(),
    };

    vector
        .filter(|vector| !vector.is_empty())
        .ok_or_else(|| EmbedError::Response {
            endpoint: endpoint.to_string(),
            details: "response carried no embedding".to_string(),
        })
}
