//! HTTP embedding-service client

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

use super::{EmbeddingService, SearchError};
use crate::model::EmbeddingConfig;

const USER_AGENT: &str = "conforma-engine/0.1";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client for an OpenAI-compatible embeddings endpoint.
pub struct HttpEmbeddingService {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    model: String,
}

impl HttpEmbeddingService {
    pub fn new(config: &EmbeddingConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl EmbeddingService for HttpEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header("User-Agent", USER_AGENT)
            .json(&json!({
                "model": self.model,
                "input": text,
            }));
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                SearchError::Unavailable(e.to_string())
            } else {
                SearchError::HttpError(e)
            }
        })?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SearchError::RateLimited);
        }

        if !response.status().is_success() {
            return Err(SearchError::Unavailable(format!(
                "HTTP {} from embedding service",
                response.status()
            )));
        }

        let payload: Value = response.json().await?;
        parse_embedding(&payload)
    }
}

fn parse_embedding(payload: &Value) -> Result<Vec<f32>, SearchError> {
    payload
        .get("data")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .and_then(|row| row.get("embedding"))
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_f64)
                .map(|v| v as f32)
                .collect()
        })
        .ok_or_else(|| SearchError::ParseError("response missing embedding vector".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_embedding_vector() {
        let payload = json!({
            "data": [{ "embedding": [0.25, -0.5, 1.0] }]
        });
        let vector = parse_embedding(&payload).unwrap();
        assert_eq!(vector, vec![0.25, -0.5, 1.0]);
    }

    #[test]
    fn missing_vector_is_a_parse_error() {
        let err = parse_embedding(&json!({"data": []})).unwrap_err();
        assert!(matches!(err, SearchError::ParseError(_)));
    }
}
