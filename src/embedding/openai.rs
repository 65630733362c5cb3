//! OpenAI-compatible `/embeddings` client.

use reqwest::blocking::Client;
use serde_json::{json, Value};

use crate::config::schema::EmbeddingConfig;
use crate::embedding::{check_dimension, EmbeddingProvider};
use crate::error::ProviderError;
use crate::http_client::{build_client, read_json};

pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    dimension: usize,
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig, api_key: String) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(config.timeout_ms)?,
            endpoint: format!("{}/embeddings", config.api_base.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
            dimension: config.dimension,
        })
    }

    fn request_body(&self, text: &str) -> Value {
        let mut body = json!({
            "model": self.model,
            "input": text,
        });
        // Only the v3 models accept a shortened output dimension.
        if self.model.starts_with("text-embedding-3") {
            body["dimensions"] = json!(self.dimension);
        }
        body
    }
}

/// Vectors from an embeddings response, in `index` order.
fn parse_embedding_response(json: &Value) -> Result<Vec<Vec<f32>>, ProviderError> {
    let data = json
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::InvalidResponse("missing data array".into()))?;

    let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
    for (fallback_index, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(Value::as_u64)
            .map(|v| v as usize)
            .unwrap_or(fallback_index);
        let values = item
            .get("embedding")
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::InvalidResponse("item missing embedding array".into()))?;
        let vector = values
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|n| n as f32)
                    .ok_or_else(|| ProviderError::InvalidResponse("non-numeric embedding value".into()))
            })
            .collect::<Result<Vec<f32>, _>>()?;
        indexed.push((index, vector));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

impl EmbeddingProvider for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(text))
            .send()?;
        let json = read_json(response)?;

        let vector = parse_embedding_response(&json)?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("empty data array".into()))?;
        check_dimension(&vector, self.dimension)?;
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder(model: &str) -> OpenAiEmbedder {
        let config = EmbeddingConfig {
            model: model.into(),
            dimension: 8,
            api_base: "https://example.invalid/v1/".into(),
            ..EmbeddingConfig::default()
        };
        OpenAiEmbedder::new(&config, "test-key".into()).unwrap()
    }

    #[test]
    fn parses_embeddings_in_index_order() {
        let json = json!({
            "data": [
                { "index": 1, "embedding": [2.0, 3.0] },
                { "index": 0, "embedding": [0.5, 1.5] }
            ]
        });
        let parsed = parse_embedding_response(&json).unwrap();
        assert_eq!(parsed, vec![vec![0.5, 1.5], vec![2.0, 3.0]]);
    }

    #[test]
    fn rejects_malformed_responses() {
        for bad in [
            json!({}),
            json!({ "data": [{ "index": 0 }] }),
            json!({ "data": [{ "embedding": ["x"] }] }),
        ] {
            assert!(matches!(
                parse_embedding_response(&bad),
                Err(ProviderError::InvalidResponse(_))
            ));
        }
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        assert_eq!(embedder("m").endpoint, "https://example.invalid/v1/embeddings");
    }

    #[test]
    fn v3_models_request_dimension() {
        let body = embedder("text-embedding-3-small").request_body("hi");
        assert_eq!(body["dimensions"], 8);
        assert_eq!(body["input"], "hi");
        let body = embedder("text-embedding-ada-002").request_body("hi");
        assert!(body.get("dimensions").is_none());
    }

    #[test]
    fn debug_hides_api_key() {
        let rendered = format!("{:?}", embedder("m"));
        assert!(!rendered.contains("test-key"));
    }
}
