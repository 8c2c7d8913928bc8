//! External embedding provider contract and implementations.

use crate::error::{EmbeddingError, EmbeddingResult};
use crate::types::{EmbeddingConfig, EmbeddingVector};
use async_trait::async_trait;
use tracing::warn;

/// An external embedding provider: text in, fixed-width vectors out,
/// preserving input order (spec §4.2).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn generate_embeddings(&self, texts: &[String]) -> EmbeddingResult<Vec<EmbeddingVector>>;
    fn dimension(&self) -> usize;
    fn model_name(&self) -> &str;
    async fn health_check(&self) -> bool;
}

/// OpenAI-compatible HTTP embedding provider with bounded exponential
/// back-off on transient failures (spec §4.2's "retried with exponential
/// back-off up to a bounded cap").
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model_name: String,
    dimension: usize,
    max_retries: u32,
    retry_base_delay_ms: u64,
}

impl HttpEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> EmbeddingResult<Self> {
        if config.api_key.is_empty() {
            return Err(EmbeddingError::MissingCredential(
                "OPENAI_API_KEY (or equivalent) is required for writes".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| EmbeddingError::ExternalServiceUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.provider_url.clone(),
            api_key: config.api_key.clone(),
            model_name: config.model_name.clone(),
            dimension: config.dimension,
            max_retries: config.max_retries,
            retry_base_delay_ms: config.retry_base_delay_ms,
        })
    }

    async fn call_once(&self, texts: &[String]) -> EmbeddingResult<Vec<EmbeddingVector>> {
        let body = serde_json::json!({
            "model": self.model_name,
            "input": texts,
        });

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbeddingError::ExternalServiceUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EmbeddingError::ExternalServiceUnavailable(format!(
                "provider returned status {}",
                response.status()
            )));
        }

        let parsed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

        let data = parsed["data"]
            .as_array()
            .ok_or_else(|| EmbeddingError::MalformedResponse("missing `data` array".to_string()))?;

        let mut vectors = Vec::with_capacity(data.len());
        for item in data {
            let embedding = item["embedding"]
                .as_array()
                .ok_or_else(|| EmbeddingError::MalformedResponse("missing `embedding`".to_string()))?;
            let vector: EmbeddingVector = embedding.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect();
            if vector.len() != self.dimension {
                return Err(EmbeddingError::MalformedResponse(format!(
                    "expected dimension {}, got {}",
                    self.dimension,
                    vector.len()
                )));
            }
            vectors.push(vector);
        }

        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn generate_embeddings(&self, texts: &[String]) -> EmbeddingResult<Vec<EmbeddingVector>> {
        let mut attempt = 0;
        loop {
            match self.call_once(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(err) if attempt < self.max_retries => {
                    let delay = self.retry_base_delay_ms * 2u64.pow(attempt);
                    warn!(attempt, delay_ms = delay, error = %err, "embedding provider call failed, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn health_check(&self) -> bool {
        self.call_once(&["healthcheck".to_string()]).await.is_ok()
    }
}

/// Deterministic provider for tests and local development without a
/// configured provider credential.
pub struct DummyEmbeddingProvider {
    dimension: usize,
}

impl DummyEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for DummyEmbeddingProvider {
    async fn generate_embeddings(&self, texts: &[String]) -> EmbeddingResult<Vec<EmbeddingVector>> {
        Ok(texts
            .iter()
            .map(|text| {
                use std::hash::{Hash, Hasher};
                let mut hasher = std::collections::hash_map::DefaultHasher::new();
                text.hash(&mut hasher);
                let hash = hasher.finish();
                (0..self.dimension)
                    .map(|i| {
                        let seed = hash.wrapping_add(i as u64);
                        (seed % 1000) as f32 / 1000.0 * 2.0 - 1.0
                    })
                    .collect()
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "dummy"
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dummy_provider_is_deterministic() {
        let provider = DummyEmbeddingProvider::new(8);
        let a = provider
            .generate_embeddings(&["hello".to_string()])
            .await
            .unwrap();
        let b = provider
            .generate_embeddings(&["hello".to_string()])
            .await
            .unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn dummy_provider_preserves_order() {
        let provider = DummyEmbeddingProvider::new(4);
        let out = provider
            .generate_embeddings(&["a".to_string(), "b".to_string(), "c".to_string()])
            .await
            .unwrap();
        assert_eq!(out.len(), 3);
        assert_ne!(out[0], out[1]);
    }
}
