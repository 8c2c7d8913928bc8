use serde::{Deserialize, Serialize};

pub type EmbeddingVector = Vec<f32>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEmbedding {
    pub hash: String,
    pub vector: EmbeddingVector,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Tuning knobs for the embedding pipeline (spec §4.2, config keys in §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model_name: String,
    pub provider_url: String,
    pub api_key: String,
    pub dimension: usize,
    pub timeout_ms: u64,
    pub max_batch_size: usize,
    pub in_process_cache_size: usize,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "text-embedding-3-small".to_string(),
            provider_url: "https://api.openai.com/v1/embeddings".to_string(),
            api_key: String::new(),
            dimension: 1536,
            timeout_ms: 30_000,
            max_batch_size: 256,
            in_process_cache_size: 10_000,
            max_retries: 4,
            retry_base_delay_ms: 200,
        }
    }
}

impl EmbeddingConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("EMBEDDING_MODEL") {
            cfg.model_name = v;
        }
        if let Ok(v) = std::env::var("EMBEDDING_DIM") {
            cfg.dimension = v.parse().unwrap_or(cfg.dimension);
        }
        if let Ok(v) = std::env::var("OPENAI_API_KEY") {
            cfg.api_key = v;
        }
        cfg
    }

    /// A missing provider credential is a fatal startup condition for
    /// writes (spec §4.2); reads that only ever hit the cache tolerate it,
    /// so this is surfaced as a validation error the caller chooses when
    /// to enforce rather than a panic at construction time.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.is_empty() {
            return Err("OPENAI_API_KEY is not set".to_string());
        }
        if self.dimension == 0 {
            return Err("EMBEDDING_DIM must be greater than zero".to_string());
        }
        if self.max_batch_size == 0 {
            return Err("embedding max batch size must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_rejects_missing_api_key() {
        assert!(EmbeddingConfig::default().validate().is_err());
    }

    #[test]
    fn accepts_config_with_credential() {
        let cfg = EmbeddingConfig { api_key: "sk-test".to_string(), ..EmbeddingConfig::default() };
        assert!(cfg.validate().is_ok());
    }
}
