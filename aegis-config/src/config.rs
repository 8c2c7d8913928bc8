//! The top-level configuration aggregate (spec §6; SUPPLEMENT in the
//! expanded spec): one struct-of-structs, each member owning its own
//! `from_env`/`Default`, the way the teacher's `agent-memory` config
//! types compose (`EmbeddingConfig::default()`, `GraphConfig::default()`,
//! ...).

use crate::environment::AegisEnv;
use crate::error::{ConfigError, ConfigResult};
use crate::server::ServerConfig;
use aegis_auth::AuthConfig;
use aegis_database::DatabaseConfig;
use aegis_embedding::EmbeddingConfig;
use aegis_ratelimit::RateLimitConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AegisConfig {
    pub environment: AegisEnv,
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub rate_limit: RateLimitConfig,
    #[serde(skip)]
    pub auth: AuthConfig,
    // `AuthConfig` holds a bearer token; it is deliberately excluded from
    // `Serialize`/`Deserialize` so a dumped `AegisConfig` never leaks it.
    pub server: ServerConfig,
    /// `REDIS_URL` (spec §6): presence selects the distributed rate-limit
    /// backend over the in-process one.
    pub redis_url: Option<String>,
}

impl Default for AegisConfig {
    fn default() -> Self {
        Self {
            environment: AegisEnv::default(),
            database: DatabaseConfig::default(),
            embedding: EmbeddingConfig::default(),
            rate_limit: RateLimitConfig::default(),
            auth: AuthConfig::LegacySingleKey { token: String::new() },
            server: ServerConfig::default(),
            redis_url: None,
        }
    }
}

impl AegisConfig {
    /// Reads every documented config key (spec §6) from the process
    /// environment. Each member's own `from_env` owns the exact variable
    /// names it reads; this just assembles them.
    pub fn from_env() -> Self {
        Self {
            environment: AegisEnv::from_env(),
            database: DatabaseConfig::from_env().unwrap_or_default(),
            embedding: EmbeddingConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
            auth: AuthConfig::from_env(),
            server: ServerConfig::from_env(),
            redis_url: std::env::var("REDIS_URL").ok(),
        }
    }

    /// `None` selects the in-process rate-limiter backend; `Some(url)`
    /// selects the distributed Redis backend (spec §6: `REDIS_URL?`).
    pub fn rate_limit_backend_url(&self) -> Option<&str> {
        self.redis_url.as_deref()
    }

    /// Validates every member, failing on the first error rather than
    /// collecting all of them — matching the teacher's fail-fast
    /// `validate()` convention (`database/src/config.rs`).
    pub fn validate(&self) -> ConfigResult<()> {
        self.database
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("database: {e}")))?;
        self.embedding
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("embedding: {e}")))?;
        self.rate_limit
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("rate_limit: {e}")))?;
        self.server
            .validate_fields()
            .map_err(|e| ConfigError::Invalid(format!("server: {e}")))?;

        if matches!(self.environment, AegisEnv::Production) && self.embedding.api_key.is_empty() {
            return Err(ConfigError::Invalid(
                "OPENAI_API_KEY must be set in production".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_fails_validation_without_embedding_credential() {
        assert!(AegisConfig::default().validate().is_err());
    }

    #[test]
    fn development_allows_missing_embedding_credential() {
        let mut cfg = AegisConfig::default();
        cfg.database.url = "postgres://localhost/aegis".to_string();
        cfg.embedding.api_key = "sk-test".to_string();
        assert!(cfg.validate().is_ok());
    }
}
