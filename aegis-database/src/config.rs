use crate::error::{StoreError, StoreResult};
use std::time::Duration;

/// Connection and pool-sizing configuration for the persistent store.
///
/// Mirrors the config keys documented in spec.md §6 (`DATABASE_URL`,
/// `DATABASE_READ_REPLICA_URL`, `DB_POOL_SIZE`, `DB_MAX_OVERFLOW`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub read_replica_url: Option<String>,
    pub pool_size: u32,
    pub max_overflow: u32,
    pub connect_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
    pub max_lifetime_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://postgres@localhost:5432/aegis".to_string(),
            read_replica_url: None,
            pool_size: 10,
            max_overflow: 5,
            connect_timeout_seconds: 30,
            idle_timeout_seconds: 600,
            max_lifetime_seconds: 3600,
        }
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, std::env::VarError> {
        let mut cfg = Self::default();
        if let Ok(url) = std::env::var("DATABASE_URL") {
            cfg.url = url;
        }
        cfg.read_replica_url = std::env::var("DATABASE_READ_REPLICA_URL").ok();
        if let Ok(v) = std::env::var("DB_POOL_SIZE") {
            cfg.pool_size = v.parse().unwrap_or(cfg.pool_size);
        }
        if let Ok(v) = std::env::var("DB_MAX_OVERFLOW") {
            cfg.max_overflow = v.parse().unwrap_or(cfg.max_overflow);
        }
        Ok(cfg)
    }

    /// Field-by-field bounds validation, mirroring the teacher's manual
    /// `validate()` style rather than a generic schema validator.
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("DATABASE_URL cannot be empty".to_string());
        }
        if !self.url.starts_with("postgres://") && !self.url.starts_with("postgresql://") {
            return Err("DATABASE_URL must be a postgres:// connection string".to_string());
        }
        if self.pool_size == 0 {
            return Err("DB_POOL_SIZE must be at least 1".to_string());
        }
        if self.pool_size > 1000 {
            return Err("DB_POOL_SIZE too large (max recommended: 1000)".to_string());
        }
        if self.connect_timeout_seconds == 0 || self.connect_timeout_seconds > 300 {
            return Err("connect timeout must be in (0, 300] seconds".to_string());
        }
        Ok(())
    }

    /// Total connections this process may open against the store, used by
    /// callers to cross-check against `store_max_connections` (spec §5).
    pub fn max_connections(&self) -> u32 {
        self.pool_size + self.max_overflow
    }

    pub async fn create_pool(&self) -> StoreResult<sqlx::PgPool> {
        self.validate().map_err(StoreError::Config)?;
        sqlx::postgres::PgPoolOptions::new()
            .min_connections(1)
            .max_connections(self.max_connections())
            .acquire_timeout(Duration::from_secs(self.connect_timeout_seconds))
            .idle_timeout(Some(Duration::from_secs(self.idle_timeout_seconds)))
            .max_lifetime(Some(Duration::from_secs(self.max_lifetime_seconds)))
            .connect(&self.url)
            .await
            .map_err(StoreError::from)
    }

    pub async fn create_read_pool(&self) -> StoreResult<Option<sqlx::PgPool>> {
        match &self.read_replica_url {
            None => Ok(None),
            Some(url) => {
                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(self.max_connections())
                    .connect(url)
                    .await?;
                Ok(Some(pool))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(DatabaseConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_empty_url() {
        let mut cfg = DatabaseConfig::default();
        cfg.url = String::new();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_postgres_scheme() {
        let mut cfg = DatabaseConfig::default();
        cfg.url = "mysql://localhost/aegis".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn max_connections_sums_pool_and_overflow() {
        let cfg = DatabaseConfig {
            pool_size: 10,
            max_overflow: 5,
            ..DatabaseConfig::default()
        };
        assert_eq!(cfg.max_connections(), 15);
    }
}
