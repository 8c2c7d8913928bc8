use crate::config::DatabaseConfig;
use crate::error::StoreResult;
use sqlx::PgPool;

/// Holds the primary read/write pool and an optional read-replica pool.
///
/// Mirrors the teacher's `enable_read_write_splitting` / `read_replicas`
/// fields on `DatabaseConfig`, simplified to a single optional replica pool
/// since the spec only documents one `DATABASE_READ_REPLICA_URL`.
#[derive(Clone)]
pub struct Store {
    pub write_pool: PgPool,
    pub read_pool: PgPool,
}

impl Store {
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let write_pool = config.create_pool().await?;
        let read_pool = config
            .create_read_pool()
            .await?
            .unwrap_or_else(|| write_pool.clone());
        Ok(Self { write_pool, read_pool })
    }

    /// Liveness: the process is up. Does not touch the database.
    pub fn is_alive(&self) -> bool {
        true
    }

    /// Readiness: the database is reachable.
    pub async fn is_ready(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.write_pool).await.is_ok()
    }

    pub async fn verify_pgvector(&self) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM pg_extension WHERE extname = 'vector')",
        )
        .fetch_one(&self.write_pool)
        .await?;
        Ok(exists)
    }
}
