//! Two-tier embedding cache (spec §4.2).
//!
//! Tier 1 is an in-process bounded LRU keyed by the normalized content
//! hash, grounded on the teacher's `embedding-service/src/cache.rs`
//! `EmbeddingCache` (`Arc<RwLock<LruCache<...>>>` plus a hit/miss counter).
//! Tier 2 is the persisted `embedding_cache` table, looked up via
//! `aegis-database`'s pool rather than the teacher's on-disk model cache
//! (not applicable here — the provider is an HTTP API, not a loaded model).

use crate::error::EmbeddingResult;
use crate::types::EmbeddingVector;
use lru::LruCache;
use sha2::{Digest, Sha256};
use sqlx::{PgExecutor, PgPool};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// `sha256` of the trimmed, lowercased text, used as the cache key in both
/// tiers and as the dedup key story for `Memory.content_hash` upstream.
pub fn normalize_and_hash(text: &str) -> String {
    let normalized = text.trim().to_lowercase();
    format!("{:x}", Sha256::digest(normalized.as_bytes()))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Tier1 {
    cache: LruCache<String, EmbeddingVector>,
    hits: u64,
    misses: u64,
}

/// In-process Tier-1 LRU, guarded by a lock short enough that contention
/// stays negligible under expected QPS (spec §5).
pub struct EmbeddingCache {
    inner: Arc<RwLock<Tier1>>,
    pool: PgPool,
}

impl EmbeddingCache {
    pub fn new(pool: PgPool, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: Arc::new(RwLock::new(Tier1 {
                cache: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            })),
            pool,
        }
    }

    /// Tier 1 → Tier 2 lookup, in that order. Does not call the provider.
    pub async fn get(&self, hash: &str) -> EmbeddingResult<Option<EmbeddingVector>> {
        {
            let mut tier1 = self.inner.write().await;
            if let Some(vector) = tier1.cache.get(hash) {
                tier1.hits += 1;
                return Ok(Some(vector.clone()));
            }
        }

        let row: Option<(pgvector::Vector,)> =
            sqlx::query_as("SELECT vector FROM embedding_cache WHERE hash = $1")
                .bind(hash)
                .fetch_optional(&self.pool)
                .await?;

        let mut tier1 = self.inner.write().await;
        match row {
            Some((vector,)) => {
                let vector: EmbeddingVector = vector.to_vec();
                tier1.cache.put(hash.to_string(), vector.clone());
                tier1.hits += 1;
                Ok(Some(vector))
            }
            None => {
                tier1.misses += 1;
                Ok(None)
            }
        }
    }

    /// Write-through to both tiers. The Tier-2 insert runs against whatever
    /// executor the caller passes, so a caller mid-transaction can share
    /// its commit/rollback boundary (spec §4.2: "commit the Tier-2 insert
    /// in the current transaction") rather than the insert landing durably
    /// ahead of a row that later rolls back.
    pub async fn put<'e, E>(&self, executor: E, hash: &str, vector: &EmbeddingVector) -> EmbeddingResult<()>
    where
        E: PgExecutor<'e>,
    {
        self.inner
            .write()
            .await
            .cache
            .put(hash.to_string(), vector.clone());

        sqlx::query(
            r#"
            INSERT INTO embedding_cache (hash, vector) VALUES ($1, $2)
            ON CONFLICT (hash) DO NOTHING
            "#,
        )
        .bind(hash)
        .bind(pgvector::Vector::from(vector.clone()))
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn stats(&self) -> CacheStats {
        let tier1 = self.inner.read().await;
        CacheStats {
            hits: tier1.hits,
            misses: tier1.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_normalizes_case_and_whitespace() {
        assert_eq!(normalize_and_hash("  Hello World  "), normalize_and_hash("hello world"));
        assert_ne!(normalize_and_hash("hello"), normalize_and_hash("world"));
    }

    #[test]
    fn hit_rate_is_zero_with_no_samples() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn hit_rate_computes_ratio() {
        let stats = CacheStats { hits: 3, misses: 1 };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }
}
