//! Ordered, idempotent, checksum-tracked schema migrations.
//!
//! Grounded on the teacher's `database/src/migrations.rs` `MigrationManager`
//! (tracking table + checksum + apply-pending loop), adapted from an
//! on-disk migration directory to a fixed, compiled-in migration list (the
//! schema here is owned by this crate, not supplied by callers).

use crate::error::{StoreError, StoreResult};
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use tracing::{info, warn};

pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sql: String,
    pub down_sql: String,
}

/// Environment gates whether a behind schema fails startup (`production`)
/// or is applied in place (`development`), per spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaPolicy {
    Production,
    Development,
}

fn migrations(embedding_dim: u32) -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            name: "extensions_and_core_tables",
            sql: format!(
                r#"
                CREATE EXTENSION IF NOT EXISTS vector;
                CREATE EXTENSION IF NOT EXISTS pgcrypto;

                CREATE TABLE IF NOT EXISTS projects (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    name TEXT NOT NULL,
                    is_active BOOLEAN NOT NULL DEFAULT true,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
                );

                CREATE TABLE IF NOT EXISTS api_keys (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    key_hash TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    is_active BOOLEAN NOT NULL DEFAULT true,
                    expires_at TIMESTAMPTZ,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
                );

                CREATE TABLE IF NOT EXISTS memories (
                    id TEXT PRIMARY KEY,
                    project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    namespace TEXT NOT NULL DEFAULT 'default',
                    agent_id TEXT NOT NULL,
                    content TEXT NOT NULL,
                    content_hash TEXT NOT NULL,
                    embedding vector({embedding_dim}) NOT NULL,
                    scope TEXT NOT NULL,
                    memory_type TEXT NOT NULL DEFAULT 'standard',
                    is_deprecated BOOLEAN NOT NULL DEFAULT false,
                    superseded_by TEXT,
                    deprecation_reason TEXT,
                    helpful_votes BIGINT NOT NULL DEFAULT 0,
                    harmful_votes BIGINT NOT NULL DEFAULT 0,
                    ttl_seconds BIGINT,
                    expires_at TIMESTAMPTZ,
                    session_id TEXT,
                    entity_id TEXT,
                    sequence_number BIGINT,
                    metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    CHECK (helpful_votes >= 0),
                    CHECK (harmful_votes >= 0)
                );

                CREATE TABLE IF NOT EXISTS memory_shared_agents (
                    memory_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
                    project_id UUID NOT NULL,
                    namespace TEXT NOT NULL,
                    shared_agent_id TEXT NOT NULL,
                    PRIMARY KEY (memory_id, shared_agent_id)
                );

                CREATE TABLE IF NOT EXISTS vote_history (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    memory_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
                    voter_agent_id TEXT NOT NULL,
                    vote TEXT NOT NULL,
                    context TEXT,
                    task_id TEXT,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
                );

                CREATE TABLE IF NOT EXISTS session_progress (
                    session_id TEXT PRIMARY KEY,
                    project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    completed JSONB NOT NULL DEFAULT '[]'::jsonb,
                    in_progress JSONB NOT NULL DEFAULT '[]'::jsonb,
                    next JSONB NOT NULL DEFAULT '[]'::jsonb,
                    blocked JSONB NOT NULL DEFAULT '[]'::jsonb,
                    summary TEXT,
                    last_action TEXT,
                    status TEXT NOT NULL DEFAULT 'active',
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
                );

                CREATE TABLE IF NOT EXISTS feature_tracker (
                    feature_id TEXT PRIMARY KEY,
                    project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    description TEXT NOT NULL,
                    test_steps JSONB NOT NULL DEFAULT '[]'::jsonb,
                    passed_steps JSONB NOT NULL DEFAULT '[]'::jsonb,
                    status TEXT NOT NULL DEFAULT 'not_started',
                    passes BOOLEAN NOT NULL DEFAULT false,
                    failure_reason TEXT,
                    verified_by TEXT,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
                );

                CREATE TABLE IF NOT EXISTS ace_runs (
                    run_id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    agent_id TEXT NOT NULL,
                    task TEXT NOT NULL,
                    memories_used JSONB NOT NULL DEFAULT '[]'::jsonb,
                    outcome TEXT,
                    error_pattern TEXT,
                    started_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    completed_at TIMESTAMPTZ
                );

                CREATE TABLE IF NOT EXISTS memory_events (
                    event_id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    memory_id TEXT NOT NULL,
                    project_id UUID NOT NULL,
                    namespace TEXT NOT NULL,
                    agent_id TEXT,
                    event_type TEXT NOT NULL,
                    event_payload JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
                );

                CREATE TABLE IF NOT EXISTS interaction_events (
                    event_id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    session_id TEXT NOT NULL,
                    agent_id TEXT NOT NULL,
                    parent_event_id UUID,
                    kind TEXT NOT NULL,
                    content TEXT NOT NULL,
                    embedding vector({embedding_dim}),
                    timestamp TIMESTAMPTZ NOT NULL DEFAULT now()
                );

                CREATE TABLE IF NOT EXISTS embedding_cache (
                    hash TEXT PRIMARY KEY,
                    vector vector({embedding_dim}) NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
                );
                "#,
                embedding_dim = embedding_dim
            ),
            // Extensions are left in place: other schemas in the same
            // database may depend on `vector`/`pgcrypto`, so a revert only
            // undoes what this migration owns.
            down_sql: r#"
                DROP TABLE IF EXISTS embedding_cache;
                DROP TABLE IF EXISTS interaction_events;
                DROP TABLE IF EXISTS memory_events;
                DROP TABLE IF EXISTS ace_runs;
                DROP TABLE IF EXISTS feature_tracker;
                DROP TABLE IF EXISTS session_progress;
                DROP TABLE IF EXISTS vote_history;
                DROP TABLE IF EXISTS memory_shared_agents;
                DROP TABLE IF EXISTS memories;
                DROP TABLE IF EXISTS api_keys;
                DROP TABLE IF EXISTS projects;
            "#
            .to_string(),
        },
        Migration {
            version: 2,
            name: "indexes",
            sql: r#"
                CREATE INDEX IF NOT EXISTS idx_memories_embedding_hnsw
                    ON memories USING hnsw (embedding vector_cosine_ops);
                CREATE INDEX IF NOT EXISTS idx_memories_tenant_scope
                    ON memories (project_id, namespace, scope);
                CREATE UNIQUE INDEX IF NOT EXISTS idx_memories_content_hash_live
                    ON memories (project_id, namespace, agent_id, content_hash)
                    WHERE NOT is_deprecated;
                CREATE INDEX IF NOT EXISTS idx_memories_expires_at
                    ON memories (expires_at) WHERE expires_at IS NOT NULL;
                CREATE INDEX IF NOT EXISTS idx_memories_metadata_gin
                    ON memories USING gin (metadata);
                CREATE INDEX IF NOT EXISTS idx_interaction_events_session
                    ON interaction_events (project_id, session_id, timestamp);
                CREATE INDEX IF NOT EXISTS idx_interaction_events_agent
                    ON interaction_events (project_id, agent_id, timestamp);
                CREATE INDEX IF NOT EXISTS idx_interaction_events_parent
                    ON interaction_events (parent_event_id) WHERE parent_event_id IS NOT NULL;
                CREATE INDEX IF NOT EXISTS idx_shared_agents_memory
                    ON memory_shared_agents (memory_id, shared_agent_id);
                CREATE INDEX IF NOT EXISTS idx_shared_agents_tenant
                    ON memory_shared_agents (project_id, namespace, shared_agent_id);
                CREATE INDEX IF NOT EXISTS idx_memory_events_tenant
                    ON memory_events (project_id, created_at);
                CREATE INDEX IF NOT EXISTS idx_memory_events_memory
                    ON memory_events (memory_id, created_at);
            "#
            .to_string(),
            down_sql: r#"
                DROP INDEX IF EXISTS idx_memories_embedding_hnsw;
                DROP INDEX IF EXISTS idx_memories_tenant_scope;
                DROP INDEX IF EXISTS idx_memories_content_hash_live;
                DROP INDEX IF EXISTS idx_memories_expires_at;
                DROP INDEX IF EXISTS idx_memories_metadata_gin;
                DROP INDEX IF EXISTS idx_interaction_events_session;
                DROP INDEX IF EXISTS idx_interaction_events_agent;
                DROP INDEX IF EXISTS idx_interaction_events_parent;
                DROP INDEX IF EXISTS idx_shared_agents_memory;
                DROP INDEX IF EXISTS idx_shared_agents_tenant;
                DROP INDEX IF EXISTS idx_memory_events_tenant;
                DROP INDEX IF EXISTS idx_memory_events_memory;
            "#
            .to_string(),
        },
    ]
}

pub struct MigrationManager {
    pool: PgPool,
    embedding_dim: u32,
}

impl MigrationManager {
    pub fn new(pool: PgPool, embedding_dim: u32) -> Self {
        Self { pool, embedding_dim }
    }

    async fn ensure_tracking_table(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version BIGINT PRIMARY KEY,
                name TEXT NOT NULL,
                checksum TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn applied_versions(&self) -> StoreResult<Vec<i64>> {
        let rows = sqlx::query("SELECT version FROM schema_version ORDER BY version ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get::<i64, _>("version")).collect())
    }

    pub async fn current_version(&self) -> StoreResult<i64> {
        self.ensure_tracking_table().await?;
        Ok(self.applied_versions().await?.into_iter().max().unwrap_or(0))
    }

    /// Applies every migration with a version greater than what is
    /// recorded in `schema_version`, inside one transaction per migration.
    pub async fn apply_pending(&self) -> StoreResult<Vec<i64>> {
        self.ensure_tracking_table().await?;
        let applied = self.applied_versions().await?;
        let mut newly_applied = Vec::new();

        for migration in migrations(self.embedding_dim) {
            if applied.contains(&migration.version) {
                continue;
            }
            let checksum = format!("{:x}", Sha256::digest(migration.sql.as_bytes()));
            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(&migration.sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Migration(format!("{}: {e}", migration.name)))?;
            sqlx::query(
                "INSERT INTO schema_version (version, name, checksum) VALUES ($1, $2, $3)",
            )
            .bind(migration.version)
            .bind(migration.name)
            .bind(&checksum)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            info!(version = migration.version, name = migration.name, "applied migration");
            newly_applied.push(migration.version);
        }

        Ok(newly_applied)
    }

    /// Reverts every applied migration with a version greater than
    /// `target_version`, newest first, each in its own transaction. Returns
    /// the versions that were rolled back.
    pub async fn revert_to(&self, target_version: i64) -> StoreResult<Vec<i64>> {
        self.ensure_tracking_table().await?;
        let mut applied = self.applied_versions().await?;
        applied.sort_unstable_by(|a, b| b.cmp(a));
        let mut reverted = Vec::new();

        for migration in migrations(self.embedding_dim).into_iter().rev() {
            if migration.version <= target_version || !applied.contains(&migration.version) {
                continue;
            }
            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(&migration.down_sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Migration(format!("revert {}: {e}", migration.name)))?;
            sqlx::query("DELETE FROM schema_version WHERE version = $1")
                .bind(migration.version)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            info!(version = migration.version, name = migration.name, "reverted migration");
            reverted.push(migration.version);
        }

        Ok(reverted)
    }

    /// In `production`, a behind schema is a fatal startup condition; in
    /// `development`, missing migrations are applied in place.
    pub async fn ensure_schema(&self, policy: SchemaPolicy) -> StoreResult<()> {
        let latest = migrations(self.embedding_dim)
            .iter()
            .map(|m| m.version)
            .max()
            .unwrap_or(0);
        let current = self.current_version().await?;

        if current < latest {
            match policy {
                SchemaPolicy::Production => {
                    return Err(StoreError::Migration(format!(
                        "schema version {current} is behind required {latest}; refusing to start in production"
                    )));
                }
                SchemaPolicy::Development => {
                    warn!(current, latest, "schema behind, applying pending migrations");
                    self.apply_pending().await?;
                }
            }
        }
        Ok(())
    }
}
