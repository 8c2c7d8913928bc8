//! `aegis-server` binary: loads configuration, connects the store,
//! applies migrations, wires every repository crate into the HTTP surface
//! (spec §6), and serves until SIGTERM/SIGINT.
//!
//! Ambient process plumbing only (spec §1's "AMBIENT" note) — CLIs proper
//! are out of scope, but a service still needs normal startup/shutdown
//! ergonomics.

use aegis_auth::{hash_token, AuthConfig, AuthService, DEFAULT_PROJECT_ID};
use aegis_config::ConfigLoader;
use aegis_database::{MigrationManager, Store};
use aegis_embedding::{EmbeddingCache, EmbeddingService, HttpEmbeddingProvider};
use aegis_events::InteractionEventRepository;
use aegis_memory::MemoryRepository;
use aegis_ratelimit::{InProcessRateLimiter, RateLimiterBackend, RedisRateLimiter};
use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::load().context("failed to load configuration")?;
    init_tracing(config.server.log_format);

    tracing::info!(
        environment = %config.environment,
        host = %config.server.host,
        port = config.server.port,
        "starting aegis-server",
    );

    let store = Store::connect(&config.database)
        .await
        .context("failed to connect to the persistent store")?;

    let migrations = MigrationManager::new(store.write_pool.clone(), config.embedding.dimension as u32);
    migrations
        .ensure_schema(config.environment.schema_policy())
        .await
        .context("schema migration check failed")?;

    if matches!(config.auth, AuthConfig::LegacySingleKey { .. }) {
        ensure_default_project(&store, &config.auth)
            .await
            .context("failed to provision the legacy default project")?;
    }

    let provider = Arc::new(
        HttpEmbeddingProvider::new(&config.embedding)
            .context("failed to construct the embedding provider")?,
    );
    let cache = EmbeddingCache::new(store.write_pool.clone(), config.embedding.in_process_cache_size);
    let embedding_service = Arc::new(EmbeddingService::new(provider, cache, &config.embedding));

    let memory_repo = Arc::new(MemoryRepository::new(embedding_service.clone()));
    let interaction_repo = Arc::new(InteractionEventRepository::new(embedding_service));

    let auth = Arc::new(AuthService::new(config.auth.clone(), store.write_pool.clone()));

    let rate_limiter: Arc<dyn RateLimiterBackend> = match config.rate_limit_backend_url() {
        Some(redis_url) => Arc::new(
            RedisRateLimiter::connect(redis_url, config.rate_limit)
                .await
                .context("failed to connect to the distributed rate limiter backend")?,
        ),
        None => Arc::new(InProcessRateLimiter::new(config.rate_limit)),
    };

    let state = aegis_api::state::AppState {
        store: Arc::new(store),
        memory_repo,
        interaction_repo,
        auth,
        rate_limiter,
        enable_metrics: config.server.enable_metrics,
    };

    let router = aegis_api::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr.as_str())
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(%addr, "aegis-server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited with an error")?;

    tracing::info!("aegis-server shut down cleanly");
    Ok(())
}

fn init_tracing(format: aegis_config::LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        aegis_config::LogFormat::Json => subscriber.json().init(),
        aegis_config::LogFormat::Text => subscriber.init(),
    }
}

/// Legacy single-key mode authenticates every request as one fixed
/// project (`DEFAULT_PROJECT_ID`); that row — and an `api_keys` row
/// matching the configured token, so `/metrics`-style audits can see it —
/// must exist before the first request arrives.
async fn ensure_default_project(store: &Store, auth_config: &AuthConfig) -> anyhow::Result<()> {
    let AuthConfig::LegacySingleKey { token } = auth_config else {
        return Ok(());
    };

    sqlx::query(
        r#"
        INSERT INTO projects (id, name, is_active)
        VALUES ($1, 'default', true)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(DEFAULT_PROJECT_ID)
    .execute(&store.write_pool)
    .await?;

    if token.is_empty() {
        tracing::warn!("AEGIS_API_KEY is not set; legacy-mode requests will be rejected");
        return Ok(());
    }

    let key_hash = hash_token(token);
    sqlx::query(
        r#"
        INSERT INTO api_keys (project_id, key_hash, name, is_active)
        VALUES ($1, $2, 'legacy-default', true)
        ON CONFLICT (key_hash) DO NOTHING
        "#,
    )
    .bind(DEFAULT_PROJECT_ID)
    .bind(&key_hash)
    .execute(&store.write_pool)
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining in-flight requests");
}
