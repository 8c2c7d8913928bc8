//! Shared application state handed to every handler. Holds the store, the
//! repository facades, and the two cross-cutting services (auth, rate
//! limiting) every request passes through before reaching a repository.

use aegis_auth::AuthService;
use aegis_database::Store;
use aegis_events::InteractionEventRepository;
use aegis_memory::MemoryRepository;
use aegis_ratelimit::RateLimiterBackend;
use std::sync::Arc;

/// Everything a handler needs, grouped so `aegis-server` only has to build
/// it once at startup. Repositories that are pure function-holders
/// (`VoteRepository`, `DeltaRepository`, ...) are zero-sized and need no
/// `Arc`; `MemoryRepository` and `InteractionEventRepository` own the
/// embedding service, so they're constructed once and shared.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub memory_repo: Arc<MemoryRepository>,
    pub interaction_repo: Arc<InteractionEventRepository>,
    pub auth: Arc<AuthService>,
    pub rate_limiter: Arc<dyn RateLimiterBackend>,
    pub enable_metrics: bool,
}
