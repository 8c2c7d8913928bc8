//! Assembles the full `axum::Router` (spec §6): every endpoint behind
//! the correlation-id + rate-limit middleware stack, health/ready/metrics
//! mounted outside it.

use crate::state::AppState;
use crate::{ace, dashboard, events, health, memories, middleware as mw};
use axum::routing::{get, patch, post};
use axum::Router;

pub fn build(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/memories/", post(memories::add))
        .route("/memories/batch", post(memories::add_batch))
        .route("/memories/query", post(memories::query))
        .route("/memories/query/cross-agent", post(memories::query_cross_agent))
        .route("/memories/export", post(memories::export))
        .route("/memories/import", post(memories::import))
        .route("/memories/:id", get(memories::get).delete(memories::delete))
        .route("/memories/:id/events", get(events::memory_event_timeline))
        .route("/memories/typed/query", post(events::typed_query))
        .route("/memories/typed/episodic/session/:session_id", get(events::episodic_session_timeline))
        .route("/memories/typed/semantic/entity/:entity_id", get(events::semantic_entity_facts))
        .route("/memories/typed/:kind", post(events::create_typed))
        .route("/ace/vote/:id", post(ace::vote))
        .route("/ace/delta", post(ace::delta))
        .route("/ace/reflection", post(ace::reflection))
        .route("/ace/session", post(ace::create_session))
        .route("/ace/session/:id", patch(ace::patch_session).get(ace::get_session))
        .route("/ace/feature", post(ace::create_feature).get(ace::list_features))
        .route("/ace/feature/:id", patch(ace::patch_feature).get(ace::get_feature))
        .route("/ace/playbook", post(ace::playbook))
        .route("/ace/run", post(ace::start_run))
        .route("/ace/run/:id/complete", post(ace::complete_run))
        .route("/ace/run/:id", get(ace::get_run))
        .route("/ace/curate", post(ace::curate))
        .route("/interaction-events/", post(events::create_interaction_event))
        .route("/interaction-events/session/:id", get(events::list_by_session))
        .route("/interaction-events/agent/:id", get(events::list_by_agent))
        .route("/interaction-events/search", post(events::search_interactions))
        .route("/interaction-events/:id", get(events::get_interaction_event))
        .route("/dashboard/event-counts", get(dashboard::event_counts))
        .route("/dashboard/top-memories", get(dashboard::top_memories))
        .route("/dashboard/correlation", get(dashboard::correlation))
        .route("/dashboard/memory-events", get(events::tenant_memory_events))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), mw::rate_limit));

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(health::metrics))
        .merge(authenticated)
        .layer(axum::middleware::from_fn(mw::correlation_id))
        .with_state(state)
}
