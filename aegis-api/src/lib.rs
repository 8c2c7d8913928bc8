//! Aegis Memory - HTTP request surface
//!
//! Thin axum adapters over the repository crates (spec §6): every
//! handler resolves identity once via the `rate_limit` middleware, then
//! delegates straight to `aegis-memory`/`aegis-ace`/`aegis-events`/
//! `aegis-dashboard`, converting their results with `?` through
//! `ApiError`'s `From` impls.

pub mod ace;
pub mod auth;
pub mod dashboard;
pub mod error;
pub mod events;
pub mod health;
pub mod memories;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use router::build as build_router;
pub use state::AppState;
