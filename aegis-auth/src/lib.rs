//! Aegis Memory - Auth
//!
//! Resolves a bearer token to a tenant `Identity` (spec §4.8) in one of two
//! modes (legacy single key, per-project keys). Project scoping on writes
//! and reads is enforced structurally downstream: every repository call is
//! parameterized by `Identity::project_id`, and `aegis-memory`'s
//! `acl_predicate` filters every read by it.

pub mod config;
pub mod error;
pub mod identity;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use identity::{hash_token, AuthService, Identity, DEFAULT_PROJECT_ID};
