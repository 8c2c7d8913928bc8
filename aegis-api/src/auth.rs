//! Per-request identity, resolved once by the `rate_limit` middleware
//! (spec §4.8) and picked up here as a plain extractor so handlers never
//! re-parse the bearer token themselves.

use crate::error::ApiError;
use crate::state::AppState;
use aegis_auth::Identity;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

pub struct AuthenticatedIdentity(pub Identity);

impl FromRequestParts<AppState> for AuthenticatedIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(AuthenticatedIdentity)
            .ok_or_else(|| ApiError::ServerError("identity middleware did not run".to_string()))
    }
}
