//! Bearer-token verification, producing the resolved tenant identity.
//!
//! Grounded on spec §4.8: legacy mode compares the raw token against the
//! configured `AEGIS_API_KEY`; project-key mode hashes the token and looks
//! it up in `api_keys`, checking `is_active` and `expires_at` the way the
//! teacher's migrations check row flags before trusting a record.

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

/// The project every legacy-mode request authenticates as. A fixed,
/// well-known id so `aegis-server` can upsert the backing `projects` row
/// once at startup instead of requiring operator provisioning.
pub const DEFAULT_PROJECT_ID: Uuid = Uuid::from_u128(1);

#[derive(Debug, Clone)]
pub struct Identity {
    pub project_id: Uuid,
    pub api_key_id: Option<Uuid>,
}

pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

pub struct AuthService {
    config: AuthConfig,
    pool: PgPool,
}

impl AuthService {
    pub fn new(config: AuthConfig, pool: PgPool) -> Self {
        Self { config, pool }
    }

    pub async fn verify(&self, bearer_token: &str) -> AuthResult<Identity> {
        if bearer_token.is_empty() {
            return Err(AuthError::Unauthorized("missing bearer token".to_string()));
        }

        match &self.config {
            AuthConfig::LegacySingleKey { token } => {
                if token.is_empty() {
                    return Err(AuthError::Unauthorized(
                        "AEGIS_API_KEY is not configured".to_string(),
                    ));
                }
                if hash_token(bearer_token) != hash_token(token) {
                    return Err(AuthError::Unauthorized("invalid bearer token".to_string()));
                }
                Ok(Identity {
                    project_id: DEFAULT_PROJECT_ID,
                    api_key_id: None,
                })
            }
            AuthConfig::ProjectKeys => self.verify_project_key(bearer_token).await,
        }
    }

    async fn verify_project_key(&self, bearer_token: &str) -> AuthResult<Identity> {
        let key_hash = hash_token(bearer_token);

        let row: Option<(Uuid, Uuid, bool, Option<chrono::DateTime<Utc>>, bool)> = sqlx::query_as(
            r#"
            SELECT api_keys.id, api_keys.project_id, api_keys.is_active,
                   api_keys.expires_at, projects.is_active
            FROM api_keys
            JOIN projects ON projects.id = api_keys.project_id
            WHERE api_keys.key_hash = $1
            "#,
        )
        .bind(&key_hash)
        .fetch_optional(&self.pool)
        .await?;

        let (key_id, project_id, key_active, expires_at, project_active) =
            row.ok_or_else(|| AuthError::Unauthorized("unknown api key".to_string()))?;

        if !key_active || !project_active {
            return Err(AuthError::Unauthorized("api key or project is inactive".to_string()));
        }
        if let Some(expires_at) = expires_at {
            if expires_at <= Utc::now() {
                return Err(AuthError::Unauthorized("api key has expired".to_string()));
            }
        }

        Ok(Identity {
            project_id,
            api_key_id: Some(key_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_token_is_deterministic() {
        assert_eq!(hash_token("secret"), hash_token("secret"));
        assert_ne!(hash_token("secret"), hash_token("other"));
    }

    #[tokio::test]
    async fn legacy_mode_rejects_empty_token() {
        // No pool needed: legacy mode never touches the database.
        let pool = sqlx::PgPool::connect_lazy("postgres://invalid/invalid").unwrap();
        let service = AuthService::new(
            AuthConfig::LegacySingleKey { token: "good-token".to_string() },
            pool,
        );
        let result = service.verify("").await;
        assert!(matches!(result, Err(AuthError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn legacy_mode_accepts_matching_token() {
        let pool = sqlx::PgPool::connect_lazy("postgres://invalid/invalid").unwrap();
        let service = AuthService::new(
            AuthConfig::LegacySingleKey { token: "good-token".to_string() },
            pool,
        );
        let identity = service.verify("good-token").await.unwrap();
        assert_eq!(identity.project_id, DEFAULT_PROJECT_ID);
    }

    #[tokio::test]
    async fn legacy_mode_rejects_mismatched_token() {
        let pool = sqlx::PgPool::connect_lazy("postgres://invalid/invalid").unwrap();
        let service = AuthService::new(
            AuthConfig::LegacySingleKey { token: "good-token".to_string() },
            pool,
        );
        assert!(service.verify("wrong-token").await.is_err());
    }
}
