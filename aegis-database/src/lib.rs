//! Aegis Memory - Persistent Store
//!
//! Connection pooling, schema migrations, and the shared domain model
//! backing every repository crate (memory, ace, events, dashboard).

pub mod config;
pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use config::DatabaseConfig;
pub use error::{StoreError, StoreResult};
pub use migrations::{MigrationManager, SchemaPolicy};
pub use pool::Store;

pub use sqlx::{PgPool, Postgres, Row, Transaction};
