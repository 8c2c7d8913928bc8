//! Aegis Memory - Configuration
//!
//! Loads the process-wide settings aggregate from environment variables
//! (spec §6), with an optional TOML file overlay for local development.

pub mod config;
pub mod environment;
pub mod error;
pub mod loader;
pub mod server;

pub use config::AegisConfig;
pub use environment::AegisEnv;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use server::{LogFormat, ServerConfig};
