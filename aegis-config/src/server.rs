//! HTTP server process settings (spec §6: `LOG_FORMAT`, `ENABLE_METRICS`)
//! plus the host/port binding the teacher's server config carries.

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" => Ok(LogFormat::Text),
            other => Err(format!("unknown LOG_FORMAT value {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct ServerConfig {
    #[validate(length(min = 1, message = "server host cannot be empty"))]
    pub host: String,

    #[validate(range(min = 1, message = "server port must be nonzero"))]
    pub port: u16,

    pub log_format: LogFormat,

    pub enable_metrics: bool,

    #[validate(range(min = 1, max = 3600, message = "request timeout must be in (0, 3600] seconds"))]
    pub request_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_format: LogFormat::Json,
            enable_metrics: true,
            request_timeout_seconds: 30,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("SERVER_HOST") {
            cfg.host = v;
        }
        if let Ok(v) = std::env::var("SERVER_PORT") {
            cfg.port = v.parse().unwrap_or(cfg.port);
        }
        if let Ok(v) = std::env::var("LOG_FORMAT") {
            if let Ok(format) = v.parse() {
                cfg.log_format = format;
            }
        }
        if let Ok(v) = std::env::var("ENABLE_METRICS") {
            cfg.enable_metrics = v.eq_ignore_ascii_case("true") || v == "1";
        }
        cfg
    }

    pub fn validate_fields(&self) -> Result<(), String> {
        self.validate().map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ServerConfig::default().validate_fields().is_ok());
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
