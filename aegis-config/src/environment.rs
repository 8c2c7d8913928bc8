//! Deployment environment (spec §6: `AEGIS_ENV`), selecting the schema
//! management policy `aegis-database` enforces at startup.

use aegis_database::migrations::SchemaPolicy;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AegisEnv {
    #[default]
    Development,
    Production,
}

impl AegisEnv {
    pub fn from_env() -> Self {
        std::env::var("AEGIS_ENV")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    pub fn schema_policy(self) -> SchemaPolicy {
        match self {
            AegisEnv::Development => SchemaPolicy::Development,
            AegisEnv::Production => SchemaPolicy::Production,
        }
    }
}

impl fmt::Display for AegisEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AegisEnv::Development => "development",
            AegisEnv::Production => "production",
        };
        write!(f, "{s}")
    }
}

impl FromStr for AegisEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" | "dev" => Ok(AegisEnv::Development),
            "production" | "prod" => Ok(AegisEnv::Production),
            other => Err(format!("unknown AEGIS_ENV value {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_development() {
        assert_eq!(AegisEnv::default(), AegisEnv::Development);
    }

    #[test]
    fn production_maps_to_production_schema_policy() {
        assert_eq!(AegisEnv::Production.schema_policy(), SchemaPolicy::Production);
    }

    #[test]
    fn unknown_value_is_rejected() {
        assert!("staging".parse::<AegisEnv>().is_err());
    }
}
