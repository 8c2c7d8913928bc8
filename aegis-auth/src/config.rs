/// Selects which of the two modes described in spec §4.8 is active.
///
/// Mirrors the `ENABLE_PROJECT_AUTH` config flag (spec §6): legacy mode
/// authenticates every request as a single fixed project with one shared
/// bearer token; project-key mode looks tokens up in `api_keys`.
#[derive(Debug, Clone)]
pub enum AuthConfig {
    LegacySingleKey { token: String },
    ProjectKeys,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig::LegacySingleKey { token: String::new() }
    }
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let project_auth = std::env::var("ENABLE_PROJECT_AUTH")
            .map(|v| v == "true")
            .unwrap_or(false);

        if project_auth {
            AuthConfig::ProjectKeys
        } else {
            AuthConfig::LegacySingleKey {
                token: std::env::var("AEGIS_API_KEY").unwrap_or_default(),
            }
        }
    }
}
