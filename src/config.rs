use std::path::Path;

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub etl: EtlConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Service roots without the `/api` suffix.
    pub teams_base_url: String,
    pub players_base_url: String,
    pub matches_base_url: String,
    pub page_size: u32,
    /// Hard ceiling on pages fetched per pagination scheme.
    pub max_pages: u32,
    pub request_timeout_seconds: u64,
    pub requests_per_second: u32,
    pub burst_size: u32,
    /// Treat a 404 on a paged request as "pagination unsupported" and
    /// go straight to the unpaginated fetch.
    pub flat_fetch_on_not_found: bool,
    /// Upper bound on one complete paginated walk.
    pub walk_deadline_seconds: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            teams_base_url: "http://teams-service:8082".to_string(),
            players_base_url: "http://players-service:3000".to_string(),
            matches_base_url: "http://matches-service:8081".to_string(),
            page_size: 500,
            max_pages: 20,
            request_timeout_seconds: 30,
            requests_per_second: 20,
            burst_size: 40,
            flat_fetch_on_not_found: false,
            walk_deadline_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub interval_seconds: u64,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind: String,
    pub port: u16,
    pub cache_ttl_seconds: u64,
    /// Serve reports from the last ETL snapshot instead of live upstream fetches.
    pub read_from_store: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
            cache_ttl_seconds: 300,
            read_from_store: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "reports.db".to_string(),
        }
    }
}

/// Secrets loaded exclusively from environment variables.
/// Not serializable, not stored in config files.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub teams_api_token: Option<SecretString>,
    pub players_api_token: Option<SecretString>,
    pub matches_api_token: Option<SecretString>,
    /// Fallback used when no per-service token applies.
    pub upstream_token: Option<SecretString>,
    /// Shared secret presented by the trusted gateway hop.
    pub internal_secret: Option<SecretString>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            teams_api_token: env_secret("TEAMS_API_TOKEN"),
            players_api_token: env_secret("PLAYERS_API_TOKEN"),
            matches_api_token: env_secret("MATCHES_API_TOKEN"),
            upstream_token: env_secret("UPSTREAM_TOKEN"),
            internal_secret: env_secret("INTERNAL_SECRET"),
        }
    }
}

/// Blank variables count as unset.
fn env_secret(name: &str) -> Option<SecretString> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
}

impl AppConfig {
    /// Load configuration from a TOML file, overlaying environment variables for secrets.
    pub fn load(config_path: &Path) -> Result<(Self, Secrets)> {
        dotenvy::dotenv().ok();

        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        let secrets = Secrets::from_env();

        Ok((config, secrets))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let mut config: AppConfig = toml::from_str(contents)?;
        for base in [
            &mut config.upstream.teams_base_url,
            &mut config.upstream.players_base_url,
            &mut config.upstream.matches_base_url,
        ] {
            *base = base.trim_end_matches('/').to_string();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_config() {
        let contents = std::fs::read_to_string(DEFAULT_CONFIG_PATH)
            .expect("config/default.toml should exist");
        let config = AppConfig::parse(&contents).expect("should parse");
        assert_eq!(config.upstream.page_size, 500);
        assert_eq!(config.upstream.max_pages, 20);
        assert_eq!(config.etl.interval_seconds, 120);
        assert_eq!(config.api.port, 8080);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = AppConfig::parse("[upstream]\npage_size = 50\n").unwrap();
        assert_eq!(config.upstream.page_size, 50);
        assert_eq!(config.upstream.max_pages, 20);
        assert_eq!(config.api.cache_ttl_seconds, 300);
        assert_eq!(config.monitoring.log_level, "info");
    }

    #[test]
    fn test_base_urls_lose_trailing_slash() {
        let config =
            AppConfig::parse("[upstream]\nteams_base_url = \"http://teams:8082/\"\n").unwrap();
        assert_eq!(config.upstream.teams_base_url, "http://teams:8082");
    }

    #[test]
    fn test_read_from_store_flag() {
        assert!(!AppConfig::parse("").unwrap().api.read_from_store);
        let config = AppConfig::parse("[api]\nread_from_store = true\n").unwrap();
        assert!(config.api.read_from_store);
        assert_eq!(config.api.port, 8080);
    }
}
