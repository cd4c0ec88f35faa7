//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0),
            port: 3000,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3001".to_string()],
        }
    }
}

/// Local record store configuration
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Directory holding one `<key>.json` file per collection.
    /// `None` keeps everything in process memory.
    pub data_dir: Option<PathBuf>,
}

/// Remote record service configuration
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the record service. `None` serves the pipeline from the local store.
    pub base_url: Option<Url>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Container used when a request does not name one
    pub default_container: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: 10,
            default_container: "bd-pipeline".to_string(),
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub store: StoreConfig,
    pub remote: RemoteConfig,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let server = ServerConfig {
            host: lookup("HOST")
                .and_then(|h| h.parse().ok())
                .unwrap_or_else(|| ServerConfig::default().host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(|| ServerConfig::default().port),
        };

        let cors = CorsConfig {
            allowed_origins: lookup("ALLOWED_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| CorsConfig::default().allowed_origins),
        };

        let store = StoreConfig {
            data_dir: lookup("DATA_DIR")
                .filter(|d| !d.trim().is_empty())
                .map(PathBuf::from),
        };

        let defaults = RemoteConfig::default();
        let remote = RemoteConfig {
            base_url: match lookup("PIPELINE_API_URL").filter(|u| !u.trim().is_empty()) {
                Some(raw) => Some(Self::parse_base_url(&raw)?),
                None => None,
            },
            api_key: lookup("PIPELINE_API_KEY").filter(|k| !k.is_empty()),
            timeout_secs: match lookup("PIPELINE_API_TIMEOUT_SECS") {
                Some(raw) => raw.parse().map_err(|_| {
                    ConfigError::InvalidValue(format!(
                        "PIPELINE_API_TIMEOUT_SECS must be a number of seconds, got '{}'",
                        raw
                    ))
                })?,
                None => defaults.timeout_secs,
            },
            default_container: lookup("PIPELINE_CONTAINER")
                .filter(|c| !c.trim().is_empty())
                .unwrap_or(defaults.default_container),
        };

        Ok(Self {
            server,
            cors,
            store,
            remote,
        })
    }

    /// Parse the remote service base URL (http or https only)
    fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
        let url = Url::parse(raw.trim()).map_err(|e| {
            ConfigError::InvalidValue(format!("Invalid PIPELINE_API_URL '{}': {}", raw, e))
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::InvalidValue(format!(
                "PIPELINE_API_URL must use http or https, got '{}'",
                other
            ))),
        }
    }
}
