//! Configuration for the Tibber exporter.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;
use tibber_common::LoggingConfig;

/// Production Tibber GraphQL endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.tibber.com/v1-beta/gql";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Upstream API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// HTTP endpoint settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Per-scrape behavior.
    #[serde(default)]
    pub scrape: ScrapeConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tibber API connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Value sent verbatim in the `Authorization` header.
    #[serde(default)]
    pub token: String,

    /// GraphQL endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

// Keeps the token out of debug logs.
impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            endpoint: default_endpoint(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address to listen on (default: ":9501").
    ///
    /// A bare `:PORT` binds all IPv4 interfaces.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Log every incoming HTTP request.
    #[serde(default)]
    pub request_logging: bool,
}

fn default_listen() -> String {
    ":9501".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            request_logging: false,
        }
    }
}

/// What a scrape does when the upstream query fails.
///
/// `Exit` matches the historical behavior of the exporter, which terminated
/// on the first failed query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchErrorPolicy {
    /// Answer the scrape with `502 Bad Gateway`.
    #[default]
    Respond,
    /// Terminate the process with exit code 1.
    Exit,
}

/// Scrape behavior configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default)]
    pub on_fetch_error: FetchErrorPolicy,
}

/// Parse a listen address, accepting the `:PORT` shorthand.
pub fn parse_listen_addr(listen: &str) -> Result<SocketAddr, ConfigError> {
    let normalized = if listen.starts_with(':') {
        format!("0.0.0.0{}", listen)
    } else {
        listen.to_string()
    };

    normalized
        .parse()
        .map_err(|_| ConfigError::Validation(format!("Invalid listen address: {}", listen)))
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    ///
    /// The result is not validated: CLI and environment overrides are
    /// applied on top before calling [`ExporterConfig::validate`].
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(json5::from_str(&content)?)
    }

    /// Parse and validate configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.token.trim().is_empty() {
            return Err(ConfigError::Validation(
                "API token is required (--token or TIBBER_TOKEN)".to_string(),
            ));
        }

        if self.api.endpoint.trim().is_empty() {
            return Err(ConfigError::Validation(
                "API endpoint must not be empty".to_string(),
            ));
        }

        if !self.api.endpoint.starts_with("http://") && !self.api.endpoint.starts_with("https://")
        {
            return Err(ConfigError::Validation(format!(
                "API endpoint must be an http(s) URL: {}",
                self.api.endpoint
            )));
        }

        parse_listen_addr(&self.http.listen)?;

        Ok(())
    }

    /// The socket address to bind.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_listen_addr(&self.http.listen)
    }
}
