//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;
use std::{net::IpAddr, path::PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub moderation: ModerationConfig,
    pub publishing: PublishingConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "read.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the base URL for the instance
    ///
    /// # Returns
    /// Full URL like "https://read.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
    /// Maximum pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a writer waits on a locked database before giving up
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    8
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Session token configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session secret key (32+ bytes)
    pub session_secret: String,
    /// Session max age in seconds (default: 604800 = 7 days)
    pub session_max_age: i64,
}

/// Content safety classifier configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModerationConfig {
    /// Send new content to the classifier at all
    pub enabled: bool,
    /// Moderation endpoint (OpenAI-compatible `/v1/moderations`)
    pub endpoint: Option<String>,
    /// Bearer token for the endpoint
    pub api_key: Option<String>,
    /// Classifier model name, forwarded verbatim
    pub model: Option<String>,
    /// Public base URL of the media store; relative comic page references
    /// are joined onto it so the classifier can fetch them
    pub media_base_url: Option<String>,
    /// Per-scan timeout; a slow scan counts as unflagged
    pub timeout_ms: u64,
}

/// Authoring configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    /// UTC offset used when rendering version labels (minutes east of UTC)
    pub label_utc_offset_minutes: i32,
}

impl PublishingConfig {
    /// Offset for version labels; out-of-range values fall back to UTC.
    pub fn label_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.label_utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (QUILLPRESS__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.protocol", "http")?
            .set_default("database.path", "data/quillpress.db")?
            .set_default("database.max_connections", 8)?
            .set_default("database.busy_timeout_ms", 5000)?
            .set_default("auth.session_max_age", 604800)?
            .set_default("moderation.enabled", false)?
            .set_default("moderation.timeout_ms", 3000)?
            .set_default("publishing.label_utc_offset_minutes", 0)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (QUILLPRESS__*)
            .add_source(
                Environment::with_prefix("QUILLPRESS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.session_secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        if self.moderation.enabled {
            let endpoint = self
                .moderation
                .endpoint
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    crate::error::AppError::Config(
                        "moderation.endpoint is required when moderation.enabled=true"
                            .to_string(),
                    )
                })?;
            url::Url::parse(endpoint).map_err(|e| {
                crate::error::AppError::Config(format!("moderation.endpoint is invalid: {e}"))
            })?;
        }

        if let Some(base) = self.moderation.media_base_url.as_deref() {
            url::Url::parse(base).map_err(|e| {
                crate::error::AppError::Config(format!("moderation.media_base_url is invalid: {e}"))
            })?;
        }

        if self.moderation.timeout_ms == 0 {
            return Err(crate::error::AppError::Config(
                "moderation.timeout_ms must be greater than 0".to_string(),
            ));
        }

        if FixedOffset::east_opt(self.publishing.label_utc_offset_minutes * 60).is_none() {
            return Err(crate::error::AppError::Config(
                "publishing.label_utc_offset_minutes must be within ±1439".to_string(),
            ));
        }

        if is_local_server_domain(&self.server.domain) {
            let host = normalized_server_host(&self.server.domain);
            if !self.server.protocol.eq_ignore_ascii_case("https") {
                tracing::warn!(
                    host = %host,
                    protocol = %self.server.protocol,
                    "Serving over plain http for local development"
                );
            }
        } else if !self.server.protocol.eq_ignore_ascii_case("https") {
            return Err(crate::error::AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}
