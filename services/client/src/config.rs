//! services/client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables when the host
//! creates the client. The `.env` file is used for local development.

use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the HTTP API, without a trailing slash.
    pub api_base_url: String,
    /// Base URL of the streaming endpoint, without a trailing slash.
    pub ws_base_url: String,
    pub log_level: Level,
    pub test_user_email: String,
    pub http_timeout: Duration,
    pub connect_timeout: Duration,
    /// Longest gap between two stream events before the session gives up.
    pub stall_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let api_base_url = "http://localhost:8000".to_string();
        Self {
            ws_base_url: derive_ws_base(&api_base_url),
            api_base_url,
            log_level: Level::INFO,
            test_user_email: "user@example.com".to_string(),
            http_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(10),
            stall_timeout: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // --- Endpoints ---
        let api_base_url = lookup("API_BASE_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base_url);
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "API_BASE_URL".to_string(),
                format!("'{}' must start with http:// or https://", api_base_url),
            ));
        }

        let ws_base_url = match lookup("WS_BASE_URL") {
            Some(v) => {
                let v = v.trim_end_matches('/').to_string();
                if !v.starts_with("ws://") && !v.starts_with("wss://") {
                    return Err(ConfigError::InvalidValue(
                        "WS_BASE_URL".to_string(),
                        format!("'{}' must start with ws:// or wss://", v),
                    ));
                }
                v
            }
            None => derive_ws_base(&api_base_url),
        };

        // --- Logging ---
        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let test_user_email = lookup("TEST_USER_EMAIL").unwrap_or(defaults.test_user_email);

        // --- Timeouts ---
        let http_timeout = secs_var(&lookup, "HTTP_TIMEOUT_SECS", defaults.http_timeout)?;
        let connect_timeout = secs_var(&lookup, "CONNECT_TIMEOUT_SECS", defaults.connect_timeout)?;
        let stall_timeout = secs_var(&lookup, "STALL_TIMEOUT_SECS", defaults.stall_timeout)?;

        Ok(Self {
            api_base_url,
            ws_base_url,
            log_level,
            test_user_email,
            http_timeout,
            connect_timeout,
            stall_timeout,
        })
    }
}

/// `https` becomes `wss`, `http` becomes `ws`.
pub fn derive_ws_base(api_base_url: &str) -> String {
    if let Some(rest) = api_base_url.strip_prefix("https") {
        format!("wss{}", rest)
    } else if let Some(rest) = api_base_url.strip_prefix("http") {
        format!("ws{}", rest)
    } else {
        api_base_url.to_string()
    }
}

fn secs_var<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(0) | Err(_) => Err(ConfigError::InvalidValue(
                key.to_string(),
                format!("'{}' is not a positive number of seconds", raw),
            )),
            Ok(secs) => Ok(Duration::from_secs(secs)),
        },
    }
}
