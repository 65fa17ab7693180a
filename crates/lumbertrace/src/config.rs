// Copyright 2025-Present Lumbertrace contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::ConfigError;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:5214";
pub const DEFAULT_WS_ENDPOINT: &str = "ws://localhost:5214";

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(2);
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const ENV_ENDPOINT: &str = "LUMBERTRACE_ENDPOINT";
const ENV_WS_ENDPOINT: &str = "LUMBERTRACE_WS_ENDPOINT";
const ENV_API_KEY: &str = "LUMBERTRACE_API_KEY";
const ENV_PROJECT_ID: &str = "LUMBERTRACE_PROJECT_ID";
const ENV_PROXY_HTTPS: &str = "LUMBERTRACE_PROXY_HTTPS";
const ENV_HTTPS_PROXY: &str = "HTTPS_PROXY";
pub const ENV_LOG_LEVEL: &str = "LUMBERTRACE_LOG_LEVEL";
const ENV_FLUSH_INTERVAL_MS: &str = "LUMBERTRACE_FLUSH_INTERVAL_MS";
const ENV_RECONNECT_BACKOFF_MS: &str = "LUMBERTRACE_RECONNECT_BACKOFF_MS";
const ENV_CLOSE_TIMEOUT_MS: &str = "LUMBERTRACE_CLOSE_TIMEOUT_MS";
const ENV_REQUEST_TIMEOUT_MS: &str = "LUMBERTRACE_REQUEST_TIMEOUT_MS";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Connection settings and pipeline cadence for a log session.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the collector's HTTP API (credential exchange)
    pub endpoint: String,
    /// Base URL of the collector's websocket API (record stream)
    pub ws_endpoint: String,
    pub api_key: String,
    pub project_id: String,
    /// HTTPS proxy URL used for the credential exchange
    pub https_proxy: Option<String>,
    /// Log level for the host's subscriber (trace, debug, info, warn, error)
    pub log_level: String,
    /// Pause between drain cycles
    pub flush_interval: Duration,
    /// Fixed delay between reconnect attempts
    pub reconnect_backoff: Duration,
    /// Bounded wait for the close handshake
    pub close_timeout: Duration,
    /// Timeout applied to the credential exchange request
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            ws_endpoint: DEFAULT_WS_ENDPOINT.to_string(),
            api_key: String::new(),
            project_id: String::new(),
            https_proxy: None,
            log_level: "info".to_string(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl Config {
    pub fn new(project_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_iter(env::vars())
    }

    /// Builds the configuration from an explicit set of variables.
    pub fn from_env_iter<I, K, V>(iter: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let defaults = Self::default();

        let text = |key: &str| map.get(key).map(|v| v.trim().to_string());
        let millis = |key: &str, default: Duration| {
            map.get(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        let config = Self {
            endpoint: text(ENV_ENDPOINT).unwrap_or(defaults.endpoint),
            ws_endpoint: text(ENV_WS_ENDPOINT).unwrap_or(defaults.ws_endpoint),
            api_key: text(ENV_API_KEY).unwrap_or_default(),
            project_id: text(ENV_PROJECT_ID).unwrap_or_default(),
            https_proxy: text(ENV_PROXY_HTTPS)
                .or_else(|| text(ENV_HTTPS_PROXY))
                .filter(|v| !v.is_empty()),
            log_level: text(ENV_LOG_LEVEL)
                .map(|v| v.to_lowercase())
                .unwrap_or(defaults.log_level),
            flush_interval: millis(ENV_FLUSH_INTERVAL_MS, defaults.flush_interval),
            reconnect_backoff: millis(ENV_RECONNECT_BACKOFF_MS, defaults.reconnect_backoff),
            close_timeout: millis(ENV_CLOSE_TIMEOUT_MS, defaults.close_timeout),
            request_timeout: millis(ENV_REQUEST_TIMEOUT_MS, defaults.request_timeout),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("endpoint", &self.endpoint),
            ("ws_endpoint", &self.ws_endpoint),
            ("api_key", &self.api_key),
            ("project_id", &self.project_id),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} cannot be empty")));
            }
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        for (name, value) in [
            ("flush_interval", self.flush_interval),
            ("reconnect_backoff", self.reconnect_backoff),
            ("close_timeout", self.close_timeout),
            ("request_timeout", self.request_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("endpoint", &self.endpoint)
            .field("ws_endpoint", &self.ws_endpoint)
            .field("api_key", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("https_proxy", &self.https_proxy)
            .field("log_level", &self.log_level)
            .field("flush_interval", &self.flush_interval)
            .field("reconnect_backoff", &self.reconnect_backoff)
            .field("close_timeout", &self.close_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
