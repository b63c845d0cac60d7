//! Configuration Module
//!
//! Handles loading and validating client configuration. Values can come from
//! environment variables, the builder, or be constructed directly.

use std::env;
use std::time::Duration;

use reqwest::Url;

use crate::error::{FlagError, Result};

/// Base URL used when neither the builder nor the environment provides one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8081";

/// Required prefix of every environment API key.
pub const API_KEY_PREFIX: &str = "ff_";

/// Environment variable consulted for the base URL.
pub const BASE_URL_ENV: &str = "FEATUREFLAGS_BASE_URL";

/// Local cache parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long an evaluation stays valid after insertion
    pub ttl: Duration,
    /// Period of the background expiry sweep
    pub sweep_interval: Duration,
    /// How long shutdown waits for an in-flight sweep before aborting it
    pub shutdown_grace: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Remote call timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Time allowed to establish a connection
    pub connect_timeout: Duration,
    /// Time allowed for the whole response
    pub response_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(10),
        }
    }
}

/// Client configuration parameters.
///
/// Immutable once a client has been built from it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-environment API key, sent with every request
    pub api_key: String,
    /// Base URL of the evaluation API
    pub base_url: String,
    /// Remote call timeouts
    pub http: HttpConfig,
    /// Local cache parameters
    pub cache: CacheConfig,
}

impl ClientConfig {
    /// Creates a config with default timeouts and cache settings.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            http: HttpConfig::default(),
            cache: CacheConfig::default(),
        }
    }

    /// Creates a new ClientConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `FEATUREFLAGS_API_KEY` - API key (default: empty, rejected by `validate`)
    /// - `FEATUREFLAGS_BASE_URL` - Evaluation API base URL (default: http://localhost:8081)
    /// - `FEATUREFLAGS_CACHE_TTL_SECS` - Cache TTL in seconds (default: 30)
    /// - `FEATUREFLAGS_SWEEP_INTERVAL_SECS` - Sweep period in seconds (default: 30)
    /// - `FEATUREFLAGS_CONNECT_TIMEOUT_SECS` - Connect timeout in seconds (default: 5)
    /// - `FEATUREFLAGS_RESPONSE_TIMEOUT_SECS` - Response timeout in seconds (default: 10)
    pub fn from_env() -> Self {
        let cache_defaults = CacheConfig::default();
        let http_defaults = HttpConfig::default();

        Self {
            api_key: env::var("FEATUREFLAGS_API_KEY").unwrap_or_default(),
            base_url: resolve_base_url(None),
            http: HttpConfig {
                connect_timeout: secs_from_env(
                    "FEATUREFLAGS_CONNECT_TIMEOUT_SECS",
                    http_defaults.connect_timeout,
                ),
                response_timeout: secs_from_env(
                    "FEATUREFLAGS_RESPONSE_TIMEOUT_SECS",
                    http_defaults.response_timeout,
                ),
            },
            cache: CacheConfig {
                ttl: secs_from_env("FEATUREFLAGS_CACHE_TTL_SECS", cache_defaults.ttl),
                sweep_interval: secs_from_env(
                    "FEATUREFLAGS_SWEEP_INTERVAL_SECS",
                    cache_defaults.sweep_interval,
                ),
                shutdown_grace: cache_defaults.shutdown_grace,
            },
        }
    }

    /// Checks that the configuration can produce a working client.
    pub fn validate(&self) -> Result<()> {
        validate_api_key(&self.api_key)?;
        parse_base_url(&self.base_url)?;

        if self.cache.sweep_interval.is_zero() {
            return Err(FlagError::InvalidConfig(
                "Sweep interval must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

// == Helpers ==

/// Picks the explicit URL if non-blank, then the environment, then the default.
pub fn resolve_base_url(explicit: Option<&str>) -> String {
    if let Some(url) = explicit.filter(|u| !u.trim().is_empty()) {
        return url.to_string();
    }

    env::var(BASE_URL_ENV)
        .ok()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

pub fn validate_api_key(api_key: &str) -> Result<()> {
    if api_key.trim().is_empty() {
        return Err(FlagError::InvalidConfig("API key is required".to_string()));
    }

    if !api_key.starts_with(API_KEY_PREFIX) {
        return Err(FlagError::InvalidConfig(format!(
            "Invalid API key format. API key should start with '{}'",
            API_KEY_PREFIX
        )));
    }

    Ok(())
}

/// Parses the base URL and rejects anything that cannot carry a path.
pub fn parse_base_url(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url.trim())
        .map_err(|e| FlagError::InvalidConfig(format!("Invalid base URL '{}': {}", base_url, e)))?;

    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(FlagError::InvalidConfig(format!(
            "Base URL must be an absolute http(s) URL: {}",
            base_url
        )));
    }

    Ok(url)
}

fn secs_from_env(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
