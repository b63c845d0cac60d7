//! Flag Client Module
//!
//! Typed, fail-open access to flag values.
//!
//! # Fallback rules (single-flag accessors)
//! - flag not found: return the default
//! - authentication failure: return the error, never the default
//! - any other failure: log it and return the default
//! - declared type differs from the accessor's type: return the default
//!
//! There are no retries inside the client.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::cache::CacheStats;
use crate::config::{resolve_base_url, CacheConfig, ClientConfig, HttpConfig};
use crate::error::{FlagError, Result};
use crate::evaluation::EvaluationCache;
use crate::models::{FlagType, FlagValue};
use crate::remote::{HttpEvaluator, RemoteEvaluator};

// == Flag Client ==
/// Entry point for evaluating feature flags.
///
/// # Example
/// ```ignore
/// let client = FlagClient::builder()
///     .api_key("ff_production_abc123")
///     .base_url("http://localhost:8081")
///     .build()?;
///
/// let enabled = client.get_boolean_flag("new-checkout", Some("user-42"), false).await?;
/// let theme = client.get_string_flag("theme-color", Some("user-42"), "blue").await?;
///
/// client.close().await;
/// ```
pub struct FlagClient {
    evaluations: EvaluationCache,
}

impl FlagClient {
    /// Creates a new builder.
    pub fn builder() -> FlagClientBuilder {
        FlagClientBuilder::default()
    }

    /// Builds a client that talks to the evaluation API over HTTP.
    ///
    /// Must be called from within a tokio runtime; otherwise it fails with
    /// `FlagError::InvalidConfig`.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let remote = HttpEvaluator::new(&config.base_url, config.api_key, &config.http)?;
        let client = Self::with_evaluator(Arc::new(remote), &config.cache)?;

        info!("FlagClient initialized with base_url: {}", config.base_url);
        Ok(client)
    }

    /// Builds a client on top of any remote evaluator.
    ///
    /// Fails with `FlagError::InvalidConfig` when the sweep interval is zero
    /// or no tokio runtime is running.
    pub fn with_evaluator(remote: Arc<dyn RemoteEvaluator>, cache: &CacheConfig) -> Result<Self> {
        Ok(Self {
            evaluations: EvaluationCache::new(remote, cache)?,
        })
    }

    // == Typed Accessors ==

    /// Evaluates a boolean flag.
    pub async fn get_boolean_flag(
        &self,
        flag_key: &str,
        user_id: Option<&str>,
        default_value: bool,
    ) -> Result<bool> {
        self.typed_flag(flag_key, user_id, FlagType::Boolean, default_value, |v| v.as_bool())
            .await
    }

    /// Evaluates a string flag.
    pub async fn get_string_flag(
        &self,
        flag_key: &str,
        user_id: Option<&str>,
        default_value: &str,
    ) -> Result<String> {
        self.typed_flag(
            flag_key,
            user_id,
            FlagType::String,
            default_value.to_string(),
            |v| v.as_str().map(str::to_string),
        )
        .await
    }

    /// Evaluates a number flag as an integer, truncating toward zero.
    pub async fn get_int_flag(
        &self,
        flag_key: &str,
        user_id: Option<&str>,
        default_value: i64,
    ) -> Result<i64> {
        self.typed_flag(flag_key, user_id, FlagType::Number, default_value, |v| v.as_i64())
            .await
    }

    /// Evaluates a number flag as a float.
    pub async fn get_float_flag(
        &self,
        flag_key: &str,
        user_id: Option<&str>,
        default_value: f64,
    ) -> Result<f64> {
        self.typed_flag(flag_key, user_id, FlagType::Number, default_value, |v| v.as_f64())
            .await
    }

    async fn typed_flag<T, F>(
        &self,
        flag_key: &str,
        user_id: Option<&str>,
        expected: FlagType,
        default_value: T,
        convert: F,
    ) -> Result<T>
    where
        T: std::fmt::Debug,
        F: FnOnce(&FlagValue) -> Result<T>,
    {
        let result = match self.evaluations.evaluate(flag_key, user_id).await {
            Ok(result) => result,
            Err(FlagError::NotFound(_)) => {
                debug!(
                    "Flag '{}' not found, returning default: {:?}",
                    flag_key, default_value
                );
                return Ok(default_value);
            }
            Err(err @ FlagError::Authentication(_)) => return Err(err),
            Err(err) => {
                error!(
                    "Error evaluating {} flag '{}', returning default {:?}: {:#}",
                    expected, flag_key, default_value, err
                );
                return Ok(default_value);
            }
        };

        if result.flag_type != expected {
            warn!(
                "Flag '{}' type mismatch: expected {}, got {}",
                flag_key, expected, result.flag_type
            );
            return Ok(default_value);
        }

        match convert(&result.value) {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!("Flag '{}' value does not match its declared type: {}", flag_key, err);
                Ok(default_value)
            }
        }
    }

    // == Bulk ==

    /// Evaluates every active flag for a user, returning raw values.
    ///
    /// Always calls the evaluation API and refreshes the cache with the
    /// results. There is no default to fall back on: authentication failures
    /// are returned as-is and every other failure as `FlagError::Evaluation`.
    pub async fn get_all_flags(&self, user_id: Option<&str>) -> Result<HashMap<String, FlagValue>> {
        match self.evaluations.evaluate_all(user_id).await {
            Ok(results) => Ok(results
                .into_iter()
                .map(|(flag_key, result)| (flag_key, result.value))
                .collect()),
            Err(err @ FlagError::Authentication(_)) => Err(err),
            Err(err) => {
                error!("Error evaluating all flags: {:#}", err);
                Err(FlagError::Evaluation(
                    anyhow::Error::new(err).context("Failed to evaluate all flags"),
                ))
            }
        }
    }

    // == Cache Control ==

    /// Drops the cached evaluation of one flag for one user.
    pub fn invalidate_cache(&self, flag_key: &str, user_id: Option<&str>) {
        self.evaluations.invalidate(flag_key, user_id);
    }

    /// Drops every cached evaluation.
    pub fn clear_cache(&self) {
        self.evaluations.clear();
    }

    /// Returns current cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.evaluations.stats()
    }

    /// Stops the background sweep and clears the cache. Idempotent.
    pub async fn close(&self) {
        self.evaluations.shutdown().await;
        info!("FlagClient closed");
    }
}

// == Flag Client Builder ==
/// Builder for [`FlagClient`].
///
/// Only the API key is required. The base URL falls back to the
/// `FEATUREFLAGS_BASE_URL` environment variable, then to
/// [`DEFAULT_BASE_URL`](crate::config::DEFAULT_BASE_URL).
#[derive(Debug, Default, Clone)]
pub struct FlagClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    http: HttpConfig,
    cache: CacheConfig,
}

impl FlagClientBuilder {
    /// Sets the environment API key (must start with `ff_`).
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the evaluation API base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets how long evaluations stay cached (default 30s).
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache.ttl = ttl;
        self
    }

    /// Sets the background sweep period (default 30s).
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.cache.sweep_interval = interval;
        self
    }

    /// Sets the connect and response timeouts (default 5s / 10s).
    pub fn http_timeout(mut self, connect_timeout: Duration, response_timeout: Duration) -> Self {
        self.http = HttpConfig {
            connect_timeout,
            response_timeout,
        };
        self
    }

    /// Resolves the final configuration without building a client.
    pub fn into_config(self) -> ClientConfig {
        ClientConfig {
            api_key: self.api_key.unwrap_or_default(),
            base_url: resolve_base_url(self.base_url.as_deref()),
            http: self.http,
            cache: self.cache,
        }
    }

    /// Validates the settings and builds the client.
    ///
    /// Must be called from within a tokio runtime; otherwise it fails with
    /// `FlagError::InvalidConfig`.
    pub fn build(self) -> Result<FlagClient> {
        FlagClient::from_config(self.into_config())
    }
}
