//! HTTP Remote Evaluator
//!
//! Talks to the evaluation API:
//! - `GET {base}/evaluate/{flagKey}[?user=<id>]` - evaluate one flag
//! - `GET {base}/evaluate[?user=<id>]` - evaluate all active flags
//!
//! Every request carries the environment API key in the `X-API-Key` header.

use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use tracing::{debug, error};

use crate::config::{parse_base_url, HttpConfig};
use crate::error::{FlagError, Result};
use crate::models::{BulkEvaluationResponse, ErrorResponse, EvaluationResult};
use crate::remote::RemoteEvaluator;

/// Header carrying the environment API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Query parameter carrying the user id.
const USER_QUERY_PARAM: &str = "user";

// == HTTP Evaluator ==
/// [`RemoteEvaluator`] backed by the evaluation REST API.
#[derive(Debug, Clone)]
pub struct HttpEvaluator {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl HttpEvaluator {
    // == Constructor ==
    /// Creates an evaluator for `base_url` with the given timeouts.
    ///
    /// The connect timeout bounds connection setup and the response timeout
    /// bounds the whole request; either expiring surfaces as
    /// `FlagError::Evaluation`.
    pub fn new(base_url: &str, api_key: impl Into<String>, http: &HttpConfig) -> Result<Self> {
        let base_url = parse_base_url(base_url)?;

        let client = Client::builder()
            .connect_timeout(http.connect_timeout)
            .timeout(http.response_timeout)
            .build()
            .map_err(|e| FlagError::InvalidConfig(format!("Failed to build HTTP client: {}", e)))?;

        debug!("HttpEvaluator initialized with base_url: {}", base_url);

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    // == URL Building ==
    /// Builds an evaluation URL, percent-encoding the flag key as a path
    /// segment and the user id as a query value.
    pub fn evaluation_url(&self, flag_key: Option<&str>, user_id: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.clone();

        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| FlagError::evaluation("Base URL cannot carry a path"))?;
            segments.pop_if_empty().push("evaluate");
            if let Some(flag_key) = flag_key {
                segments.push(flag_key);
            }
        }

        url.set_query(None);
        if let Some(user_id) = user_id.filter(|id| !id.is_empty()) {
            url.query_pairs_mut().append_pair(USER_QUERY_PARAM, user_id);
        }

        Ok(url)
    }

    async fn send(&self, url: Url) -> Result<Response> {
        self.client
            .get(url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url.path()))
            .map_err(FlagError::Evaluation)
    }
}

#[async_trait]
impl RemoteEvaluator for HttpEvaluator {
    async fn evaluate_one(&self, flag_key: &str, user_id: Option<&str>) -> Result<EvaluationResult> {
        let url = self.evaluation_url(Some(flag_key), user_id)?;
        debug!("Evaluating flag: {} for user: {:?}", flag_key, user_id);

        let response = self.send(url).await?;

        match response.status() {
            StatusCode::OK => response
                .json::<EvaluationResult>()
                .await
                .with_context(|| format!("Invalid evaluation response for flag '{}'", flag_key))
                .map_err(FlagError::Evaluation),
            StatusCode::UNAUTHORIZED => Err(authentication_error(response).await),
            StatusCode::NOT_FOUND => Err(FlagError::NotFound(flag_key.to_string())),
            status => Err(unexpected_status(status, response).await),
        }
    }

    async fn evaluate_all(&self, user_id: Option<&str>) -> Result<HashMap<String, EvaluationResult>> {
        let url = self.evaluation_url(None, user_id)?;
        debug!("Evaluating all flags for user: {:?}", user_id);

        let response = self.send(url).await?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .json::<BulkEvaluationResponse>()
                    .await
                    .context("Invalid bulk evaluation response")
                    .map_err(FlagError::Evaluation)?;

                body.flags.ok_or_else(|| {
                    FlagError::evaluation("Invalid API response: missing 'flags' field")
                })
            }
            StatusCode::UNAUTHORIZED => Err(authentication_error(response).await),
            status => Err(unexpected_status(status, response).await),
        }
    }
}

// == Response Helpers ==

async fn error_body(response: Response) -> Option<ErrorResponse> {
    response.json::<ErrorResponse>().await.ok()
}

async fn authentication_error(response: Response) -> FlagError {
    let message = error_body(response)
        .await
        .and_then(|body| body.message)
        .unwrap_or_else(|| "Invalid or missing API key".to_string());
    FlagError::Authentication(message)
}

async fn unexpected_status(status: StatusCode, response: Response) -> FlagError {
    let detail = error_body(response)
        .await
        .map(|body| format!(": {}", body.describe()))
        .unwrap_or_default();

    let message = format!(
        "API request failed with status code: {}{}",
        status.as_u16(),
        detail
    );
    error!("{}", message);
    FlagError::evaluation(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator(base_url: &str) -> HttpEvaluator {
        HttpEvaluator::new(base_url, "ff_test_key", &HttpConfig::default()).unwrap()
    }

    #[test]
    fn test_single_flag_url() {
        let url = evaluator("http://localhost:8081")
            .evaluation_url(Some("dark-mode"), Some("user-42"))
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8081/evaluate/dark-mode?user=user-42");
    }

    #[test]
    fn test_bulk_url_without_user() {
        let url = evaluator("http://localhost:8081/").evaluation_url(None, None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8081/evaluate");
    }

    #[test]
    fn test_empty_user_omits_query() {
        let url = evaluator("http://localhost:8081")
            .evaluation_url(Some("f"), Some(""))
            .unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_base_path_is_kept() {
        let url = evaluator("https://flags.example.com/api/v1/")
            .evaluation_url(Some("f"), None)
            .unwrap();
        assert_eq!(url.path(), "/api/v1/evaluate/f");
    }

    #[test]
    fn test_flag_key_and_user_are_percent_encoded() {
        let url = evaluator("http://localhost:8081")
            .evaluation_url(Some("a/b c"), Some("jane doe&x=1"))
            .unwrap();

        assert_eq!(url.path(), "/evaluate/a%2Fb%20c");
        let user: Vec<_> = url.query_pairs().collect();
        assert_eq!(user.len(), 1);
        assert_eq!(user[0].0, "user");
        assert_eq!(user[0].1, "jane doe&x=1");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = HttpEvaluator::new("not a url", "ff_key", &HttpConfig::default());
        assert!(matches!(result, Err(FlagError::InvalidConfig(_))));
    }
}
