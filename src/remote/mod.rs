//! Remote Evaluation Module
//!
//! The remote evaluator is the source of truth the cache sits in front of.
//! Bucketing users into variants happens on the other side of this trait.

mod http;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::EvaluationResult;

pub use self::http::{HttpEvaluator, API_KEY_HEADER};

/// Performs flag evaluations against the evaluation service.
///
/// Implementations classify failures as:
/// - `FlagError::NotFound` when the service has no such flag (single evaluation only),
/// - `FlagError::Authentication` when credentials are rejected,
/// - `FlagError::Evaluation` for everything else, timeouts included.
///
/// `user_id` of `None` means "evaluate without per-user targeting".
#[async_trait]
pub trait RemoteEvaluator: Send + Sync {
    /// Evaluates one flag for one user.
    async fn evaluate_one(&self, flag_key: &str, user_id: Option<&str>) -> Result<EvaluationResult>;

    /// Evaluates every active flag for one user, keyed by flag key.
    async fn evaluate_all(&self, user_id: Option<&str>) -> Result<HashMap<String, EvaluationResult>>;
}
