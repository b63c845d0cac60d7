//! Response DTOs of the evaluation API
//!
//! Defines the structure of incoming HTTP response bodies.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::EvaluationResult;

/// Response body of a bulk evaluation (GET /evaluate)
///
/// `flags` is optional so a body without it can be reported as a protocol
/// error instead of a generic decode failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkEvaluationResponse {
    /// Evaluated flags keyed by flag key
    #[serde(default)]
    pub flags: Option<HashMap<String, EvaluationResult>>,
}

/// Error body returned by the evaluation API on non-2xx responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g. "not_found")
    pub error: String,
    /// Human-readable detail
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorResponse {
    /// Returns the most descriptive text available.
    pub fn describe(&self) -> &str {
        self.message.as_deref().unwrap_or(&self.error)
    }
}
