//! Evaluation models
//!
//! Defines the typed evaluation result and the wire DTOs exchanged with the
//! remote evaluation API.

pub mod evaluation;
pub mod responses;

// Re-export commonly used types
pub use evaluation::{EvaluationResult, FlagType, FlagValue};
pub use responses::{BulkEvaluationResponse, ErrorResponse};
