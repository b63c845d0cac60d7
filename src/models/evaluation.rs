//! Evaluation result model
//!
//! A flag value is a boolean, a string or a number. The declared type travels
//! alongside the value so callers can detect mismatches before converting.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FlagError, Result};

// == Flag Type ==
/// Declared type of a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagType {
    Boolean,
    String,
    Number,
}

impl fmt::Display for FlagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlagType::Boolean => "BOOLEAN",
            FlagType::String => "STRING",
            FlagType::Number => "NUMBER",
        };
        f.write_str(name)
    }
}

// == Flag Value ==
/// Raw scalar value of an evaluated flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Num(f64),
    Str(String),
}

impl FlagValue {
    /// Returns the type this value actually holds.
    pub fn kind(&self) -> FlagType {
        match self {
            FlagValue::Bool(_) => FlagType::Boolean,
            FlagValue::Num(_) => FlagType::Number,
            FlagValue::Str(_) => FlagType::String,
        }
    }

    // == Typed Views ==
    /// Reads a boolean, or fails with `FlagError::TypeMismatch`.
    pub fn as_bool(&self) -> Result<bool> {
        match self {
            FlagValue::Bool(b) => Ok(*b),
            other => Err(other.mismatch(FlagType::Boolean)),
        }
    }

    /// Reads a string, or fails with `FlagError::TypeMismatch`.
    pub fn as_str(&self) -> Result<&str> {
        match self {
            FlagValue::Str(s) => Ok(s),
            other => Err(other.mismatch(FlagType::String)),
        }
    }

    /// Reads a number as an integer.
    ///
    /// Fractional values are truncated toward zero and out-of-range values
    /// saturate at the `i64` bounds; NaN reads as zero.
    pub fn as_i64(&self) -> Result<i64> {
        match self {
            FlagValue::Num(n) => Ok(*n as i64),
            other => Err(other.mismatch(FlagType::Number)),
        }
    }

    /// Reads a number as a float.
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            FlagValue::Num(n) => Ok(*n),
            other => Err(other.mismatch(FlagType::Number)),
        }
    }

    fn mismatch(&self, expected: FlagType) -> FlagError {
        FlagError::TypeMismatch {
            expected,
            actual: self.kind(),
        }
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        FlagValue::Bool(value)
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        FlagValue::Str(value.to_string())
    }
}

impl From<String> for FlagValue {
    fn from(value: String) -> Self {
        FlagValue::Str(value)
    }
}

impl From<f64> for FlagValue {
    fn from(value: f64) -> Self {
        FlagValue::Num(value)
    }
}

impl From<i64> for FlagValue {
    fn from(value: i64) -> Self {
        FlagValue::Num(value as f64)
    }
}

// == Evaluation Result ==
/// Outcome of evaluating one flag for one user.
///
/// Produced by a remote evaluator and never mutated once cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    /// Key of the evaluated flag
    pub flag_key: String,
    /// Evaluated value
    pub value: FlagValue,
    /// Declared flag type
    #[serde(rename = "type")]
    pub flag_type: FlagType,
    /// True when the flag's default value was served rather than a variant
    #[serde(default)]
    pub is_default: bool,
    /// Variant the user was bucketed into, if any
    #[serde(default)]
    pub variant_id: Option<String>,
}

impl EvaluationResult {
    /// Creates a result whose declared type matches its value.
    pub fn new(flag_key: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        let value = value.into();
        Self {
            flag_key: flag_key.into(),
            flag_type: value.kind(),
            value,
            is_default: false,
            variant_id: None,
        }
    }

    /// Sets the variant the user was bucketed into.
    pub fn with_variant(mut self, variant_id: impl Into<String>) -> Self {
        self.variant_id = Some(variant_id.into());
        self
    }

    /// Marks the result as the flag's default value.
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_boolean_result() {
        let json = r#"{"flagKey":"dark-mode","value":true,"type":"BOOLEAN","isDefault":false,"variantId":null}"#;
        let result: EvaluationResult = serde_json::from_str(json).unwrap();

        assert_eq!(result.flag_key, "dark-mode");
        assert_eq!(result.value, FlagValue::Bool(true));
        assert_eq!(result.flag_type, FlagType::Boolean);
        assert!(!result.is_default);
        assert!(result.variant_id.is_none());
    }

    #[test]
    fn test_deserialize_number_without_variant_field() {
        let json = r#"{"flagKey":"rate-limit","value":250,"type":"NUMBER","isDefault":true}"#;
        let result: EvaluationResult = serde_json::from_str(json).unwrap();

        assert_eq!(result.value, FlagValue::Num(250.0));
        assert!(result.is_default);
        assert!(result.variant_id.is_none());
    }

    #[test]
    fn test_deserialize_string_with_variant() {
        let json = r#"{"flagKey":"theme","value":"blue","type":"STRING","isDefault":false,"variantId":"7c9e6679-7425-40de-944b-e07fc1f90ae7"}"#;
        let result: EvaluationResult = serde_json::from_str(json).unwrap();

        assert_eq!(result.value.as_str().unwrap(), "blue");
        assert_eq!(
            result.variant_id.as_deref(),
            Some("7c9e6679-7425-40de-944b-e07fc1f90ae7")
        );
    }

    #[test]
    fn test_serialize_uses_wire_names() {
        let result = EvaluationResult::new("beta", true).with_variant("v1");
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["flagKey"], "beta");
        assert_eq!(json["type"], "BOOLEAN");
        assert_eq!(json["isDefault"], false);
        assert_eq!(json["variantId"], "v1");
    }

    #[test]
    fn test_as_i64_truncates_toward_zero() {
        assert_eq!(FlagValue::Num(3.9).as_i64().unwrap(), 3);
        assert_eq!(FlagValue::Num(-3.9).as_i64().unwrap(), -3);
        assert_eq!(FlagValue::Num(42.0).as_i64().unwrap(), 42);
    }

    #[test]
    fn test_as_i64_saturates_and_maps_nan_to_zero() {
        assert_eq!(FlagValue::Num(1e300).as_i64().unwrap(), i64::MAX);
        assert_eq!(FlagValue::Num(-1e300).as_i64().unwrap(), i64::MIN);
        assert_eq!(FlagValue::Num(f64::NAN).as_i64().unwrap(), 0);
    }

    #[test]
    fn test_conversion_mismatch_is_typed() {
        let err = FlagValue::Str("on".into()).as_bool().unwrap_err();
        assert!(matches!(
            err,
            FlagError::TypeMismatch {
                expected: FlagType::Boolean,
                actual: FlagType::String
            }
        ));

        assert!(FlagValue::Bool(true).as_f64().is_err());
        assert!(FlagValue::Num(1.0).as_str().is_err());
    }

    #[test]
    fn test_new_derives_type_from_value() {
        assert_eq!(EvaluationResult::new("a", true).flag_type, FlagType::Boolean);
        assert_eq!(EvaluationResult::new("b", "x").flag_type, FlagType::String);
        assert_eq!(EvaluationResult::new("c", 1.5).flag_type, FlagType::Number);
        assert!(EvaluationResult::new("d", 7i64).as_default().is_default);
    }
}
