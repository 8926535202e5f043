use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::classify::RetrySignal;

/// PostgREST reports an update that matched no rows (e.g. a stale version
/// filter) with this code.
const NO_ROWS_UPDATED_CODE: &str = "PGRST116";

/// General-purpose failure for wrapped operations. Deserializes from
/// PostgREST-style error bodies (`{ "message", "code", ... }`).
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct OperationError {
    pub message: String,
    #[serde(default, alias = "statusCode")]
    pub status: Option<u16>,
    #[serde(default)]
    pub code: Option<String>,
}

impl OperationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            code: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl RetrySignal for OperationError {
    fn status_code(&self) -> Option<u16> {
        self.status
    }

    fn error_code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    fn message(&self) -> String {
        self.message.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError {
    #[error("operation panicked: {0}")]
    Panicked(String),
    #[error("operation failed after {attempts} attempts: {message}")]
    Exhausted { attempts: u32, message: String },
}

impl RetryError {
    fn code(&self) -> &'static str {
        match self {
            Self::Panicked(_) => "RETRY/PANIC",
            Self::Exhausted { .. } => "RETRY/EXHAUSTED",
        }
    }
}

impl From<RetryError> for OperationError {
    fn from(err: RetryError) -> Self {
        let code = err.code();
        OperationError::new(err.to_string()).with_code(code)
    }
}

impl From<RetryError> for String {
    fn from(err: RetryError) -> Self {
        err.to_string()
    }
}

impl From<RetryError> for Value {
    fn from(err: RetryError) -> Self {
        json!({
            "code": err.code(),
            "message": err.to_string(),
        })
    }
}

/// Optimistic-locking failure: the row changed since it was read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "Version conflict on {entity_type} {entity_id}: expected {expected_version}, found {actual_version}"
)]
pub struct VersionConflictError {
    pub entity_type: String,
    pub entity_id: String,
    pub expected_version: i64,
    pub actual_version: i64,
}

impl VersionConflictError {
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        expected_version: i64,
        actual_version: i64,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            expected_version,
            actual_version,
        }
    }
}

impl RetrySignal for VersionConflictError {
    fn status_code(&self) -> Option<u16> {
        Some(409)
    }
}

pub fn is_version_conflict<E>(error: &E) -> bool
where
    E: RetrySignal + ?Sized,
{
    if error.error_code() == Some(NO_ROWS_UPDATED_CODE) {
        return true;
    }

    let message = error.message().to_ascii_lowercase();
    let version_then_conflict = message
        .find("version")
        .is_some_and(|start| message[start..].contains("conflict"));
    version_then_conflict || message.contains("row was updated")
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{OperationError, RetryError, VersionConflictError, is_version_conflict};
    use crate::classify::{RetrySignal, is_retryable_error};

    #[test]
    fn version_conflict_error_formats_and_is_detected() {
        let err = VersionConflictError::new("shift", "42", 3, 4);
        assert_eq!(
            err.to_string(),
            "Version conflict on shift 42: expected 3, found 4"
        );
        assert!(is_version_conflict(&err));
        assert!(!is_retryable_error(&err));
    }

    #[test]
    fn detects_conflicts_by_code_and_message() {
        let by_code = OperationError::new("JSON object requested, multiple (or no) rows returned")
            .with_code("PGRST116");
        assert!(is_version_conflict(&by_code));

        assert!(is_version_conflict(&json!({ "message": "row was updated by another user" })));
        assert!(is_version_conflict(&"Schedule version mismatch: conflict detected"));
        assert!(!is_version_conflict(&"conflict before version"));
        assert!(!is_version_conflict(&OperationError::new("permission denied")));
    }

    #[test]
    fn operation_error_reads_postgrest_body() {
        let err: OperationError = serde_json::from_value(json!({
            "message": "duplicate key value violates unique constraint",
            "code": "23505",
            "details": "Key (id)=(7) already exists.",
            "hint": null
        }))
        .expect("error body should deserialize");

        assert_eq!(err.code.as_deref(), Some("23505"));
        assert_eq!(err.status, None);
        assert!(!is_retryable_error(&err));
    }

    #[test]
    fn retry_errors_convert_into_common_error_shapes() {
        let operation: OperationError = RetryError::Panicked("boom".to_string()).into();
        assert_eq!(operation.message, "operation panicked: boom");
        assert_eq!(operation.error_code(), Some("RETRY/PANIC"));

        let value: Value = RetryError::Exhausted {
            attempts: 4,
            message: "service unavailable".to_string(),
        }
        .into();
        assert_eq!(value["code"], "RETRY/EXHAUSTED");
        assert_eq!(
            RetrySignal::message(&value),
            "operation failed after 4 attempts: service unavailable"
        );
    }
}
