//! Success/failure envelope handed to whatever transport sits in front.

use serde::Serialize;

use crate::storage::DatabaseError;

use super::error::LifecycleError;

/// Every lifecycle operation reports a discriminator plus a human-readable
/// message; `data` carries the payload on success, `code` the error kind on
/// failure.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Outcome<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            code: None,
            data: Some(data),
        }
    }

    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            code: Some(code),
            data: None,
        }
    }

    pub fn failed(err: &LifecycleError) -> Self {
        Self::error(err.code(), err.to_string())
    }

    pub fn from_result(result: Result<T, LifecycleError>, message: impl Into<String>) -> Self {
        match result {
            Ok(data) => Self::ok(message, data),
            Err(e) => Self::failed(&e),
        }
    }

    /// Envelope for direct store commands (node and customer management).
    pub fn from_store(result: Result<T, DatabaseError>, message: impl Into<String>) -> Self {
        match result {
            Ok(data) => Self::ok(message, data),
            Err(e) => Self::error(store_error_code(&e), e.to_string()),
        }
    }
}

impl Outcome<i64> {
    /// Envelope for row-affecting store commands that report `true` when a
    /// row matched; no match is `not_found`.
    pub fn from_row_change(
        result: Result<bool, DatabaseError>,
        entity: &str,
        id: i64,
        verb: &str,
    ) -> Self {
        match result {
            Ok(true) => Self::ok(format!("{entity} {id} {verb}"), id),
            Ok(false) => Self::error("not_found", format!("{entity} {id} not found")),
            Err(e) => Self::error(store_error_code(&e), e.to_string()),
        }
    }
}

const fn store_error_code(err: &DatabaseError) -> &'static str {
    match err {
        DatabaseError::Invalid(_) => "invalid_input",
        DatabaseError::NotFound(_) => "not_found",
        _ => "storage_error",
    }
}
