//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde_json::json;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Validation**: Malformed or missing request fields. Detected before
///   any storage mutation.
/// - **NotFound**: Requested resource does not exist or is soft-deleted.
///   Used on read and delete-by-id paths (404); mutation paths that
///   reference a missing entity surface a `Validation` message instead,
///   since their contract is a 400.
/// - **InsufficientFunds**: Source balance is below the requested amount.
///   Carries both figures for the user-facing message.
/// - **InvariantViolation**: The request is well-formed but would break a
///   business rule (self-transfer, duplicate main account, deleting a main
///   or non-zero-balance account, spending limit exceeded).
/// - **Conflict**: A unique constraint fired in the store (duplicate
///   username/email), translated to a domain message.
/// - **Database**: Any other storage failure. The in-flight unit of work is
///   rolled back before this surfaces; details are hidden from the client.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("insufficient funds: available {available}, required {required}")]
    InsufficientFunds {
        available: Decimal,
        required: Decimal,
    },

    #[error("{0}")]
    InvariantViolation(String),

    #[error("{0}")]
    Conflict(String),

    /// Database operation failed (connection error, query error, failed
    /// commit). Wraps any sqlx::Error via `#[from]`.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    /// Translate a storage error into a domain error where possible.
    ///
    /// Unique-constraint violations become `Conflict` with the given
    /// message instead of leaking a generic 500.
    pub fn from_db(err: sqlx::Error, conflict_message: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(conflict_message.to_string())
            }
            _ => AppError::Database(err),
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Validation(ref msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
            }
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::InsufficientFunds { .. } => (
                StatusCode::BAD_REQUEST,
                "insufficient_funds",
                self.to_string(),
            ),
            AppError::InvariantViolation(ref msg) => {
                (StatusCode::BAD_REQUEST, "invariant_violation", msg.clone())
            }
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred".to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn status_codes_match_taxonomy() {
        let cases = [
            (AppError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (AppError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (
                AppError::InsufficientFunds {
                    available: dec!(20.00),
                    required: dec!(50.00),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::InvariantViolation("nope".into()),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::Conflict("dup".into()), StatusCode::CONFLICT),
            (
                AppError::Database(sqlx::Error::RowNotFound),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn insufficient_funds_reports_both_amounts() {
        let err = AppError::InsufficientFunds {
            available: dec!(20.00),
            required: dec!(50.00),
        };
        let msg = err.to_string();
        assert!(msg.contains("20.00"));
        assert!(msg.contains("50.00"));
    }
}
