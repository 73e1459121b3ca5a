//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::db::DbError;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error message.
/// Database internals are never leaked to clients: connectivity and
/// statement failures both surface as a generic 500 while the detail goes
/// to the logs.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Data-access failure, after the layer's own retry policy is
    /// exhausted.
    #[error("database error: {0}")]
    Database(#[from] DbError),

    /// Missing or invalid bearer token.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("authentication required")]
    AuthRequired,

    /// Username/password pair did not match an account.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The authenticated account lacks admin privileges.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("admin privileges required")]
    AdminRequired,

    /// Username already registered.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("username already taken")]
    UsernameTaken,

    /// The email verification token is unknown or already used.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("invalid verification token")]
    VerificationInvalid,

    /// The requested table is not exposed through the admin back-office.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("unknown table")]
    UnknownTable,

    /// A referenced record does not exist.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("record not found")]
    RecordNotFound,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request; the String carries the detail.
    #[error("invalid request")]
    Validation(String),
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
            AppError::Database(ref err) => {
                tracing::error!(error = %err, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::AuthRequired => (
                StatusCode::UNAUTHORIZED,
                "auth_required",
                self.to_string(),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                self.to_string(),
            ),
            AppError::AdminRequired => {
                (StatusCode::FORBIDDEN, "admin_required", self.to_string())
            }
            AppError::UsernameTaken => {
                (StatusCode::CONFLICT, "username_taken", self.to_string())
            }
            AppError::VerificationInvalid => (
                StatusCode::BAD_REQUEST,
                "invalid_verification_token",
                self.to_string(),
            ),
            AppError::UnknownTable => {
                (StatusCode::NOT_FOUND, "unknown_table", self.to_string())
            }
            AppError::RecordNotFound => {
                (StatusCode::NOT_FOUND, "record_not_found", self.to_string())
            }
            AppError::Validation(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
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
