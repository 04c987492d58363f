//! Typed error handling for docgate
//!
//! Every fallible core operation returns [`DocError`]. The variants follow the
//! error taxonomy of the data layer:
//!
//! - [`DocError::Validation`]: malformed input to a core operation
//! - [`DocError::Auth`]: missing, malformed, expired or forged token
//! - [`DocError::NotFound`]: requested document absent
//! - [`DocError::Persistence`]: the store is unreachable or failed
//! - [`DocError::Conflict`]: a uniqueness constraint was violated
//!
//! Nothing in the crate retries on error. The only failure that is ever
//! absorbed is a dangling reference during resolution, which degrades to the
//! raw key instead of surfacing here.
//!
//! # Example
//!
//! ```rust,ignore
//! match users.read(&id).await {
//!     Ok(user) => println!("found {}", user.email),
//!     Err(DocError::NotFound { key, .. }) => println!("no user {}", key),
//!     Err(e) => return Err(e),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T, E = DocError> = std::result::Result<T, E>;

/// Why a request failed authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No token was presented on a protected path
    MissingToken,
    /// The signature verified but the expiry instant has passed
    Expired,
    /// Bad signature, wrong algorithm or malformed payload
    InvalidToken,
    /// Email/password pair did not match
    BadCredentials,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthFailure::MissingToken => write!(f, "missing authentication token"),
            AuthFailure::Expired => write!(f, "token has expired"),
            AuthFailure::InvalidToken => write!(f, "invalid token"),
            AuthFailure::BadCredentials => write!(f, "invalid credentials"),
        }
    }
}

/// The error type of the data layer and the authentication gate
#[derive(Debug, Error)]
pub enum DocError {
    /// Malformed input to a core operation
    #[error("validation failed: {message}")]
    Validation {
        field: Option<String>,
        message: String,
    },

    /// Authentication failed at the gate or at login
    #[error("authentication failed: {reason}")]
    Auth { reason: AuthFailure },

    /// The requested document does not exist
    #[error("{collection} with key '{key}' not found")]
    NotFound { collection: String, key: String },

    /// Store unreachable or a genuine storage failure
    #[error("storage failure during {operation}: {message}")]
    Persistence { operation: String, message: String },

    /// Uniqueness constraint violated at the store level
    #[error("conflict in {collection}: {message}")]
    Conflict { collection: String, message: String },
}

impl DocError {
    pub fn validation(message: impl Into<String>) -> Self {
        DocError::Validation {
            field: None,
            message: message.into(),
        }
    }

    pub fn field_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        DocError::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub fn auth(reason: AuthFailure) -> Self {
        DocError::Auth { reason }
    }

    pub fn not_found(collection: impl Into<String>, key: impl fmt::Display) -> Self {
        DocError::NotFound {
            collection: collection.into(),
            key: key.to_string(),
        }
    }

    pub fn persistence(operation: impl Into<String>, err: impl fmt::Display) -> Self {
        DocError::Persistence {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    pub fn conflict(collection: impl Into<String>, message: impl Into<String>) -> Self {
        DocError::Conflict {
            collection: collection.into(),
            message: message.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DocError::Validation { .. })
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, DocError::Auth { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DocError::NotFound { .. })
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, DocError::Persistence { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DocError::Conflict { .. })
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            DocError::Validation { .. } => StatusCode::BAD_REQUEST,
            DocError::Auth { .. } => StatusCode::UNAUTHORIZED,
            DocError::NotFound { .. } => StatusCode::NOT_FOUND,
            DocError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            DocError::Conflict { .. } => StatusCode::CONFLICT,
        }
    }

    /// Get the error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            DocError::Validation { .. } => "VALIDATION_ERROR",
            DocError::Auth { .. } => "AUTH_ERROR",
            DocError::NotFound { .. } => "NOT_FOUND",
            DocError::Persistence { .. } => "PERSISTENCE_ERROR",
            DocError::Conflict { .. } => "CONFLICT",
        }
    }

    /// Convert to an error response body
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            DocError::Validation {
                field: Some(field), ..
            } => Some(serde_json::json!({ "field": field })),
            DocError::NotFound { collection, key } => Some(serde_json::json!({
                "collection": collection,
                "key": key,
            })),
            _ => None,
        }
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for DocError {
    fn into_response(self) -> Response {
        if let DocError::Persistence { operation, message } = &self {
            tracing::error!(operation = %operation, error = %message, "storage failure");
        }
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            DocError::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DocError::auth(AuthFailure::Expired).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            DocError::not_found("users", "42").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            DocError::persistence("get", "connection refused").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            DocError::conflict("users", "duplicate key").status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(DocError::validation("x").error_code(), "VALIDATION_ERROR");
        assert_eq!(
            DocError::auth(AuthFailure::MissingToken).error_code(),
            "AUTH_ERROR"
        );
        assert_eq!(DocError::not_found("a", "b").error_code(), "NOT_FOUND");
        assert_eq!(
            DocError::persistence("query", "x").error_code(),
            "PERSISTENCE_ERROR"
        );
        assert_eq!(DocError::conflict("a", "b").error_code(), "CONFLICT");
    }

    #[test]
    fn test_display_messages() {
        let err = DocError::not_found("currencies", "USD");
        assert_eq!(err.to_string(), "currencies with key 'USD' not found");

        let err = DocError::auth(AuthFailure::InvalidToken);
        assert_eq!(err.to_string(), "authentication failed: invalid token");

        let err = DocError::field_validation("password", "must not be empty");
        assert_eq!(err.to_string(), "validation failed: must not be empty");
    }

    #[test]
    fn test_response_details() {
        let response = DocError::not_found("users", "abc").to_response();
        assert_eq!(response.code, "NOT_FOUND");
        let details = response.details.expect("not found carries details");
        assert_eq!(details["collection"], "users");
        assert_eq!(details["key"], "abc");

        let response = DocError::field_validation("email", "required").to_response();
        assert_eq!(response.details.expect("field details")["field"], "email");

        let response = DocError::auth(AuthFailure::Expired).to_response();
        assert!(response.details.is_none());
    }

    #[test]
    fn test_predicates() {
        assert!(DocError::validation("x").is_validation());
        assert!(DocError::auth(AuthFailure::Expired).is_auth());
        assert!(DocError::not_found("a", "b").is_not_found());
        assert!(DocError::persistence("a", "b").is_persistence());
        assert!(DocError::conflict("a", "b").is_conflict());
        assert!(!DocError::conflict("a", "b").is_not_found());
    }
}
