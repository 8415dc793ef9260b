//! API error types and the uniform error envelope.
//!
//! Every failure leaving the boundary goes through [`ApiError`]: one fixed
//! status code per kind, one structured body, one log line. Storage detail
//! behind an `Internal` error reaches the wire only in debug builds.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use steeple_core::export::ExportError;
use steeple_core::metrics::SourceError;
use steeple_core::validate::ValidationError;
use steeple_storage::StorageError;

/// API errors. Each kind maps to exactly one status code.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or out-of-range input; user-fixable, never retried.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Uniqueness violation; the conflicting record is named.
    #[error("conflict: {message}")]
    Conflict { message: String, existing_id: String },

    /// Unknown id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation not permitted in the current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Export encoding not recognized.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Storage or unexpected failure; safe for the caller to retry.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => ApiError::NotFound(what),
            StorageError::Conflict { field, existing_id } => ApiError::Conflict {
                message: format!("{field} is already in use by proxy {existing_id}"),
                existing_id,
            },
            StorageError::InvalidState(message) => ApiError::InvalidState(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<SourceError> for ApiError {
    fn from(err: SourceError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::UnsupportedFormat(token) => ApiError::UnsupportedFormat(token),
            ExportError::Encode(message) => ApiError::Internal(message),
        }
    }
}

/// Error body inside the envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: ErrorBody,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            ApiError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::InvalidState(_) => (StatusCode::BAD_REQUEST, "invalid_state"),
            ApiError::UnsupportedFormat(_) => (StatusCode::BAD_REQUEST, "unsupported_format"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let details = match &self {
            ApiError::Validation(err) => Some(json!(err.fields)),
            ApiError::Conflict { existing_id, .. } => Some(json!({ "existingId": existing_id })),
            _ => None,
        };

        // Single logging point for the whole boundary; the request span from
        // the trace layer carries method and path.
        let message = match &self {
            ApiError::Internal(detail) => {
                error!(code, detail = %detail, "request failed");
                if cfg!(debug_assertions) {
                    format!("internal error: {detail}")
                } else {
                    "internal error".to_string()
                }
            }
            other => {
                warn!(code, "request failed: {}", other);
                other.to_string()
            }
        };

        let body = ErrorEnvelope {
            success: false,
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_kind_maps_to_its_fixed_status() {
        let cases = [
            (
                ApiError::Validation(ValidationError::single("name", "required")),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Conflict {
                    message: "name taken".to_string(),
                    existing_id: "px-1".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (
                ApiError::NotFound("proxy px-9".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::InvalidState("active streams".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::UnsupportedFormat("xml".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Internal("disk".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.status_and_code().0, status);
        }
    }

    #[test]
    fn storage_conflicts_keep_the_existing_id() {
        let err = ApiError::from(StorageError::Conflict {
            field: "name",
            existing_id: "px-42".to_string(),
        });
        match err {
            ApiError::Conflict { existing_id, .. } => assert_eq!(existing_id, "px-42"),
            other => panic!("expected conflict, got {other}"),
        }
    }

    #[test]
    fn storage_internals_become_internal_errors() {
        let err = ApiError::from(StorageError::Config("pool poisoned".to_string()));
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
