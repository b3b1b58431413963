//! Error taxonomy for the FormHouse service.
//!
//! Every failure a request can surface is one of the variants below. Each
//! variant carries a machine-readable kind (serialized as `error` in the JSON
//! body) and a human-readable message (`message`), and maps to a single HTTP
//! status. Storage misconfiguration is deliberately distinct from validation
//! failure and from unexpected internal errors so that operators can tell a
//! sharing problem apart from a bug.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// A required submission field is missing or empty, or the request is
    /// otherwise malformed.
    #[error("{message}")]
    Validation { message: String },

    /// An uploaded file exceeds the configured per-file size ceiling.
    #[error("{message}")]
    FileTooLarge { message: String },

    /// The active storage provider has no implementation for the requested
    /// operation (file listing, root diagnostics).
    #[error("{message}")]
    Unsupported { message: String },

    /// The configured folder reference is neither a bare identifier nor a
    /// recognizable folder URL.
    #[error("Invalid folder reference: {reference}")]
    InvalidReference { reference: String },

    /// A referenced folder or file does not exist or is not visible to the
    /// acting identity.
    #[error("{resource} not found")]
    NotFound { resource: String, message: String },

    /// The acting identity lacks write capability on the target folder.
    #[error("Permission denied on {resource}")]
    PermissionDenied { resource: String, message: String },

    /// The folder exists but its parent chain never reaches the trusted
    /// root: it was silently placed outside the shared tree.
    #[error("Folder {folder} is not inside the shared storage tree")]
    OrphanedLocation { folder: String, message: String },

    /// The provider rejected a write citing quota on an identity that owns
    /// no quota. The fix is sharing permissions, not freeing space.
    #[error("Storage quota unavailable")]
    StorageQuotaUnavailable { message: String },

    /// The storage backend is not configured or cannot be reached.
    #[error("{message}")]
    StorageUnavailable { message: String },

    /// Unexpected error with full context chain.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation { .. } | Error::FileTooLarge { .. } | Error::Unsupported { .. } => {
                StatusCode::BAD_REQUEST
            }
            Error::InvalidReference { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            // NotFound is a storage-tree problem the operator fixes by
            // sharing or restoring the folder, not a missing API resource
            Error::NotFound { .. }
            | Error::PermissionDenied { .. }
            | Error::OrphanedLocation { .. }
            | Error::StorageQuotaUnavailable { .. }
            | Error::StorageUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable kind, stable across message wording changes.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "validation_error",
            Error::FileTooLarge { .. } => "file_too_large",
            Error::Unsupported { .. } => "unsupported_operation",
            Error::InvalidReference { .. } => "invalid_reference",
            Error::NotFound { .. } => "not_found",
            Error::PermissionDenied { .. } => "permission_denied",
            Error::OrphanedLocation { .. } => "orphaned_location",
            Error::StorageQuotaUnavailable { .. } => "storage_quota_unavailable",
            Error::StorageUnavailable { .. } => "storage_unavailable",
            Error::Other(_) => "internal_error",
        }
    }

    /// Returns a user-safe message, without leaking internal details.
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation { message }
            | Error::FileTooLarge { message }
            | Error::Unsupported { message }
            | Error::StorageUnavailable { message }
            | Error::StorageQuotaUnavailable { message } => message.clone(),
            Error::InvalidReference { reference } => {
                format!("The configured folder reference \"{reference}\" is not a valid folder ID or URL")
            }
            Error::NotFound { resource, message } => {
                format!("{resource} not found. {message}")
            }
            Error::PermissionDenied { resource, message } => {
                format!("Permission denied on {resource}. {message}")
            }
            Error::OrphanedLocation { folder, message } => {
                format!("Folder \"{folder}\" is not inside the shared storage tree. {message}")
            }
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full details here so handlers can just use `?`.
        match &self {
            Error::Other(_) | Error::InvalidReference { .. } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::NotFound { .. }
            | Error::PermissionDenied { .. }
            | Error::OrphanedLocation { .. }
            | Error::StorageQuotaUnavailable { .. }
            | Error::StorageUnavailable { .. } => {
                tracing::warn!("Storage error: {}", self);
            }
            Error::Validation { .. } | Error::FileTooLarge { .. } | Error::Unsupported { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = serde_json::json!({
            "error": self.kind(),
            "message": self.user_message(),
        });
        (status, Json(body)).into_response()
    }
}

/// Type alias for fallible service operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        let cases = [
            (
                Error::Validation {
                    message: "missing field".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            // Oversized uploads are a client error like any other bad input
            (
                Error::FileTooLarge {
                    message: "too big".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                Error::Unsupported {
                    message: "no listing here".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                Error::StorageUnavailable {
                    message: "not configured".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                Error::PermissionDenied {
                    resource: "folder x".into(),
                    message: "share it".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                Error::OrphanedLocation {
                    folder: "y".into(),
                    message: "outside tree".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            // A vanished folder is an operator problem, not a bad route
            (
                Error::NotFound {
                    resource: "folder z".into(),
                    message: "gone".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (Error::Other(anyhow::anyhow!("boom")), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status_code(), expected, "wrong status for {}", err.kind());
        }
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = Error::Other(anyhow::anyhow!("secret connection string"));
        assert!(!err.user_message().contains("secret"));
    }
}
