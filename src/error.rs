//! Error types for the hydroponic monitor
//!
//! Every failure the service can report falls into one of three client-facing
//! classes: bad input (`Validation`), an unusable persistence medium
//! (`Storage` / `Timeout`), or the wrong HTTP verb (`MethodNotAllowed`).
//! Startup problems are reported as `Config` and never reach a client.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

/// Result type alias for monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Error types for monitor operations
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Missing, non-numeric or out-of-range submission field
    #[error("{0}")]
    Validation(String),

    /// Persistence medium unreachable, unwritable or closed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Storage round trip exceeded its budget
    #[error("Storage operation timed out: {0}")]
    Timeout(String),

    /// Wrong HTTP verb for an endpoint
    #[error("{0}")]
    MethodNotAllowed(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Structured error code for machine-readable error handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Input errors (1400-1499)
    ValidationFailed,
    MethodNotAllowed,

    // Configuration errors (1200-1299)
    ConfigurationInvalid,

    // Storage errors (1500-1599)
    StorageUnavailable,
    StorageTimeout,
    DataCorrupted,
}

impl ErrorCode {
    /// Get numeric error code
    pub fn as_number(&self) -> u32 {
        match self {
            ErrorCode::ConfigurationInvalid => 1201,

            ErrorCode::ValidationFailed => 1401,
            ErrorCode::MethodNotAllowed => 1402,

            ErrorCode::StorageUnavailable => 1501,
            ErrorCode::StorageTimeout => 1502,
            ErrorCode::DataCorrupted => 1503,
        }
    }

    /// Get error category
    pub fn category(&self) -> &'static str {
        match self.as_number() {
            1200..=1299 => "configuration",
            1400..=1499 => "input",
            1500..=1599 => "storage",
            _ => "unknown",
        }
    }
}

impl MonitorError {
    /// Create a validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a method-not-allowed error
    pub fn method_not_allowed<S: Into<String>>(msg: S) -> Self {
        Self::MethodNotAllowed(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Map error to its structured code
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            MonitorError::Validation(_) => ErrorCode::ValidationFailed,
            MonitorError::MethodNotAllowed(_) => ErrorCode::MethodNotAllowed,
            MonitorError::Config(_) => ErrorCode::ConfigurationInvalid,
            MonitorError::Storage(_) | MonitorError::Io(_) => ErrorCode::StorageUnavailable,
            MonitorError::Timeout(_) => ErrorCode::StorageTimeout,
            MonitorError::Json(_) => ErrorCode::DataCorrupted,
        }
    }

    /// HTTP status code this error maps to
    pub fn http_status(&self) -> u16 {
        match self {
            MonitorError::Validation(_) => 400,
            MonitorError::MethodNotAllowed(_) => 405,
            _ => 500,
        }
    }

    /// True for failures of the persistence medium
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self.to_error_code(),
            ErrorCode::StorageUnavailable | ErrorCode::StorageTimeout | ErrorCode::DataCorrupted
        )
    }

    /// Message that is safe to hand to a client.
    ///
    /// Input and verb errors are returned verbatim; storage failures keep
    /// their summary but drop OS-level detail such as file paths.
    pub fn sanitized_message(&self) -> String {
        match self {
            MonitorError::Validation(msg) | MonitorError::MethodNotAllowed(msg) => msg.clone(),
            MonitorError::Storage(msg) => format!("Database error: {msg}"),
            MonitorError::Timeout(_) => "Database error: operation timed out".to_string(),
            MonitorError::Io(e) => format!("Database error: {}", e.kind()),
            MonitorError::Json(_) => "Database error: stored data could not be encoded".to_string(),
            MonitorError::Config(_) => "Server misconfigured".to_string(),
        }
    }
}

/// Error reporting helpers shared by the HTTP layer
pub struct ErrorReporter;

impl ErrorReporter {
    /// Log an error at a level matching its class
    pub fn log_error(error: &MonitorError, operation: &str) {
        let code = error.to_error_code();
        if error.http_status() >= 500 {
            error!(
                code = code.as_number(),
                category = code.category(),
                operation,
                "{error}"
            );
        } else {
            warn!(
                code = code.as_number(),
                category = code.category(),
                operation,
                "{error}"
            );
        }
    }

    /// Format error for the API wire format
    pub fn format_api_error(error: &MonitorError) -> serde_json::Value {
        serde_json::json!({
            "success": false,
            "error": error.sanitized_message(),
        })
    }
}

#[cfg(feature = "http-server")]
impl axum::response::IntoResponse for MonitorError {
    fn into_response(self) -> axum::response::Response {
        let status = axum::http::StatusCode::from_u16(self.http_status())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        (status, axum::Json(ErrorReporter::format_api_error(&self))).into_response()
    }
}
