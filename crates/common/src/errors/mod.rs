//! Error types for LexForge services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - Error codes for client handling
//! - Stable kind slugs for machine-readable fallback reasons

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    MissingField,
    InvalidFormat,

    // Resource errors (4xxx)
    NotFound,

    // External service errors (8xxx)
    OracleError,
    OracleTimeout,
    UpstreamError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::MissingField => 1002,
            ErrorCode::InvalidFormat => 1003,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,

            // External (8xxx)
            ErrorCode::OracleError => 8001,
            ErrorCode::OracleTimeout => 8002,
            ErrorCode::UpstreamError => 8003,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    // External service errors
    #[error("Rerank oracle error: {message}")]
    OracleError { message: String },

    #[error("Rerank oracle timeout after {timeout_ms}ms")]
    OracleTimeout { timeout_ms: u64 },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::OracleError { .. } => ErrorCode::OracleError,
            AppError::OracleTimeout { .. } => ErrorCode::OracleTimeout,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Stable snake_case slug identifying the error family.
    ///
    /// Used to compose machine-readable fallback reasons such as
    /// `rerank_init_error:config`, so the slugs are part of the audit
    /// contract and must not change casually.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation",
            AppError::MissingField { .. } => "missing_field",
            AppError::InvalidFormat { .. } => "invalid_format",
            AppError::NotFound { .. } => "not_found",
            AppError::OracleError { .. } => "oracle",
            AppError::OracleTimeout { .. } => "oracle_timeout",
            AppError::HttpClient(_) => "http",
            AppError::Internal { .. } => "internal",
            AppError::Configuration { .. } => "config",
            AppError::Serialization(_) => "serde",
            AppError::Other(_) => "other",
        }
    }

    /// Check if this error is transient (retry may succeed)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::OracleError { .. } | AppError::OracleTimeout { .. } | AppError::HttpClient(_)
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}
