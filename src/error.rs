//! # Notification Error Types
//!
//! Unified error handling for the seqnotify library and CLI operations.

use thiserror::Error;

/// Notification operation result type
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Comprehensive error types for notification operations
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{service} API error: {status} - {message}")]
    ApiError {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Study with ID {0} is not found in ml warehouse")]
    StudyNotFound(String),

    #[error("Collection does not have the metadata required for ONT event email: {0}")]
    MissingMetadata(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Template rendering failed: {0}")]
    TemplateError(#[from] askama::Error),

    #[error("Invalid email address: {0}")]
    AddressError(#[from] lettre::address::AddressError),

    #[error("Failed to build email message: {0}")]
    MessageError(#[from] lettre::error::Error),

    #[error("Failed to send email: {0}")]
    SmtpError(#[from] lettre::transport::smtp::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl NotifyError {
    /// Create an API error from an HTTP response
    pub fn api_error(service: &'static str, status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            service,
            status,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}
