//! Crate-level error type.
//!
//! Recording calls only surface [`ExtrasError::InvalidArgument`] to test code;
//! capture and formatting failures are logged and degrade the entry instead.

use thiserror::Error;

use crate::capture::CaptureError;
use crate::config::ConfigError;
use crate::document::FormatError;

/// Result type for report-extras operations
pub type ExtrasResult<T> = Result<T, ExtrasError>;

/// Error types for report-extras operations
#[derive(Debug, Error)]
pub enum ExtrasError {
    /// Caller misuse, e.g. both `body` and `source` on one attachment
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Bad session-level option
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// Screenshot or page-source capture failed
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Malformed structured document
    #[error(transparent)]
    Format(#[from] FormatError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ExtrasError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ExtrasError::InvalidArgument(msg.into())
    }
}
