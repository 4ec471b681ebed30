//! Error types for Tollgate.

use thiserror::Error;

/// Main error type for Tollgate operations.
///
/// A denied request is not an error: admission checks return `false`
/// (or [`Decision::Denied`](crate::ratelimit::Decision::Denied)) instead.
#[derive(Error, Debug)]
pub enum TollgateError {
    /// A limiter was built from parameters it cannot honor
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The operation needs a component the limiter's strategy lacks
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Configuration loading or parsing errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Tollgate operations.
pub type Result<T> = std::result::Result<T, TollgateError>;
