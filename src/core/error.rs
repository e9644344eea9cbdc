//! Error types for metadata operations
//!
//! This module defines the error type used throughout the crate.

use thiserror::Error;

/// Error type for metadata operations
#[derive(Debug, Error)]
pub enum MetaError {
    /// The file format was not recognised by any registered container
    #[error("unknown content format")]
    UnknownFormat,

    /// The container was recognised but carried no metadata
    #[error("no metadata found")]
    NoMeta,

    /// IO error from the underlying byte stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The input violates the container's or codec's grammar
    #[error("{0}")]
    Format(String),

    /// An encoded object exceeds a format-imposed limit
    #[error("{0}: encoded length too long")]
    TooLong(&'static str),

    /// A set operation received a value of the wrong kind
    #[error("bad value: {0}")]
    BadValue(String),

    /// Operation not supported by this container
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

impl MetaError {
    /// Structural format error with a formatted message.
    pub fn format(msg: impl Into<String>) -> Self {
        MetaError::Format(msg.into())
    }
}

/// Result type alias for metadata operations
pub type MetaResult<T> = Result<T, MetaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MetaError::format("jpeg: missing start of image marker");
        assert_eq!(err.to_string(), "jpeg: missing start of image marker");

        let err = MetaError::TooLong("jpeg");
        assert!(err.to_string().contains("too long"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MetaError = io_err.into();
        assert!(matches!(err, MetaError::Io(_)));
    }
}
