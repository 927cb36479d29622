//! Error types for the common crate
//!
//! This module defines the error type shared by every library crate of the
//! upscaler, together with the coarse [`ErrorKind`] taxonomy the HTTP layer
//! maps onto status codes.

use std::fmt;
use thiserror::Error;

/// Result type for upscaler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for upscaler operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Weight artifact could not be fetched or installed
    #[error("Download failed: {0}")]
    Download(String),

    /// Backend could not be constructed from the weight artifact
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    /// Image could not be decoded or encoded
    #[error("Image IO failed: {0}")]
    ImageIo(String),

    /// Inference error
    #[error("Inference error: {0}")]
    Inference(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid argument error
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Upload content is not an image
    #[error("Unsupported content: {0}")]
    UnsupportedContent(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure class of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Model construction or weight acquisition failed; fatal at startup
    Setup,
    /// Caller supplied a bad request
    Validation,
    /// Requested file does not exist
    NotFound,
    /// Disk or codec failure while serving a request
    Io,
    /// Backend failure while running the network
    Inference,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Setup => write!(f, "setup"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Io => write!(f, "io"),
            ErrorKind::Inference => write!(f, "inference"),
        }
    }
}

impl Error {
    /// Returns the failure class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) | Error::Download(_) | Error::ModelLoad(_) => ErrorKind::Setup,
            Error::InvalidArgument(_) | Error::UnsupportedContent(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Io(_) | Error::ImageIo(_) => ErrorKind::Io,
            Error::Inference(_) | Error::Internal(_) => ErrorKind::Inference,
        }
    }

    /// Returns true if the error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Returns true if the error was caused by the caller
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(Error::Download("404".into()).kind(), ErrorKind::Setup);
        assert_eq!(Error::UnsupportedContent("text/plain".into()).kind(), ErrorKind::Validation);
        assert_eq!(Error::NotFound("a.png".into()).kind(), ErrorKind::NotFound);
        assert_eq!(Error::ImageIo("bad header".into()).kind(), ErrorKind::Io);
        assert_eq!(Error::Inference("oom".into()).kind(), ErrorKind::Inference);
    }

    #[test]
    fn test_io_error_converts() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("denied"));
    }
}
