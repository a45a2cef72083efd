use std::io;
use thiserror::Error;

/// Custom error types for the LEDENET driver
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Protocol detection failed: {0}")]
    ProtocolDetection(String),

    #[error("Could not determine operating mode from device state")]
    UnknownMode,

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Unrecognized timer format: pattern code {0:#04x}")]
    UnrecognizedTimerFormat(u8),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Creates a new protocol detection error
    pub fn protocol_detection(msg: impl Into<String>) -> Self {
        Error::ProtocolDetection(msg.into())
    }

    /// Creates a new unsupported operation error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Creates a new invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Returns true for transport-level failures that the session retry
    /// loop is allowed to absorb
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}
