//! Transport layer errors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Transport error: {0}")]
    Io(String),

    #[error("Receive timeout")]
    ReceiveTimeout,
}

impl TransportError {
    /// Classify a failed connect attempt
    pub(crate) fn from_connect(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => TransportError::ConnectionTimeout,
            _ => TransportError::ConnectionRefused(err.to_string()),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}
