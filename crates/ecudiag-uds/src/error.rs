//! Flat error taxonomy shared by every layer
//!
//! Transport and UDS errors are raised by their own layers; [`ErrorKind`]
//! names the category a caller can match on without caring which layer
//! produced it.

use serde::{Deserialize, Serialize};

use crate::transport::TransportError;
use crate::uds::UdsError;

/// Error category reported across the external boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// `connect` while a session is already active
    AlreadyConnected,
    ConnectionTimeout,
    ConnectionRefused,
    NotConnected,
    /// Send/receive I/O failure, including the peer closing the stream
    TransportError,
    /// No final response within the deadline
    ReceiveTimeout,
    RoutingActivationDenied,
    /// Key requested before any seed was received
    NoSeedAvailable,
    UnsupportedSecurityLevel,
    MalformedRequest,
    UnsupportedService,
    /// The ECU answered with a negative response
    NegativeResponse,
    /// The ECU answered with something that is neither positive nor negative
    InvalidResponse,
}

impl From<&TransportError> for ErrorKind {
    fn from(err: &TransportError) -> Self {
        match err {
            TransportError::ConnectionTimeout => ErrorKind::ConnectionTimeout,
            TransportError::ConnectionRefused(_) => ErrorKind::ConnectionRefused,
            TransportError::NotConnected => ErrorKind::NotConnected,
            TransportError::Io(_) => ErrorKind::TransportError,
            TransportError::ReceiveTimeout => ErrorKind::ReceiveTimeout,
        }
    }
}

impl From<&UdsError> for ErrorKind {
    fn from(err: &UdsError) -> Self {
        match err {
            UdsError::Transport(e) => e.into(),
            UdsError::RoutingActivationDenied(_) => ErrorKind::RoutingActivationDenied,
            UdsError::NoSeedAvailable => ErrorKind::NoSeedAvailable,
            UdsError::UnsupportedSecurityLevel(_) => ErrorKind::UnsupportedSecurityLevel,
            UdsError::MalformedRequest(_) => ErrorKind::MalformedRequest,
            UdsError::UnsupportedService(_) => ErrorKind::UnsupportedService,
            UdsError::NegativeResponse { .. } => ErrorKind::NegativeResponse,
            UdsError::InvalidResponse(_) => ErrorKind::InvalidResponse,
        }
    }
}

impl UdsError {
    /// Category of this error in the flat taxonomy
    pub fn kind(&self) -> ErrorKind {
        self.into()
    }

    /// Whether the error leaves the session unusable
    ///
    /// A lost stream cannot be resumed; the caller has to connect again.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            UdsError::Transport(TransportError::Io(_) | TransportError::NotConnected)
                | UdsError::RoutingActivationDenied(_)
        )
    }
}
