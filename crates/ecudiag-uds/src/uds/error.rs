//! UDS protocol errors

use thiserror::Error;

use super::NegativeResponseCode;
use crate::transport::TransportError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UdsError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Routing activation denied: {0}")]
    RoutingActivationDenied(String),

    #[error("No security seed available, request a seed first")]
    NoSeedAvailable,

    #[error("Unsupported security level 0x{0:02X}")]
    UnsupportedSecurityLevel(u8),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Unsupported service 0x{0:02X}")]
    UnsupportedService(u8),

    #[error("Negative response: {nrc} (0x{nrc:02X}) for service 0x{service_id:02X}")]
    NegativeResponse {
        service_id: u8,
        nrc: NegativeResponseCode,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
