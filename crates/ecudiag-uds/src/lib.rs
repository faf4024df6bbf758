//! ecudiag-uds - UDS over DoIP diagnostic client core
//!
//! This crate provides the protocol engine of a diagnostic tester that talks
//! to automotive ECUs using UDS (ISO 14229) carried over DoIP (ISO 13400).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ClientManager                           │
//! │  (service id, hex data) -> DiagnosticResult                 │
//! │                          │                                  │
//! │                    ┌─────┴─────┐    ┌──────────────────┐    │
//! │                    │UdsSession │────│ security (cipher)│    │
//! │                    │(protocol) │    └──────────────────┘    │
//! │                    └─────┬─────┘                            │
//! │                          │                                  │
//! │                 ┌────────┴────────┐                         │
//! │                 │    Transport    │                         │
//! │                 │  (TCP / mock)   │                         │
//! │                 └────────┬────────┘                         │
//! │                          │                                  │
//! │                     ┌────┴────┐                             │
//! │                     │  codec  │  DoIP header + byte utils   │
//! │                     └─────────┘                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A session is owned by exactly one caller. Operations take `&mut self` and
//! must not be driven from more than one task at a time: responses carry no
//! per-request tag, so interleaved requests could not be told apart.

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod ping;
pub mod security;
pub mod transport;
pub mod uds;

pub use client::{ClientManager, DiagnosticResult, TransportFactory};
pub use codec::{DoipFrame, DoipHeader};
pub use config::{ConnectionConfig, SecurityConfig};
pub use error::ErrorKind;
pub use ping::{ping_host, PingMethod, PingResult};
pub use security::CipherLevel;
pub use transport::{create_transport, MockTransport, TcpTransport, Transport, TransportError};
pub use uds::{
    DidValue, NegativeResponseCode, ResponseMode, ServiceRequest, SessionState, UdsError,
    UdsSession,
};
