//! Transport layer for DoIP communication
//!
//! A transport owns one bidirectional byte stream to a DoIP entity and moves
//! whole frames across it. Framing and response interpretation live above it.
//!
//! - TCP transport for real gateways (ISO 13400, port 13400)
//! - Mock transport for testing
//!
//! # Example
//!
//! ```ignore
//! use ecudiag_uds::transport::create_transport;
//! use ecudiag_uds::ConnectionConfig;
//!
//! let config = ConnectionConfig::new("192.168.1.10", 0x1001);
//! let mut transport = create_transport(&config);
//! transport.connect().await?;
//! ```

mod adapter;
pub mod error;
pub mod mock;
pub mod tcp;

pub use adapter::Transport;
pub use error::TransportError;
pub use mock::MockTransport;
pub use tcp::TcpTransport;

use crate::config::ConnectionConfig;

/// Payloads below this size are hex-dumped at debug level
pub const HEX_DUMP_THRESHOLD: usize = 256;

/// Bytes per line in debug hex dumps
pub const HEX_DUMP_WIDTH: usize = 32;

/// Create the transport used for real connections
///
/// The stream is not opened until [`Transport::connect`] is called.
pub fn create_transport(config: &ConnectionConfig) -> Box<dyn Transport> {
    Box::new(TcpTransport::new(config))
}

/// Debug-level hex dump of a frame, skipped for large payloads
pub(crate) fn trace_frame(direction: &'static str, data: &[u8]) {
    if data.len() >= HEX_DUMP_THRESHOLD || !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    for line in crate::codec::hex_dump(data, HEX_DUMP_WIDTH) {
        tracing::debug!(direction, "{}", line);
    }
}
