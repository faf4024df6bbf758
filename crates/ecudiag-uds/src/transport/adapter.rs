//! Transport trait

use std::time::Duration;

use async_trait::async_trait;

use super::TransportError;

/// One connection to a DoIP entity
///
/// Methods take `&mut self`: a transport has a single writer, and request and
/// response are strictly sequential on it.
#[async_trait]
pub trait Transport: Send {
    /// Open the stream, bounded by the configured timeout
    ///
    /// Fails with [`TransportError::ConnectionTimeout`] or
    /// [`TransportError::ConnectionRefused`].
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Write one complete frame
    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Wait for the next inbound chunk
    ///
    /// Never returns an empty buffer. A read may carry more than one frame;
    /// the caller splits them.
    async fn receive(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Release the stream. Calling it again is a no-op.
    async fn disconnect(&mut self);

    /// Local state only, no I/O
    fn is_connected(&self) -> bool;

    /// Connect, send and receive timeout
    fn timeout(&self) -> Duration;

    fn set_timeout(&mut self, timeout: Duration);
}
