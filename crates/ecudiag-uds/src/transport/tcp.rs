//! TCP transport to a DoIP gateway
//!
//! `receive` hands out one frame at a time. Bytes read past the end of a
//! frame stay buffered for the next call, and a frame split over several
//! reads is only returned once complete.

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{trace_frame, Transport, TransportError};
use crate::codec::frame_len;
use crate::config::ConnectionConfig;

/// Space reserved for a single socket read
const READ_BUFFER_SIZE: usize = 4096;

/// DoIP over plain TCP
pub struct TcpTransport {
    endpoint: String,
    timeout: Duration,
    stream: Option<TcpStream>,
    rx: BytesMut,
}

impl TcpTransport {
    pub fn new(config: &ConnectionConfig) -> Self {
        Self {
            endpoint: config.endpoint(),
            timeout: config.timeout(),
            stream: None,
            rx: BytesMut::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream, TransportError> {
        self.stream.as_mut().ok_or(TransportError::NotConnected)
    }

    /// Forget the stream after an I/O failure; it cannot be resynchronised
    fn drop_stream(&mut self, reason: &str) {
        warn!(endpoint = %self.endpoint, reason, "DoIP connection lost");
        self.stream = None;
        self.rx.clear();
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Ok(());
        }

        info!(endpoint = %self.endpoint, "Connecting to DoIP gateway");

        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&self.endpoint))
            .await
            .map_err(|_| TransportError::ConnectionTimeout)?
            .map_err(TransportError::from_connect)?;

        if let Err(e) = stream.set_nodelay(true) {
            warn!(%e, "Failed to set TCP_NODELAY");
        }

        self.stream = Some(stream);
        self.rx.clear();
        info!(endpoint = %self.endpoint, "DoIP connected");
        Ok(())
    }

    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let timeout = self.timeout;
        let stream = self.stream_mut()?;

        let written = tokio::time::timeout(timeout, stream.write_all(frame)).await;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.drop_stream("send failed");
                return Err(e.into());
            }
            Err(_) => {
                self.drop_stream("send timeout");
                return Err(TransportError::Io("send timeout".into()));
            }
        }

        debug!(len = frame.len(), "Sent frame");
        trace_frame("tx", frame);
        Ok(())
    }

    async fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        let deadline = Instant::now() + self.timeout;

        loop {
            if let Some(len) = frame_len(&self.rx) {
                let frame = self.rx.split_to(len).to_vec();
                debug!(len, buffered = self.rx.len(), "Received frame");
                trace_frame("rx", &frame);
                return Ok(frame);
            }

            let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
            self.rx.reserve(READ_BUFFER_SIZE);
            let read = tokio::time::timeout_at(deadline, stream.read_buf(&mut self.rx)).await;

            match read {
                Err(_) => return Err(TransportError::ReceiveTimeout),
                Ok(Ok(0)) => {
                    self.drop_stream("closed by peer");
                    return Err(TransportError::Io("connection closed by peer".into()));
                }
                Ok(Ok(n)) => debug!(n, buffered = self.rx.len(), "Read from socket"),
                Ok(Err(e)) => {
                    self.drop_stream("receive failed");
                    return Err(e.into());
                }
            }
        }
    }

    async fn disconnect(&mut self) {
        self.rx.clear();
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!(%e, "Shutdown after disconnect");
            }
            info!(endpoint = %self.endpoint, "DoIP disconnected");
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }
}
