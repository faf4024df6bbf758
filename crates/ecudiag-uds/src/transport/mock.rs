//! Mock transport for testing
//!
//! Inbound chunks are scripted up front and handed out one per `receive`.
//! Clones share state, so a test can keep a handle after boxing the transport
//! into a session and inspect what was sent.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Transport, TransportError};
use crate::codec::{payload_type, routing_activation_success_prefix, DoipFrame};
use crate::config::DEFAULT_TIMEOUT_MS;

#[derive(Default)]
struct MockState {
    connected: bool,
    connect_error: Option<TransportError>,
    send_error: Option<TransportError>,
    inbound: VecDeque<Result<Vec<u8>, TransportError>>,
    sent: Vec<Vec<u8>>,
    receive_calls: usize,
    timeout: Option<Duration>,
}

/// Scripted in-memory transport
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw inbound chunk
    pub fn push_frame(&self, data: Vec<u8>) -> &Self {
        self.state.lock().inbound.push_back(Ok(data));
        self
    }

    /// Queue a diagnostic message from the ECU carrying `uds`
    pub fn push_uds_response(&self, server: u16, client: u16, uds: &[u8]) -> &Self {
        self.push_frame(DoipFrame::diagnostic_message(server, client, uds).encode())
    }

    /// Queue a successful routing activation response
    pub fn push_routing_activation(&self, client: u16, server: u16) -> &Self {
        let mut payload = routing_activation_success_prefix(client, server).to_vec();
        payload.extend_from_slice(&[0x00; 4]);
        self.push_frame(DoipFrame::new(payload_type::ROUTING_ACTIVATION_RESPONSE, payload).encode())
    }

    /// Queue a receive failure
    pub fn push_error(&self, err: TransportError) -> &Self {
        self.state.lock().inbound.push_back(Err(err));
        self
    }

    /// Make the next `connect` fail
    pub fn fail_connect(&self, err: TransportError) -> &Self {
        self.state.lock().connect_error = Some(err);
        self
    }

    /// Make the next `send` fail; the transport still reports connected
    pub fn fail_send(&self, err: TransportError) -> &Self {
        self.state.lock().send_error = Some(err);
        self
    }

    /// Every frame passed to `send`, in order
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.state.lock().sent.clone()
    }

    /// Number of `receive` calls made so far
    pub fn receive_calls(&self) -> usize {
        self.state.lock().receive_calls
    }

    /// Inbound chunks not consumed yet
    pub fn pending_inbound(&self) -> usize {
        self.state.lock().inbound.len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(err) = state.connect_error.take() {
            return Err(err);
        }
        state.connected = true;
        Ok(())
    }

    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if let Some(err) = state.send_error.take() {
            return Err(err);
        }
        tracing::debug!(?frame, "Mock transport: sent frame");
        state.sent.push(frame.to_vec());
        Ok(())
    }

    async fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        state.receive_calls += 1;
        state
            .inbound
            .pop_front()
            .unwrap_or(Err(TransportError::ReceiveTimeout))
    }

    async fn disconnect(&mut self) {
        self.state.lock().connected = false;
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn timeout(&self) -> Duration {
        self.state
            .lock()
            .timeout
            .unwrap_or(Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.state.lock().timeout = Some(timeout);
    }
}
