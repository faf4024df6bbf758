//! UDS session over one DoIP connection
//!
//! Owns the transport, the routing activation state and the last security
//! seed. Requests run strictly one after another: the wait loop cannot tell
//! interleaved responses apart.

use std::time::Duration;

use bytes::BytesMut;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::response::{classify, Inbound};
use super::types::{ActiveState, DidValue, ResponseMode, ServiceRequest, SessionState};
use super::{
    dtc_group, service_id, NegativeResponseCode, UdsError, NEGATIVE_RESPONSE_SID,
    SUPPRESS_POSITIVE_RESPONSE,
};
use crate::codec::{
    bytes_to_ascii_escaped, bytes_to_hex, frame_len, payload_type, routing_activation,
    routing_activation_success_prefix, u32_from_be_bytes, DoipFrame,
};
use crate::config::ConnectionConfig;
use crate::security;
use crate::transport::{Transport, TransportError};

/// Minimum positive seed response: `67 level s0 s1 s2 s3`
const SEED_RESPONSE_MIN_LEN: usize = 6;

pub struct UdsSession {
    transport: Box<dyn Transport>,
    client_address: u16,
    server_address: u16,
    state: SessionState,
    security_seed: Option<u32>,
    /// Received bytes not yet forming a complete frame
    rx: BytesMut,
}

impl UdsSession {
    /// Wrap a transport; nothing is sent until [`open`](Self::open)
    pub fn new(transport: Box<dyn Transport>, config: &ConnectionConfig) -> Self {
        Self {
            transport,
            client_address: config.client_address,
            server_address: config.server_address,
            state: SessionState::Idle,
            security_seed: None,
            rx: BytesMut::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn routing_activated(&self) -> bool {
        self.state.is_active()
    }

    pub fn security_seed(&self) -> Option<u32> {
        self.security_seed
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.transport.set_timeout(timeout);
    }

    /// Connect the transport and activate routing
    ///
    /// On any failure the stream is torn down again and the session is left
    /// `Idle`.
    pub async fn open(&mut self) -> Result<(), UdsError> {
        self.security_seed = None;
        self.transport.connect().await?;
        self.state = SessionState::RoutingPending;

        if let Err(e) = self.activate_routing().await {
            warn!(%e, "Routing activation failed");
            self.close().await;
            return Err(e);
        }

        self.state = SessionState::Active(ActiveState::Ready);
        info!(
            client = format!("0x{:04X}", self.client_address),
            server = format!("0x{:04X}", self.server_address),
            "Routing activation granted"
        );
        Ok(())
    }

    /// Release the stream and forget routing and seed state
    pub async fn close(&mut self) {
        self.transport.disconnect().await;
        self.state = SessionState::Idle;
        self.security_seed = None;
        self.rx.clear();
    }

    async fn activate_routing(&mut self) -> Result<(), UdsError> {
        let request = DoipFrame::routing_activation_request(
            self.client_address,
            routing_activation::ACTIVATION_TYPE_DEFAULT,
        );
        self.transport.send(&request.encode()).await?;

        let data = self.transport.receive().await?;
        let expected = routing_activation_success_prefix(self.client_address, self.server_address);

        match DoipFrame::decode(&data) {
            Some(frame)
                if frame.payload_type() == payload_type::ROUTING_ACTIVATION_RESPONSE
                    && frame.payload.starts_with(&expected) =>
            {
                Ok(())
            }
            Some(frame) if frame.payload_type() == payload_type::ROUTING_ACTIVATION_RESPONSE => {
                let code = frame.payload.get(4).copied().unwrap_or(0);
                Err(UdsError::RoutingActivationDenied(format!(
                    "response code 0x{:02X}",
                    code
                )))
            }
            _ => Err(UdsError::RoutingActivationDenied(format!(
                "unexpected response {}",
                bytes_to_hex(&data)
            ))),
        }
    }

    /// Send one request and wait for its final response
    ///
    /// Returns `None` for fire-and-forget requests. Pending, busy and
    /// acknowledgement frames are absorbed until the transport timeout has
    /// elapsed in total. A fatal error closes the session.
    pub async fn execute(&mut self, request: &ServiceRequest) -> Result<Option<Vec<u8>>, UdsError> {
        if self.state != SessionState::Active(ActiveState::Ready) {
            return Err(TransportError::NotConnected.into());
        }

        let result = self.exchange(request).await;
        let lost = result.as_ref().is_err_and(|e| e.is_fatal()) || !self.transport.is_connected();
        if lost {
            warn!(
                service = format!("0x{:02X}", request.service_id),
                "Transport lost, closing session"
            );
            self.close().await;
        } else {
            self.state = SessionState::Active(ActiveState::Ready);
        }
        result
    }

    async fn exchange(&mut self, request: &ServiceRequest) -> Result<Option<Vec<u8>>, UdsError> {
        let uds = request.to_bytes();
        let frame = DoipFrame::diagnostic_message(self.client_address, self.server_address, &uds);
        debug!(
            service = format!("0x{:02X}", request.service_id),
            request = %bytes_to_hex(&uds),
            "Sending UDS request"
        );
        self.rx.clear();
        self.transport.send(&frame.encode()).await?;

        if request.response_mode() == ResponseMode::FireAndForget {
            debug!(
                service = format!("0x{:02X}", request.service_id),
                "No response expected"
            );
            return Ok(None);
        }

        self.state = SessionState::Active(ActiveState::AwaitingResponse {
            service_id: request.service_id,
        });
        self.await_response(request.positive_response_id())
            .await
            .map(Some)
    }

    /// Wait for the final response to the request recorded in the state
    async fn await_response(&mut self, positive_id: u8) -> Result<Vec<u8>, UdsError> {
        let SessionState::Active(ActiveState::AwaitingResponse { service_id: sid }) = self.state
        else {
            return Err(TransportError::NotConnected.into());
        };
        let deadline = Instant::now() + self.transport.timeout();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::ReceiveTimeout.into());
            }

            let data = tokio::time::timeout(remaining, self.transport.receive())
                .await
                .map_err(|_| TransportError::ReceiveTimeout)??;

            // Hold back a frame cut short by the read until the rest arrives
            self.rx.extend_from_slice(&data);
            let mut complete = 0;
            while let Some(len) = frame_len(&self.rx[complete..]) {
                complete += len;
            }
            if complete == 0 {
                debug!(buffered = self.rx.len(), "Partial frame, waiting for more");
                continue;
            }
            let chunk = self.rx.split_to(complete);

            let mut outcome = None;
            for inbound in classify(&chunk, sid, self.client_address, self.server_address) {
                if !inbound.is_interim() {
                    outcome = Some(inbound);
                    continue;
                }
                match inbound {
                    Inbound::Pending => {
                        debug!(service = format!("0x{:02X}", sid), "Response pending")
                    }
                    Inbound::Busy => debug!(service = format!("0x{:02X}", sid), "ECU busy"),
                    Inbound::AliveCheck => {
                        let reply = DoipFrame::new(
                            payload_type::ALIVE_CHECK_RESPONSE,
                            self.client_address.to_be_bytes().to_vec(),
                        );
                        self.transport.send(&reply.encode()).await?;
                    }
                    _ => {}
                }
            }

            let uds = match outcome {
                Some(Inbound::Response(uds)) => uds,
                Some(Inbound::Rejected { payload_type, code }) => {
                    return Err(UdsError::InvalidResponse(format!(
                        "DoIP NACK 0x{:02X} (payload type 0x{:04X})",
                        code, payload_type
                    )));
                }
                Some(Inbound::Unexpected(bytes)) => {
                    return Err(UdsError::InvalidResponse(format!(
                        "unexpected frame {}",
                        bytes_to_hex(&bytes)
                    )));
                }
                _ => continue,
            };

            return match uds.as_slice() {
                [first, ..] if *first == positive_id => {
                    debug!(response = %bytes_to_hex(&uds), "Positive response");
                    Ok(uds)
                }
                [NEGATIVE_RESPONSE_SID, rejected, nrc, ..] if *rejected == sid => {
                    let nrc = NegativeResponseCode::from(*nrc);
                    warn!(
                        service = format!("0x{:02X}", sid),
                        %nrc,
                        transient = nrc.is_transient(),
                        "Negative response"
                    );
                    Err(UdsError::NegativeResponse {
                        service_id: sid,
                        nrc,
                    })
                }
                _ => Err(UdsError::InvalidResponse(format!(
                    "unexpected response {} to service 0x{:02X}",
                    bytes_to_hex(&uds),
                    sid
                ))),
            };
        }
    }

    /// Execute a request whose response is always awaited
    async fn request(&mut self, request: ServiceRequest) -> Result<Vec<u8>, UdsError> {
        self.execute(&request).await.map(Option::unwrap_or_default)
    }

    /// DiagnosticSessionControl (0x10)
    ///
    /// Session types above 0x03 are sent without waiting for a response.
    pub async fn start_session(&mut self, session: u8) -> Result<Option<Vec<u8>>, UdsError> {
        let result = self.execute(&ServiceRequest::session_control(session)).await?;
        info!(session = format!("0x{:02X}", session), "Session control granted");
        Ok(result)
    }

    /// ECUReset (0x11)
    pub async fn ecu_reset(&mut self, reset_type: u8) -> Result<Vec<u8>, UdsError> {
        let response = self
            .request(ServiceRequest::new(service_id::ECU_RESET, [reset_type]))
            .await?;
        info!(reset_type = format!("0x{:02X}", reset_type), "ECU reset granted");
        Ok(response)
    }

    /// ClearDiagnosticInformation (0x14) for a 3-byte group
    pub async fn clear_diagnostic_information(&mut self, group: u32) -> Result<Vec<u8>, UdsError> {
        if group > dtc_group::ALL {
            return Err(UdsError::MalformedRequest(format!(
                "DTC group 0x{:X} exceeds 3 bytes",
                group
            )));
        }
        let response = self
            .request(ServiceRequest::new(
                service_id::CLEAR_DIAGNOSTIC_INFORMATION,
                &group.to_be_bytes()[1..],
            ))
            .await?;
        info!(group = format!("0x{:06X}", group), "Diagnostic information cleared");
        Ok(response)
    }

    /// ReadDTCInformation (0x19); returns the raw positive response
    pub async fn read_dtc_information(
        &mut self,
        sub_function: u8,
        status_mask: u8,
    ) -> Result<Vec<u8>, UdsError> {
        self.request(ServiceRequest::new(
            service_id::READ_DTC_INFORMATION,
            [sub_function, status_mask],
        ))
        .await
    }

    /// ReadDataByIdentifier (0x22)
    pub async fn read_data_by_identifier(&mut self, did: u16) -> Result<DidValue, UdsError> {
        let did_bytes = did.to_be_bytes();
        let raw = self
            .request(ServiceRequest::new(
                service_id::READ_DATA_BY_IDENTIFIER,
                did_bytes,
            ))
            .await?;

        if raw.get(1..3) != Some(&did_bytes[..]) {
            return Err(UdsError::InvalidResponse(format!(
                "response {} does not echo DID 0x{:04X}",
                bytes_to_hex(&raw),
                did
            )));
        }

        let data = raw[3..].to_vec();
        let text = match std::str::from_utf8(&data) {
            Ok(text) => text.to_string(),
            Err(_) => bytes_to_ascii_escaped(&data),
        };
        info!(did = format!("0x{:04X}", did), value = %text, "Read data identifier");

        Ok(DidValue {
            did,
            raw,
            data,
            text,
        })
    }

    /// WriteDataByIdentifier (0x2E)
    pub async fn write_data_by_identifier(
        &mut self,
        did: u16,
        data: &[u8],
    ) -> Result<Vec<u8>, UdsError> {
        let mut params = did.to_be_bytes().to_vec();
        params.extend_from_slice(data);
        let response = self
            .request(ServiceRequest::new(
                service_id::WRITE_DATA_BY_IDENTIFIER,
                params,
            ))
            .await?;
        info!(did = format!("0x{:04X}", did), len = data.len(), "Write data identifier granted");
        Ok(response)
    }

    /// SecurityAccess (0x27) seed request for an odd `level`
    ///
    /// The last four bytes of the response become the stored seed.
    pub async fn security_access_get_seed(&mut self, level: u8) -> Result<u32, UdsError> {
        if level % 2 == 0 {
            return Err(UdsError::UnsupportedSecurityLevel(level));
        }

        let response = self
            .request(ServiceRequest::new(service_id::SECURITY_ACCESS, [level]))
            .await?;
        if response.len() < SEED_RESPONSE_MIN_LEN {
            return Err(UdsError::InvalidResponse(format!(
                "seed response too short: {}",
                bytes_to_hex(&response)
            )));
        }

        let seed = u32_from_be_bytes(&response[response.len() - 4..]).ok_or_else(|| {
            UdsError::InvalidResponse("seed is not 4 bytes".to_string())
        })?;
        self.security_seed = Some(seed);
        info!(level, seed = format!("0x{:08X}", seed), "Security seed received");
        Ok(seed)
    }

    /// SecurityAccess (0x27) key submission for an even `level`
    ///
    /// The key is derived from the stored seed. The seed is kept afterwards.
    pub async fn security_access_compare_key(
        &mut self,
        level: u8,
        constant: u32,
    ) -> Result<Vec<u8>, UdsError> {
        let seed = self.security_seed.ok_or(UdsError::NoSeedAvailable)?;
        let key = security::compute_key(level, seed, constant)?;

        let mut params = vec![level];
        params.extend_from_slice(&key.to_be_bytes());
        let response = self
            .request(ServiceRequest::new(service_id::SECURITY_ACCESS, params))
            .await?;
        info!(level, "Security access granted");
        Ok(response)
    }

    /// CommunicationControl (0x28) with communication type 0x03
    ///
    /// Control types above 0x80 are sent without waiting for a response.
    pub async fn communication_control(
        &mut self,
        control_type: u8,
    ) -> Result<Option<Vec<u8>>, UdsError> {
        let result = self
            .execute(&ServiceRequest::communication_control(control_type))
            .await?;
        info!(control_type = format!("0x{:02X}", control_type), "Communication control granted");
        Ok(result)
    }

    /// TesterPresent (0x3E)
    pub async fn tester_present(&mut self, suppress_response: bool) -> Result<Option<Vec<u8>>, UdsError> {
        let sub_function = if suppress_response {
            SUPPRESS_POSITIVE_RESPONSE
        } else {
            0x00
        };
        self.execute(&ServiceRequest::new(service_id::TESTER_PRESENT, [sub_function]))
            .await
    }

    /// ControlDTCSetting (0x85)
    pub async fn control_dtc_setting(&mut self, setting_type: u8) -> Result<Vec<u8>, UdsError> {
        let response = self
            .request(ServiceRequest::new(
                service_id::CONTROL_DTC_SETTING,
                [setting_type],
            ))
            .await?;
        info!(setting_type = format!("0x{:02X}", setting_type), "Control DTC setting granted");
        Ok(response)
    }
}
