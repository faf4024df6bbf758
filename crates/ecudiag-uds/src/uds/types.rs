//! Session state and request types

use super::{
    communication_control, service_id, session_type, POSITIVE_RESPONSE_OFFSET,
    SUPPRESS_POSITIVE_RESPONSE,
};

/// Lifecycle of a [`UdsSession`](super::UdsSession)
///
/// ```text
/// Idle -> RoutingPending -> Active(Ready <-> AwaitingResponse) -> Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No stream, or the stream was torn down
    Idle,
    /// Stream open, routing activation not yet confirmed
    RoutingPending,
    /// Routing activated
    Active(ActiveState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveState {
    Ready,
    /// A request was sent and its final response has not arrived yet
    AwaitingResponse { service_id: u8 },
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active(_))
    }
}

/// Whether a request waits for the ECU to answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    AwaitResponse,
    /// The ECU is not expected to answer; success once the frame is sent
    FireAndForget,
}

impl ResponseMode {
    /// Decide from the service id and its first parameter byte
    ///
    /// - session types above extended (0x03)
    /// - communication control types above 0x80
    /// - tester present with sub-function 0x80
    pub fn for_request(sid: u8, params: &[u8]) -> Self {
        let first = params.first().copied();
        let fire_and_forget = match (sid, first) {
            (service_id::DIAGNOSTIC_SESSION_CONTROL, Some(session)) => {
                session > session_type::EXTENDED
            }
            (service_id::COMMUNICATION_CONTROL, Some(control)) => {
                control > SUPPRESS_POSITIVE_RESPONSE
            }
            (service_id::TESTER_PRESENT, Some(sub)) => sub == SUPPRESS_POSITIVE_RESPONSE,
            _ => false,
        };
        if fire_and_forget {
            ResponseMode::FireAndForget
        } else {
            ResponseMode::AwaitResponse
        }
    }
}

/// A UDS request before it is wrapped in a DoIP envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRequest {
    pub service_id: u8,
    pub params: Vec<u8>,
}

impl ServiceRequest {
    pub fn new(service_id: u8, params: impl Into<Vec<u8>>) -> Self {
        Self {
            service_id,
            params: params.into(),
        }
    }

    pub fn session_control(session: u8) -> Self {
        Self::new(service_id::DIAGNOSTIC_SESSION_CONTROL, [session])
    }

    pub fn communication_control(control_type: u8) -> Self {
        Self::new(
            service_id::COMMUNICATION_CONTROL,
            [
                control_type,
                communication_control::NORMAL_AND_NETWORK_MANAGEMENT,
            ],
        )
    }

    /// Service id followed by the parameters
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.params.len());
        out.push(self.service_id);
        out.extend_from_slice(&self.params);
        out
    }

    pub fn response_mode(&self) -> ResponseMode {
        ResponseMode::for_request(self.service_id, &self.params)
    }

    pub fn positive_response_id(&self) -> u8 {
        self.service_id.wrapping_add(POSITIVE_RESPONSE_OFFSET)
    }
}

/// Decoded ReadDataByIdentifier response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DidValue {
    pub did: u16,
    /// Complete positive response, `62 DID_HI DID_LO ...`
    pub raw: Vec<u8>,
    /// Record data after the echoed identifier
    pub data: Vec<u8>,
    /// `data` as UTF-8, or with non-printable bytes escaped as `\xNN`
    pub text: String,
}
