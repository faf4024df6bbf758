//! Classification of inbound chunks while waiting for a response

use tracing::debug;

use crate::codec::{
    count_occurrences, frame_len, is_concatenated, payload_type, DoipFrame,
    DIAGNOSTIC_MESSAGE_MARKER,
};

use super::NEGATIVE_RESPONSE_SID;

const RESPONSE_PENDING: u8 = 0x78;
const BUSY_REPEAT_REQUEST: u8 = 0x21;

/// What one inbound frame means to the request waiting for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// `7F sid 78`: the ECU needs more time
    Pending,
    /// `7F sid 21`: the ECU is busy
    Busy,
    /// Diagnostic message acknowledgement without UDS content
    AddressAck,
    /// The gateway asks whether the tester is still there
    AliveCheck,
    /// Final UDS response bytes
    Response(Vec<u8>),
    /// Diagnostic message NACK or generic NACK, with its code
    Rejected { payload_type: u16, code: u8 },
    /// Anything else
    Unexpected(Vec<u8>),
}

impl Inbound {
    /// Whether the wait loop keeps going after this frame
    pub fn is_interim(&self) -> bool {
        matches!(
            self,
            Inbound::Pending | Inbound::Busy | Inbound::AddressAck | Inbound::AliveCheck
        )
    }
}

/// Classify every frame of a chunk read while waiting for `service_id`
///
/// Frames are split by their declared length, so an acknowledgement or alive
/// check sharing a read with the response is seen separately. Of several
/// diagnostic messages in one chunk only the last is kept. Pending and busy
/// are matched exactly.
pub fn classify(
    data: &[u8],
    service_id: u8,
    client_address: u16,
    server_address: u16,
) -> Vec<Inbound> {
    if is_concatenated(data, &DIAGNOSTIC_MESSAGE_MARKER) {
        debug!(
            frames = count_occurrences(data, &DIAGNOSTIC_MESSAGE_MARKER),
            "Coalesced diagnostic messages, keeping the last"
        );
    }

    let mut inbound = Vec::new();
    let mut last_diagnostic: Option<usize> = None;
    let mut rest = data;

    while !rest.is_empty() {
        let frame = match DoipFrame::decode(rest) {
            Some(frame) if frame.header.is_version_consistent() => frame,
            _ => {
                inbound.push(classify_unframed(rest, client_address, server_address));
                break;
            }
        };
        let len = frame_len(rest).unwrap_or(rest.len());
        rest = &rest[len..];

        if frame.payload_type() == payload_type::DIAGNOSTIC_MESSAGE {
            if let Some(earlier) = last_diagnostic.take() {
                inbound.remove(earlier);
            }
            last_diagnostic = Some(inbound.len());
        }
        inbound.push(classify_frame(&frame, service_id, client_address, server_address));
    }
    inbound
}

fn classify_frame(
    frame: &DoipFrame,
    service_id: u8,
    client_address: u16,
    server_address: u16,
) -> Inbound {
    match frame.payload_type() {
        payload_type::DIAGNOSTIC_MESSAGE => {
            let uds = frame.user_data();
            match uds {
                [] => Inbound::AddressAck,
                [NEGATIVE_RESPONSE_SID, sid, RESPONSE_PENDING] if *sid == service_id => {
                    Inbound::Pending
                }
                [NEGATIVE_RESPONSE_SID, sid, BUSY_REPEAT_REQUEST] if *sid == service_id => {
                    Inbound::Busy
                }
                _ => Inbound::Response(uds.to_vec()),
            }
        }
        payload_type::DIAGNOSTIC_MESSAGE_ACK => Inbound::AddressAck,
        payload_type::ALIVE_CHECK_REQUEST => Inbound::AliveCheck,
        payload_type::DIAGNOSTIC_MESSAGE_NACK => Inbound::Rejected {
            payload_type: payload_type::DIAGNOSTIC_MESSAGE_NACK,
            code: frame.payload.get(4).copied().unwrap_or(0),
        },
        payload_type::GENERIC_NACK => Inbound::Rejected {
            payload_type: payload_type::GENERIC_NACK,
            code: frame.payload.first().copied().unwrap_or(0),
        },
        _ => classify_unframed(&frame.encode(), client_address, server_address),
    }
}

/// Bytes that do not decode as a known frame
fn classify_unframed(data: &[u8], client_address: u16, server_address: u16) -> Inbound {
    if data.ends_with(&ack_trailer(client_address, server_address)) {
        Inbound::AddressAck
    } else {
        Inbound::Unexpected(data.to_vec())
    }
}

/// `server, client, 0x00`: the tail of a positive diagnostic message ACK
fn ack_trailer(client_address: u16, server_address: u16) -> [u8; 5] {
    let s = server_address.to_be_bytes();
    let c = client_address.to_be_bytes();
    [s[0], s[1], c[0], c[1], 0x00]
}
