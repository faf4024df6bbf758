//! DoIP frame codec (ISO 13400-2)
//!
//! Wraps and unwraps the fixed 8-byte generic header around a payload:
//!
//! ```text
//! +---------+-----------------+--------------+----------------+---------+
//! | version | inverse version | payload type | payload length | payload |
//! |  1 byte |      1 byte     |  2 bytes BE  |   4 bytes BE   |   ...   |
//! +---------+-----------------+--------------+----------------+---------+
//! ```
//!
//! The codec does not validate. A declared length larger than the buffer is
//! truncated to what is available; the UDS layer reports anything malformed.

pub mod util;

use bytes::BufMut;

pub use self::util::{
    bytes_to_ascii_escaped, bytes_to_hex, count_occurrences, ends_with, extract_last_frame,
    hex_dump, hex_to_bytes, index_of, is_concatenated, starts_with, u32_from_be_bytes,
    u32_to_be_bytes,
};

/// DoIP protocol version (ISO 13400-2:2012)
pub const PROTOCOL_VERSION: u8 = 0x02;

/// Bitwise complement of [`PROTOCOL_VERSION`]
pub const INVERSE_PROTOCOL_VERSION: u8 = !PROTOCOL_VERSION;

/// Length of the generic DoIP header
pub const HEADER_LEN: usize = 8;

/// DoIP payload types
pub mod payload_type {
    pub const GENERIC_NACK: u16 = 0x0000;
    pub const ROUTING_ACTIVATION_REQUEST: u16 = 0x0005;
    pub const ROUTING_ACTIVATION_RESPONSE: u16 = 0x0006;
    pub const ALIVE_CHECK_REQUEST: u16 = 0x0007;
    pub const ALIVE_CHECK_RESPONSE: u16 = 0x0008;
    pub const DIAGNOSTIC_MESSAGE: u16 = 0x8001;
    pub const DIAGNOSTIC_MESSAGE_ACK: u16 = 0x8002;
    pub const DIAGNOSTIC_MESSAGE_NACK: u16 = 0x8003;
}

/// Routing activation constants
pub mod routing_activation {
    /// Activation type "default"
    pub const ACTIVATION_TYPE_DEFAULT: u8 = 0x00;
    /// Response code "routing successfully activated"
    pub const SUCCESS: u8 = 0x10;
    /// ISO reserved bytes, always zero
    pub const RESERVED: [u8; 4] = [0x00; 4];
    /// Bytes reserved for the vehicle manufacturer
    pub const OEM_RESERVED: [u8; 4] = [0xFF; 4];
}

/// Header bytes that open every diagnostic message frame
///
/// Used to detect several frames delivered in a single read.
pub const DIAGNOSTIC_MESSAGE_MARKER: [u8; 4] = [
    PROTOCOL_VERSION,
    INVERSE_PROTOCOL_VERSION,
    (payload_type::DIAGNOSTIC_MESSAGE >> 8) as u8,
    payload_type::DIAGNOSTIC_MESSAGE as u8,
];

/// Generic DoIP header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoipHeader {
    pub protocol_version: u8,
    pub inverse_version: u8,
    pub payload_type: u16,
    pub payload_length: u32,
}

impl DoipHeader {
    pub fn new(payload_type: u16, payload_length: u32) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            inverse_version: INVERSE_PROTOCOL_VERSION,
            payload_type,
            payload_length,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        let mut buf = &mut out[..];
        buf.put_u8(self.protocol_version);
        buf.put_u8(self.inverse_version);
        buf.put_u16(self.payload_type);
        buf.put_u32(self.payload_length);
        out
    }

    /// Read a header from the start of `buf`; `None` if fewer than 8 bytes
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let header: &[u8; HEADER_LEN] = buf.get(..HEADER_LEN)?.try_into().ok()?;
        Some(Self {
            protocol_version: header[0],
            inverse_version: header[1],
            payload_type: u16::from_be_bytes([header[2], header[3]]),
            payload_length: u32::from_be_bytes([header[4], header[5], header[6], header[7]]),
        })
    }

    /// Whether the inverse version is the complement of the version
    pub fn is_version_consistent(&self) -> bool {
        self.inverse_version == !self.protocol_version
    }
}

/// A DoIP header together with its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoipFrame {
    pub header: DoipHeader,
    pub payload: Vec<u8>,
}

impl DoipFrame {
    /// Build a frame; the header length always matches the payload
    pub fn new(payload_type: u16, payload: Vec<u8>) -> Self {
        Self {
            header: DoipHeader::new(payload_type, payload.len() as u32),
            payload,
        }
    }

    pub fn payload_type(&self) -> u16 {
        self.header.payload_type
    }

    /// Routing activation request from the tester at `client_address`
    pub fn routing_activation_request(client_address: u16, activation_type: u8) -> Self {
        let mut payload = Vec::with_capacity(11);
        payload.put_u16(client_address);
        payload.put_u8(activation_type);
        payload.put_slice(&routing_activation::RESERVED);
        payload.put_slice(&routing_activation::OEM_RESERVED);
        Self::new(payload_type::ROUTING_ACTIVATION_REQUEST, payload)
    }

    /// Diagnostic message carrying UDS bytes from `source` to `target`
    pub fn diagnostic_message(source: u16, target: u16, uds: &[u8]) -> Self {
        let mut payload = Vec::with_capacity(4 + uds.len());
        payload.put_u16(source);
        payload.put_u16(target);
        payload.put_slice(uds);
        Self::new(payload_type::DIAGNOSTIC_MESSAGE, payload)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        self.encode_into(&mut out);
        out
    }

    /// Append the encoded frame to `out`
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.put_slice(&self.header.encode());
        out.put_slice(&self.payload);
    }

    /// Read one frame from the start of `buf`
    ///
    /// Returns `None` only if the header itself is incomplete. A payload
    /// shorter than the declared length is returned as received.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let header = DoipHeader::decode(buf)?;
        let body = &buf[HEADER_LEN..];
        let len = (header.payload_length as usize).min(body.len());
        Some(Self {
            header,
            payload: body[..len].to_vec(),
        })
    }

    /// Total encoded length as declared by the header
    pub fn declared_len(&self) -> usize {
        HEADER_LEN + self.header.payload_length as usize
    }

    /// Source and target logical addresses of a diagnostic-class payload
    pub fn logical_addresses(&self) -> Option<(u16, u16)> {
        let p = self.payload.get(..4)?;
        Some((u16::from_be_bytes([p[0], p[1]]), u16::from_be_bytes([p[2], p[3]])))
    }

    /// UDS bytes of a diagnostic message (after source and target address)
    pub fn user_data(&self) -> &[u8] {
        self.payload.get(4..).unwrap_or(&[])
    }
}

/// Length of the first unit at the start of a receive buffer
///
/// A unit is one complete frame, or the whole buffer when it does not start
/// with a DoIP header. `None` while the frame at the front is still
/// incomplete (including a header cut short after the version bytes).
pub fn frame_len(buf: &[u8]) -> Option<usize> {
    if buf.is_empty() {
        return None;
    }
    let Some(header) = DoipHeader::decode(buf) else {
        let version = [PROTOCOL_VERSION, INVERSE_PROTOCOL_VERSION];
        let n = buf.len().min(version.len());
        return if buf[..n] == version[..n] {
            None
        } else {
            Some(buf.len())
        };
    };
    if !header.is_version_consistent() {
        return Some(buf.len());
    }
    let total = HEADER_LEN + header.payload_length as usize;
    (buf.len() >= total).then_some(total)
}

/// Payload prefix of a successful routing activation response
///
/// `client address, server address, 0x10`. The four ISO reserved bytes and
/// optional OEM bytes that follow are not compared.
pub fn routing_activation_success_prefix(client_address: u16, server_address: u16) -> [u8; 5] {
    let c = client_address.to_be_bytes();
    let s = server_address.to_be_bytes();
    [c[0], c[1], s[0], s[1], routing_activation::SUCCESS]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_header_encode() {
        let header = DoipHeader::new(payload_type::DIAGNOSTIC_MESSAGE, 6);
        assert_eq!(
            header.encode(),
            [0x02, 0xFD, 0x80, 0x01, 0x00, 0x00, 0x00, 0x06]
        );
        assert!(header.is_version_consistent());
    }

    #[test]
    fn test_header_decode_short_buffer() {
        assert_eq!(DoipHeader::decode(&[0x02, 0xFD, 0x80]), None);
    }

    #[test]
    fn test_routing_activation_request_bytes() {
        let frame = DoipFrame::routing_activation_request(
            0x0E80,
            routing_activation::ACTIVATION_TYPE_DEFAULT,
        );
        assert_eq!(
            frame.encode(),
            vec![
                0x02, 0xFD, 0x00, 0x05, 0x00, 0x00, 0x00, 0x0B, 0x0E, 0x80, 0x00, 0x00, 0x00,
                0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
            ]
        );
    }

    #[test]
    fn test_diagnostic_message_bytes() {
        let frame = DoipFrame::diagnostic_message(0x0E80, 0x1001, &[0x10, 0x03]);
        assert_eq!(
            frame.encode(),
            vec![0x02, 0xFD, 0x80, 0x01, 0x00, 0x00, 0x00, 0x06, 0x0E, 0x80, 0x10, 0x01, 0x10, 0x03]
        );
        assert_eq!(frame.logical_addresses(), Some((0x0E80, 0x1001)));
        assert_eq!(frame.user_data(), &[0x10, 0x03]);
    }

    #[test]
    fn test_decode_truncated_payload_is_not_rejected() {
        let bytes = [0x02, 0xFD, 0x80, 0x01, 0x00, 0x00, 0x00, 0x10, 0x10, 0x01];
        let frame = DoipFrame::decode(&bytes).unwrap();
        assert_eq!(frame.header.payload_length, 16);
        assert_eq!(frame.payload, vec![0x10, 0x01]);
        assert_eq!(frame.declared_len(), 24);
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut bytes = DoipFrame::diagnostic_message(0x1001, 0x0E80, &[0x50, 0x01]).encode();
        bytes.extend_from_slice(&[0xAA, 0xBB]);
        let frame = DoipFrame::decode(&bytes).unwrap();
        assert_eq!(frame.user_data(), &[0x50, 0x01]);
    }

    #[test]
    fn test_marker_matches_encoded_diagnostic_header() {
        let frame = DoipFrame::diagnostic_message(0x1001, 0x0E80, &[0x7E, 0x00]).encode();
        assert!(frame.starts_with(&DIAGNOSTIC_MESSAGE_MARKER));
    }

    #[test]
    fn test_frame_len_waits_for_whole_frame() {
        let frame = DoipFrame::diagnostic_message(0x1001, 0x0E80, &[0x51, 0x01]).encode();
        assert_eq!(frame_len(&frame), Some(14));
        assert_eq!(frame_len(&frame[..8]), None);
        assert_eq!(frame_len(&frame[..13]), None);
        assert_eq!(frame_len(&frame[..1]), None);
        assert_eq!(frame_len(&[]), None);

        let mut two = frame.clone();
        two.extend_from_slice(&frame[..3]);
        assert_eq!(frame_len(&two), Some(14));
    }

    #[test]
    fn test_frame_len_passes_unframed_bytes() {
        assert_eq!(frame_len(&[0x10, 0x01, 0x0E, 0x80, 0x00]), Some(5));
        assert_eq!(frame_len(&[0x02, 0x00, 0x80, 0x01, 0, 0, 0, 2, 0xAA]), Some(9));
    }

    #[test]
    fn test_routing_activation_success_prefix() {
        assert_eq!(
            routing_activation_success_prefix(0x0E80, 0x1001),
            [0x0E, 0x80, 0x10, 0x01, 0x10]
        );
    }
}
