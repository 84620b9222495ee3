//! RFC 6455 frame encoding.

use crate::error::{Result, WsError};

/// Largest payload a control frame may carry.
pub const MAX_CONTROL_PAYLOAD: usize = 125;

/// Frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    /// Decode the low nibble of the first header byte.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            other => Err(WsError::protocol(format!("reserved opcode 0x{:X}", other))),
        }
    }

    /// Wire value of the opcode.
    pub fn as_u8(self) -> u8 {
        match self {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }

    /// Close, ping and pong are control frames.
    pub fn is_control(self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment of a message.
    pub fin: bool,
    pub opcode: OpCode,
    /// Unmasked payload.
    pub payload: Vec<u8>,
}

/// XOR `payload` in place with the repeating 4-byte `mask`.
pub fn apply_mask(payload: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Encode a single final, masked client frame.
///
/// The length field uses the smallest of the three encodings that fits.
pub fn encode_client_frame(opcode: OpCode, payload: &[u8], mask: [u8; 4]) -> Vec<u8> {
    let len = payload.len();
    let mut out = Vec::with_capacity(len + 14);

    out.push(0x80 | opcode.as_u8());

    if len < 126 {
        out.push(0x80 | len as u8);
    } else if len < 65536 {
        out.push(0x80 | 126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(0x80 | 127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }

    out.extend_from_slice(&mask);

    let start = out.len();
    out.extend_from_slice(payload);
    apply_mask(&mut out[start..], mask);
    out
}

/// Fields parsed from the fixed two-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameHead {
    pub fin: bool,
    pub opcode: OpCode,
    pub masked: bool,
    /// 7-bit length; 126 and 127 announce an extended length field.
    pub len7: u8,
}

impl FrameHead {
    pub(crate) fn parse(head: [u8; 2]) -> Result<Self> {
        if head[0] & 0x70 != 0 {
            return Err(WsError::protocol("reserved bits set without negotiated extension"));
        }

        Ok(Self {
            fin: head[0] & 0x80 != 0,
            opcode: OpCode::from_u8(head[0] & 0x0F)?,
            masked: head[1] & 0x80 != 0,
            len7: head[1] & 0x7F,
        })
    }

    /// Bytes of extended length that follow the fixed header.
    pub(crate) fn extended_len_bytes(&self) -> usize {
        match self.len7 {
            126 => 2,
            127 => 8,
            _ => 0,
        }
    }
}

/// Build a close frame payload: status code followed by nothing.
pub(crate) fn close_payload(code: Option<u16>) -> Vec<u8> {
    code.map(|c| c.to_be_bytes().to_vec()).unwrap_or_default()
}

/// Extract the status code from a close frame payload, if present.
pub(crate) fn close_code(payload: &[u8]) -> Option<u16> {
    match payload {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_round_trip_and_reserved() {
        for op in [
            OpCode::Continuation,
            OpCode::Text,
            OpCode::Binary,
            OpCode::Close,
            OpCode::Ping,
            OpCode::Pong,
        ] {
            assert_eq!(OpCode::from_u8(op.as_u8()).unwrap(), op);
        }
        assert!(OpCode::from_u8(0x3).is_err());
        assert!(OpCode::from_u8(0xB).is_err());
    }

    #[test]
    fn test_encode_small_frame() {
        let mask = [1, 2, 3, 4];
        let frame = encode_client_frame(OpCode::Text, b"hi", mask);

        assert_eq!(frame[0], 0x81);
        assert_eq!(frame[1], 0x80 | 2);
        assert_eq!(&frame[2..6], &mask);
        assert_eq!(frame[6], b'h' ^ 1);
        assert_eq!(frame[7], b'i' ^ 2);
    }

    #[test]
    fn test_encode_length_boundaries() {
        let mask = [0; 4];

        let frame = encode_client_frame(OpCode::Text, &[0u8; 125], mask);
        assert_eq!(frame[1] & 0x7F, 125);
        assert_eq!(frame.len(), 2 + 4 + 125);

        let frame = encode_client_frame(OpCode::Text, &[0u8; 126], mask);
        assert_eq!(frame[1] & 0x7F, 126);
        assert_eq!(u16::from_be_bytes([frame[2], frame[3]]), 126);
        assert_eq!(frame.len(), 2 + 2 + 4 + 126);

        let frame = encode_client_frame(OpCode::Binary, &vec![0u8; 65536], mask);
        assert_eq!(frame[1] & 0x7F, 127);
        let mut len = [0u8; 8];
        len.copy_from_slice(&frame[2..10]);
        assert_eq!(u64::from_be_bytes(len), 65536);
        assert_eq!(frame.len(), 2 + 8 + 4 + 65536);
    }

    #[test]
    fn test_mask_is_involution() {
        let mut data = b"metrics_subscribe".to_vec();
        let mask = [0xde, 0xad, 0xbe, 0xef];
        apply_mask(&mut data, mask);
        assert_ne!(data, b"metrics_subscribe");
        apply_mask(&mut data, mask);
        assert_eq!(data, b"metrics_subscribe");
    }

    #[test]
    fn test_parse_head() {
        let head = FrameHead::parse([0x89, 0x05]).unwrap();
        assert!(head.fin);
        assert_eq!(head.opcode, OpCode::Ping);
        assert!(!head.masked);
        assert_eq!(head.len7, 5);
        assert_eq!(head.extended_len_bytes(), 0);

        let head = FrameHead::parse([0x01, 0xFE]).unwrap();
        assert!(!head.fin);
        assert!(head.masked);
        assert_eq!(head.extended_len_bytes(), 2);

        assert!(FrameHead::parse([0xC1, 0x00]).is_err());
    }

    #[test]
    fn test_close_code() {
        assert_eq!(close_code(&close_payload(Some(1000))), Some(1000));
        assert_eq!(close_code(&[]), None);
        assert_eq!(close_code(&[0x03, 0xE9, b'b', b'y', b'e']), Some(1001));
    }
}
