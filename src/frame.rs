//! The on-wire frame codec: pure functions over bytes, no I/O.
//!
//! Wire layout: `'t' | type | total_length | sequence | body | crc`, where
//! `total_length` is `len(body) + 5` (header is 4 bytes, trailer is 1 byte).

use crate::crc::crc8;
use crate::error::TexecomError;

const HEADER_START: u8 = b't';
const HEADER_LEN: usize = 4;
const MIN_BODY_LEN: usize = 1;
const MAX_BODY_LEN: usize = 250;

/// The three frame types that appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Command,
    Response,
    Message,
}

impl FrameType {
    fn to_wire_byte(self) -> u8 {
        match self {
            FrameType::Command => b'C',
            FrameType::Response => b'R',
            FrameType::Message => b'M',
        }
    }

    fn from_wire_byte(byte: u8) -> Option<FrameType> {
        match byte {
            b'C' => Some(FrameType::Command),
            b'R' => Some(FrameType::Response),
            b'M' => Some(FrameType::Message),
            _ => None,
        }
    }
}

/// A decoded (or about-to-be-encoded) frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub sequence: u8,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(frame_type: FrameType, sequence: u8, body: Vec<u8>) -> Self {
        Frame {
            frame_type,
            sequence,
            body,
        }
    }

    /// Encodes this frame to its on-wire byte representation.
    ///
    /// Panics if `body` is empty or longer than 250 bytes; callers build
    /// bodies from fixed command/payload tables and never hit this.
    pub fn encode(&self) -> Vec<u8> {
        assert!(
            (MIN_BODY_LEN..=MAX_BODY_LEN).contains(&self.body.len()),
            "frame body length {} out of range 1..=250",
            self.body.len()
        );
        let total_length = (self.body.len() + 5) as u8;
        let mut out = Vec::with_capacity(self.body.len() + 5);
        out.push(HEADER_START);
        out.push(self.frame_type.to_wire_byte());
        out.push(total_length);
        out.push(self.sequence);
        out.extend_from_slice(&self.body);
        let crc = crc8(&out);
        out.push(crc);
        out
    }

    /// Decodes a complete on-wire frame (header + body + crc) already
    /// assembled by the transport layer.
    pub fn decode(header: &[u8; HEADER_LEN], rest: &[u8]) -> Result<Frame, TexecomError> {
        if header[0] != HEADER_START {
            return Err(TexecomError::FrameBadStart(header[0]));
        }
        let frame_type = FrameType::from_wire_byte(header[1])
            .ok_or(TexecomError::FrameBadStart(header[1]))?;
        let total_length = header[2] as usize;
        let sequence = header[3];

        if total_length < HEADER_LEN + MIN_BODY_LEN + 1 {
            return Err(TexecomError::FrameShort {
                expected: HEADER_LEN + MIN_BODY_LEN + 1,
                got: HEADER_LEN + rest.len(),
            });
        }
        let expected_rest_len = total_length - HEADER_LEN;
        if rest.len() != expected_rest_len {
            return Err(TexecomError::FrameShort {
                expected: total_length,
                got: HEADER_LEN + rest.len(),
            });
        }

        let (body, crc_slice) = rest.split_at(rest.len() - 1);
        let received_crc = crc_slice[0];

        let mut crc_input = Vec::with_capacity(HEADER_LEN + body.len());
        crc_input.extend_from_slice(header);
        crc_input.extend_from_slice(body);
        let expected_crc = crc8(&crc_input);

        if received_crc != expected_crc {
            return Err(TexecomError::FrameBadCrc {
                expected: expected_crc,
                got: received_crc,
            });
        }

        Ok(Frame::new(frame_type, sequence, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_header(wire: &[u8]) -> ([u8; HEADER_LEN], Vec<u8>) {
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&wire[..HEADER_LEN]);
        (header, wire[HEADER_LEN..].to_vec())
    }

    #[test]
    fn round_trip() {
        for (frame_type, seq, body) in [
            (FrameType::Command, 0u8, vec![0x01, b'1', b'2', b'3', b'4']),
            (FrameType::Response, 255u8, vec![0x01, 0x06]),
            (FrameType::Message, 7u8, vec![0x01, 0x01]),
        ] {
            let frame = Frame::new(frame_type, seq, body.clone());
            let wire = frame.encode();
            let (header, rest) = split_header(&wire);
            let decoded = Frame::decode(&header, &rest).expect("decode");
            assert_eq!(decoded.frame_type, frame_type);
            assert_eq!(decoded.sequence, seq);
            assert_eq!(decoded.body, body);
        }
    }

    #[test]
    fn max_body_length_round_trips() {
        let body = vec![0xaa; MAX_BODY_LEN];
        let frame = Frame::new(FrameType::Command, 1, body.clone());
        let wire = frame.encode();
        let (header, rest) = split_header(&wire);
        let decoded = Frame::decode(&header, &rest).unwrap();
        assert_eq!(decoded.body, body);
    }

    #[test]
    fn bad_start_byte_is_rejected() {
        let frame = Frame::new(FrameType::Command, 3, vec![0x01, 0x02]);
        let mut wire = frame.encode();
        wire[0] ^= 0xff;
        let (header, rest) = split_header(&wire);
        assert!(matches!(
            Frame::decode(&header, &rest),
            Err(TexecomError::FrameBadStart(_))
        ));
    }

    #[test]
    fn single_bit_flip_in_body_is_rejected_as_bad_crc() {
        let frame = Frame::new(FrameType::Command, 3, vec![0x01, 0x02, 0x03]);
        let mut wire = frame.encode();
        let last_body_byte = HEADER_LEN + 2;
        wire[last_body_byte] ^= 0x01;
        let (header, rest) = split_header(&wire);
        assert!(matches!(
            Frame::decode(&header, &rest),
            Err(TexecomError::FrameBadCrc { .. })
        ));
    }

    #[test]
    fn single_bit_flip_in_crc_is_rejected() {
        let frame = Frame::new(FrameType::Command, 3, vec![0x01, 0x02, 0x03]);
        let mut wire = frame.encode();
        let last = wire.len() - 1;
        wire[last] ^= 0x01;
        let (header, rest) = split_header(&wire);
        assert!(matches!(
            Frame::decode(&header, &rest),
            Err(TexecomError::FrameBadCrc { .. })
        ));
    }

    #[test]
    fn short_body_is_rejected() {
        let frame = Frame::new(FrameType::Command, 3, vec![0x01, 0x02, 0x03]);
        let wire = frame.encode();
        let (header, rest) = split_header(&wire);
        let short_rest = &rest[..rest.len() - 1];
        assert!(matches!(
            Frame::decode(&header, short_rest),
            Err(TexecomError::FrameShort { .. })
        ));
    }
}
