//! GOAWAY frames (RFC 9113 §6.8).

use std::io::Read;

use crate::frame::{frame_type, read_payload};
use crate::header::STREAM_ID_MASK;
use crate::{ErrorCode, FrameCodec, FrameError, FrameHeader};

/// Last-stream-id plus error code.
pub const GOAWAY_MIN_PAYLOAD_LEN: usize = 8;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GoAwayFrame {
    pub header: FrameHeader,
    pub reserved: bool,
    pub last_stream_id: u32,
    pub error_code: u32,
    pub debug_data: Vec<u8>,
}

impl GoAwayFrame {
    pub fn new(last_stream_id: u32, error_code: u32, debug_data: Vec<u8>) -> Self {
        Self {
            header: FrameHeader::new(frame_type::GOAWAY, 0, 0),
            reserved: false,
            last_stream_id,
            error_code,
            debug_data,
        }
    }

    /// The error code, if it is one of the registered ones.
    pub fn error(&self) -> Option<ErrorCode> {
        ErrorCode::from_u32(self.error_code)
    }

    pub(crate) fn error_display(&self) -> String {
        match self.error() {
            Some(code) => code.to_string(),
            None => format!("{:#x}", self.error_code),
        }
    }
}

impl FrameCodec for GoAwayFrame {
    fn header(&self) -> &FrameHeader {
        &self.header
    }

    fn frame_type(&self) -> u8 {
        frame_type::GOAWAY
    }

    fn parse_payload<R: Read + ?Sized>(
        r: &mut R,
        header: FrameHeader,
    ) -> Result<Self, FrameError> {
        let mut raw = read_payload(r, header.length)?;
        if raw.len() < GOAWAY_MIN_PAYLOAD_LEN {
            return Err(FrameError::malformed(
                "GOAWAY",
                format!("length {} < 8", header.length),
            ));
        }

        let id = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let error_code = u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]);
        let debug_data = raw.split_off(GOAWAY_MIN_PAYLOAD_LEN);

        Ok(Self {
            header,
            reserved: id & !STREAM_ID_MASK != 0,
            last_stream_id: id & STREAM_ID_MASK,
            error_code,
            debug_data,
        })
    }

    fn marshal_payload(&self) -> Result<Vec<u8>, FrameError> {
        if self.last_stream_id > STREAM_ID_MASK {
            return Err(FrameError::InvalidStreamId(self.last_stream_id));
        }
        let mut id = self.last_stream_id;
        if self.reserved {
            id |= !STREAM_ID_MASK;
        }

        let mut buf = Vec::with_capacity(GOAWAY_MIN_PAYLOAD_LEN + self.debug_data.len());
        buf.extend_from_slice(&id.to_be_bytes());
        buf.extend_from_slice(&self.error_code.to_be_bytes());
        buf.extend_from_slice(&self.debug_data);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(length: u32) -> FrameHeader {
        FrameHeader {
            length,
            ..FrameHeader::new(frame_type::GOAWAY, 0, 0)
        }
    }

    #[test]
    fn eight_byte_payload_has_empty_debug_data() {
        let payload = [0u8; 8];
        let frame = GoAwayFrame::parse_payload(&mut &payload[..], header(8)).unwrap();
        assert_eq!(frame.error_code, 0);
        assert_eq!(frame.error(), Some(ErrorCode::NoError));
        assert!(frame.debug_data.is_empty());
    }

    #[test]
    fn rejects_short_payloads() {
        for length in 0u32..8 {
            let payload = vec![0u8; length as usize];
            assert!(GoAwayFrame::parse_payload(&mut &payload[..], header(length)).is_err());
        }
    }

    #[test]
    fn splits_reserved_bit_and_keeps_debug_data() {
        let payload = [0x80, 0x00, 0x00, 0x07, 0x00, 0x00, 0x00, 0x06, b'b', b'y', b'e'];
        let frame = GoAwayFrame::parse_payload(&mut &payload[..], header(11)).unwrap();
        assert!(frame.reserved);
        assert_eq!(frame.last_stream_id, 7);
        assert_eq!(frame.error(), Some(ErrorCode::FrameSizeError));
        assert_eq!(frame.debug_data, b"bye");
        assert_eq!(frame.marshal_payload().unwrap(), payload);
    }

    #[test]
    fn unregistered_error_codes_pass_through() {
        let frame = GoAwayFrame::new(0, 0xdead, Vec::new());
        assert_eq!(frame.error(), None);
        assert_eq!(frame.error_display(), "0xdead");
    }
}
