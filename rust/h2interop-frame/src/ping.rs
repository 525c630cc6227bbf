//! PING frames (RFC 9113 §6.7).

use std::io::Read;

use crate::frame::{flags, frame_type, read_payload};
use crate::{FrameCodec, FrameError, FrameHeader};

/// PING payloads are always exactly this long.
pub const PING_PAYLOAD_LEN: usize = 8;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PingFrame {
    pub header: FrameHeader,
    /// Opaque data; must be 8 bytes to be marshalled.
    pub data: Vec<u8>,
}

impl PingFrame {
    pub fn new(data: [u8; PING_PAYLOAD_LEN]) -> Self {
        Self {
            header: FrameHeader::new(frame_type::PING, 0, 0),
            data: data.to_vec(),
        }
    }

    /// The acknowledgement a peer is expected to send back for `self`.
    pub fn to_ack(&self) -> Self {
        Self {
            header: FrameHeader::new(frame_type::PING, flags::PING_ACK, 0),
            data: self.data.clone(),
        }
    }

    pub fn is_ack(&self) -> bool {
        self.header.has_flag(flags::PING_ACK)
    }
}

impl FrameCodec for PingFrame {
    fn header(&self) -> &FrameHeader {
        &self.header
    }

    fn frame_type(&self) -> u8 {
        frame_type::PING
    }

    fn parse_payload<R: Read + ?Sized>(
        r: &mut R,
        header: FrameHeader,
    ) -> Result<Self, FrameError> {
        let data = read_payload(r, header.length)?;
        if data.len() != PING_PAYLOAD_LEN {
            return Err(FrameError::malformed(
                "PING",
                format!("length {} != 8", header.length),
            ));
        }
        Ok(Self { header, data })
    }

    fn marshal_payload(&self) -> Result<Vec<u8>, FrameError> {
        if self.data.len() != PING_PAYLOAD_LEN {
            return Err(FrameError::malformed(
                "PING",
                format!("data is {} bytes, must be 8", self.data.len()),
            ));
        }
        Ok(self.data.clone())
    }
}
