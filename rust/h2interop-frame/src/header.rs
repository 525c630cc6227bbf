//! The fixed 9-octet frame header.

use std::io::{self, Read};

use crate::FrameError;

/// Size of a frame header on the wire.
pub const FRAME_HEADER_LEN: usize = 9;

/// Largest value the 24-bit length field can carry.
pub const MAX_FRAME_LENGTH: u32 = 0x00FF_FFFF;

/// Mask selecting the 31 stream id bits (and, inverted, the reserved bit).
pub const STREAM_ID_MASK: u32 = 0x7FFF_FFFF;

/// Frame header.
///
/// Layout:
///
/// ```text
/// +-----------------------------------------------+
/// |                 Length (24)                   |
/// +---------------+---------------+---------------+
/// |   Type (8)    |   Flags (8)   |
/// +-+-------------+---------------+-------------------------------+
/// |R|                 Stream Identifier (31)                      |
/// +-+-------------------------------------------------------------+
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameHeader {
    /// Payload length, 0..=2^24-1.
    pub length: u32,
    pub frame_type: u8,
    pub flags: u8,
    /// The R bit. Split out of the stream id on read.
    pub reserved: bool,
    /// Stream identifier, 0..=2^31-1.
    pub stream_id: u32,
}

impl FrameHeader {
    pub fn new(frame_type: u8, flags: u8, stream_id: u32) -> Self {
        Self {
            length: 0,
            frame_type,
            flags,
            reserved: false,
            stream_id,
        }
    }

    /// Read exactly 9 octets from `r`.
    ///
    /// EOF before the first octet is [`FrameError::Eof`]; EOF part way through
    /// is [`FrameError::ShortHeader`].
    pub fn parse<R: Read + ?Sized>(r: &mut R) -> Result<Self, FrameError> {
        let mut buf = [0u8; FRAME_HEADER_LEN];
        let mut read = 0;
        while read < FRAME_HEADER_LEN {
            match r.read(&mut buf[read..]) {
                Ok(0) if read == 0 => return Err(FrameError::Eof),
                Ok(0) => return Err(FrameError::ShortHeader { read }),
                Ok(n) => read += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(FrameError::Io(e)),
            }
        }
        Ok(Self::from_bytes(&buf))
    }

    pub fn from_bytes(buf: &[u8; FRAME_HEADER_LEN]) -> Self {
        let length = u32::from_be_bytes([0, buf[0], buf[1], buf[2]]);
        let raw_id = u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]);
        Self {
            length,
            frame_type: buf[3],
            flags: buf[4],
            reserved: raw_id & !STREAM_ID_MASK != 0,
            stream_id: raw_id & STREAM_ID_MASK,
        }
    }

    /// Serialize the header. The reserved bit is written only when `reserved` is set.
    pub fn to_bytes(&self) -> Result<[u8; FRAME_HEADER_LEN], FrameError> {
        if self.length > MAX_FRAME_LENGTH {
            return Err(FrameError::InvalidLength(self.length));
        }
        if self.stream_id > STREAM_ID_MASK {
            return Err(FrameError::InvalidStreamId(self.stream_id));
        }

        let len = self.length.to_be_bytes();
        let mut raw_id = self.stream_id;
        if self.reserved {
            raw_id |= !STREAM_ID_MASK;
        }
        let id = raw_id.to_be_bytes();

        Ok([
            len[1],
            len[2],
            len[3],
            self.frame_type,
            self.flags,
            id[0],
            id[1],
            id[2],
            id[3],
        ])
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_literal_ping_header() {
        let bytes = [0x00, 0x00, 0x08, 0x06, 0x01, 0x00, 0x00, 0x00, 0x00];
        let header = FrameHeader::parse(&mut &bytes[..]).unwrap();
        assert_eq!(
            header,
            FrameHeader {
                length: 8,
                frame_type: 6,
                flags: 1,
                reserved: false,
                stream_id: 0,
            }
        );
    }

    #[test]
    fn round_trip_boundaries() {
        let cases = [
            (0, 0),
            (1, 1),
            (16_384, 3),
            (MAX_FRAME_LENGTH, STREAM_ID_MASK),
            (0x0012_3456, 0x0765_4321),
        ];
        for (length, stream_id) in cases {
            let header = FrameHeader {
                length,
                frame_type: 0xfe,
                flags: 0xa5,
                reserved: false,
                stream_id,
            };
            let bytes = header.to_bytes().unwrap();
            assert_eq!(FrameHeader::parse(&mut &bytes[..]).unwrap(), header);
        }
    }

    #[test]
    fn reserved_bit_is_split_from_stream_id() {
        let bytes = [0, 0, 0, 4, 0, 0x80, 0, 0, 3];
        let header = FrameHeader::from_bytes(&bytes);
        assert!(header.reserved);
        assert_eq!(header.stream_id, 3);
        assert_eq!(header.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn serialize_rejects_out_of_range_fields() {
        let mut header = FrameHeader::new(0, 0, 0);
        header.length = MAX_FRAME_LENGTH + 1;
        assert!(matches!(
            header.to_bytes(),
            Err(FrameError::InvalidLength(0x0100_0000))
        ));

        let header = FrameHeader::new(0, 0, 0x8000_0000);
        assert!(matches!(
            header.to_bytes(),
            Err(FrameError::InvalidStreamId(0x8000_0000))
        ));
    }

    #[test]
    fn short_reads() {
        assert!(matches!(
            FrameHeader::parse(&mut &[0u8; 0][..]),
            Err(FrameError::Eof)
        ));
        assert!(matches!(
            FrameHeader::parse(&mut &[0u8, 0, 8, 6][..]),
            Err(FrameError::ShortHeader { read: 4 })
        ));
    }
}
