//! Frames carried as opaque bytes: unrecognized types and HTTP/1.x answers.

use std::io::Read;

use crate::frame::{frame_type, read_payload};
use crate::{FrameCodec, FrameError, FrameHeader};

/// A frame of a type this crate does not interpret.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnknownFrame {
    pub header: FrameHeader,
    pub data: Vec<u8>,
}

impl UnknownFrame {
    pub fn new(frame_type: u8, data: Vec<u8>) -> Self {
        Self {
            header: FrameHeader::new(frame_type, 0, 0),
            data,
        }
    }
}

impl FrameCodec for UnknownFrame {
    fn header(&self) -> &FrameHeader {
        &self.header
    }

    fn frame_type(&self) -> u8 {
        self.header.frame_type
    }

    fn parse_payload<R: Read + ?Sized>(
        r: &mut R,
        header: FrameHeader,
    ) -> Result<Self, FrameError> {
        let data = read_payload(r, header.length)?;
        Ok(Self { header, data })
    }

    fn marshal_payload(&self) -> Result<Vec<u8>, FrameError> {
        Ok(self.data.clone())
    }
}

/// What a frame reader sees when the peer replies `HTTP/1.1 ...` to the preface.
///
/// The first nine bytes `"HTTP/1.1 "` decode as a header of type `'P'` (0x50);
/// `data` holds whatever followed them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Http1Frame {
    pub header: FrameHeader,
    pub data: Vec<u8>,
}

impl Http1Frame {
    /// Rebuild the original response text (header bytes included) up to the first line break.
    pub fn status_line(&self) -> String {
        let mut raw = Vec::with_capacity(crate::FRAME_HEADER_LEN + self.data.len());
        // from_bytes output always re-serializes
        if let Ok(head) = self.header.to_bytes() {
            raw.extend_from_slice(&head);
        }
        raw.extend_from_slice(&self.data);
        let text = String::from_utf8_lossy(&raw);
        text.lines().next().unwrap_or_default().to_string()
    }
}

impl FrameCodec for Http1Frame {
    fn header(&self) -> &FrameHeader {
        &self.header
    }

    fn frame_type(&self) -> u8 {
        frame_type::HTTP1
    }

    fn parse_payload<R: Read + ?Sized>(
        r: &mut R,
        header: FrameHeader,
    ) -> Result<Self, FrameError> {
        let data = read_payload(r, header.length)?;
        Ok(Self { header, data })
    }

    fn marshal_payload(&self) -> Result<Vec<u8>, FrameError> {
        Ok(self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FRAME_HEADER_LEN, Frame};

    #[test]
    fn unknown_reads_exactly_length_bytes() {
        let bytes = [0, 0, 3, 0xee, 0x01, 0, 0, 0, 9, 1, 2, 3, 0xff];
        let mut r = &bytes[..];
        let frame = Frame::parse(&mut r).unwrap();
        assert_eq!(
            frame,
            Frame::Unknown(UnknownFrame {
                header: FrameHeader {
                    length: 3,
                    frame_type: 0xee,
                    flags: 0x01,
                    reserved: false,
                    stream_id: 9,
                },
                data: vec![1, 2, 3],
            })
        );
        // trailing byte left for the next frame
        assert_eq!(r, [0xff]);
    }

    #[test]
    fn unknown_fails_only_on_short_read() {
        let bytes = [0, 0, 4, 0xee, 0, 0, 0, 0, 0, 1, 2];
        assert!(matches!(
            Frame::parse(&mut &bytes[..]),
            Err(FrameError::ShortPayload {
                expected: 4,
                read: 2
            })
        ));
    }

    #[test]
    fn http1_response_is_recognized() {
        let text = b"HTTP/1.1 400 Bad Request\r\nConnection: close\r\n\r\n";
        let mut header_bytes = [0u8; FRAME_HEADER_LEN];
        header_bytes.copy_from_slice(&text[..FRAME_HEADER_LEN]);
        let header = FrameHeader::from_bytes(&header_bytes);
        assert_eq!(header.frame_type, frame_type::HTTP1);

        let frame = Http1Frame {
            header,
            data: text[FRAME_HEADER_LEN..].to_vec(),
        };
        assert_eq!(frame.status_line(), "HTTP/1.1 400 Bad Request");
    }
}
