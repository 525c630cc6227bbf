//! The frame codec trait and the tagged union over all supported frame kinds.

use std::fmt;
use std::io::{self, Read};

use crate::{
    FrameError, FrameHeader, GoAwayFrame, Http1Frame, PingFrame, SettingsFrame, UnknownFrame,
};

/// The client connection preface (RFC 9113 §3.4).
pub const PREFACE: &[u8; 24] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Smallest value a peer may advertise for SETTINGS_MAX_FRAME_SIZE.
pub const MIN_MAX_FRAME_SIZE: u32 = 16_384;

/// Frame type tags.
pub mod frame_type {
    pub const DATA: u8 = 0x0;
    pub const HEADERS: u8 = 0x1;
    pub const PRIORITY: u8 = 0x2;
    pub const RST_STREAM: u8 = 0x3;
    pub const SETTINGS: u8 = 0x4;
    pub const PUSH_PROMISE: u8 = 0x5;
    pub const PING: u8 = 0x6;
    pub const GOAWAY: u8 = 0x7;
    pub const WINDOW_UPDATE: u8 = 0x8;
    pub const CONTINUATION: u8 = 0x9;

    /// `'P'`: what a 9-octet header read of `"HTTP/1.1 ..."` yields as its type byte.
    pub const HTTP1: u8 = 0x50;
}

/// Flag bits.
pub mod flags {
    /// ACK on a SETTINGS frame.
    pub const SETTINGS_ACK: u8 = 0x1;
    /// ACK on a PING frame.
    pub const PING_ACK: u8 = 0x1;
}

/// Encoding and decoding of one frame kind.
///
/// Implementors only provide the payload halves; [`FrameCodec::marshal_binary`]
/// takes care of the header.
pub trait FrameCodec: Sized {
    fn header(&self) -> &FrameHeader;

    /// The type tag written on the wire.
    fn frame_type(&self) -> u8;

    /// Parse the payload that follows `header`, consuming exactly `header.length` bytes.
    fn parse_payload<R: Read + ?Sized>(r: &mut R, header: FrameHeader)
    -> Result<Self, FrameError>;

    fn marshal_payload(&self) -> Result<Vec<u8>, FrameError>;

    /// Header plus payload, with the header length and type recomputed.
    fn marshal_binary(&self) -> Result<Vec<u8>, FrameError> {
        let payload = self.marshal_payload()?;
        let length =
            u32::try_from(payload.len()).map_err(|_| FrameError::InvalidLength(u32::MAX))?;

        let mut header = *self.header();
        header.length = length;
        header.frame_type = self.frame_type();

        let mut buf = Vec::with_capacity(crate::FRAME_HEADER_LEN + payload.len());
        buf.extend_from_slice(&header.to_bytes()?);
        buf.extend_from_slice(&payload);
        Ok(buf)
    }
}

/// Read exactly `len` payload bytes.
pub(crate) fn read_payload<R: Read + ?Sized>(r: &mut R, len: u32) -> Result<Vec<u8>, FrameError> {
    let expected = len as usize;
    let mut buf = vec![0u8; expected];
    let mut read = 0;
    while read < expected {
        match r.read(&mut buf[read..]) {
            Ok(0) => return Err(FrameError::ShortPayload { expected, read }),
            Ok(n) => read += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(FrameError::Io(e)),
        }
    }
    Ok(buf)
}

/// Any frame the driver can receive or send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Settings(SettingsFrame),
    Ping(PingFrame),
    GoAway(GoAwayFrame),
    /// The peer answered with HTTP/1.x text instead of frames.
    Http1(Http1Frame),
    Unknown(UnknownFrame),
}

impl Frame {
    /// Read one complete frame: header, then the payload for its type.
    pub fn parse<R: Read + ?Sized>(r: &mut R) -> Result<Self, FrameError> {
        let header = FrameHeader::parse(r)?;
        Self::parse_payload(r, header)
    }

    /// Decode a frame whose payload has already been read off the wire.
    pub fn decode(header: FrameHeader, payload: &[u8]) -> Result<Self, FrameError> {
        let mut r = payload;
        Self::parse_payload(&mut r, header)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Settings(_) => "SETTINGS",
            Self::Ping(_) => "PING",
            Self::GoAway(_) => "GOAWAY",
            Self::Http1(_) => "HTTP/1",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

impl FrameCodec for Frame {
    fn header(&self) -> &FrameHeader {
        match self {
            Self::Settings(f) => f.header(),
            Self::Ping(f) => f.header(),
            Self::GoAway(f) => f.header(),
            Self::Http1(f) => f.header(),
            Self::Unknown(f) => f.header(),
        }
    }

    fn frame_type(&self) -> u8 {
        match self {
            Self::Settings(f) => f.frame_type(),
            Self::Ping(f) => f.frame_type(),
            Self::GoAway(f) => f.frame_type(),
            Self::Http1(f) => f.frame_type(),
            Self::Unknown(f) => f.frame_type(),
        }
    }

    fn parse_payload<R: Read + ?Sized>(
        r: &mut R,
        header: FrameHeader,
    ) -> Result<Self, FrameError> {
        Ok(match header.frame_type {
            frame_type::SETTINGS => Self::Settings(SettingsFrame::parse_payload(r, header)?),
            frame_type::PING => Self::Ping(PingFrame::parse_payload(r, header)?),
            frame_type::GOAWAY => Self::GoAway(GoAwayFrame::parse_payload(r, header)?),
            frame_type::HTTP1 => Self::Http1(Http1Frame::parse_payload(r, header)?),
            _ => Self::Unknown(UnknownFrame::parse_payload(r, header)?),
        })
    }

    fn marshal_payload(&self) -> Result<Vec<u8>, FrameError> {
        match self {
            Self::Settings(f) => f.marshal_payload(),
            Self::Ping(f) => f.marshal_payload(),
            Self::GoAway(f) => f.marshal_payload(),
            Self::Http1(f) => f.marshal_payload(),
            Self::Unknown(f) => f.marshal_payload(),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = self.header();
        write!(
            f,
            "{} type={:#04x} flags={:#04x} stream={} len={}",
            self.name(),
            h.frame_type,
            h.flags,
            h.stream_id,
            h.length
        )?;
        match self {
            Self::Settings(s) => {
                for p in &s.params {
                    write!(f, " {}={}", p.identifier, p.value)?;
                }
                Ok(())
            }
            Self::Ping(p) => write!(f, " data={:02x?}", p.data),
            Self::GoAway(g) => write!(
                f,
                " last_stream={} error={} debug={:?}",
                g.last_stream_id,
                g.error_display(),
                String::from_utf8_lossy(&g.debug_data)
            ),
            Self::Http1(h) => write!(f, " status_line={:?}", h.status_line()),
            Self::Unknown(_) => Ok(()),
        }
    }
}

impl From<SettingsFrame> for Frame {
    fn from(f: SettingsFrame) -> Self {
        Self::Settings(f)
    }
}

impl From<PingFrame> for Frame {
    fn from(f: PingFrame) -> Self {
        Self::Ping(f)
    }
}

impl From<GoAwayFrame> for Frame {
    fn from(f: GoAwayFrame) -> Self {
        Self::GoAway(f)
    }
}

impl From<Http1Frame> for Frame {
    fn from(f: Http1Frame) -> Self {
        Self::Http1(f)
    }
}

impl From<UnknownFrame> for Frame {
    fn from(f: UnknownFrame) -> Self {
        Self::Unknown(f)
    }
}
