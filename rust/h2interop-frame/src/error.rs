//! Error codes and error types.
//!
//! See RFC 9113 §7 for the error code registry.

use core::fmt;

/// HTTP/2 error codes as carried by GOAWAY and RST_STREAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    /// Graceful shutdown, not an error.
    NoError = 0x0,
    /// Unspecific protocol error.
    ProtocolError = 0x1,
    InternalError = 0x2,
    FlowControlError = 0x3,
    /// SETTINGS was not acknowledged in time.
    SettingsTimeout = 0x4,
    StreamClosed = 0x5,
    /// Frame has an invalid size, e.g. a SETTINGS payload that is not a multiple of 6.
    FrameSizeError = 0x6,
    RefusedStream = 0x7,
    Cancel = 0x8,
    CompressionError = 0x9,
    ConnectError = 0xa,
    EnhanceYourCalm = 0xb,
    /// Negotiated TLS parameters are not acceptable.
    InadequateSecurity = 0xc,
    Http11Required = 0xd,
}

impl ErrorCode {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x0 => Some(Self::NoError),
            0x1 => Some(Self::ProtocolError),
            0x2 => Some(Self::InternalError),
            0x3 => Some(Self::FlowControlError),
            0x4 => Some(Self::SettingsTimeout),
            0x5 => Some(Self::StreamClosed),
            0x6 => Some(Self::FrameSizeError),
            0x7 => Some(Self::RefusedStream),
            0x8 => Some(Self::Cancel),
            0x9 => Some(Self::CompressionError),
            0xa => Some(Self::ConnectError),
            0xb => Some(Self::EnhanceYourCalm),
            0xc => Some(Self::InadequateSecurity),
            0xd => Some(Self::Http11Required),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoError => write!(f, "NO_ERROR"),
            Self::ProtocolError => write!(f, "PROTOCOL_ERROR"),
            Self::InternalError => write!(f, "INTERNAL_ERROR"),
            Self::FlowControlError => write!(f, "FLOW_CONTROL_ERROR"),
            Self::SettingsTimeout => write!(f, "SETTINGS_TIMEOUT"),
            Self::StreamClosed => write!(f, "STREAM_CLOSED"),
            Self::FrameSizeError => write!(f, "FRAME_SIZE_ERROR"),
            Self::RefusedStream => write!(f, "REFUSED_STREAM"),
            Self::Cancel => write!(f, "CANCEL"),
            Self::CompressionError => write!(f, "COMPRESSION_ERROR"),
            Self::ConnectError => write!(f, "CONNECT_ERROR"),
            Self::EnhanceYourCalm => write!(f, "ENHANCE_YOUR_CALM"),
            Self::InadequateSecurity => write!(f, "INADEQUATE_SECURITY"),
            Self::Http11Required => write!(f, "HTTP_1_1_REQUIRED"),
        }
    }
}

/// Errors produced while parsing or serializing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The stream ended cleanly before the first header byte.
    #[error("end of stream")]
    Eof,

    #[error("frame header truncated: got {read} of 9 bytes")]
    ShortHeader { read: usize },

    #[error("frame payload truncated: got {read} of {expected} bytes")]
    ShortPayload { expected: usize, read: usize },

    #[error("invalid frame length {0}: must fit in 24 bits")]
    InvalidLength(u32),

    #[error("invalid stream id {0:#x}: reserved bit must not be set")]
    InvalidStreamId(u32),

    #[error("malformed {frame} payload: {reason}")]
    MalformedPayload {
        frame: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FrameError {
    pub(crate) fn malformed(frame: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            frame,
            reason: reason.into(),
        }
    }
}
