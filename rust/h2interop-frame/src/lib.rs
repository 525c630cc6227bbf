//! HTTP/2 frame codecs for conformance probing.
//!
//! This crate knows the 9-octet frame header and the payloads of the frames a
//! conformance driver needs to look inside (SETTINGS, PING, GOAWAY). Every other
//! frame type is carried as opaque bytes, and an `HTTP/1.x` reply to the client
//! preface is recognized as its own kind.
//!
//! Length checks are exact on purpose: a probe must be able to tell a malformed
//! frame from a well-formed one, so nothing here is lenient.
//!
//! ```
//! use h2interop_frame::{Frame, FrameCodec, PingFrame};
//!
//! let ping = PingFrame::new(*b"01234567");
//! let wire = ping.marshal_binary().unwrap();
//! assert_eq!(wire.len(), 17);
//!
//! let Frame::Ping(back) = Frame::parse(&mut &wire[..]).unwrap() else {
//!     unreachable!()
//! };
//! assert_eq!(back.data, b"01234567");
//! ```

#![deny(unsafe_code)]

mod error;
mod frame;
mod goaway;
mod header;
mod opaque;
mod ping;
mod settings;

pub use error::*;
pub use frame::*;
pub use goaway::*;
pub use header::*;
pub use opaque::*;
pub use ping::*;
pub use settings::*;
