//! SETTINGS frames (RFC 9113 §6.5).

use std::fmt;
use std::io::Read;

use crate::frame::{flags, frame_type, read_payload};
use crate::{FrameCodec, FrameError, FrameHeader};

/// Size of one identifier/value pair on the wire.
pub const SETTING_ENTRY_LEN: usize = 6;

/// A SETTINGS parameter identifier. Unknown identifiers are carried as-is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SettingId(pub u16);

impl SettingId {
    pub const HEADER_TABLE_SIZE: Self = Self(0x1);
    pub const ENABLE_PUSH: Self = Self(0x2);
    pub const MAX_CONCURRENT_STREAMS: Self = Self(0x3);
    pub const INITIAL_WINDOW_SIZE: Self = Self(0x4);
    pub const MAX_FRAME_SIZE: Self = Self(0x5);
    pub const MAX_HEADER_LIST_SIZE: Self = Self(0x6);

    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::HEADER_TABLE_SIZE => "HEADER_TABLE_SIZE",
            Self::ENABLE_PUSH => "ENABLE_PUSH",
            Self::MAX_CONCURRENT_STREAMS => "MAX_CONCURRENT_STREAMS",
            Self::INITIAL_WINDOW_SIZE => "INITIAL_WINDOW_SIZE",
            Self::MAX_FRAME_SIZE => "MAX_FRAME_SIZE",
            Self::MAX_HEADER_LIST_SIZE => "MAX_HEADER_LIST_SIZE",
            _ => return None,
        })
    }
}

impl fmt::Display for SettingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "UNKNOWN({:#06x})", self.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettingsParameter {
    pub identifier: SettingId,
    pub value: u32,
}

impl SettingsParameter {
    pub fn new(identifier: SettingId, value: u32) -> Self {
        Self { identifier, value }
    }
}

/// SETTINGS frame. Parameters keep their wire order, duplicates included.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SettingsFrame {
    pub header: FrameHeader,
    pub params: Vec<SettingsParameter>,
}

impl SettingsFrame {
    pub fn new(params: Vec<SettingsParameter>) -> Self {
        Self {
            header: FrameHeader::new(frame_type::SETTINGS, 0, 0),
            params,
        }
    }

    /// An empty SETTINGS frame with the ACK flag.
    pub fn ack() -> Self {
        Self {
            header: FrameHeader::new(frame_type::SETTINGS, flags::SETTINGS_ACK, 0),
            params: Vec::new(),
        }
    }

    pub fn is_ack(&self) -> bool {
        self.header.has_flag(flags::SETTINGS_ACK)
    }

    /// Last value for `id`, following the "later entries win" rule.
    pub fn get(&self, id: SettingId) -> Option<u32> {
        self.params
            .iter()
            .rev()
            .find(|p| p.identifier == id)
            .map(|p| p.value)
    }
}

impl FrameCodec for SettingsFrame {
    fn header(&self) -> &FrameHeader {
        &self.header
    }

    fn frame_type(&self) -> u8 {
        frame_type::SETTINGS
    }

    fn parse_payload<R: Read + ?Sized>(
        r: &mut R,
        header: FrameHeader,
    ) -> Result<Self, FrameError> {
        // always drain the payload so the reader stays on a frame boundary
        let raw = read_payload(r, header.length)?;
        if raw.len() % SETTING_ENTRY_LEN != 0 {
            return Err(FrameError::malformed(
                "SETTINGS",
                format!("length {} is not a multiple of 6", header.length),
            ));
        }

        let params = raw
            .chunks_exact(SETTING_ENTRY_LEN)
            .map(|entry| SettingsParameter {
                identifier: SettingId(u16::from_be_bytes([entry[0], entry[1]])),
                value: u32::from_be_bytes([entry[2], entry[3], entry[4], entry[5]]),
            })
            .collect();

        Ok(Self { header, params })
    }

    fn marshal_payload(&self) -> Result<Vec<u8>, FrameError> {
        let mut buf = Vec::with_capacity(self.params.len() * SETTING_ENTRY_LEN);
        for p in &self.params {
            buf.extend_from_slice(&p.identifier.0.to_be_bytes());
            buf.extend_from_slice(&p.value.to_be_bytes());
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(length: u32) -> FrameHeader {
        FrameHeader {
            length,
            ..FrameHeader::new(frame_type::SETTINGS, 0, 0)
        }
    }

    #[test]
    fn rejects_lengths_that_are_not_a_multiple_of_six() {
        for length in [1u32, 5, 7, 11, 13, 59] {
            let payload = vec![0u8; length as usize];
            let err = SettingsFrame::parse_payload(&mut &payload[..], header(length)).unwrap_err();
            assert!(
                matches!(err, FrameError::MalformedPayload { frame: "SETTINGS", .. }),
                "length {length}: {err:?}"
            );
        }
    }

    #[test]
    fn keeps_order_and_duplicates() {
        let payload = [
            0x00, 0x05, 0x00, 0x00, 0x40, 0x00, // MAX_FRAME_SIZE 16384
            0x00, 0x2a, 0x00, 0x00, 0x00, 0x07, // unknown id 42
            0x00, 0x05, 0x00, 0x00, 0x3f, 0xff, // MAX_FRAME_SIZE 16383
        ];
        let frame = SettingsFrame::parse_payload(&mut &payload[..], header(18)).unwrap();
        assert_eq!(
            frame.params,
            vec![
                SettingsParameter::new(SettingId::MAX_FRAME_SIZE, 16_384),
                SettingsParameter::new(SettingId(42), 7),
                SettingsParameter::new(SettingId::MAX_FRAME_SIZE, 16_383),
            ]
        );
        assert_eq!(frame.get(SettingId::MAX_FRAME_SIZE), Some(16_383));
        assert_eq!(frame.get(SettingId::ENABLE_PUSH), None);
        assert_eq!(frame.marshal_payload().unwrap(), payload);
    }

    #[test]
    fn empty_ack() {
        let ack = SettingsFrame::ack();
        assert!(ack.is_ack());
        assert_eq!(
            ack.marshal_binary().unwrap(),
            [0, 0, 0, frame_type::SETTINGS, flags::SETTINGS_ACK, 0, 0, 0, 0]
        );
    }

    #[test]
    fn unknown_ids_display_in_hex() {
        assert_eq!(SettingId::INITIAL_WINDOW_SIZE.to_string(), "INITIAL_WINDOW_SIZE");
        assert_eq!(SettingId(0x99).to_string(), "UNKNOWN(0x0099)");
    }
}
