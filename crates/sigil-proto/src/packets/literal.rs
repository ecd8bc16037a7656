//! Literal Data packet (tag 11).

use bytes::{BufMut, Bytes, BytesMut};

use super::PacketBody;
use crate::{
    errors::{ProtocolError, Result},
    reader::BodyReader,
    tag::Tag,
};

/// Interpretation hint for literal data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralFormat {
    /// `b`: binary
    Binary,
    /// `t`: text with canonical line endings
    Text,
    /// `u`: UTF-8 text
    Utf8,
}

impl LiteralFormat {
    fn to_u8(self) -> u8 {
        match self {
            Self::Binary => b'b',
            Self::Text => b't',
            Self::Utf8 => b'u',
        }
    }

    fn from_u8(value: u8) -> Option<Self> {
        match value {
            b'b' => Some(Self::Binary),
            b't' => Some(Self::Text),
            b'u' => Some(Self::Utf8),
            _ => None,
        }
    }
}

/// The plaintext payload of a message.
///
/// Layout: `format ‖ len(filename) ‖ filename ‖ u32 timestamp ‖ data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralData {
    /// Format hint
    pub format: LiteralFormat,
    /// Original file name, at most 255 bytes
    pub filename: Bytes,
    /// Modification time in seconds since the epoch
    pub timestamp: u32,
    /// Payload
    pub data: Bytes,
}

impl LiteralData {
    /// Longest representable file name.
    pub const MAX_FILENAME: usize = 255;

    /// Build a literal packet. File names beyond 255 bytes are truncated.
    #[must_use]
    pub fn new(
        format: LiteralFormat,
        filename: impl Into<Bytes>,
        timestamp: u32,
        data: impl Into<Bytes>,
    ) -> Self {
        let mut filename = filename.into();
        filename.truncate(Self::MAX_FILENAME);
        Self { format, filename, timestamp, data: data.into() }
    }
}

impl PacketBody for LiteralData {
    const TAG: Tag = Tag::LiteralData;

    fn decode_body(body: Bytes) -> Result<Self> {
        let mut r = BodyReader::new(body);
        let raw_format = r.read_u8()?;
        let format = LiteralFormat::from_u8(raw_format).ok_or_else(|| {
            ProtocolError::malformed("literal data", format!("unknown format {raw_format:#04x}"))
        })?;
        let filename = r.read_prefixed()?;
        let timestamp = r.read_u32()?;
        Ok(Self { format, filename, timestamp, data: r.rest() })
    }

    fn encode_body(&self, dst: &mut BytesMut) -> Result<()> {
        debug_assert!(self.filename.len() <= Self::MAX_FILENAME);

        dst.put_u8(self.format.to_u8());
        dst.put_u8(u8::try_from(self.filename.len()).map_err(|_| {
            ProtocolError::Serialization("literal file name exceeds 255 bytes".into())
        })?);
        dst.put_slice(&self.filename);
        dst.put_u32(self.timestamp);
        dst.put_slice(&self.data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_text_literal() {
        let body = Bytes::from_static(b"t\x05a.txt\x00\x00\x00\x2Ahello");
        let lit = LiteralData::decode_body(body).unwrap();
        assert_eq!(lit.format, LiteralFormat::Text);
        assert_eq!(&lit.filename[..], b"a.txt");
        assert_eq!(lit.timestamp, 42);
        assert_eq!(&lit.data[..], b"hello");
    }

    #[test]
    fn unknown_format_is_malformed() {
        let body = Bytes::from_static(b"x\x00\x00\x00\x00\x00");
        assert!(matches!(
            LiteralData::decode_body(body),
            Err(ProtocolError::Malformed { .. })
        ));
    }

    #[test]
    fn long_filename_is_truncated() {
        let lit = LiteralData::new(LiteralFormat::Binary, vec![b'a'; 300], 0, Bytes::new());
        assert_eq!(lit.filename.len(), 255);
        assert_eq!(lit.to_body().unwrap().len(), 1 + 1 + 255 + 4);
    }
}
