//! Packets without internal structure worth decoding: user ids, user
//! attributes, markers, trust and private-use packets.

use bytes::{BufMut, Bytes, BytesMut};

use super::PacketBody;
use crate::{
    errors::{ProtocolError, Result},
    tag::Tag,
};

/// User ID (tag 13), conventionally `Name (Comment) <email>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId {
    /// UTF-8 text
    pub value: String,
}

impl UserId {
    /// Wrap a user id string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }

    /// Octets hashed into certifications: `B4 ‖ u32(len) ‖ value`.
    #[must_use]
    pub fn certification_prefix(&self) -> Vec<u8> {
        hash_prefix(0xB4, self.value.as_bytes())
    }
}

impl PacketBody for UserId {
    const TAG: Tag = Tag::UserId;

    fn decode_body(body: Bytes) -> Result<Self> {
        String::from_utf8(body.to_vec())
            .map(|value| Self { value })
            .map_err(|_| ProtocolError::malformed("user id", "not valid UTF-8"))
    }

    fn encode_body(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_slice(self.value.as_bytes());
        Ok(())
    }
}

/// User Attribute (tag 17), kept opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAttribute {
    /// Attribute subpackets
    pub data: Bytes,
}

impl UserAttribute {
    /// Octets hashed into certifications: `D1 ‖ u32(len) ‖ data`.
    #[must_use]
    pub fn certification_prefix(&self) -> Vec<u8> {
        hash_prefix(0xD1, &self.data)
    }
}

impl PacketBody for UserAttribute {
    const TAG: Tag = Tag::UserAttribute;

    fn decode_body(body: Bytes) -> Result<Self> {
        Ok(Self { data: body })
    }

    fn encode_body(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_slice(&self.data);
        Ok(())
    }
}

/// Marker (tag 10), always the three octets `PGP`. Ignored on receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Marker;

impl PacketBody for Marker {
    const TAG: Tag = Tag::Marker;

    fn decode_body(body: Bytes) -> Result<Self> {
        if &body[..] != b"PGP" {
            return Err(ProtocolError::malformed("marker", "body must be \"PGP\""));
        }
        Ok(Self)
    }

    fn encode_body(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_slice(b"PGP");
        Ok(())
    }
}

/// Trust (tag 12), implementation-defined keyring data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trust {
    /// Raw trust octets
    pub data: Bytes,
}

impl PacketBody for Trust {
    const TAG: Tag = Tag::Trust;

    fn decode_body(body: Bytes) -> Result<Self> {
        Ok(Self { data: body })
    }

    fn encode_body(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_slice(&self.data);
        Ok(())
    }
}

/// Private or experimental packet (tags 60..=63), preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaquePacket {
    /// Wire tag value
    pub tag: u8,
    /// Raw body
    pub body: Bytes,
}

fn hash_prefix(marker: u8, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 5);
    out.push(marker);
    // INVARIANT: packet bodies are bounded by the u32 length field
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
    out
}
