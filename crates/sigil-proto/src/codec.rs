//! Tag-indexed packet codec.
//!
//! A [`PacketCodec`] maps each of the 64 possible tags to a body decoder.
//! It is assembled once through [`PacketCodecBuilder`] and is immutable
//! afterwards; [`PacketCodec::standard`] is the process-wide instance with
//! every packet kind of this crate registered.
//!
//! ```text
//! bytes ──read_packet──▶ RawPacket{tag, body} ──decoders[tag]──▶ Packet
//!                                            └─ 60..=63 ─▶ Packet::Private
//! ```

use std::sync::OnceLock;

use bytes::{Bytes, BytesMut};

use crate::{
    errors::{ProtocolError, Result},
    header::{RawPacket, read_packet},
    packet::Packet,
    packets::{
        CompressedData, LiteralData, Marker, OnePassSignature, OpaquePacket, PacketBody, PublicKey,
        PublicKeyEsk, SecretKey, Signature, SymEncryptedData, SymEncryptedProtectedData,
        SymmetricKeyEsk, Trust, UserAttribute, UserId,
    },
    tag::Tag,
};

/// Body decoder registered for a tag.
pub type Decoder = fn(Bytes) -> Result<Packet>;

const SLOTS: usize = Tag::MAX as usize + 1;

/// Collects decoders before freezing them into a [`PacketCodec`].
#[derive(Clone)]
pub struct PacketCodecBuilder {
    decoders: [Option<Decoder>; SLOTS],
}

impl Default for PacketCodecBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketCodecBuilder {
    /// Empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { decoders: [None; SLOTS] }
    }

    /// Builder pre-loaded with every packet kind of this crate.
    #[must_use]
    pub fn with_standard_packets() -> Self {
        Self::new()
            .register(Tag::PublicKeyEsk, |b| PublicKeyEsk::decode_body(b).map(Packet::PublicKeyEsk))
            .register(Tag::Signature, |b| Signature::decode_body(b).map(Packet::Signature))
            .register(Tag::SymmetricKeyEsk, |b| {
                SymmetricKeyEsk::decode_body(b).map(Packet::SymmetricKeyEsk)
            })
            .register(Tag::OnePassSignature, |b| {
                OnePassSignature::decode_body(b).map(Packet::OnePassSignature)
            })
            .register(Tag::SecretKey, |b| SecretKey::decode_body(b).map(Packet::SecretKey))
            .register(Tag::PublicKey, |b| PublicKey::decode_body(b).map(Packet::PublicKey))
            .register(Tag::SecretSubkey, |b| SecretKey::decode_body(b).map(Packet::SecretSubkey))
            .register(Tag::CompressedData, |b| {
                CompressedData::decode_body(b).map(Packet::CompressedData)
            })
            .register(Tag::SymEncryptedData, |b| {
                SymEncryptedData::decode_body(b).map(Packet::SymEncryptedData)
            })
            .register(Tag::Marker, |b| Marker::decode_body(b).map(Packet::Marker))
            .register(Tag::LiteralData, |b| LiteralData::decode_body(b).map(Packet::LiteralData))
            .register(Tag::Trust, |b| Trust::decode_body(b).map(Packet::Trust))
            .register(Tag::UserId, |b| UserId::decode_body(b).map(Packet::UserId))
            .register(Tag::PublicSubkey, |b| PublicKey::decode_body(b).map(Packet::PublicSubkey))
            .register(Tag::UserAttribute, |b| {
                UserAttribute::decode_body(b).map(Packet::UserAttribute)
            })
            .register(Tag::SymEncryptedProtectedData, |b| {
                SymEncryptedProtectedData::decode_body(b).map(Packet::SymEncryptedProtectedData)
            })
    }

    /// Register `decoder` for `tag`.
    ///
    /// The first registration for a tag wins; later ones are ignored so that
    /// repeated initialisation cannot change dispatch.
    #[must_use]
    pub fn register(mut self, tag: Tag, decoder: Decoder) -> Self {
        let slot = &mut self.decoders[usize::from(tag.to_u8())];
        if slot.is_none() {
            *slot = Some(decoder);
        }
        self
    }

    /// Freeze into a codec.
    #[must_use]
    pub fn build(self) -> PacketCodec {
        PacketCodec { decoders: self.decoders }
    }
}

/// Frozen tag → decoder table.
///
/// # Invariants
///
/// - The table never changes after [`PacketCodecBuilder::build`], so a codec
///   may be shared freely across threads.
#[derive(Clone)]
pub struct PacketCodec {
    decoders: [Option<Decoder>; SLOTS],
}

impl std::fmt::Debug for PacketCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registered: Vec<usize> =
            self.decoders.iter().enumerate().filter(|(_, d)| d.is_some()).map(|(i, _)| i).collect();
        f.debug_struct("PacketCodec").field("registered", &registered).finish()
    }
}

impl PacketCodec {
    /// Process-wide codec with every standard packet kind registered.
    pub fn standard() -> &'static Self {
        static STANDARD: OnceLock<PacketCodec> = OnceLock::new();
        STANDARD.get_or_init(|| PacketCodecBuilder::with_standard_packets().build())
    }

    /// True if a decoder is registered for `tag`.
    #[must_use]
    pub fn is_registered(&self, tag: u8) -> bool {
        self.decoders.get(usize::from(tag)).is_some_and(Option::is_some)
    }

    /// Parse one packet from the front of `input`.
    ///
    /// Returns the packet and the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Truncated` / `InvalidHeader` for framing failures
    /// - `ProtocolError::UnknownTag` for unregistered tags outside 60..=63
    /// - any error of the tag's body decoder
    pub fn parse_one(&self, input: &Bytes) -> Result<(Packet, usize)> {
        let (raw, consumed) = read_packet(input)?;
        Ok((self.decode_raw(raw)?, consumed))
    }

    /// Dispatch an already framed packet to its decoder.
    ///
    /// Callers that skip undecodable packets frame with
    /// [`crate::header::read_packet`] first, so a body error still tells them
    /// how far to advance.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownTag` for unregistered tags outside 60..=63
    /// - any error of the tag's body decoder
    pub fn decode_raw(&self, raw: RawPacket) -> Result<Packet> {
        if let Some(decoder) = self.decoders.get(usize::from(raw.tag)).copied().flatten() {
            return decoder(raw.body);
        }
        if Tag::PRIVATE_RANGE.contains(&raw.tag) {
            return Ok(Packet::Private(OpaquePacket { tag: raw.tag, body: raw.body }));
        }
        Err(ProtocolError::UnknownTag(raw.tag))
    }

    /// Parse every packet in `input`.
    ///
    /// # Errors
    ///
    /// The first error of [`PacketCodec::parse_one`]; no packets are returned
    /// on failure.
    pub fn parse_all(&self, input: &Bytes) -> Result<Vec<Packet>> {
        let mut packets = Vec::new();
        let mut rest = input.clone();
        while !rest.is_empty() {
            let (packet, consumed) = self.parse_one(&rest)?;
            packets.push(packet);
            rest = rest.slice(consumed..);
        }
        Ok(packets)
    }

    /// Parse every packet in `input`, dropping markers and private packets.
    ///
    /// This is the packet list block grammars operate on.
    ///
    /// # Errors
    ///
    /// See [`PacketCodec::parse_all`].
    pub fn parse_stream(&self, input: &Bytes) -> Result<Vec<Packet>> {
        let mut packets = self.parse_all(input)?;
        packets.retain(|p| !p.is_ignorable());
        Ok(packets)
    }

    /// Like [`PacketCodec::parse_stream`], but packets whose body fails to
    /// decode are dropped instead of failing the parse.
    ///
    /// Returns the surviving packets and the number dropped. Framing errors
    /// still abort, since no later packet boundary can be trusted.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Truncated` / `InvalidHeader` for framing failures
    pub fn parse_stream_lenient(&self, input: &Bytes) -> Result<(Vec<Packet>, usize)> {
        let mut packets = Vec::new();
        let mut skipped = 0;
        let mut rest = input.clone();
        while !rest.is_empty() {
            let (raw, consumed) = read_packet(&rest)?;
            match self.decode_raw(raw) {
                Ok(packet) if !packet.is_ignorable() => packets.push(packet),
                Ok(_) => {},
                Err(_) => skipped += 1,
            }
            rest = rest.slice(consumed..);
        }
        Ok((packets, skipped))
    }

    /// Encode `packets` back to back.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Serialization` if any packet cannot be encoded
    pub fn serialize(&self, packets: &[Packet]) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        for packet in packets {
            packet.encode(&mut buf)?;
        }
        Ok(buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::LiteralFormat;

    fn literal(data: &'static [u8]) -> Packet {
        Packet::LiteralData(LiteralData::new(LiteralFormat::Binary, "f", 7, data))
    }

    #[test]
    fn first_registration_wins() {
        fn as_marker(_: Bytes) -> Result<Packet> {
            Ok(Packet::Marker(Marker))
        }
        fn reject(_: Bytes) -> Result<Packet> {
            Err(ProtocolError::malformed("test", "second decoder ran"))
        }

        let codec = PacketCodecBuilder::new()
            .register(Tag::Trust, as_marker)
            .register(Tag::Trust, reject)
            .build();
        let input = Bytes::from_static(&[0xCC, 0]);
        assert_eq!(codec.parse_one(&input).unwrap().0, Packet::Marker(Marker));
    }

    #[test]
    fn unknown_public_tag_is_an_error() {
        // New-format tag 20 (AEAD), not registered
        let input = Bytes::from_static(&[0xD4, 0]);
        assert_eq!(PacketCodec::standard().parse_one(&input), Err(ProtocolError::UnknownTag(20)));
    }

    #[test]
    fn private_tag_decodes_as_opaque() {
        let input = Bytes::from_static(&[0xFC, 2, 0xAB, 0xCD]);
        let (packet, consumed) = PacketCodec::standard().parse_one(&input).unwrap();
        assert_eq!(consumed, 4);
        assert_eq!(packet, Packet::Private(OpaquePacket { tag: 60, body: Bytes::from_static(&[0xAB, 0xCD]) }));
    }

    #[test]
    fn old_format_literal_decodes() {
        // Old format, tag 11, one-byte length
        let input = Bytes::from_static(&[0xAC, 0x08, b'b', 0x00, 0, 0, 0, 0, b'o', b'k']);
        let (packet, _) = PacketCodec::standard().parse_one(&input).unwrap();
        let Packet::LiteralData(lit) = packet else { panic!("expected literal") };
        assert_eq!(&lit.data[..], b"ok");
    }

    #[test]
    fn stream_drops_markers_and_private_packets() {
        let codec = PacketCodec::standard();
        let mut bytes = BytesMut::new();
        Packet::Marker(Marker).encode(&mut bytes).unwrap();
        literal(b"a").encode(&mut bytes).unwrap();
        Packet::Private(OpaquePacket { tag: 63, body: Bytes::new() }).encode(&mut bytes).unwrap();
        let bytes = bytes.freeze();

        assert_eq!(codec.parse_all(&bytes).unwrap().len(), 3);
        assert_eq!(codec.parse_stream(&bytes).unwrap(), vec![literal(b"a")]);
    }

    #[test]
    fn lenient_stream_skips_undecodable_bodies() {
        let codec = PacketCodec::standard();
        let mut bytes = BytesMut::new();
        literal(b"a").encode(&mut bytes).unwrap();
        // Literal with an unknown format octet
        bytes.extend_from_slice(&[0xCB, 6, b'x', 0, 0, 0, 0, 0]);
        literal(b"c").encode(&mut bytes).unwrap();
        let bytes = bytes.freeze();

        assert!(codec.parse_stream(&bytes).is_err());
        let (packets, skipped) = codec.parse_stream_lenient(&bytes).unwrap();
        assert_eq!(packets, vec![literal(b"a"), literal(b"c")]);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn truncated_second_packet_fails_whole_parse() {
        let codec = PacketCodec::standard();
        let mut bytes = codec.serialize(&[literal(b"a"), literal(b"b")]).unwrap().to_vec();
        bytes.pop();
        assert!(matches!(codec.parse_all(&bytes.into()), Err(ProtocolError::Truncated { .. })));
    }
}
