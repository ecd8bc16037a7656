//! The closed set of packet variants.
//!
//! # Invariants
//!
//! Each variant maps to exactly one [`Tag`] (enforced by match
//! exhaustiveness). Subkeys share their body type with primary keys and are
//! told apart only by the variant, so a subkey never re-encodes as a primary
//! key.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    errors::Result,
    header::write_header,
    packets::{
        CompressedData, LiteralData, Marker, OnePassSignature, OpaquePacket, PacketBody, PublicKey,
        PublicKeyEsk, SecretKey, Signature, SymEncryptedData, SymEncryptedProtectedData,
        SymmetricKeyEsk, Trust, UserAttribute, UserId,
    },
    tag::Tag,
};

/// A decoded packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Public-key encrypted session key (tag 1)
    PublicKeyEsk(PublicKeyEsk),
    /// Signature (tag 2)
    Signature(Signature),
    /// Symmetric-key encrypted session key (tag 3)
    SymmetricKeyEsk(SymmetricKeyEsk),
    /// One-pass signature header (tag 4)
    OnePassSignature(OnePassSignature),
    /// Secret primary key (tag 5)
    SecretKey(SecretKey),
    /// Public primary key (tag 6)
    PublicKey(PublicKey),
    /// Secret subkey (tag 7)
    SecretSubkey(SecretKey),
    /// Compressed data (tag 8)
    CompressedData(CompressedData),
    /// Legacy symmetrically encrypted data (tag 9)
    SymEncryptedData(SymEncryptedData),
    /// Marker (tag 10)
    Marker(Marker),
    /// Literal data (tag 11)
    LiteralData(LiteralData),
    /// Trust (tag 12)
    Trust(Trust),
    /// User ID (tag 13)
    UserId(UserId),
    /// Public subkey (tag 14)
    PublicSubkey(PublicKey),
    /// User attribute (tag 17)
    UserAttribute(UserAttribute),
    /// Integrity-protected encrypted data (tag 18)
    SymEncryptedProtectedData(SymEncryptedProtectedData),
    /// Private or experimental tag (60..=63), body kept verbatim
    Private(OpaquePacket),
}

impl Packet {
    /// Tag this packet is framed with.
    #[must_use]
    pub fn tag(&self) -> Tag {
        match self {
            Self::PublicKeyEsk(_) => Tag::PublicKeyEsk,
            Self::Signature(_) => Tag::Signature,
            Self::SymmetricKeyEsk(_) => Tag::SymmetricKeyEsk,
            Self::OnePassSignature(_) => Tag::OnePassSignature,
            Self::SecretKey(_) => Tag::SecretKey,
            Self::PublicKey(_) => Tag::PublicKey,
            Self::SecretSubkey(_) => Tag::SecretSubkey,
            Self::CompressedData(_) => Tag::CompressedData,
            Self::SymEncryptedData(_) => Tag::SymEncryptedData,
            Self::Marker(_) => Tag::Marker,
            Self::LiteralData(_) => Tag::LiteralData,
            Self::Trust(_) => Tag::Trust,
            Self::UserId(_) => Tag::UserId,
            Self::PublicSubkey(_) => Tag::PublicSubkey,
            Self::UserAttribute(_) => Tag::UserAttribute,
            Self::SymEncryptedProtectedData(_) => Tag::SymEncryptedProtectedData,
            Self::Private(opaque) => Tag::Private(opaque.tag),
        }
    }

    /// Encoded body without a header.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Serialization` if a field cannot be represented
    pub fn body(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        match self {
            Self::PublicKeyEsk(p) => p.encode_body(&mut buf)?,
            Self::Signature(p) => p.encode_body(&mut buf)?,
            Self::SymmetricKeyEsk(p) => p.encode_body(&mut buf)?,
            Self::OnePassSignature(p) => p.encode_body(&mut buf)?,
            Self::SecretKey(p) | Self::SecretSubkey(p) => p.encode_body(&mut buf)?,
            Self::PublicKey(p) | Self::PublicSubkey(p) => p.encode_body(&mut buf)?,
            Self::CompressedData(p) => p.encode_body(&mut buf)?,
            Self::SymEncryptedData(p) => p.encode_body(&mut buf)?,
            Self::Marker(p) => p.encode_body(&mut buf)?,
            Self::LiteralData(p) => p.encode_body(&mut buf)?,
            Self::Trust(p) => p.encode_body(&mut buf)?,
            Self::UserId(p) => p.encode_body(&mut buf)?,
            Self::UserAttribute(p) => p.encode_body(&mut buf)?,
            Self::SymEncryptedProtectedData(p) => p.encode_body(&mut buf)?,
            Self::Private(p) => return Ok(p.body.clone()),
        }
        Ok(buf.freeze())
    }

    /// Append a new-format header and the body to `dst`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Serialization` if the body cannot be encoded or its
    ///   length exceeds `u32::MAX`
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let body = self.body()?;
        write_header(dst, self.tag().to_u8(), body.len())?;
        dst.put_slice(&body);
        Ok(())
    }

    /// Complete encoded packet as a fresh buffer.
    ///
    /// # Errors
    ///
    /// See [`Packet::encode`].
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// True for packets that carry no meaning in block grammars.
    #[must_use]
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::Marker(_) | Self::Private(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::LiteralFormat;

    #[test]
    fn encodes_with_new_format_header() {
        let packet = Packet::LiteralData(LiteralData::new(LiteralFormat::Binary, "", 0, &b"hi"[..]));
        let bytes = packet.to_bytes().unwrap();
        // 0xC0 | 11, body = b 00 00000000 "hi"
        assert_eq!(&bytes[..], &[0xCB, 8, b'b', 0, 0, 0, 0, 0, b'h', b'i']);
    }

    #[test]
    fn subkeys_keep_their_own_tag() {
        let key = PublicKey::new(
            3,
            0,
            Some(0),
            sigil_crypto::PublicKeyAlgorithm::Rsa,
            crate::packets::PublicKeyMaterial::Rsa {
                n: crate::Mpi::new(vec![0xC5; 16]),
                e: crate::Mpi::new(vec![3]),
            },
        )
        .unwrap();
        assert_eq!(Packet::PublicSubkey(key.clone()).tag(), Tag::PublicSubkey);
        assert_eq!(Packet::PublicKey(key).tag(), Tag::PublicKey);
    }

    #[test]
    fn private_packets_re_encode_verbatim() {
        let packet = Packet::Private(OpaquePacket { tag: 61, body: Bytes::from_static(b"xyz") });
        assert_eq!(&packet.to_bytes().unwrap()[..], &[0xFD, 3, b'x', b'y', b'z']);
        assert!(packet.is_ignorable());
    }
}
