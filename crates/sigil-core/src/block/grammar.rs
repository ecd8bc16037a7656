//! Block recognition over a parsed packet sequence.
//!
//! ```text
//! block    := marker* (key | message)
//! key      := SecretKey ... | PublicKey ...          (see transferable_key)
//! message  := (Signature | OnePass)* body Signature*
//! body     := Esk* EncryptedData | LiteralData | CompressedData
//! ```
//!
//! Parsing is a pure function of an immutable packet slice and a [`Cursor`]:
//! every production returns its value together with the advanced cursor, so
//! a failed parse leaves nothing half-consumed.

use sigil_proto::{OnePassSignature, Packet};
use tracing::debug;

use super::{Block, EncryptedMessage, Message, MessageBody, MessageSignature, TransferableKey};
use crate::{
    error::{Error, Result},
    linker::SignatureLinker,
};

/// Read position in a packet slice.
///
/// Copying a cursor is free; parse functions take one by value and return
/// the position after what they consumed.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    packets: &'a [Packet],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Cursor at the start of `packets`.
    #[must_use]
    pub fn new(packets: &'a [Packet]) -> Self {
        Self { packets, pos: 0 }
    }

    /// Next packet without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<&'a Packet> {
        self.packets.get(self.pos)
    }

    /// Next packet and the cursor after it.
    #[must_use]
    pub fn split_first(self) -> Option<(&'a Packet, Self)> {
        let packet = self.packets.get(self.pos)?;
        Some((packet, Self { pos: self.pos + 1, ..self }))
    }

    /// Cursor `n` packets further on, clamped to the end.
    #[must_use]
    pub fn advance(self, n: usize) -> Self {
        Self { pos: (self.pos + n).min(self.packets.len()), ..self }
    }

    /// Skip leading packets matching `pred`.
    #[must_use]
    pub fn skip_while(self, pred: impl Fn(&Packet) -> bool) -> Self {
        let skipped = self.remaining().iter().take_while(|p| pred(p)).count();
        self.advance(skipped)
    }

    /// Packets not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> &'a [Packet] {
        &self.packets[self.pos..]
    }

    /// Index of the next packet.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// True when every packet has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.packets.len()
    }
}

enum Leading {
    Plain(sigil_proto::Signature),
    OnePass(OnePassSignature),
}

/// Recognise one block at `cursor`.
///
/// Returns `Ok(None)` when only ignorable packets remain.
///
/// # Errors
///
/// - `Error::Parse` if the packets at `cursor` match no production, a key
///   block is malformed, or packets follow a message body that its
///   signatures do not account for
pub fn parse_block(cursor: Cursor<'_>) -> Result<Option<(Block, Cursor<'_>)>> {
    let cursor = cursor.skip_while(Packet::is_ignorable);

    let mut leading = Vec::new();
    let mut cursor = cursor;
    while let Some((packet, rest)) = cursor.split_first() {
        match packet {
            Packet::Signature(sig) => leading.push(Leading::Plain(sig.clone())),
            Packet::OnePassSignature(ops) => leading.push(Leading::OnePass(ops.clone())),
            _ => break,
        }
        cursor = rest;
    }

    let Some(next) = cursor.peek() else {
        if leading.is_empty() {
            return Ok(None);
        }
        return Err(Error::parse("signatures without signed data"));
    };

    match next {
        Packet::SecretKey(_) | Packet::PublicKey(_) => {
            if !leading.is_empty() {
                return Err(Error::parse("signatures preceding a key block"));
            }
            let (key, rest) = TransferableKey::parse(cursor)?;
            debug!(key_id = %key.key_id(), secret = key.is_secret(), "parsed transferable key");
            let block = if key.is_secret() { Block::SecretKey(key) } else { Block::PublicKey(key) };
            Ok(Some((block, rest)))
        },
        Packet::PublicKeyEsk(_)
        | Packet::SymmetricKeyEsk(_)
        | Packet::SymEncryptedData(_)
        | Packet::SymEncryptedProtectedData(_)
        | Packet::LiteralData(_)
        | Packet::CompressedData(_) => {
            let (body, rest) = parse_body(cursor)?;
            let (message, rest) = finish_message(leading, body, rest);
            let rest = rest.skip_while(Packet::is_ignorable);
            if !rest.is_empty() {
                return Err(Error::parse("Unexpected packets following message block"));
            }
            Ok(Some((Block::Message(message), rest)))
        },
        other => Err(Error::parse(format!("no valid block starts with {:?}", other.tag()))),
    }
}

/// Recognise every block in `packets`, in order.
///
/// # Errors
///
/// See [`parse_block`].
pub fn parse_blocks(packets: &[Packet]) -> Result<Vec<Block>> {
    let mut blocks = Vec::new();
    let mut cursor = Cursor::new(packets);
    while let Some((block, rest)) = parse_block(cursor)? {
        blocks.push(block);
        cursor = rest;
    }
    Ok(blocks)
}

/// Parse `packets` as exactly one message.
///
/// Used for the contents of compressed and decrypted packets, where a key
/// block is not a valid production.
///
/// # Errors
///
/// - `Error::Parse` if the packets do not form a single message
pub fn parse_message(packets: &[Packet]) -> Result<Message> {
    match parse_block(Cursor::new(packets))? {
        Some((Block::Message(message), _)) => Ok(message),
        Some(_) => Err(Error::parse("expected a message, found a key block")),
        None => Err(Error::parse("empty message")),
    }
}

fn parse_body(cursor: Cursor<'_>) -> Result<(MessageBody, Cursor<'_>)> {
    let Some((packet, rest)) = cursor.split_first() else {
        return Err(Error::parse("message body missing"));
    };
    match packet {
        Packet::LiteralData(literal) => Ok((MessageBody::Literal(literal.clone()), rest)),
        Packet::CompressedData(compressed) => Ok((MessageBody::Compressed(compressed.clone()), rest)),
        _ => {
            let (encrypted, rest) = EncryptedMessage::parse(cursor)?;
            Ok((MessageBody::Encrypted(encrypted), rest))
        },
    }
}

fn finish_message(
    leading: Vec<Leading>,
    body: MessageBody,
    cursor: Cursor<'_>,
) -> (Message, Cursor<'_>) {
    let headers: Vec<OnePassSignature> = leading
        .iter()
        .filter_map(|l| match l {
            Leading::OnePass(ops) => Some(ops.clone()),
            Leading::Plain(_) => None,
        })
        .collect();
    let (linked, cursor) = SignatureLinker::link(headers, cursor);

    let mut linked = linked.into_iter();
    let signatures = leading
        .into_iter()
        .filter_map(|l| match l {
            Leading::Plain(sig) => Some(MessageSignature::Plain(sig)),
            Leading::OnePass(_) => linked.next().map(MessageSignature::OnePass),
        })
        .collect();

    (Message::new(signatures, body), cursor)
}

#[cfg(test)]
mod tests {
    use sigil_crypto::{HashAlgorithm, PublicKeyAlgorithm};
    use sigil_proto::{
        KeyId, LiteralData, LiteralFormat, Marker, Mpi, PublicKeyEsk, Signature, SignatureType,
        SymEncryptedProtectedData, UserId,
        packets::{
            EskMaterial, SignatureVersion,
            subpacket::{Subpacket, SubpacketValue},
        },
    };

    use super::*;

    fn literal() -> Packet {
        Packet::LiteralData(LiteralData::new(LiteralFormat::Binary, "f", 0, "data"))
    }

    fn signature() -> Packet {
        Packet::Signature(Signature {
            sig_type: SignatureType::Binary,
            pk_algorithm: PublicKeyAlgorithm::EdDsa,
            hash_algorithm: HashAlgorithm::Sha256,
            version: SignatureVersion::V4 {
                hashed: vec![Subpacket::new(SubpacketValue::SignatureCreationTime(1))],
                unhashed: vec![Subpacket::new(SubpacketValue::Issuer(KeyId::new([1; 8])))],
            },
            left16: [0, 0],
            mpis: vec![Mpi::new(vec![1])],
        })
    }

    fn pkesk(id: u8) -> Packet {
        Packet::PublicKeyEsk(PublicKeyEsk {
            key_id: KeyId::new([id; 8]),
            algorithm: PublicKeyAlgorithm::Ecdh,
            material: EskMaterial::Ecdh { point: Mpi::new(vec![0x40, 1]), wrapped: vec![0; 40].into() },
        })
    }

    fn seipd() -> Packet {
        Packet::SymEncryptedProtectedData(SymEncryptedProtectedData { ciphertext: vec![0; 64].into() })
    }

    #[test]
    fn empty_input_is_no_block() {
        assert!(parse_block(Cursor::new(&[])).unwrap().is_none());
        let markers = [Packet::Marker(Marker), Packet::Marker(Marker)];
        assert!(parse_block(Cursor::new(&markers)).unwrap().is_none());
    }

    #[test]
    fn signed_literal() {
        let packets = [signature(), literal()];
        let (block, rest) = parse_block(Cursor::new(&packets)).unwrap().unwrap();
        let Block::Message(message) = block else { panic!("expected message") };

        assert!(rest.is_empty());
        assert_eq!(message.signatures().len(), 1);
        assert!(matches!(message.body(), MessageBody::Literal(_)));
    }

    #[test]
    fn two_esks_then_data() {
        let packets = [pkesk(1), pkesk(2), seipd()];
        let (block, _) = parse_block(Cursor::new(&packets)).unwrap().unwrap();
        let Block::Message(message) = block else { panic!("expected message") };
        let MessageBody::Encrypted(encrypted) = message.body() else { panic!("expected encrypted") };

        assert_eq!(encrypted.esks.len(), 2);
    }

    #[test]
    fn esks_without_data_are_rejected() {
        let packets = [pkesk(1), pkesk(2)];
        assert!(matches!(
            parse_block(Cursor::new(&packets)),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn trailing_packets_are_rejected() {
        let packets = [literal(), literal()];
        let err = parse_block(Cursor::new(&packets)).unwrap_err();
        assert_eq!(err, Error::parse("Unexpected packets following message block"));
    }

    #[test]
    fn stray_packets_match_no_production() {
        let packets = [Packet::UserId(UserId::new("alice"))];
        assert!(matches!(
            parse_block(Cursor::new(&packets)),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn signatures_alone_are_rejected() {
        let packets = [signature()];
        assert!(parse_blocks(&packets).is_err());
    }
}
