//! Blocks: the top-level grammar productions built from packets.
//!
//! A [`Block`] is a sealed set of variants. Each variant owns its packets
//! and is produced only by [`parse_block`] or by a construction path
//! ([`Message::construct_literal`], `CipherOrchestrator::construct`,
//! [`ClearSignMessage::construct`](crate::clearsign::ClearSignMessage::construct)).

mod compressed;
mod encrypted;
mod grammar;
mod literal;
mod message;
mod transferable_key;

use bytes::Bytes;

pub use compressed::{compress, decompress};
pub use encrypted::{EncryptedData, EncryptedMessage, Esk};
pub use grammar::{Cursor, parse_block, parse_blocks, parse_message};
pub use message::{
    KeyLookup, Message, MessageBody, MessageSignature, VerifyFailure, VerifyResult,
};
pub use transferable_key::{
    CertifiedIdentity, Identity, KeyPacket, Subkey, TransferableKey, parse_all_transferable_keys,
};

use crate::{armor, clearsign::ClearSignMessage, error::Result};

/// One top-level production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Literal, compressed or encrypted message, possibly signed
    Message(Message),
    /// Transferable public key
    PublicKey(TransferableKey),
    /// Transferable secret key
    SecretKey(TransferableKey),
    /// Cleartext-signed text
    ClearSign(ClearSignMessage),
}

impl Block {
    /// Armor label (the text after `BEGIN PGP `).
    #[must_use]
    pub fn armor_label(&self) -> &'static str {
        match self {
            Self::Message(_) => "MESSAGE",
            Self::PublicKey(_) => "PUBLIC KEY BLOCK",
            Self::SecretKey(_) => "PRIVATE KEY BLOCK",
            Self::ClearSign(_) => "SIGNATURE",
        }
    }

    /// Encoded packets.
    ///
    /// A cleartext-signed block serializes as its detached signature packets;
    /// the signed text lives outside the packet stream.
    ///
    /// # Errors
    ///
    /// - `Error::Serialization` if a packet cannot be encoded
    pub fn serialize(&self) -> Result<Bytes> {
        match self {
            Self::Message(message) => message.serialize(),
            Self::PublicKey(key) | Self::SecretKey(key) => key.serialize(),
            Self::ClearSign(clearsign) => clearsign.serialize_signatures(),
        }
    }

    /// ASCII-armored text.
    ///
    /// # Errors
    ///
    /// - `Error::Serialization` if a packet cannot be encoded
    pub fn to_armored(&self) -> Result<String> {
        match self {
            Self::ClearSign(clearsign) => clearsign.to_armored(),
            _ => Ok(armor::encode(self.armor_label(), &[], &self.serialize()?)),
        }
    }
}
