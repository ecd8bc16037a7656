//! Encrypted messages: session-key packets followed by one encrypted data
//! packet.

use bytes::Bytes;
use sigil_crypto::SessionKey;
use sigil_proto::{
    KeyId, Packet, PublicKeyEsk, SymEncryptedData, SymEncryptedProtectedData, SymmetricKeyEsk,
};

use super::Cursor;
use crate::error::{Error, Result};

/// An encrypted session key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Esk {
    /// Wrapped for a public key
    PublicKey(PublicKeyEsk),
    /// Wrapped under a passphrase
    Symmetric(SymmetricKeyEsk),
}

impl Esk {
    fn to_packet(&self) -> Packet {
        match self {
            Self::PublicKey(esk) => Packet::PublicKeyEsk(esk.clone()),
            Self::Symmetric(esk) => Packet::SymmetricKeyEsk(esk.clone()),
        }
    }
}

/// The encrypted data packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptedData {
    /// Integrity protected (tag 18)
    Protected(SymEncryptedProtectedData),
    /// Legacy, no integrity protection (tag 9)
    Legacy(SymEncryptedData),
}

/// Session keys and the data they open.
///
/// # Invariants
///
/// - Exactly one data packet; zero or more session keys precede it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedMessage {
    /// Session keys in wire order
    pub esks: Vec<Esk>,
    /// Encrypted inner message
    pub data: EncryptedData,
}

impl EncryptedMessage {
    /// Parse leading ESKs and exactly one data packet.
    ///
    /// # Errors
    ///
    /// - `Error::Parse` if no data packet follows the session keys
    pub fn parse(cursor: Cursor<'_>) -> Result<(Self, Cursor<'_>)> {
        let mut esks = Vec::new();
        let mut cursor = cursor;
        loop {
            let Some((packet, rest)) = cursor.split_first() else {
                return Err(Error::parse("encrypted data packet missing"));
            };
            cursor = rest;
            match packet {
                Packet::PublicKeyEsk(esk) => esks.push(Esk::PublicKey(esk.clone())),
                Packet::SymmetricKeyEsk(esk) => esks.push(Esk::Symmetric(esk.clone())),
                Packet::SymEncryptedProtectedData(data) => {
                    return Ok((Self { esks, data: EncryptedData::Protected(data.clone()) }, cursor));
                },
                Packet::SymEncryptedData(data) => {
                    return Ok((Self { esks, data: EncryptedData::Legacy(data.clone()) }, cursor));
                },
                other => {
                    return Err(Error::parse(format!(
                        "unexpected {:?} packet in encrypted message",
                        other.tag()
                    )));
                },
            }
        }
    }

    /// Packets in wire order.
    #[must_use]
    pub fn packets(&self) -> Vec<Packet> {
        let mut out: Vec<Packet> = self.esks.iter().map(Esk::to_packet).collect();
        out.push(match &self.data {
            EncryptedData::Protected(data) => Packet::SymEncryptedProtectedData(data.clone()),
            EncryptedData::Legacy(data) => Packet::SymEncryptedData(data.clone()),
        });
        out
    }

    /// Recipient key ids of the public-key ESKs.
    #[must_use]
    pub fn recipient_key_ids(&self) -> Vec<KeyId> {
        self.esks
            .iter()
            .filter_map(|esk| match esk {
                Esk::PublicKey(esk) => Some(esk.key_id),
                Esk::Symmetric(_) => None,
            })
            .collect()
    }

    /// Public-key ESKs in wire order.
    pub fn public_key_esks(&self) -> impl Iterator<Item = &PublicKeyEsk> {
        self.esks.iter().filter_map(|esk| match esk {
            Esk::PublicKey(esk) => Some(esk),
            Esk::Symmetric(_) => None,
        })
    }

    /// Passphrase ESKs in wire order.
    pub fn symmetric_esks(&self) -> impl Iterator<Item = &SymmetricKeyEsk> {
        self.esks.iter().filter_map(|esk| match esk {
            Esk::Symmetric(esk) => Some(esk),
            Esk::PublicKey(_) => None,
        })
    }

    /// Decrypt the data packet, returning the encoded inner packets.
    ///
    /// # Errors
    ///
    /// - `Error::Decrypt` if the integrity check fails (including a wrong
    ///   session key)
    /// - `Error::Unsupported` for legacy data under a modern cipher
    pub fn decrypt_data(&self, session: &SessionKey) -> Result<Bytes> {
        match &self.data {
            EncryptedData::Protected(data) => Ok(data.decrypt(session)?),
            EncryptedData::Legacy(data) => Ok(data.decrypt(session)?),
        }
    }
}
