//! Transferable public and secret keys (RFC4880 §11.1, §11.2).
//!
//! ```text
//! key      := Primary KeyRevocation* identity+ subkey*
//! identity := (UserId | UserAttribute) (Certification | CertRevocation | Trust)*
//! subkey   := Subkey (Binding | SubkeyRevocation | Trust)*
//! ```
//!
//! Trust packets are accepted and dropped. A secret key block uses secret
//! key and secret subkey packets throughout; a public block the public ones.

use bytes::{Bytes, BytesMut};
use sigil_proto::{
    KeyId, Packet, PublicKey, SecretKey, Signature, SignatureType, UserAttribute, UserId,
    packets::subpacket::{FLAG_ENCRYPT_COMMUNICATIONS, FLAG_ENCRYPT_STORAGE, FLAG_SIGN},
};
use tracing::{debug, warn};

use super::Cursor;
use crate::error::{Error, Result};

/// A key packet in either form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPacket {
    /// Public half only
    Public(PublicKey),
    /// Public half and secret material
    Secret(SecretKey),
}

impl KeyPacket {
    /// Public half.
    #[must_use]
    pub fn public(&self) -> &PublicKey {
        match self {
            Self::Public(key) => key,
            Self::Secret(key) => &key.public,
        }
    }

    /// Secret key, if present.
    #[must_use]
    pub fn secret(&self) -> Option<&SecretKey> {
        match self {
            Self::Public(_) => None,
            Self::Secret(key) => Some(key),
        }
    }

    fn into_public(self) -> Self {
        match self {
            Self::Public(key) => Self::Public(key),
            Self::Secret(key) => Self::Public(key.public),
        }
    }
}

/// A user id or user attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// User id (tag 13)
    UserId(UserId),
    /// User attribute (tag 17)
    UserAttribute(UserAttribute),
}

impl Identity {
    /// Bytes hashed after the primary key by certifications.
    #[must_use]
    pub fn certification_prefix(&self) -> Vec<u8> {
        match self {
            Self::UserId(uid) => uid.certification_prefix(),
            Self::UserAttribute(attr) => attr.certification_prefix(),
        }
    }

    fn to_packet(&self) -> Packet {
        match self {
            Self::UserId(uid) => Packet::UserId(uid.clone()),
            Self::UserAttribute(attr) => Packet::UserAttribute(attr.clone()),
        }
    }
}

/// An identity with its certifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertifiedIdentity {
    /// User id or attribute
    pub identity: Identity,
    /// Certification signatures (types 0x10..=0x13)
    pub certifications: Vec<Signature>,
    /// Certification revocations (type 0x30)
    pub revocations: Vec<Signature>,
}

/// A subkey with its binding and revocation signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subkey {
    /// Subkey packet
    pub key: KeyPacket,
    /// Subkey binding signatures (type 0x18)
    pub bindings: Vec<Signature>,
    /// Subkey revocations (type 0x28)
    pub revocations: Vec<Signature>,
}

impl Subkey {
    fn newest_binding(&self) -> Option<&Signature> {
        self.bindings.iter().max_by_key(|sig| sig.creation_time())
    }

    fn has_flags(&self, wanted: u8) -> bool {
        match self.newest_binding().and_then(Signature::key_flags) {
            Some(flags) => flags & wanted != 0,
            None => {
                let algorithm = self.key.public().algorithm();
                if wanted & FLAG_SIGN != 0 { algorithm.can_sign() } else { algorithm.can_encrypt() }
            },
        }
    }
}

/// A primary key with its identities and subkeys.
///
/// # Invariants
///
/// - At least one identity is a user id.
/// - Subkeys are secret exactly when the primary key is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferableKey {
    primary: KeyPacket,
    revocations: Vec<Signature>,
    identities: Vec<CertifiedIdentity>,
    subkeys: Vec<Subkey>,
}

impl TransferableKey {
    /// Assemble a key from parts.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArguments` if there is no user id or subkeys do not
    ///   match the primary key's form
    pub fn new(
        primary: KeyPacket,
        revocations: Vec<Signature>,
        identities: Vec<CertifiedIdentity>,
        subkeys: Vec<Subkey>,
    ) -> Result<Self> {
        if !identities.iter().any(|c| matches!(c.identity, Identity::UserId(_))) {
            return Err(Error::InvalidArguments("Missing User ID".into()));
        }
        let secret = primary.secret().is_some();
        if subkeys.iter().any(|s| s.key.secret().is_some() != secret) {
            return Err(Error::InvalidArguments("subkey form differs from primary key".into()));
        }
        Ok(Self { primary, revocations, identities, subkeys })
    }

    /// Parse one key block at `cursor`.
    ///
    /// # Errors
    ///
    /// - `Error::Parse` for packet sequences that violate the key grammar
    pub fn parse(cursor: Cursor<'_>) -> Result<(Self, Cursor<'_>)> {
        let (primary, mut cursor) = match cursor.split_first() {
            Some((Packet::PublicKey(key), rest)) => (KeyPacket::Public(key.clone()), rest),
            Some((Packet::SecretKey(key), rest)) => (KeyPacket::Secret(key.clone()), rest),
            _ => return Err(Error::parse("transferable key must start with a primary key")),
        };
        let secret = primary.secret().is_some();

        let mut revocations = Vec::new();
        while let Some((packet, rest)) = cursor.split_first() {
            match packet {
                Packet::Signature(sig) if sig.sig_type == SignatureType::KeyRevocation => {
                    revocations.push(sig.clone());
                },
                Packet::Signature(sig) => {
                    return Err(Error::parse(format!(
                        "invalid signature type {:#04x} following primary key",
                        sig.sig_type.to_u8()
                    )));
                },
                Packet::Trust(_) => {},
                _ => break,
            }
            cursor = rest;
        }

        let mut identities = Vec::new();
        loop {
            let identity = match cursor.peek() {
                Some(Packet::UserId(uid)) => Identity::UserId(uid.clone()),
                Some(Packet::UserAttribute(attr)) => Identity::UserAttribute(attr.clone()),
                _ => break,
            };
            cursor = cursor.advance(1);
            let mut certified =
                CertifiedIdentity { identity, certifications: Vec::new(), revocations: Vec::new() };
            while let Some((packet, rest)) = cursor.split_first() {
                match packet {
                    Packet::Signature(sig) if sig.sig_type.is_certification() => {
                        certified.certifications.push(sig.clone());
                    },
                    Packet::Signature(sig) if sig.sig_type == SignatureType::CertificationRevocation => {
                        certified.revocations.push(sig.clone());
                    },
                    Packet::Trust(_) => {},
                    _ => break,
                }
                cursor = rest;
            }
            identities.push(certified);
        }
        if !identities.iter().any(|c| matches!(c.identity, Identity::UserId(_))) {
            return Err(Error::parse("Missing User ID"));
        }

        let mut subkeys = Vec::new();
        loop {
            let key = match (cursor.peek(), secret) {
                (Some(Packet::PublicSubkey(key)), false) => KeyPacket::Public(key.clone()),
                (Some(Packet::SecretSubkey(key)), true) => KeyPacket::Secret(key.clone()),
                _ => break,
            };
            cursor = cursor.advance(1);
            let mut subkey = Subkey { key, bindings: Vec::new(), revocations: Vec::new() };
            while let Some((packet, rest)) = cursor.split_first() {
                match packet {
                    Packet::Signature(sig) if sig.sig_type == SignatureType::SubkeyBinding => {
                        subkey.bindings.push(sig.clone());
                    },
                    Packet::Signature(sig) if sig.sig_type == SignatureType::SubkeyRevocation => {
                        subkey.revocations.push(sig.clone());
                    },
                    Packet::Trust(_) => {},
                    _ => break,
                }
                cursor = rest;
            }
            subkeys.push(subkey);
        }

        Ok((Self { primary, revocations, identities, subkeys }, cursor))
    }

    /// True for a secret key block.
    #[must_use]
    pub fn is_secret(&self) -> bool {
        self.primary.secret().is_some()
    }

    /// Primary key packet.
    #[must_use]
    pub fn primary(&self) -> &KeyPacket {
        &self.primary
    }

    /// Public half of the primary key.
    #[must_use]
    pub fn primary_key(&self) -> &PublicKey {
        self.primary.public()
    }

    /// Key id of the primary key.
    #[must_use]
    pub fn key_id(&self) -> KeyId {
        self.primary.public().key_id()
    }

    /// Key revocation signatures.
    #[must_use]
    pub fn revocations(&self) -> &[Signature] {
        &self.revocations
    }

    /// Identities in wire order.
    #[must_use]
    pub fn identities(&self) -> &[CertifiedIdentity] {
        &self.identities
    }

    /// Subkeys in wire order.
    #[must_use]
    pub fn subkeys(&self) -> &[Subkey] {
        &self.subkeys
    }

    /// User id strings in wire order.
    #[must_use]
    pub fn user_ids(&self) -> Vec<&str> {
        self.identities
            .iter()
            .filter_map(|c| match &c.identity {
                Identity::UserId(uid) => Some(uid.value.as_str()),
                Identity::UserAttribute(_) => None,
            })
            .collect()
    }

    fn key_packets(&self) -> impl Iterator<Item = &KeyPacket> {
        std::iter::once(&self.primary).chain(self.subkeys.iter().map(|s| &s.key))
    }

    /// Primary key or subkey with `key_id`.
    #[must_use]
    pub fn key_by_id(&self, key_id: KeyId) -> Option<&PublicKey> {
        self.key_packets().map(KeyPacket::public).find(|key| key.key_id() == key_id)
    }

    /// Secret primary key or subkey with `key_id`.
    #[must_use]
    pub fn secret_key_by_id(&self, key_id: KeyId) -> Option<&SecretKey> {
        self.key_packets().filter_map(KeyPacket::secret).find(|key| key.public.key_id() == key_id)
    }

    /// Every secret key packet, primary first.
    pub fn secret_keys(&self) -> impl Iterator<Item = &SecretKey> {
        self.key_packets().filter_map(KeyPacket::secret)
    }

    fn key_to(&self, flags: u8, capable: fn(&PublicKey) -> bool) -> Option<&PublicKey> {
        let subkey = self
            .subkeys
            .iter()
            .filter(|s| s.revocations.is_empty() && !s.bindings.is_empty())
            .filter(|s| capable(s.key.public()) && s.has_flags(flags))
            .max_by_key(|s| s.newest_binding().map(Signature::creation_time));
        match subkey {
            Some(subkey) => Some(subkey.key.public()),
            None => Some(self.primary_key()).filter(|key| capable(key)),
        }
    }

    /// Newest bound subkey that may encrypt, else the primary key if it can.
    #[must_use]
    pub fn key_to_encrypt(&self) -> Option<&PublicKey> {
        self.key_to(FLAG_ENCRYPT_COMMUNICATIONS | FLAG_ENCRYPT_STORAGE, |key| {
            key.algorithm().can_encrypt()
        })
    }

    /// Newest bound subkey that may sign, else the primary key if it can.
    #[must_use]
    pub fn key_to_sign(&self) -> Option<&PublicKey> {
        self.key_to(FLAG_SIGN, |key| key.algorithm().can_sign())
    }

    /// The same key with every secret part removed.
    #[must_use]
    pub fn to_public(&self) -> Self {
        Self {
            primary: self.primary.clone().into_public(),
            revocations: self.revocations.clone(),
            identities: self.identities.clone(),
            subkeys: self
                .subkeys
                .iter()
                .cloned()
                .map(|s| Subkey { key: s.key.into_public(), ..s })
                .collect(),
        }
    }

    /// Packets in wire order.
    #[must_use]
    pub fn packets(&self) -> Vec<Packet> {
        let mut out = vec![match &self.primary {
            KeyPacket::Public(key) => Packet::PublicKey(key.clone()),
            KeyPacket::Secret(key) => Packet::SecretKey(key.clone()),
        }];
        out.extend(self.revocations.iter().cloned().map(Packet::Signature));
        for certified in &self.identities {
            out.push(certified.identity.to_packet());
            out.extend(certified.certifications.iter().cloned().map(Packet::Signature));
            out.extend(certified.revocations.iter().cloned().map(Packet::Signature));
        }
        for subkey in &self.subkeys {
            out.push(match &subkey.key {
                KeyPacket::Public(key) => Packet::PublicSubkey(key.clone()),
                KeyPacket::Secret(key) => Packet::SecretSubkey(key.clone()),
            });
            out.extend(subkey.bindings.iter().cloned().map(Packet::Signature));
            out.extend(subkey.revocations.iter().cloned().map(Packet::Signature));
        }
        out
    }

    /// Encoded packet stream.
    ///
    /// # Errors
    ///
    /// - `Error::Serialization` if a packet cannot be encoded
    pub fn serialize(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        for packet in self.packets() {
            packet.encode(&mut buf)?;
        }
        Ok(buf.freeze())
    }
}

fn is_primary(packet: &Packet) -> bool {
    matches!(packet, Packet::PublicKey(_) | Packet::SecretKey(_))
}

/// Parse every key block in `packets`.
///
/// With `skip_invalid`, a block that fails to parse (or packets that do not
/// start a key) are skipped up to the next primary key packet.
///
/// # Errors
///
/// - `Error::Parse` for the first invalid block when `skip_invalid` is false
pub fn parse_all_transferable_keys(
    packets: &[Packet],
    skip_invalid: bool,
) -> Result<Vec<TransferableKey>> {
    let mut keys = Vec::new();
    let mut cursor = Cursor::new(packets).skip_while(Packet::is_ignorable);

    while !cursor.is_empty() {
        let result = match cursor.peek() {
            Some(packet) if is_primary(packet) => TransferableKey::parse(cursor),
            _ => Err(Error::parse("expected a primary key packet")),
        };
        match result {
            Ok((key, rest)) => {
                debug!(key_id = %key.key_id(), "parsed key block");
                keys.push(key);
                cursor = rest;
            },
            Err(err) if skip_invalid => {
                warn!(position = cursor.position(), %err, "skipping invalid key block");
                cursor = cursor.advance(1).skip_while(|p| !is_primary(p));
            },
            Err(err) => return Err(err),
        }
        cursor = cursor.skip_while(Packet::is_ignorable);
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use sigil_crypto::{HashAlgorithm, PublicKeyAlgorithm};
    use sigil_proto::{
        Mpi, PublicKeyMaterial, Trust,
        packets::{
            SignatureVersion,
            subpacket::{Subpacket, SubpacketValue},
        },
    };

    use super::*;

    fn rsa_key(tail: u8, created: u32) -> PublicKey {
        let mut n = vec![0xC1; 32];
        n[31] = tail;
        PublicKey::new_v4(
            created,
            PublicKeyAlgorithm::Rsa,
            PublicKeyMaterial::Rsa { n: Mpi::new(n), e: Mpi::new(vec![1, 0, 1]) },
        )
        .unwrap()
    }

    fn sig(sig_type: SignatureType, created: u32, flags: Option<u8>) -> Signature {
        let mut hashed = vec![Subpacket::new(SubpacketValue::SignatureCreationTime(created))];
        if let Some(flags) = flags {
            hashed.push(Subpacket::new(SubpacketValue::KeyFlags(Bytes::copy_from_slice(&[flags]))));
        }
        Signature {
            sig_type,
            pk_algorithm: PublicKeyAlgorithm::Rsa,
            hash_algorithm: HashAlgorithm::Sha256,
            version: SignatureVersion::V4 { hashed, unhashed: Vec::new() },
            left16: [0, 0],
            mpis: vec![Mpi::new(vec![1])],
        }
    }

    fn public_block() -> Vec<Packet> {
        vec![
            Packet::PublicKey(rsa_key(1, 10)),
            Packet::Signature(sig(SignatureType::KeyRevocation, 11, None)),
            Packet::UserId(UserId::new("alice <a@example.org>")),
            Packet::Trust(Trust { data: Bytes::from_static(&[0]) }),
            Packet::Signature(sig(SignatureType::PositiveCertification, 12, None)),
            Packet::UserAttribute(UserAttribute { data: Bytes::from_static(&[1, 2, 3]) }),
            Packet::Signature(sig(SignatureType::CertificationRevocation, 13, None)),
            Packet::PublicSubkey(rsa_key(2, 20)),
            Packet::Signature(sig(SignatureType::SubkeyBinding, 21, Some(FLAG_ENCRYPT_STORAGE))),
            Packet::PublicSubkey(rsa_key(3, 30)),
            Packet::Signature(sig(SignatureType::SubkeyBinding, 31, Some(FLAG_ENCRYPT_COMMUNICATIONS))),
            Packet::PublicSubkey(rsa_key(4, 40)),
            Packet::Signature(sig(SignatureType::SubkeyBinding, 41, Some(FLAG_SIGN))),
        ]
    }

    #[test]
    fn parses_full_public_key() {
        let packets = public_block();
        let (key, rest) = TransferableKey::parse(Cursor::new(&packets)).unwrap();

        assert!(rest.is_empty());
        assert!(!key.is_secret());
        assert_eq!(key.revocations().len(), 1);
        assert_eq!(key.user_ids(), vec!["alice <a@example.org>"]);
        assert_eq!(key.identities().len(), 2);
        assert_eq!(key.identities()[1].revocations.len(), 1);
        assert_eq!(key.subkeys().len(), 3);

        // Trust packets are dropped on re-serialization
        let without_trust: Vec<Packet> =
            packets.into_iter().filter(|p| !matches!(p, Packet::Trust(_))).collect();
        assert_eq!(key.packets(), without_trust);
    }

    #[test]
    fn picks_newest_capable_subkey() {
        let packets = public_block();
        let (key, _) = TransferableKey::parse(Cursor::new(&packets)).unwrap();

        assert_eq!(key.key_to_encrypt().unwrap().key_id(), rsa_key(3, 30).key_id());
        assert_eq!(key.key_to_sign().unwrap().key_id(), rsa_key(4, 40).key_id());
        assert!(key.key_by_id(rsa_key(2, 20).key_id()).is_some());
        assert!(key.key_by_id(KeyId::new([9; 8])).is_none());
    }

    #[test]
    fn falls_back_to_primary_key() {
        let packets = &public_block()[..5];
        let (key, _) = TransferableKey::parse(Cursor::new(packets)).unwrap();
        assert_eq!(key.key_to_encrypt().unwrap().key_id(), key.key_id());
    }

    #[test]
    fn user_id_is_required() {
        let packets = [Packet::PublicKey(rsa_key(1, 10))];
        let err = TransferableKey::parse(Cursor::new(&packets)).unwrap_err();
        assert_eq!(err, Error::parse("Missing User ID"));
    }

    #[test]
    fn only_revocations_may_follow_the_primary_key() {
        let packets = [
            Packet::PublicKey(rsa_key(1, 10)),
            Packet::Signature(sig(SignatureType::Binary, 11, None)),
            Packet::UserId(UserId::new("a")),
        ];
        assert!(matches!(TransferableKey::parse(Cursor::new(&packets)), Err(Error::Parse(_))));
    }

    #[test]
    fn skip_invalid_resumes_at_next_primary() {
        let mut packets = vec![Packet::PublicKey(rsa_key(9, 1))]; // no user id
        packets.extend(public_block());

        assert!(parse_all_transferable_keys(&packets, false).is_err());
        let keys = parse_all_transferable_keys(&packets, true).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].key_id(), rsa_key(1, 10).key_id());
    }
}
