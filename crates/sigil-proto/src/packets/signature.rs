//! Signature packet (tag 2), versions 3 and 4.
//!
//! ```text
//! v3: 03 05 type created[4] issuer[8] pk hash left16[2] MPIs
//! v4: 04 type pk hash u16 hashed-area u16 unhashed-area left16[2] MPIs
//! ```
//!
//! The digest input is the signed data followed by a version-specific
//! trailer (see [`Signature::hash_trailer`]). Producing and checking the
//! MPIs is the job of the signer registry, not of this module.

use bytes::{BufMut, Bytes, BytesMut};
use sigil_crypto::{HashAlgorithm, Hasher, PublicKeyAlgorithm};

use super::{
    PacketBody,
    subpacket::{Subpacket, SubpacketValue, decode_area, encode_area},
};
use crate::{
    errors::{ProtocolError, Result},
    key_id::KeyId,
    mpi::Mpi,
    reader::BodyReader,
    tag::Tag,
};

/// Signature type octet (RFC4880 §5.2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureType {
    /// 0x00: binary document
    Binary,
    /// 0x01: canonical text document
    Text,
    /// 0x02: standalone
    Standalone,
    /// 0x10: generic user id certification
    GenericCertification,
    /// 0x11: persona certification
    PersonaCertification,
    /// 0x12: casual certification
    CasualCertification,
    /// 0x13: positive certification
    PositiveCertification,
    /// 0x18: subkey binding
    SubkeyBinding,
    /// 0x19: primary key binding (back-signature)
    PrimaryKeyBinding,
    /// 0x1F: direct key signature
    DirectKey,
    /// 0x20: key revocation
    KeyRevocation,
    /// 0x28: subkey revocation
    SubkeyRevocation,
    /// 0x30: certification revocation
    CertificationRevocation,
    /// 0x40: timestamp
    Timestamp,
    /// 0x50: third-party confirmation
    ThirdPartyConfirmation,
    /// Unassigned value
    Unknown(u8),
}

impl SignatureType {
    /// Wire value.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Binary => 0x00,
            Self::Text => 0x01,
            Self::Standalone => 0x02,
            Self::GenericCertification => 0x10,
            Self::PersonaCertification => 0x11,
            Self::CasualCertification => 0x12,
            Self::PositiveCertification => 0x13,
            Self::SubkeyBinding => 0x18,
            Self::PrimaryKeyBinding => 0x19,
            Self::DirectKey => 0x1F,
            Self::KeyRevocation => 0x20,
            Self::SubkeyRevocation => 0x28,
            Self::CertificationRevocation => 0x30,
            Self::Timestamp => 0x40,
            Self::ThirdPartyConfirmation => 0x50,
            Self::Unknown(v) => v,
        }
    }

    /// One of the four user id certification types.
    #[must_use]
    pub fn is_certification(self) -> bool {
        matches!(
            self,
            Self::GenericCertification
                | Self::PersonaCertification
                | Self::CasualCertification
                | Self::PositiveCertification
        )
    }
}

impl From<u8> for SignatureType {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::Binary,
            0x01 => Self::Text,
            0x02 => Self::Standalone,
            0x10 => Self::GenericCertification,
            0x11 => Self::PersonaCertification,
            0x12 => Self::CasualCertification,
            0x13 => Self::PositiveCertification,
            0x18 => Self::SubkeyBinding,
            0x19 => Self::PrimaryKeyBinding,
            0x1F => Self::DirectKey,
            0x20 => Self::KeyRevocation,
            0x28 => Self::SubkeyRevocation,
            0x30 => Self::CertificationRevocation,
            0x40 => Self::Timestamp,
            0x50 => Self::ThirdPartyConfirmation,
            other => Self::Unknown(other),
        }
    }
}

/// Version-specific signature fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureVersion {
    /// Version 2 or 3: fixed creation time and issuer
    V3 {
        /// Version octet (2 or 3)
        version: u8,
        /// Creation time
        created: u32,
        /// Issuer key id
        issuer: KeyId,
    },
    /// Version 4: subpacket areas
    V4 {
        /// Subpackets covered by the signature
        hashed: Vec<Subpacket>,
        /// Advisory subpackets not covered by the signature
        unhashed: Vec<Subpacket>,
    },
}

/// A signature over data, a key binding, or a certification.
///
/// # Invariants
///
/// - Version 4 signatures always carry a creation time in the hashed area;
///   decoding rejects those that do not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// What is being signed
    pub sig_type: SignatureType,
    /// Signing algorithm
    pub pk_algorithm: PublicKeyAlgorithm,
    /// Digest algorithm
    pub hash_algorithm: HashAlgorithm,
    /// Version-specific fields
    pub version: SignatureVersion,
    /// First two octets of the digest, a quick check
    pub left16: [u8; 2],
    /// Algorithm-specific signature values
    pub mpis: Vec<Mpi>,
}

impl Signature {
    /// Version octet.
    #[must_use]
    pub fn version_octet(&self) -> u8 {
        match self.version {
            SignatureVersion::V3 { version, .. } => version,
            SignatureVersion::V4 { .. } => 4,
        }
    }

    /// Creation time in seconds since the epoch.
    #[must_use]
    pub fn creation_time(&self) -> u32 {
        match &self.version {
            SignatureVersion::V3 { created, .. } => *created,
            SignatureVersion::V4 { hashed, .. } => hashed
                .iter()
                .find_map(|s| match s.value {
                    SubpacketValue::SignatureCreationTime(t) => Some(t),
                    _ => None,
                })
                .unwrap_or_default(),
        }
    }

    /// Issuer key id: hashed area first, then unhashed, else
    /// [`KeyId::WILDCARD`].
    #[must_use]
    pub fn issuer(&self) -> KeyId {
        match &self.version {
            SignatureVersion::V3 { issuer, .. } => *issuer,
            SignatureVersion::V4 { hashed, unhashed } => hashed
                .iter()
                .chain(unhashed)
                .find_map(|s| match s.value {
                    SubpacketValue::Issuer(id) => Some(id),
                    _ => None,
                })
                .unwrap_or(KeyId::WILDCARD),
        }
    }

    /// Signature lifetime in seconds after creation, if limited.
    #[must_use]
    pub fn expiration_time(&self) -> Option<u32> {
        self.find_hashed(|v| match v {
            SubpacketValue::SignatureExpirationTime(t) if *t != 0 => Some(*t),
            _ => None,
        })
    }

    /// Key lifetime in seconds after key creation, if limited.
    #[must_use]
    pub fn key_expiration_time(&self) -> Option<u32> {
        self.find_hashed(|v| match v {
            SubpacketValue::KeyExpirationTime(t) if *t != 0 => Some(*t),
            _ => None,
        })
    }

    /// First octet of the key flags subpacket, if present.
    #[must_use]
    pub fn key_flags(&self) -> Option<u8> {
        self.find_hashed(|v| match v {
            SubpacketValue::KeyFlags(flags) => flags.first().copied(),
            _ => None,
        })
    }

    /// True once `now` is past creation plus the expiration time.
    #[must_use]
    pub fn is_expired(&self, now: u64) -> bool {
        self.expiration_time()
            .is_some_and(|exp| u64::from(self.creation_time()) + u64::from(exp) <= now)
    }

    /// Bytes appended to the signed data before hashing.
    ///
    /// - v3: `type ‖ created[4]`
    /// - v4: `04 type pk hash u16(len) hashed-area ‖ 04 FF u32(6 + len)`
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Serialization` if the hashed area exceeds 65535
    ///   bytes
    pub fn hash_trailer(&self) -> Result<Vec<u8>> {
        match &self.version {
            SignatureVersion::V3 { created, .. } => {
                let mut out = vec![self.sig_type.to_u8()];
                out.extend_from_slice(&created.to_be_bytes());
                Ok(out)
            },
            SignatureVersion::V4 { hashed, .. } => {
                let area = encode_area(hashed)?;
                let area_len = area_len(&area)?;
                let mut out = Vec::with_capacity(area.len() + 12);
                out.extend_from_slice(&[
                    4,
                    self.sig_type.to_u8(),
                    self.pk_algorithm.id(),
                    self.hash_algorithm.id(),
                ]);
                out.extend_from_slice(&area_len.to_be_bytes());
                out.extend_from_slice(&area);
                out.extend_from_slice(&[4, 0xFF]);
                out.extend_from_slice(&(6 + u32::from(area_len)).to_be_bytes());
                Ok(out)
            },
        }
    }

    /// Digest of `data` with this signature's trailer.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Unsupported` if the hash algorithm is unavailable
    pub fn digest(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut hasher = Hasher::new(self.hash_algorithm)?;
        hasher.update(data);
        hasher.update(&self.hash_trailer()?);
        Ok(hasher.finalize())
    }

    fn find_hashed<T>(&self, f: impl Fn(&SubpacketValue) -> Option<T>) -> Option<T> {
        match &self.version {
            SignatureVersion::V3 { .. } => None,
            SignatureVersion::V4 { hashed, .. } => hashed.iter().find_map(|s| f(&s.value)),
        }
    }
}

impl PacketBody for Signature {
    const TAG: Tag = Tag::Signature;

    fn decode_body(body: Bytes) -> Result<Self> {
        let mut r = BodyReader::new(body);
        let version_octet = r.read_u8()?;

        let (sig_type, pk_algorithm, hash_algorithm, version) = match version_octet {
            2 | 3 => {
                let hashed_len = r.read_u8()?;
                if hashed_len != 5 {
                    return Err(ProtocolError::malformed(
                        "signature",
                        format!("v3 hashed length must be 5, got {hashed_len}"),
                    ));
                }
                let sig_type = SignatureType::from(r.read_u8()?);
                let created = r.read_u32()?;
                let issuer = KeyId::new(r.read_array()?);
                let pk = PublicKeyAlgorithm::from(r.read_u8()?);
                let hash = HashAlgorithm::from(r.read_u8()?);
                (sig_type, pk, hash, SignatureVersion::V3 { version: version_octet, created, issuer })
            },
            4 => {
                let sig_type = SignatureType::from(r.read_u8()?);
                let pk = PublicKeyAlgorithm::from(r.read_u8()?);
                let hash = HashAlgorithm::from(r.read_u8()?);
                let hashed_len = usize::from(r.read_u16()?);
                let hashed = decode_area(&r.read_bytes(hashed_len)?)?;
                let unhashed_len = usize::from(r.read_u16()?);
                let unhashed = decode_area(&r.read_bytes(unhashed_len)?)?;

                if !hashed.iter().any(|s| matches!(s.value, SubpacketValue::SignatureCreationTime(_))) {
                    return Err(ProtocolError::malformed("signature", "missing creation time"));
                }
                (sig_type, pk, hash, SignatureVersion::V4 { hashed, unhashed })
            },
            other => {
                return Err(ProtocolError::Unsupported(format!("signature version {other}")));
            },
        };

        let left16 = r.read_array()?;
        let mut mpis = Vec::new();
        while !r.is_empty() {
            mpis.push(r.read_mpi()?);
        }

        Ok(Self { sig_type, pk_algorithm, hash_algorithm, version, left16, mpis })
    }

    fn encode_body(&self, dst: &mut BytesMut) -> Result<()> {
        match &self.version {
            SignatureVersion::V3 { version, created, issuer } => {
                dst.put_slice(&[*version, 5, self.sig_type.to_u8()]);
                dst.put_u32(*created);
                dst.put_slice(issuer.as_bytes());
                dst.put_u8(self.pk_algorithm.id());
                dst.put_u8(self.hash_algorithm.id());
            },
            SignatureVersion::V4 { hashed, unhashed } => {
                dst.put_slice(&[
                    4,
                    self.sig_type.to_u8(),
                    self.pk_algorithm.id(),
                    self.hash_algorithm.id(),
                ]);
                for area in [encode_area(hashed)?, encode_area(unhashed)?] {
                    dst.put_u16(area_len(&area)?);
                    dst.put_slice(&area);
                }
            },
        }
        dst.put_slice(&self.left16);
        for mpi in &self.mpis {
            mpi.encode(dst);
        }
        Ok(())
    }
}

fn area_len(area: &[u8]) -> Result<u16> {
    u16::try_from(area.len())
        .map_err(|_| ProtocolError::Serialization("subpacket area exceeds 65535 bytes".into()))
}
