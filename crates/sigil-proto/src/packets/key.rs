//! Key packets: public key and subkey (tags 6, 14), secret key and subkey
//! (tags 5, 7).
//!
//! ```text
//! public v4 : 04 created[4] algo material
//! public v3 : 03 created[4] days[2] algo material
//! secret    : public-body usage [algo s2k] [iv] secret-data
//! ```
//!
//! Fingerprints and key ids are derived once on construction.

use bytes::{BufMut, Bytes, BytesMut};
use sigil_crypto::{
    BlockCipher, PublicKeyAlgorithm, S2k, SymmetricAlgorithm, cfb, checksum16,
    ecdh::KdfParams,
    hash::sha1,
    s2k::SALT_SIZE,
};
use zeroize::Zeroizing;

use super::PacketBody;
use crate::{
    errors::{ProtocolError, Result},
    key_id::KeyId,
    mpi::Mpi,
    reader::BodyReader,
    tag::Tag,
};

const USAGE_PLAIN: u8 = 0;
const USAGE_SHA1: u8 = 254;
const USAGE_CHECKSUM: u8 = 255;

/// Algorithm-specific public key values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKeyMaterial {
    /// RSA modulus and exponent
    Rsa {
        /// Modulus
        n: Mpi,
        /// Public exponent
        e: Mpi,
    },
    /// DSA group and public value
    Dsa {
        /// Prime
        p: Mpi,
        /// Group order
        q: Mpi,
        /// Generator
        g: Mpi,
        /// Public value
        y: Mpi,
    },
    /// Elgamal group and public value
    Elgamal {
        /// Prime
        p: Mpi,
        /// Generator
        g: Mpi,
        /// Public value
        y: Mpi,
    },
    /// ECDSA curve and point
    Ecdsa {
        /// Curve OID
        oid: Bytes,
        /// Public point
        point: Mpi,
    },
    /// `EdDSA` curve and point
    EdDsa {
        /// Curve OID
        oid: Bytes,
        /// Public point (`0x40 ‖ A`)
        point: Mpi,
    },
    /// ECDH curve, point and KDF parameters
    Ecdh {
        /// Curve OID
        oid: Bytes,
        /// Public point (`0x40 ‖ u` for Curve25519)
        point: Mpi,
        /// Key derivation parameters
        kdf: KdfParams,
    },
}

impl PublicKeyMaterial {
    fn decode(algorithm: PublicKeyAlgorithm, r: &mut BodyReader) -> Result<Self> {
        match algorithm {
            PublicKeyAlgorithm::Rsa | PublicKeyAlgorithm::RsaEncrypt | PublicKeyAlgorithm::RsaSign => {
                Ok(Self::Rsa { n: r.read_mpi()?, e: r.read_mpi()? })
            },
            PublicKeyAlgorithm::Dsa => Ok(Self::Dsa {
                p: r.read_mpi()?,
                q: r.read_mpi()?,
                g: r.read_mpi()?,
                y: r.read_mpi()?,
            }),
            PublicKeyAlgorithm::Elgamal => {
                Ok(Self::Elgamal { p: r.read_mpi()?, g: r.read_mpi()?, y: r.read_mpi()? })
            },
            PublicKeyAlgorithm::Ecdsa => Ok(Self::Ecdsa { oid: r.read_prefixed()?, point: r.read_mpi()? }),
            PublicKeyAlgorithm::EdDsa => Ok(Self::EdDsa { oid: r.read_prefixed()?, point: r.read_mpi()? }),
            PublicKeyAlgorithm::Ecdh => {
                let oid = r.read_prefixed()?;
                let point = r.read_mpi()?;
                let kdf = KdfParams::from_bytes(&r.read_array::<4>()?)?;
                Ok(Self::Ecdh { oid, point, kdf })
            },
            PublicKeyAlgorithm::Unknown(id) => {
                Err(ProtocolError::Unsupported(format!("public key algorithm {id}")))
            },
        }
    }

    fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        match self {
            Self::Rsa { n, e } => {
                n.encode(dst);
                e.encode(dst);
            },
            Self::Dsa { p, q, g, y } => {
                for mpi in [p, q, g, y] {
                    mpi.encode(dst);
                }
            },
            Self::Elgamal { p, g, y } => {
                for mpi in [p, g, y] {
                    mpi.encode(dst);
                }
            },
            Self::Ecdsa { oid, point } | Self::EdDsa { oid, point } => {
                put_prefixed(dst, oid)?;
                point.encode(dst);
            },
            Self::Ecdh { oid, point, kdf } => {
                put_prefixed(dst, oid)?;
                point.encode(dst);
                dst.put_slice(&kdf.to_bytes());
            },
        }
        Ok(())
    }

    /// Number of secret MPIs that accompany this material.
    fn secret_mpi_count(&self) -> usize {
        match self {
            Self::Rsa { .. } => 4,
            Self::Dsa { .. }
            | Self::Elgamal { .. }
            | Self::Ecdsa { .. }
            | Self::EdDsa { .. }
            | Self::Ecdh { .. } => 1,
        }
    }
}

/// A public key or subkey.
///
/// # Invariants
///
/// - `fingerprint` and `key_id` always match the encoded body: they are
///   computed in [`PublicKey::new`] and the fields are not mutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    version: u8,
    created: u32,
    expiration_days: Option<u16>,
    algorithm: PublicKeyAlgorithm,
    material: PublicKeyMaterial,
    fingerprint: Vec<u8>,
    key_id: KeyId,
}

impl PublicKey {
    /// Build a version 4 key.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Serialization` if the material cannot be encoded
    pub fn new_v4(created: u32, algorithm: PublicKeyAlgorithm, material: PublicKeyMaterial) -> Result<Self> {
        Self::new(4, created, None, algorithm, material)
    }

    /// Build a key of any supported version.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Unsupported` for versions other than 2, 3, 4
    /// - `ProtocolError::Malformed` for v2/v3 keys that are not RSA
    pub fn new(
        version: u8,
        created: u32,
        expiration_days: Option<u16>,
        algorithm: PublicKeyAlgorithm,
        material: PublicKeyMaterial,
    ) -> Result<Self> {
        let mut key = Self {
            version,
            created,
            expiration_days,
            algorithm,
            material,
            fingerprint: Vec::new(),
            key_id: KeyId::WILDCARD,
        };

        match version {
            4 => {
                let prefix = key.certification_prefix()?;
                let digest = sha1(&prefix);
                key.key_id = KeyId::from_tail(&digest);
                key.fingerprint = digest.to_vec();
            },
            2 | 3 => {
                let PublicKeyMaterial::Rsa { n, .. } = &key.material else {
                    return Err(ProtocolError::malformed("public key", "v3 keys must be RSA"));
                };
                key.key_id = KeyId::from_tail(n.as_bytes());
            },
            other => return Err(ProtocolError::Unsupported(format!("key version {other}"))),
        }
        Ok(key)
    }

    /// Packet version.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Creation time in seconds since the epoch.
    #[must_use]
    pub fn created(&self) -> u32 {
        self.created
    }

    /// Public-key algorithm.
    #[must_use]
    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.algorithm
    }

    /// Key values.
    #[must_use]
    pub fn material(&self) -> &PublicKeyMaterial {
        &self.material
    }

    /// SHA-1 fingerprint for v4 keys; empty for v3 keys.
    #[must_use]
    pub fn fingerprint(&self) -> &[u8] {
        &self.fingerprint
    }

    /// Key id.
    #[must_use]
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    /// Octets hashed into certifications and bindings:
    /// `99 ‖ u16(len) ‖ body`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Serialization` if the body exceeds 65535 bytes
    pub fn certification_prefix(&self) -> Result<Vec<u8>> {
        let body = self.to_body()?;
        let len = u16::try_from(body.len())
            .map_err(|_| ProtocolError::Serialization("key body exceeds 65535 bytes".into()))?;
        let mut out = Vec::with_capacity(body.len() + 3);
        out.push(0x99);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn decode_from(r: &mut BodyReader) -> Result<Self> {
        let version = r.read_u8()?;
        let created = r.read_u32()?;
        let expiration_days = match version {
            2 | 3 => Some(r.read_u16()?),
            4 => None,
            other => return Err(ProtocolError::Unsupported(format!("key version {other}"))),
        };
        let algorithm = PublicKeyAlgorithm::from(r.read_u8()?);
        let material = PublicKeyMaterial::decode(algorithm, r)?;
        Self::new(version, created, expiration_days, algorithm, material)
    }
}

impl PacketBody for PublicKey {
    const TAG: Tag = Tag::PublicKey;

    fn decode_body(body: Bytes) -> Result<Self> {
        let mut r = BodyReader::new(body);
        let key = Self::decode_from(&mut r)?;
        if !r.is_empty() {
            return Err(ProtocolError::malformed("public key", "trailing bytes after key material"));
        }
        Ok(key)
    }

    fn encode_body(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_u8(self.version);
        dst.put_u32(self.created);
        if let Some(days) = self.expiration_days {
            dst.put_u16(days);
        }
        dst.put_u8(self.algorithm.id());
        self.material.encode(dst)
    }
}

/// Storage of the secret half of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretMaterial {
    /// Unencrypted secret MPIs with their two-octet checksum
    Plain {
        /// Serialized secret MPIs
        data: Bytes,
        /// Additive checksum of `data`
        checksum: u16,
    },
    /// Passphrase-protected secret MPIs
    Protected {
        /// 254 (SHA-1 check), 255 (checksum) or a legacy cipher id
        usage: u8,
        /// Cipher protecting the data
        algorithm: SymmetricAlgorithm,
        /// Passphrase derivation (implied simple MD5 for legacy usage)
        s2k: Option<S2k>,
        /// CFB initial vector
        iv: Bytes,
        /// Encrypted MPIs and check value
        data: Bytes,
    },
}

/// Decrypted secret MPIs, wiped on drop.
pub struct UnlockedSecret {
    values: Vec<Zeroizing<Vec<u8>>>,
}

impl UnlockedSecret {
    /// Secret MPI magnitudes in wire order.
    #[must_use]
    pub fn values(&self) -> &[Zeroizing<Vec<u8>>] {
        &self.values
    }
}

impl std::fmt::Debug for UnlockedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UnlockedSecret({} values)", self.values.len())
    }
}

/// A secret key or subkey: public part plus secret material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKey {
    /// Public half
    pub public: PublicKey,
    /// Secret half
    pub secret: SecretMaterial,
}

impl SecretKey {
    /// Store `secret` MPIs unencrypted.
    #[must_use]
    pub fn plain(public: PublicKey, secret: &[Mpi]) -> Self {
        let mut data = BytesMut::new();
        for mpi in secret {
            mpi.encode(&mut data);
        }
        let checksum = checksum16(&data);
        Self { public, secret: SecretMaterial::Plain { data: data.freeze(), checksum } }
    }

    /// Protect `secret` MPIs under `passphrase` (AES-256, iterated SHA-1
    /// S2K, SHA-1 check).
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidArguments` if `iv` is not 16 bytes
    pub fn protect(
        public: PublicKey,
        secret: &[Mpi],
        passphrase: &[u8],
        salt: [u8; SALT_SIZE],
        iv: &[u8],
    ) -> Result<Self> {
        let algorithm = SymmetricAlgorithm::Aes256;
        let s2k = S2k::iterated_default(salt);
        let key = s2k.derive_key(passphrase, algorithm.key_size()?)?;
        let cipher = BlockCipher::new(algorithm, &key)?;

        let mut plaintext = Zeroizing::new(Vec::new());
        for mpi in secret {
            mpi.encode(&mut *plaintext);
        }
        let check = sha1(&plaintext);
        plaintext.extend_from_slice(&check);
        let data = cfb::encrypt(&cipher, iv, &plaintext)?;

        Ok(Self {
            public,
            secret: SecretMaterial::Protected {
                usage: USAGE_SHA1,
                algorithm,
                s2k: Some(s2k),
                iv: Bytes::copy_from_slice(iv),
                data: data.into(),
            },
        })
    }

    /// True if a passphrase is needed to unlock the key.
    #[must_use]
    pub fn is_protected(&self) -> bool {
        matches!(self.secret, SecretMaterial::Protected { .. })
    }

    /// Decrypt the secret MPIs.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MissingPassphrase` if the key is protected and no
    ///   passphrase was given
    /// - `ProtocolError::WrongPassphrase` if the check value does not match
    ///   after decryption
    /// - `ProtocolError::Malformed` if an unprotected key fails its checksum
    /// - `ProtocolError::Unsupported` for dummy S2Ks, legacy usage or
    ///   unimplemented ciphers
    pub fn unlock(&self, passphrase: Option<&[u8]>) -> Result<UnlockedSecret> {
        let count = self.public.material().secret_mpi_count();
        match &self.secret {
            SecretMaterial::Plain { data, checksum } => {
                if checksum16(data) != *checksum {
                    return Err(ProtocolError::malformed("secret key", "checksum mismatch"));
                }
                parse_secret_mpis(data, count)
            },
            SecretMaterial::Protected { usage, algorithm, s2k, iv, data } => {
                let Some(s2k) = s2k else {
                    return Err(ProtocolError::Unsupported("legacy secret key protection".into()));
                };
                let passphrase = passphrase.ok_or(ProtocolError::MissingPassphrase)?;
                let key = s2k.derive_key(passphrase, algorithm.key_size()?)?;
                let cipher = BlockCipher::new(*algorithm, &key)?;
                let plaintext = Zeroizing::new(cfb::decrypt(&cipher, iv, data)?);

                let check_len = if *usage == USAGE_SHA1 { 20 } else { 2 };
                if plaintext.len() < check_len {
                    return Err(ProtocolError::WrongPassphrase);
                }
                let (body, check) = plaintext.split_at(plaintext.len() - check_len);
                let valid = if *usage == USAGE_SHA1 {
                    sha1(body) == check
                } else {
                    checksum16(body).to_be_bytes() == check
                };
                if !valid {
                    return Err(ProtocolError::WrongPassphrase);
                }
                parse_secret_mpis(body, count).map_err(|_| ProtocolError::WrongPassphrase)
            },
        }
    }

    fn decode_secret(r: &mut BodyReader) -> Result<SecretMaterial> {
        let usage = r.read_u8()?;
        if usage == USAGE_PLAIN {
            let rest = r.rest();
            if rest.len() < 2 {
                return Err(ProtocolError::Truncated { expected: 2, actual: rest.len() });
            }
            let split = rest.len() - 2;
            let checksum = u16::from_be_bytes([rest[split], rest[split + 1]]);
            return Ok(SecretMaterial::Plain { data: rest.slice(..split), checksum });
        }

        let (algorithm, s2k) = if usage == USAGE_SHA1 || usage == USAGE_CHECKSUM {
            let algorithm = SymmetricAlgorithm::from(r.read_u8()?);
            let (s2k, used) = S2k::parse(r.peek_rest())?;
            r.advance(used)?;
            (algorithm, Some(s2k))
        } else {
            (SymmetricAlgorithm::from(usage), None)
        };

        // Dummy S2Ks carry no IV or data worth decoding.
        if matches!(s2k, Some(S2k::Dummy { .. })) {
            return Ok(SecretMaterial::Protected { usage, algorithm, s2k, iv: Bytes::new(), data: r.rest() });
        }

        let iv = r.read_bytes(algorithm.block_size()?)?;
        Ok(SecretMaterial::Protected { usage, algorithm, s2k, iv, data: r.rest() })
    }
}

impl PacketBody for SecretKey {
    const TAG: Tag = Tag::SecretKey;

    fn decode_body(body: Bytes) -> Result<Self> {
        let mut r = BodyReader::new(body);
        let public = PublicKey::decode_from(&mut r)?;
        let secret = Self::decode_secret(&mut r)?;
        Ok(Self { public, secret })
    }

    fn encode_body(&self, dst: &mut BytesMut) -> Result<()> {
        self.public.encode_body(dst)?;
        match &self.secret {
            SecretMaterial::Plain { data, checksum } => {
                dst.put_u8(USAGE_PLAIN);
                dst.put_slice(data);
                dst.put_u16(*checksum);
            },
            SecretMaterial::Protected { usage, algorithm, s2k, iv, data } => {
                dst.put_u8(*usage);
                if let Some(s2k) = s2k {
                    dst.put_u8(algorithm.id());
                    dst.put_slice(&s2k.to_bytes());
                }
                dst.put_slice(iv);
                dst.put_slice(data);
            },
        }
        Ok(())
    }
}

fn parse_secret_mpis(data: &[u8], count: usize) -> Result<UnlockedSecret> {
    let mut r = BodyReader::new(Bytes::copy_from_slice(data));
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(Zeroizing::new(r.read_mpi()?.as_bytes().to_vec()));
    }
    if !r.is_empty() {
        return Err(ProtocolError::malformed("secret key", "trailing bytes after secret MPIs"));
    }
    Ok(UnlockedSecret { values })
}

fn put_prefixed(dst: &mut BytesMut, field: &[u8]) -> Result<()> {
    dst.put_u8(
        u8::try_from(field.len())
            .map_err(|_| ProtocolError::Serialization("curve OID exceeds 255 bytes".into()))?,
    );
    dst.put_slice(field);
    Ok(())
}
