//! Encrypted Session Key packets (tags 1 and 3).

use bytes::{BufMut, Bytes, BytesMut};
use sigil_crypto::{
    BlockCipher, PublicKeyAlgorithm, S2k, SessionKey, SymmetricAlgorithm, cfb, s2k::SALT_SIZE,
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

const PKESK_VERSION: u8 = 3;
const SKESK_VERSION: u8 = 4;

/// Algorithm-specific ciphertext of a PK-ESK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EskMaterial {
    /// RSA: `m^e mod n`
    Rsa {
        /// Encrypted session key
        m: Mpi,
    },
    /// Elgamal: `g^k mod p`, `m * y^k mod p`
    Elgamal {
        /// First component
        u: Mpi,
        /// Second component
        v: Mpi,
    },
    /// ECDH: ephemeral point and RFC3394-wrapped key
    Ecdh {
        /// Ephemeral public point
        point: Mpi,
        /// Wrapped, padded session key
        wrapped: Bytes,
    },
}

/// Public-Key Encrypted Session Key (tag 1, version 3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyEsk {
    /// Recipient key id; [`KeyId::WILDCARD`] means "try every key"
    pub key_id: KeyId,
    /// Recipient public-key algorithm
    pub algorithm: PublicKeyAlgorithm,
    /// Wrapped session key
    pub material: EskMaterial,
}

impl PacketBody for PublicKeyEsk {
    const TAG: Tag = Tag::PublicKeyEsk;

    fn decode_body(body: Bytes) -> Result<Self> {
        let mut r = BodyReader::new(body);
        let version = r.read_u8()?;
        if version != PKESK_VERSION {
            return Err(ProtocolError::malformed("PK-ESK", format!("unknown version {version}")));
        }
        let key_id = KeyId::new(r.read_array()?);
        let algorithm = PublicKeyAlgorithm::from(r.read_u8()?);

        let material = match algorithm {
            PublicKeyAlgorithm::Rsa | PublicKeyAlgorithm::RsaEncrypt | PublicKeyAlgorithm::RsaSign => {
                EskMaterial::Rsa { m: r.read_mpi()? }
            },
            PublicKeyAlgorithm::Elgamal => EskMaterial::Elgamal { u: r.read_mpi()?, v: r.read_mpi()? },
            PublicKeyAlgorithm::Ecdh => {
                EskMaterial::Ecdh { point: r.read_mpi()?, wrapped: r.read_prefixed()? }
            },
            other => {
                return Err(ProtocolError::malformed(
                    "PK-ESK",
                    format!("unknown algorithm {}", other.id()),
                ));
            },
        };

        Ok(Self { key_id, algorithm, material })
    }

    fn encode_body(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_u8(PKESK_VERSION);
        dst.put_slice(self.key_id.as_bytes());
        dst.put_u8(self.algorithm.id());
        match &self.material {
            EskMaterial::Rsa { m } => m.encode(dst),
            EskMaterial::Elgamal { u, v } => {
                u.encode(dst);
                v.encode(dst);
            },
            EskMaterial::Ecdh { point, wrapped } => {
                point.encode(dst);
                dst.put_u8(u8::try_from(wrapped.len()).map_err(|_| {
                    ProtocolError::Serialization("ECDH wrapped key exceeds 255 bytes".into())
                })?);
                dst.put_slice(wrapped);
            },
        }
        Ok(())
    }
}

/// Symmetric-Key Encrypted Session Key (tag 3, version 4).
///
/// With an empty `encrypted_key` the S2K output is itself the session key
/// for `algorithm`. Otherwise `encrypted_key` is `algo ‖ session key`
/// CFB-encrypted under the S2K output with a zero IV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymmetricKeyEsk {
    /// Cipher keyed by the S2K output
    pub algorithm: SymmetricAlgorithm,
    /// Passphrase derivation
    pub s2k: S2k,
    /// Optional wrapped session key
    pub encrypted_key: Bytes,
}

impl SymmetricKeyEsk {
    /// Cipher used to wrap session keys under a passphrase.
    pub const WRAP_ALGORITHM: SymmetricAlgorithm = SymmetricAlgorithm::Aes256;

    /// Wrap `session` under `passphrase` with an iterated SHA-1 S2K.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Unsupported` if the wrap cipher is unavailable
    pub fn construct(passphrase: &[u8], session: &SessionKey, salt: [u8; SALT_SIZE]) -> Result<Self> {
        let s2k = S2k::iterated_default(salt);
        let kek = s2k.derive_key(passphrase, Self::WRAP_ALGORITHM.key_size()?)?;
        let cipher = BlockCipher::new(Self::WRAP_ALGORITHM, &kek)?;

        let mut plaintext = Zeroizing::new(Vec::with_capacity(session.key().len() + 1));
        plaintext.push(session.algorithm().id());
        plaintext.extend_from_slice(session.key());
        let encrypted = cfb::encrypt(&cipher, &vec![0u8; cipher.block_size()], &plaintext)?;

        Ok(Self { algorithm: Self::WRAP_ALGORITHM, s2k, encrypted_key: encrypted.into() })
    }

    /// Recover the session key with `passphrase`.
    ///
    /// Returns `Ok(None)` when the passphrase does not yield a usable key.
    /// A wrong passphrase and a corrupted packet are indistinguishable.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Unsupported` if the S2K, its digest or the wrap
    ///   cipher has no implementation
    pub fn decrypt_session_key(&self, passphrase: &[u8]) -> Result<Option<SessionKey>> {
        let kek = self.s2k.derive_key(passphrase, self.algorithm.key_size()?)?;

        if self.encrypted_key.is_empty() {
            return Ok(SessionKey::new(self.algorithm, &kek).ok());
        }

        let cipher = BlockCipher::new(self.algorithm, &kek)?;
        let plaintext = Zeroizing::new(cfb::decrypt(
            &cipher,
            &vec![0u8; cipher.block_size()],
            &self.encrypted_key,
        )?);

        let Some((&alg, key)) = plaintext.split_first() else {
            return Ok(None);
        };
        let Some(algorithm) = SymmetricAlgorithm::from_known_id(alg) else {
            return Ok(None);
        };
        Ok(SessionKey::new(algorithm, key).ok())
    }
}

impl PacketBody for SymmetricKeyEsk {
    const TAG: Tag = Tag::SymmetricKeyEsk;

    fn decode_body(body: Bytes) -> Result<Self> {
        let mut r = BodyReader::new(body);
        let version = r.read_u8()?;
        if version != SKESK_VERSION {
            return Err(ProtocolError::malformed("SK-ESK", format!("unknown version {version}")));
        }
        let algorithm = SymmetricAlgorithm::from(r.read_u8()?);
        let (s2k, used) = S2k::parse(r.peek_rest())?;
        r.advance(used)?;
        Ok(Self { algorithm, s2k, encrypted_key: r.rest() })
    }

    fn encode_body(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_u8(SKESK_VERSION);
        dst.put_u8(self.algorithm.id());
        dst.put_slice(&self.s2k.to_bytes());
        dst.put_slice(&self.encrypted_key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sigil_crypto::HashAlgorithm;

    use super::*;

    fn session() -> SessionKey {
        SessionKey::new(SymmetricAlgorithm::Aes128, &[0x5A; 16]).unwrap()
    }

    #[test]
    fn passphrase_unwraps_session_key() {
        let esk = SymmetricKeyEsk::construct(b"correct horse", &session(), [1; 8]).unwrap();
        let recovered = esk.decrypt_session_key(b"correct horse").unwrap();
        assert_eq!(recovered, Some(session()));
    }

    #[test]
    fn wrong_passphrase_never_errors_or_recovers_the_key() {
        let esk = SymmetricKeyEsk::construct(b"correct horse", &session(), [1; 8]).unwrap();
        let result = esk.decrypt_session_key(b"battery staple");
        assert!(result.is_ok());
        assert_ne!(result.unwrap(), Some(session()));
    }

    #[test]
    fn empty_encrypted_key_uses_s2k_output() {
        let esk = SymmetricKeyEsk {
            algorithm: SymmetricAlgorithm::Aes128,
            s2k: S2k::Simple { hash: HashAlgorithm::Sha256 },
            encrypted_key: Bytes::new(),
        };
        let key = esk.decrypt_session_key(b"pw").unwrap().unwrap();
        let expected = esk.s2k.derive_key(b"pw", 16).unwrap();
        assert_eq!(key.key(), &expected[..]);
        assert_eq!(key.algorithm(), SymmetricAlgorithm::Aes128);
    }

    #[test]
    fn skesk_body_layout() {
        let esk = SymmetricKeyEsk::construct(b"pw", &session(), [7; 8]).unwrap();
        let body = esk.to_body().unwrap();
        assert_eq!(&body[..4], &[4, 9, 3, 2]);
        assert_eq!(&body[4..12], &[7; 8]);
        assert_eq!(body[12], 96);
        assert_eq!(SymmetricKeyEsk::decode_body(body).unwrap(), esk);
    }

    #[test]
    fn pkesk_unknown_algorithm_is_malformed() {
        let mut body = vec![3];
        body.extend([0; 8]);
        body.push(99);
        assert!(matches!(
            PublicKeyEsk::decode_body(body.into()),
            Err(ProtocolError::Malformed { .. })
        ));
    }

    #[test]
    fn pkesk_ecdh_layout() {
        let esk = PublicKeyEsk {
            key_id: KeyId::new([1, 2, 3, 4, 5, 6, 7, 8]),
            algorithm: PublicKeyAlgorithm::Ecdh,
            material: EskMaterial::Ecdh {
                point: Mpi::new(vec![0x40, 1, 2]),
                wrapped: Bytes::from_static(&[9; 48]),
            },
        };
        let body = esk.to_body().unwrap();
        assert_eq!(body[0], 3);
        assert_eq!(body[9], 18);
        assert_eq!(&body[10..12], &[0, 23]);
        assert_eq!(body[15], 48);
        assert_eq!(PublicKeyEsk::decode_body(body).unwrap(), esk);
    }
}
