//! Key generation: an Ed25519 signing primary with an X25519 encryption
//! subkey, self-certified and bound.

use std::sync::Arc;

use bytes::Bytes;
use sigil_crypto::{
    CompressionAlgorithm, HashAlgorithm, PublicKeyAlgorithm, SymmetricAlgorithm,
    ecdh::{self, CURVE25519_OID, KdfParams},
    eddsa::{self, ED25519_OID},
};
use sigil_proto::{
    Mpi, PublicKey, PublicKeyMaterial, SecretKey, SignatureType, UserId,
    packets::subpacket::{
        FLAG_CERTIFY, FLAG_ENCRYPT_COMMUNICATIONS, FLAG_ENCRYPT_STORAGE, FLAG_SIGN, Subpacket,
        SubpacketValue,
    },
};
use tracing::info;
use zeroize::Zeroizing;

use crate::{
    block::{CertifiedIdentity, Identity, KeyPacket, Subkey, TransferableKey},
    env::Environment,
    error::Result,
    registry::AlgorithmRegistry,
    signing::SigningKey,
};

const SELF_SIGNATURE_HASH: HashAlgorithm = HashAlgorithm::Sha256;

fn preferences() -> Vec<Subpacket> {
    let symmetric = [SymmetricAlgorithm::Aes256, SymmetricAlgorithm::Aes192, SymmetricAlgorithm::Aes128];
    let hash = [HashAlgorithm::Sha256, HashAlgorithm::Sha512, HashAlgorithm::Sha1];
    let compression = [CompressionAlgorithm::Zlib, CompressionAlgorithm::Zip];
    vec![
        Subpacket::new(SubpacketValue::PreferredSymmetric(symmetric.iter().map(|a| a.id()).collect())),
        Subpacket::new(SubpacketValue::PreferredHash(hash.iter().map(|a| a.id()).collect())),
        Subpacket::new(SubpacketValue::PreferredCompression(
            compression.iter().map(|a| a.id()).collect(),
        )),
        Subpacket::new(SubpacketValue::PrimaryUserId(true)),
    ]
}

fn key_flags(flags: u8) -> Subpacket {
    Subpacket::new(SubpacketValue::KeyFlags(Bytes::copy_from_slice(&[flags])))
}

/// Generates transferable secret keys.
#[derive(Debug, Clone)]
pub struct KeyGenerator<E: Environment> {
    env: E,
    registry: Arc<AlgorithmRegistry>,
}

impl<E: Environment> KeyGenerator<E> {
    /// Generator drawing randomness and time from `env`.
    pub fn new(env: E, registry: Arc<AlgorithmRegistry>) -> Self {
        Self { env, registry }
    }

    fn store(&self, public: PublicKey, secret: &[u8], passphrase: Option<&[u8]>) -> Result<SecretKey> {
        let mpis = [Mpi::new(secret.to_vec())];
        match passphrase {
            None => Ok(SecretKey::plain(public, &mpis)),
            Some(passphrase) => {
                let salt = self.env.random_array::<8>();
                let iv = self.env.random_array::<16>();
                Ok(SecretKey::protect(public, &mpis, passphrase, salt, &iv)?)
            },
        }
    }

    /// Generate a key for `user_id`, optionally protected by `passphrase`.
    ///
    /// # Errors
    ///
    /// - `Error::Unsupported` if the registry has no Ed25519 signer
    pub async fn generate(&self, user_id: &str, passphrase: Option<&[u8]>) -> Result<TransferableKey> {
        let created = self.env.timestamp();

        let seed = Zeroizing::new(self.env.random_array::<{ eddsa::SEED_SIZE }>());
        let primary = PublicKey::new_v4(
            created,
            PublicKeyAlgorithm::EdDsa,
            PublicKeyMaterial::EdDsa {
                oid: Bytes::from_static(&ED25519_OID),
                point: Mpi::new(eddsa::public_point(seed.as_slice())?),
            },
        )?;

        let scalar = Zeroizing::new(self.env.random_array::<{ ecdh::X25519_SIZE }>());
        let subkey = PublicKey::new_v4(
            created,
            PublicKeyAlgorithm::Ecdh,
            PublicKeyMaterial::Ecdh {
                oid: Bytes::from_static(&CURVE25519_OID),
                point: Mpi::new(ecdh::public_point(&scalar)),
                kdf: KdfParams { hash: HashAlgorithm::Sha256, cipher: SymmetricAlgorithm::Aes128 },
            },
        )?;

        let signer = SigningKey::unlock(&SecretKey::plain(primary.clone(), &[Mpi::new(seed.to_vec())]), None)?;
        let uid = UserId::new(user_id);
        let primary_prefix = primary.certification_prefix()?;

        let mut hashed = vec![key_flags(FLAG_CERTIFY | FLAG_SIGN)];
        hashed.extend(preferences());
        let certification = signer
            .sign(
                &self.registry,
                SignatureType::PositiveCertification,
                SELF_SIGNATURE_HASH,
                &[primary_prefix.as_slice(), &uid.certification_prefix()[..]].concat(),
                created,
                hashed,
            )
            .await?;

        let binding = signer
            .sign(
                &self.registry,
                SignatureType::SubkeyBinding,
                SELF_SIGNATURE_HASH,
                &[primary_prefix, subkey.certification_prefix()?].concat(),
                created,
                vec![key_flags(FLAG_ENCRYPT_COMMUNICATIONS | FLAG_ENCRYPT_STORAGE)],
            )
            .await?;

        let key = TransferableKey::new(
            KeyPacket::Secret(self.store(primary, seed.as_slice(), passphrase)?),
            Vec::new(),
            vec![CertifiedIdentity {
                identity: Identity::UserId(uid),
                certifications: vec![certification],
                revocations: Vec::new(),
            }],
            vec![Subkey {
                key: KeyPacket::Secret(self.store(subkey, &ecdh::secret_to_mpi(&scalar), passphrase)?),
                bindings: vec![binding],
                revocations: Vec::new(),
            }],
        )?;
        info!(key_id = %key.key_id(), protected = passphrase.is_some(), "key generated");
        Ok(key)
    }
}
