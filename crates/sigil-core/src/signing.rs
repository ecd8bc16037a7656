//! Creating and checking v4 signatures.
//!
//! The hash input is `data ‖ trailer` where the trailer covers the hashed
//! subpacket area (see [`Signature::hash_trailer`]). Creation time always goes
//! into the hashed area; the issuer goes into the unhashed area.

use sigil_crypto::HashAlgorithm;
use sigil_proto::{
    KeyId, PublicKey, SecretKey, Signature, SignatureType,
    packets::{
        SignatureVersion, UnlockedSecret,
        subpacket::{Subpacket, SubpacketValue},
    },
};
use tracing::debug;

use crate::{
    error::{Error, Result},
    registry::AlgorithmRegistry,
};

/// A key whose secret half has been unlocked for signing.
pub struct SigningKey {
    public: PublicKey,
    secret: UnlockedSecret,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey").field("key_id", &self.public.key_id()).finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Unlock `key` for signing.
    ///
    /// # Errors
    ///
    /// - `Error::MissingPassphrase` / `Error::WrongPassphrase` for protected
    ///   keys
    /// - `Error::Unsupported` for dummy or legacy protected keys
    pub fn unlock(key: &SecretKey, passphrase: Option<&[u8]>) -> Result<Self> {
        let secret = key.unlock(passphrase)?;
        Ok(Self { public: key.public.clone(), secret })
    }

    /// Public half.
    #[must_use]
    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    /// Key id of the public half.
    #[must_use]
    pub fn key_id(&self) -> KeyId {
        self.public.key_id()
    }

    /// Sign `data` as `sig_type`.
    ///
    /// `hashed` subpackets are added after the creation time.
    ///
    /// # Errors
    ///
    /// - `Error::Unsupported` if no signer is registered for the key's
    ///   algorithm or the hash is unavailable
    pub async fn sign(
        &self,
        registry: &AlgorithmRegistry,
        sig_type: SignatureType,
        hash_algorithm: HashAlgorithm,
        data: &[u8],
        created: u32,
        hashed: Vec<Subpacket>,
    ) -> Result<Signature> {
        let signer = registry.signer(self.public.algorithm())?;

        let mut area = Vec::with_capacity(hashed.len() + 1);
        area.push(Subpacket::new(SubpacketValue::SignatureCreationTime(created)));
        area.extend(hashed);

        let mut signature = Signature {
            sig_type,
            pk_algorithm: self.public.algorithm(),
            hash_algorithm,
            version: SignatureVersion::V4 {
                hashed: area,
                unhashed: vec![Subpacket::new(SubpacketValue::Issuer(self.key_id()))],
            },
            left16: [0; 2],
            mpis: Vec::new(),
        };

        let digest = signature.digest(data)?;
        signature.left16 = left16(&digest)?;
        signature.mpis = signer.sign(&self.public, &self.secret, &digest).await?;
        debug!(issuer = %self.key_id(), ?sig_type, "signature created");
        Ok(signature)
    }
}

/// Check `signature` over `data` with `key`.
///
/// Returns `Ok(false)` when the quick check or the signature value does not
/// match.
///
/// # Errors
///
/// - `Error::SignatureExpired` if the signature verifies but expired at or
///   before `now`
/// - `Error::Unsupported` if no signer is registered for the algorithm
/// - `Error::Signature` if the signature names a different algorithm than the
///   key
pub async fn verify_signature(
    registry: &AlgorithmRegistry,
    key: &PublicKey,
    signature: &Signature,
    data: &[u8],
    now: u64,
) -> Result<bool> {
    if signature.pk_algorithm != key.algorithm() {
        return Err(Error::Signature(format!(
            "signature algorithm {:?} does not match key {}",
            signature.pk_algorithm,
            key.key_id()
        )));
    }
    let signer = registry.signer(key.algorithm())?;

    let digest = signature.digest(data)?;
    if left16(&digest)? != signature.left16 {
        debug!(issuer = %signature.issuer(), "signature quick check mismatch");
        return Ok(false);
    }
    if !signer.verify(key, &digest, &signature.mpis).await? {
        return Ok(false);
    }

    if signature.is_expired(now) {
        let expired_at = u64::from(signature.creation_time())
            + u64::from(signature.expiration_time().unwrap_or_default());
        return Err(Error::SignatureExpired { issuer: signature.issuer(), expired_at });
    }
    Ok(true)
}

fn left16(digest: &[u8]) -> Result<[u8; 2]> {
    match digest {
        [a, b, ..] => Ok([*a, *b]),
        _ => Err(Error::Serialization("digest shorter than two bytes".into())),
    }
}
