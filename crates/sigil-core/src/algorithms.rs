//! Standard algorithm implementations: X25519 ECDH session-key wrapping and
//! Ed25519 signing.

use async_trait::async_trait;
use bytes::Bytes;
use sigil_crypto::{
    PublicKeyAlgorithm,
    ecdh::{self, CURVE25519_OID, X25519_SIZE},
    eddsa::{self, ED25519_OID},
};
use sigil_proto::{
    Mpi, PublicKey, PublicKeyMaterial,
    packets::{EskMaterial, UnlockedSecret},
};
use zeroize::Zeroizing;

use crate::{
    error::{Error, Result},
    registry::{SessionKeyWrapper, Signer},
};

/// RFC6637 ECDH over Curve25519.
#[derive(Debug, Clone, Copy, Default)]
pub struct X25519Wrapper;

impl X25519Wrapper {
    fn recipient_params(recipient: &PublicKey) -> Result<(&Mpi, ecdh::KdfParams)> {
        match recipient.material() {
            PublicKeyMaterial::Ecdh { oid, point, kdf } if oid[..] == CURVE25519_OID => {
                Ok((point, *kdf))
            },
            PublicKeyMaterial::Ecdh { .. } => Err(Error::Unsupported("ECDH curve".into())),
            _ => Err(Error::InvalidArguments(format!(
                "key {} is not an ECDH key",
                recipient.key_id()
            ))),
        }
    }
}

#[async_trait]
impl SessionKeyWrapper for X25519Wrapper {
    fn algorithm(&self) -> PublicKeyAlgorithm {
        PublicKeyAlgorithm::Ecdh
    }

    fn ephemeral_len(&self) -> usize {
        X25519_SIZE
    }

    async fn wrap(
        &self,
        recipient: &PublicKey,
        plaintext: &[u8],
        ephemeral: Zeroizing<Vec<u8>>,
    ) -> Result<EskMaterial> {
        let (point, kdf) = Self::recipient_params(recipient)?;
        let scalar = <[u8; X25519_SIZE]>::try_from(&ephemeral[..]).map_err(|_| {
            Error::InvalidArguments(format!(
                "ephemeral scalar must be {X25519_SIZE} bytes, got {}",
                ephemeral.len()
            ))
        })?;

        let wrapped =
            ecdh::wrap(point.as_bytes(), kdf, recipient.fingerprint(), scalar, plaintext)?;
        Ok(EskMaterial::Ecdh {
            point: Mpi::new(wrapped.ephemeral_point),
            wrapped: Bytes::from(wrapped.wrapped),
        })
    }

    async fn unwrap(
        &self,
        recipient: &PublicKey,
        secret: &UnlockedSecret,
        material: &EskMaterial,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let (_, kdf) = Self::recipient_params(recipient)?;
        let EskMaterial::Ecdh { point, wrapped } = material else {
            return Err(Error::InvalidArguments("PK-ESK does not carry ECDH material".into()));
        };
        let [scalar] = secret.values() else {
            return Err(Error::InvalidArguments("ECDH secret must be one MPI".into()));
        };

        let scalar = ecdh::secret_from_mpi(scalar)?;
        Ok(ecdh::unwrap(&scalar, point.as_bytes(), kdf, recipient.fingerprint(), wrapped)?)
    }
}

/// `EdDSA` over Ed25519.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Signer;

impl Ed25519Signer {
    fn point(public: &PublicKey) -> Result<&Mpi> {
        match public.material() {
            PublicKeyMaterial::EdDsa { oid, point } if oid[..] == ED25519_OID => Ok(point),
            PublicKeyMaterial::EdDsa { .. } => Err(Error::Unsupported("EdDSA curve".into())),
            _ => Err(Error::InvalidArguments(format!(
                "key {} is not an EdDSA key",
                public.key_id()
            ))),
        }
    }
}

#[async_trait]
impl Signer for Ed25519Signer {
    fn algorithm(&self) -> PublicKeyAlgorithm {
        PublicKeyAlgorithm::EdDsa
    }

    async fn sign(
        &self,
        public: &PublicKey,
        secret: &UnlockedSecret,
        digest: &[u8],
    ) -> Result<Vec<Mpi>> {
        Self::point(public)?;
        let [seed] = secret.values() else {
            return Err(Error::InvalidArguments("EdDSA secret must be one MPI".into()));
        };
        let (r, s) = eddsa::sign(seed, digest)?;
        Ok(vec![Mpi::new(r.to_vec()), Mpi::new(s.to_vec())])
    }

    async fn verify(&self, public: &PublicKey, digest: &[u8], mpis: &[Mpi]) -> Result<bool> {
        let point = Self::point(public)?;
        let [r, s] = mpis else {
            return Ok(false);
        };
        Ok(eddsa::verify(point.as_bytes(), digest, r.as_bytes(), s.as_bytes())?)
    }
}

#[cfg(test)]
mod tests {
    use sigil_crypto::{HashAlgorithm, SymmetricAlgorithm, ecdh::KdfParams};
    use sigil_proto::SecretKey;

    use super::*;

    fn x25519_key(scalar: [u8; 32]) -> SecretKey {
        let material = PublicKeyMaterial::Ecdh {
            oid: Bytes::from_static(&CURVE25519_OID),
            point: Mpi::new(ecdh::public_point(&scalar)),
            kdf: KdfParams { hash: HashAlgorithm::Sha256, cipher: SymmetricAlgorithm::Aes128 },
        };
        let public = PublicKey::new_v4(1_600_000_000, PublicKeyAlgorithm::Ecdh, material).unwrap();
        let secret = ecdh::secret_to_mpi(&scalar);
        SecretKey::plain(public, &[Mpi::new(secret.to_vec())])
    }

    fn ed25519_key(seed: [u8; 32]) -> SecretKey {
        let point = eddsa::public_point(&seed).unwrap();
        let material =
            PublicKeyMaterial::EdDsa { oid: Bytes::from_static(&ED25519_OID), point: Mpi::new(point) };
        let public = PublicKey::new_v4(1_600_000_000, PublicKeyAlgorithm::EdDsa, material).unwrap();
        SecretKey::plain(public, &[Mpi::new(seed.to_vec())])
    }

    #[tokio::test]
    async fn x25519_wrap_unwrap() {
        let key = x25519_key([7; 32]);
        let plaintext = [9u8, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 0, 136];

        let material = X25519Wrapper
            .wrap(&key.public, &plaintext, Zeroizing::new(vec![3; 32]))
            .await
            .unwrap();
        let unlocked = key.unlock(None).unwrap();
        let recovered = X25519Wrapper.unwrap(&key.public, &unlocked, &material).await.unwrap();

        assert_eq!(&recovered[..], &plaintext[..]);
    }

    #[tokio::test]
    async fn x25519_rejects_other_keys() {
        let key = ed25519_key([1; 32]);
        let result = X25519Wrapper.wrap(&key.public, &[0; 19], Zeroizing::new(vec![3; 32])).await;
        assert!(matches!(result, Err(Error::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn x25519_wrong_secret_fails_integrity() {
        let key = x25519_key([7; 32]);
        let other = x25519_key([8; 32]);
        let material =
            X25519Wrapper.wrap(&key.public, &[0; 19], Zeroizing::new(vec![3; 32])).await.unwrap();

        let unlocked = other.unlock(None).unwrap();
        let result = X25519Wrapper.unwrap(&key.public, &unlocked, &material).await;
        assert!(matches!(result, Err(Error::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn ed25519_sign_verify() {
        let key = ed25519_key([5; 32]);
        let unlocked = key.unlock(None).unwrap();
        let digest = [0xAB; 32];

        let mpis = Ed25519Signer.sign(&key.public, &unlocked, &digest).await.unwrap();
        assert!(Ed25519Signer.verify(&key.public, &digest, &mpis).await.unwrap());
        assert!(!Ed25519Signer.verify(&key.public, &[0xAC; 32], &mpis).await.unwrap());
        assert!(!Ed25519Signer.verify(&key.public, &digest, &mpis[..1]).await.unwrap());
    }
}
