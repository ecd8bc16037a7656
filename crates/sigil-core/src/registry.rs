//! Algorithm registry: public-key algorithm id → implementation.
//!
//! Session-key wrapping and signing are pluggable. Each public-key algorithm
//! registers at most one [`SessionKeyWrapper`] and one [`Signer`]; symmetric
//! ciphers and digests are a closed set in `sigil_crypto` and need no
//! registry.
//!
//! The registry is assembled once through [`AlgorithmRegistryBuilder`] and is
//! immutable afterwards, so it can be shared across recipient tasks without
//! locking.

use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use async_trait::async_trait;
use sigil_crypto::PublicKeyAlgorithm;
use sigil_proto::{Mpi, PublicKey, packets::{EskMaterial, UnlockedSecret}};
use zeroize::Zeroizing;

use crate::{
    algorithms::{Ed25519Signer, X25519Wrapper},
    error::{Error, Result},
};

/// Wraps and unwraps session keys for one public-key algorithm.
///
/// # Invariants
///
/// - `unwrap(wrap(k)) == k` for the matching secret key
/// - `wrap` uses only the supplied `ephemeral` bytes as randomness, so
///   construction is reproducible under a seeded environment
#[async_trait]
pub trait SessionKeyWrapper: Send + Sync {
    /// Algorithm this wrapper handles.
    fn algorithm(&self) -> PublicKeyAlgorithm;

    /// Random bytes `wrap` needs per recipient.
    fn ephemeral_len(&self) -> usize;

    /// Wrap a PK-ESK plaintext (`algorithm ‖ key ‖ checksum`) for `recipient`.
    async fn wrap(
        &self,
        recipient: &PublicKey,
        plaintext: &[u8],
        ephemeral: Zeroizing<Vec<u8>>,
    ) -> Result<EskMaterial>;

    /// Recover the PK-ESK plaintext with the recipient's unlocked secret.
    async fn unwrap(
        &self,
        recipient: &PublicKey,
        secret: &UnlockedSecret,
        material: &EskMaterial,
    ) -> Result<Zeroizing<Vec<u8>>>;
}

/// Produces and checks signature values for one public-key algorithm.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Algorithm this signer handles.
    fn algorithm(&self) -> PublicKeyAlgorithm;

    /// Sign a digest, returning the algorithm-specific MPIs.
    async fn sign(&self, public: &PublicKey, secret: &UnlockedSecret, digest: &[u8])
    -> Result<Vec<Mpi>>;

    /// Check signature MPIs over a digest. A well-formed but wrong signature
    /// is `Ok(false)`.
    async fn verify(&self, public: &PublicKey, digest: &[u8], mpis: &[Mpi]) -> Result<bool>;
}

/// Collects implementations before freezing them into an
/// [`AlgorithmRegistry`].
#[derive(Default, Clone)]
pub struct AlgorithmRegistryBuilder {
    wrappers: HashMap<PublicKeyAlgorithm, Arc<dyn SessionKeyWrapper>>,
    signers: HashMap<PublicKeyAlgorithm, Arc<dyn Signer>>,
}

impl AlgorithmRegistryBuilder {
    /// Empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pre-loaded with X25519 wrapping and Ed25519 signing.
    #[must_use]
    pub fn with_standard_algorithms() -> Self {
        Self::new().register_wrapper(Arc::new(X25519Wrapper)).register_signer(Arc::new(Ed25519Signer))
    }

    /// Register a session-key wrapper. The first registration for an
    /// algorithm wins.
    #[must_use]
    pub fn register_wrapper(mut self, wrapper: Arc<dyn SessionKeyWrapper>) -> Self {
        self.wrappers.entry(wrapper.algorithm()).or_insert(wrapper);
        self
    }

    /// Register a signer. The first registration for an algorithm wins.
    #[must_use]
    pub fn register_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signers.entry(signer.algorithm()).or_insert(signer);
        self
    }

    /// Freeze into a registry.
    #[must_use]
    pub fn build(self) -> AlgorithmRegistry {
        AlgorithmRegistry { wrappers: self.wrappers, signers: self.signers }
    }
}

/// Frozen algorithm table.
#[derive(Clone)]
pub struct AlgorithmRegistry {
    wrappers: HashMap<PublicKeyAlgorithm, Arc<dyn SessionKeyWrapper>>,
    signers: HashMap<PublicKeyAlgorithm, Arc<dyn Signer>>,
}

impl std::fmt::Debug for AlgorithmRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgorithmRegistry")
            .field("wrappers", &self.wrappers.keys().collect::<Vec<_>>())
            .field("signers", &self.signers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AlgorithmRegistry {
    /// Process-wide registry with the standard algorithms.
    pub fn standard() -> Arc<Self> {
        static STANDARD: OnceLock<Arc<AlgorithmRegistry>> = OnceLock::new();
        Arc::clone(
            STANDARD.get_or_init(|| Arc::new(AlgorithmRegistryBuilder::with_standard_algorithms().build())),
        )
    }

    /// True if session keys can be wrapped for `algorithm`.
    #[must_use]
    pub fn can_wrap(&self, algorithm: PublicKeyAlgorithm) -> bool {
        self.wrappers.contains_key(&algorithm)
    }

    /// True if signatures can be made or checked with `algorithm`.
    #[must_use]
    pub fn can_sign(&self, algorithm: PublicKeyAlgorithm) -> bool {
        self.signers.contains_key(&algorithm)
    }

    /// Wrapper for `algorithm`.
    ///
    /// # Errors
    ///
    /// - `Error::Unsupported` if none is registered
    pub fn wrapper(&self, algorithm: PublicKeyAlgorithm) -> Result<Arc<dyn SessionKeyWrapper>> {
        self.wrappers
            .get(&algorithm)
            .cloned()
            .ok_or_else(|| Error::Unsupported(format!("session key wrapping with {algorithm:?}")))
    }

    /// Signer for `algorithm`.
    ///
    /// # Errors
    ///
    /// - `Error::Unsupported` if none is registered
    pub fn signer(&self, algorithm: PublicKeyAlgorithm) -> Result<Arc<dyn Signer>> {
        self.signers
            .get(&algorithm)
            .cloned()
            .ok_or_else(|| Error::Unsupported(format!("signing with {algorithm:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NeverWraps;

    #[async_trait]
    impl SessionKeyWrapper for NeverWraps {
        fn algorithm(&self) -> PublicKeyAlgorithm {
            PublicKeyAlgorithm::Ecdh
        }

        fn ephemeral_len(&self) -> usize {
            0
        }

        async fn wrap(&self, _: &PublicKey, _: &[u8], _: Zeroizing<Vec<u8>>) -> Result<EskMaterial> {
            Err(Error::Unsupported("never".into()))
        }

        async fn unwrap(
            &self,
            _: &PublicKey,
            _: &UnlockedSecret,
            _: &EskMaterial,
        ) -> Result<Zeroizing<Vec<u8>>> {
            Err(Error::Unsupported("never".into()))
        }
    }

    #[test]
    fn first_registration_wins() {
        let registry = AlgorithmRegistryBuilder::with_standard_algorithms()
            .register_wrapper(Arc::new(NeverWraps))
            .build();
        let wrapper = registry.wrapper(PublicKeyAlgorithm::Ecdh).unwrap();
        assert_eq!(wrapper.ephemeral_len(), 32);
    }

    #[test]
    fn missing_algorithms_are_unsupported() {
        let registry = AlgorithmRegistry::standard();
        assert!(registry.can_wrap(PublicKeyAlgorithm::Ecdh));
        assert!(registry.can_sign(PublicKeyAlgorithm::EdDsa));
        assert!(!registry.can_wrap(PublicKeyAlgorithm::Rsa));
        assert!(matches!(registry.wrapper(PublicKeyAlgorithm::Elgamal), Err(Error::Unsupported(_))));
        assert!(matches!(registry.signer(PublicKeyAlgorithm::Dsa), Err(Error::Unsupported(_))));
    }
}
