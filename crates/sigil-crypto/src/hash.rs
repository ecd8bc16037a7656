//! Incremental message digests keyed by OpenPGP hash id.

use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use crate::{
    algorithm::HashAlgorithm,
    error::{CryptoError, Result},
};

/// Streaming hash context for one of the supported digests.
///
/// MD5 and RIPEMD-160 are recognised ids but are refused here; signatures
/// using them surface as unsupported rather than silently verifying.
#[derive(Clone)]
pub enum Hasher {
    /// SHA-1 context
    Sha1(Sha1),
    /// SHA-224 context
    Sha224(Sha224),
    /// SHA-256 context
    Sha256(Sha256),
    /// SHA-384 context
    Sha384(Sha384),
    /// SHA-512 context
    Sha512(Sha512),
}

impl Hasher {
    /// Start a new digest.
    ///
    /// # Errors
    ///
    /// - `CryptoError::Unsupported` for MD5, RIPEMD-160 and unknown ids
    pub fn new(algorithm: HashAlgorithm) -> Result<Self> {
        match algorithm {
            HashAlgorithm::Sha1 => Ok(Self::Sha1(Sha1::new())),
            HashAlgorithm::Sha224 => Ok(Self::Sha224(Sha224::new())),
            HashAlgorithm::Sha256 => Ok(Self::Sha256(Sha256::new())),
            HashAlgorithm::Sha384 => Ok(Self::Sha384(Sha384::new())),
            HashAlgorithm::Sha512 => Ok(Self::Sha512(Sha512::new())),
            HashAlgorithm::Md5 | HashAlgorithm::Ripemd160 | HashAlgorithm::Unknown(_) => {
                Err(CryptoError::unsupported(format!("hash algorithm {}", algorithm.id())))
            },
        }
    }

    /// Absorb more input.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha1(h) => h.update(data),
            Self::Sha224(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::Sha384(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    /// Consume the context and return the digest.
    #[must_use]
    pub fn finalize(self) -> Vec<u8> {
        match self {
            Self::Sha1(h) => h.finalize().to_vec(),
            Self::Sha224(h) => h.finalize().to_vec(),
            Self::Sha256(h) => h.finalize().to_vec(),
            Self::Sha384(h) => h.finalize().to_vec(),
            Self::Sha512(h) => h.finalize().to_vec(),
        }
    }

    /// One-shot digest.
    pub fn digest(algorithm: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>> {
        let mut hasher = Self::new(algorithm)?;
        hasher.update(data);
        Ok(hasher.finalize())
    }
}

/// SHA-1 digest, used by the MDC and v4 fingerprints.
#[must_use]
pub fn sha1(data: &[u8]) -> [u8; 20] {
    Sha1::digest(data).into()
}
