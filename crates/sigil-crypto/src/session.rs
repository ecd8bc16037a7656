//! Ephemeral session keys.

use zeroize::Zeroizing;

use crate::{
    algorithm::SymmetricAlgorithm,
    checksum16,
    error::{CryptoError, Result},
};

/// Symmetric key for one message body.
///
/// Owned by a single construction or decryption operation and wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey {
    algorithm: SymmetricAlgorithm,
    key: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("algorithm", &self.algorithm)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl SessionKey {
    /// Wrap existing key bytes.
    ///
    /// # Errors
    ///
    /// - `CryptoError::Unsupported` if the algorithm has no key size
    /// - `CryptoError::InvalidKeyLength` if `key` does not match it
    pub fn new(algorithm: SymmetricAlgorithm, key: &[u8]) -> Result<Self> {
        let expected = algorithm.key_size()?;
        if key.len() != expected {
            return Err(CryptoError::InvalidKeyLength { expected, actual: key.len() });
        }
        Ok(Self { algorithm, key: Zeroizing::new(key.to_vec()) })
    }

    /// Generate a key of the right size, filling it with `fill`.
    ///
    /// # Errors
    ///
    /// - `CryptoError::Unsupported` if the algorithm has no key size
    pub fn generate(algorithm: SymmetricAlgorithm, fill: impl FnOnce(&mut [u8])) -> Result<Self> {
        let mut key = Zeroizing::new(vec![0u8; algorithm.key_size()?]);
        fill(&mut key);
        Ok(Self { algorithm, key })
    }

    /// Algorithm the key is for.
    #[must_use]
    pub fn algorithm(&self) -> SymmetricAlgorithm {
        self.algorithm
    }

    /// Raw key bytes.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// `algorithm id ‖ key ‖ checksum16(key)`, the PK-ESK plaintext.
    #[must_use]
    pub fn to_checksummed(&self) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(Vec::with_capacity(self.key.len() + 3));
        out.push(self.algorithm.id());
        out.extend_from_slice(&self.key);
        out.extend_from_slice(&checksum16(&self.key).to_be_bytes());
        out
    }

    /// Parse the PK-ESK plaintext form.
    ///
    /// # Errors
    ///
    /// - `CryptoError::Malformed` if the checksum does not match or the
    ///   layout is too short
    /// - `CryptoError::Unsupported` / `InvalidKeyLength` if the algorithm or
    ///   key size is not usable
    pub fn from_checksummed(bytes: &[u8]) -> Result<Self> {
        let [alg, key @ .., c0, c1] = bytes else {
            return Err(CryptoError::malformed("session key too short"));
        };
        if checksum16(key) != u16::from_be_bytes([*c0, *c1]) {
            return Err(CryptoError::malformed("session key checksum mismatch"));
        }
        Self::new(SymmetricAlgorithm::from(*alg), key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksummed_form_round_trips() {
        let key = SessionKey::generate(SymmetricAlgorithm::Aes128, |b| b.fill(3)).unwrap();
        let encoded = key.to_checksummed();
        assert_eq!(encoded.len(), 1 + 16 + 2);
        assert_eq!(SessionKey::from_checksummed(&encoded).unwrap(), key);
    }

    #[test]
    fn bad_checksum_is_malformed() {
        let key = SessionKey::generate(SymmetricAlgorithm::Aes128, |b| b.fill(3)).unwrap();
        let mut encoded = key.to_checksummed().to_vec();
        let last = encoded.len() - 1;
        encoded[last] ^= 1;
        assert!(matches!(
            SessionKey::from_checksummed(&encoded),
            Err(CryptoError::Malformed { .. })
        ));
    }

    #[test]
    fn debug_hides_key_bytes() {
        let key = SessionKey::new(SymmetricAlgorithm::Aes128, &[0xEE; 16]).unwrap();
        assert!(!format!("{key:?}").contains("238"));
    }
}
