//! Raw block cipher dispatch by OpenPGP algorithm id.

use aes::{
    Aes128, Aes192, Aes256,
    cipher::{BlockDecrypt, BlockEncrypt, KeyInit, generic_array::GenericArray},
};
use blowfish::Blowfish;
use cast5::Cast5;
use des::TdesEde3;
use idea::Idea;

use crate::{
    algorithm::SymmetricAlgorithm,
    error::{CryptoError, Result},
};

/// A keyed block cipher.
///
/// AES covers everything this crate writes. The 64-bit ciphers exist so
/// legacy Symmetrically Encrypted Data and old protected keys still open.
/// Twofish is a recognised id but yields [`CryptoError::Unsupported`].
#[derive(Clone)]
pub enum BlockCipher {
    /// IDEA
    Idea(Idea),
    /// Three-key EDE `TripleDES`
    TripleDes(TdesEde3),
    /// CAST5 (CAST-128)
    Cast5(Cast5),
    /// Blowfish with a 128-bit key
    Blowfish(Blowfish),
    /// AES-128
    Aes128(Aes128),
    /// AES-192
    Aes192(Aes192),
    /// AES-256
    Aes256(Aes256),
}

impl BlockCipher {
    /// Key a cipher for `algorithm`.
    ///
    /// # Errors
    ///
    /// - `CryptoError::Unsupported` if no implementation exists for the id
    /// - `CryptoError::InvalidKeyLength` if `key` does not match the
    ///   algorithm's key size
    pub fn new(algorithm: SymmetricAlgorithm, key: &[u8]) -> Result<Self> {
        let expected = algorithm.key_size()?;
        if key.len() != expected {
            return Err(CryptoError::InvalidKeyLength { expected, actual: key.len() });
        }

        let invalid = |_| CryptoError::InvalidKeyLength { expected, actual: key.len() };
        match algorithm {
            SymmetricAlgorithm::Idea => Idea::new_from_slice(key).map(Self::Idea).map_err(invalid),
            SymmetricAlgorithm::TripleDes => {
                TdesEde3::new_from_slice(key).map(Self::TripleDes).map_err(invalid)
            },
            SymmetricAlgorithm::Cast5 => Cast5::new_from_slice(key).map(Self::Cast5).map_err(invalid),
            SymmetricAlgorithm::Blowfish => {
                Blowfish::new_from_slice(key).map(Self::Blowfish).map_err(invalid)
            },
            SymmetricAlgorithm::Aes128 => Aes128::new_from_slice(key).map(Self::Aes128).map_err(invalid),
            SymmetricAlgorithm::Aes192 => Aes192::new_from_slice(key).map(Self::Aes192).map_err(invalid),
            SymmetricAlgorithm::Aes256 => Aes256::new_from_slice(key).map(Self::Aes256).map_err(invalid),
            other => Err(CryptoError::unsupported(format!("symmetric algorithm {}", other.id()))),
        }
    }

    /// Block size in bytes.
    #[must_use]
    pub fn block_size(&self) -> usize {
        match self {
            Self::Idea(_) | Self::TripleDes(_) | Self::Cast5(_) | Self::Blowfish(_) => 8,
            Self::Aes128(_) | Self::Aes192(_) | Self::Aes256(_) => 16,
        }
    }

    /// Encrypt one block in place. `block.len()` must equal the block size.
    pub fn encrypt_block(&self, block: &mut [u8]) {
        debug_assert_eq!(block.len(), self.block_size());
        match self {
            Self::Idea(c) => c.encrypt_block(GenericArray::from_mut_slice(block)),
            Self::TripleDes(c) => c.encrypt_block(GenericArray::from_mut_slice(block)),
            Self::Cast5(c) => c.encrypt_block(GenericArray::from_mut_slice(block)),
            Self::Blowfish(c) => c.encrypt_block(GenericArray::from_mut_slice(block)),
            Self::Aes128(c) => c.encrypt_block(GenericArray::from_mut_slice(block)),
            Self::Aes192(c) => c.encrypt_block(GenericArray::from_mut_slice(block)),
            Self::Aes256(c) => c.encrypt_block(GenericArray::from_mut_slice(block)),
        }
    }

    /// Decrypt one block in place. `block.len()` must equal the block size.
    pub fn decrypt_block(&self, block: &mut [u8]) {
        debug_assert_eq!(block.len(), self.block_size());
        match self {
            Self::Idea(c) => c.decrypt_block(GenericArray::from_mut_slice(block)),
            Self::TripleDes(c) => c.decrypt_block(GenericArray::from_mut_slice(block)),
            Self::Cast5(c) => c.decrypt_block(GenericArray::from_mut_slice(block)),
            Self::Blowfish(c) => c.decrypt_block(GenericArray::from_mut_slice(block)),
            Self::Aes128(c) => c.decrypt_block(GenericArray::from_mut_slice(block)),
            Self::Aes192(c) => c.decrypt_block(GenericArray::from_mut_slice(block)),
            Self::Aes256(c) => c.decrypt_block(GenericArray::from_mut_slice(block)),
        }
    }
}
