//! OpenPGP algorithm identifiers.
//!
//! Every identifier round-trips: ids without a named variant are kept in an
//! `Unknown` variant so parsed packets re-serialize byte-for-byte. Operations
//! that need a concrete implementation reject `Unknown` with
//! [`CryptoError::Unsupported`].

use crate::error::{CryptoError, Result};

/// Symmetric-key algorithm ids (RFC4880 §9.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymmetricAlgorithm {
    /// Unencrypted (id 0)
    Plaintext,
    /// IDEA (id 1)
    Idea,
    /// `TripleDES` (id 2)
    TripleDes,
    /// CAST5 (id 3)
    Cast5,
    /// Blowfish (id 4)
    Blowfish,
    /// AES with 128-bit key (id 7)
    Aes128,
    /// AES with 192-bit key (id 8)
    Aes192,
    /// AES with 256-bit key (id 9)
    Aes256,
    /// Twofish with 256-bit key (id 10)
    Twofish,
    /// Unassigned or private id
    Unknown(u8),
}

impl SymmetricAlgorithm {
    /// Algorithm used when the caller does not choose one.
    pub const DEFAULT: Self = Self::Aes256;

    /// Wire id.
    #[must_use]
    pub fn id(self) -> u8 {
        match self {
            Self::Plaintext => 0,
            Self::Idea => 1,
            Self::TripleDes => 2,
            Self::Cast5 => 3,
            Self::Blowfish => 4,
            Self::Aes128 => 7,
            Self::Aes192 => 8,
            Self::Aes256 => 9,
            Self::Twofish => 10,
            Self::Unknown(id) => id,
        }
    }

    /// Parse a wire id. Returns `None` for ids without a named variant.
    ///
    /// Use this where an unknown id must be treated as a failure rather than
    /// carried through (for example after decrypting an SK-ESK).
    #[must_use]
    pub fn from_known_id(id: u8) -> Option<Self> {
        match Self::from(id) {
            Self::Unknown(_) => None,
            known => Some(known),
        }
    }

    /// Key size in bytes.
    pub fn key_size(self) -> Result<usize> {
        match self {
            Self::Idea | Self::Cast5 | Self::Blowfish | Self::Aes128 => Ok(16),
            Self::TripleDes | Self::Aes192 => Ok(24),
            Self::Aes256 | Self::Twofish => Ok(32),
            Self::Plaintext | Self::Unknown(_) => {
                Err(CryptoError::unsupported(format!("symmetric algorithm {}", self.id())))
            },
        }
    }

    /// Cipher block size in bytes.
    pub fn block_size(self) -> Result<usize> {
        match self {
            Self::Idea | Self::TripleDes | Self::Cast5 | Self::Blowfish => Ok(8),
            Self::Aes128 | Self::Aes192 | Self::Aes256 | Self::Twofish => Ok(16),
            Self::Plaintext | Self::Unknown(_) => {
                Err(CryptoError::unsupported(format!("symmetric algorithm {}", self.id())))
            },
        }
    }

    /// 64-bit block ciphers predating integrity protection.
    ///
    /// Only these may be used with the legacy Symmetrically Encrypted Data
    /// packet, which carries no modification detection code.
    #[must_use]
    pub fn is_legacy(self) -> bool {
        matches!(self, Self::Idea | Self::TripleDes | Self::Cast5 | Self::Blowfish)
    }
}

impl From<u8> for SymmetricAlgorithm {
    fn from(id: u8) -> Self {
        match id {
            0 => Self::Plaintext,
            1 => Self::Idea,
            2 => Self::TripleDes,
            3 => Self::Cast5,
            4 => Self::Blowfish,
            7 => Self::Aes128,
            8 => Self::Aes192,
            9 => Self::Aes256,
            10 => Self::Twofish,
            other => Self::Unknown(other),
        }
    }
}

/// Hash algorithm ids (RFC4880 §9.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// MD5 (id 1)
    Md5,
    /// SHA-1 (id 2)
    Sha1,
    /// RIPEMD-160 (id 3)
    Ripemd160,
    /// SHA-256 (id 8)
    Sha256,
    /// SHA-384 (id 9)
    Sha384,
    /// SHA-512 (id 10)
    Sha512,
    /// SHA-224 (id 11)
    Sha224,
    /// Unassigned or private id
    Unknown(u8),
}

impl HashAlgorithm {
    /// Wire id.
    #[must_use]
    pub fn id(self) -> u8 {
        match self {
            Self::Md5 => 1,
            Self::Sha1 => 2,
            Self::Ripemd160 => 3,
            Self::Sha256 => 8,
            Self::Sha384 => 9,
            Self::Sha512 => 10,
            Self::Sha224 => 11,
            Self::Unknown(id) => id,
        }
    }

    /// Name used in the cleartext-signature `Hash:` armor header.
    #[must_use]
    pub fn armor_name(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA1",
            Self::Ripemd160 => "RIPEMD160",
            Self::Sha256 => "SHA256",
            Self::Sha384 => "SHA384",
            Self::Sha512 => "SHA512",
            Self::Sha224 => "SHA224",
            Self::Unknown(_) => "UNKNOWN",
        }
    }

    /// Inverse of [`HashAlgorithm::armor_name`]. Case-insensitive.
    #[must_use]
    pub fn from_armor_name(name: &str) -> Option<Self> {
        [
            Self::Md5,
            Self::Sha1,
            Self::Ripemd160,
            Self::Sha256,
            Self::Sha384,
            Self::Sha512,
            Self::Sha224,
        ]
        .into_iter()
        .find(|alg| alg.armor_name().eq_ignore_ascii_case(name))
    }
}

impl From<u8> for HashAlgorithm {
    fn from(id: u8) -> Self {
        match id {
            1 => Self::Md5,
            2 => Self::Sha1,
            3 => Self::Ripemd160,
            8 => Self::Sha256,
            9 => Self::Sha384,
            10 => Self::Sha512,
            11 => Self::Sha224,
            other => Self::Unknown(other),
        }
    }
}

/// Public-key algorithm ids (RFC4880 §9.1, RFC6637, EdDSA draft).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublicKeyAlgorithm {
    /// RSA encrypt or sign (id 1)
    Rsa,
    /// RSA encrypt-only (id 2)
    RsaEncrypt,
    /// RSA sign-only (id 3)
    RsaSign,
    /// Elgamal encrypt-only (id 16)
    Elgamal,
    /// DSA (id 17)
    Dsa,
    /// ECDH (id 18)
    Ecdh,
    /// ECDSA (id 19)
    Ecdsa,
    /// `EdDSA` (id 22)
    EdDsa,
    /// Unassigned or private id
    Unknown(u8),
}

impl PublicKeyAlgorithm {
    /// Wire id.
    #[must_use]
    pub fn id(self) -> u8 {
        match self {
            Self::Rsa => 1,
            Self::RsaEncrypt => 2,
            Self::RsaSign => 3,
            Self::Elgamal => 16,
            Self::Dsa => 17,
            Self::Ecdh => 18,
            Self::Ecdsa => 19,
            Self::EdDsa => 22,
            Self::Unknown(id) => id,
        }
    }

    /// Any of the three RSA ids.
    #[must_use]
    pub fn is_rsa(self) -> bool {
        matches!(self, Self::Rsa | Self::RsaEncrypt | Self::RsaSign)
    }

    /// Algorithm can wrap session keys.
    #[must_use]
    pub fn can_encrypt(self) -> bool {
        matches!(self, Self::Rsa | Self::RsaEncrypt | Self::Elgamal | Self::Ecdh)
    }

    /// Algorithm can produce signatures.
    #[must_use]
    pub fn can_sign(self) -> bool {
        matches!(self, Self::Rsa | Self::RsaSign | Self::Dsa | Self::Ecdsa | Self::EdDsa)
    }
}

impl From<u8> for PublicKeyAlgorithm {
    fn from(id: u8) -> Self {
        match id {
            1 => Self::Rsa,
            2 => Self::RsaEncrypt,
            3 => Self::RsaSign,
            16 => Self::Elgamal,
            17 => Self::Dsa,
            18 => Self::Ecdh,
            19 => Self::Ecdsa,
            22 => Self::EdDsa,
            other => Self::Unknown(other),
        }
    }
}

/// Compression algorithm ids (RFC4880 §9.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionAlgorithm {
    /// Stored without compression (id 0)
    Uncompressed,
    /// Raw deflate (id 1)
    Zip,
    /// Deflate with zlib framing (id 2)
    Zlib,
    /// `BZip2` (id 3)
    Bzip2,
}

impl CompressionAlgorithm {
    /// Algorithm used when the caller does not choose one.
    pub const DEFAULT: Self = Self::Zlib;

    /// Wire id.
    #[must_use]
    pub fn id(self) -> u8 {
        match self {
            Self::Uncompressed => 0,
            Self::Zip => 1,
            Self::Zlib => 2,
            Self::Bzip2 => 3,
        }
    }

    /// Parse a wire id.
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(Self::Uncompressed),
            1 => Ok(Self::Zip),
            2 => Ok(Self::Zlib),
            3 => Ok(Self::Bzip2),
            other => Err(CryptoError::unsupported(format!("compression algorithm {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_including_unknown() {
        for id in 0..=u8::MAX {
            assert_eq!(SymmetricAlgorithm::from(id).id(), id);
            assert_eq!(HashAlgorithm::from(id).id(), id);
            assert_eq!(PublicKeyAlgorithm::from(id).id(), id);
        }
    }

    #[test]
    fn key_and_block_sizes() {
        assert_eq!(SymmetricAlgorithm::Aes256.key_size(), Ok(32));
        assert_eq!(SymmetricAlgorithm::Aes128.block_size(), Ok(16));
        assert_eq!(SymmetricAlgorithm::Cast5.block_size(), Ok(8));
        assert!(SymmetricAlgorithm::Unknown(99).key_size().is_err());
        assert!(SymmetricAlgorithm::Plaintext.block_size().is_err());
    }

    #[test]
    fn only_known_ids_pass_strict_lookup() {
        assert_eq!(SymmetricAlgorithm::from_known_id(9), Some(SymmetricAlgorithm::Aes256));
        assert_eq!(SymmetricAlgorithm::from_known_id(5), None);
    }

    #[test]
    fn armor_names_resolve_case_insensitively() {
        assert_eq!(HashAlgorithm::from_armor_name("sha256"), Some(HashAlgorithm::Sha256));
        assert_eq!(HashAlgorithm::from_armor_name("WHIRLPOOL"), None);
    }

    #[test]
    fn bzip2_is_recognised_but_unknown_compression_is_not() {
        assert_eq!(CompressionAlgorithm::from_id(3), Ok(CompressionAlgorithm::Bzip2));
        assert!(matches!(
            CompressionAlgorithm::from_id(4),
            Err(CryptoError::Unsupported { .. })
        ));
    }
}
