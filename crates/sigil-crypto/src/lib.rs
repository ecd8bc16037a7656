//! Sigil Cryptographic Primitives
//!
//! Building blocks for OpenPGP session-key handling. Pure functions with
//! deterministic outputs: callers supply every random byte (salts, prefixes,
//! ephemeral scalars), which keeps message construction reproducible in tests.
//!
//! # Session Key Wrapping
//!
//! A message body is encrypted once under an ephemeral session key. The key
//! itself is wrapped separately for every recipient or passphrase:
//!
//! ```text
//!                    Session Key
//!                         │
//!        ┌────────────────┼────────────────────┐
//!        ▼                ▼                    ▼
//!   S2K(passphrase)   X25519 ECDH        Ed25519 signer
//!        │                │               (signatures only)
//!        ▼                ▼
//!   CFB (zero IV)    KDF → RFC3394 wrap
//!        │                │
//!        ▼                ▼
//!    SK-ESK body      PK-ESK body
//! ```
//!
//! # Security
//!
//! Oracles:
//! - A wrong passphrase and a corrupted SK-ESK are indistinguishable to the
//!   caller of the S2K path; both surface as a failed unwrap
//! - RFC3394 unwrap verifies the integrity IV before returning any key bytes
//!
//! Secret material:
//! - Derived keys and shared secrets are held in [`zeroize::Zeroizing`]
//!   buffers and wiped on drop

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod algorithm;
pub mod cfb;
pub mod cipher;
pub mod ecdh;
pub mod eddsa;
pub mod error;
pub mod hash;
pub mod key_wrap;
pub mod s2k;
pub mod session;

pub use algorithm::{CompressionAlgorithm, HashAlgorithm, PublicKeyAlgorithm, SymmetricAlgorithm};
pub use cipher::BlockCipher;
pub use error::{CryptoError, Result};
pub use hash::Hasher;
pub use key_wrap::AesKeyWrap;
pub use s2k::S2k;
pub use session::SessionKey;

/// Two-octet additive checksum used by session-key and secret-key encodings.
///
/// Sum of all bytes modulo 65536.
#[must_use]
pub fn checksum16(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_wraps_modulo_65536() {
        assert_eq!(checksum16(&[]), 0);
        assert_eq!(checksum16(&[1, 2, 3]), 6);
        assert_eq!(checksum16(&[0xFF; 300]), (0xFF * 300 % 65536) as u16);
    }
}
