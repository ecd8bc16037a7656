//! String-to-Key specifiers (RFC4880 §3.7).
//!
//! An S2K turns a passphrase into symmetric key bytes. The wire encoding is a
//! type byte, a hash id, and type-specific trailing fields:
//!
//! ```text
//! Simple   : 00 hash
//! Salted   : 01 hash salt[8]
//! Iterated : 03 hash salt[8] count
//! Dummy    : 65 hash "GNU"|"E2E" mode
//! ```

use zeroize::Zeroizing;

use crate::{
    algorithm::HashAlgorithm,
    error::{CryptoError, Result},
    hash::Hasher,
};

/// Salt length for salted and iterated specifiers.
pub const SALT_SIZE: usize = 8;

/// Encoded iteration count used when constructing new specifiers (65536 bytes).
pub const DEFAULT_ENCODED_COUNT: u8 = 96;

const GNU_HEADER: [u8; 3] = *b"GNU";
const E2E_HEADER: [u8; 3] = *b"E2E";

/// Vendor namespace of a dummy specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DummyVendor {
    /// GnuPG extension: mode 1 = no secret, 2 = smartcard stub
    Gnu,
    /// E2E extension: mode 0 = serialized, 1 = web crypto, 2 = hardware
    E2e,
}

/// A parsed String-to-Key specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum S2k {
    /// Hash of the passphrase
    Simple {
        /// Digest used for derivation
        hash: HashAlgorithm,
    },
    /// Hash of salt followed by passphrase
    Salted {
        /// Digest used for derivation
        hash: HashAlgorithm,
        /// Eight random bytes
        salt: [u8; SALT_SIZE],
    },
    /// Salted hash over a repeated input of `count` bytes
    Iterated {
        /// Digest used for derivation
        hash: HashAlgorithm,
        /// Eight random bytes
        salt: [u8; SALT_SIZE],
        /// One-byte encoded iteration count
        count: u8,
    },
    /// Placeholder for secret material held elsewhere. Cannot derive keys.
    Dummy {
        /// Declared digest (may be zero)
        hash: HashAlgorithm,
        /// Extension namespace
        vendor: DummyVendor,
        /// Vendor-specific mode byte
        mode: u8,
    },
}

impl S2k {
    /// Iterated specifier with the construction defaults (SHA-1, count 96).
    #[must_use]
    pub fn iterated_default(salt: [u8; SALT_SIZE]) -> Self {
        Self::Iterated { hash: HashAlgorithm::Sha1, salt, count: DEFAULT_ENCODED_COUNT }
    }

    /// Decode a specifier from the front of `bytes`.
    ///
    /// Returns the specifier and the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// - `CryptoError::Malformed` for unknown types, short salts, unknown
    ///   dummy headers or modes
    pub fn parse(bytes: &[u8]) -> Result<(Self, usize)> {
        let [kind, hash_id, rest @ ..] = bytes else {
            return Err(CryptoError::malformed("truncated S2K specifier"));
        };
        let hash = HashAlgorithm::from(*hash_id);

        match kind {
            0 => Ok((Self::Simple { hash }, 2)),
            1 | 3 => {
                let salt: [u8; SALT_SIZE] = rest
                    .get(..SALT_SIZE)
                    .and_then(|s| s.try_into().ok())
                    .ok_or_else(|| CryptoError::malformed("invalid S2K salt"))?;
                if *kind == 1 {
                    return Ok((Self::Salted { hash, salt }, 2 + SALT_SIZE));
                }
                let count = *rest
                    .get(SALT_SIZE)
                    .ok_or_else(|| CryptoError::malformed("missing S2K count"))?;
                Ok((Self::Iterated { hash, salt, count }, 3 + SALT_SIZE))
            },
            101 => {
                let [h0, h1, h2, mode, ..] = rest else {
                    return Err(CryptoError::malformed("truncated dummy S2K"));
                };
                let vendor = match [*h0, *h1, *h2] {
                    GNU_HEADER => DummyVendor::Gnu,
                    E2E_HEADER => DummyVendor::E2e,
                    _ => return Err(CryptoError::malformed("invalid dummy S2K header")),
                };
                let valid_mode = match vendor {
                    DummyVendor::Gnu => matches!(mode, 1 | 2),
                    DummyVendor::E2e => matches!(mode, 0..=2),
                };
                if !valid_mode {
                    return Err(CryptoError::malformed(format!("invalid dummy S2K mode {mode}")));
                }
                Ok((Self::Dummy { hash, vendor, mode: *mode }, 6))
            },
            other => Err(CryptoError::malformed(format!("invalid S2K type {other}"))),
        }
    }

    /// Encode to wire form.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Simple { hash } => vec![0, hash.id()],
            Self::Salted { hash, salt } => {
                let mut out = vec![1, hash.id()];
                out.extend_from_slice(salt);
                out
            },
            Self::Iterated { hash, salt, count } => {
                let mut out = vec![3, hash.id()];
                out.extend_from_slice(salt);
                out.push(*count);
                out
            },
            Self::Dummy { hash, vendor, mode } => {
                let mut out = vec![101, hash.id()];
                out.extend_from_slice(match vendor {
                    DummyVendor::Gnu => &GNU_HEADER,
                    DummyVendor::E2e => &E2E_HEADER,
                });
                out.push(*mode);
                out
            },
        }
    }

    /// Digest declared by the specifier.
    #[must_use]
    pub fn hash(&self) -> HashAlgorithm {
        match self {
            Self::Simple { hash }
            | Self::Salted { hash, .. }
            | Self::Iterated { hash, .. }
            | Self::Dummy { hash, .. } => *hash,
        }
    }

    /// Derive `key_len` bytes of key material from `passphrase`.
    ///
    /// Each round hashes `round` zero bytes followed by the (salted,
    /// possibly repeated) passphrase; round outputs are concatenated and
    /// truncated.
    ///
    /// # Errors
    ///
    /// - `CryptoError::Unsupported` for dummy specifiers or unsupported
    ///   digests
    pub fn derive_key(&self, passphrase: &[u8], key_len: usize) -> Result<Zeroizing<Vec<u8>>> {
        let (hash, salt, byte_count) = match self {
            Self::Simple { hash } => (*hash, &[][..], None),
            Self::Salted { hash, salt } => (*hash, &salt[..], None),
            Self::Iterated { hash, salt, count } => (*hash, &salt[..], Some(decode_count(*count))),
            Self::Dummy { .. } => {
                return Err(CryptoError::unsupported("cannot derive a key from a dummy S2K"));
            },
        };

        let mut input = Zeroizing::new(Vec::with_capacity(salt.len() + passphrase.len()));
        input.extend_from_slice(salt);
        input.extend_from_slice(passphrase);
        let total = byte_count.map_or(input.len(), |count| count.max(input.len()));

        let mut key = Zeroizing::new(Vec::with_capacity(key_len + 64));
        let mut round = 0usize;
        while key.len() < key_len {
            let mut hasher = Hasher::new(hash)?;
            hasher.update(&vec![0u8; round]);
            feed_repeated(&mut hasher, &input, total);
            key.extend_from_slice(&hasher.finalize());
            round += 1;
        }
        key.truncate(key_len);
        Ok(key)
    }
}

/// Decode the one-byte iteration count into a byte count.
#[must_use]
pub fn decode_count(count: u8) -> usize {
    (16 + usize::from(count & 15)) << (usize::from(count >> 4) + 6)
}

fn feed_repeated(hasher: &mut Hasher, input: &[u8], total: usize) {
    if input.is_empty() {
        return;
    }
    let mut remaining = total;
    while remaining >= input.len() {
        hasher.update(input);
        remaining -= input.len();
    }
    hasher.update(&input[..remaining]);
}
