//! Encrypted data packets (tags 9 and 18).
//!
//! Tag 18 plaintext layout, CFB-encrypted under a zero IV:
//!
//! ```text
//! prefix[bs] ‖ prefix[bs-2..bs] ‖ inner packets ‖ D3 14 ‖ SHA1(everything before)
//! ```
//!
//! The trailing 22 bytes are a Modification Detection Code packet whose hash
//! covers the prefix, the inner packets and the MDC header itself.

use bytes::{BufMut, Bytes, BytesMut};
use sigil_crypto::{BlockCipher, SessionKey, cfb, hash::sha1};

use super::PacketBody;
use crate::{
    errors::{ProtocolError, Result},
    tag::Tag,
};

/// Size of the MDC packet (2 header bytes and a SHA-1 digest).
pub const MDC_SIZE: usize = 22;

const MDC_HEADER: [u8; 2] = [0xD3, 0x14];
const SEIPD_VERSION: u8 = 1;

/// Legacy Symmetrically Encrypted Data (tag 9), without integrity protection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymEncryptedData {
    /// Ciphertext including the encrypted random prefix
    pub ciphertext: Bytes,
}

impl SymEncryptedData {
    /// Encrypt serialized inner packets with OpenPGP CFB resynchronisation.
    ///
    /// `prefix` must be one block of fresh random bytes.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Unsupported` unless the session algorithm is one of
    ///   the legacy 64-bit ciphers
    /// - `ProtocolError::InvalidArguments` if `prefix` is not one block long
    pub fn encrypt(session: &SessionKey, prefix: &[u8], inner: &[u8]) -> Result<Self> {
        let cipher = legacy_cipher(session)?;
        let ciphertext = cfb::resync_encrypt(&cipher, prefix, inner)?;
        Ok(Self { ciphertext: ciphertext.into() })
    }

    /// Decrypt with OpenPGP CFB resynchronisation.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Unsupported` unless the session algorithm is one of
    ///   the legacy 64-bit ciphers
    /// - `ProtocolError::InvalidArguments` if the ciphertext is shorter than
    ///   the random prefix
    pub fn decrypt(&self, session: &SessionKey) -> Result<Bytes> {
        let cipher = legacy_cipher(session)?;
        Ok(cfb::resync_decrypt(&cipher, &self.ciphertext)?.into())
    }
}

fn legacy_cipher(session: &SessionKey) -> Result<BlockCipher> {
    if !session.algorithm().is_legacy() {
        return Err(ProtocolError::Unsupported(
            "only legacy ciphers may be used without integrity protection".into(),
        ));
    }
    Ok(BlockCipher::new(session.algorithm(), session.key())?)
}

impl PacketBody for SymEncryptedData {
    const TAG: Tag = Tag::SymEncryptedData;

    fn decode_body(body: Bytes) -> Result<Self> {
        Ok(Self { ciphertext: body })
    }

    fn encode_body(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_slice(&self.ciphertext);
        Ok(())
    }
}

/// Symmetrically Encrypted Integrity Protected Data (tag 18, version 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymEncryptedProtectedData {
    /// Ciphertext following the version byte
    pub ciphertext: Bytes,
}

impl SymEncryptedProtectedData {
    /// Encrypt serialized inner packets under `session`.
    ///
    /// `prefix` must be one block of fresh random bytes.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Unsupported` if the session algorithm has no cipher
    /// - `ProtocolError::InvalidArguments` if `prefix` is not one block long
    pub fn encrypt(session: &SessionKey, prefix: &[u8], inner: &[u8]) -> Result<Self> {
        let cipher = BlockCipher::new(session.algorithm(), session.key())?;
        let bs = cipher.block_size();
        if prefix.len() != bs {
            return Err(ProtocolError::InvalidArguments(format!(
                "prefix must be {bs} bytes, got {}",
                prefix.len()
            )));
        }

        let mut plaintext = Vec::with_capacity(bs + 2 + inner.len() + MDC_SIZE);
        plaintext.extend_from_slice(prefix);
        plaintext.extend_from_slice(&prefix[bs - 2..]);
        plaintext.extend_from_slice(inner);
        plaintext.extend_from_slice(&MDC_HEADER);
        let mdc = sha1(&plaintext);
        plaintext.extend_from_slice(&mdc);

        let ciphertext = cfb::encrypt(&cipher, &vec![0u8; bs], &plaintext)?;
        Ok(Self { ciphertext: ciphertext.into() })
    }

    /// Decrypt and verify the modification detection code.
    ///
    /// Returns the serialized inner packets.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::IntegrityCheckFailed` if the MDC is absent or does
    ///   not match (a wrong session key lands here too)
    /// - `ProtocolError::Unsupported` if the session algorithm has no cipher
    pub fn decrypt(&self, session: &SessionKey) -> Result<Bytes> {
        let cipher = BlockCipher::new(session.algorithm(), session.key())?;
        let bs = cipher.block_size();
        let plaintext = cfb::decrypt(&cipher, &vec![0u8; bs], &self.ciphertext)?;

        if plaintext.len() < bs + 2 + MDC_SIZE {
            return Err(ProtocolError::IntegrityCheckFailed);
        }
        let (covered, digest) = plaintext.split_at(plaintext.len() - 20);
        if sha1(covered) != digest || !covered.ends_with(&MDC_HEADER) {
            return Err(ProtocolError::IntegrityCheckFailed);
        }

        Ok(Bytes::copy_from_slice(&covered[bs + 2..covered.len() - MDC_HEADER.len()]))
    }
}

impl PacketBody for SymEncryptedProtectedData {
    const TAG: Tag = Tag::SymEncryptedProtectedData;

    fn decode_body(body: Bytes) -> Result<Self> {
        match body.first() {
            Some(&SEIPD_VERSION) => Ok(Self { ciphertext: body.slice(1..) }),
            Some(&other) => Err(ProtocolError::malformed(
                "integrity protected data",
                format!("unsupported version {other}"),
            )),
            None => Err(ProtocolError::Truncated { expected: 1, actual: 0 }),
        }
    }

    fn encode_body(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_u8(SEIPD_VERSION);
        dst.put_slice(&self.ciphertext);
        Ok(())
    }
}
