//! OpenPGP cipher feedback modes.
//!
//! Two flavours are used on the wire:
//!
//! - Plain CFB with a caller-supplied IV (zero IV for integrity-protected
//!   data and SK-ESKs, the stored IV for protected secret keys)
//! - CFB with resynchronisation (RFC4880 §13.9) for the legacy Symmetrically
//!   Encrypted Data packet: after the `block_size + 2` byte prefix the
//!   feedback register is reloaded from ciphertext bytes `2..block_size + 2`

use crate::{
    cipher::BlockCipher,
    error::{CryptoError, Result},
};

/// Encrypt `data` in CFB mode under `iv`.
///
/// # Errors
///
/// - `CryptoError::InvalidArguments` if `iv` is not one block long
pub fn encrypt(cipher: &BlockCipher, iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut register = check_iv(cipher, iv)?;
    let mut out = Vec::with_capacity(data.len());

    for chunk in data.chunks(cipher.block_size()) {
        let mut keystream = register.clone();
        cipher.encrypt_block(&mut keystream);

        let start = out.len();
        out.extend(chunk.iter().zip(&keystream).map(|(p, k)| p ^ k));

        // Partial trailing blocks never feed back, so only full blocks matter
        if chunk.len() == register.len() {
            register.copy_from_slice(&out[start..]);
        }
    }

    Ok(out)
}

/// Decrypt `data` in CFB mode under `iv`.
///
/// # Errors
///
/// - `CryptoError::InvalidArguments` if `iv` is not one block long
pub fn decrypt(cipher: &BlockCipher, iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut register = check_iv(cipher, iv)?;
    let mut out = Vec::with_capacity(data.len());

    for chunk in data.chunks(cipher.block_size()) {
        let mut keystream = register.clone();
        cipher.encrypt_block(&mut keystream);

        out.extend(chunk.iter().zip(&keystream).map(|(c, k)| c ^ k));

        if chunk.len() == register.len() {
            register.copy_from_slice(chunk);
        }
    }

    Ok(out)
}

/// Encrypt with OpenPGP resynchronisation.
///
/// `prefix` must be `block_size` random bytes. The output starts with the
/// encrypted prefix plus its repeated last two bytes, then the encrypted
/// `data` under the resynchronised register.
///
/// # Errors
///
/// - `CryptoError::InvalidArguments` if `prefix` is not one block long
pub fn resync_encrypt(cipher: &BlockCipher, prefix: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let bs = cipher.block_size();
    if prefix.len() != bs {
        return Err(CryptoError::invalid(format!(
            "CFB prefix must be {bs} bytes, got {}",
            prefix.len()
        )));
    }

    let mut header = Vec::with_capacity(bs + 2);
    header.extend_from_slice(prefix);
    header.extend_from_slice(&prefix[bs - 2..]);

    let mut out = encrypt(cipher, &vec![0u8; bs], &header)?;
    let iv = out[2..bs + 2].to_vec();
    out.extend(encrypt(cipher, &iv, data)?);
    Ok(out)
}

/// Decrypt with OpenPGP resynchronisation, returning the payload after the
/// `block_size + 2` byte prefix.
///
/// The two quick-check bytes are not inspected.
///
/// # Errors
///
/// - `CryptoError::InvalidArguments` if `data` is shorter than the prefix
pub fn resync_decrypt(cipher: &BlockCipher, data: &[u8]) -> Result<Vec<u8>> {
    let bs = cipher.block_size();
    if data.len() < bs + 2 {
        return Err(CryptoError::invalid(format!(
            "ciphertext of {} bytes is shorter than the {} byte prefix",
            data.len(),
            bs + 2
        )));
    }
    decrypt(cipher, &data[2..bs + 2], &data[bs + 2..])
}

fn check_iv(cipher: &BlockCipher, iv: &[u8]) -> Result<Vec<u8>> {
    if iv.len() != cipher.block_size() {
        return Err(CryptoError::invalid(format!(
            "CFB IV must be {} bytes, got {}",
            cipher.block_size(),
            iv.len()
        )));
    }
    Ok(iv.to_vec())
}
