//! Ed25519 signatures in OpenPGP form.
//!
//! OpenPGP signs the hash digest rather than the message, and encodes the
//! 64-byte signature as two MPIs `r` and `s`. Public points use the native
//! `0x40 ‖ A` encoding; the secret is the 32-byte seed stored as an MPI.

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};

use crate::error::{CryptoError, Result};

/// OID of Ed25519 (1.3.6.1.4.1.11591.15.1), without length prefix.
pub const ED25519_OID: [u8; 9] = [0x2B, 0x06, 0x01, 0x04, 0x01, 0xDA, 0x47, 0x0F, 0x01];

/// Seed length.
pub const SEED_SIZE: usize = 32;

/// Sign `digest` with a seed, returning `(r, s)`.
///
/// # Errors
///
/// - `CryptoError::InvalidKeyLength` if the seed MPI is longer than 32 bytes
pub fn sign(seed_mpi: &[u8], digest: &[u8]) -> Result<([u8; 32], [u8; 32])> {
    let key = SigningKey::from_bytes(&seed_from_mpi(seed_mpi)?);
    let signature = key.sign(digest).to_bytes();

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&signature[..32]);
    s.copy_from_slice(&signature[32..]);
    Ok((r, s))
}

/// Verify `(r, s)` over `digest` for a `0x40 ‖ A` public point.
///
/// MPI leading zeros are restored before verification. A malformed point or
/// an invalid signature both yield `Ok(false)`.
///
/// # Errors
///
/// - `CryptoError::InvalidArguments` if `r` or `s` exceed 32 bytes
pub fn verify(point: &[u8], digest: &[u8], r: &[u8], s: &[u8]) -> Result<bool> {
    let mut raw = [0u8; 64];
    left_pad_into(&mut raw[..32], r)?;
    left_pad_into(&mut raw[32..], s)?;

    let Some((&0x40, a)) = point.split_first() else {
        return Ok(false);
    };
    let Ok(a) = <[u8; 32]>::try_from(a) else {
        return Ok(false);
    };
    let Ok(key) = VerifyingKey::from_bytes(&a) else {
        return Ok(false);
    };

    Ok(key.verify(digest, &Signature::from_bytes(&raw)).is_ok())
}

/// Public point `0x40 ‖ A` for a seed MPI.
///
/// # Errors
///
/// - `CryptoError::InvalidKeyLength` if the seed MPI is longer than 32 bytes
pub fn public_point(seed_mpi: &[u8]) -> Result<Vec<u8>> {
    let key = SigningKey::from_bytes(&seed_from_mpi(seed_mpi)?);
    let mut out = Vec::with_capacity(33);
    out.push(0x40);
    out.extend_from_slice(key.verifying_key().as_bytes());
    Ok(out)
}

fn seed_from_mpi(mpi: &[u8]) -> Result<[u8; SEED_SIZE]> {
    let mut seed = [0u8; SEED_SIZE];
    left_pad_into(&mut seed, mpi)
        .map_err(|_| CryptoError::InvalidKeyLength { expected: SEED_SIZE, actual: mpi.len() })?;
    Ok(seed)
}

fn left_pad_into(dst: &mut [u8], src: &[u8]) -> Result<()> {
    if src.len() > dst.len() {
        return Err(CryptoError::invalid(format!(
            "value of {} bytes exceeds {} byte field",
            src.len(),
            dst.len()
        )));
    }
    let offset = dst.len() - src.len();
    dst[offset..].copy_from_slice(src);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify() {
        let seed = [5u8; 32];
        let point = public_point(&seed).unwrap();
        let (r, s) = sign(&seed, b"digest bytes").unwrap();

        assert!(verify(&point, b"digest bytes", &r, &s).unwrap());
        assert!(!verify(&point, b"other digest", &r, &s).unwrap());
    }

    #[test]
    fn stripped_leading_zeros_still_verify() {
        // Search for a signature whose r starts with a zero byte
        let point = public_point(&[1u8; 32]).unwrap();
        for i in 0u16..2048 {
            let msg = i.to_be_bytes();
            let (r, s) = sign(&[1u8; 32], &msg).unwrap();
            if r[0] == 0 {
                assert!(verify(&point, &msg, &r[1..], &s).unwrap());
                return;
            }
        }
    }

    #[test]
    fn malformed_point_is_false_not_error() {
        let (r, s) = sign(&[5u8; 32], b"d").unwrap();
        assert!(!verify(&[0x04; 33], b"d", &r, &s).unwrap());
        assert!(!verify(&[], b"d", &r, &s).unwrap());
    }

    #[test]
    fn rfc8032_test_vector_one_public_key() {
        let seed = hex::decode("9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60")
            .unwrap();
        let point = public_point(&seed).unwrap();
        assert_eq!(
            hex::encode(&point[1..]),
            "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a"
        );
    }
}
