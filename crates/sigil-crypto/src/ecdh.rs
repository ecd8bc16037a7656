//! ECDH session-key wrapping over Curve25519 (RFC6637, RFC7748).
//!
//! ```text
//! ephemeral scalar ──► X25519(recipient point) ──► shared secret Z
//!                                                        │
//!   KDF(Z, curve OID, KDF params, recipient fingerprint) ▼
//!                                                       KEK
//!                                                        │
//!   pad40(algo ‖ session key ‖ checksum) ──► RFC3394 wrap ──► C
//! ```
//!
//! Points are encoded as `0x40 ‖ u-coordinate` (native little-endian). Secret
//! scalars in OpenPGP key packets are stored byte-reversed; see
//! [`secret_from_mpi`].

use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::{
    algorithm::{HashAlgorithm, PublicKeyAlgorithm, SymmetricAlgorithm},
    error::{CryptoError, Result},
    hash::Hasher,
    key_wrap::AesKeyWrap,
};

/// OID of Curve25519 for ECDH (1.3.6.1.4.1.3029.1.5.1), without length prefix.
pub const CURVE25519_OID: [u8; 10] = [0x2B, 0x06, 0x01, 0x04, 0x01, 0x97, 0x55, 0x01, 0x05, 0x01];

/// Prefix byte of a native-format Curve25519 point.
pub const POINT_PREFIX: u8 = 0x40;

/// Size of a raw X25519 scalar or u-coordinate.
pub const X25519_SIZE: usize = 32;

/// Padded plaintext size before key wrapping.
pub const PADDED_SIZE: usize = 40;

const ANONYMOUS_SENDER: &[u8; 20] = b"Anonymous Sender    ";

/// KDF parameters carried in ECDH public key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Digest for the single-step KDF
    pub hash: HashAlgorithm,
    /// AES variant used to wrap the session key
    pub cipher: SymmetricAlgorithm,
}

impl KdfParams {
    /// Encoded as `03 01 hash cipher`.
    #[must_use]
    pub fn to_bytes(self) -> [u8; 4] {
        [3, 1, self.hash.id(), self.cipher.id()]
    }

    /// Decode `03 01 hash cipher`.
    ///
    /// # Errors
    ///
    /// - `CryptoError::Malformed` if the length or reserved byte is wrong
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [3, 1, hash, cipher] => {
                Ok(Self { hash: HashAlgorithm::from(*hash), cipher: SymmetricAlgorithm::from(*cipher) })
            },
            _ => Err(CryptoError::malformed("invalid ECDH KDF parameters")),
        }
    }
}

/// Output of [`wrap`]: the two PK-ESK fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKey {
    /// Ephemeral public point, `0x40 ‖ u`
    pub ephemeral_point: Vec<u8>,
    /// RFC3394-wrapped padded session key
    pub wrapped: Vec<u8>,
}

/// Wrap a session-key plaintext for a Curve25519 recipient.
///
/// `ephemeral_scalar` must be 32 fresh random bytes.
///
/// # Errors
///
/// - `CryptoError::InvalidArguments` if the recipient point is malformed
/// - `CryptoError::Unsupported` if the KDF parameters name an unsupported
///   digest or a non-AES cipher
pub fn wrap(
    recipient_point: &[u8],
    params: KdfParams,
    recipient_fingerprint: &[u8],
    ephemeral_scalar: [u8; X25519_SIZE],
    session_plaintext: &[u8],
) -> Result<WrappedKey> {
    let recipient = PublicKey::from(decode_point(recipient_point)?);
    let ephemeral = StaticSecret::from(ephemeral_scalar);
    let shared = ephemeral.diffie_hellman(&recipient);

    let kek = derive_kek(shared.as_bytes(), params, recipient_fingerprint)?;
    let padded = Zeroizing::new(pad(session_plaintext));
    let wrapped = AesKeyWrap::new(params.cipher, &kek)?.wrap(&padded)?;

    Ok(WrappedKey { ephemeral_point: encode_point(PublicKey::from(&ephemeral).as_bytes()), wrapped })
}

/// Recover a session-key plaintext with the recipient's secret scalar.
///
/// # Errors
///
/// - `CryptoError::InvalidArguments` for malformed points or a failed key
///   wrap integrity check
/// - `CryptoError::Malformed` if the unwrapped padding is invalid
pub fn unwrap(
    secret_scalar: &[u8; X25519_SIZE],
    ephemeral_point: &[u8],
    params: KdfParams,
    recipient_fingerprint: &[u8],
    wrapped: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let ephemeral = PublicKey::from(decode_point(ephemeral_point)?);
    let secret = StaticSecret::from(*secret_scalar);
    let shared = secret.diffie_hellman(&ephemeral);

    let kek = derive_kek(shared.as_bytes(), params, recipient_fingerprint)?;
    let padded = AesKeyWrap::new(params.cipher, &kek)?.unwrap(wrapped)?;
    unpad(&padded).map(|m| Zeroizing::new(m.to_vec()))
}

/// Public point for a secret scalar, in `0x40 ‖ u` form.
#[must_use]
pub fn public_point(secret_scalar: &[u8; X25519_SIZE]) -> Vec<u8> {
    let secret = StaticSecret::from(*secret_scalar);
    encode_point(PublicKey::from(&secret).as_bytes())
}

/// Convert the MPI encoding of a Curve25519 secret (big-endian, leading zeros
/// stripped) to a native scalar.
///
/// # Errors
///
/// - `CryptoError::InvalidKeyLength` if the MPI is longer than 32 bytes
pub fn secret_from_mpi(mpi: &[u8]) -> Result<Zeroizing<[u8; X25519_SIZE]>> {
    if mpi.len() > X25519_SIZE {
        return Err(CryptoError::InvalidKeyLength { expected: X25519_SIZE, actual: mpi.len() });
    }
    let mut scalar = Zeroizing::new([0u8; X25519_SIZE]);
    for (dst, src) in scalar.iter_mut().zip(mpi.iter().rev()) {
        *dst = *src;
    }
    Ok(scalar)
}

/// Inverse of [`secret_from_mpi`]: big-endian bytes for the MPI body.
#[must_use]
pub fn secret_to_mpi(scalar: &[u8; X25519_SIZE]) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(scalar.iter().rev().copied().collect())
}

/// PKCS#5-style padding to 40 bytes (or the next multiple of 8 beyond).
#[must_use]
pub fn pad(data: &[u8]) -> Vec<u8> {
    let target = if data.len() < PADDED_SIZE { PADDED_SIZE } else { (data.len() / 8 + 1) * 8 };
    let fill = target - data.len();
    let mut out = Vec::with_capacity(target);
    out.extend_from_slice(data);
    // fill is at most 40, always fits a byte
    out.resize(target, fill as u8);
    out
}

/// Strip padding added by [`pad`].
///
/// # Errors
///
/// - `CryptoError::Malformed` unless every padding byte equals the padding
///   length
pub fn unpad(data: &[u8]) -> Result<&[u8]> {
    let Some(&fill) = data.last() else {
        return Err(CryptoError::malformed("empty padded session key"));
    };
    let fill = usize::from(fill);
    if fill == 0 || fill > data.len() {
        return Err(CryptoError::malformed("invalid session key padding"));
    }
    let (body, padding) = data.split_at(data.len() - fill);
    if padding.iter().any(|&b| usize::from(b) != fill) {
        return Err(CryptoError::malformed("invalid session key padding"));
    }
    Ok(body)
}

fn derive_kek(
    shared: &[u8],
    params: KdfParams,
    fingerprint: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let key_len = params.cipher.key_size()?;

    let mut hasher = Hasher::new(params.hash)?;
    hasher.update(&[0, 0, 0, 1]);
    hasher.update(shared);
    hasher.update(&[CURVE25519_OID.len() as u8]);
    hasher.update(&CURVE25519_OID);
    hasher.update(&[PublicKeyAlgorithm::Ecdh.id()]);
    hasher.update(&params.to_bytes());
    hasher.update(ANONYMOUS_SENDER);
    hasher.update(fingerprint);

    let mut digest = Zeroizing::new(hasher.finalize());
    if digest.len() < key_len {
        return Err(CryptoError::unsupported("KDF digest shorter than key-wrap key"));
    }
    digest.truncate(key_len);
    Ok(digest)
}

fn decode_point(point: &[u8]) -> Result<[u8; X25519_SIZE]> {
    match point {
        [POINT_PREFIX, rest @ ..] => rest
            .try_into()
            .map_err(|_| CryptoError::invalid("Curve25519 point must be 33 bytes")),
        _ => Err(CryptoError::invalid("Curve25519 point must use native 0x40 prefix")),
    }
}

fn encode_point(u: &[u8; X25519_SIZE]) -> Vec<u8> {
    let mut out = Vec::with_capacity(X25519_SIZE + 1);
    out.push(POINT_PREFIX);
    out.extend_from_slice(u);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: KdfParams =
        KdfParams { hash: HashAlgorithm::Sha256, cipher: SymmetricAlgorithm::Aes128 };

    #[test]
    fn wrap_then_unwrap_recovers_plaintext() {
        let recipient_secret = [0x11u8; 32];
        let point = public_point(&recipient_secret);
        let fingerprint = [0xAB; 20];
        let plaintext = [9u8; 35];

        let wrapped = wrap(&point, PARAMS, &fingerprint, [0x22; 32], &plaintext).unwrap();
        assert_eq!(wrapped.ephemeral_point.len(), 33);
        assert_eq!(wrapped.wrapped.len(), PADDED_SIZE + 8);

        let recovered =
            unwrap(&recipient_secret, &wrapped.ephemeral_point, PARAMS, &fingerprint, &wrapped.wrapped)
                .unwrap();
        assert_eq!(&recovered[..], &plaintext[..]);
    }

    #[test]
    fn wrong_fingerprint_fails_integrity_check() {
        let recipient_secret = [0x11u8; 32];
        let point = public_point(&recipient_secret);
        let wrapped = wrap(&point, PARAMS, &[1; 20], [0x22; 32], &[0; 35]).unwrap();

        let result =
            unwrap(&recipient_secret, &wrapped.ephemeral_point, PARAMS, &[2; 20], &wrapped.wrapped);
        assert!(matches!(result, Err(CryptoError::InvalidArguments { .. })));
    }

    #[test]
    fn padding_rules() {
        assert_eq!(pad(&[0; 35]).len(), 40);
        assert_eq!(pad(&[0; 40]).len(), 48);
        assert_eq!(unpad(&pad(&[7; 35])).unwrap(), &[7; 35]);
        assert!(unpad(&[1, 2, 3, 2]).is_err());
        assert!(unpad(&[0; 8]).is_err());
    }

    #[test]
    fn mpi_scalar_conversion_reverses_bytes() {
        let mut scalar = [0u8; 32];
        scalar[0] = 0x48;
        scalar[31] = 0x01;
        let mpi = secret_to_mpi(&scalar);
        assert_eq!(mpi[0], 0x01);
        assert_eq!(*secret_from_mpi(&mpi).unwrap(), scalar);
    }

    #[test]
    fn kdf_params_encoding() {
        assert_eq!(PARAMS.to_bytes(), [3, 1, 8, 7]);
        assert_eq!(KdfParams::from_bytes(&[3, 1, 8, 7]).unwrap(), PARAMS);
        assert!(KdfParams::from_bytes(&[3, 2, 8, 7]).is_err());
    }
}
