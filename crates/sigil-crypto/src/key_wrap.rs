//! AES Key Wrap (RFC3394).
//!
//! Used by ECDH session-key wrapping. The 64-bit integrity check value is the
//! fixed IV `A6A6A6A6A6A6A6A6`; unwrap refuses to release any key bytes
//! unless the recovered IV matches it exactly.

use zeroize::Zeroizing;

use crate::{
    algorithm::SymmetricAlgorithm,
    cipher::BlockCipher,
    error::{CryptoError, Result},
};

/// RFC3394 default initial value.
pub const IV: [u8; 8] = [0xA6; 8];

const SEMIBLOCK: usize = 8;

/// AES key-encryption-key wrapper.
pub struct AesKeyWrap {
    cipher: BlockCipher,
}

impl AesKeyWrap {
    /// Key the wrapper with a key-encryption key.
    ///
    /// # Errors
    ///
    /// - `CryptoError::Unsupported` unless `algorithm` is AES-128/192/256
    /// - `CryptoError::InvalidKeyLength` if `kek` does not fit the algorithm
    pub fn new(algorithm: SymmetricAlgorithm, kek: &[u8]) -> Result<Self> {
        if !matches!(
            algorithm,
            SymmetricAlgorithm::Aes128 | SymmetricAlgorithm::Aes192 | SymmetricAlgorithm::Aes256
        ) {
            return Err(CryptoError::unsupported(format!(
                "key wrap requires AES, got algorithm {}",
                algorithm.id()
            )));
        }
        Ok(Self { cipher: BlockCipher::new(algorithm, kek)? })
    }

    /// Wrap `key_data`.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidArguments` if `key_data` is shorter than 16
    ///   bytes or not a multiple of 8
    pub fn wrap(&self, key_data: &[u8]) -> Result<Vec<u8>> {
        if key_data.len() < 2 * SEMIBLOCK || key_data.len() % SEMIBLOCK != 0 {
            return Err(CryptoError::invalid(format!(
                "key data must be a multiple of 8 and at least 16 bytes, got {}",
                key_data.len()
            )));
        }

        let n = key_data.len() / SEMIBLOCK;
        let mut a = IV;
        let mut r = Zeroizing::new(key_data.to_vec());
        let mut block = Zeroizing::new([0u8; 16]);

        for j in 0..6 {
            for i in 0..n {
                let ri = &mut r[i * SEMIBLOCK..(i + 1) * SEMIBLOCK];
                block[..SEMIBLOCK].copy_from_slice(&a);
                block[SEMIBLOCK..].copy_from_slice(ri);
                self.cipher.encrypt_block(&mut block[..]);

                let t = (n * j + i + 1) as u64;
                a.copy_from_slice(&block[..SEMIBLOCK]);
                xor_counter(&mut a, t);
                ri.copy_from_slice(&block[SEMIBLOCK..]);
            }
        }

        let mut out = Vec::with_capacity(key_data.len() + SEMIBLOCK);
        out.extend_from_slice(&a);
        out.extend_from_slice(&r);
        Ok(out)
    }

    /// Unwrap `wrapped`, verifying the integrity IV.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidArguments` if the input length is invalid or
    ///   the recovered IV does not match [`IV`]
    pub fn unwrap(&self, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if wrapped.len() < 3 * SEMIBLOCK || wrapped.len() % SEMIBLOCK != 0 {
            return Err(CryptoError::invalid(format!(
                "wrapped data must be a multiple of 8 and at least 24 bytes, got {}",
                wrapped.len()
            )));
        }

        let n = wrapped.len() / SEMIBLOCK - 1;
        let mut a = [0u8; SEMIBLOCK];
        a.copy_from_slice(&wrapped[..SEMIBLOCK]);
        let mut r = Zeroizing::new(wrapped[SEMIBLOCK..].to_vec());
        let mut block = Zeroizing::new([0u8; 16]);

        for j in (0..6).rev() {
            for i in (0..n).rev() {
                let t = (n * j + i + 1) as u64;
                xor_counter(&mut a, t);

                let ri = &mut r[i * SEMIBLOCK..(i + 1) * SEMIBLOCK];
                block[..SEMIBLOCK].copy_from_slice(&a);
                block[SEMIBLOCK..].copy_from_slice(ri);
                self.cipher.decrypt_block(&mut block[..]);

                a.copy_from_slice(&block[..SEMIBLOCK]);
                ri.copy_from_slice(&block[SEMIBLOCK..]);
            }
        }

        if a != IV {
            return Err(CryptoError::invalid("key wrap integrity check failed"));
        }
        Ok(r)
    }
}

fn xor_counter(a: &mut [u8; SEMIBLOCK], t: u64) {
    for (byte, counter) in a.iter_mut().zip(t.to_be_bytes()) {
        *byte ^= counter;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3394_128_bit_kek_vector() {
        let kek = hex::decode("000102030405060708090A0B0C0D0E0F").unwrap();
        let key = hex::decode("00112233445566778899AABBCCDDEEFF").unwrap();
        let wrapper = AesKeyWrap::new(SymmetricAlgorithm::Aes128, &kek).unwrap();

        let wrapped = wrapper.wrap(&key).unwrap();
        assert_eq!(
            hex::encode_upper(&wrapped),
            "1FA68B0A8112B447AEF34BD8FB5A7B829D3E862371D2CFE5"
        );
        assert_eq!(*wrapper.unwrap(&wrapped).unwrap(), key);
    }

    #[test]
    fn rfc3394_256_bit_kek_256_bit_key_vector() {
        let kek = hex::decode("000102030405060708090A0B0C0D0E0F101112131415161718191A1B1C1D1E1F")
            .unwrap();
        let key = hex::decode("00112233445566778899AABBCCDDEEFF000102030405060708090A0B0C0D0E0F")
            .unwrap();
        let wrapper = AesKeyWrap::new(SymmetricAlgorithm::Aes256, &kek).unwrap();

        assert_eq!(
            hex::encode_upper(wrapper.wrap(&key).unwrap()),
            "28C9F404C4B810F4CBCCB35CFB87F8263F5786E2D80ED326CBC7F0E71A99F43BFB988B9B7A02DD21"
        );
    }

    #[test]
    fn short_or_ragged_input_is_rejected() {
        let wrapper = AesKeyWrap::new(SymmetricAlgorithm::Aes128, &[0; 16]).unwrap();
        assert!(wrapper.wrap(&[0; 8]).is_err());
        assert!(wrapper.wrap(&[0; 20]).is_err());
        assert!(wrapper.unwrap(&[0; 16]).is_err());
    }

    #[test]
    fn non_aes_kek_is_unsupported() {
        let result = AesKeyWrap::new(SymmetricAlgorithm::Cast5, &[0; 16]);
        assert!(matches!(result, Err(CryptoError::Unsupported { .. })));
    }
}
