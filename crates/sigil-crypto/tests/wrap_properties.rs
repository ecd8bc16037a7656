//! Property-based tests for session-key wrapping primitives
//!
//! Exercises the key wrap, CFB and S2K paths over arbitrary inputs rather than
//! fixed vectors. The integrity property matters most: no single-bit
//! corruption of a wrapped key may unwrap successfully.

use proptest::prelude::*;
use sigil_crypto::{
    AesKeyWrap, BlockCipher, CryptoError, HashAlgorithm, S2k, SymmetricAlgorithm, cfb, ecdh,
};

/// Strategy for AES key-encryption keys of every supported size
fn arbitrary_kek() -> impl Strategy<Value = (SymmetricAlgorithm, Vec<u8>)> {
    prop_oneof![
        Just(SymmetricAlgorithm::Aes128),
        Just(SymmetricAlgorithm::Aes192),
        Just(SymmetricAlgorithm::Aes256),
    ]
    .prop_flat_map(|alg| {
        let size = alg.key_size().unwrap_or(16);
        (Just(alg), prop::collection::vec(any::<u8>(), size))
    })
}

/// Strategy for key data accepted by RFC3394 (>= 16 bytes, multiple of 8)
fn arbitrary_key_data() -> impl Strategy<Value = Vec<u8>> {
    (2usize..8).prop_flat_map(|blocks| prop::collection::vec(any::<u8>(), blocks * 8))
}

#[test]
fn prop_key_wrap_unwrap_is_identity() {
    proptest!(|((alg, kek) in arbitrary_kek(), key in arbitrary_key_data())| {
        let wrapper = AesKeyWrap::new(alg, &kek).expect("AES kek");
        let wrapped = wrapper.wrap(&key).expect("valid key data");

        // PROPERTY: Wrapping adds exactly one semiblock and unwrap inverts it
        prop_assert_eq!(wrapped.len(), key.len() + 8);
        let unwrapped = wrapper.unwrap(&wrapped).expect("untouched ciphertext");
        prop_assert_eq!(&unwrapped[..], &key[..], "unwrap(wrap(k)) != k");
    });
}

#[test]
fn prop_key_wrap_detects_any_bit_flip() {
    proptest!(|(
        (alg, kek) in arbitrary_kek(),
        key in arbitrary_key_data(),
        bit in any::<prop::sample::Index>(),
    )| {
        let wrapper = AesKeyWrap::new(alg, &kek).expect("AES kek");
        let mut wrapped = wrapper.wrap(&key).expect("valid key data");

        let bit = bit.index(wrapped.len() * 8);
        wrapped[bit / 8] ^= 1 << (bit % 8);

        // PROPERTY: Corruption is an integrity failure, never silent success
        let result = wrapper.unwrap(&wrapped);
        prop_assert!(
            matches!(result, Err(CryptoError::InvalidArguments { .. })),
            "flipped bit {} unwrapped successfully",
            bit
        );
    });
}

#[test]
fn prop_cfb_round_trip_preserves_length() {
    proptest!(|(
        key in prop::collection::vec(any::<u8>(), 32),
        iv in prop::collection::vec(any::<u8>(), 16),
        data in prop::collection::vec(any::<u8>(), 0..256),
    )| {
        let cipher = BlockCipher::new(SymmetricAlgorithm::Aes256, &key).expect("AES-256 key");
        let ciphertext = cfb::encrypt(&cipher, &iv, &data).expect("16 byte IV");

        // PROPERTY: CFB is length-preserving and self-inverse under the same IV
        prop_assert_eq!(ciphertext.len(), data.len());
        prop_assert_eq!(cfb::decrypt(&cipher, &iv, &ciphertext).expect("16 byte IV"), data);
    });
}

#[test]
fn prop_s2k_is_deterministic_and_salt_sensitive() {
    proptest!(|(
        pass in prop::collection::vec(any::<u8>(), 0..64),
        salt in any::<[u8; 8]>(),
        other_salt in any::<[u8; 8]>(),
    )| {
        prop_assume!(salt != other_salt);
        let s2k = S2k::Iterated { hash: HashAlgorithm::Sha256, salt, count: 0 };
        let other = S2k::Iterated { hash: HashAlgorithm::Sha256, salt: other_salt, count: 0 };

        // PROPERTY: Same specifier and passphrase yield the same key
        let a = s2k.derive_key(&pass, 32).expect("SHA-256 supported");
        let b = s2k.derive_key(&pass, 32).expect("SHA-256 supported");
        prop_assert_eq!(&a[..], &b[..]);

        // PROPERTY: Changing only the salt changes the key
        let c = other.derive_key(&pass, 32).expect("SHA-256 supported");
        prop_assert_ne!(&a[..], &c[..]);
    });
}

#[test]
fn prop_ecdh_padding_round_trip() {
    proptest!(|(data in prop::collection::vec(any::<u8>(), 0..64))| {
        let padded = ecdh::pad(&data);

        // PROPERTY: Padded length is a multiple of 8, at least 40, and unpads
        prop_assert_eq!(padded.len() % 8, 0);
        prop_assert!(padded.len() >= ecdh::PADDED_SIZE);
        prop_assert_eq!(ecdh::unpad(&padded).expect("own padding"), &data[..]);
    });
}
