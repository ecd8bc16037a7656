//! Shared fixtures for sigil-core integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sigil_core::{AlgorithmRegistry, Environment, KeyGenerator, SigningKey, TransferableKey};
use sigil_proto::PublicKey;

/// Fixed wall clock for seeded runs.
pub const NOW: u64 = 1_700_000_000;

/// Deterministic environment: seeded ChaCha RNG and a frozen clock.
#[derive(Debug, Clone)]
pub struct SeededEnv {
    rng: Arc<Mutex<ChaCha8Rng>>,
    now: u64,
}

impl SeededEnv {
    pub fn new(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))), now: NOW }
    }
}

impl Environment for SeededEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().expect("rng lock poisoned").fill_bytes(buffer);
    }

    fn wall_clock_secs(&self) -> u64 {
        self.now
    }
}

/// Generate an unprotected key for `user_id`.
pub async fn generate_key(env: &SeededEnv, user_id: &str) -> TransferableKey {
    KeyGenerator::new(env.clone(), AlgorithmRegistry::standard())
        .generate(user_id, None)
        .await
        .expect("key generation should succeed")
}

/// Encryption subkeys of `keys`, in order.
pub fn encryption_keys(keys: &[TransferableKey]) -> Vec<PublicKey> {
    keys.iter().map(|key| key.key_to_encrypt().expect("key can encrypt").clone()).collect()
}

/// Unlocked primary key of an unprotected transferable key.
pub fn signing_key(key: &TransferableKey) -> SigningKey {
    let secret = key.secret_key_by_id(key.key_id()).expect("secret primary key");
    SigningKey::unlock(secret, None).expect("unprotected key unlocks")
}
