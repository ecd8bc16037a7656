//! Production environment using the OS RNG and system clock.

use crate::env::Environment;

/// Production environment.
///
/// # Security
///
/// The RNG uses getrandom, which provides OS-level cryptographic randomness.
/// Session keys, salts and ephemeral scalars all come from here.
///
/// # Panics
///
/// Panics if the OS RNG fails. Constructing a message without functioning
/// randomness would produce predictable session keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - keys would be predictable");
    }

    #[allow(clippy::disallowed_methods)]
    #[allow(clippy::expect_used)]
    fn wall_clock_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)")
            .as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_bytes_differ() {
        let env = SystemEnv::new();
        let a: [u8; 32] = env.random_array();
        let b: [u8; 32] = env.random_array();
        assert_ne!(a, b, "Random bytes should differ");
    }

    #[test]
    fn clock_is_past_2020() {
        assert!(SystemEnv::new().wall_clock_secs() > 1_577_836_800);
        assert!(SystemEnv::new().timestamp() > 1_577_836_800);
    }
}
