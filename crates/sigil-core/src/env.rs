//! Environment abstraction for deterministic construction.
//!
//! Message construction needs randomness (session keys, S2K salts, CFB
//! prefixes, ephemeral ECDH scalars) and the current time (literal and
//! signature timestamps). Both come from an [`Environment`] so tests can run
//! the orchestrator with a seeded RNG and a fixed clock.

/// Source of randomness and wall-clock time.
///
/// # Invariants
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Given the same seed, a test environment produces the same byte sequence
/// - `wall_clock_secs()` is seconds since the Unix epoch
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Current wall-clock time in seconds since the Unix epoch.
    fn wall_clock_secs(&self) -> u64;

    /// Random fixed-size array.
    fn random_array<const N: usize>(&self) -> [u8; N] {
        let mut out = [0u8; N];
        self.random_bytes(&mut out);
        out
    }

    /// Wall-clock time truncated to the 32-bit field used on the wire.
    fn timestamp(&self) -> u32 {
        u32::try_from(self.wall_clock_secs()).unwrap_or(u32::MAX)
    }
}
