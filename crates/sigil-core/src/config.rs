//! Tunables for parsing and message construction.

use std::time::Duration;

use sigil_crypto::{CompressionAlgorithm, SymmetricAlgorithm};

/// Message construction configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on a single recipient's session-key wrap. `None` waits
    /// indefinitely (cancellation still applies).
    pub recipient_timeout: Option<Duration>,
    /// Cipher for the session key and the encrypted data packet
    pub symmetric_algorithm: SymmetricAlgorithm,
    /// Compression applied to the literal (and one-pass signed) packets
    pub compression: CompressionAlgorithm,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            recipient_timeout: Some(Duration::from_secs(30)),
            symmetric_algorithm: SymmetricAlgorithm::DEFAULT,
            compression: CompressionAlgorithm::DEFAULT,
        }
    }
}

/// Block parsing configuration.
#[derive(Debug, Clone)]
pub struct ParseConfig {
    /// Skip to the next primary key when a transferable key fails to parse
    pub skip_invalid_keys: bool,
    /// Deepest allowed nesting of compressed messages
    pub max_compression_depth: usize,
    /// Largest decompressed body accepted from one compressed packet
    pub max_decompressed_len: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self { skip_invalid_keys: false, max_compression_depth: 20, max_decompressed_len: 64 << 20 }
    }
}
