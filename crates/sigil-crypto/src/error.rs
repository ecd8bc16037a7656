//! Error types for cryptographic primitives.

use thiserror::Error;

/// Result alias for primitive operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors produced by the primitives layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Inputs violate a precondition or an integrity check failed
    #[error("invalid arguments: {reason}")]
    InvalidArguments {
        /// What was wrong with the input
        reason: String,
    },

    /// Algorithm or mode is recognised but has no implementation here
    #[error("unsupported: {what}")]
    Unsupported {
        /// Description of the missing capability
        what: String,
    },

    /// Encoded structure (S2K specifier, padding) could not be decoded
    #[error("malformed input: {reason}")]
    Malformed {
        /// What failed to decode
        reason: String,
    },

    /// Key material had the wrong length for the selected algorithm
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Required key length
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },
}

impl CryptoError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArguments { reason: reason.into() }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed { reason: reason.into() }
    }

    pub(crate) fn unsupported(what: impl Into<String>) -> Self {
        Self::Unsupported { what: what.into() }
    }
}
