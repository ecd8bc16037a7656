//! Error types for packet framing and decoding.

use sigil_crypto::CryptoError;
use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while framing, decoding or encoding packets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Input ended before a header or body was complete
    #[error("truncated input: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// First header octet lacks the always-set high bit
    #[error("invalid packet header octet {0:#04x}")]
    InvalidHeader(u8),

    /// Tag has no decoder and is outside the private-use range
    #[error("unknown packet tag {0}")]
    UnknownTag(u8),

    /// Packet body violates its layout
    #[error("malformed {packet} packet: {reason}")]
    Malformed {
        /// Packet kind being decoded
        packet: &'static str,
        /// What was wrong
        reason: String,
    },

    /// Version or algorithm is well-formed but has no implementation
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Encrypted data failed its modification detection check
    #[error("modification detection code mismatch")]
    IntegrityCheckFailed,

    /// Secret key is protected and no passphrase was supplied
    #[error("missing passphrase")]
    MissingPassphrase,

    /// Passphrase did not unlock the secret key
    #[error("wrong passphrase")]
    WrongPassphrase,

    /// Packet cannot be encoded (body too large for any length form)
    #[error("cannot serialize packet: {0}")]
    Serialization(String),

    /// Underlying primitive rejected its arguments
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

impl ProtocolError {
    pub(crate) fn malformed(packet: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed { packet, reason: reason.into() }
    }
}

/// Primitive errors surface as framing errors at this layer.
///
/// Decoding failures inside S2K specifiers or padding are malformed input;
/// missing algorithms stay unsupported.
impl From<CryptoError> for ProtocolError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Malformed { reason } => Self::Malformed { packet: "embedded", reason },
            CryptoError::Unsupported { what } => Self::Unsupported(what),
            CryptoError::InvalidArguments { reason } => Self::InvalidArguments(reason),
            CryptoError::InvalidKeyLength { .. } => Self::InvalidArguments(err.to_string()),
        }
    }
}
