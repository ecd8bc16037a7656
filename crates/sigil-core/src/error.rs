//! Error taxonomy for block parsing, message construction and decryption.
//!
//! Parse-time errors abort the enclosing call. Construction errors fail the
//! whole asynchronous result and cancel outstanding recipient tasks.
//! Verification failures are never returned from decryption; they are carried
//! in the result value instead (see [`crate::VerifyResult`]).

use std::time::Duration;

use sigil_crypto::CryptoError;
use sigil_proto::{KeyId, ProtocolError};
use thiserror::Error;

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the message engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed or truncated input, or a packet sequence that violates the
    /// block grammar
    #[error("parse error: {0}")]
    Parse(String),

    /// An internal invariant was violated while emitting bytes
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Valid input naming an algorithm or version with no implementation
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A protected secret key was needed and no passphrase was supplied
    #[error("missing passphrase")]
    MissingPassphrase,

    /// The supplied passphrase did not unlock the secret key
    #[error("wrong passphrase")]
    WrongPassphrase,

    /// A signature did not verify
    #[error("signature error: {0}")]
    Signature(String),

    /// A signature verified but is past its expiration time
    #[error("signature by {issuer} expired at {expired_at}")]
    SignatureExpired {
        /// Issuer key id
        issuer: KeyId,
        /// Expiration instant in seconds since the epoch
        expired_at: u64,
    },

    /// Caller error or integrity failure inside a primitive
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Encrypted data could not be opened
    #[error("decryption failed: {0}")]
    Decrypt(String),

    /// Construction was cancelled before every recipient was wrapped
    #[error("operation cancelled")]
    Cancelled,

    /// A recipient wrap did not finish in time
    #[error("recipient {recipient} timed out after {after:?}")]
    Timeout {
        /// Position of the recipient in the caller's list
        recipient: usize,
        /// Configured limit
        after: Duration,
    },
}

impl Error {
    /// True if asking the user again may succeed.
    ///
    /// Only passphrase errors are recoverable; everything else is a property
    /// of the input or the configuration.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MissingPassphrase | Self::WrongPassphrase)
    }

    pub(crate) fn parse(reason: impl Into<String>) -> Self {
        Self::Parse(reason.into())
    }
}

/// Protocol framing errors become parse errors; passphrase, integrity and
/// availability errors keep their kind.
impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Truncated { .. }
            | ProtocolError::InvalidHeader(_)
            | ProtocolError::UnknownTag(_)
            | ProtocolError::Malformed { .. } => Self::Parse(err.to_string()),
            ProtocolError::Unsupported(what) => Self::Unsupported(what),
            ProtocolError::IntegrityCheckFailed => Self::Decrypt(err.to_string()),
            ProtocolError::MissingPassphrase => Self::MissingPassphrase,
            ProtocolError::WrongPassphrase => Self::WrongPassphrase,
            ProtocolError::Serialization(reason) => Self::Serialization(reason),
            ProtocolError::InvalidArguments(reason) => Self::InvalidArguments(reason),
        }
    }
}

impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Malformed { reason } => Self::Parse(reason),
            CryptoError::Unsupported { what } => Self::Unsupported(what),
            CryptoError::InvalidArguments { reason } => Self::InvalidArguments(reason),
            CryptoError::InvalidKeyLength { .. } => Self::InvalidArguments(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_passphrase_errors_are_recoverable() {
        assert!(Error::MissingPassphrase.is_recoverable());
        assert!(Error::WrongPassphrase.is_recoverable());
        assert!(!Error::Parse("x".into()).is_recoverable());
        assert!(!Error::Cancelled.is_recoverable());
    }

    #[test]
    fn protocol_errors_map_by_kind() {
        assert!(matches!(Error::from(ProtocolError::UnknownTag(20)), Error::Parse(_)));
        assert_eq!(Error::from(ProtocolError::WrongPassphrase), Error::WrongPassphrase);
        assert!(matches!(Error::from(ProtocolError::IntegrityCheckFailed), Error::Decrypt(_)));
        assert_eq!(
            Error::from(ProtocolError::Unsupported("bzip2".into())),
            Error::Unsupported("bzip2".into())
        );
    }

    #[test]
    fn error_messages() {
        insta::assert_snapshot!(
            Error::from(ProtocolError::UnknownTag(20)),
            @"parse error: unknown packet tag 20"
        );
        insta::assert_snapshot!(
            Error::SignatureExpired { issuer: KeyId::new([0xAB; 8]), expired_at: 10 },
            @"signature by ABABABABABABABAB expired at 10"
        );
        insta::assert_snapshot!(
            Error::Timeout { recipient: 2, after: Duration::from_millis(50) },
            @"recipient 2 timed out after 50ms"
        );
    }
}
