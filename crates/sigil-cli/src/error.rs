//! CLI error type.

use thiserror::Error;

/// Result alias for the CLI.
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors reported by `sigil` subcommands.
#[derive(Error, Debug)]
pub enum CliError {
    /// Reading or writing a file failed
    #[error("{path}: {source}")]
    Io {
        /// File, or `<stdin>` / `<stdout>`
        path: String,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// The message engine rejected the input
    #[error(transparent)]
    Engine(#[from] sigil_core::Error),

    /// A primitive rejected its arguments
    #[error(transparent)]
    Crypto(#[from] sigil_crypto::CryptoError),

    /// Key wrap input or key material was not hex
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Arguments that parse but cannot be acted on
    #[error("{0}")]
    Usage(String),
}
