//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use sigil_crypto::{CompressionAlgorithm, SymmetricAlgorithm};

/// OpenPGP message engine
#[derive(Parser, Debug)]
#[command(name = "sigil")]
#[command(about = "Encrypt, decrypt, sign and inspect OpenPGP messages")]
#[command(version)]
pub struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// `sigil` subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Describe the blocks in an armored or binary file
    Inspect {
        /// Input file (stdin if omitted or `-`)
        input: Option<PathBuf>,
    },
    /// Generate an Ed25519 key with an X25519 encryption subkey
    Keygen(KeygenArgs),
    /// Encrypt (and optionally sign) a file
    Encrypt(EncryptArgs),
    /// Decrypt a message and check its signatures
    Decrypt(DecryptArgs),
    /// RFC3394 AES key wrap
    Keywrap {
        /// Direction
        #[command(subcommand)]
        op: KeywrapOp,
    },
}

/// Arguments of `sigil keygen`.
#[derive(clap::Args, Debug)]
pub struct KeygenArgs {
    /// User id, conventionally `Name <email>`
    #[arg(short, long)]
    pub user_id: String,

    /// Protect the secret key with this passphrase
    #[arg(short, long)]
    pub passphrase: Option<String>,

    /// Secret key output (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also write the public key here
    #[arg(long)]
    pub public_output: Option<PathBuf>,
}

/// Arguments of `sigil encrypt`.
#[derive(clap::Args, Debug)]
pub struct EncryptArgs {
    /// Recipient key file; repeat for several recipients
    #[arg(short, long)]
    pub recipient: Vec<PathBuf>,

    /// Passphrase that can also open the message; repeatable
    #[arg(short, long)]
    pub passphrase: Vec<String>,

    /// Secret key file to sign with
    #[arg(long)]
    pub sign_key: Option<PathBuf>,

    /// Passphrase of the signing key
    #[arg(long, requires = "sign_key")]
    pub sign_passphrase: Option<String>,

    /// Session key cipher
    #[arg(long, value_enum, default_value_t = CipherArg::Aes256)]
    pub cipher: CipherArg,

    /// Compression applied before encryption
    #[arg(long, value_enum, default_value_t = CompressionArg::Zlib)]
    pub compression: CompressionArg,

    /// Per-recipient wrap timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Emit ASCII armor instead of binary
    #[arg(short, long)]
    pub armor: bool,

    /// Plaintext file (stdin if omitted or `-`)
    pub input: Option<PathBuf>,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments of `sigil decrypt`.
#[derive(clap::Args, Debug)]
pub struct DecryptArgs {
    /// Secret key file; repeatable
    #[arg(short, long)]
    pub key: Vec<PathBuf>,

    /// Passphrase to try, for the message or a protected key; repeatable
    #[arg(short, long)]
    pub passphrase: Vec<String>,

    /// Public key file to check signatures against (defaults to `--key`)
    #[arg(long)]
    pub verify_key: Vec<PathBuf>,

    /// Message file, armored or binary (stdin if omitted or `-`)
    pub input: Option<PathBuf>,

    /// Plaintext output (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// `sigil keywrap` directions. Keys and data are hex.
#[derive(Subcommand, Debug)]
pub enum KeywrapOp {
    /// Wrap key data under a key-encryption key
    Wrap {
        /// Key-encryption key: 16, 24 or 32 bytes
        #[arg(long)]
        kek: String,
        /// Key data, a multiple of 8 bytes
        #[arg(long)]
        data: String,
    },
    /// Unwrap and integrity-check wrapped key data
    Unwrap {
        /// Key-encryption key: 16, 24 or 32 bytes
        #[arg(long)]
        kek: String,
        /// Wrapped key data
        #[arg(long)]
        data: String,
    },
}

/// Session key ciphers offered on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherArg {
    /// AES with a 128-bit key
    Aes128,
    /// AES with a 192-bit key
    Aes192,
    /// AES with a 256-bit key
    Aes256,
}

impl From<CipherArg> for SymmetricAlgorithm {
    fn from(arg: CipherArg) -> Self {
        match arg {
            CipherArg::Aes128 => Self::Aes128,
            CipherArg::Aes192 => Self::Aes192,
            CipherArg::Aes256 => Self::Aes256,
        }
    }
}

/// Compression choices offered on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionArg {
    /// Store uncompressed
    None,
    /// Raw deflate
    Zip,
    /// Deflate with a zlib header
    Zlib,
}

impl From<CompressionArg> for CompressionAlgorithm {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::None => Self::Uncompressed,
            CompressionArg::Zip => Self::Zip,
            CompressionArg::Zlib => Self::Zlib,
        }
    }
}
