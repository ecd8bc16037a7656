//! Sigil Core
//!
//! The OpenPGP message engine above the packet codec: block grammar,
//! one-pass signature linking, encrypted message construction and
//! decryption, ASCII armor and cleartext signatures.
//!
//! # Architecture
//!
//! ```text
//! text ──armor──▶ bytes ──PacketCodec──▶ [Packet] ──grammar──▶ [Block]
//!                                                     │
//!                                         SignatureLinker (one-pass)
//!
//! LiteralData ──CipherOrchestrator──▶ Message { ESK*, SEIPD }
//!                  │
//!                  └─ JoinSet: one SessionKeyWrapper task per recipient
//! ```
//!
//! # Components
//!
//! - [`block`]: block variants and the cursor-based grammar
//! - [`linker`]: binds one-pass headers to their trailing signatures (LIFO)
//! - [`orchestrator`]: concurrent, cancellable message construction
//! - [`decrypt`]: session key recovery and message opening
//! - [`registry`]: pluggable session-key wrappers and signers
//! - [`armor`] and [`clearsign`]: text transport
//!
//! Parsing is synchronous and pure. The only shared state is the frozen
//! algorithm and packet registries.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod algorithms;
pub mod armor;
pub mod block;
pub mod clearsign;
pub mod config;
pub mod decrypt;
pub mod env;
pub mod error;
pub mod keygen;
pub mod linker;
pub mod orchestrator;
pub mod registry;
pub mod signing;
pub mod system_env;

use bytes::Bytes;
use sigil_proto::PacketCodec;

pub use block::{Block, Message, MessageBody, TransferableKey, VerifyResult};
pub use clearsign::ClearSignMessage;
pub use config::{OrchestratorConfig, ParseConfig};
pub use decrypt::{Decrypted, Decryptor, PassphraseProvider, PassphraseRequest, StaticPassphrases};
pub use env::Environment;
pub use error::{Error, Result};
pub use keygen::KeyGenerator;
pub use orchestrator::CipherOrchestrator;
pub use registry::{AlgorithmRegistry, AlgorithmRegistryBuilder, SessionKeyWrapper, Signer};
pub use signing::SigningKey;
pub use system_env::SystemEnv;

/// Every block in a binary packet stream.
///
/// # Errors
///
/// - `Error::Parse` for framing errors or packet sequences that form no block
pub fn parse_bytes_multi(data: &[u8]) -> Result<Vec<Block>> {
    let packets = PacketCodec::standard().parse_all(&Bytes::copy_from_slice(data))?;
    block::parse_blocks(&packets)
}

/// The first block in a binary packet stream.
///
/// # Errors
///
/// See [`parse_bytes_multi`]; also `Error::Parse` if there is no block.
pub fn parse_bytes(data: &[u8]) -> Result<Block> {
    first(parse_bytes_multi(data)?)
}

/// Every block in armored text, cleartext-signed sections included.
///
/// # Errors
///
/// - `Error::Parse` for malformed armor or packet sequences that form no
///   block
pub fn parse_ascii_multi(text: &str) -> Result<Vec<Block>> {
    let mut blocks = Vec::new();
    for section in armor::parse_all(text)? {
        match section {
            armor::Armored::Packets(armor) => blocks.extend(parse_bytes_multi(&armor.data)?),
            armor::Armored::ClearSigned { headers, text, signature } => {
                let message = ClearSignMessage::from_armor(&headers, &text, &signature)?;
                blocks.push(Block::ClearSign(message));
            },
        }
    }
    Ok(blocks)
}

/// The first block in armored text.
///
/// # Errors
///
/// See [`parse_ascii_multi`]; also `Error::Parse` if there is no block.
pub fn parse_ascii(text: &str) -> Result<Block> {
    first(parse_ascii_multi(text)?)
}

/// Transferable keys from armored or binary input.
///
/// Invalid key blocks are skipped when `config.skip_invalid_keys` is set.
///
/// # Errors
///
/// - `Error::Parse` for malformed armor or framing, or an invalid key block
///   when not skipping
pub fn parse_keys(input: &[u8], config: &ParseConfig) -> Result<Vec<TransferableKey>> {
    let sections = match std::str::from_utf8(input) {
        Ok(text) if text.trim_start().starts_with("-----BEGIN PGP ") => armor::parse_all(text)?
            .into_iter()
            .filter_map(|section| match section {
                armor::Armored::Packets(armor) => Some(armor.data),
                armor::Armored::ClearSigned { .. } => None,
            })
            .collect(),
        _ => vec![Bytes::copy_from_slice(input)],
    };

    let mut keys = Vec::new();
    for data in sections {
        let packets = PacketCodec::standard().parse_all(&data)?;
        keys.extend(block::parse_all_transferable_keys(&packets, config.skip_invalid_keys)?);
    }
    Ok(keys)
}

fn first(blocks: Vec<Block>) -> Result<Block> {
    blocks.into_iter().next().ok_or_else(|| Error::parse("no block found"))
}
