//! Fuzz target for message construction
//!
//! Structured literal messages, optionally compressed, must serialize and
//! parse back to the same block. Failures indicate an encoder and decoder
//! that disagree.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sigil_core::{Block, Message, ParseConfig};
use sigil_crypto::CompressionAlgorithm;

#[derive(Debug, Arbitrary)]
struct Input {
    data: Vec<u8>,
    filename: String,
    timestamp: u32,
    compression: Option<u8>,
}

fuzz_target!(|input: Input| {
    let filename: String = input.filename.chars().take(64).collect();
    let literal = Message::construct_literal(input.data, &filename, input.timestamp);

    let message = match input.compression.map(|c| c % 3) {
        Some(0) => literal.compress(CompressionAlgorithm::Uncompressed),
        Some(1) => literal.compress(CompressionAlgorithm::Zip),
        Some(_) => literal.compress(CompressionAlgorithm::Zlib),
        None => Ok(literal.clone()),
    }
    .expect("literal messages compress");

    let bytes = message.serialize().expect("constructed messages serialize");
    let parsed = sigil_core::parse_bytes(&bytes).expect("serialized messages parse");
    assert_eq!(parsed, Block::Message(message.clone()));

    let unwrapped = message.literal_message(&ParseConfig::default()).expect("compression unwraps");
    assert_eq!(Some(&unwrapped), literal.literal());
});
