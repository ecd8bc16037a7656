//! Fuzz target for the block grammar
//!
//! Arbitrary packet streams through block parsing and transferable key
//! parsing, looking for panics in cursor handling, one-pass signature
//! linking and nested compression.
//!
//! The grammar should NEVER panic. Sequences that form no block return an
//! error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sigil_core::{ParseConfig, block::MessageBody};

fuzz_target!(|data: &[u8]| {
    if let Ok(blocks) = sigil_core::parse_bytes_multi(data) {
        for block in blocks {
            if let sigil_core::Block::Message(message) = block {
                if matches!(message.body(), MessageBody::Compressed(_)) {
                    let config = ParseConfig { max_decompressed_len: 1 << 20, ..ParseConfig::default() };
                    let _ = message.literal_message(&config);
                }
            }
        }
    }

    let config = ParseConfig { skip_invalid_keys: true, ..ParseConfig::default() };
    let _ = sigil_core::parse_keys(data, &config);
});
