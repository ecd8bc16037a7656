//! Fuzz target for PacketCodec framing and packet bodies
//!
//! Arbitrary bytes through header/length framing and every registered packet
//! decoder, looking for:
//! - Panics on truncated headers or partial-length chunks
//! - Length arithmetic that overflows or over-reads
//! - Encodings that do not survive a re-encode
//!
//! The codec should NEVER panic. Invalid input returns an error.

#![no_main]

use bytes::{Bytes, BytesMut};
use libfuzzer_sys::fuzz_target;
use sigil_proto::PacketCodec;

fuzz_target!(|data: &[u8]| {
    let codec = PacketCodec::standard();
    let Ok(packets) = codec.parse_all(&Bytes::copy_from_slice(data)) else { return };

    // Whatever decoded must re-encode and decode to the same packets
    let mut buf = BytesMut::new();
    for packet in &packets {
        if packet.encode(&mut buf).is_err() {
            return;
        }
    }
    let reparsed = codec.parse_all(&buf.freeze()).expect("re-encoded packets must decode");
    assert_eq!(reparsed, packets);
});
