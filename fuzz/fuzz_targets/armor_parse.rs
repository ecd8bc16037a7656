//! Fuzz target for ASCII armor and cleartext signatures
//!
//! Arbitrary text after an armor header line, looking for:
//! - Panics on malformed header or checksum lines
//! - Slicing errors on multi-byte characters
//! - Cleartext sections without a terminating signature
//!
//! The armor reader should NEVER panic.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let body = String::from_utf8_lossy(data);
    let _ = sigil_core::armor::parse_all(&body);

    for label in ["MESSAGE", "SIGNED MESSAGE"] {
        let text = format!("-----BEGIN PGP {label}-----\n{body}");
        let _ = sigil_core::parse_ascii_multi(&text);
    }
});
