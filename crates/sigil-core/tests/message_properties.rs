//! Property-based tests for block parsing, armor and signing.

mod common;

use common::{SeededEnv, generate_key, signing_key};
use proptest::prelude::*;
use sigil_core::{
    AlgorithmRegistry, Block, ClearSignMessage, Message, armor,
    clearsign::{canonicalize, dash_escape, dash_unescape},
};
use sigil_crypto::HashAlgorithm;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

fn text_lines() -> impl Strategy<Value = String> {
    prop::collection::vec("[ -~\t]{0,24}", 0..6).prop_map(|lines| lines.join("\n"))
}

/// Property: A literal message survives serialize → parse unchanged
#[test]
fn prop_literal_block_round_trips() {
    proptest!(|(
        data in prop::collection::vec(any::<u8>(), 0..2048),
        filename in "[a-z0-9._-]{0,40}",
        timestamp in any::<u32>(),
    )| {
        let block = Block::Message(Message::construct_literal(data, &filename, timestamp));
        let bytes = block.serialize()?;
        prop_assert_eq!(sigil_core::parse_bytes(&bytes)?, block);
    });
}

/// Property: Armor encoding is reversible for any payload and label
#[test]
fn prop_armor_round_trips() {
    proptest!(|(
        data in prop::collection::vec(any::<u8>(), 0..1024),
        label in prop::sample::select(vec!["MESSAGE", "PUBLIC KEY BLOCK", "PRIVATE KEY BLOCK", "SIGNATURE"]),
        comment in "[A-Za-z0-9 ]{1,20}",
    )| {
        let headers = vec![("Comment".to_owned(), comment.trim().to_owned())];
        let text = armor::encode(label, &headers, &data);

        // PROPERTY: no armored line exceeds the line width
        prop_assert!(text.lines().all(|line| line.len() <= 76));

        let parsed = armor::parse(&text)?;
        prop_assert_eq!(parsed.label, label);
        prop_assert_eq!(parsed.headers, headers);
        prop_assert_eq!(parsed.data.as_ref(), data.as_slice());
    });
}

/// Property: Any flipped payload byte is caught by the checksum or the decoder
#[test]
fn prop_armor_detects_corruption() {
    proptest!(|(data in prop::collection::vec(any::<u8>(), 1..256), index in any::<prop::sample::Index>())| {
        let text = armor::encode("MESSAGE", &[], &data);
        let mut corrupted = data.clone();
        let i = index.index(corrupted.len());
        corrupted[i] ^= 0x01;
        let body = armor::encode("MESSAGE", &[], &corrupted);

        // splice the corrupted body under the original checksum
        let checksum = text.lines().rev().nth(1).unwrap();
        let mut lines: Vec<&str> = body.lines().collect();
        let at = lines.len() - 2;
        lines[at] = checksum;
        prop_assert!(armor::parse(&lines.join("\n")).is_err());
    });
}

/// Property: Canonical text has only CRLF line ends and no trailing blanks
#[test]
fn prop_canonical_text_is_normalized() {
    proptest!(|(text in "[a-z \t\r\n-]{0,64}")| {
        let canonical = canonicalize(&text);

        prop_assert!(!canonical.ends_with("\r\n"));
        for (i, _) in canonical.match_indices('\n') {
            prop_assert!(i > 0 && canonical.as_bytes()[i - 1] == b'\r');
        }
        for (i, _) in canonical.match_indices('\r') {
            prop_assert_eq!(canonical.as_bytes().get(i + 1), Some(&b'\n'));
        }
        for line in canonical.split("\r\n") {
            prop_assert!(!line.ends_with([' ', '\t']));
        }
    });
}

/// Property: Dash escaping is reversible and hides armor boundaries
#[test]
fn prop_dash_escape_round_trips() {
    proptest!(|(text in text_lines().prop_map(|t| t.replace('!', "-----BEGIN PGP SIGNATURE-----")))| {
        let escaped = dash_escape(&text);

        // PROPERTY: no escaped line can be mistaken for an armor line
        prop_assert!(escaped.split('\n').all(|line| !line.starts_with("-----")));
        prop_assert_eq!(dash_unescape(&escaped), text);
    });
}

/// Property: Cleartext-signed text survives armoring and still verifies
#[test]
fn prop_clearsigned_text_verifies() {
    let rt = runtime();
    let registry = AlgorithmRegistry::standard();
    let env = SeededEnv::new(11);
    let key = rt.block_on(generate_key(&env, "signer"));
    let signer = signing_key(&key);
    let keys = vec![key.to_public()];

    proptest!(ProptestConfig::with_cases(32), |(text in text_lines())| {
        let message = rt.block_on(ClearSignMessage::construct(
            &registry,
            &signer,
            &text,
            HashAlgorithm::Sha256,
            1_700_000_000,
        ))?;
        let armored = message.to_armored()?;

        let Block::ClearSign(parsed) = sigil_core::parse_ascii(&armored)? else {
            return Err(TestCaseError::fail("expected a cleartext-signed block"));
        };
        prop_assert_eq!(parsed.text(), canonicalize(&text));
        let result = rt.block_on(parsed.verify(&registry, &keys, common::NOW));
        prop_assert!(result.is_verified());
    });
}

/// Property: Nested one-pass signatures all link and verify, outermost first
#[test]
fn prop_nested_one_pass_signatures_verify() {
    let rt = runtime();
    let registry = AlgorithmRegistry::standard();
    let env = SeededEnv::new(12);
    let keys: Vec<_> =
        (0..4).map(|i| rt.block_on(generate_key(&env, &format!("signer {i}")))).collect();
    let public: Vec<_> = keys.iter().map(sigil_core::TransferableKey::to_public).collect();

    proptest!(ProptestConfig::with_cases(16), |(
        signers in prop::collection::vec(0..keys.len(), 1..=4),
        data in prop::collection::vec(any::<u8>(), 0..256),
    )| {
        let mut message = Message::construct_literal(data, "", 0);
        for &i in &signers {
            rt.block_on(message.sign_with_one_pass(
                &registry,
                &signing_key(&keys[i]),
                HashAlgorithm::Sha256,
                1_700_000_000,
            ))?;
        }

        let Block::Message(parsed) = sigil_core::parse_bytes(&message.serialize()?)? else {
            return Err(TestCaseError::fail("expected a message block"));
        };
        prop_assert_eq!(&parsed, &message);

        let expected: Vec<_> = signers.iter().rev().map(|&i| keys[i].key_id()).collect();
        prop_assert_eq!(parsed.signer_key_ids(), expected.clone());

        let result = rt.block_on(parsed.verify(&registry, &public, common::NOW));
        prop_assert_eq!(result.success, expected);
        prop_assert!(result.failure.is_empty());
    });
}

/// Property: Arbitrary bytes never panic the binary or armored parsers
#[test]
fn prop_arbitrary_input_never_panics() {
    proptest!(|(data in prop::collection::vec(any::<u8>(), 0..512))| {
        let _ = sigil_core::parse_bytes_multi(&data);
        let _ = sigil_core::parse_keys(&data, &sigil_core::ParseConfig::default());

        let mut text = String::from("-----BEGIN PGP MESSAGE-----\n\n");
        text.push_str(&String::from_utf8_lossy(&data));
        let _ = sigil_core::parse_ascii_multi(&text);
    });
}
