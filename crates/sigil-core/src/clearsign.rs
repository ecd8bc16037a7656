//! Cleartext signatures (RFC4880 §7).
//!
//! The signed text is canonicalized before hashing: trailing spaces and
//! tabs are dropped from every line, line ends become `\r\n`, and one final
//! line end is removed. Signatures are of type `Text` (0x01).

use bytes::{Bytes, BytesMut};
use sigil_crypto::HashAlgorithm;
use sigil_proto::{LiteralData, LiteralFormat, Packet, PacketCodec, Signature, SignatureType};
use tracing::debug;

use crate::{
    armor::{self, Armor, SIGNATURE, SIGNED_MESSAGE},
    block::{KeyLookup, Message, MessageBody, MessageSignature, VerifyResult},
    error::{Error, Result},
    registry::AlgorithmRegistry,
    signing::SigningKey,
};

/// Canonical form of `text` for hashing.
#[must_use]
pub fn canonicalize(text: &str) -> String {
    let mut out = canonical_line_ends(text);
    if out.ends_with("\r\n") {
        out.truncate(out.len() - 2);
    }
    out
}

/// `\r\n` line ends, no trailing spaces or tabs.
fn canonical_line_ends(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 32);
    let mut rest = text;
    while let Some(end) = rest.find(['\r', '\n']) {
        out.push_str(rest[..end].trim_end_matches([' ', '\t']));
        out.push_str("\r\n");
        let skip = if rest[end..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[end + skip..];
    }
    out.push_str(rest.trim_end_matches([' ', '\t']));
    out
}

/// Prefix every line starting with `-` with `- `.
#[must_use]
pub fn dash_escape(text: &str) -> String {
    text.split('\n')
        .map(|line| if line.starts_with('-') { format!("- {line}") } else { line.to_owned() })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Inverse of [`dash_escape`].
#[must_use]
pub fn dash_unescape(text: &str) -> String {
    text.split('\n').map(|line| line.strip_prefix("- ").unwrap_or(line)).collect::<Vec<_>>().join("\n")
}

/// Signed text plus its detached signatures.
///
/// # Invariants
///
/// - `text` is canonical (see [`canonicalize`]).
/// - There is at least one signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearSignMessage {
    text: String,
    signatures: Vec<Signature>,
}

impl ClearSignMessage {
    /// Canonicalize `text` and sign it with `key`.
    ///
    /// # Errors
    ///
    /// See [`SigningKey::sign`].
    pub async fn construct(
        registry: &AlgorithmRegistry,
        key: &SigningKey,
        text: &str,
        hash_algorithm: HashAlgorithm,
        created: u32,
    ) -> Result<Self> {
        let text = canonicalize(text);
        let signature = key
            .sign(registry, SignatureType::Text, hash_algorithm, text.as_bytes(), created, Vec::new())
            .await?;
        debug!(issuer = %key.key_id(), len = text.len(), "cleartext signed");
        Ok(Self { text, signatures: vec![signature] })
    }

    /// Rebuild from a parsed `SIGNED MESSAGE` armor section.
    ///
    /// # Errors
    ///
    /// - `Error::Parse` if the signature section holds no signature, holds
    ///   other packets, or uses a hash not named in the `Hash:` header
    pub fn from_armor(headers: &[(String, String)], escaped: &str, signature: &Armor) -> Result<Self> {
        let packets = PacketCodec::standard().parse_all(&signature.data)?;
        let signatures = packets
            .into_iter()
            .filter(|p| !p.is_ignorable())
            .map(|p| match p {
                Packet::Signature(sig) => Ok(sig),
                other => Err(Error::parse(format!(
                    "unexpected {:?} packet in cleartext signature",
                    other.tag()
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        if signatures.is_empty() {
            return Err(Error::parse("No signature present in clearsigned message"));
        }

        let declared: Vec<HashAlgorithm> = headers
            .iter()
            .filter(|(key, _)| key == "Hash")
            .flat_map(|(_, value)| value.split(','))
            .filter_map(|name| HashAlgorithm::from_armor_name(name.trim()))
            .collect();
        if !declared.is_empty() && signatures.iter().any(|s| !declared.contains(&s.hash_algorithm)) {
            return Err(Error::parse("Digest algorithms mismatch"));
        }

        // the armor already dropped the line end before the signature
        Ok(Self { text: canonical_line_ends(&dash_unescape(escaped)), signatures })
    }

    /// Canonical signed text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Signatures over the text.
    #[must_use]
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// The text as a literal message carrying the signatures.
    #[must_use]
    pub fn to_message(&self) -> Message {
        let literal = LiteralData::new(LiteralFormat::Text, "", 0, self.text.clone().into_bytes());
        Message::new(
            self.signatures.iter().cloned().map(MessageSignature::Plain).collect(),
            MessageBody::Literal(literal),
        )
    }

    /// Check every signature against `keys`. See [`Message::verify`].
    pub async fn verify(
        &self,
        registry: &AlgorithmRegistry,
        keys: &(impl KeyLookup + ?Sized),
        now: u64,
    ) -> VerifyResult {
        self.to_message().verify(registry, keys, now).await
    }

    /// Encoded signature packets.
    ///
    /// # Errors
    ///
    /// - `Error::Serialization` if a packet cannot be encoded
    pub fn serialize_signatures(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        for signature in &self.signatures {
            Packet::Signature(signature.clone()).encode(&mut buf)?;
        }
        Ok(buf.freeze())
    }

    /// `SIGNED MESSAGE` armor followed by the `SIGNATURE` section.
    ///
    /// # Errors
    ///
    /// - `Error::Serialization` if a signature cannot be encoded
    pub fn to_armored(&self) -> Result<String> {
        let mut hashes: Vec<&str> = Vec::new();
        for signature in &self.signatures {
            let name = signature.hash_algorithm.armor_name();
            if !hashes.contains(&name) {
                hashes.push(name);
            }
        }

        let mut out = format!("-----BEGIN PGP {SIGNED_MESSAGE}-----\n");
        armor::push_headers(&mut out, &[("Hash".to_owned(), hashes.join(","))]);
        out.push('\n');
        out.push_str(&dash_escape(&self.text.replace("\r\n", "\n")));
        out.push('\n');
        out.push_str(&armor::encode(SIGNATURE, &[], &self.serialize_signatures()?));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use sigil_crypto::{PublicKeyAlgorithm, eddsa};
    use sigil_proto::{Mpi, PublicKey, PublicKeyMaterial, SecretKey};

    use super::*;
    use crate::armor::{Armored, parse_all};

    fn signing_key() -> SigningKey {
        let seed = [5u8; 32];
        let material = PublicKeyMaterial::EdDsa {
            oid: Bytes::from_static(&eddsa::ED25519_OID),
            point: Mpi::new(eddsa::public_point(&seed).unwrap()),
        };
        let public = PublicKey::new_v4(1_700_000_000, PublicKeyAlgorithm::EdDsa, material).unwrap();
        SigningKey::unlock(&SecretKey::plain(public, &[Mpi::new(seed.to_vec())]), None).unwrap()
    }

    #[test]
    fn canonicalization() {
        assert_eq!(canonicalize("a \t\nb\r\nc\rd  \n"), "a\r\nb\r\nc\r\nd");
        assert_eq!(canonicalize("no newline  "), "no newline");
        assert_eq!(canonicalize("two\n\n"), "two\r\n");
        assert_eq!(canonicalize(""), "");
    }

    #[test]
    fn dash_escaping_round_trips() {
        let text = "-----BEGIN PGP fake\nplain\n- item";
        let escaped = dash_escape(text);
        assert_eq!(escaped, "- -----BEGIN PGP fake\nplain\n- - item");
        assert_eq!(dash_unescape(&escaped), text);
    }

    #[tokio::test]
    async fn armored_round_trip_verifies() {
        let registry = AlgorithmRegistry::standard();
        let key = signing_key();
        let message = ClearSignMessage::construct(
            &registry,
            &key,
            "hello  \n-dash line\n",
            HashAlgorithm::Sha256,
            10,
        )
        .await
        .unwrap();
        assert_eq!(message.text(), "hello\r\n-dash line");

        let armored = message.to_armored().unwrap();
        assert!(armored.starts_with("-----BEGIN PGP SIGNED MESSAGE-----\nHash: SHA256\n\nhello\n- -dash line\n"));

        let sections = parse_all(&armored).unwrap();
        let [Armored::ClearSigned { headers, text, signature }] = sections.as_slice() else {
            panic!("expected clear-signed section");
        };
        let parsed = ClearSignMessage::from_armor(headers, text, signature).unwrap();
        assert_eq!(parsed, message);

        let result = parsed.verify(&registry, &vec![key.public().clone()], 100).await;
        assert_eq!(result.success, vec![key.key_id()]);
    }

    #[tokio::test]
    async fn hash_header_must_cover_signatures() {
        let registry = AlgorithmRegistry::standard();
        let message =
            ClearSignMessage::construct(&registry, &signing_key(), "x", HashAlgorithm::Sha256, 10)
                .await
                .unwrap();
        let armored = message.to_armored().unwrap().replace("Hash: SHA256", "Hash: SHA512");

        let sections = parse_all(&armored).unwrap();
        let [Armored::ClearSigned { headers, text, signature }] = sections.as_slice() else {
            panic!("expected clear-signed section");
        };
        let err = ClearSignMessage::from_armor(headers, text, signature).unwrap_err();
        insta::assert_snapshot!(err, @"parse error: Digest algorithms mismatch");
    }

    #[tokio::test]
    async fn edited_text_fails_verification() {
        let registry = AlgorithmRegistry::standard();
        let key = signing_key();
        let message = ClearSignMessage::construct(&registry, &key, "pay 10", HashAlgorithm::Sha256, 10)
            .await
            .unwrap();
        let armored = message.to_armored().unwrap().replace("pay 10", "pay 99");

        let sections = parse_all(&armored).unwrap();
        let [Armored::ClearSigned { headers, text, signature }] = sections.as_slice() else {
            panic!("expected clear-signed section");
        };
        let parsed = ClearSignMessage::from_armor(headers, text, signature).unwrap();
        let result = parsed.verify(&registry, &vec![key.public().clone()], 100).await;
        assert_eq!(result.failure.len(), 1);
    }
}
