//! Messages: a body (literal, compressed or encrypted) and the signatures
//! over it.
//!
//! Serialized layout:
//!
//! ```text
//! [Signature | OnePass]*  body  [bound Signature of each OnePass, reversed]
//! ```

use bytes::{Bytes, BytesMut};
use sigil_crypto::HashAlgorithm;
use sigil_proto::{
    CompressedData, KeyId, LiteralData, OnePassSignature, Packet, PublicKey, Signature,
    SignatureType,
};
use tracing::{debug, warn};

use super::{EncryptedMessage, TransferableKey};
use crate::{
    error::{Error, Result},
    linker::LinkedOnePass,
    registry::AlgorithmRegistry,
    signing::{SigningKey, verify_signature},
};

/// One signature entry of a message, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSignature {
    /// A signature packet preceding the body
    Plain(Signature),
    /// A one-pass header and its trailing signature
    OnePass(LinkedOnePass),
}

impl MessageSignature {
    /// Key id the entry claims to be signed by.
    #[must_use]
    pub fn key_id(&self) -> KeyId {
        match self {
            Self::Plain(signature) => signature.issuer(),
            Self::OnePass(linked) => linked.header().key_id,
        }
    }

    async fn verify(
        &self,
        registry: &AlgorithmRegistry,
        key: &PublicKey,
        data: &[u8],
        now: u64,
    ) -> Result<bool> {
        match self {
            Self::Plain(signature) => verify_signature(registry, key, signature, data, now).await,
            Self::OnePass(linked) => linked.verify(registry, key, data, now).await,
        }
    }
}

/// The signed or encrypted content of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Plaintext
    Literal(LiteralData),
    /// Compressed inner message
    Compressed(CompressedData),
    /// Session keys and encrypted inner message
    Encrypted(EncryptedMessage),
}

impl MessageBody {
    fn push_packets(&self, out: &mut Vec<Packet>) {
        match self {
            Self::Literal(literal) => out.push(Packet::LiteralData(literal.clone())),
            Self::Compressed(compressed) => out.push(Packet::CompressedData(compressed.clone())),
            Self::Encrypted(encrypted) => out.extend(encrypted.packets()),
        }
    }
}

/// Looks up a public key by key id.
pub trait KeyLookup {
    /// Primary key or subkey with `key_id`.
    fn public_key(&self, key_id: KeyId) -> Option<&PublicKey>;
}

impl KeyLookup for [PublicKey] {
    fn public_key(&self, key_id: KeyId) -> Option<&PublicKey> {
        self.iter().find(|key| key.key_id() == key_id)
    }
}

impl KeyLookup for [TransferableKey] {
    fn public_key(&self, key_id: KeyId) -> Option<&PublicKey> {
        self.iter().find_map(|key| key.key_by_id(key_id))
    }
}

impl<T> KeyLookup for Vec<T>
where
    [T]: KeyLookup,
{
    fn public_key(&self, key_id: KeyId) -> Option<&PublicKey> {
        self.as_slice().public_key(key_id)
    }
}

/// A signature that could be checked and did not verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyFailure {
    /// Signing key
    pub key_id: KeyId,
    /// Why verification failed
    pub error: Error,
}

/// Outcome of checking every signature of a message.
///
/// Signatures by keys that are not available are in neither list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyResult {
    /// Keys whose signatures verified
    pub success: Vec<KeyId>,
    /// Keys whose signatures did not verify
    pub failure: Vec<VerifyFailure>,
}

impl VerifyResult {
    /// At least one signature verified and none failed.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        !self.success.is_empty() && self.failure.is_empty()
    }
}

/// A signed, compressed, encrypted or plain message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    signatures: Vec<MessageSignature>,
    body: MessageBody,
}

impl Message {
    /// Assemble a message from its parts.
    #[must_use]
    pub fn new(signatures: Vec<MessageSignature>, body: MessageBody) -> Self {
        Self { signatures, body }
    }

    /// Signature entries, outermost first.
    #[must_use]
    pub fn signatures(&self) -> &[MessageSignature] {
        &self.signatures
    }

    /// Message body.
    #[must_use]
    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    /// Split into signatures and body.
    #[must_use]
    pub fn into_parts(self) -> (Vec<MessageSignature>, MessageBody) {
        (self.signatures, self.body)
    }

    /// Packets in wire order.
    #[must_use]
    pub fn packets(&self) -> Vec<Packet> {
        let mut out = Vec::with_capacity(self.signatures.len() * 2 + 1);
        for entry in &self.signatures {
            out.push(match entry {
                MessageSignature::Plain(signature) => Packet::Signature(signature.clone()),
                MessageSignature::OnePass(linked) => Packet::OnePassSignature(linked.header().clone()),
            });
        }
        self.body.push_packets(&mut out);
        out.extend(self.signatures.iter().rev().filter_map(|entry| match entry {
            MessageSignature::OnePass(linked) => linked.signature().cloned().map(Packet::Signature),
            MessageSignature::Plain(_) => None,
        }));
        out
    }

    /// Encoded packet stream.
    ///
    /// # Errors
    ///
    /// - `Error::Serialization` if a packet cannot be encoded
    pub fn serialize(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        for packet in self.packets() {
            packet.encode(&mut buf)?;
        }
        Ok(buf.freeze())
    }

    /// Data covered by this message's signatures: the literal payload, or the
    /// encoded body packets otherwise.
    ///
    /// # Errors
    ///
    /// - `Error::Serialization` if the body cannot be encoded
    pub fn bytes_to_sign(&self) -> Result<Bytes> {
        if let MessageBody::Literal(literal) = &self.body {
            return Ok(literal.data.clone());
        }
        let mut packets = Vec::new();
        self.body.push_packets(&mut packets);
        let mut buf = BytesMut::new();
        for packet in packets {
            packet.encode(&mut buf)?;
        }
        Ok(buf.freeze())
    }

    /// Prepend a signature packet by `key`.
    ///
    /// # Errors
    ///
    /// See [`SigningKey::sign`].
    pub async fn sign(
        &mut self,
        registry: &AlgorithmRegistry,
        key: &SigningKey,
        hash_algorithm: HashAlgorithm,
        created: u32,
    ) -> Result<()> {
        let data = self.bytes_to_sign()?;
        let signature = key
            .sign(registry, SignatureType::Binary, hash_algorithm, &data, created, Vec::new())
            .await?;
        self.signatures.insert(0, MessageSignature::Plain(signature));
        Ok(())
    }

    /// Prepend a one-pass header by `key` and bind its signature.
    ///
    /// The header is marked nested when other signatures already follow it.
    ///
    /// # Errors
    ///
    /// See [`SigningKey::sign`].
    pub async fn sign_with_one_pass(
        &mut self,
        registry: &AlgorithmRegistry,
        key: &SigningKey,
        hash_algorithm: HashAlgorithm,
        created: u32,
    ) -> Result<()> {
        let data = self.bytes_to_sign()?;
        let signature = key
            .sign(registry, SignatureType::Binary, hash_algorithm, &data, created, Vec::new())
            .await?;
        let header = OnePassSignature {
            version: OnePassSignature::VERSION,
            sig_type: signature.sig_type,
            hash_algorithm,
            pk_algorithm: signature.pk_algorithm,
            key_id: key.key_id(),
            nested: !self.signatures.is_empty(),
        };
        self.signatures.insert(0, MessageSignature::OnePass(LinkedOnePass::bound(header, signature)));
        Ok(())
    }

    /// Key ids of every signer, outermost first.
    #[must_use]
    pub fn signer_key_ids(&self) -> Vec<KeyId> {
        self.signatures.iter().map(MessageSignature::key_id).collect()
    }

    /// Check every signature against `keys`.
    ///
    /// Never fails: errors are reported per signature in the result.
    /// Signatures by unknown keys are skipped.
    pub async fn verify(
        &self,
        registry: &AlgorithmRegistry,
        keys: &(impl KeyLookup + ?Sized),
        now: u64,
    ) -> VerifyResult {
        let mut result = VerifyResult::default();
        if self.signatures.is_empty() {
            return result;
        }
        let data = match self.bytes_to_sign() {
            Ok(data) => data,
            Err(error) => {
                result.failure = self
                    .signatures
                    .iter()
                    .map(|s| VerifyFailure { key_id: s.key_id(), error: error.clone() })
                    .collect();
                return result;
            },
        };

        for entry in &self.signatures {
            let key_id = entry.key_id();
            let Some(key) = keys.public_key(key_id) else {
                warn!(%key_id, "no key to verify signature");
                continue;
            };
            match entry.verify(registry, key, &data, now).await {
                Ok(true) => result.success.push(key_id),
                Ok(false) => result.failure.push(VerifyFailure {
                    key_id,
                    error: Error::Signature("signature does not verify".into()),
                }),
                Err(error) => result.failure.push(VerifyFailure { key_id, error }),
            }
        }
        debug!(
            verified = result.success.len(),
            failed = result.failure.len(),
            "message signatures checked"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use sigil_crypto::{CompressionAlgorithm, PublicKeyAlgorithm, eddsa};
    use sigil_proto::{LiteralFormat, Mpi, PacketCodec, PublicKeyMaterial, SecretKey};

    use super::*;
    use crate::{block::parse_message, config::ParseConfig};

    fn signing_key(seed: u8) -> SigningKey {
        let seed = [seed; 32];
        let material = PublicKeyMaterial::EdDsa {
            oid: Bytes::from_static(&eddsa::ED25519_OID),
            point: Mpi::new(eddsa::public_point(&seed).unwrap()),
        };
        let public = PublicKey::new_v4(1_700_000_000, PublicKeyAlgorithm::EdDsa, material).unwrap();
        SigningKey::unlock(&SecretKey::plain(public, &[Mpi::new(seed.to_vec())]), None).unwrap()
    }

    fn literal_message() -> Message {
        Message::new(
            Vec::new(),
            MessageBody::Literal(LiteralData::new(LiteralFormat::Binary, "a.txt", 7, "payload")),
        )
    }

    #[tokio::test]
    async fn nested_one_pass_signatures_round_trip_and_verify() {
        let registry = AlgorithmRegistry::standard();
        let (alice, bob) = (signing_key(1), signing_key(2));

        let mut message = literal_message();
        message.sign_with_one_pass(&registry, &alice, HashAlgorithm::Sha256, 10).await.unwrap();
        message.sign_with_one_pass(&registry, &bob, HashAlgorithm::Sha256, 11).await.unwrap();
        assert_eq!(message.signer_key_ids(), vec![bob.key_id(), alice.key_id()]);

        let bytes = message.serialize().unwrap();
        let packets = PacketCodec::standard().parse_all(&bytes).unwrap();
        let tags: Vec<_> = packets.iter().map(Packet::tag).map(|t| t.to_u8()).collect();
        assert_eq!(tags, vec![4, 4, 11, 2, 2]);

        let parsed = parse_message(&packets).unwrap();
        assert_eq!(parsed, message);
        let MessageSignature::OnePass(outer) = &parsed.signatures()[0] else { panic!("one-pass") };
        assert!(outer.header().nested);

        let keys = vec![alice.public().clone(), bob.public().clone()];
        let result = parsed.verify(&registry, &keys, 100).await;
        assert_eq!(result.success, vec![bob.key_id(), alice.key_id()]);
        assert!(result.is_verified());
    }

    #[tokio::test]
    async fn signatures_on_compressed_layers_are_checked() {
        let registry = AlgorithmRegistry::standard();
        let (alice, bob) = (signing_key(5), signing_key(6));

        let mut inner = literal_message();
        inner.sign_with_one_pass(&registry, &alice, HashAlgorithm::Sha256, 10).await.unwrap();
        let mut outer = inner.compress(CompressionAlgorithm::Zlib).unwrap();
        outer.sign(&registry, &bob, HashAlgorithm::Sha256, 11).await.unwrap();

        let packets = PacketCodec::standard().parse_all(&outer.serialize().unwrap()).unwrap();
        let parsed = parse_message(&packets).unwrap();
        assert_eq!(parsed, outer);

        let keys = vec![alice.public().clone(), bob.public().clone()];
        let config = ParseConfig::default();
        let (opened, result) =
            parsed.clone().open_compression(&registry, &keys, 100, &config).await.unwrap();
        assert_eq!(opened, inner);
        assert_eq!(result.success, vec![bob.key_id(), alice.key_id()]);
        assert!(result.is_verified());

        // stripping without checking loses the outer signer
        let stripped = parsed.unwrap_compression(&config).unwrap();
        assert_eq!(stripped.verify(&registry, &keys, 100).await.success, vec![alice.key_id()]);
    }

    #[tokio::test]
    async fn tampered_payload_is_a_failure_not_an_error() {
        let registry = AlgorithmRegistry::standard();
        let key = signing_key(3);
        let mut message = literal_message();
        message.sign(&registry, &key, HashAlgorithm::Sha256, 10).await.unwrap();

        let (signatures, _) = message.into_parts();
        let forged = Message::new(
            signatures,
            MessageBody::Literal(LiteralData::new(LiteralFormat::Binary, "a.txt", 7, "payloaD")),
        );
        let result = forged.verify(&registry, &vec![key.public().clone()], 100).await;

        assert!(result.success.is_empty());
        assert_eq!(result.failure.len(), 1);
        assert!(matches!(result.failure[0].error, Error::Signature(_)));
    }

    #[tokio::test]
    async fn unknown_signers_are_ignored() {
        let registry = AlgorithmRegistry::standard();
        let mut message = literal_message();
        message.sign(&registry, &signing_key(4), HashAlgorithm::Sha256, 10).await.unwrap();

        let result = message.verify(&registry, &Vec::<PublicKey>::new(), 100).await;
        assert_eq!(result, VerifyResult::default());
        assert!(!result.is_verified());
    }
}
