//! Binds one-pass signature headers to their trailing signatures.
//!
//! A one-pass signed message is laid out as
//!
//! ```text
//! OPS(A, nested) OPS(B) ... payload ... SIG(B) SIG(A)
//! ```
//!
//! Headers are encountered outermost-first and signatures innermost-first,
//! so pairing is a stack: the last header binds to the first trailing
//! signature.

use sigil_proto::{OnePassSignature, Packet, PublicKey, Signature};
use tracing::warn;

use crate::{
    block::Cursor,
    error::Result,
    registry::AlgorithmRegistry,
    signing::verify_signature,
};

/// A one-pass header and, once linked, the signature it announced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedOnePass {
    header: OnePassSignature,
    signature: Option<Signature>,
}

impl LinkedOnePass {
    /// Header with no signature bound yet.
    #[must_use]
    pub fn unbound(header: OnePassSignature) -> Self {
        Self { header, signature: None }
    }

    /// Header with its signature.
    #[must_use]
    pub fn bound(header: OnePassSignature, signature: Signature) -> Self {
        Self { header, signature: Some(signature) }
    }

    /// The one-pass header.
    #[must_use]
    pub fn header(&self) -> &OnePassSignature {
        &self.header
    }

    /// The bound signature, if linking found one.
    #[must_use]
    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// True once a signature is bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.signature.is_some()
    }

    /// Verify the bound signature over `data`.
    ///
    /// Returns `Ok(false)` if nothing is bound.
    ///
    /// # Errors
    ///
    /// See [`verify_signature`].
    pub async fn verify(
        &self,
        registry: &AlgorithmRegistry,
        key: &PublicKey,
        data: &[u8],
        now: u64,
    ) -> Result<bool> {
        match &self.signature {
            Some(signature) => verify_signature(registry, key, signature, data, now).await,
            None => Ok(false),
        }
    }
}

/// LIFO pairing of one-pass headers with trailing signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureLinker;

impl SignatureLinker {
    /// Bind `headers` (outermost first) to the signature packets at `cursor`.
    ///
    /// Consumes one signature per header, starting with the innermost header.
    /// Stops at the first packet that is not a signature; headers left
    /// without one stay unbound.
    #[must_use]
    pub fn link(headers: Vec<OnePassSignature>, mut cursor: Cursor<'_>) -> (Vec<LinkedOnePass>, Cursor<'_>) {
        let mut linked: Vec<LinkedOnePass> = headers.into_iter().map(LinkedOnePass::unbound).collect();

        for entry in linked.iter_mut().rev() {
            let Some((Packet::Signature(signature), rest)) = cursor.split_first() else {
                warn!(key_id = %entry.header.key_id, "one-pass signature without trailing signature");
                break;
            };
            if signature.issuer() != entry.header.key_id {
                warn!(
                    announced = %entry.header.key_id,
                    issuer = %signature.issuer(),
                    "one-pass header and signature name different keys"
                );
            }
            entry.signature = Some(signature.clone());
            cursor = rest;
        }

        (linked, cursor)
    }
}

#[cfg(test)]
mod tests {
    use sigil_crypto::{HashAlgorithm, PublicKeyAlgorithm};
    use sigil_proto::{
        KeyId, LiteralData, LiteralFormat, Mpi, SignatureType,
        packets::{SignatureVersion, subpacket::{Subpacket, SubpacketValue}},
    };

    use super::*;

    fn header(id: u8, nested: bool) -> OnePassSignature {
        OnePassSignature {
            version: OnePassSignature::VERSION,
            sig_type: SignatureType::Binary,
            hash_algorithm: HashAlgorithm::Sha256,
            pk_algorithm: PublicKeyAlgorithm::EdDsa,
            key_id: KeyId::new([id; 8]),
            nested,
        }
    }

    fn signature(id: u8) -> Signature {
        Signature {
            sig_type: SignatureType::Binary,
            pk_algorithm: PublicKeyAlgorithm::EdDsa,
            hash_algorithm: HashAlgorithm::Sha256,
            version: SignatureVersion::V4 {
                hashed: vec![Subpacket::new(SubpacketValue::SignatureCreationTime(1))],
                unhashed: vec![Subpacket::new(SubpacketValue::Issuer(KeyId::new([id; 8])))],
            },
            left16: [0, 0],
            mpis: vec![Mpi::new(vec![id])],
        }
    }

    #[test]
    fn nested_headers_pair_last_in_first_out() {
        let packets = [
            Packet::LiteralData(LiteralData::new(LiteralFormat::Binary, "", 0, "x")),
            Packet::Signature(signature(2)),
            Packet::Signature(signature(1)),
        ];
        let cursor = Cursor::new(&packets).advance(1);

        let (linked, rest) = SignatureLinker::link(vec![header(1, true), header(2, false)], cursor);

        assert!(rest.is_empty());
        assert_eq!(linked[0].signature(), Some(&signature(1)));
        assert_eq!(linked[1].signature(), Some(&signature(2)));
    }

    #[test]
    fn missing_signatures_leave_outer_headers_unbound() {
        let packets = [Packet::Signature(signature(2))];
        let (linked, rest) =
            SignatureLinker::link(vec![header(1, true), header(2, false)], Cursor::new(&packets));

        assert!(rest.is_empty());
        assert!(!linked[0].is_bound());
        assert!(linked[1].is_bound());
    }

    #[tokio::test]
    async fn unbound_header_does_not_verify() {
        let registry = AlgorithmRegistry::standard();
        let material = sigil_proto::PublicKeyMaterial::EdDsa {
            oid: bytes::Bytes::from_static(&sigil_crypto::eddsa::ED25519_OID),
            point: Mpi::new(sigil_crypto::eddsa::public_point(&[1; 32]).unwrap()),
        };
        let key = PublicKey::new_v4(0, PublicKeyAlgorithm::EdDsa, material).unwrap();

        let linked = LinkedOnePass::unbound(header(1, false));
        assert!(!linked.verify(&registry, &key, b"data", 0).await.unwrap());
    }
}
