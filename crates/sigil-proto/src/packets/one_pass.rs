//! One-Pass Signature packet (tag 4).

use bytes::{BufMut, Bytes, BytesMut};
use sigil_crypto::{HashAlgorithm, PublicKeyAlgorithm};

use super::{PacketBody, SignatureType};
use crate::{errors::Result, key_id::KeyId, reader::BodyReader, tag::Tag};

/// Forward declaration of a signature that trails the signed data.
///
/// Layout: `version type hash pk key_id[8] nested`. On the wire the last
/// octet is zero when another one-pass signature follows before the data,
/// so `nested` is true for a zero octet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnePassSignature {
    /// Packet version (3)
    pub version: u8,
    /// Signature type of the trailing signature
    pub sig_type: SignatureType,
    /// Digest algorithm
    pub hash_algorithm: HashAlgorithm,
    /// Signing algorithm
    pub pk_algorithm: PublicKeyAlgorithm,
    /// Signer key id
    pub key_id: KeyId,
    /// Another one-pass signature follows before the payload
    pub nested: bool,
}

impl OnePassSignature {
    /// Current packet version.
    pub const VERSION: u8 = 3;
}

impl PacketBody for OnePassSignature {
    const TAG: Tag = Tag::OnePassSignature;

    fn decode_body(body: Bytes) -> Result<Self> {
        let mut r = BodyReader::new(body);
        Ok(Self {
            version: r.read_u8()?,
            sig_type: SignatureType::from(r.read_u8()?),
            hash_algorithm: HashAlgorithm::from(r.read_u8()?),
            pk_algorithm: PublicKeyAlgorithm::from(r.read_u8()?),
            key_id: KeyId::new(r.read_array()?),
            nested: r.read_u8()? == 0,
        })
    }

    fn encode_body(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_slice(&[
            self.version,
            self.sig_type.to_u8(),
            self.hash_algorithm.id(),
            self.pk_algorithm.id(),
        ]);
        dst.put_slice(self.key_id.as_bytes());
        dst.put_u8(u8::from(!self.nested));
        Ok(())
    }
}
