//! Packet body types.
//!
//! Each body type decodes from and encodes to the bytes that follow a packet
//! header. Framing lives in [`crate::header`]; dispatch by tag in
//! [`crate::codec`].

mod compressed;
mod encrypted;
mod esk;
mod key;
mod literal;
mod one_pass;
mod signature;
mod simple;
pub mod subpacket;

use bytes::{Bytes, BytesMut};

pub use compressed::CompressedData;
pub use encrypted::{MDC_SIZE, SymEncryptedData, SymEncryptedProtectedData};
pub use esk::{EskMaterial, PublicKeyEsk, SymmetricKeyEsk};
pub use key::{PublicKey, PublicKeyMaterial, SecretKey, SecretMaterial, UnlockedSecret};
pub use literal::{LiteralData, LiteralFormat};
pub use one_pass::OnePassSignature;
pub use signature::{Signature, SignatureType, SignatureVersion};
pub use simple::{Marker, OpaquePacket, Trust, UserAttribute, UserId};

use crate::{errors::Result, tag::Tag};

/// Body encoding shared by every packet kind.
pub trait PacketBody: Sized {
    /// Tag the body is framed with.
    const TAG: Tag;

    /// Decode a complete body.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Truncated` / `Malformed` for layout violations
    /// - `ProtocolError::Unsupported` for recognised but unimplemented
    ///   versions or algorithms
    fn decode_body(body: Bytes) -> Result<Self>;

    /// Append the encoded body to `dst`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Serialization` if a field cannot be represented
    fn encode_body(&self, dst: &mut BytesMut) -> Result<()>;

    /// Encoded body as a fresh buffer.
    fn to_body(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        self.encode_body(&mut buf)?;
        Ok(buf.freeze())
    }
}
