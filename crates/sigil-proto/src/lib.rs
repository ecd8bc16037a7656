//! Sigil Packet Codec
//!
//! RFC4880 packet framing: header and length decoding (old and new format,
//! partial bodies), a closed set of packet variants, and a tag-indexed codec
//! that dispatches bodies to their decoders.
//!
//! Parsing never yields a partial packet. A truncated header or body, a bad
//! length encoding, or an unknown non-private tag aborts with a
//! [`ProtocolError`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
pub mod errors;
pub mod header;
pub mod key_id;
pub mod mpi;
pub mod packet;
pub mod packets;
mod reader;
pub mod tag;

pub use codec::{PacketCodec, PacketCodecBuilder};
pub use errors::{ProtocolError, Result};
pub use key_id::KeyId;
pub use mpi::Mpi;
pub use packet::Packet;
pub use packets::{
    CompressedData, LiteralData, LiteralFormat, Marker, OnePassSignature, OpaquePacket, PublicKey,
    PublicKeyEsk, PublicKeyMaterial, SecretKey, SecretMaterial, Signature, SignatureType,
    SymEncryptedData, SymEncryptedProtectedData, SymmetricKeyEsk, Trust, UserAttribute, UserId,
};
pub use tag::Tag;
