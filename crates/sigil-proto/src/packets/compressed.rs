//! Compressed Data packet (tag 8).
//!
//! The packet only frames the compressed stream; inflating it and parsing
//! the inner packets happens at the block layer.

use bytes::{BufMut, Bytes, BytesMut};
use sigil_crypto::CompressionAlgorithm;

use super::PacketBody;
use crate::{errors::Result, reader::BodyReader, tag::Tag};

/// Compressed packet stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedData {
    /// Compression algorithm
    pub algorithm: CompressionAlgorithm,
    /// Compressed bytes
    pub data: Bytes,
}

impl PacketBody for CompressedData {
    const TAG: Tag = Tag::CompressedData;

    fn decode_body(body: Bytes) -> Result<Self> {
        let mut r = BodyReader::new(body);
        let algorithm = CompressionAlgorithm::from_id(r.read_u8()?)?;
        Ok(Self { algorithm, data: r.rest() })
    }

    fn encode_body(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_u8(self.algorithm.id());
        dst.put_slice(&self.data);
        Ok(())
    }
}
