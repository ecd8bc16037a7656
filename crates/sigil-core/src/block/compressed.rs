//! Compressed messages: deflate and zlib via `miniz_oxide`.

use bytes::Bytes;
use miniz_oxide::{deflate, inflate};
use sigil_crypto::CompressionAlgorithm;
use sigil_proto::{CompressedData, LiteralData, PacketCodec};
use tracing::debug;

use super::{KeyLookup, Message, MessageBody, VerifyResult, parse_message};
use crate::{
    config::ParseConfig,
    error::{Error, Result},
    registry::AlgorithmRegistry,
};

const LEVEL: u8 = 6;

/// Compress `data` with `algorithm`.
///
/// # Errors
///
/// - `Error::Unsupported` for `BZip2`
pub fn compress(algorithm: CompressionAlgorithm, data: &[u8]) -> Result<Bytes> {
    match algorithm {
        CompressionAlgorithm::Uncompressed => Ok(Bytes::copy_from_slice(data)),
        CompressionAlgorithm::Zip => Ok(deflate::compress_to_vec(data, LEVEL).into()),
        CompressionAlgorithm::Zlib => Ok(deflate::compress_to_vec_zlib(data, LEVEL).into()),
        CompressionAlgorithm::Bzip2 => Err(Error::Unsupported("BZip2 compression".into())),
    }
}

/// Inflate a compressed packet, refusing output beyond `limit` bytes.
///
/// # Errors
///
/// - `Error::Parse` for corrupt streams or output beyond the limit
/// - `Error::Unsupported` for `BZip2`
pub fn decompress(packet: &CompressedData, limit: usize) -> Result<Bytes> {
    let inflated = match packet.algorithm {
        CompressionAlgorithm::Uncompressed => return Ok(packet.data.clone()),
        CompressionAlgorithm::Zip => inflate::decompress_to_vec_with_limit(&packet.data, limit),
        CompressionAlgorithm::Zlib => inflate::decompress_to_vec_zlib_with_limit(&packet.data, limit),
        CompressionAlgorithm::Bzip2 => {
            return Err(Error::Unsupported("BZip2 compression".into()));
        },
    };
    inflated
        .map(Bytes::from)
        .map_err(|e| Error::parse(format!("cannot inflate compressed data: {:?}", e.status)))
}

impl Message {
    /// Wrap this message in a compressed packet.
    ///
    /// # Errors
    ///
    /// - `Error::Unsupported` for `BZip2`
    /// - `Error::Serialization` if the message cannot be encoded
    pub fn compress(&self, algorithm: CompressionAlgorithm) -> Result<Self> {
        let inner = self.serialize()?;
        let data = compress(algorithm, &inner)?;
        debug!(?algorithm, plain = inner.len(), compressed = data.len(), "message compressed");
        Ok(Self::new(Vec::new(), MessageBody::Compressed(CompressedData { algorithm, data })))
    }

    /// Inner message of a compressed message.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArguments` if the body is not compressed
    /// - `Error::Parse` if the contents do not inflate or do not form a
    ///   message
    pub fn decompress(&self, config: &ParseConfig) -> Result<Self> {
        let MessageBody::Compressed(packet) = self.body() else {
            return Err(Error::InvalidArguments("message is not compressed".into()));
        };
        let inner = decompress(packet, config.max_decompressed_len)?;
        let packets = PacketCodec::standard().parse_stream(&inner)?;
        parse_message(&packets)
    }

    /// Strip compression layers until the body is not compressed.
    ///
    /// Signatures on an outer compressed layer are dropped with it; use
    /// [`Message::open_compression`] to check them first.
    ///
    /// # Errors
    ///
    /// - `Error::Parse` past `config.max_compression_depth` layers, or if a
    ///   layer does not decompress
    pub fn unwrap_compression(self, config: &ParseConfig) -> Result<Self> {
        let mut message = self;
        for _ in 0..=config.max_compression_depth {
            if !matches!(message.body(), MessageBody::Compressed(_)) {
                return Ok(message);
            }
            message = message.decompress(config)?;
        }
        Err(Error::parse("compressed messages nested too deeply"))
    }

    /// Strip compression layers, verifying each layer's signatures before
    /// the layer is removed.
    ///
    /// Results are merged outermost layer first.
    ///
    /// # Errors
    ///
    /// See [`Message::unwrap_compression`]. Signature problems never fail.
    pub async fn open_compression(
        self,
        registry: &AlgorithmRegistry,
        keys: &(impl KeyLookup + ?Sized),
        now: u64,
        config: &ParseConfig,
    ) -> Result<(Self, VerifyResult)> {
        let mut message = self;
        let mut result = VerifyResult::default();
        for _ in 0..=config.max_compression_depth {
            let layer = message.verify(registry, keys, now).await;
            result.success.extend(layer.success);
            result.failure.extend(layer.failure);
            if !matches!(message.body(), MessageBody::Compressed(_)) {
                return Ok((message, result));
            }
            message = message.decompress(config)?;
        }
        Err(Error::parse("compressed messages nested too deeply"))
    }

    /// Literal data, looking through compression.
    ///
    /// # Errors
    ///
    /// - `Error::Parse` if the message is encrypted or nested too deeply
    pub fn literal_message(&self, config: &ParseConfig) -> Result<LiteralData> {
        let message = self.clone().unwrap_compression(config)?;
        match message.body() {
            MessageBody::Literal(literal) => Ok(literal.clone()),
            MessageBody::Encrypted(_) => Err(Error::parse("message is encrypted")),
            MessageBody::Compressed(_) => Err(Error::parse("compressed messages nested too deeply")),
        }
    }
}
