//! Bounds-checked cursor over a packet body.

use bytes::Bytes;

use crate::{
    errors::{ProtocolError, Result},
    mpi::Mpi,
};

/// Sequential reader used by body decoders.
///
/// Every read checks the remaining length first; slices share the
/// underlying buffer.
pub(crate) struct BodyReader {
    buf: Bytes,
    pos: usize,
}

impl BodyReader {
    pub(crate) fn new(buf: Bytes) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        if len > self.remaining() {
            return Err(ProtocolError::Truncated { expected: self.pos + len, actual: self.buf.len() });
        }
        let out = self.buf.slice(self.pos..self.pos + len);
        self.pos += len;
        Ok(out)
    }

    pub(crate) fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        self.read_array::<1>().map(|[b]| b)
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        self.read_array().map(u16::from_be_bytes)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_be_bytes)
    }

    pub(crate) fn read_mpi(&mut self) -> Result<Mpi> {
        let bits = usize::from(self.read_u16()?);
        Ok(Mpi::new(self.read_bytes(bits.div_ceil(8))?))
    }

    /// Length-prefixed (one octet) field, as used by curve OIDs.
    pub(crate) fn read_prefixed(&mut self) -> Result<Bytes> {
        let len = usize::from(self.read_u8()?);
        self.read_bytes(len)
    }

    pub(crate) fn peek_rest(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    pub(crate) fn advance(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    pub(crate) fn rest(&mut self) -> Bytes {
        let out = self.buf.slice(self.pos..);
        self.pos = self.buf.len();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_bounds_checked() {
        let mut r = BodyReader::new(Bytes::from_static(&[0, 9, 0x01, 0xFF, 7]));
        assert_eq!(r.read_mpi().unwrap().as_bytes(), &[0x01, 0xFF]);
        assert_eq!(r.read_u8().unwrap(), 7);
        assert!(r.is_empty());
        assert!(matches!(r.read_u16(), Err(ProtocolError::Truncated { .. })));
    }
}
