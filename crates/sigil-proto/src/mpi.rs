//! Multiprecision integers (RFC4880 §3.2).

use bytes::{BufMut, Bytes};

/// An MPI: big-endian magnitude with a two-octet bit count on the wire.
///
/// # Invariants
///
/// - The stored magnitude never has leading zero octets, so the encoded bit
///   count is always the canonical one.
#[derive(Clone, PartialEq, Eq)]
pub struct Mpi(Bytes);

impl std::fmt::Debug for Mpi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Mpi({} bits)", self.bit_len())
    }
}

impl Mpi {
    /// Build from big-endian bytes, stripping leading zeros.
    #[must_use]
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        Self(bytes.slice(skip..))
    }

    /// Magnitude without leading zeros.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of significant bits.
    #[must_use]
    pub fn bit_len(&self) -> usize {
        match self.0.first() {
            Some(&top) => (self.0.len() - 1) * 8 + (8 - top.leading_zeros() as usize),
            None => 0,
        }
    }

    /// Encoded size including the bit-count prefix.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        2 + self.0.len()
    }

    /// Write bit count and magnitude.
    pub fn encode(&self, dst: &mut impl BufMut) {
        // INVARIANT: decoded MPIs never exceed 65535 bits
        dst.put_u16(u16::try_from(self.bit_len()).unwrap_or(u16::MAX));
        dst.put_slice(&self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_length_ignores_leading_zeros() {
        assert_eq!(Mpi::new(vec![0, 0, 0x01, 0xFF]).bit_len(), 9);
        assert_eq!(Mpi::new(vec![0x80]).bit_len(), 8);
        assert_eq!(Mpi::new(Vec::new()).bit_len(), 0);
    }

    #[test]
    fn encoding_matches_rfc_example() {
        // RFC4880: [00 09 01 FF] encodes 511
        let mut buf = Vec::new();
        Mpi::new(vec![0x01, 0xFF]).encode(&mut buf);
        assert_eq!(buf, [0x00, 0x09, 0x01, 0xFF]);
    }
}
