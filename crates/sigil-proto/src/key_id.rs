//! Eight-octet key identifiers.

use std::fmt;

/// Low 64 bits of a key fingerprint (v4) or RSA modulus (v3).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId([u8; 8]);

impl KeyId {
    /// All-zero id: "any key" in PK-ESKs and the fallback issuer of a
    /// signature without an issuer subpacket.
    pub const WILDCARD: Self = Self([0; 8]);

    /// Wrap raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Take the last eight bytes of `data` (left-padding short input).
    #[must_use]
    pub fn from_tail(data: &[u8]) -> Self {
        let mut out = [0u8; 8];
        let take = data.len().min(8);
        out[8 - take..].copy_from_slice(&data[data.len() - take..]);
        Self(out)
    }

    /// Raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// True for [`KeyId::WILDCARD`].
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        *self == Self::WILDCARD
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({self})")
    }
}
