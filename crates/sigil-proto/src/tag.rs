//! Packet tags.

/// OpenPGP packet tag (RFC4880 §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Public-Key Encrypted Session Key (1)
    PublicKeyEsk,
    /// Signature (2)
    Signature,
    /// Symmetric-Key Encrypted Session Key (3)
    SymmetricKeyEsk,
    /// One-Pass Signature (4)
    OnePassSignature,
    /// Secret Key (5)
    SecretKey,
    /// Public Key (6)
    PublicKey,
    /// Secret Subkey (7)
    SecretSubkey,
    /// Compressed Data (8)
    CompressedData,
    /// Symmetrically Encrypted Data (9)
    SymEncryptedData,
    /// Marker (10)
    Marker,
    /// Literal Data (11)
    LiteralData,
    /// Trust (12)
    Trust,
    /// User ID (13)
    UserId,
    /// Public Subkey (14)
    PublicSubkey,
    /// User Attribute (17)
    UserAttribute,
    /// Symmetrically Encrypted Integrity Protected Data (18)
    SymEncryptedProtectedData,
    /// Modification Detection Code (19), only valid inside tag 18 plaintext
    ModificationDetectionCode,
    /// Private or experimental tag (60..=63)
    Private(u8),
}

impl Tag {
    /// Highest encodable tag (six bits in new-format headers).
    pub const MAX: u8 = 63;

    /// Private-use range.
    pub const PRIVATE_RANGE: std::ops::RangeInclusive<u8> = 60..=63;

    /// Convert to the wire value.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        match self {
            Self::PublicKeyEsk => 1,
            Self::Signature => 2,
            Self::SymmetricKeyEsk => 3,
            Self::OnePassSignature => 4,
            Self::SecretKey => 5,
            Self::PublicKey => 6,
            Self::SecretSubkey => 7,
            Self::CompressedData => 8,
            Self::SymEncryptedData => 9,
            Self::Marker => 10,
            Self::LiteralData => 11,
            Self::Trust => 12,
            Self::UserId => 13,
            Self::PublicSubkey => 14,
            Self::UserAttribute => 17,
            Self::SymEncryptedProtectedData => 18,
            Self::ModificationDetectionCode => 19,
            Self::Private(tag) => tag,
        }
    }

    /// Parse a wire value. `None` for reserved or unassigned tags.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::PublicKeyEsk),
            2 => Some(Self::Signature),
            3 => Some(Self::SymmetricKeyEsk),
            4 => Some(Self::OnePassSignature),
            5 => Some(Self::SecretKey),
            6 => Some(Self::PublicKey),
            7 => Some(Self::SecretSubkey),
            8 => Some(Self::CompressedData),
            9 => Some(Self::SymEncryptedData),
            10 => Some(Self::Marker),
            11 => Some(Self::LiteralData),
            12 => Some(Self::Trust),
            13 => Some(Self::UserId),
            14 => Some(Self::PublicSubkey),
            17 => Some(Self::UserAttribute),
            18 => Some(Self::SymEncryptedProtectedData),
            19 => Some(Self::ModificationDetectionCode),
            v if Self::PRIVATE_RANGE.contains(&v) => Some(Self::Private(v)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tags_round_trip() {
        for v in 0..=Tag::MAX {
            if let Some(tag) = Tag::from_u8(v) {
                assert_eq!(tag.to_u8(), v);
            }
        }
    }

    #[test]
    fn reserved_and_gaps_are_unknown() {
        assert_eq!(Tag::from_u8(0), None);
        assert_eq!(Tag::from_u8(15), None);
        assert_eq!(Tag::from_u8(59), None);
        assert_eq!(Tag::from_u8(61), Some(Tag::Private(61)));
    }
}
