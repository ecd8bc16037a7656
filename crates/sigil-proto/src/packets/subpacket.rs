//! Signature subpackets (RFC4880 §5.2.3.1).
//!
//! Each subpacket is `length ‖ type ‖ body`, where the length covers the type
//! octet and uses the new-format length rules without partial bodies. Bit 7
//! of the type octet marks the subpacket as critical.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    errors::{ProtocolError, Result},
    header::{read_subpacket_length, write_length},
    key_id::KeyId,
};

/// Key flag: may certify other keys.
pub const FLAG_CERTIFY: u8 = 0x01;
/// Key flag: may sign data.
pub const FLAG_SIGN: u8 = 0x02;
/// Key flag: may encrypt communications.
pub const FLAG_ENCRYPT_COMMUNICATIONS: u8 = 0x04;
/// Key flag: may encrypt storage.
pub const FLAG_ENCRYPT_STORAGE: u8 = 0x08;

/// Decoded subpacket body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubpacketValue {
    /// Type 2: signature creation time
    SignatureCreationTime(u32),
    /// Type 3: seconds after creation at which the signature expires
    SignatureExpirationTime(u32),
    /// Type 9: seconds after key creation at which the key expires
    KeyExpirationTime(u32),
    /// Type 11: preferred symmetric algorithm ids
    PreferredSymmetric(Bytes),
    /// Type 16: issuer key id
    Issuer(KeyId),
    /// Type 21: preferred hash algorithm ids
    PreferredHash(Bytes),
    /// Type 22: preferred compression algorithm ids
    PreferredCompression(Bytes),
    /// Type 25: primary user id flag
    PrimaryUserId(bool),
    /// Type 27: key usage flags
    KeyFlags(Bytes),
    /// Type 32: embedded (back-)signature, undecoded
    EmbeddedSignature(Bytes),
    /// Any other subpacket, kept verbatim
    Other {
        /// Type octet without the critical bit
        kind: u8,
        /// Raw body
        body: Bytes,
    },
}

/// One signature subpacket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subpacket {
    /// Critical bit
    pub critical: bool,
    /// Body
    pub value: SubpacketValue,
}

impl Subpacket {
    /// Non-critical subpacket.
    #[must_use]
    pub fn new(value: SubpacketValue) -> Self {
        Self { critical: false, value }
    }

    fn kind(&self) -> u8 {
        match &self.value {
            SubpacketValue::SignatureCreationTime(_) => 2,
            SubpacketValue::SignatureExpirationTime(_) => 3,
            SubpacketValue::KeyExpirationTime(_) => 9,
            SubpacketValue::PreferredSymmetric(_) => 11,
            SubpacketValue::Issuer(_) => 16,
            SubpacketValue::PreferredHash(_) => 21,
            SubpacketValue::PreferredCompression(_) => 22,
            SubpacketValue::PrimaryUserId(_) => 25,
            SubpacketValue::KeyFlags(_) => 27,
            SubpacketValue::EmbeddedSignature(_) => 32,
            SubpacketValue::Other { kind, .. } => *kind,
        }
    }

    fn decode(kind: u8, critical: bool, body: Bytes) -> Result<Self> {
        let value = match kind {
            2 => SubpacketValue::SignatureCreationTime(fixed_u32(&body)?),
            3 => SubpacketValue::SignatureExpirationTime(fixed_u32(&body)?),
            9 => SubpacketValue::KeyExpirationTime(fixed_u32(&body)?),
            11 => SubpacketValue::PreferredSymmetric(body),
            16 => {
                let id = <[u8; 8]>::try_from(&body[..])
                    .map_err(|_| ProtocolError::malformed("signature", "issuer must be 8 bytes"))?;
                SubpacketValue::Issuer(KeyId::new(id))
            },
            21 => SubpacketValue::PreferredHash(body),
            22 => SubpacketValue::PreferredCompression(body),
            25 => match body[..] {
                [flag] => SubpacketValue::PrimaryUserId(flag != 0),
                _ => return Err(ProtocolError::malformed("signature", "primary user id flag size")),
            },
            27 => SubpacketValue::KeyFlags(body),
            32 => SubpacketValue::EmbeddedSignature(body),
            kind => SubpacketValue::Other { kind, body },
        };
        Ok(Self { critical, value })
    }

    fn encode_value(&self, dst: &mut BytesMut) {
        match &self.value {
            SubpacketValue::SignatureCreationTime(t)
            | SubpacketValue::SignatureExpirationTime(t)
            | SubpacketValue::KeyExpirationTime(t) => dst.put_u32(*t),
            SubpacketValue::Issuer(id) => dst.put_slice(id.as_bytes()),
            SubpacketValue::PrimaryUserId(flag) => dst.put_u8(u8::from(*flag)),
            SubpacketValue::PreferredSymmetric(b)
            | SubpacketValue::PreferredHash(b)
            | SubpacketValue::PreferredCompression(b)
            | SubpacketValue::KeyFlags(b)
            | SubpacketValue::EmbeddedSignature(b)
            | SubpacketValue::Other { body: b, .. } => dst.put_slice(b),
        }
    }
}

/// Decode a whole subpacket area.
///
/// # Errors
///
/// - `ProtocolError::Truncated` if a length runs past the area
/// - `ProtocolError::Malformed` for zero-length subpackets or fixed-size
///   bodies of the wrong size
pub fn decode_area(area: &Bytes) -> Result<Vec<Subpacket>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < area.len() {
        let (len, used) = read_subpacket_length(&area[pos..])?;
        pos += used;
        if len == 0 {
            return Err(ProtocolError::malformed("signature", "empty subpacket"));
        }
        if pos + len > area.len() {
            return Err(ProtocolError::Truncated { expected: pos + len, actual: area.len() });
        }
        let kind_octet = area[pos];
        let body = area.slice(pos + 1..pos + len);
        out.push(Subpacket::decode(kind_octet & 0x7F, kind_octet & 0x80 != 0, body)?);
        pos += len;
    }
    Ok(out)
}

/// Encode a subpacket area (without its two-octet length prefix).
///
/// # Errors
///
/// - `ProtocolError::Serialization` if a subpacket body is too large
pub fn encode_area(subpackets: &[Subpacket]) -> Result<Bytes> {
    let mut out = BytesMut::new();
    let mut body = BytesMut::new();
    for sub in subpackets {
        body.clear();
        sub.encode_value(&mut body);
        write_length(&mut out, body.len() + 1)?;
        out.put_u8(sub.kind() | if sub.critical { 0x80 } else { 0 });
        out.put_slice(&body);
    }
    Ok(out.freeze())
}

fn fixed_u32(body: &[u8]) -> Result<u32> {
    let bytes: [u8; 4] = body
        .try_into()
        .map_err(|_| ProtocolError::malformed("signature", "time subpacket must be 4 bytes"))?;
    Ok(u32::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_round_trip_preserves_critical_bit_and_unknowns() {
        let subs = vec![
            Subpacket { critical: true, value: SubpacketValue::SignatureCreationTime(0x1234_5678) },
            Subpacket::new(SubpacketValue::Issuer(KeyId::new([1; 8]))),
            Subpacket::new(SubpacketValue::Other { kind: 100, body: Bytes::from_static(b"x") }),
        ];
        let area = encode_area(&subs).unwrap();
        assert_eq!(&area[..6], &[5, 0x82, 0x12, 0x34, 0x56, 0x78]);
        assert_eq!(decode_area(&area).unwrap(), subs);
    }

    #[test]
    fn overlong_length_is_truncated() {
        let area = Bytes::from_static(&[9, 2, 0, 0]);
        assert!(matches!(decode_area(&area), Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn wrong_size_time_is_malformed() {
        let area = Bytes::from_static(&[3, 2, 0, 0]);
        assert!(matches!(decode_area(&area), Err(ProtocolError::Malformed { .. })));
    }
}
