//! Packet header and body-length framing (RFC4880 §4.2).
//!
//! Two header formats exist on the wire:
//!
//! ```text
//! Old: 1 0 t t t t l l   tag in bits 5..2, length type in bits 1..0
//!        ll = 0 → 1-byte length, 1 → 2-byte, 2 → 4-byte, 3 → to end of input
//!
//! New: 1 1 t t t t t t   tag in bits 5..0, then a new-format length:
//!        0..=191          one-byte length
//!        192..=223  b2    ((b1 - 192) << 8) + b2 + 192
//!        224..=254        partial body of 1 << (b1 & 0x1F) bytes, more follow
//!        255  u32         four-byte big-endian length
//! ```
//!
//! Partial bodies are concatenated until a segment with a definite length
//! terminates the packet. RFC4880 requires the first partial segment to be at
//! least 512 bytes; that rule binds writers and is not enforced on read, so a
//! shorter first segment still frames. Encoding never emits partial bodies:
//! it always uses the new format with the shortest definite length, which is
//! the canonical encoding.

use bytes::{BufMut, Bytes, BytesMut};

use crate::errors::{ProtocolError, Result};

/// Header form of a decoded packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderFormat {
    /// Legacy format (bit 6 clear)
    Old,
    /// New format (bit 6 set)
    New,
}

/// One framed packet: tag value and the complete (reassembled) body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    /// Wire tag value
    pub tag: u8,
    /// Header form the packet arrived in
    pub format: HeaderFormat,
    /// Body bytes, partial segments already concatenated
    pub body: Bytes,
}

/// A new-format length octet sequence, decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NewLength {
    Definite(usize),
    Partial(usize),
}

/// Frame one packet from the front of `input`.
///
/// Returns the packet and the number of input bytes it occupied.
///
/// # Errors
///
/// - `ProtocolError::InvalidHeader` if bit 7 of the first octet is clear
/// - `ProtocolError::Truncated` if the length octets or body run past the end
///   of `input`
///
/// # Security
///
/// Declared lengths are checked against the remaining input before any body
/// bytes are sliced; a hostile length cannot cause an over-read or a large
/// allocation beyond the input size.
pub fn read_packet(input: &Bytes) -> Result<(RawPacket, usize)> {
    let Some(&first) = input.first() else {
        return Err(ProtocolError::Truncated { expected: 1, actual: 0 });
    };
    if first & 0x80 == 0 {
        return Err(ProtocolError::InvalidHeader(first));
    }

    if first & 0x40 == 0 {
        let tag = (first & 0x3F) >> 2;
        let (len, header_len) = match first & 0x03 {
            0 => (usize::from(byte_at(input, 1)?), 2),
            1 => (usize::from(u16::from_be_bytes([byte_at(input, 1)?, byte_at(input, 2)?])), 3),
            2 => (read_u32(input, 1)? as usize, 5),
            _ => (input.len() - 1, 1),
        };
        let body = slice_checked(input, header_len, len)?;
        return Ok((RawPacket { tag, format: HeaderFormat::Old, body }, header_len + len));
    }

    let tag = first & 0x3F;
    let mut pos = 1;
    let mut segments = BytesMut::new();
    loop {
        let (length, consumed) = read_new_length(input, pos)?;
        pos += consumed;
        match length {
            NewLength::Definite(len) => {
                let segment = slice_checked(input, pos, len)?;
                pos += len;
                let body = if segments.is_empty() {
                    segment
                } else {
                    segments.extend_from_slice(&segment);
                    segments.freeze()
                };
                return Ok((RawPacket { tag, format: HeaderFormat::New, body }, pos));
            },
            NewLength::Partial(len) => {
                segments.extend_from_slice(&slice_checked(input, pos, len)?);
                pos += len;
            },
        }
    }
}

/// Write a new-format header for `tag` and a body of `len` bytes.
///
/// # Errors
///
/// - `ProtocolError::Serialization` if `tag` exceeds 63 or `len` exceeds
///   `u32::MAX`
pub fn write_header(dst: &mut impl BufMut, tag: u8, len: usize) -> Result<()> {
    if tag > crate::Tag::MAX {
        return Err(ProtocolError::Serialization(format!("tag {tag} does not fit six bits")));
    }
    dst.put_u8(0xC0 | tag);
    write_length(dst, len)
}

/// Write the shortest new-format length for `len` (also used by signature
/// subpackets).
///
/// # Errors
///
/// - `ProtocolError::Serialization` if `len` exceeds `u32::MAX`
pub fn write_length(dst: &mut impl BufMut, len: usize) -> Result<()> {
    match len {
        0..=191 => dst.put_u8(len as u8),
        192..=8383 => {
            let v = len - 192;
            dst.put_u8((v >> 8) as u8 + 192);
            dst.put_u8((v & 0xFF) as u8);
        },
        _ => {
            let len = u32::try_from(len).map_err(|_| {
                ProtocolError::Serialization(format!("body of {len} bytes exceeds u32 length"))
            })?;
            dst.put_u8(0xFF);
            dst.put_u32(len);
        },
    }
    Ok(())
}

/// Read a subpacket length (new-format rules without partial bodies).
///
/// Returns the length and the number of octets it used.
pub(crate) fn read_subpacket_length(input: &[u8]) -> Result<(usize, usize)> {
    let first = *input.first().ok_or(ProtocolError::Truncated { expected: 1, actual: 0 })?;
    match first {
        0..=191 => Ok((usize::from(first), 1)),
        192..=254 => {
            let second = *input.get(1).ok_or(ProtocolError::Truncated { expected: 2, actual: 1 })?;
            Ok(((usize::from(first - 192) << 8) + usize::from(second) + 192, 2))
        },
        255 => {
            let bytes: [u8; 4] = input
                .get(1..5)
                .and_then(|b| b.try_into().ok())
                .ok_or(ProtocolError::Truncated { expected: 5, actual: input.len() })?;
            Ok((u32::from_be_bytes(bytes) as usize, 5))
        },
    }
}

fn read_new_length(input: &[u8], pos: usize) -> Result<(NewLength, usize)> {
    let first = byte_at(input, pos)?;
    match first {
        0..=191 => Ok((NewLength::Definite(usize::from(first)), 1)),
        192..=223 => {
            let second = byte_at(input, pos + 1)?;
            Ok((NewLength::Definite((usize::from(first - 192) << 8) + usize::from(second) + 192), 2))
        },
        224..=254 => Ok((NewLength::Partial(1 << (first & 0x1F)), 1)),
        255 => Ok((NewLength::Definite(read_u32(input, pos + 1)? as usize), 5)),
    }
}

fn byte_at(input: &[u8], pos: usize) -> Result<u8> {
    input
        .get(pos)
        .copied()
        .ok_or(ProtocolError::Truncated { expected: pos + 1, actual: input.len() })
}

fn read_u32(input: &[u8], pos: usize) -> Result<u32> {
    let bytes: [u8; 4] = input
        .get(pos..pos + 4)
        .and_then(|b| b.try_into().ok())
        .ok_or(ProtocolError::Truncated { expected: pos + 4, actual: input.len() })?;
    Ok(u32::from_be_bytes(bytes))
}

fn slice_checked(input: &Bytes, start: usize, len: usize) -> Result<Bytes> {
    let end = start.checked_add(len).ok_or(ProtocolError::Truncated {
        expected: usize::MAX,
        actual: input.len(),
    })?;
    if end > input.len() {
        return Err(ProtocolError::Truncated { expected: end, actual: input.len() });
    }
    Ok(input.slice(start..end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(bytes: &[u8]) -> Result<(RawPacket, usize)> {
        read_packet(&Bytes::copy_from_slice(bytes))
    }

    #[test]
    fn old_format_one_byte_length() {
        // Tag 11 (literal), length type 0
        let (packet, used) = frame(&[0xAC, 0x02, 0xAA, 0xBB, 0xFF]).unwrap();
        assert_eq!(packet.tag, 11);
        assert_eq!(packet.format, HeaderFormat::Old);
        assert_eq!(&packet.body[..], &[0xAA, 0xBB]);
        assert_eq!(used, 4);
    }

    #[test]
    fn old_format_indeterminate_reads_to_end() {
        let (packet, used) = frame(&[0xA3, 1, 2, 3]).unwrap();
        assert_eq!(packet.tag, 8);
        assert_eq!(&packet.body[..], &[1, 2, 3]);
        assert_eq!(used, 4);
    }

    #[test]
    fn new_format_two_byte_length() {
        let mut input = vec![0xCB, 0xC0, 0x08];
        input.extend(std::iter::repeat_n(7u8, 200));
        let (packet, used) = frame(&input).unwrap();
        assert_eq!(packet.body.len(), 200);
        assert_eq!(used, 203);
    }

    #[test]
    fn partial_bodies_are_concatenated() {
        // 512-byte partial segment then 3 definite bytes
        let mut input = vec![0xCB, 0xE9];
        input.extend(std::iter::repeat_n(1u8, 512));
        input.extend([0x03, 2, 2, 2]);
        let (packet, used) = frame(&input).unwrap();
        assert_eq!(packet.body.len(), 515);
        assert_eq!(&packet.body[512..], &[2, 2, 2]);
        assert_eq!(used, input.len());
    }

    #[test]
    fn short_first_partial_segment_is_accepted() {
        // 2-byte partial segment, below the 512-byte minimum writers must use
        let input = [0xCB, 0xE1, 1, 1, 0x01, 2];
        let (packet, used) = frame(&input).unwrap();
        assert_eq!(&packet.body[..], &[1, 1, 2]);
        assert_eq!(used, input.len());

        // re-encoding uses one definite length instead
        let mut buf = Vec::new();
        write_header(&mut buf, packet.tag, packet.body.len()).unwrap();
        assert_eq!(buf, [0xCB, 0x03]);
    }

    #[test]
    fn truncation_is_an_error_not_a_partial_packet() {
        assert!(matches!(frame(&[0xCB, 0x05, 1, 2]), Err(ProtocolError::Truncated { .. })));
        assert!(matches!(frame(&[0xCB, 0xFF, 0, 0]), Err(ProtocolError::Truncated { .. })));
        assert!(matches!(frame(&[0xCB, 0xE1, 0]), Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn missing_high_bit_is_invalid() {
        assert_eq!(frame(&[0x0B, 0x00]), Err(ProtocolError::InvalidHeader(0x0B)));
    }

    #[test]
    fn length_encoding_boundaries() {
        let cases = [(0usize, 1usize), (191, 1), (192, 2), (8383, 2), (8384, 5), (100_000, 5)];
        for (len, expected) in cases {
            let mut buf = Vec::new();
            write_length(&mut buf, len).unwrap();
            assert_eq!(buf.len(), expected, "length {len}");

            let (decoded, used) = read_new_length(&buf, 0).unwrap();
            assert_eq!(decoded, NewLength::Definite(len));
            assert_eq!(used, expected);
        }
    }
}
