//! ASCII armor (RFC4880 §6.2).
//!
//! ```text
//! -----BEGIN PGP <LABEL>-----
//! Key: Value
//!
//! <base64, 76 columns>
//! =<base64 CRC-24>
//! -----END PGP <LABEL>-----
//! ```
//!
//! A `SIGNED MESSAGE` section is different: its body is dash-escaped
//! cleartext, closed by an armored `SIGNATURE` section. [`parse_all`]
//! returns it as [`Armored::ClearSigned`] with the text still escaped.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use tracing::debug;

use crate::error::{Error, Result};

const CRC24_INIT: u32 = 0x00B7_04CE;
const CRC24_POLY: u32 = 0x0186_4CFB;
const LINE_WIDTH: usize = 76;

const BEGIN: &str = "-----BEGIN PGP ";
const END: &str = "-----END PGP ";
const DASHES: &str = "-----";

/// Label of a cleartext-signed section.
pub const SIGNED_MESSAGE: &str = "SIGNED MESSAGE";
/// Label of a detached signature section.
pub const SIGNATURE: &str = "SIGNATURE";

/// A decoded armor section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Armor {
    /// Text after `BEGIN PGP `
    pub label: String,
    /// Armor headers in order
    pub headers: Vec<(String, String)>,
    /// Decoded packet bytes
    pub data: Bytes,
}

/// One section of armored text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Armored {
    /// Base64 packet data
    Packets(Armor),
    /// Cleartext followed by its signature section
    ClearSigned {
        /// `Hash:` and other headers of the cleartext section
        headers: Vec<(String, String)>,
        /// Dash-escaped text lines joined with `\n`
        text: String,
        /// The `SIGNATURE` section
        signature: Armor,
    },
}

/// CRC-24 as used by the armor checksum line.
#[must_use]
pub fn crc24(data: &[u8]) -> u32 {
    let mut crc = CRC24_INIT;
    for &byte in data {
        crc ^= u32::from(byte) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= CRC24_POLY;
            }
        }
    }
    crc & 0x00FF_FFFF
}

fn checksum_line(data: &[u8]) -> String {
    let crc = crc24(data).to_be_bytes();
    format!("={}", STANDARD.encode(&crc[1..]))
}

/// Armor `data` under `label`.
#[must_use]
pub fn encode(label: &str, headers: &[(String, String)], data: &[u8]) -> String {
    let mut out = format!("{BEGIN}{label}{DASHES}\n");
    push_headers(&mut out, headers);
    out.push('\n');

    let body = STANDARD.encode(data);
    // base64 output is ASCII, so byte chunks are char boundaries
    for line in body.as_bytes().chunks(LINE_WIDTH) {
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }
    out.push_str(&checksum_line(data));
    out.push('\n');
    out.push_str(&format!("{END}{label}{DASHES}\n"));
    out
}

pub(crate) fn push_headers(out: &mut String, headers: &[(String, String)]) {
    for (key, value) in headers {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
}

fn begin_label(line: &str) -> Option<&str> {
    line.strip_prefix(BEGIN)?.strip_suffix(DASHES)
}

/// Line reader over armored text that tolerates `\r\n` endings.
struct Lines<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        let lines = text.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line)).collect();
        Self { lines, pos: 0 }
    }

    fn next_line(&mut self) -> Option<&'a str> {
        let line = self.lines.get(self.pos).copied()?;
        self.pos += 1;
        Some(line)
    }

    fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.pos).copied()
    }

    /// Advance to the line after the next `BEGIN PGP` line.
    fn find_begin(&mut self) -> Option<&'a str> {
        while let Some(line) = self.next_line() {
            if let Some(label) = begin_label(line.trim_end()) {
                return Some(label);
            }
        }
        None
    }

    fn headers(&mut self) -> Result<Vec<(String, String)>> {
        let mut headers = Vec::new();
        while let Some(line) = self.peek() {
            let Some((key, value)) = line.split_once(": ") else { break };
            headers.push((key.to_owned(), value.trim_end().to_owned()));
            self.pos += 1;
        }
        match self.peek() {
            Some(line) if line.trim().is_empty() => {
                self.pos += 1;
                Ok(headers)
            },
            // Some producers omit the blank line when there are no headers
            Some(_) if headers.is_empty() => Ok(headers),
            _ => Err(Error::parse("armor headers must end with a blank line")),
        }
    }

    fn body(&mut self, label: &str) -> Result<Armor> {
        let headers = self.headers()?;
        let end = format!("{END}{label}{DASHES}");

        let mut encoded = String::new();
        let mut checksum = None;
        loop {
            let Some(line) = self.next_line() else {
                return Err(Error::parse(format!("armor section {label} is not terminated")));
            };
            let line = line.trim();
            if line == end {
                break;
            }
            if line.starts_with(END) {
                return Err(Error::parse(format!("armor section {label} ends with {line}")));
            }
            match line.strip_prefix('=') {
                Some(crc) if crc.len() == 4 => checksum = Some(crc.to_owned()),
                _ => encoded.push_str(line),
            }
        }

        let data = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| Error::parse(format!("invalid armor base64: {e}")))?;
        if let Some(crc) = checksum {
            let expected = STANDARD
                .decode(crc.as_bytes())
                .map_err(|e| Error::parse(format!("invalid armor checksum: {e}")))?;
            let actual = crc24(&data).to_be_bytes();
            if expected.as_slice() != &actual[1..] {
                return Err(Error::parse("armor checksum mismatch"));
            }
        }
        debug!(label, len = data.len(), "armor section decoded");
        Ok(Armor { label: label.to_owned(), headers, data: data.into() })
    }

    fn clear_signed(&mut self) -> Result<Armored> {
        let headers = self.headers()?;
        let mut text = Vec::new();
        loop {
            let Some(line) = self.next_line() else {
                return Err(Error::parse("cleartext without signature"));
            };
            if begin_label(line.trim_end()) == Some(SIGNATURE) {
                break;
            }
            text.push(line);
        }
        let signature = self.body(SIGNATURE)?;
        Ok(Armored::ClearSigned { headers, text: text.join("\n"), signature })
    }
}

/// Every armor section in `text`, in order. Text outside sections is
/// ignored.
///
/// # Errors
///
/// - `Error::Parse` for a malformed section, bad base64 or a checksum
///   mismatch
pub fn parse_all(text: &str) -> Result<Vec<Armored>> {
    let mut lines = Lines::new(text);
    let mut out = Vec::new();
    while let Some(label) = lines.find_begin() {
        let section = if label == SIGNED_MESSAGE {
            lines.clear_signed()?
        } else {
            Armored::Packets(lines.body(label)?)
        };
        out.push(section);
    }
    Ok(out)
}

/// The first non-cleartext armor section in `text`.
///
/// # Errors
///
/// - `Error::Parse` if there is no such section or it is malformed
pub fn parse(text: &str) -> Result<Armor> {
    parse_all(text)?
        .into_iter()
        .find_map(|section| match section {
            Armored::Packets(armor) => Some(armor),
            Armored::ClearSigned { .. } => None,
        })
        .ok_or_else(|| Error::parse("no armor found"))
}
