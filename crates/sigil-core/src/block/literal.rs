//! Literal messages.

use std::borrow::Cow;

use bytes::Bytes;
use sigil_proto::{LiteralData, LiteralFormat};

use super::{Message, MessageBody};

impl Message {
    /// Text literal message without signatures.
    #[must_use]
    pub fn construct_literal(plaintext: impl Into<Bytes>, filename: &str, timestamp: u32) -> Self {
        let literal = LiteralData::new(
            LiteralFormat::Text,
            Bytes::copy_from_slice(filename.as_bytes()),
            timestamp,
            plaintext,
        );
        Self::from(literal)
    }

    /// The literal packet, if this is a literal message.
    #[must_use]
    pub fn literal(&self) -> Option<&LiteralData> {
        match self.body() {
            MessageBody::Literal(literal) => Some(literal),
            _ => None,
        }
    }

    /// Literal payload as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> Option<Cow<'_, str>> {
        self.literal().map(|literal| String::from_utf8_lossy(&literal.data))
    }
}

impl From<LiteralData> for Message {
    fn from(literal: LiteralData) -> Self {
        Self::new(Vec::new(), MessageBody::Literal(literal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructs_text_literal() {
        let message = Message::construct_literal("hello\n", "note.txt", 42);
        let literal = message.literal().unwrap();

        assert_eq!(literal.format, LiteralFormat::Text);
        assert_eq!(&literal.filename[..], b"note.txt");
        assert_eq!(literal.timestamp, 42);
        assert_eq!(message.text().as_deref(), Some("hello\n"));
        assert_eq!(message.bytes_to_sign().unwrap(), Bytes::from_static(b"hello\n"));
    }

    #[test]
    fn long_file_names_are_truncated() {
        let name = "n".repeat(300);
        let message = Message::construct_literal("", &name, 0);
        assert_eq!(message.literal().unwrap().filename.len(), LiteralData::MAX_FILENAME);
    }
}
