//! Tagged value payloads.
//!
//! The map store keeps every value as raw bytes plus a format tag. A `Json`
//! payload is UTF-8 JSON text the store may inspect (for predicates); a
//! `Binary` payload is an opaque blob.

use bytes::Bytes;

use crate::error::Error;

/// A stored value together with its wire-format tag.
///
/// Cloning is cheap: the bytes are reference counted, so one payload can be
/// handed to every subscribed listener without copying.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Payload {
    /// Structured JSON text.
    Json(Bytes),
    /// Opaque bytes the store never interprets.
    Binary(Bytes),
}

impl Payload {
    /// Tag bytes as JSON without validating them.
    pub fn json(bytes: impl Into<Bytes>) -> Self {
        Payload::Json(bytes.into())
    }

    /// Tag bytes as an opaque blob.
    pub fn binary(bytes: impl Into<Bytes>) -> Self {
        Payload::Binary(bytes.into())
    }

    /// Check whether the payload carries the JSON tag.
    pub fn is_json(&self) -> bool {
        matches!(self, Payload::Json(_))
    }

    /// Name of the format tag.
    pub fn format(&self) -> &'static str {
        match self {
            Payload::Json(_) => "json",
            Payload::Binary(_) => "binary",
        }
    }

    /// Raw bytes regardless of tag.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Json(b) | Payload::Binary(b) => b,
        }
    }

    /// JSON bytes, or `None` for an untagged blob.
    pub fn as_json(&self) -> Option<&[u8]> {
        match self {
            Payload::Json(b) => Some(b),
            Payload::Binary(_) => None,
        }
    }

    /// Parse the payload into a generic JSON document.
    ///
    /// Fails when the payload is not tagged JSON or the bytes do not parse.
    pub fn to_document(&self) -> Result<serde_json::Value, Error> {
        match self {
            Payload::Json(bytes) => Ok(serde_json::from_slice(bytes)?),
            Payload::Binary(_) => Err(Error::FormatMismatch {
                expected: "json",
                actual: self.format(),
            }),
        }
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Check whether the payload holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}
