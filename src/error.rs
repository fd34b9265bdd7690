//! Error types for the PackStream codec.

use crate::value::Kind;

/// Errors that can occur while packing or unpacking PackStream data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed marker: 0x{0:02X}")]
    MalformedMarker(u8),

    #[error("unexpected type: expected {expected}, found {found:?}")]
    UnexpectedType { expected: &'static str, found: Kind },

    #[error("unexpected end of stream")]
    UnexpectedEof,

    #[error("value too large for packstream encoding: {0}")]
    Overflow(String),

    #[error("map key must be a string")]
    InvalidKey,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn unexpected(expected: &'static str, found: Kind) -> Self {
        Self::UnexpectedType { expected, found }
    }
}
