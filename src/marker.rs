//! PackStream marker byte constants and type classification.

use crate::error::Error;
use crate::value::Kind;

// Null
pub const NULL: u8 = 0xC0;

// Boolean
pub const FALSE: u8 = 0xC2;
pub const TRUE: u8 = 0xC3;

// Float (IEEE 754 double-precision)
pub const FLOAT_64: u8 = 0xC1;

// Integer (beyond TINY_INT range)
pub const INT_8: u8 = 0xC8;
pub const INT_16: u8 = 0xC9;
pub const INT_32: u8 = 0xCA;
pub const INT_64: u8 = 0xCB;

// TINY_INT: single byte, range -16..=127
// Positive: 0x00..=0x7F (0..127)
// Negative: 0xF0..=0xFF (-16..-1)

// Bytes (no tiny class)
pub const BYTES_8: u8 = 0xCC;
pub const BYTES_16: u8 = 0xCD;
pub const BYTES_32: u8 = 0xCE;

// String
// TINY_STRING: 0x80..=0x8F (high nibble 0x8, low = byte length 0..15)
pub const STRING_8: u8 = 0xD0;
pub const STRING_16: u8 = 0xD1;
pub const STRING_32: u8 = 0xD2;

// List
// TINY_LIST: 0x90..=0x9F (high nibble 0x9, low = item count 0..15)
pub const LIST_8: u8 = 0xD4;
pub const LIST_16: u8 = 0xD5;
pub const LIST_32: u8 = 0xD6;

// Map
// TINY_MAP: 0xA0..=0xAF (high nibble 0xA, low = pair count 0..15)
pub const MAP_8: u8 = 0xD8;
pub const MAP_16: u8 = 0xD9;
pub const MAP_32: u8 = 0xDA;

// Struct
// TINY_STRUCT: 0xB0..=0xBF (high nibble 0xB, low = field count 0..15)
pub const STRUCT_8: u8 = 0xDC;
pub const STRUCT_16: u8 = 0xDD;
// No STRUCT_32: struct field counts are bounded to u16 (0..65535).

// High-nibble masks for tiny types.
pub const TINY_STRING_NIBBLE: u8 = 0x80;
pub const TINY_LIST_NIBBLE: u8 = 0x90;
pub const TINY_MAP_NIBBLE: u8 = 0xA0;
pub const TINY_STRUCT_NIBBLE: u8 = 0xB0;

/// Classifies a marker byte into its `Kind` without consuming any payload.
///
/// Unassigned ranges (`0xC4..0xC7`, `0xCF`, `0xD3`, `0xD7`, `0xDB`,
/// `0xDE..0xEF`) fail with `MalformedMarker`.
pub fn classify(m: u8) -> Result<Kind, Error> {
    match m {
        NULL => Ok(Kind::Null),
        FALSE | TRUE => Ok(Kind::Boolean),
        FLOAT_64 => Ok(Kind::Float),
        INT_8 | INT_16 | INT_32 | INT_64 => Ok(Kind::Integer),
        BYTES_8 | BYTES_16 | BYTES_32 => Ok(Kind::Bytes),
        STRING_8 | STRING_16 | STRING_32 => Ok(Kind::String),
        LIST_8 | LIST_16 | LIST_32 => Ok(Kind::List),
        MAP_8 | MAP_16 | MAP_32 => Ok(Kind::Map),
        STRUCT_8 | STRUCT_16 => Ok(Kind::Struct),
        _ if m <= 0x7F => Ok(Kind::Integer),
        _ if m >= 0xF0 => Ok(Kind::Integer),
        _ => {
            let high = m & 0xF0;
            match high {
                TINY_STRING_NIBBLE => Ok(Kind::String),
                TINY_LIST_NIBBLE => Ok(Kind::List),
                TINY_MAP_NIBBLE => Ok(Kind::Map),
                TINY_STRUCT_NIBBLE => Ok(Kind::Struct),
                _ => Err(Error::MalformedMarker(m)),
            }
        }
    }
}
