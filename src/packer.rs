//! PackStream encoding: emits marker+payload sequences for each value kind.

use tokio::io::AsyncWrite;

use crate::error::Error;
use crate::marker;
use crate::sink::ByteSink;
use crate::value::{Struct, Value};

/// Maximum struct field count (§4.1: struct lengths are 0..=65535, no
/// struct32 size class).
const MAX_STRUCT_FIELDS: usize = u16::MAX as usize;

/// Maximum string/bytes/list/map length the format's largest size class
/// (a 32-bit length prefix) can represent.
const MAX_SIZE_32: usize = (1usize << 31) - 1;

/// Drives a `ByteSink`, selecting the narrowest legal PackStream encoding
/// for every value.
pub struct Packer<W> {
    sink: ByteSink<W>,
}

impl<W: AsyncWrite + Unpin> Packer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            sink: ByteSink::new(writer),
        }
    }

    pub fn with_capacity(writer: W, capacity: usize) -> Self {
        Self {
            sink: ByteSink::with_capacity(writer, capacity),
        }
    }

    pub fn reset(&mut self, writer: W) {
        self.sink.reset(writer);
    }

    pub async fn flush(&mut self) -> Result<(), Error> {
        self.sink.flush().await
    }

    pub async fn pack_null(&mut self) -> Result<(), Error> {
        self.sink.write_u8(marker::NULL).await
    }

    pub async fn pack_bool(&mut self, value: bool) -> Result<(), Error> {
        self.sink
            .write_u8(if value { marker::TRUE } else { marker::FALSE })
            .await
    }

    /// Selects the narrowest legal size class: tiny (-16..=127), Int8, Int16,
    /// Int32, or Int64, in that order.
    pub async fn pack_int(&mut self, value: i64) -> Result<(), Error> {
        if (-16..=127).contains(&value) {
            self.sink.write_u8(value as u8).await
        } else if i64::from(i8::MIN) <= value && value <= i64::from(i8::MAX) {
            self.sink.write_u8(marker::INT_8).await?;
            self.sink.write_i8(value as i8).await
        } else if i64::from(i16::MIN) <= value && value <= i64::from(i16::MAX) {
            self.sink.write_u8(marker::INT_16).await?;
            self.sink.write_i16(value as i16).await
        } else if i64::from(i32::MIN) <= value && value <= i64::from(i32::MAX) {
            self.sink.write_u8(marker::INT_32).await?;
            self.sink.write_i32(value as i32).await
        } else {
            self.sink.write_u8(marker::INT_64).await?;
            self.sink.write_i64(value).await
        }
    }

    pub async fn pack_float(&mut self, value: f64) -> Result<(), Error> {
        self.sink.write_u8(marker::FLOAT_64).await?;
        self.sink.write_f64(value).await
    }

    pub async fn pack_string(&mut self, value: &str) -> Result<(), Error> {
        self.pack_string_bytes(value.as_bytes()).await
    }

    /// Packs a string directly from a raw UTF-8 byte buffer. Produces
    /// identical wire output to `pack_string` for valid UTF-8 input; invalid
    /// UTF-8 is written through as-is (the caller's precondition to honor).
    pub async fn pack_string_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let len = bytes.len();
        if len > MAX_SIZE_32 {
            return Err(Error::Overflow(format!(
                "string of {len} bytes exceeds the maximum PackStream string length"
            )));
        }
        if len <= 15 {
            self.sink
                .write_u8(marker::TINY_STRING_NIBBLE | len as u8)
                .await?;
        } else if len <= 255 {
            self.sink.write_u8(marker::STRING_8).await?;
            self.sink.write_u8(len as u8).await?;
        } else if len <= 65535 {
            self.sink.write_u8(marker::STRING_16).await?;
            self.sink.write_u16(len as u16).await?;
        } else {
            self.sink.write_u8(marker::STRING_32).await?;
            self.sink.write_u32(len as u32).await?;
        }
        self.sink.write_slice(bytes).await
    }

    pub async fn pack_bytes(&mut self, value: &[u8]) -> Result<(), Error> {
        let len = value.len();
        if len > MAX_SIZE_32 {
            return Err(Error::Overflow(format!(
                "byte array of {len} bytes exceeds the maximum PackStream bytes length"
            )));
        }
        if len <= 255 {
            self.sink.write_u8(marker::BYTES_8).await?;
            self.sink.write_u8(len as u8).await?;
        } else if len <= 65535 {
            self.sink.write_u8(marker::BYTES_16).await?;
            self.sink.write_u16(len as u16).await?;
        } else {
            self.sink.write_u8(marker::BYTES_32).await?;
            self.sink.write_u32(len as u32).await?;
        }
        self.sink.write_slice(value).await
    }

    pub async fn pack_list_header(&mut self, len: usize) -> Result<(), Error> {
        if len > MAX_SIZE_32 {
            return Err(Error::Overflow(format!(
                "list of {len} elements exceeds the maximum PackStream list length"
            )));
        }
        if len <= 15 {
            self.sink
                .write_u8(marker::TINY_LIST_NIBBLE | len as u8)
                .await
        } else if len <= 255 {
            self.sink.write_u8(marker::LIST_8).await?;
            self.sink.write_u8(len as u8).await
        } else if len <= 65535 {
            self.sink.write_u8(marker::LIST_16).await?;
            self.sink.write_u16(len as u16).await
        } else {
            self.sink.write_u8(marker::LIST_32).await?;
            self.sink.write_u32(len as u32).await
        }
    }

    pub async fn pack_map_header(&mut self, len: usize) -> Result<(), Error> {
        if len > MAX_SIZE_32 {
            return Err(Error::Overflow(format!(
                "map of {len} pairs exceeds the maximum PackStream map length"
            )));
        }
        if len <= 15 {
            self.sink
                .write_u8(marker::TINY_MAP_NIBBLE | len as u8)
                .await
        } else if len <= 255 {
            self.sink.write_u8(marker::MAP_8).await?;
            self.sink.write_u8(len as u8).await
        } else if len <= 65535 {
            self.sink.write_u8(marker::MAP_16).await?;
            self.sink.write_u16(len as u16).await
        } else {
            self.sink.write_u8(marker::MAP_32).await?;
            self.sink.write_u32(len as u32).await
        }
    }

    pub async fn pack_struct_header(&mut self, field_count: usize, signature: u8) -> Result<(), Error> {
        if field_count > MAX_STRUCT_FIELDS {
            return Err(Error::Overflow(format!(
                "struct of {field_count} fields exceeds the maximum PackStream struct field count"
            )));
        }
        if field_count <= 15 {
            self.sink
                .write_u8(marker::TINY_STRUCT_NIBBLE | field_count as u8)
                .await?;
        } else if field_count <= 255 {
            self.sink.write_u8(marker::STRUCT_8).await?;
            self.sink.write_u8(field_count as u8).await?;
        } else {
            self.sink.write_u8(marker::STRUCT_16).await?;
            self.sink.write_u16(field_count as u16).await?;
        }
        self.sink.write_u8(signature).await
    }

    /// Packs a materialized list by writing the header then each child,
    /// one at a time, through the same primitives `pack` uses — so one-shot
    /// encoding and header-then-children streaming encoding always agree.
    pub async fn pack_list(&mut self, items: &[Value]) -> Result<(), Error> {
        self.pack_list_header(items.len()).await?;
        for item in items {
            Box::pin(self.pack(item)).await?;
        }
        Ok(())
    }

    /// Packs a materialized string-keyed map, preserving the slice's order.
    pub async fn pack_map(&mut self, entries: &[(String, Value)]) -> Result<(), Error> {
        self.pack_map_header(entries.len()).await?;
        for (key, value) in entries {
            self.pack_string(key).await?;
            Box::pin(self.pack(value)).await?;
        }
        Ok(())
    }

    /// The generic map entry point: keys are arbitrary `Value`s, validated
    /// to be strings as each pair is packed. Non-string keys fail with
    /// `InvalidKey` before anything is written for that pair.
    pub async fn pack_map_pairs<I>(&mut self, pairs: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = (Value, Value)>,
        I::IntoIter: ExactSizeIterator,
    {
        let iter = pairs.into_iter();
        self.pack_map_header(iter.len()).await?;
        for (key, value) in iter {
            let key = match key {
                Value::String(s) => s,
                _ => return Err(Error::InvalidKey),
            };
            self.pack_string(&key).await?;
            Box::pin(self.pack(&value)).await?;
        }
        Ok(())
    }

    pub async fn pack_struct(&mut self, s: &Struct) -> Result<(), Error> {
        self.pack_struct_header(s.fields.len(), s.signature).await?;
        for field in &s.fields {
            Box::pin(self.pack(field)).await?;
        }
        Ok(())
    }

    /// Packs any materialized `Value`, recursing into containers.
    pub async fn pack(&mut self, value: &Value) -> Result<(), Error> {
        match value {
            Value::Null => self.pack_null().await,
            Value::Boolean(b) => self.pack_bool(*b).await,
            Value::Integer(i) => self.pack_int(*i).await,
            Value::Float(f) => self.pack_float(*f).await,
            Value::Bytes(b) => self.pack_bytes(b).await,
            Value::String(s) => self.pack_string(s).await,
            Value::List(items) => self.pack_list(items).await,
            Value::Map(entries) => self.pack_map(entries).await,
            Value::Struct(s) => self.pack_struct(s).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_marker() {
        let mut out = Vec::new();
        let mut p = Packer::new(&mut out);
        p.pack_null().await.unwrap();
        p.flush().await.unwrap();
        assert_eq!(out, vec![0xC0]);
    }

    #[tokio::test]
    async fn booleans() {
        let mut out = Vec::new();
        let mut p = Packer::new(&mut out);
        p.pack_bool(true).await.unwrap();
        p.pack_bool(false).await.unwrap();
        p.flush().await.unwrap();
        assert_eq!(out, vec![0xC3, 0xC2]);
    }

    #[tokio::test]
    async fn tiny_int_range_is_one_byte() {
        for i in -16i64..=127 {
            let mut out = Vec::new();
            let mut p = Packer::new(&mut out);
            p.pack_int(i).await.unwrap();
            p.flush().await.unwrap();
            assert_eq!(out.len(), 1, "failed for {i}");
        }
    }

    #[tokio::test]
    async fn minimum_width_law() {
        let cases: &[(i64, usize)] = &[
            (-16, 1),
            (127, 1),
            (-17, 2),
            (128, 3),
            (i64::from(i8::MIN) - 1, 3),
            (i64::from(i16::MAX) + 1, 5),
            (i64::from(i32::MAX) + 1, 9),
            (i64::MIN, 9),
            (i64::MAX, 9),
        ];
        for &(value, expected_len) in cases {
            let mut out = Vec::new();
            let mut p = Packer::new(&mut out);
            p.pack_int(value).await.unwrap();
            p.flush().await.unwrap();
            assert_eq!(out.len(), expected_len, "failed for {value}");
        }
    }

    #[tokio::test]
    async fn mjolnir_string_is_utf8_on_wire() {
        let mut out = Vec::new();
        let mut p = Packer::new(&mut out);
        p.pack_string("Mjölnir").await.unwrap();
        p.flush().await.unwrap();
        // tiny string marker (0x80 | 8, since "Mjölnir" is 8 bytes in UTF-8)
        assert_eq!(out[0], 0x80 | 8);
        assert_eq!(
            &out[1..],
            &[0x4d, 0x6a, 0xc3, 0xb6, 0x6c, 0x6e, 0x69, 0x72]
        );
    }

    #[tokio::test]
    async fn pack_map_pairs_rejects_non_string_key() {
        let mut out = Vec::new();
        let mut p = Packer::new(&mut out);
        let pairs = vec![(Value::Integer(1), Value::Null)];
        let err = p.pack_map_pairs(pairs).await.unwrap_err();
        assert!(matches!(err, Error::InvalidKey));
    }

    #[tokio::test]
    async fn struct_header_then_fields() {
        let mut out = Vec::new();
        let mut p = Packer::new(&mut out);
        p.pack_struct_header(3, b'N').await.unwrap();
        p.pack_int(12).await.unwrap();
        p.pack_list(&[Value::String("Person".into()), Value::String("Employee".into())])
            .await
            .unwrap();
        p.pack_map(&[
            ("name".to_string(), Value::String("Alice".into())),
            ("age".to_string(), Value::Integer(33)),
        ])
        .await
        .unwrap();
        p.flush().await.unwrap();

        assert_eq!(out[0], 0xB3); // tiny struct, 3 fields
        assert_eq!(out[1], b'N');
    }

    #[tokio::test]
    async fn string32_boundary() {
        let mut out = Vec::new();
        let mut p = Packer::new(&mut out);
        let s = "a".repeat(70_000); // exceeds STRING_16's 65535-byte ceiling
        p.pack_string(&s).await.unwrap();
        p.flush().await.unwrap();
        assert_eq!(out[0], marker::STRING_32);
    }

    #[tokio::test]
    async fn struct_field_count_over_u16_is_overflow() {
        let mut out = Vec::new();
        let mut p = Packer::new(&mut out);
        let err = p
            .pack_struct_header(MAX_STRUCT_FIELDS + 1, b'X')
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Overflow(_)));
    }
}
