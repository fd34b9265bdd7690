//! PackStream decoding: a pull-based decoder driven by explicit `unpack*`
//! calls, dispatched off a non-destructive marker peek.

use tokio::io::AsyncRead;

use crate::error::Error;
use crate::marker;
use crate::source::ByteSource;
use crate::value::{Kind, Struct, Value};

/// Drives a `ByteSource`, exposing both the streaming idiom (header, then
/// caller-driven element-by-element consumption) and the materialized
/// idiom (`unpack_value`) over the same wire primitives.
pub struct Unpacker<R> {
    source: ByteSource<R>,
    /// Set by `unpack_struct_header`, cleared by `unpack_struct_signature`.
    /// Enforces that the signature is read immediately after the header.
    awaiting_signature: bool,
}

impl<R: AsyncRead + Unpin> Unpacker<R> {
    pub fn new(reader: R) -> Self {
        Self {
            source: ByteSource::new(reader),
            awaiting_signature: false,
        }
    }

    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        Self {
            source: ByteSource::with_capacity(reader, capacity),
            awaiting_signature: false,
        }
    }

    /// Rebinds this decoder to a new byte source, preserving the
    /// reassembly buffer.
    pub fn reset(&mut self, reader: R) {
        self.source.reset(reader);
    }

    /// Non-destructive classification of the next value's kind.
    pub async fn peek_next_type(&mut self) -> Result<Kind, Error> {
        let m = self.peek_marker().await?;
        marker::classify(m)
    }

    /// True when at least one more value is available; false at a clean
    /// end-of-stream boundary.
    pub async fn has_next(&mut self) -> Result<bool, Error> {
        self.source.has_next().await
    }

    /// Buffers and returns the next marker byte without consuming it, so a
    /// type mismatch can be reported with the stream position unchanged.
    async fn peek_marker(&mut self) -> Result<u8, Error> {
        self.source.ensure(1).await?;
        Ok(self
            .source
            .peek_u8()
            .expect("ensure(1) guarantees a buffered byte"))
    }

    /// Consumes a marker byte already confirmed (via `peek_marker`) to be
    /// buffered. Never blocks and never fails.
    async fn consume_marker(&mut self) -> Result<u8, Error> {
        self.source.read_u8().await
    }

    fn mismatch(expected: &'static str, m: u8) -> Result<Error, Error> {
        Ok(Error::unexpected(expected, marker::classify(m)?))
    }

    pub async fn unpack_null(&mut self) -> Result<(), Error> {
        let m = self.peek_marker().await?;
        if m == marker::NULL {
            self.consume_marker().await?;
            Ok(())
        } else {
            Err(Self::mismatch("null", m)?)
        }
    }

    pub async fn unpack_bool(&mut self) -> Result<bool, Error> {
        let m = self.peek_marker().await?;
        match m {
            marker::TRUE => {
                self.consume_marker().await?;
                Ok(true)
            }
            marker::FALSE => {
                self.consume_marker().await?;
                Ok(false)
            }
            _ => Err(Self::mismatch("boolean", m)?),
        }
    }

    /// Succeeds for every integer size class, sign-extending narrower forms
    /// to 64 bits.
    pub async fn unpack_int(&mut self) -> Result<i64, Error> {
        let m = self.peek_marker().await?;
        match m {
            marker::INT_8 => {
                self.consume_marker().await?;
                Ok(i64::from(self.source.read_i8().await?))
            }
            marker::INT_16 => {
                self.consume_marker().await?;
                Ok(i64::from(self.source.read_i16().await?))
            }
            marker::INT_32 => {
                self.consume_marker().await?;
                Ok(i64::from(self.source.read_i32().await?))
            }
            marker::INT_64 => {
                self.consume_marker().await?;
                self.source.read_i64().await
            }
            _ if m <= 0x7F => {
                self.consume_marker().await?;
                Ok(i64::from(m))
            }
            _ if m >= 0xF0 => {
                self.consume_marker().await?;
                Ok(i64::from(m as i8))
            }
            _ => Err(Self::mismatch("integer", m)?),
        }
    }

    pub async fn unpack_float(&mut self) -> Result<f64, Error> {
        let m = self.peek_marker().await?;
        if m == marker::FLOAT_64 {
            self.consume_marker().await?;
            self.source.read_f64().await
        } else {
            Err(Self::mismatch("float", m)?)
        }
    }

    pub async fn unpack_bytes(&mut self) -> Result<Vec<u8>, Error> {
        let m = self.peek_marker().await?;
        let len = match m {
            marker::BYTES_8 => {
                self.consume_marker().await?;
                self.source.read_u8().await? as usize
            }
            marker::BYTES_16 => {
                self.consume_marker().await?;
                self.source.read_u16().await? as usize
            }
            marker::BYTES_32 => {
                self.consume_marker().await?;
                self.source.read_u32().await? as usize
            }
            _ => return Err(Self::mismatch("bytes", m)?),
        };
        self.source.read_vec(len).await
    }

    /// The raw payload bytes of a string-kind value, with no UTF-8
    /// validation — the advisory-tag text layer described in the design
    /// notes is left to the caller.
    pub async fn unpack_string_bytes(&mut self) -> Result<Vec<u8>, Error> {
        let m = self.peek_marker().await?;
        let len = match m {
            marker::STRING_8 => {
                self.consume_marker().await?;
                self.source.read_u8().await? as usize
            }
            marker::STRING_16 => {
                self.consume_marker().await?;
                self.source.read_u16().await? as usize
            }
            marker::STRING_32 => {
                self.consume_marker().await?;
                self.source.read_u32().await? as usize
            }
            _ if m & 0xF0 == marker::TINY_STRING_NIBBLE => {
                self.consume_marker().await?;
                (m & 0x0F) as usize
            }
            _ => return Err(Self::mismatch("string", m)?),
        };
        self.source.read_vec(len).await
    }

    /// Decodes the string's UTF-8 payload, lossily repairing any invalid
    /// sequences rather than failing (see the design notes' open question
    /// on decode-side UTF-8 validation).
    pub async fn unpack_string(&mut self) -> Result<String, Error> {
        let bytes = self.unpack_string_bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn unpack_list_header(&mut self) -> Result<u32, Error> {
        let m = self.peek_marker().await?;
        match m {
            marker::LIST_8 => {
                self.consume_marker().await?;
                Ok(u32::from(self.source.read_u8().await?))
            }
            marker::LIST_16 => {
                self.consume_marker().await?;
                Ok(u32::from(self.source.read_u16().await?))
            }
            marker::LIST_32 => {
                self.consume_marker().await?;
                self.source.read_u32().await
            }
            _ if m & 0xF0 == marker::TINY_LIST_NIBBLE => {
                self.consume_marker().await?;
                Ok(u32::from(m & 0x0F))
            }
            _ => Err(Self::mismatch("list", m)?),
        }
    }

    pub async fn unpack_map_header(&mut self) -> Result<u32, Error> {
        let m = self.peek_marker().await?;
        match m {
            marker::MAP_8 => {
                self.consume_marker().await?;
                Ok(u32::from(self.source.read_u8().await?))
            }
            marker::MAP_16 => {
                self.consume_marker().await?;
                Ok(u32::from(self.source.read_u16().await?))
            }
            marker::MAP_32 => {
                self.consume_marker().await?;
                self.source.read_u32().await
            }
            _ if m & 0xF0 == marker::TINY_MAP_NIBBLE => {
                self.consume_marker().await?;
                Ok(u32::from(m & 0x0F))
            }
            _ => Err(Self::mismatch("map", m)?),
        }
    }

    /// Returns the struct's field count. The caller MUST call
    /// `unpack_struct_signature` next, before unpacking any fields.
    pub async fn unpack_struct_header(&mut self) -> Result<u32, Error> {
        let m = self.peek_marker().await?;
        let count = match m {
            marker::STRUCT_8 => {
                self.consume_marker().await?;
                u32::from(self.source.read_u8().await?)
            }
            marker::STRUCT_16 => {
                self.consume_marker().await?;
                u32::from(self.source.read_u16().await?)
            }
            _ if m & 0xF0 == marker::TINY_STRUCT_NIBBLE => {
                self.consume_marker().await?;
                u32::from(m & 0x0F)
            }
            _ => return Err(Self::mismatch("struct", m)?),
        };
        self.awaiting_signature = true;
        Ok(count)
    }

    /// Reads the struct signature byte. Fails with `UnexpectedType` if
    /// called without a preceding `unpack_struct_header`.
    pub async fn unpack_struct_signature(&mut self) -> Result<u8, Error> {
        if !self.awaiting_signature {
            return Err(Error::unexpected(
                "struct signature (must follow unpack_struct_header)",
                Kind::Struct,
            ));
        }
        self.awaiting_signature = false;
        self.source.read_u8().await
    }

    /// Decodes a full `Value` tree, sharing the same per-kind primitives the
    /// streaming methods use, so one-shot and header-driven decoding always
    /// agree (the Streaming Equivalence property).
    pub async fn unpack_value(&mut self) -> Result<Value, Error> {
        match self.peek_next_type().await? {
            Kind::Null => {
                self.unpack_null().await?;
                Ok(Value::Null)
            }
            Kind::Boolean => Ok(Value::Boolean(self.unpack_bool().await?)),
            Kind::Integer => Ok(Value::Integer(self.unpack_int().await?)),
            Kind::Float => Ok(Value::Float(self.unpack_float().await?)),
            Kind::Bytes => Ok(Value::Bytes(self.unpack_bytes().await?)),
            Kind::String => Ok(Value::String(self.unpack_string().await?)),
            Kind::List => {
                let n = self.unpack_list_header().await?;
                let mut items = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    items.push(Box::pin(self.unpack_value()).await?);
                }
                Ok(Value::List(items))
            }
            Kind::Map => {
                let n = self.unpack_map_header().await?;
                let mut entries = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    let key = self.unpack_string().await?;
                    let value = Box::pin(self.unpack_value()).await?;
                    entries.push((key, value));
                }
                Ok(Value::Map(entries))
            }
            Kind::Struct => {
                let n = self.unpack_struct_header().await?;
                let signature = self.unpack_struct_signature().await?;
                let mut fields = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    fields.push(Box::pin(self.unpack_value()).await?);
                }
                Ok(Value::Struct(Struct { signature, fields }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packer::Packer;
    use std::io::Cursor;

    async fn round_trip(value: &Value) -> Value {
        let mut bytes = Vec::new();
        {
            let mut packer = Packer::new(&mut bytes);
            packer.pack(value).await.unwrap();
            packer.flush().await.unwrap();
        }
        let mut unpacker = Unpacker::new(Cursor::new(bytes));
        unpacker.unpack_value().await.unwrap()
    }

    #[tokio::test]
    async fn round_trip_scalars() {
        assert_eq!(round_trip(&Value::Null).await, Value::Null);
        assert_eq!(
            round_trip(&Value::Boolean(true)).await,
            Value::Boolean(true)
        );
        assert_eq!(round_trip(&Value::Integer(-42)).await, Value::Integer(-42));
        assert_eq!(round_trip(&Value::Float(2.5)).await, Value::Float(2.5));
        assert_eq!(
            round_trip(&Value::String("hello".into())).await,
            Value::String("hello".into())
        );
        assert_eq!(
            round_trip(&Value::Bytes(vec![1, 2, 3])).await,
            Value::Bytes(vec![1, 2, 3])
        );
    }

    #[tokio::test]
    async fn round_trip_nested_containers() {
        let value = Value::List(vec![
            Value::Integer(1),
            Value::Map(vec![("k".to_string(), Value::Boolean(false))]),
        ]);
        assert_eq!(round_trip(&value).await, value);
    }

    #[tokio::test]
    async fn peek_is_idempotent_and_non_destructive() {
        let mut bytes = Vec::new();
        {
            let mut packer = Packer::new(&mut bytes);
            packer.pack_int(42).await.unwrap();
            packer.flush().await.unwrap();
        }
        let mut unpacker = Unpacker::new(Cursor::new(bytes));
        assert_eq!(unpacker.peek_next_type().await.unwrap(), Kind::Integer);
        assert_eq!(unpacker.peek_next_type().await.unwrap(), Kind::Integer);
        assert_eq!(unpacker.unpack_int().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn struct_scenario() {
        let mut bytes = Vec::new();
        {
            let mut packer = Packer::new(&mut bytes);
            packer.pack_struct_header(3, b'N').await.unwrap();
            packer.pack_int(12).await.unwrap();
            packer
                .pack_list(&[
                    Value::String("Person".into()),
                    Value::String("Employee".into()),
                ])
                .await
                .unwrap();
            packer
                .pack_map(&[
                    ("name".to_string(), Value::String("Alice".into())),
                    ("age".to_string(), Value::Integer(33)),
                ])
                .await
                .unwrap();
            packer.flush().await.unwrap();
        }

        let mut unpacker = Unpacker::new(Cursor::new(bytes));
        assert_eq!(unpacker.unpack_struct_header().await.unwrap(), 3);
        assert_eq!(unpacker.unpack_struct_signature().await.unwrap(), b'N');
        assert_eq!(unpacker.unpack_int().await.unwrap(), 12);
        assert_eq!(unpacker.unpack_list_header().await.unwrap(), 2);
        assert_eq!(unpacker.unpack_string().await.unwrap(), "Person");
        assert_eq!(unpacker.unpack_string().await.unwrap(), "Employee");
        assert_eq!(unpacker.unpack_map_header().await.unwrap(), 2);
        assert_eq!(unpacker.unpack_string().await.unwrap(), "name");
        assert_eq!(unpacker.unpack_string().await.unwrap(), "Alice");
        assert_eq!(unpacker.unpack_string().await.unwrap(), "age");
        assert_eq!(unpacker.unpack_int().await.unwrap(), 33);
    }

    #[tokio::test]
    async fn struct_signature_out_of_order_is_unexpected_type() {
        let mut bytes = Vec::new();
        {
            let mut packer = Packer::new(&mut bytes);
            packer.pack_struct_header(0, b'X').await.unwrap();
            packer.flush().await.unwrap();
        }
        let mut unpacker = Unpacker::new(Cursor::new(bytes));
        let err = unpacker.unpack_struct_signature().await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedType { .. }));
    }

    #[tokio::test]
    async fn unexpected_type_is_detected_before_consumption() {
        let mut bytes = Vec::new();
        {
            let mut packer = Packer::new(&mut bytes);
            packer.pack_int(7).await.unwrap();
            packer.flush().await.unwrap();
        }
        let mut unpacker = Unpacker::new(Cursor::new(bytes));
        let err = unpacker.unpack_bool().await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedType { .. }));
    }

    #[tokio::test]
    async fn cross_boundary_robustness_at_varying_capacities() {
        let mut bytes = Vec::new();
        {
            let mut packer = Packer::new(&mut bytes);
            packer.pack_int(i64::MAX).await.unwrap();
            packer.pack_int(i64::MAX).await.unwrap();
            packer.flush().await.unwrap();
        }
        for capacity in [11usize, 1, 7, 64, 8192] {
            let mut unpacker = Unpacker::with_capacity(Cursor::new(bytes.clone()), capacity);
            assert_eq!(unpacker.unpack_int().await.unwrap(), i64::MAX);
            assert_eq!(unpacker.unpack_int().await.unwrap(), i64::MAX);
        }
    }

    #[tokio::test]
    async fn malformed_marker_is_rejected() {
        let mut unpacker = Unpacker::new(Cursor::new(vec![0xC4]));
        let err = unpacker.peek_next_type().await.unwrap_err();
        assert!(matches!(err, Error::MalformedMarker(0xC4)));
    }
}
