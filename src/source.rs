//! Buffered read abstraction with a bounded reassembly buffer.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Error;
use crate::sink::DEFAULT_BUFFER_SIZE;

/// Absorbs underlying channel chunking so value parsing sees logically
/// contiguous bytes, regardless of how the channel delivers them.
///
/// Holds a fixed-capacity reassembly buffer. `ensure(k)` guarantees at
/// least `k` bytes are available, for `k` up to the buffer's capacity, by
/// reading from the channel until satisfied or EOF. Every fixed-width read
/// (markers, lengths, integers, floats) goes through `read_into`, which
/// bypasses the reassembly buffer entirely — streaming straight from the
/// channel after draining whatever is already buffered — whenever the
/// requested width exceeds capacity. This is what lets a buffer as small
/// as a single byte still decode an Int64 or Float64 correctly; only the
/// combined stream is required to make forward progress, not any one
/// primitive fitting inside the buffer.
pub struct ByteSource<R> {
    reader: R,
    buf: BytesMut,
    capacity: usize,
}

impl<R: AsyncRead + Unpin> ByteSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Rebinds this source to a new channel, preserving the reassembly
    /// buffer (and any bytes already buffered in it).
    pub fn reset(&mut self, reader: R) {
        self.reader = reader;
    }

    /// Guarantees at least `k` unread bytes are buffered, reading from the
    /// channel as needed.
    pub async fn ensure(&mut self, k: usize) -> Result<(), Error> {
        while self.buf.len() < k {
            let want = k - self.buf.len();
            let mut chunk = vec![0u8; want];
            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                return Err(Error::UnexpectedEof);
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
        Ok(())
    }

    /// True if at least one more byte is available without hitting EOF.
    /// Reads opportunistically (and buffers what it reads) when the
    /// reassembly buffer is currently empty.
    pub async fn has_next(&mut self) -> Result<bool, Error> {
        if !self.buf.is_empty() {
            return Ok(true);
        }
        let mut byte = [0u8; 1];
        let n = self.reader.read(&mut byte).await?;
        if n == 0 {
            return Ok(false);
        }
        self.buf.extend_from_slice(&byte);
        Ok(true)
    }

    /// Non-destructive look at the next unread byte, if any is buffered.
    pub fn peek_u8(&self) -> Option<u8> {
        self.buf.first().copied()
    }

    /// Fills `dst` completely. When `dst` fits within the reassembly
    /// buffer's capacity, it is served (and topped up) from there;
    /// otherwise whatever is already buffered is drained into `dst` first
    /// and the remainder is streamed directly from the channel.
    pub async fn read_into(&mut self, dst: &mut [u8]) -> Result<(), Error> {
        let need = dst.len();
        if need <= self.capacity {
            self.ensure(need).await?;
            self.buf.copy_to_slice(dst);
        } else {
            let have = self.buf.len();
            self.buf.copy_to_slice(&mut dst[..have]);
            self.reader
                .read_exact(&mut dst[have..])
                .await
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::UnexpectedEof => Error::UnexpectedEof,
                    _ => Error::Io(e),
                })?;
        }
        Ok(())
    }

    /// Reads and returns `len` bytes as an owned buffer.
    pub async fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, Error> {
        let mut data = vec![0u8; len];
        self.read_into(&mut data).await?;
        Ok(data)
    }

    pub async fn read_u8(&mut self) -> Result<u8, Error> {
        let mut b = [0u8; 1];
        self.read_into(&mut b).await?;
        Ok(b[0])
    }

    pub async fn read_i8(&mut self) -> Result<i8, Error> {
        Ok(self.read_u8().await? as i8)
    }

    pub async fn read_u16(&mut self) -> Result<u16, Error> {
        let mut b = [0u8; 2];
        self.read_into(&mut b).await?;
        Ok(u16::from_be_bytes(b))
    }

    pub async fn read_i16(&mut self) -> Result<i16, Error> {
        let mut b = [0u8; 2];
        self.read_into(&mut b).await?;
        Ok(i16::from_be_bytes(b))
    }

    pub async fn read_u32(&mut self) -> Result<u32, Error> {
        let mut b = [0u8; 4];
        self.read_into(&mut b).await?;
        Ok(u32::from_be_bytes(b))
    }

    pub async fn read_i32(&mut self) -> Result<i32, Error> {
        let mut b = [0u8; 4];
        self.read_into(&mut b).await?;
        Ok(i32::from_be_bytes(b))
    }

    pub async fn read_i64(&mut self) -> Result<i64, Error> {
        let mut b = [0u8; 8];
        self.read_into(&mut b).await?;
        Ok(i64::from_be_bytes(b))
    }

    pub async fn read_f64(&mut self) -> Result<f64, Error> {
        let mut b = [0u8; 8];
        self.read_into(&mut b).await?;
        Ok(f64::from_be_bytes(b))
    }
}
