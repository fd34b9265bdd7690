//! Buffered write abstraction over a byte-oriented output channel.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Error;

/// Default reassembly / output buffer capacity, in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Buffers writes and flushes them to the underlying channel on demand.
///
/// Writes that would overflow the buffer flush it first, then proceed.
/// Writes larger than the buffer capacity bypass it entirely: the buffer is
/// drained, then the payload is written straight to the channel.
pub struct ByteSink<W> {
    writer: W,
    buf: BytesMut,
    capacity: usize,
}

impl<W: AsyncWrite + Unpin> ByteSink<W> {
    pub fn new(writer: W) -> Self {
        Self::with_capacity(writer, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(writer: W, capacity: usize) -> Self {
        Self {
            writer,
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Rebinds this sink to a new channel, preserving the output buffer.
    pub fn reset(&mut self, writer: W) {
        self.writer = writer;
    }

    async fn drain(&mut self) -> Result<(), Error> {
        if !self.buf.is_empty() {
            self.writer.write_all(&self.buf).await?;
            self.buf.clear();
        }
        Ok(())
    }

    async fn ensure_room(&mut self, n: usize) -> Result<(), Error> {
        if self.buf.len() + n > self.capacity {
            self.drain().await?;
        }
        Ok(())
    }

    pub async fn write_u8(&mut self, b: u8) -> Result<(), Error> {
        self.ensure_room(1).await?;
        self.buf.put_u8(b);
        Ok(())
    }

    pub async fn write_i8(&mut self, v: i8) -> Result<(), Error> {
        self.ensure_room(1).await?;
        self.buf.put_i8(v);
        Ok(())
    }

    pub async fn write_u16(&mut self, v: u16) -> Result<(), Error> {
        self.ensure_room(2).await?;
        self.buf.put_u16(v);
        Ok(())
    }

    pub async fn write_i16(&mut self, v: i16) -> Result<(), Error> {
        self.ensure_room(2).await?;
        self.buf.put_i16(v);
        Ok(())
    }

    pub async fn write_u32(&mut self, v: u32) -> Result<(), Error> {
        self.ensure_room(4).await?;
        self.buf.put_u32(v);
        Ok(())
    }

    pub async fn write_i32(&mut self, v: i32) -> Result<(), Error> {
        self.ensure_room(4).await?;
        self.buf.put_i32(v);
        Ok(())
    }

    pub async fn write_i64(&mut self, v: i64) -> Result<(), Error> {
        self.ensure_room(8).await?;
        self.buf.put_i64(v);
        Ok(())
    }

    pub async fn write_f64(&mut self, v: f64) -> Result<(), Error> {
        self.ensure_room(8).await?;
        self.buf.put_f64(v);
        Ok(())
    }

    /// Writes a raw byte slice. Slices larger than the buffer capacity are
    /// streamed directly to the channel after draining whatever is already
    /// buffered.
    pub async fn write_slice(&mut self, data: &[u8]) -> Result<(), Error> {
        if data.len() > self.capacity {
            self.drain().await?;
            self.writer.write_all(data).await?;
        } else {
            self.ensure_room(data.len()).await?;
            self.buf.put_slice(data);
        }
        Ok(())
    }

    /// Drains the buffer to the underlying channel and flushes it.
    pub async fn flush(&mut self) -> Result<(), Error> {
        self.drain().await?;
        self.writer.flush().await?;
        Ok(())
    }
}
