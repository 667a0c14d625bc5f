//! Framed byte buffers over the socket
//!
//! [`ReadBuffer`] and [`WriteBuffer`] own one half of the connection each
//! and provide the big-endian primitives every protocol message is built
//! from. Both are single-owner; the session serializes the write side with
//! a mutex when the keepalive writer is active.
//!
//! [`PayloadReader`] is the in-memory counterpart: a bounds-checked cursor
//! over one already-framed payload, used to parse replication sub-messages
//! and plugin payloads.

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::core::errors::{WalError, WalResult};

const READ_CHUNK: usize = 8 * 1024;

fn eof_error() -> WalError {
    WalError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "connection closed by server",
    ))
}

/// Buffered reader over the receive half of the connection
#[derive(Debug)]
pub struct ReadBuffer<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> ReadBuffer<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Number of bytes currently buffered
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Wait until at least `n` bytes are buffered.
    ///
    /// Fails with an I/O error if the connection ends first.
    pub async fn ensure(&mut self, n: usize) -> WalResult<()> {
        while self.buf.len() < n {
            let read = self.inner.read_buf(&mut self.buf).await?;
            if read == 0 {
                return Err(eof_error());
            }
        }
        Ok(())
    }

    pub async fn read_u8(&mut self) -> WalResult<u8> {
        self.ensure(1).await?;
        Ok(self.buf.get_u8())
    }

    pub async fn read_u16(&mut self) -> WalResult<u16> {
        self.ensure(2).await?;
        Ok(self.buf.get_u16())
    }

    pub async fn read_u32(&mut self) -> WalResult<u32> {
        self.ensure(4).await?;
        Ok(self.buf.get_u32())
    }

    pub async fn read_i32(&mut self) -> WalResult<i32> {
        self.ensure(4).await?;
        Ok(self.buf.get_i32())
    }

    pub async fn read_u64(&mut self) -> WalResult<u64> {
        self.ensure(8).await?;
        Ok(self.buf.get_u64())
    }

    pub async fn read_i64(&mut self) -> WalResult<i64> {
        self.ensure(8).await?;
        Ok(self.buf.get_i64())
    }

    /// Read exactly `n` bytes
    pub async fn read_bytes(&mut self, n: usize) -> WalResult<Bytes> {
        self.ensure(n).await?;
        Ok(self.buf.split_to(n).freeze())
    }

    /// Read a NUL-terminated string
    pub async fn read_cstring(&mut self) -> WalResult<String> {
        let end = loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == 0) {
                break pos;
            }
            let read = self.inner.read_buf(&mut self.buf).await?;
            if read == 0 {
                return Err(eof_error());
            }
        };
        let raw = self.buf.split_to(end);
        self.buf.advance(1); // NUL
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// Discard `n` bytes
    pub async fn skip(&mut self, n: usize) -> WalResult<()> {
        let mut left = n;
        while left > 0 {
            if self.buf.is_empty() {
                self.ensure(1).await?;
            }
            let take = self.buf.len().min(left);
            self.buf.advance(take);
            left -= take;
        }
        Ok(())
    }
}

/// Buffered writer over the send half of the connection.
///
/// Writes accumulate in memory until [`WriteBuffer::flush`] pushes them to
/// the socket.
#[derive(Debug)]
pub struct WriteBuffer<W> {
    inner: W,
    buf: BytesMut,
}

impl<W: AsyncWrite + Unpin> WriteBuffer<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Number of bytes not yet flushed
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.extend_from_slice(&[value]);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a string followed by its NUL terminator
    pub fn write_cstring(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.extend_from_slice(&[0]);
    }

    /// Push everything buffered to the socket
    pub async fn flush(&mut self) -> WalResult<()> {
        if !self.buf.is_empty() {
            let out = self.buf.split();
            self.inner.write_all(&out).await?;
        }
        self.inner.flush().await?;
        Ok(())
    }

    /// Flush and shut down the send half
    pub async fn shutdown(&mut self) -> WalResult<()> {
        self.flush().await?;
        self.inner.shutdown().await?;
        Ok(())
    }
}

/// A bounds-checked cursor over one framed payload
#[derive(Debug)]
pub struct PayloadReader<'a> {
    buf: &'a [u8],
    position: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, position: 0 }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left in the payload
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.position)
    }

    pub fn has_bytes(&self, count: usize) -> bool {
        self.remaining() >= count
    }

    fn take(&mut self, count: usize, what: &str) -> WalResult<&'a [u8]> {
        if !self.has_bytes(count) {
            return Err(WalError::protocol(format!(
                "payload truncated: need {count} more bytes for {what}, have {}",
                self.remaining()
            )));
        }
        let slice = &self.buf[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> WalResult<u8> {
        Ok(self.take(1, "u8")?[0])
    }

    pub fn peek_u8(&self) -> WalResult<u8> {
        if !self.has_bytes(1) {
            return Err(WalError::protocol("payload truncated: nothing to peek"));
        }
        Ok(self.buf[self.position])
    }

    pub fn read_u16(&mut self) -> WalResult<u16> {
        Ok(u16::from_be_bytes(self.take(2, "u16")?.try_into().unwrap()))
    }

    pub fn read_u32(&mut self) -> WalResult<u32> {
        Ok(u32::from_be_bytes(self.take(4, "u32")?.try_into().unwrap()))
    }

    pub fn read_i32(&mut self) -> WalResult<i32> {
        Ok(i32::from_be_bytes(self.take(4, "i32")?.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> WalResult<u64> {
        Ok(u64::from_be_bytes(self.take(8, "u64")?.try_into().unwrap()))
    }

    pub fn read_i64(&mut self) -> WalResult<i64> {
        Ok(i64::from_be_bytes(self.take(8, "i64")?.try_into().unwrap()))
    }

    pub fn read_bytes(&mut self, count: usize) -> WalResult<&'a [u8]> {
        self.take(count, "bytes")
    }

    /// Read a NUL-terminated string
    pub fn read_cstring(&mut self) -> WalResult<String> {
        let start = self.position;
        let rel = self.buf[start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| WalError::protocol("string not NUL-terminated"))?;
        let raw = &self.buf[start..start + rel];
        self.position = start + rel + 1;
        Ok(String::from_utf8_lossy(raw).into_owned())
    }

    pub fn skip(&mut self, count: usize) -> WalResult<()> {
        self.take(count, "skip").map(|_| ())
    }

    /// Everything not yet consumed, consuming it
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.position..];
        self.position = self.buf.len();
        slice
    }
}
