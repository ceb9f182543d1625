//! Byte-stream framing primitives.
//!
//! # Responsibilities
//! - Read CRLF/LF terminated lines with one byte of pushback
//! - Read exact-length bodies
//! - Decode (and, for tests and the peer client, encode) chunked bodies
//!
//! # Design Decisions
//! - One reader is kept for the whole connection so bytes buffered past the
//!   end of one message remain available for the next
//! - Lines are decoded as ISO-8859-1 so header parsing never fails on bytes
//! - The idle timeout bounds each wait for bytes, not a whole message, so a
//!   slow but steady sender is never cut off
//! - Exact-length bodies grow with the bytes that actually arrive; a declared
//!   length never sizes an allocation up front
//! - No size limits on chunked bodies (see DESIGN.md)

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, BufReader};

use crate::http::HttpError;

/// Upper bound on the buffer reserved before an exact-length body arrives.
const MAX_PREALLOC: usize = 64 * 1024;
const READ_CHUNK: usize = 8 * 1024;

/// Buffered reader with a single byte of pushback.
#[derive(Debug)]
pub struct ByteReader<R> {
    inner: BufReader<R>,
    pushback: Option<u8>,
    idle_timeout: Option<Duration>,
}

impl<R: AsyncRead + Unpin> ByteReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            pushback: None,
            idle_timeout: None,
        }
    }

    /// Fail any single read that waits longer than `limit` for new bytes
    /// with [`HttpError::IdleTimeout`].
    pub fn with_idle_timeout(mut self, limit: Duration) -> Self {
        self.idle_timeout = Some(limit);
        self
    }

    /// Deadline for the next read, or `None` when buffered bytes are
    /// already waiting.
    fn read_deadline(&self) -> Option<Duration> {
        if self.inner.buffer().is_empty() {
            self.idle_timeout
        } else {
            None
        }
    }

    /// Read one byte, `None` at end of stream.
    pub async fn read_byte(&mut self) -> Result<Option<u8>, HttpError> {
        if let Some(b) = self.pushback.take() {
            return Ok(Some(b));
        }
        match idle_bounded(self.read_deadline(), self.inner.read_u8()).await? {
            Ok(b) => Ok(Some(b)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(HttpError::Io(e)),
        }
    }

    /// Return a byte to the stream; the next read yields it first.
    pub fn unread(&mut self, byte: u8) {
        debug_assert!(self.pushback.is_none(), "pushback holds a single byte");
        self.pushback = Some(byte);
    }

    /// Read a line terminated by LF or CRLF, without the terminator.
    ///
    /// A CR followed by anything other than LF also ends the line; the
    /// following byte is pushed back. Returns `None` only when the stream
    /// ended before any byte was read.
    pub async fn read_line(&mut self) -> Result<Option<String>, HttpError> {
        let mut line = Vec::new();
        let mut saw_any = false;

        loop {
            let Some(b) = self.read_byte().await? else {
                break;
            };
            saw_any = true;
            match b {
                b'\n' => break,
                b'\r' => {
                    match self.read_byte().await? {
                        Some(b'\n') | None => {}
                        Some(other) => self.unread(other),
                    }
                    break;
                }
                _ => line.push(b),
            }
        }

        if !saw_any {
            return Ok(None);
        }
        Ok(Some(line.into_iter().map(char::from).collect()))
    }

    /// Read exactly `len` bytes.
    pub async fn read_exact(&mut self, len: usize) -> Result<Vec<u8>, HttpError> {
        let mut buf = Vec::with_capacity(len.min(MAX_PREALLOC));
        if len > 0 {
            if let Some(b) = self.pushback.take() {
                buf.push(b);
            }
        }

        let mut chunk = vec![0u8; READ_CHUNK.min(len.max(1))];
        while buf.len() < len {
            let want = (len - buf.len()).min(chunk.len());
            let n = idle_bounded(self.read_deadline(), self.inner.read(&mut chunk[..want]))
                .await?
                .map_err(HttpError::Io)?;
            if n == 0 {
                return Err(HttpError::TruncatedStream);
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        Ok(buf)
    }

    /// Decode a chunked body, consuming the terminating chunk and trailers.
    pub async fn read_chunked(&mut self) -> Result<Vec<u8>, HttpError> {
        let mut body = Vec::new();

        loop {
            let size_line = self.read_line().await?.ok_or(HttpError::TruncatedStream)?;
            let size = parse_chunk_size(&size_line)?;

            if size == 0 {
                // Trailer fields are read and dropped.
                while let Some(line) = self.read_line().await? {
                    if line.is_empty() {
                        break;
                    }
                }
                return Ok(body);
            }

            let chunk = self.read_exact(size).await?;
            body.extend_from_slice(&chunk);

            match self.read_byte().await? {
                Some(b'\r') => match self.read_byte().await? {
                    Some(b'\n') | None => {}
                    Some(other) => self.unread(other),
                },
                Some(b'\n') | None => {}
                Some(other) => self.unread(other),
            }
        }
    }

    /// Read everything until end of stream. Used for responses that carry
    /// neither Content-Length nor chunked framing; never for requests.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>, HttpError> {
        let mut out = Vec::new();
        if let Some(b) = self.pushback.take() {
            out.push(b);
        }
        self.inner.read_to_end(&mut out).await?;
        Ok(out)
    }
}

/// Await `read`, giving up after `limit` when one is set.
async fn idle_bounded<T, F>(limit: Option<Duration>, read: F) -> Result<io::Result<T>, HttpError>
where
    F: Future<Output = io::Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, read)
            .await
            .map_err(|_| HttpError::IdleTimeout),
        None => Ok(read.await),
    }
}

fn parse_chunk_size(line: &str) -> Result<usize, HttpError> {
    let token = line.split(';').next().unwrap_or("").trim();
    if token.is_empty() {
        return Ok(0);
    }
    usize::from_str_radix(token, 16).map_err(|_| HttpError::MalformedChunkSize(token.to_string()))
}

/// Encode `payload` with chunked transfer-encoding, splitting into pieces of
/// at most `chunk_size` bytes and appending the terminating zero chunk.
pub fn encode_chunked(payload: &[u8], chunk_size: usize) -> Vec<u8> {
    let chunk_size = chunk_size.max(1);
    let mut out = Vec::with_capacity(payload.len() + 16);
    for chunk in payload.chunks(chunk_size) {
        out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"0\r\n\r\n");
    out
}
