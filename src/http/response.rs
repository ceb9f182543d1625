//! Response model, encoder, and client-side decoder.
//!
//! # Responsibilities
//! - Hold status, reason, headers, and a text-or-bytes body
//! - Serialize to wire bytes with Content-Length framing
//! - Parse responses received by the peer client
//!
//! # Design Decisions
//! - A caller-supplied Content-Length is written as given, even when it does
//!   not match the body; the encoder only adds one when missing
//! - Text and raw bytes are variants of one enum, never both

use serde::Serialize;
use tokio::io::AsyncRead;

use crate::http::framing::ByteReader;
use crate::http::headers::HeaderMap;
use crate::http::request::{content_length, is_chunked, read_headers, DEFAULT_VERSION};
use crate::http::HttpError;

/// Response payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Body {
    #[default]
    Empty,
    Text(String),
    Bytes(Vec<u8>),
}

impl Body {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Body::Empty => Vec::new(),
            Body::Text(text) => text.as_bytes().to_vec(),
            Body::Bytes(bytes) => bytes.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Body::Empty => 0,
            Body::Text(text) => text.len(),
            Body::Bytes(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub version: String,
    pub status: u16,
    pub reason: String,
    pub headers: HeaderMap,
    pub body: Body,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            status,
            reason: reason_phrase(status).to_string(),
            headers: HeaderMap::new(),
            body: Body::Empty,
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("Content-Type", "text/plain; charset=utf-8")
            .with_body(Body::Text(body.into()))
    }

    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("Content-Type", "text/html; charset=utf-8")
            .with_body(Body::Text(body.into()))
    }

    pub fn bytes(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        Self::new(status)
            .with_header("Content-Type", content_type)
            .with_body(Body::Bytes(body))
    }

    /// JSON body from any serializable value.
    pub fn json<T: Serialize>(status: u16, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_string(value)?;
        Ok(Self::new(status)
            .with_header("Content-Type", "application/json; charset=utf-8")
            .with_body(Body::Text(body)))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        match &self.body {
            Body::Empty => String::new(),
            Body::Text(text) => text.clone(),
            Body::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// Serialize to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let body = self.body.to_bytes();
        let mut head = format!("{} {} {}\r\n", self.version, self.status, self.reason);

        for (name, value) in self.headers.iter() {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        if !self.headers.contains("Content-Length") {
            head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        head.push_str("\r\n");

        let mut out = head.into_bytes();
        out.extend_from_slice(&body);
        out
    }
}

/// Decode a response as sent by a peer.
pub async fn decode_response<R: AsyncRead + Unpin>(
    reader: &mut ByteReader<R>,
) -> Result<Response, HttpError> {
    let status_line = reader
        .read_line()
        .await?
        .ok_or_else(|| HttpError::Protocol("no response from peer".to_string()))?;

    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or(DEFAULT_VERSION).to_string();
    let status = parts
        .next()
        .and_then(|code| code.trim().parse::<u16>().ok())
        .ok_or_else(|| HttpError::Protocol(format!("invalid status line: {}", status_line)))?;
    let reason = parts.next().unwrap_or("").to_string();

    let headers = read_headers(reader).await?;

    let body = match content_length(&headers)? {
        Some(len) => reader.read_exact(len).await?,
        None if is_chunked(&headers) => reader.read_chunked().await?,
        None => reader.read_to_end().await?,
    };

    Ok(Response {
        version,
        status,
        reason,
        headers,
        body: if body.is_empty() { Body::Empty } else { Body::Bytes(body) },
    })
}

/// Standard reason phrase for a status code.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        409 => "Conflict",
        411 => "Length Required",
        413 => "Payload Too Large",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire_text(resp: &Response) -> String {
        String::from_utf8(resp.encode()).unwrap()
    }

    #[test]
    fn encode_injects_content_length_once() {
        let resp = Response::text(200, "héllo");
        let text = wire_text(&resp);
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(text.matches("Content-Length").count(), 1);
        assert!(text.contains("Content-Length: 6\r\n"));
        assert!(text.ends_with("\r\n\r\nhéllo"));
    }

    #[test]
    fn caller_content_length_passes_through_unmodified() {
        let resp = Response::text(200, "abc").with_header("content-length", "42");
        let text = wire_text(&resp);
        assert_eq!(text.to_ascii_lowercase().matches("content-length").count(), 1);
        assert!(text.contains("content-length: 42\r\n"));
        assert!(text.ends_with("abc"));
    }

    #[test]
    fn headers_keep_insertion_order() {
        let resp = Response::new(204).with_header("X-B", "2").with_header("X-A", "1");
        let text = wire_text(&resp);
        let b = text.find("X-B").unwrap();
        let a = text.find("X-A").unwrap();
        assert!(b < a);
        assert!(text.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn raw_bytes_body() {
        let resp = Response::bytes(200, "application/octet-stream", vec![0, 159, 146, 150]);
        let wire = resp.encode();
        assert!(wire.ends_with(&[0, 159, 146, 150]));
        assert!(String::from_utf8_lossy(&wire).contains("Content-Length: 4\r\n"));
    }

    #[tokio::test]
    async fn decode_response_with_and_without_framing() {
        let framed = Response::text(201, "ok").encode();
        let mut r = ByteReader::new(&framed[..]);
        let resp = decode_response(&mut r).await.unwrap();
        assert_eq!(resp.status, 201);
        assert_eq!(resp.reason, "Created");
        assert_eq!(resp.body_text(), "ok");

        let unframed = b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\nuntil eof";
        let mut r = ByteReader::new(&unframed[..]);
        assert_eq!(decode_response(&mut r).await.unwrap().body_text(), "until eof");
    }

    #[tokio::test]
    async fn decode_response_rejects_garbage_status() {
        let mut r = ByteReader::new(&b"HTTP/1.1 abc\r\n\r\n"[..]);
        assert!(matches!(decode_response(&mut r).await, Err(HttpError::Protocol(_))));
    }
}
