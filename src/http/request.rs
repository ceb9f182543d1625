//! Request model and decoder.
//!
//! # Responsibilities
//! - Parse the request line, substituting defaults for missing tokens
//! - Parse headers into an ordered map
//! - Apply the request body policy (exact, chunked, or absent)
//!
//! # Design Decisions
//! - A request without Content-Length or chunked encoding has no body; the
//!   decoder never reads to end of stream, so keep-alive clients never block
//! - Clean end of stream at a message boundary is `Ok(None)`, not an error

use tokio::io::AsyncRead;

use crate::http::framing::ByteReader;
use crate::http::headers::HeaderMap;
use crate::http::HttpError;

pub const DEFAULT_METHOD: &str = "GET";
pub const DEFAULT_TARGET: &str = "/";
pub const DEFAULT_VERSION: &str = "HTTP/1.1";

/// A decoded HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub target: String,
    pub version: String,
    pub headers: HeaderMap,
    /// `None` means the message carried no body framing at all.
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            version: DEFAULT_VERSION.to_string(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Target without the query string.
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    /// First value of a query parameter, percent-decoded.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let (_, query) = self.target.split_once('?')?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// Body as UTF-8 text (lossy). Empty when absent.
    pub fn body_text(&self) -> String {
        self.body
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }

    /// Serialize for sending. A body gets a Content-Length unless the caller
    /// already set framing headers.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = format!("{} {} {}\r\n", self.method, self.target, self.version).into_bytes();
        for (name, value) in self.headers.iter() {
            out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        let framed = self.headers.contains("Content-Length") || self.headers.contains("Transfer-Encoding");
        if let (Some(body), false) = (&self.body, framed) {
            out.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        if let Some(body) = &self.body {
            out.extend_from_slice(body);
        }
        out
    }
}

/// Read the header block up to (and including) the blank line.
pub(crate) async fn read_headers<R: AsyncRead + Unpin>(
    reader: &mut ByteReader<R>,
) -> Result<HeaderMap, HttpError> {
    let mut headers = HeaderMap::new();
    loop {
        let line = reader.read_line().await?.ok_or(HttpError::TruncatedStream)?;
        if line.is_empty() {
            return Ok(headers);
        }
        // Lines without a name/value separator are skipped.
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if !name.is_empty() {
                headers.insert(name, value.trim());
            }
        }
    }
}

pub(crate) fn content_length(headers: &HeaderMap) -> Result<Option<usize>, HttpError> {
    match headers.get("Content-Length") {
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| HttpError::Protocol(format!("invalid Content-Length: {}", raw))),
        None => Ok(None),
    }
}

pub(crate) fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get("Transfer-Encoding")
        .map(|te| te.trim().eq_ignore_ascii_case("chunked"))
        .unwrap_or(false)
}

/// Decode one request from the stream.
///
/// Returns `Ok(None)` when the stream ends cleanly before a new message.
pub async fn decode_request<R: AsyncRead + Unpin>(
    reader: &mut ByteReader<R>,
) -> Result<Option<Request>, HttpError> {
    // Stray blank lines between messages are tolerated.
    let request_line = loop {
        match reader.read_line().await? {
            None => return Ok(None),
            Some(line) if line.is_empty() => continue,
            Some(line) => break line,
        }
    };

    let mut parts = request_line.split(' ').filter(|p| !p.is_empty());
    let method = parts.next().unwrap_or(DEFAULT_METHOD).to_string();
    let target = parts.next().unwrap_or(DEFAULT_TARGET).to_string();
    let version = parts.next().unwrap_or(DEFAULT_VERSION).to_string();

    let headers = read_headers(reader).await?;

    let body = match content_length(&headers)? {
        Some(0) => Some(Vec::new()),
        Some(len) => Some(reader.read_exact(len).await?),
        None if is_chunked(&headers) => Some(reader.read_chunked().await?),
        None => None,
    };

    Ok(Some(Request {
        method,
        target,
        version,
        headers,
        body,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::framing::encode_chunked;

    #[tokio::test]
    async fn content_length_leaves_following_bytes_untouched() {
        let wire = b"POST /sync HTTP/1.1\r\nHost: a\r\nContent-Length: 5\r\n\r\nhelloGET /next HTTP/1.1\r\n\r\n";
        let mut r = ByteReader::new(&wire[..]);

        let req = decode_request(&mut r).await.unwrap().unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.body.as_deref(), Some(&b"hello"[..]));
        assert_eq!(r.read_to_end().await.unwrap(), b"GET /next HTTP/1.1\r\n\r\n");
    }

    #[tokio::test]
    async fn pipelined_requests_decode_in_order() {
        let wire = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
        let mut r = ByteReader::new(&wire[..]);
        assert_eq!(decode_request(&mut r).await.unwrap().unwrap().target, "/a");
        assert_eq!(decode_request(&mut r).await.unwrap().unwrap().target, "/b");
        assert!(decode_request(&mut r).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_tokens_get_defaults() {
        let mut r = ByteReader::new(&b"DELETE\r\n\r\n"[..]);
        let req = decode_request(&mut r).await.unwrap().unwrap();
        assert_eq!(req.method, "DELETE");
        assert_eq!(req.target, "/");
        assert_eq!(req.version, "HTTP/1.1");
    }

    #[tokio::test]
    async fn body_policy() {
        let mut r = ByteReader::new(&b"GET / HTTP/1.1\r\nContent-Length: 0\r\n\r\n"[..]);
        let req = decode_request(&mut r).await.unwrap().unwrap();
        assert_eq!(req.body, Some(Vec::new()));

        let mut r = ByteReader::new(&b"GET / HTTP/1.1\r\n\r\ntrailing"[..]);
        let req = decode_request(&mut r).await.unwrap().unwrap();
        assert_eq!(req.body, None);
        assert_eq!(r.read_to_end().await.unwrap(), b"trailing");
    }

    #[tokio::test]
    async fn chunked_request_body() {
        let mut wire = b"POST /x HTTP/1.1\r\nTransfer-Encoding: Chunked\r\n\r\n".to_vec();
        wire.extend(encode_chunked(b"{\"timestamps\":[1,2]}", 7));
        let mut r = ByteReader::new(&wire[..]);
        let req = decode_request(&mut r).await.unwrap().unwrap();
        assert_eq!(req.body_text(), "{\"timestamps\":[1,2]}");
    }

    #[tokio::test]
    async fn truncated_body_is_an_error() {
        let mut r = ByteReader::new(&b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc"[..]);
        assert!(matches!(decode_request(&mut r).await, Err(HttpError::TruncatedStream)));
    }

    #[tokio::test]
    async fn declared_length_beyond_memory_is_truncation_not_abort() {
        let wire = b"POST /sync/stats HTTP/1.1\r\nContent-Length: 1000000000000\r\n\r\nabc";
        let mut r = ByteReader::new(&wire[..]);
        assert!(matches!(decode_request(&mut r).await, Err(HttpError::TruncatedStream)));
    }

    #[tokio::test]
    async fn eof_inside_headers_is_truncated() {
        let mut r = ByteReader::new(&b"GET / HTTP/1.1\r\nHost: a\r\n"[..]);
        assert!(matches!(decode_request(&mut r).await, Err(HttpError::TruncatedStream)));
    }

    #[tokio::test]
    async fn bad_content_length_is_protocol_error() {
        let mut r = ByteReader::new(&b"POST / HTTP/1.1\r\nContent-Length: ten\r\n\r\n"[..]);
        assert!(matches!(decode_request(&mut r).await, Err(HttpError::Protocol(_))));
    }

    #[test]
    fn path_and_query() {
        let req = Request::new("DELETE", "/peers?id=10.0.0.1%3A8080&x=1");
        assert_eq!(req.path(), "/peers");
        assert_eq!(req.query_param("id").as_deref(), Some("10.0.0.1:8080"));
        assert_eq!(req.query_param("missing"), None);
    }

    #[tokio::test]
    async fn encode_then_decode_preserves_body() {
        let req = Request::new("POST", "/sync/stats")
            .with_header("Host", "peer")
            .with_body(b"{}".to_vec());
        let wire = req.encode();
        let mut r = ByteReader::new(&wire[..]);
        let decoded = decode_request(&mut r).await.unwrap().unwrap();
        assert_eq!(decoded.body.as_deref(), Some(&b"{}"[..]));
        assert_eq!(decoded.header("content-length"), Some("2"));
    }
}
