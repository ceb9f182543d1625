//! Minimal outbound HTTP/1.1 client for peer calls.
//!
//! Speaks through the crate's own request encoder and response decoder, one
//! request per connection (`Connection: close`).

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::http::framing::ByteReader;
use crate::http::response::decode_response;
use crate::http::{Request, Response};
use crate::sync::SyncError;

#[derive(Debug, Clone)]
pub struct PeerClient {
    timeout: Duration,
}

impl PeerClient {
    /// `timeout` bounds connect, write, and read together.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn get(&self, address: &str, path: &str) -> Result<Response, SyncError> {
        self.send(address, Request::new("GET", path)).await
    }

    pub async fn post_json(
        &self,
        address: &str,
        path: &str,
        body: String,
    ) -> Result<Response, SyncError> {
        let request = Request::new("POST", path)
            .with_header("Content-Type", "application/json")
            .with_body(body.into_bytes());
        self.send(address, request).await
    }

    pub async fn send(&self, address: &str, request: Request) -> Result<Response, SyncError> {
        let request = request
            .with_header("Host", address)
            .with_header("Connection", "close");

        match tokio::time::timeout(self.timeout, exchange(address, &request)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout {
                address: address.to_string(),
            }),
        }
    }
}

async fn exchange(address: &str, request: &Request) -> Result<Response, SyncError> {
    let stream = TcpStream::connect(address).await?;
    let (read_half, mut write_half) = stream.into_split();

    write_half.write_all(&request.encode()).await?;
    write_half.flush().await?;

    let mut reader = ByteReader::new(read_half);
    let response = decode_response(&mut reader).await?;
    let _ = write_half.shutdown().await;
    Ok(response)
}
