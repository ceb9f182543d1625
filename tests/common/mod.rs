//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mesh_node::http::framing::ByteReader;
use mesh_node::http::request::decode_request;
use mesh_node::http::Response;
use mesh_node::persistence::NoopStore;
use mesh_node::{NodeConfig, PeerNode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const ADMIN_KEY: &str = "test-admin-key";

/// Config for a node on an ephemeral loopback port with the scheduler off
/// and fast retries.
pub fn test_config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.admin.api_key = ADMIN_KEY.into();
    config.sync.enabled = false;
    config.sync.initial_delay_secs = 0;
    config.sync.retry_base_delay_ms = 5;
    config.sync.retry_max_delay_ms = 20;
    config.sync.request_timeout_ms = 500;
    config.shutdown.drain_timeout_ms = 200;
    config
}

/// Start a node; returns it with its bound address.
pub async fn start_node<F>(configure: F) -> (PeerNode, SocketAddr)
where
    F: FnOnce(&mut NodeConfig),
{
    let mut config = test_config();
    configure(&mut config);
    let node = PeerNode::new(config, Arc::new(NoopStore));
    let addr = node.start().await.expect("node should start");
    (node, addr)
}

/// Write raw bytes and read until the server closes.
pub async fn raw_exchange(addr: SocketAddr, bytes: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(bytes).await.unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    String::from_utf8_lossy(&out).into_owned()
}

/// Start a fake peer that answers each connection with the status `f`
/// returns. Returns its address.
pub async fn start_programmable_peer<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = u16> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let (r, mut w) = socket.into_split();
                        let mut reader = ByteReader::new(r);
                        if decode_request(&mut reader).await.ok().flatten().is_none() {
                            return;
                        }
                        let status = f().await;
                        let _ = w.write_all(&Response::new(status).encode()).await;
                        let _ = w.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// An address nothing listens on.
pub async fn closed_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .unwrap()
}
