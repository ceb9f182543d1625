//! Failure injection for the sync push.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mesh_node::peers::PeerStatus;

mod common;

#[tokio::test]
async fn unreachable_peer_is_marked_down() {
    let (node, _) = common::start_node(|_| {}).await;
    let dead = common::closed_address().await.to_string();
    node.registry().add_peer(&dead, false).await;
    node.stats().merge([1, 2, 3]);

    let report = node.sync().push_round().await;
    assert_eq!(report.failed, 1);
    let record = node.registry().get(&dead).unwrap();
    assert_eq!(record.status, PeerStatus::Down);
    assert!(record.last_seen.is_none());

    node.stop().await;
}

#[tokio::test]
async fn flaky_peer_succeeds_on_retry() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let peer = common::start_programmable_peer(move || {
        let counter = Arc::clone(&counter);
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                503
            } else {
                200
            }
        }
    })
    .await
    .to_string();

    let (node, _) = common::start_node(|_| {}).await;
    node.registry().add_peer(&peer, false).await;

    let report = node.sync().push_round().await;
    assert_eq!(report.succeeded, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(node.registry().get(&peer).unwrap().status, PeerStatus::Up);

    node.stop().await;
}

#[tokio::test]
async fn persistent_failure_exhausts_retries_then_marks_down() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let peer = common::start_programmable_peer(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async { 500 }
    })
    .await
    .to_string();

    let (node, _) = common::start_node(|c| c.sync.max_attempts = 3).await;
    node.registry().add_peer(&peer, false).await;

    node.sync().push_round().await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(node.registry().get(&peer).unwrap().status, PeerStatus::Down);

    node.stop().await;
}

#[tokio::test]
async fn down_peer_recovers_to_up() {
    let healthy = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = Arc::clone(&healthy);
    let peer = common::start_programmable_peer(move || {
        let up = flag.load(Ordering::SeqCst);
        async move { if up { 200 } else { 503 } }
    })
    .await
    .to_string();

    let (node, _) = common::start_node(|_| {}).await;
    node.registry().add_peer(&peer, false).await;

    node.sync().push_round().await;
    assert_eq!(node.registry().get(&peer).unwrap().status, PeerStatus::Down);

    healthy.store(true, Ordering::SeqCst);
    node.sync().push_round().await;
    let record = node.registry().get(&peer).unwrap();
    assert_eq!(record.status, PeerStatus::Up);
    assert!(record.last_seen.is_some());

    node.stop().await;
}

#[tokio::test]
async fn silent_peer_times_out() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let silent = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let (node, _) = common::start_node(|c| c.sync.request_timeout_ms = 100).await;
    node.registry().add_peer(&silent, false).await;

    let report = tokio::time::timeout(Duration::from_secs(3), node.sync().push_round())
        .await
        .expect("timeouts should bound the round");
    assert_eq!(report.failed, 1);
    assert_eq!(node.registry().get(&silent).unwrap().status, PeerStatus::Down);

    node.stop().await;
}
