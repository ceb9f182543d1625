//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mesh_requests_total` (counter): served requests by method, status
//! - `mesh_request_duration_seconds` (histogram): dispatch-to-write latency
//! - `mesh_active_connections` (gauge): live connection count
//! - `mesh_sync_pushes_total` (counter): push outcomes (success, failure)
//! - `mesh_ids_total` (gauge): size of the id set
//! - `mesh_peers` (gauge): peers by status
//!
//! # Design Decisions
//! - Recording functions are free functions; without an installed recorder
//!   they are no-ops, so tests never need one
//! - Request metrics are fed by an event observer, not by the server loop

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::peers::{PeerRecord, PeerStatus};

/// Install the Prometheus recorder and its scrape listener.
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, duration: Duration) {
    metrics::counter!(
        "mesh_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("mesh_request_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_active_connections(count: u64) {
    metrics::gauge!("mesh_active_connections").set(count as f64);
}

pub fn record_sync_push(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("mesh_sync_pushes_total", "outcome" => outcome).increment(1);
}

pub fn record_id_count(total: usize) {
    metrics::gauge!("mesh_ids_total").set(total as f64);
}

pub fn record_peer_statuses(peers: &[PeerRecord]) {
    for status in [PeerStatus::Unknown, PeerStatus::Up, PeerStatus::Down] {
        let count = peers.iter().filter(|p| p.status == status).count();
        metrics::gauge!("mesh_peers", "status" => status.as_str()).set(count as f64);
    }
}
