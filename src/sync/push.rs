//! Periodic push of recent ids to every known peer.
//!
//! # Responsibilities
//! - Every interval, POST the most recent ids to each peer in turn
//! - Mark peers UP (stamping last-seen) or DOWN from the outcome
//! - Optionally pull each peer's full set afterwards
//!
//! # Design Decisions
//! - Rounds run in-line on one task, so they never overlap
//! - Peers are visited serially from a snapshot; one failing peer never
//!   stops the round
//! - Shutdown abandons an in-flight round instead of waiting for it

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::SyncConfig;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::peers::PeerRegistry;
use crate::resilience::RetryPolicy;
use crate::stats::Statistics;
use crate::sync::client::PeerClient;
use crate::sync::SyncError;

/// Outcome of one push round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct PeerSync {
    registry: Arc<PeerRegistry>,
    stats: Arc<Statistics>,
    client: PeerClient,
    retry: RetryPolicy,
    config: SyncConfig,
}

impl PeerSync {
    pub fn new(registry: Arc<PeerRegistry>, stats: Arc<Statistics>, config: SyncConfig) -> Self {
        Self {
            registry,
            stats,
            client: PeerClient::new(Duration::from_millis(config.request_timeout_ms)),
            retry: RetryPolicy::new(
                config.max_attempts,
                config.retry_base_delay_ms,
                config.retry_max_delay_ms,
            ),
            config,
        }
    }

    /// Push `payload_last(last_n)` to every peer.
    pub async fn push_round(&self) -> RoundReport {
        let peers = self.registry.list_peers();
        let mut report = RoundReport::default();
        if peers.is_empty() {
            tracing::debug!("No peers to sync with");
            return report;
        }

        let body = match serde_json::to_string(&self.stats.payload_last(self.config.last_n)) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode sync payload");
                return report;
            }
        };

        for peer in peers {
            let address = peer.address();
            report.attempted += 1;

            let result = self
                .retry
                .run(|attempt| {
                    tracing::debug!(address = %address, attempt, "Pushing ids");
                    self.push_to(&address, body.clone())
                })
                .await;

            match result {
                Ok(()) => {
                    report.succeeded += 1;
                    self.registry.mark_up(&address);
                    metrics::record_sync_push(true);
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(address = %address, error = %e, "Sync push failed");
                    self.registry.mark_down(&address);
                    metrics::record_sync_push(false);
                }
            }
        }

        metrics::record_peer_statuses(&self.registry.list_peers());
        tracing::info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "Sync round complete"
        );
        report
    }

    /// GET each peer's full set and merge it. Returns the number of new ids.
    pub async fn pull_round(&self) -> usize {
        let mut merged = 0;
        for peer in self.registry.list_peers() {
            let address = peer.address();
            match self.client.get(&address, &self.config.path).await {
                Ok(resp) if resp.is_success() => {
                    merged += self.stats.merge_payload(&resp.body_text());
                    self.registry.mark_up(&address);
                }
                Ok(resp) => {
                    tracing::debug!(address = %address, status = resp.status, "Pull rejected");
                }
                Err(e) => {
                    tracing::debug!(address = %address, error = %e, "Pull failed");
                }
            }
        }
        merged
    }

    async fn push_to(&self, address: &str, body: String) -> Result<(), SyncError> {
        let resp = self.client.post_json(address, &self.config.path, body).await?;
        if resp.is_success() {
            Ok(())
        } else {
            Err(SyncError::Status {
                address: address.to_string(),
                status: resp.status,
            })
        }
    }

    async fn round(&self) {
        self.push_round().await;
        if self.config.pull_enabled {
            let merged = self.pull_round().await;
            tracing::debug!(merged, "Pull round complete");
        }
    }

    /// Scheduler loop: initial delay, then one round per interval.
    pub async fn run(self: Arc<Self>, mut shutdown: ShutdownSignal) {
        if !self.config.enabled {
            tracing::info!("Peer sync disabled");
            return;
        }

        tracing::info!(
            interval_secs = self.config.interval_secs,
            last_n = self.config.last_n,
            path = %self.config.path,
            "Peer sync starting"
        );

        tokio::select! {
            _ = time::sleep(Duration::from_secs(self.config.initial_delay_secs)) => {}
            _ = shutdown.recv() => return,
        }

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.recv() => break,
            }
            tokio::select! {
                _ = self.round() => {}
                _ = shutdown.recv() => {
                    tracing::info!("Abandoning in-flight sync round");
                    break;
                }
            }
        }

        tracing::info!("Peer sync stopped");
    }

    pub fn spawn(self: Arc<Self>, shutdown: ShutdownSignal) -> SyncHandle {
        SyncHandle {
            handle: tokio::spawn(self.run(shutdown)),
        }
    }
}

/// Handle to the scheduler task.
#[derive(Debug)]
pub struct SyncHandle {
    handle: JoinHandle<()>,
}

impl SyncHandle {
    /// Cancel the scheduler without waiting for it.
    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
