//! Built-in event observers.
//!
//! - access log: one `info!` line per response
//! - id recorder: one id per served request (sync traffic excluded)
//! - metrics: request counters, latency, id-set size

use std::sync::Arc;

use crate::events::{Event, EventBus, EventKind, SubscriptionId};
use crate::observability::metrics;
use crate::stats::Statistics;

pub fn access_log(bus: &EventBus) -> SubscriptionId {
    bus.subscribe(EventKind::Response, |event| {
        if let Event::Response(resp) = event {
            tracing::info!(
                method = %resp.request.method,
                target = %resp.request.target,
                version = %resp.request.version,
                status = resp.status,
                duration_ms = resp.duration.as_millis() as u64,
                "request served"
            );
        }
    })
}

/// Log an id for every request whose path is not `sync_path`.
pub fn id_recorder(bus: &EventBus, stats: Arc<Statistics>, sync_path: String) -> SubscriptionId {
    bus.subscribe(EventKind::Request, move |event| {
        if let Event::Request(req) = event {
            if req.request.path() != sync_path {
                stats.log_request(&req.request.method, &req.request.target);
            }
        }
    })
}

pub fn metrics_recorder(bus: &EventBus, stats: Arc<Statistics>) -> SubscriptionId {
    bus.subscribe(EventKind::Response, move |event| {
        if let Event::Response(resp) = event {
            metrics::record_request(&resp.request.method, resp.status, resp.duration);
            metrics::record_id_count(stats.total());
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{RequestEvent, ResponseEvent};
    use crate::http::Request;
    use crate::persistence::NoopStore;
    use crate::stats::IdGenerator;
    use chrono::Utc;
    use std::time::Duration;

    #[tokio::test]
    async fn id_recorder_skips_sync_traffic() {
        let bus = EventBus::new();
        let stats = Arc::new(Statistics::new(IdGenerator::default(), Arc::new(NoopStore)));
        id_recorder(&bus, Arc::clone(&stats), "/sync/stats".into());
        access_log(&bus);
        metrics_recorder(&bus, Arc::clone(&stats));

        for target in ["/", "/sync/stats", "/peers?x=1"] {
            let request = Arc::new(Request::new("GET", target));
            bus.publish(Event::Request(RequestEvent {
                request: Arc::clone(&request),
                at: Utc::now(),
            }));
            bus.publish(Event::Response(ResponseEvent {
                request,
                status: 200,
                duration: Duration::from_millis(1),
                at: Utc::now(),
            }));
        }

        for _ in 0..100 {
            if stats.total() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(stats.total(), 2);
    }
}
