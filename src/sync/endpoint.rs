//! Inbound side of the sync protocol.
//!
//! `POST` unions the posted ids into the local set and always answers 200,
//! even when nothing parsed. `GET` returns the whole set.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Serialize;

use crate::http::dispatch::{DispatchError, Dispatcher};
use crate::http::{Request, Response};
use crate::stats::Statistics;

#[derive(Debug, Serialize)]
struct MergeReply {
    merged: usize,
}

pub struct SyncEndpoint {
    stats: Arc<Statistics>,
}

impl SyncEndpoint {
    pub fn new(stats: Arc<Statistics>) -> Self {
        Self { stats }
    }

    fn handle(&self, request: &Request) -> Result<Response, DispatchError> {
        match request.method.as_str() {
            "GET" => Ok(Response::json(200, &self.stats.payload())?),
            "POST" => {
                let merged = self.stats.merge_payload(&request.body_text());
                tracing::debug!(merged, "Sync payload received");
                Ok(Response::json(200, &MergeReply { merged })?)
            }
            _ => Ok(Response::text(405, "Method Not Allowed").with_header("Allow", "GET, POST")),
        }
    }
}

impl Dispatcher for SyncEndpoint {
    fn dispatch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, DispatchError>> {
        Box::pin(async move { self.handle(request) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::NoopStore;
    use crate::stats::IdGenerator;

    fn endpoint() -> (SyncEndpoint, Arc<Statistics>) {
        let stats = Arc::new(Statistics::new(IdGenerator::default(), Arc::new(NoopStore)));
        (SyncEndpoint::new(Arc::clone(&stats)), stats)
    }

    #[tokio::test]
    async fn post_merges_and_reports_new_count() {
        let (ep, stats) = endpoint();
        stats.merge([1, 2]);
        let req = Request::new("POST", "/sync/stats").with_body(&b"{\"timestamps\":[2,3,4]}"[..]);
        let resp = ep.dispatch(&req).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body_text(), "{\"merged\":2}");
        assert_eq!(stats.ids(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn post_garbage_still_succeeds() {
        let (ep, stats) = endpoint();
        let req = Request::new("POST", "/sync/stats").with_body(&b"not json"[..]);
        let resp = ep.dispatch(&req).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(stats.total(), 0);
    }

    #[tokio::test]
    async fn get_returns_full_set_and_others_are_405() {
        let (ep, stats) = endpoint();
        stats.merge([7, 5]);
        let resp = ep.dispatch(&Request::new("GET", "/sync/stats")).await.unwrap();
        assert_eq!(resp.body_text(), "{\"timestamps\":[5,7]}");

        let resp = ep.dispatch(&Request::new("PUT", "/sync/stats")).await.unwrap();
        assert_eq!(resp.status, 405);
    }
}
