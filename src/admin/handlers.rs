//! Admin and status endpoints.
//!
//! - `/peers`: list (public), add and remove (admin)
//! - `/stats`: id count (public), bulk clear (admin)
//! - `/health`: lifecycle state and counts

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::admin::auth::{AdminAuth, ErrorBody};
use crate::http::dispatch::{DispatchError, Dispatcher};
use crate::http::{Request, Response};
use crate::lifecycle::Lifecycle;
use crate::peers::{PeerRegistry, PeerView};
use crate::stats::Statistics;

#[derive(Serialize)]
pub struct PeerList {
    pub peers: Vec<PeerView>,
}

#[derive(Serialize)]
pub struct PeerChange {
    pub ok: bool,
    pub changed: bool,
}

#[derive(Serialize)]
pub struct StatsSummary {
    pub total: usize,
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub peers: usize,
    pub ids: usize,
}

#[derive(Deserialize)]
struct AddressBody {
    address: Option<String>,
}

fn address_from_body(request: &Request) -> Option<String> {
    let body = request.body.as_deref()?;
    let parsed: AddressBody = serde_json::from_slice(body).ok()?;
    parsed.address.map(|a| a.trim().to_string()).filter(|a| !a.is_empty())
}

fn error(status: u16, message: &str) -> Result<Response, DispatchError> {
    Ok(Response::json(status, &ErrorBody { error: message })?)
}

fn method_not_allowed(allow: &str) -> Result<Response, DispatchError> {
    Ok(Response::html(405, "<h1>Method Not Allowed</h1>").with_header("Allow", allow))
}

pub struct PeersEndpoint {
    registry: Arc<PeerRegistry>,
    auth: AdminAuth,
}

impl PeersEndpoint {
    pub fn new(registry: Arc<PeerRegistry>, auth: AdminAuth) -> Self {
        Self { registry, auth }
    }

    async fn handle(&self, request: &Request) -> Result<Response, DispatchError> {
        match request.method.as_str() {
            "GET" => Ok(Response::json(200, &PeerList { peers: self.registry.views() })?),
            "POST" => {
                if let Some(denied) = self.auth.check(request) {
                    return Ok(denied);
                }
                let Some(address) = address_from_body(request) else {
                    return error(400, "address required");
                };
                let added = self.registry.add_peer(&address, true).await;
                Ok(Response::json(200, &PeerChange { ok: true, changed: added })?)
            }
            "DELETE" => {
                if let Some(denied) = self.auth.check(request) {
                    return Ok(denied);
                }
                let address = request
                    .query_param("id")
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .or_else(|| address_from_body(request));
                let Some(address) = address else {
                    return error(400, "address required");
                };
                if self.registry.remove_peer(&address).await {
                    Ok(Response::json(200, &PeerChange { ok: true, changed: true })?)
                } else {
                    error(404, "not found")
                }
            }
            _ => method_not_allowed("GET, POST, DELETE"),
        }
    }
}

impl Dispatcher for PeersEndpoint {
    fn dispatch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, DispatchError>> {
        Box::pin(self.handle(request))
    }
}

pub struct StatsEndpoint {
    stats: Arc<Statistics>,
    auth: AdminAuth,
}

impl StatsEndpoint {
    pub fn new(stats: Arc<Statistics>, auth: AdminAuth) -> Self {
        Self { stats, auth }
    }

    fn handle(&self, request: &Request) -> Result<Response, DispatchError> {
        match request.method.as_str() {
            "GET" => Ok(Response::json(200, &StatsSummary { total: self.stats.total() })?),
            "DELETE" => {
                if let Some(denied) = self.auth.check(request) {
                    return Ok(denied);
                }
                self.stats.clear();
                Ok(Response::json(200, &StatsSummary { total: 0 })?)
            }
            _ => method_not_allowed("GET, DELETE"),
        }
    }
}

impl Dispatcher for StatsEndpoint {
    fn dispatch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, DispatchError>> {
        Box::pin(async move { self.handle(request) })
    }
}

pub struct HealthEndpoint {
    lifecycle: Arc<Lifecycle>,
    registry: Arc<PeerRegistry>,
    stats: Arc<Statistics>,
}

impl HealthEndpoint {
    pub fn new(lifecycle: Arc<Lifecycle>, registry: Arc<PeerRegistry>, stats: Arc<Statistics>) -> Self {
        Self {
            lifecycle,
            registry,
            stats,
        }
    }
}

impl Dispatcher for HealthEndpoint {
    fn dispatch<'a>(&'a self, _request: &'a Request) -> BoxFuture<'a, Result<Response, DispatchError>> {
        Box::pin(async move {
            Ok(Response::json(
                200,
                &HealthStatus {
                    version: env!("CARGO_PKG_VERSION"),
                    status: self.lifecycle.state().as_str(),
                    peers: self.registry.len(),
                    ids: self.stats.total(),
                },
            )?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryStore, NoopStore};
    use crate::stats::IdGenerator;

    const KEY: &str = "k";

    fn admin(req: Request) -> Request {
        req.with_header("Authorization", format!("Bearer {}", KEY))
    }

    async fn peers_endpoint() -> (PeersEndpoint, Arc<PeerRegistry>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(PeerRegistry::new(store.clone()));
        registry.set_self("127.0.0.1:7000").await;
        (PeersEndpoint::new(Arc::clone(&registry), AdminAuth::new(KEY)), registry, store)
    }

    #[tokio::test]
    async fn get_lists_self_first() {
        let (ep, registry, _) = peers_endpoint().await;
        registry.add_peer("10.0.0.1:80", false).await;

        let resp = ep.dispatch(&Request::new("GET", "/peers")).await.unwrap();
        let body: serde_json::Value = serde_json::from_str(&resp.body_text()).unwrap();
        let peers = body["peers"].as_array().unwrap();
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0]["self"], true);
        assert_eq!(peers[0]["status"], "SELF");
        assert_eq!(peers[1]["address"], "10.0.0.1:80");
        assert_eq!(peers[1]["status"], "UNKNOWN");
        assert!(peers[1]["lastSeen"].is_null());
    }

    #[tokio::test]
    async fn mutations_need_credential() {
        let (ep, registry, _) = peers_endpoint().await;
        let post = Request::new("POST", "/peers").with_body(&b"{\"address\":\"10.0.0.2:80\"}"[..]);
        let resp = ep.dispatch(&post).await.unwrap();
        assert_eq!(resp.status, 403);
        assert_eq!(resp.body_text(), "{\"error\":\"admin required\"}");
        assert!(registry.is_empty());

        let resp = ep.dispatch(&admin(post)).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn post_without_address_is_400() {
        let (ep, _, _) = peers_endpoint().await;
        let resp = ep
            .dispatch(&admin(Request::new("POST", "/peers").with_body(&b"{}"[..])))
            .await
            .unwrap();
        assert_eq!(resp.status, 400);
        assert_eq!(resp.body_text(), "{\"error\":\"address required\"}");
    }

    #[tokio::test]
    async fn delete_by_query_or_body() {
        let (ep, registry, store) = peers_endpoint().await;
        registry.add_peer("10.0.0.3:80", true).await;
        registry.add_peer("10.0.0.4:80", true).await;

        let by_query = admin(Request::new("DELETE", "/peers?id=10.0.0.3%3A80"));
        assert_eq!(ep.dispatch(&by_query).await.unwrap().status, 200);

        let by_body = admin(Request::new("DELETE", "/peers").with_body(&b"{\"address\":\"10.0.0.4\"}"[..]));
        assert_eq!(ep.dispatch(&by_body).await.unwrap().status, 200);
        assert!(registry.is_empty());

        let again = admin(Request::new("DELETE", "/peers?id=10.0.0.4:80"));
        let resp = ep.dispatch(&again).await.unwrap();
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body_text(), "{\"error\":\"not found\"}");

        let deletes = store.notifications().iter().filter(|n| n.starts_with("delete_peer")).count();
        assert_eq!(deletes, 2);

        let missing = admin(Request::new("DELETE", "/peers"));
        assert_eq!(ep.dispatch(&missing).await.unwrap().status, 400);
    }

    #[tokio::test]
    async fn stats_count_and_clear() {
        let stats = Arc::new(Statistics::new(IdGenerator::default(), Arc::new(NoopStore)));
        stats.merge([1, 2, 3]);
        let ep = StatsEndpoint::new(Arc::clone(&stats), AdminAuth::new(KEY));

        let resp = ep.dispatch(&Request::new("GET", "/stats")).await.unwrap();
        assert_eq!(resp.body_text(), "{\"total\":3}");

        let resp = ep.dispatch(&Request::new("DELETE", "/stats")).await.unwrap();
        assert_eq!(resp.status, 403);
        assert_eq!(stats.total(), 3);

        let resp = ep.dispatch(&admin(Request::new("DELETE", "/stats"))).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(stats.total(), 0);
    }

    #[tokio::test]
    async fn health_reports_state() {
        let lifecycle = Arc::new(Lifecycle::new());
        lifecycle.start().unwrap();
        let registry = Arc::new(PeerRegistry::new(Arc::new(NoopStore)));
        let stats = Arc::new(Statistics::new(IdGenerator::default(), Arc::new(NoopStore)));
        let ep = HealthEndpoint::new(lifecycle, registry, stats);

        let resp = ep.dispatch(&Request::new("GET", "/health")).await.unwrap();
        let body: serde_json::Value = serde_json::from_str(&resp.body_text()).unwrap();
        assert_eq!(body["status"], "open");
    }
}
