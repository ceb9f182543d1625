//! Request/response event bus.
//!
//! # Data Flow
//! ```text
//! net::handler
//!     → publish(Event::Request)  before dispatch
//!     → publish(Event::Response) after the response is written
//!     → delivery task → handlers registered for that EventKind
//! ```
//!
//! # Design Decisions
//! - One bus per node, passed to dependents explicitly
//! - Events are a tagged union; handlers are keyed by kind
//! - Delivery is asynchronous and ordered on a single task
//! - A panicking handler is logged and skipped; publishers never see it

pub mod observers;

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::http::Request;

/// A request was decoded and is about to be dispatched.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub request: Arc<Request>,
    pub at: DateTime<Utc>,
}

/// A response was produced for a request.
#[derive(Debug, Clone)]
pub struct ResponseEvent {
    pub request: Arc<Request>,
    pub status: u16,
    pub duration: Duration,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum Event {
    Request(RequestEvent),
    Response(ResponseEvent),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Request(_) => EventKind::Request,
            Event::Response(_) => EventKind::Response,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Request,
    Response,
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;
type HandlerTable = Arc<RwLock<HashMap<EventKind, Vec<(SubscriptionId, Handler)>>>>;

/// Per-node event dispatcher.
pub struct EventBus {
    handlers: HandlerTable,
    tx: mpsc::UnboundedSender<Event>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create the bus and spawn its delivery task on the current runtime.
    ///
    /// The task exits once the bus is dropped.
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handlers: HandlerTable = Arc::new(RwLock::new(HashMap::new()));
        tokio::spawn(deliver(rx, Arc::clone(&handlers)));
        Arc::new(Self {
            handlers,
            tx,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut table = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        table.entry(kind).or_default().push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut table = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        match table.get_mut(&kind) {
            Some(list) => {
                let before = list.len();
                list.retain(|(sub, _)| *sub != id);
                list.len() != before
            }
            None => false,
        }
    }

    /// Queue an event for delivery. Never blocks and never fails the caller.
    pub fn publish(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Event bus delivery task is gone; event dropped");
        }
    }
}

async fn deliver(mut rx: mpsc::UnboundedReceiver<Event>, handlers: HandlerTable) {
    while let Some(event) = rx.recv().await {
        let targets: Vec<Handler> = {
            let table = handlers.read().unwrap_or_else(|e| e.into_inner());
            match table.get(&event.kind()) {
                Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
                None => continue,
            }
        };

        for handler in targets {
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                tracing::error!(kind = ?event.kind(), "Event handler panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn request_event() -> Event {
        Event::Request(RequestEvent {
            request: Arc::new(Request::new("GET", "/")),
            at: Utc::now(),
        })
    }

    async fn eventually(check: impl Fn() -> bool) {
        for _ in 0..100 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn routes_events_by_kind() {
        let bus = EventBus::new();
        let requests = Arc::new(AtomicUsize::new(0));
        let responses = Arc::new(AtomicUsize::new(0));

        let r = requests.clone();
        bus.subscribe(EventKind::Request, move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        });
        let s = responses.clone();
        bus.subscribe(EventKind::Response, move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(request_event());
        bus.publish(request_event());

        eventually(|| requests.load(Ordering::SeqCst) == 2).await;
        assert_eq!(responses.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panicking_handler_does_not_stop_delivery() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        bus.subscribe(EventKind::Request, |_| panic!("observer bug"));
        let s = seen.clone();
        bus.subscribe(EventKind::Request, move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(request_event());
        bus.publish(request_event());
        eventually(|| seen.load(Ordering::SeqCst) == 2).await;
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        let id = bus.subscribe(EventKind::Request, move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });

        assert!(bus.unsubscribe(EventKind::Request, id));
        assert!(!bus.unsubscribe(EventKind::Request, id));

        bus.publish(request_event());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }
}
