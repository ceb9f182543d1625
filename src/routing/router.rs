//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store routes
//! - Look up the most specific matching route for a request
//! - Answer 404 when nothing matches
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in specificity order (route counts are tiny)

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::dispatch::{DispatchError, Dispatcher};
use crate::http::{Request, Response};
use crate::routing::matcher::{ExactPathMatcher, Matcher, PathPrefixMatcher};

struct Route {
    name: String,
    matcher: Box<dyn Matcher>,
    endpoint: Arc<dyn Dispatcher>,
}

#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exact(self, path: &str, endpoint: Arc<dyn Dispatcher>) -> Self {
        self.route(path, Box::new(ExactPathMatcher::new(path)), endpoint)
    }

    pub fn prefix(self, prefix: &str, endpoint: Arc<dyn Dispatcher>) -> Self {
        self.route(prefix, Box::new(PathPrefixMatcher::new(prefix)), endpoint)
    }

    fn route(mut self, name: &str, matcher: Box<dyn Matcher>, endpoint: Arc<dyn Dispatcher>) -> Self {
        self.routes.push(Route {
            name: name.to_string(),
            matcher,
            endpoint,
        });
        self.routes
            .sort_by(|a, b| b.matcher.specificity().cmp(&a.matcher.specificity()));
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn lookup(&self, request: &Request) -> Option<&Route> {
        self.routes.iter().find(|r| r.matcher.matches(request))
    }
}

impl Dispatcher for Router {
    fn dispatch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, DispatchError>> {
        Box::pin(async move {
            match self.lookup(request) {
                Some(route) => {
                    tracing::trace!(route = %route.name, path = request.path(), "Route matched");
                    route.endpoint.dispatch(request).await
                }
                None => Ok(Response::html(404, "<h1>Not Found</h1>")),
            }
        })
    }
}
