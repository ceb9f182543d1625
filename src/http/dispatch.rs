//! Application dispatcher interface.
//!
//! The lifecycle gate is the only caller; it hands every admitted request to
//! the registered dispatcher and turns any error or panic into a 500.

use futures_util::future::BoxFuture;

use crate::http::{Request, Response};

/// Fault raised by application logic while producing a response.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("internal error: {0}")]
    Internal(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Turns a request into a response.
pub trait Dispatcher: Send + Sync {
    fn dispatch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, DispatchError>>;
}

/// Adapter for synchronous closures.
pub struct FnDispatcher<F>(pub F);

impl<F> Dispatcher for FnDispatcher<F>
where
    F: Fn(&Request) -> Result<Response, DispatchError> + Send + Sync,
{
    fn dispatch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, DispatchError>> {
        Box::pin(async move { (self.0)(request) })
    }
}
