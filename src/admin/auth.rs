//! Admin credential check.
//!
//! Mutating admin calls must carry the configured API key, either as
//! `Authorization: Bearer <key>` or as `X-Admin-Key: <key>`. With no key
//! configured every mutation is refused.

use serde::Serialize;

use crate::http::{Request, Response};

#[derive(Debug, Clone)]
pub struct AdminAuth {
    api_key: String,
}

#[derive(Serialize)]
pub(crate) struct ErrorBody<'a> {
    pub error: &'a str,
}

impl AdminAuth {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub fn is_authorized(&self, request: &Request) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let bearer = request
            .header("Authorization")
            .and_then(|v| v.trim().strip_prefix("Bearer "))
            .map(str::trim);
        let header_key = request.header("X-Admin-Key").map(str::trim);

        bearer == Some(self.api_key.as_str()) || header_key == Some(self.api_key.as_str())
    }

    /// `None` when authorized, else the 403 to send.
    pub fn check(&self, request: &Request) -> Option<Response> {
        if self.is_authorized(request) {
            return None;
        }
        tracing::warn!(method = %request.method, target = %request.target, "Admin credential rejected");
        Some(forbidden())
    }
}

fn forbidden() -> Response {
    Response::json(403, &ErrorBody { error: "admin required" })
        .unwrap_or_else(|_| Response::text(403, "admin required"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bearer_or_header_key() {
        let auth = AdminAuth::new("s3cret");
        let bearer = Request::new("POST", "/peers").with_header("Authorization", "Bearer s3cret");
        let header = Request::new("POST", "/peers").with_header("x-admin-key", "s3cret");
        assert!(auth.is_authorized(&bearer));
        assert!(auth.is_authorized(&header));
    }

    #[test]
    fn rejects_missing_wrong_or_disabled() {
        let auth = AdminAuth::new("s3cret");
        assert!(!auth.is_authorized(&Request::new("POST", "/peers")));
        let wrong = Request::new("POST", "/peers").with_header("Authorization", "Bearer nope");
        assert!(!auth.is_authorized(&wrong));

        let legacy = Request::new("POST", "/peers").with_header("X-Admin", "true");
        assert!(!auth.is_authorized(&legacy));

        let disabled = AdminAuth::new("");
        let empty = Request::new("POST", "/peers").with_header("Authorization", "Bearer ");
        assert!(!disabled.is_authorized(&empty));
        assert_eq!(disabled.check(&empty).unwrap().status, 403);
    }
}
