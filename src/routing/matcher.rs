//! Route matching logic.
//!
//! # Design Decisions
//! - Path matching is case-sensitive and ignores the query string
//! - Prefixes match whole segments: `/peers` matches `/peers/x`, not `/peersx`
//! - No regex

use crate::http::Request;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    fn matches(&self, req: &Request) -> bool;

    /// Higher wins when several routes match.
    fn specificity(&self) -> usize;
}

/// Matches one path exactly.
#[derive(Debug, Clone)]
pub struct ExactPathMatcher {
    path: String,
}

impl ExactPathMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Matcher for ExactPathMatcher {
    fn matches(&self, req: &Request) -> bool {
        req.path() == self.path
    }

    fn specificity(&self) -> usize {
        // Any exact match outranks any prefix.
        usize::MAX / 2 + self.path.len()
    }
}

/// Matches a path prefix on segment boundaries.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = match prefix.trim_end_matches('/') {
            "" => "/".to_string(),
            trimmed => trimmed.to_string(),
        };
        Self { prefix }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, req: &Request) -> bool {
        let path = req.path();
        if self.prefix == "/" {
            return path.starts_with('/');
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    fn specificity(&self) -> usize {
        self.prefix.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_ignores_query() {
        let matcher = ExactPathMatcher::new("/peers");
        assert!(matcher.matches(&Request::new("GET", "/peers?id=x")));
        assert!(!matcher.matches(&Request::new("GET", "/peers/x")));
    }

    #[test]
    fn prefix_respects_segments() {
        let matcher = PathPrefixMatcher::new("/sync/");
        assert!(matcher.matches(&Request::new("GET", "/sync")));
        assert!(matcher.matches(&Request::new("GET", "/sync/stats")));
        assert!(!matcher.matches(&Request::new("GET", "/syncs")));

        let root = PathPrefixMatcher::new("/");
        assert!(root.matches(&Request::new("GET", "/anything")));
    }
}
