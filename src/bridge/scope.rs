//! Connection scope validation.
//!
//! Every bridge connection is bound at upgrade time to the base path it was
//! opened against. Requests decoded on that connection may only address
//! resources beneath that base path.
//!
//! # Design Decisions
//! - Matching is segment-aware: `/base` admits `/base` and `/base/...`
//!   but not `/base2`
//! - Path matching is case-sensitive
//! - Query strings are ignored
//! - Dot segments are refused outright rather than normalised

use thiserror::Error;

use crate::bridge::request::PseudoRequest;

/// A request addressed a path outside the connection's scope.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("path {path:?} is outside connection scope {base_path:?}")]
pub struct ScopeError {
    pub path: String,
    pub base_path: String,
}

/// Checks decoded requests against the connection's bound base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeValidator {
    base_path: String,
}

impl ScopeValidator {
    /// Create a validator for the given base path.
    /// A trailing slash is ignored, so `/base/` and `/base` bind the same scope.
    pub fn new(base_path: impl Into<String>) -> Self {
        let mut base_path = base_path.into();
        while base_path.len() > 1 && base_path.ends_with('/') {
            base_path.pop();
        }
        Self { base_path }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Returns true if `path` lies within the bound scope.
    ///
    /// Paths with `.` or `..` segments, plain or percent-encoded, are never
    /// in scope.
    pub fn contains(&self, path: &str) -> bool {
        if path.split('/').any(is_dot_segment) {
            return false;
        }
        if self.base_path == "/" {
            return path.starts_with('/');
        }
        match path.strip_prefix(self.base_path.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    pub fn validate(&self, request: &PseudoRequest) -> Result<(), ScopeError> {
        if self.contains(request.path()) {
            Ok(())
        } else {
            Err(ScopeError {
                path: request.path().to_string(),
                base_path: self.base_path.clone(),
            })
        }
    }
}

fn is_dot_segment(segment: &str) -> bool {
    let segment = segment.to_ascii_lowercase().replace("%2e", ".");
    segment == "." || segment == ".."
}
