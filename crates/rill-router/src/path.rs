//! Path pattern matching.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, RouterError};
use crate::request::PathParams;

/// A segment in a path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A literal string segment, compared case-sensitively.
    Literal(String),
    /// A parameter segment (e.g. `:id`) binding the actual segment value.
    Param(String),
}

fn pattern_syntax() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:/:?[\w-]+)+/?$").expect("pattern syntax regex"))
}

/// A registered route's path template, possibly containing `:name` segments.
///
/// Patterns are validated at construction; an invalid pattern is a
/// configuration error, not a per-request failure.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    pattern: String,
    segments: Vec<PathSegment>,
}

impl RoutePattern {
    /// Parses and validates a pattern string.
    ///
    /// Pattern syntax:
    /// - `/` - the root path, matched exactly
    /// - `/users` - literal path
    /// - `/users/:id` - path with a single-segment parameter
    /// - a single trailing slash is allowed and ignored
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InvalidPattern`] if the pattern does not match
    /// the syntax above.
    ///
    /// # Example
    ///
    /// ```
    /// use rill_router::RoutePattern;
    ///
    /// let pattern = RoutePattern::parse("/users/:id").unwrap();
    /// let params = pattern.match_path("/users/42").unwrap();
    /// assert_eq!(params.get("id"), Some("42"));
    /// ```
    pub fn parse(pattern: &str) -> Result<Self> {
        if pattern == "/" {
            return Ok(Self {
                pattern: pattern.to_string(),
                segments: Vec::new(),
            });
        }

        if !pattern_syntax().is_match(pattern) {
            return Err(RouterError::InvalidPattern(pattern.to_string()));
        }

        let trimmed = pattern.strip_suffix('/').unwrap_or(pattern);
        let segments = trimmed
            .split('/')
            .skip(1)
            .map(|part| match part.strip_prefix(':') {
                Some(name) => PathSegment::Param(name.to_string()),
                None => PathSegment::Literal(part.to_string()),
            })
            .collect();

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
        })
    }

    /// Attempts to match a request path against this pattern.
    ///
    /// Returns the extracted parameters if the path matches. The walk is
    /// segmentwise: a `:name` segment binds unconditionally, a literal
    /// segment must compare equal.
    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        if self.pattern == "/" {
            return (path == "/").then(PathParams::new);
        }

        let actual: Vec<&str> = path.split('/').skip(1).collect();
        if actual.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::new();
        for (segment, value) in self.segments.iter().zip(&actual) {
            match segment {
                PathSegment::Param(name) => params.insert(name.clone(), (*value).to_string()),
                PathSegment::Literal(lit) => {
                    if lit != value {
                        return None;
                    }
                }
            }
        }

        Some(params)
    }

    /// Returns the original pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the parsed segments.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }
}
