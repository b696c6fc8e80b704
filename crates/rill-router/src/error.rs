//! Error types for routing and dispatch.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// What a validation error is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationTarget {
    /// The request body failed validation.
    RequestBody,
    /// A path parameter failed validation.
    PathParam,
    /// A query parameter failed validation.
    QueryParam,
    /// The response failed validation.
    Response,
}

impl ValidationTarget {
    /// Returns the label used in the serialized error message.
    pub fn label(self) -> &'static str {
        match self {
            Self::RequestBody => "Request Body",
            Self::PathParam => "Path Param",
            Self::QueryParam => "Query Param",
            Self::Response => "Response",
        }
    }
}

/// A validation failure raised by a handler or by the request wrapper.
///
/// The default error handler turns these into a `400` response whose body is
/// [`ValidationError::message`]. Everything else a handler returns is treated
/// as fatal and re-propagated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// What was invalid.
    pub target: ValidationTarget,
    /// Field-level details, keyed by field name.
    pub details: HashMap<String, String>,
}

impl ValidationError {
    /// Creates a validation error for the given target.
    pub fn new(target: ValidationTarget, details: HashMap<String, String>) -> Self {
        Self { target, details }
    }

    /// Creates a request-body validation error.
    pub fn request_body(details: HashMap<String, String>) -> Self {
        Self::new(ValidationTarget::RequestBody, details)
    }

    /// Creates a path-parameter validation error.
    pub fn path_param(details: HashMap<String, String>) -> Self {
        Self::new(ValidationTarget::PathParam, details)
    }

    /// Creates a query-parameter validation error.
    pub fn query_param(details: HashMap<String, String>) -> Self {
        Self::new(ValidationTarget::QueryParam, details)
    }

    /// Creates a response validation error.
    pub fn response(details: HashMap<String, String>) -> Self {
        Self::new(ValidationTarget::Response, details)
    }

    /// Adds a detail entry.
    #[must_use]
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Returns the structured message sent as the body of a `400` response.
    ///
    /// The shape is `{"code":400,"status":"Bad Request!","error":"<Target>
    /// invalid","details":{...}}`.
    pub fn message(&self) -> String {
        serde_json::json!({
            "code": 400,
            "status": "Bad Request!",
            "error": format!("{} invalid", self.target.label()),
            "details": self.details,
        })
        .to_string()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Router-specific errors.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The request descriptor had no recognizable method and path.
    ///
    /// Fatal for the request; no response is defined at this layer.
    #[error("request not recognized: {0}")]
    MalformedRequest(String),

    /// The query string did not match the grammar (strict mode only).
    #[error("query string not recognized: {0}")]
    MalformedQuery(String),

    /// A route was registered with a syntactically invalid pattern.
    #[error("invalid route pattern: {0}")]
    InvalidPattern(String),

    /// `call_not_found` was invoked with no not-found handler configured.
    #[error("no not-found handler configured")]
    MissingNotFound,

    /// A handler raised a validation error.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A handler failed with an arbitrary error.
    ///
    /// The default error handler re-propagates these instead of converting
    /// them into a response.
    #[error("handler failed: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl RouterError {
    /// Wraps an arbitrary handler failure.
    pub fn handler(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Handler(err.into())
    }
}

/// Result type alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;
