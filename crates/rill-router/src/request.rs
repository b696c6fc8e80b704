//! Request types: the raw request supplied by the server collaborator and
//! the per-match request wrapper handed to handlers.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use crate::descriptor::RequestDescriptor;
use crate::error::ValidationError;

/// HTTP request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET method
    Get,
    /// POST method
    Post,
    /// PUT method
    Put,
    /// PATCH method
    Patch,
    /// DELETE method
    Delete,
    /// HEAD method
    Head,
    /// OPTIONS method
    Options,
}

impl Method {
    /// Parses a method from a string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            "HEAD" => Some(Self::Head),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }

    /// Returns the method as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Path parameters extracted from `:name` pattern segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: HashMap<String, String>,
}

impl PathParams {
    /// Creates new empty path params.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Gets a parameter value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Gets a parameter value or returns a path-param validation error.
    pub fn require(&self, key: &str) -> Result<&str, ValidationError> {
        self.get(key).ok_or_else(|| {
            ValidationError::path_param(HashMap::new()).detail(key, "missing path parameter")
        })
    }

    /// Parses a parameter as a specific type.
    pub fn parse<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// Returns the number of bound parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns whether no parameters are bound.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Returns an iterator over the parameters.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// The raw request parts supplied by the server collaborator.
///
/// One `RawRequest` is consumed per dispatch; the body bytes are read from
/// the connection exactly once before dispatch begins.
#[derive(Debug, Clone)]
pub struct RawRequest {
    /// Request method as received on the wire.
    pub method: String,
    /// Request target: path plus optional query string.
    pub target: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Whole request body.
    pub body: Vec<u8>,
}

impl RawRequest {
    /// Creates a new raw request.
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Sets a header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the `METHOD:TARGET` descriptor string for this request.
    pub fn request_line(&self) -> String {
        format!("{}:{}", self.method.to_uppercase(), self.target)
    }
}

/// Lazily-parsed JSON body, shared by every wrapper for one request.
#[derive(Debug)]
struct BodyCell {
    bytes: Vec<u8>,
    json_expected: bool,
    parsed: OnceLock<Result<Value, String>>,
}

impl BodyCell {
    fn value(&self) -> Result<&Value, ValidationError> {
        let parsed = self.parsed.get_or_init(|| {
            if !self.json_expected || self.bytes.is_empty() {
                return Ok(Value::Object(serde_json::Map::new()));
            }
            serde_json::from_slice(&self.bytes).map_err(|err| err.to_string())
        });
        match parsed {
            Ok(value) => Ok(value),
            Err(err) => Err(ValidationError::request_body(HashMap::new()).detail("body", err)),
        }
    }
}

/// Per-request state shared by every wrapper derived from the same request.
#[derive(Debug)]
pub(crate) struct RequestShared {
    pub(crate) descriptor: RequestDescriptor,
    headers: HashMap<String, String>,
    body: BodyCell,
}

impl RequestShared {
    /// Consumes the raw request into shared per-request state.
    ///
    /// JSON body parsing only applies to POST/PUT; other methods see an
    /// empty object. The parse runs at most once per request.
    pub(crate) fn new(raw: RawRequest, descriptor: RequestDescriptor) -> Self {
        let json_expected = matches!(descriptor.method.as_str(), "POST" | "PUT");
        Self {
            descriptor,
            headers: raw.headers,
            body: BodyCell {
                bytes: raw.body,
                json_expected,
                parsed: OnceLock::new(),
            },
        }
    }
}

/// The request wrapper handed to middleware and route handlers.
///
/// Cloning is cheap; all clones for one request share the descriptor,
/// headers and the cached body.
#[derive(Debug, Clone)]
pub struct Request {
    shared: Arc<RequestShared>,
    path_params: PathParams,
}

impl Request {
    pub(crate) fn new(shared: Arc<RequestShared>, path_params: PathParams) -> Self {
        Self {
            shared,
            path_params,
        }
    }

    /// Returns the request method (uppercased).
    pub fn method(&self) -> &str {
        &self.shared.descriptor.method
    }

    /// Returns the request path.
    pub fn path(&self) -> &str {
        &self.shared.descriptor.path
    }

    /// Returns the parsed request descriptor.
    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.shared.descriptor
    }

    /// Returns the path parameters bound by the matched pattern.
    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    /// Returns the query parameters.
    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.shared.descriptor.query_params
    }

    /// Gets a query parameter.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.shared
            .descriptor
            .query_params
            .get(key)
            .map(String::as_str)
    }

    /// Gets a query parameter or returns a query-param validation error.
    pub fn require_query(&self, key: &str) -> Result<&str, ValidationError> {
        self.query(key).ok_or_else(|| {
            ValidationError::query_param(HashMap::new()).detail(key, "missing query parameter")
        })
    }

    /// Gets a header value, case-insensitively.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.shared
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the JSON body.
    ///
    /// POST/PUT bodies are parsed once per request and cached; every other
    /// method sees an empty object. A body that is not valid JSON is a
    /// request-body validation error.
    pub fn body(&self) -> Result<&Value, ValidationError> {
        self.shared.body.value()
    }

    /// Deserializes the JSON body into a concrete type.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, ValidationError> {
        let value = self.body()?.clone();
        serde_json::from_value(value).map_err(|err| {
            ValidationError::request_body(HashMap::new()).detail("body", err.to_string())
        })
    }
}
