//! The response wrapper handed to middleware and route handlers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Result, RouterError};
use crate::middleware::Handler;
use crate::request::Request;

/// Returns the standard reason phrase for a status code, if known.
pub fn status_text(code: u16) -> Option<&'static str> {
    match code {
        200 => Some("OK"),
        201 => Some("Created"),
        202 => Some("Accepted"),
        204 => Some("No Content"),
        301 => Some("Moved Permanently"),
        302 => Some("Found"),
        304 => Some("Not Modified"),
        400 => Some("Bad Request"),
        401 => Some("Unauthorized"),
        403 => Some("Forbidden"),
        404 => Some("Not Found"),
        405 => Some("Method Not Allowed"),
        409 => Some("Conflict"),
        422 => Some("Unprocessable Entity"),
        429 => Some("Too Many Requests"),
        500 => Some("Internal Server Error"),
        502 => Some("Bad Gateway"),
        503 => Some("Service Unavailable"),
        _ => None,
    }
}

/// The accumulated response for one request.
///
/// Shared by every [`Response`] wrapper for the request and read by the
/// server collaborator once dispatch completes. The `sent` flag is monotonic:
/// once set, every further write is a no-op.
#[derive(Debug)]
pub struct ResponseState {
    status_code: u16,
    status_message: Option<String>,
    headers: HashMap<String, String>,
    body: Vec<u8>,
    sent: bool,
}

/// Shared handle to a [`ResponseState`].
pub type SharedResponseState = Arc<Mutex<ResponseState>>;

impl ResponseState {
    /// Creates a fresh response state (`200`, no headers, empty body).
    pub fn new() -> Self {
        Self {
            status_code: 200,
            status_message: None,
            headers: HashMap::new(),
            body: Vec::new(),
            sent: false,
        }
    }

    /// Creates a fresh shared response state.
    pub fn shared() -> SharedResponseState {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Returns the status code.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Returns the status message, if one was set.
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Returns the response body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns whether the response has been finalized.
    pub fn is_sent(&self) -> bool {
        self.sent
    }

    pub(crate) fn mark_sent(&mut self) {
        self.sent = true;
    }

    fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), value);
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.keys().any(|k| k.eq_ignore_ascii_case(name))
    }
}

impl Default for ResponseState {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn lock_state(state: &SharedResponseState) -> MutexGuard<'_, ResponseState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The response wrapper handed to middleware and route handlers.
///
/// All setters are chainable and become no-ops once the response is sent.
#[derive(Clone)]
pub struct Response {
    state: SharedResponseState,
    request: Request,
    not_found: Option<Handler>,
}

impl Response {
    pub(crate) fn new(
        state: SharedResponseState,
        request: Request,
        not_found: Option<Handler>,
    ) -> Self {
        Self {
            state,
            request,
            not_found,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ResponseState> {
        lock_state(&self.state)
    }

    /// Sets a header.
    pub fn header(&self, name: impl AsRef<str>, value: impl Into<String>) -> &Self {
        let mut state = self.lock();
        if !state.sent {
            state.set_header(name.as_ref(), value.into());
        }
        self
    }

    /// Sets several headers at once.
    pub fn headers<I, K, V>(&self, headers: I) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.header(name, value);
        }
        self
    }

    /// Sets the status code.
    ///
    /// When the code has a standard reason phrase it also becomes the status
    /// message.
    pub fn code(&self, status_code: u16) -> &Self {
        let mut state = self.lock();
        if !state.sent {
            state.status_code = status_code;
            if let Some(text) = status_text(status_code) {
                state.status_message = Some(text.to_string());
            }
        }
        self
    }

    /// Sets the status message.
    pub fn status(&self, message: impl Into<String>) -> &Self {
        let mut state = self.lock();
        if !state.sent {
            state.status_message = Some(message.into());
        }
        self
    }

    /// Sets the `Content-Type` header.
    pub fn content_type(&self, content_type: impl Into<String>) -> &Self {
        self.header("Content-Type", content_type)
    }

    /// Finalizes the response with a text body.
    ///
    /// Defaults `Content-Type` to `application/json` when unset. A second
    /// `send` is a no-op.
    pub fn send(&self, body: impl AsRef<str>) {
        self.finish(body.as_ref().as_bytes().to_vec());
    }

    /// Finalizes the response with a pretty-printed JSON body.
    pub fn send_json<T: serde::Serialize>(&self, data: &T) {
        match serde_json::to_string_pretty(data) {
            Ok(body) => self.finish(body.into_bytes()),
            Err(err) => {
                tracing::warn!(error = %err, "response body serialization failed");
                self.code(500);
                self.finish(Vec::new());
            }
        }
    }

    /// Finalizes the response with an empty body.
    pub fn send_empty(&self) {
        self.finish(Vec::new());
    }

    fn finish(&self, body: Vec<u8>) {
        let mut state = self.lock();
        if state.sent {
            return;
        }
        if !state.has_header("Content-Type") {
            state.set_header("Content-Type", "application/json".to_string());
        }
        state.body = body;
        state.sent = true;
    }

    /// Returns whether the response has been finalized.
    pub fn is_sent(&self) -> bool {
        self.lock().sent
    }

    /// Returns the current status code.
    pub fn status_code(&self) -> u16 {
        self.lock().status_code
    }

    /// Returns the current status message, if one was set.
    pub fn status_message(&self) -> Option<String> {
        self.lock().status_message.clone()
    }

    /// Invokes the configured not-found handler with this request/response
    /// pair.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::MissingNotFound`] when no not-found handler is
    /// configured.
    pub async fn call_not_found(&self) -> Result<()> {
        let handler = self
            .not_found
            .clone()
            .ok_or(RouterError::MissingNotFound)?;
        handler(self.request.clone(), self.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{QueryMode, RequestDescriptor};
    use crate::request::{PathParams, RawRequest, RequestShared};

    fn make_response() -> Response {
        let raw = RawRequest::new("GET", "/");
        let descriptor =
            RequestDescriptor::parse(&raw.request_line(), QueryMode::Lenient).unwrap();
        let request = Request::new(
            Arc::new(RequestShared::new(raw, descriptor)),
            PathParams::new(),
        );
        Response::new(ResponseState::shared(), request, None)
    }

    #[test]
    fn fluent_setters_chain() {
        let res = make_response();
        res.code(201).status("All Good").header("X-Custom", "1");
        assert_eq!(res.status_code(), 201);
        assert_eq!(res.status_message(), Some("All Good".to_string()));
    }

    #[test]
    fn code_sets_standard_status_message() {
        let res = make_response();
        res.code(404);
        assert_eq!(res.status_message(), Some("Not Found".to_string()));
    }

    #[test]
    fn send_defaults_content_type_to_json() {
        let res = make_response();
        res.send("hello");
        let state = res.lock();
        assert!(state.is_sent());
        assert_eq!(
            state.headers().get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(state.body(), b"hello");
    }

    #[test]
    fn send_respects_existing_content_type() {
        let res = make_response();
        res.content_type("text/plain");
        res.send("hello");
        assert_eq!(
            res.lock().headers().get("Content-Type").map(String::as_str),
            Some("text/plain")
        );
    }

    #[test]
    fn send_json_pretty_prints() {
        let res = make_response();
        res.send_json(&serde_json::json!({"a": 1}));
        let state = res.lock();
        let body = std::str::from_utf8(state.body()).unwrap();
        assert!(body.contains('\n'), "expected pretty-printed JSON: {body}");
    }

    #[test]
    fn second_send_is_a_no_op() {
        let res = make_response();
        res.send("first");
        res.code(500);
        res.send("second");
        let state = res.lock();
        assert_eq!(state.body(), b"first");
        assert_eq!(state.status_code(), 200);
    }

    #[tokio::test]
    async fn call_not_found_without_handler_fails() {
        let res = make_response();
        assert!(matches!(
            res.call_not_found().await,
            Err(RouterError::MissingNotFound)
        ));
    }

    #[test]
    fn status_text_table() {
        assert_eq!(status_text(200), Some("OK"));
        assert_eq!(status_text(404), Some("Not Found"));
        assert_eq!(status_text(999), None);
    }
}
