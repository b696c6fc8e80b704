//! Route table and dispatch coordination.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::descriptor::{QueryMode, RequestDescriptor};
use crate::error::{Result, RouterError};
use crate::middleware::{
    into_error_handler, into_handler, run_before_routes, ErrorHandler, Handler,
};
use crate::path::RoutePattern;
use crate::request::{Method, PathParams, RawRequest, Request, RequestShared};
use crate::response::{lock_state, Response, SharedResponseState};

/// A single route definition.
#[derive(Clone)]
pub struct Route {
    method: Method,
    pattern: RoutePattern,
    pub(crate) handler: Handler,
}

impl Route {
    /// Creates a new route.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InvalidPattern`] when the path pattern is
    /// syntactically invalid.
    pub fn new<F, Fut>(method: Method, path: &str, handler: F) -> Result<Self>
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Ok(Self {
            method,
            pattern: RoutePattern::parse(path)?,
            handler: into_handler(handler),
        })
    }

    /// Returns the route method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the route pattern.
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// Decides whether this route applies to the descriptor.
    ///
    /// The method is compared first; no pattern work happens on a method
    /// mismatch.
    pub fn matches(&self, descriptor: &RequestDescriptor) -> Option<PathParams> {
        if self.method.as_str() != descriptor.method {
            return None;
        }
        self.pattern.match_path(&descriptor.path)
    }
}

/// The tri-state outcome of one dispatch run.
///
/// `accepted` and `sent` are monotonic within a request: once set they are
/// never reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// At least one route matched and its handler was invoked.
    pub accepted: bool,
    /// A response was finalized (by middleware, a route, the error path or
    /// the not-found fallback).
    pub sent: bool,
}

impl DispatchOutcome {
    /// Returns whether the request was handled by a route or a response was
    /// produced.
    pub fn matched(&self) -> bool {
        self.accepted || self.sent
    }
}

/// The router: an ordered route table, the before-route chain, and the
/// not-found/error handlers.
///
/// Built once with the consuming builder methods, then passed immutably into
/// dispatch; no registration happens during traffic.
pub struct Router {
    routes: Vec<Route>,
    before_routes: Vec<Handler>,
    not_found: Option<Handler>,
    error_handler: Option<ErrorHandler>,
    query_mode: QueryMode,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Creates a new empty router.
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            before_routes: Vec::new(),
            not_found: None,
            error_handler: None,
            query_mode: QueryMode::Lenient,
        }
    }

    /// Adds a GET route.
    ///
    /// # Panics
    ///
    /// Panics when the path pattern is syntactically invalid; registering a
    /// bad pattern is a configuration error and fails fast. Use
    /// [`Router::try_route`] for a fallible registration.
    #[must_use]
    pub fn get<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.route(Method::Get, path, handler)
    }

    /// Adds a POST route.
    ///
    /// # Panics
    ///
    /// Panics when the path pattern is syntactically invalid.
    #[must_use]
    pub fn post<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.route(Method::Post, path, handler)
    }

    /// Adds a PUT route.
    ///
    /// # Panics
    ///
    /// Panics when the path pattern is syntactically invalid.
    #[must_use]
    pub fn put<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.route(Method::Put, path, handler)
    }

    /// Adds a DELETE route.
    ///
    /// # Panics
    ///
    /// Panics when the path pattern is syntactically invalid.
    #[must_use]
    pub fn delete<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.route(Method::Delete, path, handler)
    }

    /// Adds a route with any method.
    ///
    /// # Panics
    ///
    /// Panics when the path pattern is syntactically invalid.
    #[must_use]
    pub fn route<F, Fut>(self, method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        match self.try_route(method, path, handler) {
            Ok(router) => router,
            Err(err) => panic!("{err}"),
        }
    }

    /// Adds a route, surfacing pattern errors instead of panicking.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InvalidPattern`] when the path pattern is
    /// syntactically invalid.
    pub fn try_route<F, Fut>(mut self, method: Method, path: &str, handler: F) -> Result<Self>
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.routes.push(Route::new(method, path, handler)?);
        Ok(self)
    }

    /// Appends a before-route middleware; the chain runs in registration
    /// order ahead of route matching.
    #[must_use]
    pub fn add_before_route<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.before_routes.push(into_handler(handler));
        self
    }

    /// Sets the not-found fallback handler.
    #[must_use]
    pub fn set_not_found<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.not_found = Some(into_handler(handler));
        self
    }

    /// Sets the centralized error handler, replacing the default one.
    #[must_use]
    pub fn set_error_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(RouterError, Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.error_handler = Some(into_error_handler(handler));
        self
    }

    /// Selects lenient or strict query-string parsing.
    #[must_use]
    pub fn query_mode(mut self, mode: QueryMode) -> Self {
        self.query_mode = mode;
        self
    }

    /// Returns the registered routes, in registration (and match-priority)
    /// order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub(crate) fn before_routes(&self) -> &[Handler] {
        &self.before_routes
    }

    /// Dispatches one raw request against the route table.
    ///
    /// Sequence: parse the descriptor, run the before-route chain, try every
    /// route in registration order (stopping only once a response is sent),
    /// then fall back to the not-found handler. Handler failures go to the
    /// configured error handler; the default converts validation errors to
    /// `400` and re-propagates everything else.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::MalformedRequest`] when the descriptor cannot
    /// be parsed (fatal for the connection; no response contract exists at
    /// this layer), and any error the error handler re-propagates.
    pub async fn dispatch(
        &self,
        raw: RawRequest,
        state: &SharedResponseState,
    ) -> Result<DispatchOutcome> {
        let descriptor = RequestDescriptor::parse(&raw.request_line(), self.query_mode)?;
        debug!(method = %descriptor.method, path = %descriptor.path, "dispatching request");
        let shared = Arc::new(RequestShared::new(raw, descriptor));
        let mut accepted = false;

        run_before_routes(self, &shared, state).await?;

        for route in &self.routes {
            if lock_state(state).is_sent() {
                continue;
            }
            let Some(params) = route.matches(&shared.descriptor) else {
                continue;
            };
            accepted = true;
            debug!(pattern = route.pattern.pattern(), "route matched");
            let (req, res) = self.wrap(&shared, params, state);
            if let Err(err) = (route.handler)(req.clone(), res.clone()).await {
                self.absorb_error(err, req, res, state).await?;
            }
        }

        if !accepted && !lock_state(state).is_sent() {
            if let Some(not_found) = self.not_found.clone() {
                // Fresh wrapper pair: the body cache is shared, nothing is
                // re-read from the connection.
                let (req, res) = self.wrap(&shared, PathParams::new(), state);
                if let Err(err) = not_found(req.clone(), res.clone()).await {
                    self.absorb_error(err, req, res, state).await?;
                }
            } else {
                warn!(path = %shared.descriptor.path, "no route matched and no not-found handler configured");
            }
        }

        Ok(DispatchOutcome {
            accepted,
            sent: lock_state(state).is_sent(),
        })
    }

    /// Builds a request/response wrapper pair over the shared per-request
    /// state.
    pub(crate) fn wrap(
        &self,
        shared: &Arc<RequestShared>,
        params: PathParams,
        state: &SharedResponseState,
    ) -> (Request, Response) {
        let request = Request::new(shared.clone(), params);
        let response = Response::new(state.clone(), request.clone(), self.not_found.clone());
        (request, response)
    }

    /// Routes a handler failure to the configured error handler (or the
    /// default one) and marks the response sent so no further handler runs.
    ///
    /// The `sent` mark happens after the error handler returns, so the error
    /// handler itself can still write.
    pub(crate) async fn absorb_error(
        &self,
        err: RouterError,
        req: Request,
        res: Response,
        state: &SharedResponseState,
    ) -> Result<()> {
        debug!(error = %err, "handler failed");
        let result = match &self.error_handler {
            Some(handler) => handler(err, req, res).await,
            None => default_error_handler(err, req, res).await,
        };
        lock_state(state).mark_sent();
        result
    }
}

/// The default error handler.
///
/// Validation errors become a `400` response whose body is the error's
/// structured message. Everything else is re-propagated: unhandled
/// non-validation errors are deliberately not swallowed and surface to the
/// caller.
pub async fn default_error_handler(err: RouterError, _req: Request, res: Response) -> Result<()> {
    match err {
        RouterError::Validation(validation) => {
            res.code(400).send(validation.message());
            Ok(())
        }
        other => Err(other),
    }
}
