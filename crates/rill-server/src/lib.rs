//! # rill-server
//!
//! The application surface and HTTP server for `rill-router`.
//!
//! [`App`] collects routes, before-route middleware and the
//! not-found/error handlers, then `listen` freezes them into an immutable
//! router and serves it over hyper/tokio.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rill_server::{App, ListenConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), rill_server::ServerError> {
//! let server = App::new()
//!     .get("/", |_req, res| async move {
//!         res.send("Hello, World!");
//!         Ok(())
//!     })
//!     .get("/users/:id", |req, res| async move {
//!         let id = req.path_params().require("id")?;
//!         res.send_json(&serde_json::json!({ "id": id }));
//!         Ok(())
//!     })
//!     .set_not_found(|_req, res| async move {
//!         res.code(404).send("nothing here");
//!         Ok(())
//!     })
//!     .listen(ListenConfig::new(3000))
//!     .await?;
//!
//! server.wait().await
//! # }
//! ```
//!
//! ## Lifecycle
//!
//! `listen` binds immediately and returns a [`Server`] handle;
//! [`Server::close`] stops accepting connections. The `on_listening`,
//! `on_error` and `on_close` callbacks mirror the corresponding lifecycle
//! points.

mod server;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

pub use rill_router::{
    DispatchOutcome, Method, PathParams, QueryMode, RawRequest, Request, Response, Result,
    Router, RouterError, ValidationError, ValidationTarget,
};
pub use server::{ListenConfig, Server, ServerError};

use server::bind_and_serve;

/// Callback invoked with the bound address once the server is listening.
pub type ListeningCallback = Arc<dyn Fn(SocketAddr) + Send + Sync>;
/// Callback invoked when a connection or the listener fails.
pub type ErrorCallback = Arc<dyn Fn(&ServerError) + Send + Sync>;
/// Callback invoked after the server has closed.
pub type CloseCallback = Arc<dyn Fn() + Send + Sync>;

/// The application builder: registration surface plus server lifecycle.
///
/// Registration happens up front; `listen` freezes the configuration and no
/// routes can be added while traffic is being served.
pub struct App {
    router: Router,
    on_listening: Option<ListeningCallback>,
    on_error: Option<ErrorCallback>,
    on_close: Option<CloseCallback>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// Creates a new empty application.
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            on_listening: None,
            on_error: None,
            on_close: None,
        }
    }

    /// Adds a GET route.
    ///
    /// # Panics
    ///
    /// Panics when the path pattern is syntactically invalid.
    #[must_use]
    pub fn get<F, Fut>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.router = self.router.get(path, handler);
        self
    }

    /// Adds a POST route.
    ///
    /// # Panics
    ///
    /// Panics when the path pattern is syntactically invalid.
    #[must_use]
    pub fn post<F, Fut>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.router = self.router.post(path, handler);
        self
    }

    /// Adds a PUT route.
    ///
    /// # Panics
    ///
    /// Panics when the path pattern is syntactically invalid.
    #[must_use]
    pub fn put<F, Fut>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.router = self.router.put(path, handler);
        self
    }

    /// Adds a DELETE route.
    ///
    /// # Panics
    ///
    /// Panics when the path pattern is syntactically invalid.
    #[must_use]
    pub fn delete<F, Fut>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.router = self.router.delete(path, handler);
        self
    }

    /// Adds a route with any method.
    ///
    /// # Panics
    ///
    /// Panics when the path pattern is syntactically invalid.
    #[must_use]
    pub fn route<F, Fut>(mut self, method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.router = self.router.route(method, path, handler);
        self
    }

    /// Appends a before-route middleware.
    #[must_use]
    pub fn add_before_route<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.router = self.router.add_before_route(handler);
        self
    }

    /// Sets the not-found fallback handler.
    #[must_use]
    pub fn set_not_found<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.router = self.router.set_not_found(handler);
        self
    }

    /// Sets the centralized error handler.
    #[must_use]
    pub fn set_error_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(RouterError, Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.router = self.router.set_error_handler(handler);
        self
    }

    /// Selects lenient or strict query-string parsing.
    #[must_use]
    pub fn query_mode(mut self, mode: QueryMode) -> Self {
        self.router = self.router.query_mode(mode);
        self
    }

    /// Registers a callback for the `listening` lifecycle point.
    #[must_use]
    pub fn on_listening(mut self, callback: impl Fn(SocketAddr) + Send + Sync + 'static) -> Self {
        self.on_listening = Some(Arc::new(callback));
        self
    }

    /// Registers a callback for connection and listener errors.
    #[must_use]
    pub fn on_error(mut self, callback: impl Fn(&ServerError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Registers a callback for the `close` lifecycle point.
    #[must_use]
    pub fn on_close(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(callback));
        self
    }

    /// Freezes the configuration and starts serving.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidHostname`] when the hostname is neither
    /// `localhost`/empty nor a valid IP address, and [`ServerError::Bind`]
    /// when the listener cannot be bound.
    pub async fn listen(self, config: ListenConfig) -> std::result::Result<Server, ServerError> {
        bind_and_serve(
            self.router,
            config,
            self.on_listening,
            self.on_error,
            self.on_close,
        )
        .await
    }
}
