//! # rill-router
//!
//! A minimal HTTP routing core with before-route middleware.
//!
//! This crate provides:
//! - `METHOD:PATH?query` descriptor parsing with lenient or strict query
//!   handling
//! - Path pattern matching with `:name` parameters
//! - An ordered route table with registration-order priority
//! - A before-route middleware chain with send-based short-circuiting
//! - A not-found fallback and a single centralized error handler
//!
//! ## Quick Start
//!
//! ```
//! use rill_router::{RawRequest, Request, Response, ResponseState, Router};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> rill_router::Result<()> {
//! let router = Router::new()
//!     .get("/", |_req: Request, res: Response| async move {
//!         res.send("Hello, World!");
//!         Ok(())
//!     })
//!     .get("/users/:id", |req: Request, res: Response| async move {
//!         let id = req.path_params().require("id")?;
//!         res.send_json(&serde_json::json!({ "id": id }));
//!         Ok(())
//!     });
//!
//! let state = ResponseState::shared();
//! let outcome = router.dispatch(RawRequest::new("GET", "/users/123"), &state).await?;
//! assert!(outcome.accepted);
//! # Ok(())
//! # }
//! ```
//!
//! ## Path Parameters
//!
//! Routes can include single-segment parameters using `:name` syntax:
//!
//! ```ignore
//! router.get("/posts/:post_id/comments/:comment_id", handler)
//! ```
//!
//! Parameters are available through `request.path_params()`. Patterns are
//! not ranked by specificity: the first registered matching route wins, and
//! later matching registrations still run until one sends a response.
//!
//! ## Middleware
//!
//! Before-route middleware shares the handler signature and runs strictly in
//! order ahead of route matching. Sending a response from middleware skips
//! everything that would follow:
//!
//! ```ignore
//! let router = Router::new()
//!     .add_before_route(|req, res| async move {
//!         if req.header("Authorization").is_none() {
//!             res.code(401).send("denied");
//!         }
//!         Ok(())
//!     })
//!     .get("/", handler);
//! ```
//!
//! ## Errors
//!
//! Handlers return [`Result<()>`]. A [`ValidationError`] becomes a `400`
//! response with a structured JSON message; any other error is routed to the
//! configured error handler, and the default error handler re-propagates it
//! instead of producing a response.

mod descriptor;
mod error;
mod middleware;
mod path;
mod request;
mod response;
mod router;

pub use descriptor::{QueryMode, RequestDescriptor};
pub use error::{Result, RouterError, ValidationError, ValidationTarget};
pub use middleware::{ErrorHandler, Handler, HandlerFuture};
pub use path::{PathSegment, RoutePattern};
pub use request::{Method, PathParams, RawRequest, Request};
pub use response::{status_text, Response, ResponseState, SharedResponseState};
pub use router::{default_error_handler, DispatchOutcome, Route, Router};
