//! Handler types and the before-route middleware chain.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::{Result, RouterError};
use crate::request::{PathParams, Request, RequestShared};
use crate::response::{lock_state, Response, SharedResponseState};
use crate::router::Router;

/// The future returned by a boxed handler.
pub type HandlerFuture = BoxFuture<'static, Result<()>>;

/// A boxed async handler, used for routes, before-route middleware and the
/// not-found fallback alike.
pub type Handler = Arc<dyn Fn(Request, Response) -> HandlerFuture + Send + Sync>;

/// A boxed async error handler.
pub type ErrorHandler = Arc<dyn Fn(RouterError, Request, Response) -> HandlerFuture + Send + Sync>;

pub(crate) fn into_handler<F, Fut>(handler: F) -> Handler
where
    F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |req, res| Box::pin(handler(req, res)))
}

pub(crate) fn into_error_handler<F, Fut>(handler: F) -> ErrorHandler
where
    F: Fn(RouterError, Request, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |err, req, res| Box::pin(handler(err, req, res)))
}

/// Runs the before-route chain: strictly sequential, each handler awaited to
/// completion before the next begins.
///
/// Once the response is sent the remaining iterations are no-ops. A failing
/// middleware marks the response sent and routes the error to the configured
/// error handler; only errors the error handler itself re-propagates escape.
pub(crate) async fn run_before_routes(
    router: &Router,
    shared: &Arc<RequestShared>,
    state: &SharedResponseState,
) -> Result<()> {
    for middleware in router.before_routes() {
        if lock_state(state).is_sent() {
            continue;
        }
        let (req, res) = router.wrap(shared, PathParams::new(), state);
        if let Err(err) = middleware(req.clone(), res.clone()).await {
            router.absorb_error(err, req, res, state).await?;
        }
    }
    Ok(())
}
