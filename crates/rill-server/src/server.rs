//! The HTTP server loop and lifecycle.
//!
//! One tokio task accepts connections; each connection is served by hyper's
//! http1 machinery with the full body collected before dispatch. The final
//! response is written from the dispatch run's [`ResponseState`].

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, PoisonError};

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use rill_router::{RawRequest, ResponseState, Router, RouterError, SharedResponseState};

use crate::{CloseCallback, ErrorCallback, ListeningCallback};

/// Server-specific errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The hostname is neither `localhost`/empty nor a valid IP address.
    #[error("cannot listen: hostname {0} is not a valid IP address")]
    InvalidHostname(String),

    /// Binding the listener failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error on the listening socket.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A connection was aborted by a fatal dispatch error.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The accept-loop task failed.
    #[error("server task failed: {0}")]
    Task(String),
}

/// Where to listen.
///
/// The port is a `u16`, so the original "port must be an integer" check is a
/// compile-time guarantee. Hostname `localhost` or empty maps to the
/// loopback address `127.0.0.1`; any other value must be a valid IP address.
#[derive(Debug, Clone, Default)]
pub struct ListenConfig {
    /// Port to bind; `0` picks a free port.
    pub port: u16,
    /// Hostname to bind; defaults to loopback.
    pub hostname: Option<String>,
}

impl ListenConfig {
    /// Creates a config for the given port on loopback.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            hostname: None,
        }
    }

    /// Sets the hostname.
    #[must_use]
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }
}

pub(crate) fn resolve_host(hostname: Option<&str>) -> Result<IpAddr, ServerError> {
    match hostname {
        None | Some("") | Some("localhost") => Ok(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        Some(other) => other
            .parse()
            .map_err(|_| ServerError::InvalidHostname(other.to_string())),
    }
}

/// A running server.
///
/// Dropping the handle leaves the server running; call [`Server::close`] to
/// shut it down or [`Server::wait`] to block until it stops.
pub struct Server {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    on_close: Option<CloseCallback>,
}

impl Server {
    /// Returns the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and waits for the accept loop to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Task`] when the accept-loop task panicked.
    pub async fn close(self) -> Result<(), ServerError> {
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|err| ServerError::Task(err.to_string()))?;
        info!("server closed");
        if let Some(on_close) = &self.on_close {
            on_close();
        }
        Ok(())
    }

    /// Waits until the accept loop stops.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Task`] when the accept-loop task panicked.
    pub async fn wait(self) -> Result<(), ServerError> {
        self.task
            .await
            .map_err(|err| ServerError::Task(err.to_string()))
    }
}

pub(crate) async fn bind_and_serve(
    router: Router,
    config: ListenConfig,
    on_listening: Option<ListeningCallback>,
    on_error: Option<ErrorCallback>,
    on_close: Option<CloseCallback>,
) -> Result<Server, ServerError> {
    let ip = resolve_host(config.hostname.as_deref())?;
    let addr = SocketAddr::new(ip, config.port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let local_addr = listener.local_addr()?;
    info!(%local_addr, "listening");
    if let Some(on_listening) = &on_listening {
        on_listening(local_addr);
    }

    let (shutdown, mut shutdown_rx) = watch::channel(false);
    let router = Arc::new(router);
    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "connection accepted");
                        let router = router.clone();
                        let on_error = on_error.clone();
                        tokio::spawn(serve_connection(stream, router, on_error));
                    }
                    Err(err) => {
                        error!(error = %err, "accept failed");
                        if let Some(on_error) = &on_error {
                            on_error(&ServerError::Io(err));
                        }
                    }
                },
            }
        }
    });

    Ok(Server {
        local_addr,
        shutdown,
        task,
        on_close,
    })
}

async fn serve_connection(stream: TcpStream, router: Arc<Router>, on_error: Option<ErrorCallback>) {
    let io = TokioIo::new(stream);
    let service = service_fn(move |req| {
        let router = router.clone();
        async move { handle_request(req, &router).await }
    });

    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
        error!(error = %err, "connection failed");
        if let Some(on_error) = &on_error {
            on_error(&ServerError::Connection(err.to_string()));
        }
    }
}

/// Bridges one hyper request into a dispatch run and the final
/// [`ResponseState`] back into a hyper response.
///
/// A fatal dispatch error (malformed descriptor, re-propagated handler
/// error) is returned as-is, which makes hyper abort the connection without
/// writing a response. An unmatched request with no not-found handler parks
/// the service future, leaving the connection unanswered until the peer
/// gives up.
async fn handle_request(
    req: hyper::Request<Incoming>,
    router: &Router,
) -> Result<hyper::Response<Full<Bytes>>, RouterError> {
    let (parts, body) = req.into_parts();
    let target = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_string(), |pq| pq.as_str().to_string());

    let mut raw = RawRequest::new(parts.method.as_str(), target);
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            raw.headers.insert(name.to_string(), value.to_string());
        }
    }
    // The body is read from the connection exactly once, before dispatch.
    raw.body = body
        .collect()
        .await
        .map(http_body_util::Collected::to_bytes)
        .unwrap_or_default()
        .to_vec();

    let state: SharedResponseState = ResponseState::shared();
    let outcome = router.dispatch(raw, &state).await?;

    if !outcome.sent {
        warn!("request produced no response; leaving the connection unanswered");
        let never: std::convert::Infallible = std::future::pending().await;
        match never {}
    }

    let guard = state.lock().unwrap_or_else(PoisonError::into_inner);
    let status =
        StatusCode::from_u16(guard.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = hyper::Response::builder().status(status);
    for (name, value) in guard.headers() {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Full::new(Bytes::from(guard.body().to_vec())))
        .map_err(RouterError::handler)
}
