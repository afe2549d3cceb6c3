//! HTTPS server setup and the accept loop.
//!
//! # Responsibilities
//! - Load TLS material and the document root before anything is bound
//! - Create the Axum Router with the static file handler
//! - Wire up middleware (tracing, request timeout)
//! - Accept connections, one task per connection
//! - Drive the TLS handshake and the HTTP/1.1 connection in that task

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ServerConfig, TimeoutConfig};
use crate::http::files::{serve_static, FileServerState};
use crate::http::path::DocumentRoot;
use crate::net::{
    load_acceptor, ConnectionGuard, ConnectionPermit, ConnectionState, ConnectionTracker, Listener,
    ListenerError, TlsError,
};

/// Pause after a failed accept so a persistent error (e.g. fd exhaustion)
/// does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Startup failures. All of them are fatal.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("invalid document root {}: {source}", .path.display())]
    DocumentRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Static file server behind mutual TLS.
pub struct HttpServer {
    router: Router,
    acceptor: TlsAcceptor,
    config: ServerConfig,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// Load the TLS material and document root named by `config`.
    ///
    /// Nothing is bound yet; a failure here means the process never listens.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let acceptor = load_acceptor(&config.tls)?;

        let root = DocumentRoot::new(&config.document_root).map_err(|source| {
            ServerError::DocumentRoot {
                path: config.document_root.clone(),
                source,
            }
        })?;
        tracing::info!(document_root = %root.path().display(), "Serving directory");

        let state = FileServerState {
            root: Arc::new(root),
        };
        let router = Self::build_router(&config, state);

        Ok(Self {
            router,
            acceptor,
            config,
            tracker: ConnectionTracker::new(),
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ServerConfig, state: FileServerState) -> Router {
        Router::new()
            .fallback(serve_static)
            .with_state(state)
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                config.timeouts.request(),
            ))
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured listener address.
    pub async fn bind(&self) -> Result<Listener, ServerError> {
        Ok(Listener::bind(&self.config.listener).await?)
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// The loop only accepts and spawns; handshakes and requests run in the
    /// spawned task, so a slow or failing client never stalls the loop.
    pub async fn run<F>(self, listener: Listener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let addr = listener.local_addr().map_err(|source| ListenerError::Bind {
            address: self.config.listener.bind_address.clone(),
            source,
        })?;
        tracing::info!(address = %addr, "HTTPS server starting");

        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer_addr, permit)) => {
                    let guard = self.tracker.track();
                    tracing::debug!(
                        connection_id = %guard.id(),
                        peer_addr = %peer_addr,
                        active_connections = self.tracker.active_count(),
                        "Spawning connection task"
                    );

                    let connection = Connection {
                        stream,
                        peer_addr,
                        permit,
                        guard,
                        acceptor: self.acceptor.clone(),
                        router: self.router.clone(),
                        timeouts: self.config.timeouts.clone(),
                    };
                    tokio::spawn(connection.serve());
                }
                Err(ListenerError::Closed) => return Err(ListenerError::Closed.into()),
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Everything one connection task owns.
struct Connection {
    stream: TcpStream,
    peer_addr: SocketAddr,
    permit: ConnectionPermit,
    guard: ConnectionGuard,
    acceptor: TlsAcceptor,
    router: Router,
    timeouts: TimeoutConfig,
}

impl Connection {
    async fn serve(self) {
        let Connection {
            stream,
            peer_addr,
            permit: _permit,
            guard,
            acceptor,
            router,
            timeouts,
        } = self;
        let connection_id = guard.id();

        let handshake = tokio::time::timeout(timeouts.handshake(), acceptor.accept(stream));
        let tls_stream = match handshake.await {
            Ok(Ok(tls_stream)) => tls_stream,
            Ok(Err(e)) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    peer_addr = %peer_addr,
                    error = %e,
                    "TLS handshake failed"
                );
                return;
            }
            Err(_) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    peer_addr = %peer_addr,
                    timeout_secs = timeouts.handshake_secs,
                    "TLS handshake timed out"
                );
                return;
            }
        };

        {
            let (_, session) = tls_stream.get_ref();
            tracing::debug!(
                connection_id = %connection_id,
                peer_addr = %peer_addr,
                protocol = ?session.protocol_version(),
                cipher_suite = ?session.negotiated_cipher_suite().map(|s| s.suite()),
                client_certs = session.peer_certificates().map_or(0, |c| c.len()),
                "TLS handshake complete"
            );
        }

        let state = guard.state().clone();
        state.set(ConnectionState::Idle);

        let service = service_fn(move |request: Request<Incoming>| {
            let router = router.clone();
            let state = state.clone();
            async move {
                state.set(ConnectionState::Processing);
                let response = router.oneshot(request).await;
                state.set(ConnectionState::Idle);
                response
            }
        });

        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(timeouts.header_read())
            .keep_alive(true);

        if let Err(e) = builder.serve_connection(TokioIo::new(tls_stream), service).await {
            tracing::debug!(
                connection_id = %connection_id,
                peer_addr = %peer_addr,
                error = %e,
                "Connection ended with error"
            );
        }
    }
}
