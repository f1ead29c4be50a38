// crates/lexis-server/src/server.rs
// ============================================================================
// Module: Lexis Server
// Description: Shared listener for REST traffic and WebSocket upgrades.
// Purpose: Accept connections, sniff each one, and dispatch it to one path.
// Dependencies: axum, hyper, hyper-util, lexis-config, tokio, tower
// ============================================================================

//! ## Overview
//! [`LexisServer`] owns a single TCP listener. Every accepted socket gets its
//! own task that sniffs the first request head. Normal connections are
//! served by hyper `http1` with the axum router; upgrade connections are sent
//! to the [`HandshakeCompleter`] as [`PendingUpgrade`] messages. Completed
//! channels arrive on the receiver returned by [`LexisServer::bind`].
//!
//! ## Invariants
//! - The accept loop never awaits per-connection I/O.
//! - A head that declares an upgrade is never replayed into hyper.
//! - The router and its registry are fully built before binding.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::ConnectInfo;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use lexis_config::ServerConfig;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tower::Service;

use crate::audit::AuditSink;
use crate::audit::ChannelAuditEvent;
use crate::handshake::ChannelEstablished;
use crate::handshake::HandshakeCompleter;
use crate::handshake::PendingUpgrade;
use crate::upgrade::ConnectionClass;
use crate::upgrade::PrefixedStream;
use crate::upgrade::sniff;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Pause after a failed accept before retrying.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Listener and multiplexer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Listen address.
    pub bind: SocketAddr,
    /// Maximum buffered request head size.
    pub max_head_bytes: usize,
    /// Deadline for the first request head.
    pub sniff_timeout: Duration,
    /// Deadline for each upgrade handshake.
    pub handshake_timeout: Duration,
    /// Capacity of the pending and established queues.
    pub channel_buffer: usize,
}

impl ServerSettings {
    /// Builds settings from the `[server]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] when the bind address is invalid.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        let bind = config.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        Ok(Self {
            bind,
            max_head_bytes: config.max_head_bytes,
            sniff_timeout: config.sniff_timeout(),
            handshake_timeout: config.handshake_timeout(),
            channel_buffer: config.channel_buffer,
        })
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Bound multiplexing server.
pub struct LexisServer {
    /// Bound listener.
    listener: TcpListener,
    /// Per-connection dispatch context.
    context: ConnectionContext,
    /// Handshake driver, started by `serve`.
    completer: HandshakeCompleter,
}

/// Everything a connection task needs.
#[derive(Clone)]
struct ConnectionContext {
    /// Axum router for normal traffic.
    router: Router,
    /// Queue of sockets awaiting a handshake.
    pending: mpsc::Sender<PendingUpgrade>,
    /// Channel audit sink.
    audit: Arc<dyn AuditSink>,
    /// Maximum buffered request head size.
    max_head_bytes: usize,
    /// Deadline for the first request head.
    sniff_timeout: Duration,
}

impl LexisServer {
    /// Binds the listener and wires the upgrade queues.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when the address cannot be bound.
    pub async fn bind(
        settings: ServerSettings,
        router: Router,
        audit: Arc<dyn AuditSink>,
    ) -> Result<(Self, mpsc::Receiver<ChannelEstablished>), ServerError> {
        let listener = TcpListener::bind(settings.bind)
            .await
            .map_err(|err| ServerError::Transport(format!("bind {} failed: {err}", settings.bind)))?;
        let (pending_tx, pending_rx) = mpsc::channel(settings.channel_buffer);
        let (established_tx, established_rx) = mpsc::channel(settings.channel_buffer);
        let completer = HandshakeCompleter::new(
            pending_rx,
            established_tx,
            settings.handshake_timeout,
            Arc::clone(&audit),
        );
        let context = ConnectionContext {
            router,
            pending: pending_tx,
            audit,
            max_head_bytes: settings.max_head_bytes,
            sniff_timeout: settings.sniff_timeout,
        };
        Ok((
            Self {
                listener,
                context,
                completer,
            },
            established_rx,
        ))
    }

    /// Returns the bound address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when the socket address is unavailable.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(|err| ServerError::Transport(err.to_string()))
    }

    /// Serves until the process ends.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the server fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serves until `shutdown` resolves, then stops accepting.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the server fails.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            listener,
            context,
            completer,
        } = self;
        tokio::spawn(completer.run());
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tokio::spawn(handle_connection(stream, peer, context.clone()));
                    }
                    Err(_) => tokio::time::sleep(ACCEPT_BACKOFF).await,
                },
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Connection Dispatch
// ============================================================================

/// Sniffs one connection and routes it to the REST or upgrade path.
async fn handle_connection(mut stream: TcpStream, peer: SocketAddr, context: ConnectionContext) {
    let Ok(sniffed) = sniff(&mut stream, context.max_head_bytes, context.sniff_timeout).await
    else {
        return;
    };
    let stream = PrefixedStream::new(sniffed.buffered, stream);
    match sniffed.class {
        ConnectionClass::Normal => serve_normal(stream, peer, context.router).await,
        ConnectionClass::Upgrade {
            path,
        } => {
            let pending = PendingUpgrade {
                stream,
                peer,
                path,
            };
            if let Err(mpsc::error::SendError(pending)) = context.pending.send(pending).await {
                context.audit.record_channel(&ChannelAuditEvent::aborted(
                    pending.peer,
                    Some(pending.path),
                    "handshake queue closed",
                ));
            }
        }
        ConnectionClass::OversizedUpgrade {
            path,
        } => {
            context.audit.record_channel(&ChannelAuditEvent::aborted(
                peer,
                Some(path),
                format!("request head exceeds {} bytes", context.max_head_bytes),
            ));
        }
    }
}

/// Serves a normal connection with hyper `http1` and the axum router.
async fn serve_normal(stream: PrefixedStream<TcpStream>, peer: SocketAddr, router: Router) {
    let service = service_fn(move |mut request: hyper::Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        router.clone().call(request)
    });
    let _ = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await;
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}
