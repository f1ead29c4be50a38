// crates/lexis-server/src/handshake.rs
// ============================================================================
// Module: Upgrade Handshake
// Description: WebSocket handshake completion for sniffed upgrade requests.
// Purpose: Turn pending upgrade sockets into established message channels.
// Dependencies: tokio, tokio-tungstenite
// ============================================================================

//! ## Overview
//! The accept loop hands every connection classified as an upgrade to the
//! [`HandshakeCompleter`] as a [`PendingUpgrade`]. The completer runs one
//! bounded handshake per socket and publishes a [`ChannelEstablished`] event
//! for each success. Failed or timed-out handshakes are audited and the socket
//! is dropped; they never produce an event.
//!
//! ## Invariants
//! - Exactly one [`ChannelEstablished`] per successful handshake.
//! - A slow handshake never blocks other pending upgrades.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::handshake::server::ErrorResponse;
use tokio_tungstenite::tungstenite::handshake::server::Request;
use tokio_tungstenite::tungstenite::handshake::server::Response;
use tokio_tungstenite::tungstenite::http;

use crate::audit::AuditSink;
use crate::audit::ChannelAuditEvent;
use crate::upgrade::PrefixedStream;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Socket classified as an upgrade, waiting for its handshake.
#[derive(Debug)]
pub struct PendingUpgrade {
    /// Socket with the sniffed bytes replayed ahead of it.
    pub stream: PrefixedStream<TcpStream>,
    /// Remote peer address.
    pub peer: SocketAddr,
    /// Request target from the request line.
    pub path: String,
}

/// Completed upgrade handed to the messaging layer.
#[derive(Debug)]
pub struct ChannelEstablished {
    /// Remote peer address.
    pub peer: SocketAddr,
    /// Upgrade request head as received.
    pub request: http::Request<()>,
    /// Open message channel.
    pub channel: WebSocketStream<PrefixedStream<TcpStream>>,
}

/// Handshake failures.
#[derive(Debug, Error)]
pub enum UpgradeError {
    /// Peer sent an invalid or unsupported upgrade request.
    #[error("handshake failed: {0}")]
    Handshake(String),
    /// Handshake did not complete in time.
    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),
}

// ============================================================================
// SECTION: Completer
// ============================================================================

/// Drives handshakes for pending upgrades and publishes established channels.
pub struct HandshakeCompleter {
    /// Pending upgrades from the accept loop.
    pending: mpsc::Receiver<PendingUpgrade>,
    /// Established channel events for the messaging layer.
    established: mpsc::Sender<ChannelEstablished>,
    /// Per-handshake deadline.
    timeout: Duration,
    /// Channel audit sink.
    audit: Arc<dyn AuditSink>,
}

impl HandshakeCompleter {
    /// Creates a completer over the given queues.
    #[must_use]
    pub fn new(
        pending: mpsc::Receiver<PendingUpgrade>,
        established: mpsc::Sender<ChannelEstablished>,
        timeout: Duration,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            pending,
            established,
            timeout,
            audit,
        }
    }

    /// Runs until the pending queue closes, one task per upgrade.
    pub async fn run(mut self) {
        while let Some(pending) = self.pending.recv().await {
            let established = self.established.clone();
            let audit = Arc::clone(&self.audit);
            let timeout = self.timeout;
            tokio::spawn(async move {
                complete_one(pending, established, timeout, audit.as_ref()).await;
            });
        }
    }
}

/// Completes one handshake and publishes or audits the result.
async fn complete_one(
    pending: PendingUpgrade,
    established: mpsc::Sender<ChannelEstablished>,
    timeout: Duration,
    audit: &dyn AuditSink,
) {
    let PendingUpgrade {
        stream,
        peer,
        path,
    } = pending;
    match accept_channel(stream, timeout).await {
        Ok((request, channel)) => {
            audit.record_channel(&ChannelAuditEvent::established(peer, Some(path)));
            let event = ChannelEstablished {
                peer,
                request,
                channel,
            };
            if established.send(event).await.is_err() {
                audit.record_channel(&ChannelAuditEvent::aborted(
                    peer,
                    None,
                    "channel consumer closed",
                ));
            }
        }
        Err(err) => {
            audit.record_channel(&ChannelAuditEvent::aborted(peer, Some(path), err.to_string()));
        }
    }
}

/// Performs the WebSocket handshake, capturing the request head.
///
/// # Errors
///
/// Returns [`UpgradeError`] when the handshake fails or exceeds `timeout`.
pub async fn accept_channel(
    stream: PrefixedStream<TcpStream>,
    timeout: Duration,
) -> Result<(http::Request<()>, WebSocketStream<PrefixedStream<TcpStream>>), UpgradeError> {
    let mut captured: Option<http::Request<()>> = None;
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        captured = Some(copy_request_head(request));
        Ok(response)
    };
    let channel = tokio::time::timeout(timeout, tokio_tungstenite::accept_hdr_async(stream, callback))
        .await
        .map_err(|_| UpgradeError::Timeout(timeout))?
        .map_err(|err| UpgradeError::Handshake(err.to_string()))?;
    let request = captured
        .ok_or_else(|| UpgradeError::Handshake("upgrade request head not captured".to_string()))?;
    Ok((request, channel))
}

/// Copies method, target, version, and headers of a handshake request.
fn copy_request_head(request: &Request) -> http::Request<()> {
    let mut copy = http::Request::new(());
    *copy.method_mut() = request.method().clone();
    *copy.uri_mut() = request.uri().clone();
    *copy.version_mut() = request.version();
    *copy.headers_mut() = request.headers().clone();
    copy
}
