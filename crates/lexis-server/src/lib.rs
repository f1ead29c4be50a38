// crates/lexis-server/src/lib.rs
// ============================================================================
// Module: Lexis Server
// Description: REST resource surface and WebSocket upgrade multiplexer.
// Purpose: Serve guarded resources and message channels on one listener.
// Dependencies: lexis-core, lexis-config, axum, hyper, tokio, tokio-tungstenite
// ============================================================================

//! ## Overview
//! Lexis Server wires the ownership guard from `lexis-core` into an axum
//! router and shares the listening socket with WebSocket upgrades. Each
//! connection is classified from its first request head; upgrades are
//! handed to a [`HandshakeCompleter`] over a bounded queue, and completed
//! channels leave as [`ChannelEstablished`] events. Authentication and
//! audit are collaborator traits ([`IdentityProvider`], [`AuditSink`]).

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod auth;
pub mod handshake;
pub mod http;
pub mod server;
pub mod upgrade;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AccessAuditEvent;
pub use audit::AccessAuditEventParams;
pub use audit::AccessOutcome;
pub use audit::AuditSink;
pub use audit::ChannelAuditEvent;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use auth::AuthContext;
pub use auth::AuthError;
pub use auth::IdentityProvider;
pub use auth::StaticTokenIdentityProvider;
pub use auth::bearer_token;
pub use auth::token_fingerprint;
pub use handshake::ChannelEstablished;
pub use handshake::HandshakeCompleter;
pub use handshake::PendingUpgrade;
pub use handshake::UpgradeError;
pub use http::AppState;
pub use http::ErrorDisclosure;
pub use http::REDACTED_ERROR;
pub use http::resource_router;
pub use server::LexisServer;
pub use server::ServerError;
pub use server::ServerSettings;
pub use upgrade::ConnectionClass;
pub use upgrade::PrefixedStream;
pub use upgrade::SniffError;
pub use upgrade::SniffedHead;
pub use upgrade::classify;
pub use upgrade::sniff;
