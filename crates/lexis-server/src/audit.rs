// crates/lexis-server/src/audit.rs
// ============================================================================
// Module: Lexis Audit Logging
// Description: Structured audit events for resource access and channels.
// Purpose: Emit redacted JSON-line audit records without a logging framework.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every guarded request produces one [`AccessAuditEvent`] and every upgrade
//! attempt produces one [`ChannelAuditEvent`]. Sinks serialize events as JSON
//! lines so deployments can route them to their own pipeline. Bearer tokens
//! never appear in events; only their SHA-256 fingerprint does.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome label for a guarded resource request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessOutcome {
    /// Request continued to the handler.
    Allow,
    /// Resource exists but access was denied.
    Deny,
    /// Resource does not exist.
    NotFound,
    /// Unexpected failure.
    Error,
    /// Caller presented no valid credentials.
    Unauthenticated,
}

/// Resource access audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct AccessAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Requested resource type.
    pub type_key: String,
    /// Requested resource id as received.
    pub resource_id: String,
    /// Authenticated subject when known.
    pub subject: Option<String>,
    /// SHA-256 fingerprint of the presented token.
    pub token_fingerprint: Option<String>,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// Request outcome.
    pub outcome: AccessOutcome,
    /// Decision reason label when a decision was made.
    pub reason: Option<&'static str>,
    /// Full internal error message for `error` outcomes.
    pub error: Option<String>,
}

/// Inputs required to construct an access audit event.
pub struct AccessAuditEventParams {
    /// Requested resource type.
    pub type_key: String,
    /// Requested resource id as received.
    pub resource_id: String,
    /// Authenticated subject when known.
    pub subject: Option<String>,
    /// SHA-256 fingerprint of the presented token.
    pub token_fingerprint: Option<String>,
    /// Peer address when available.
    pub peer: Option<SocketAddr>,
    /// Request outcome.
    pub outcome: AccessOutcome,
    /// Decision reason label when a decision was made.
    pub reason: Option<&'static str>,
    /// Full internal error message for `error` outcomes.
    pub error: Option<String>,
}

impl AccessAuditEvent {
    /// Builds an access audit event stamped with the current time.
    #[must_use]
    pub fn new(params: AccessAuditEventParams) -> Self {
        Self {
            event: "resource_access",
            timestamp_ms: now_millis(),
            type_key: params.type_key,
            resource_id: params.resource_id,
            subject: params.subject,
            token_fingerprint: params.token_fingerprint,
            peer_ip: params.peer.map(|peer| peer.ip().to_string()),
            outcome: params.outcome,
            reason: params.reason,
            error: params.error,
        }
    }
}

/// Upgrade channel audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelAuditEvent {
    /// Event identifier (`channel_established` or `upgrade_aborted`).
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Peer IP address.
    pub peer_ip: String,
    /// Request path from the upgrade request line.
    pub path: Option<String>,
    /// Abort reason.
    pub reason: Option<String>,
}

impl ChannelAuditEvent {
    /// Event for a completed handshake.
    #[must_use]
    pub fn established(peer: SocketAddr, path: Option<String>) -> Self {
        Self {
            event: "channel_established",
            timestamp_ms: now_millis(),
            peer_ip: peer.ip().to_string(),
            path,
            reason: None,
        }
    }

    /// Event for an upgrade that did not produce a channel.
    #[must_use]
    pub fn aborted(peer: SocketAddr, path: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            event: "upgrade_aborted",
            timestamp_ms: now_millis(),
            peer_ip: peer.ip().to_string(),
            path,
            reason: Some(reason.into()),
        }
    }
}

/// Returns the current unix epoch in milliseconds.
fn now_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for access and channel events.
pub trait AuditSink: Send + Sync {
    /// Records a resource access event.
    fn record_access(&self, event: &AccessAuditEvent);

    /// Records an upgrade channel event.
    fn record_channel(&self, _event: &ChannelAuditEvent) {}
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record_access(&self, event: &AccessAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_channel(&self, event: &ChannelAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event.
    fn write_line(&self, payload: &str) {
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record_access(&self, event: &AccessAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            self.write_line(&payload);
        }
    }

    fn record_channel(&self, event: &ChannelAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            self.write_line(&payload);
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_access(&self, _event: &AccessAuditEvent) {}

    fn record_channel(&self, _event: &ChannelAuditEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions use unwrap for clarity."
    )]

    use serde_json::Value;

    use super::*;

    #[test]
    fn access_event_serializes_snake_case_labels() {
        let event = AccessAuditEvent::new(AccessAuditEventParams {
            type_key: "sentences".to_string(),
            resource_id: "s1".to_string(),
            subject: Some("7".to_string()),
            token_fingerprint: None,
            peer: Some(SocketAddr::from(([10, 0, 0, 2], 4000))),
            outcome: AccessOutcome::NotFound,
            reason: None,
            error: None,
        });
        let value: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "resource_access");
        assert_eq!(value["outcome"], "not_found");
        assert_eq!(value["peer_ip"], "10.0.0.2");
    }

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = FileAuditSink::new(&path).unwrap();
        let peer = SocketAddr::from(([127, 0, 0, 1], 9000));
        sink.record_channel(&ChannelAuditEvent::established(peer, Some("/ws".to_string())));
        sink.record_channel(&ChannelAuditEvent::aborted(peer, None, "handshake timed out"));
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> =
            content.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "channel_established");
        assert_eq!(lines[1]["reason"], "handshake timed out");
    }
}
