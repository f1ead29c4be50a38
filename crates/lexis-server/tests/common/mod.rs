// crates/lexis-server/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared principals, documents, and server harness.
// Purpose: Provide reusable fixtures for router and multiplexer tests.
// Dependencies: lexis-core, lexis-server, tokio
// ============================================================================

//! ## Overview
//! Fixtures mirror a small classroom: a student owner, a tutor managing that
//! student, an unrelated student, and an administrator. Documents live in the
//! in-memory store; audit events are captured by [`RecordingAuditSink`].

#![allow(
    dead_code,
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Shared test helpers may be unused in some cases."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use lexis_core::AccessorRegistryBuilder;
use lexis_core::Identity;
use lexis_core::InMemoryDocumentStore;
use lexis_core::OwnerField;
use lexis_core::PermissionLevel;
use lexis_core::PrincipalId;
use lexis_core::ResourceGuard;
use lexis_core::ResourceId;
use lexis_core::TypeKey;
use lexis_server::AccessAuditEvent;
use lexis_server::AppState;
use lexis_server::AuditSink;
use lexis_server::ChannelAuditEvent;
use lexis_server::ChannelEstablished;
use lexis_server::LexisServer;
use lexis_server::ServerSettings;
use lexis_server::StaticTokenIdentityProvider;
use lexis_server::resource_router;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

// ============================================================================
// SECTION: Principals
// ============================================================================

/// Token for student 42, owner of `sentences/s42`.
pub const OWNER_TOKEN: &str = "owner-token";
/// Token for tutor 99, who manages student 7.
pub const TUTOR_TOKEN: &str = "tutor-token";
/// Token for student 5, unrelated to every fixture document.
pub const STRANGER_TOKEN: &str = "stranger-token";
/// Token for administrator 1.
pub const ADMIN_TOKEN: &str = "admin-token";

/// Identity provider over the fixture principals.
pub fn identity_provider() -> StaticTokenIdentityProvider {
    StaticTokenIdentityProvider::new([
        (OWNER_TOKEN.to_string(), Identity::new(PrincipalId::from_u64(42), PermissionLevel::new(2))),
        (
            TUTOR_TOKEN.to_string(),
            Identity::new(PrincipalId::from_u64(99), PermissionLevel::new(1))
                .with_managed_students([PrincipalId::from_u64(7)]),
        ),
        (STRANGER_TOKEN.to_string(), Identity::new(PrincipalId::from_u64(5), PermissionLevel::new(1))),
        (ADMIN_TOKEN.to_string(), Identity::new(PrincipalId::from_u64(1), PermissionLevel::ADMIN)),
    ])
}

// ============================================================================
// SECTION: Audit Capture
// ============================================================================

/// Audit sink that keeps every event in memory.
#[derive(Default)]
pub struct RecordingAuditSink {
    /// Recorded access events.
    pub access: Mutex<Vec<AccessAuditEvent>>,
    /// Recorded channel events.
    pub channel: Mutex<Vec<ChannelAuditEvent>>,
}

impl RecordingAuditSink {
    /// Snapshot of access events.
    pub fn access_events(&self) -> Vec<AccessAuditEvent> {
        self.access.lock().unwrap().clone()
    }

    /// Snapshot of channel events.
    pub fn channel_events(&self) -> Vec<ChannelAuditEvent> {
        self.channel.lock().unwrap().clone()
    }

    /// Count of channel events with the given name.
    pub fn channel_count(&self, event: &str) -> usize {
        self.channel.lock().unwrap().iter().filter(|entry| entry.event == event).count()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record_access(&self, event: &AccessAuditEvent) {
        self.access.lock().unwrap().push(event.clone());
    }

    fn record_channel(&self, event: &ChannelAuditEvent) {
        self.channel.lock().unwrap().push(event.clone());
    }
}

// ============================================================================
// SECTION: Documents
// ============================================================================

/// Parses a fixture type key.
pub fn key(value: &str) -> TypeKey {
    TypeKey::parse(value).unwrap()
}

/// Converts a JSON literal into a document map.
pub fn document(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture document must be an object: {other}"),
    }
}

/// Store seeded with the fixture documents.
pub fn seeded_store() -> InMemoryDocumentStore {
    let store = InMemoryDocumentStore::new();
    let sentences = key("sentences");
    let fixtures = [
        ("s42", json!({ "owner": 42, "text": "el gato duerme" })),
        ("s7", json!({ "owner": { "$oid": "7" }, "text": "la casa es roja" })),
        ("s8", json!({ "owner": "8", "text": "tengo hambre" })),
        ("broken", json!({ "text": "no owner here" })),
    ];
    for (id, value) in fixtures {
        store.insert(sentences.clone(), ResourceId::parse(id).unwrap(), document(value)).unwrap();
    }
    store
}

/// Guard over `sentences` and `vocabularies` backed by the seeded store.
pub fn fixture_guard() -> ResourceGuard {
    let store = seeded_store();
    let mut builder = AccessorRegistryBuilder::new();
    for type_key in ["sentences", "vocabularies"] {
        builder.register(key(type_key), store.accessor(key(type_key), OwnerField::default())).unwrap();
    }
    ResourceGuard::new(Arc::new(builder.build()))
}

/// App state over the fixture guard and principals.
pub fn fixture_state(audit: Arc<RecordingAuditSink>) -> AppState {
    AppState::new(fixture_guard(), Arc::new(identity_provider()), audit)
}

// ============================================================================
// SECTION: Server Harness
// ============================================================================

/// Running server bound to an ephemeral loopback port.
pub struct TestServer {
    /// Bound address.
    pub addr: SocketAddr,
    /// Established channel events.
    pub channels: mpsc::Receiver<ChannelEstablished>,
    /// Captured audit events.
    pub audit: Arc<RecordingAuditSink>,
    /// Shutdown trigger.
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    /// Stops accepting new connections.
    pub fn shutdown(&mut self) {
        if let Some(sender) = self.shutdown.take() {
            let _ = sender.send(());
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Settings with short timeouts for tests.
pub fn test_settings() -> ServerSettings {
    ServerSettings {
        bind: SocketAddr::from(([127, 0, 0, 1], 0)),
        max_head_bytes: 16 * 1024,
        sniff_timeout: Duration::from_secs(2),
        handshake_timeout: Duration::from_secs(2),
        channel_buffer: 64,
    }
}

/// Spawns a fixture server with the given settings.
pub async fn spawn_server_with(settings: ServerSettings) -> TestServer {
    let audit = Arc::new(RecordingAuditSink::default());
    let router = resource_router(fixture_state(Arc::clone(&audit)));
    let (server, channels) =
        LexisServer::bind(settings, router, Arc::clone(&audit) as Arc<dyn AuditSink>)
            .await
            .expect("bind test server");
    let addr = server.local_addr().expect("local addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(server.serve_with_shutdown(async move {
        let _ = shutdown_rx.await;
    }));
    TestServer {
        addr,
        channels,
        audit,
        shutdown: Some(shutdown_tx),
    }
}

/// Spawns a fixture server with [`test_settings`].
pub async fn spawn_server() -> TestServer {
    spawn_server_with(test_settings()).await
}

/// Waits until `condition` holds or the deadline passes.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0 .. 100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
