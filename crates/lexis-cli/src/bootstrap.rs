// crates/lexis-cli/src/bootstrap.rs
// ============================================================================
// Module: Lexis Bootstrap
// Description: Startup wiring from validated config to server collaborators.
// Purpose: Open storage, build the accessor registry, and pick the audit sink.
// Dependencies: lexis-config, lexis-core, lexis-server, lexis-store-sqlite
// ============================================================================

//! ## Overview
//! Startup is strictly ordered: the config is loaded and validated, storage
//! is opened and seeded, the accessor registry is built, and only then is
//! the listener bound. This module owns the middle steps so the binary only
//! sequences them. Established channels are drained by [`relay_channels`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::sync::Arc;

use futures_util::StreamExt;
use lexis_config::AuditConfig;
use lexis_config::LexisConfig;
use lexis_config::StorageConfig;
use lexis_core::AccessorRegistry;
use lexis_core::AccessorRegistryBuilder;
use lexis_core::InMemoryDocumentStore;
use lexis_core::ResourceId;
use lexis_core::TypeKey;
use lexis_server::AuditSink;
use lexis_server::ChannelEstablished;
use lexis_server::FileAuditSink;
use lexis_server::NoopAuditSink;
use lexis_server::StderrAuditSink;
use lexis_store_sqlite::SqliteDocumentStore;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum size of one seed file.
pub const MAX_SEED_FILE_BYTES: usize = 16 * 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Startup wiring errors.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Seed file could not be read or decoded.
    #[error("seed error: {0}")]
    Seed(String),
    /// Storage backend could not be opened or written.
    #[error("storage error: {0}")]
    Storage(String),
    /// Accessor registration failed.
    #[error("registry error: {0}")]
    Registry(String),
    /// Audit sink could not be opened.
    #[error("audit error: {0}")]
    Audit(String),
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Opens the configured store, applies seeds, and registers every resource.
///
/// # Errors
///
/// Returns [`BootstrapError`] when storage, seeding, or registration fails.
pub fn build_registry(config: &LexisConfig) -> Result<AccessorRegistry, BootstrapError> {
    let mut builder = AccessorRegistryBuilder::new();
    match &config.storage {
        StorageConfig::Memory => {
            let store = InMemoryDocumentStore::new();
            for resource in &config.resources {
                for (id, document) in resource_seed(config, resource.seed.as_deref())? {
                    store
                        .insert(resource.key.clone(), id, document)
                        .map_err(|err| BootstrapError::Storage(err.to_string()))?;
                }
                let accessor = store.accessor(resource.key.clone(), resource.owner_field.clone());
                register(&mut builder, &resource.key, accessor)?;
            }
        }
        StorageConfig::Sqlite(sqlite) => {
            let mut sqlite = sqlite.clone();
            sqlite.path = config.resolve_relative(&sqlite.path.to_string_lossy());
            let store = SqliteDocumentStore::open(&sqlite)
                .map_err(|err| BootstrapError::Storage(err.to_string()))?;
            for resource in &config.resources {
                for (id, document) in resource_seed(config, resource.seed.as_deref())? {
                    store
                        .put(&resource.key, &id, &document)
                        .map_err(|err| BootstrapError::Storage(err.to_string()))?;
                }
                let accessor = store.accessor(resource.key.clone(), resource.owner_field.clone());
                register(&mut builder, &resource.key, accessor)?;
            }
        }
    }
    Ok(builder.build())
}

/// Registers one accessor, mapping duplicate keys to a bootstrap error.
fn register(
    builder: &mut AccessorRegistryBuilder,
    type_key: &TypeKey,
    accessor: impl lexis_core::ResourceAccessor + 'static,
) -> Result<(), BootstrapError> {
    builder
        .register(type_key.clone(), accessor)
        .map_err(|err| BootstrapError::Registry(err.to_string()))
}

/// Loads the seed for one resource type, if configured.
fn resource_seed(
    config: &LexisConfig,
    seed: Option<&str>,
) -> Result<Vec<(ResourceId, Map<String, Value>)>, BootstrapError> {
    match seed {
        Some(seed) => load_seed(&config.resolve_relative(seed)),
        None => Ok(Vec::new()),
    }
}

/// Reads a seed file: a JSON object mapping resource ids to documents.
///
/// # Errors
///
/// Returns [`BootstrapError::Seed`] when the file is missing, oversized, or
/// not an object of objects keyed by valid ids.
pub fn load_seed(path: &Path) -> Result<Vec<(ResourceId, Map<String, Value>)>, BootstrapError> {
    let bytes = fs::read(path)
        .map_err(|err| BootstrapError::Seed(format!("{}: {err}", path.display())))?;
    if bytes.len() > MAX_SEED_FILE_BYTES {
        return Err(BootstrapError::Seed(format!("{}: seed file too large", path.display())));
    }
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|err| BootstrapError::Seed(format!("{}: {err}", path.display())))?;
    let Value::Object(entries) = value else {
        return Err(BootstrapError::Seed(format!("{}: seed must be a json object", path.display())));
    };
    let mut documents = Vec::with_capacity(entries.len());
    for (raw_id, document) in entries {
        let id = ResourceId::parse(&raw_id).map_err(|err| {
            BootstrapError::Seed(format!("{}: id `{raw_id}`: {err}", path.display()))
        })?;
        let Value::Object(document) = document else {
            return Err(BootstrapError::Seed(format!(
                "{}: document `{raw_id}` must be a json object",
                path.display()
            )));
        };
        documents.push((id, document));
    }
    Ok(documents)
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Selects the audit sink from `[audit]` config.
///
/// # Errors
///
/// Returns [`BootstrapError::Audit`] when the audit file cannot be opened.
pub fn build_audit_sink(
    config: &LexisConfig,
    audit: &AuditConfig,
) -> Result<Arc<dyn AuditSink>, BootstrapError> {
    if !audit.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &audit.path {
        Some(path) => {
            let resolved = config.resolve_relative(path);
            let sink = FileAuditSink::new(&resolved)
                .map_err(|err| BootstrapError::Audit(format!("{}: {err}", resolved.display())))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

// ============================================================================
// SECTION: Messaging Relay
// ============================================================================

/// Takes ownership of every established channel and drains it until close.
pub async fn relay_channels(mut channels: mpsc::Receiver<ChannelEstablished>) {
    while let Some(established) = channels.recv().await {
        tokio::spawn(drain_channel(established));
    }
}

/// Reads one channel until the peer closes or errors.
async fn drain_channel(established: ChannelEstablished) {
    let mut channel = established.channel;
    while let Some(message) = channel.next().await {
        match message {
            Ok(message) if message.is_close() => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions use unwrap for clarity."
    )]

    use lexis_core::Identity;
    use lexis_core::PermissionLevel;
    use lexis_core::PrincipalId;
    use lexis_core::ResourceGuard;

    use super::*;

    fn write_config(dir: &Path, body: &str) -> LexisConfig {
        let path = dir.join("lexis.toml");
        fs::write(&path, body).unwrap();
        LexisConfig::load(Some(&path)).unwrap()
    }

    #[test]
    fn seed_rejects_non_object_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        fs::write(&path, r#"{ "s1": [1, 2] }"#).unwrap();
        let err = load_seed(&path).unwrap_err();
        assert!(err.to_string().contains("must be a json object"), "{err}");
        fs::write(&path, "[]").unwrap();
        assert!(load_seed(&path).is_err());
    }

    #[tokio::test]
    async fn memory_registry_serves_seeded_documents() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("sentences.json"), r#"{ "s1": { "owner": "7", "text": "hola" } }"#)
            .unwrap();
        let config = write_config(
            dir.path(),
            "[[resources]]\nkey = \"sentences\"\nseed = \"sentences.json\"\n\n\
             [[resources]]\nkey = \"vocabularies\"\n",
        );
        let registry = build_registry(&config).unwrap();
        assert_eq!(registry.len(), 2);

        let guard = ResourceGuard::new(Arc::new(registry));
        let owner = Identity::new(PrincipalId::from_u64(7), PermissionLevel::new(2));
        let outcome = guard
            .handle(&TypeKey::parse("sentences").unwrap(), &ResourceId::parse("s1").unwrap(), &owner)
            .await;
        let authorized = outcome.into_authorized().expect("owner continues");
        assert_eq!(authorized.resource.document["text"], "hola");
    }

    #[test]
    fn sqlite_registry_resolves_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "[storage]\ntype = \"sqlite\"\npath = \"data/lexis.db\"\n");
        let registry = build_registry(&config).unwrap();
        assert_eq!(registry.len(), 5);
        assert!(dir.path().join("data").join("lexis.db").exists());
    }

    #[test]
    fn missing_seed_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            write_config(dir.path(), "[[resources]]\nkey = \"sentences\"\nseed = \"absent.json\"\n");
        assert!(matches!(build_registry(&config), Err(BootstrapError::Seed(_))));
    }

    #[test]
    fn disabled_audit_uses_noop_and_file_sink_opens() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "[audit]\npath = \"audit.jsonl\"\n");
        build_audit_sink(&config, &config.audit).unwrap();
        assert!(dir.path().join("audit.jsonl").exists());

        let disabled = AuditConfig {
            enabled: false,
            path: Some("never.jsonl".to_string()),
        };
        build_audit_sink(&config, &disabled).unwrap();
        assert!(!dir.path().join("never.jsonl").exists());
    }
}
