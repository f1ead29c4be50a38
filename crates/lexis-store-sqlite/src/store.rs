// crates/lexis-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Document Store
// Description: Resource documents persisted in SQLite WAL.
// Purpose: Load owned resources by type key and id for the resource guard.
// Dependencies: lexis-core, rusqlite, serde, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! Documents live in a single `resources` table keyed by `(type_key, id)`
//! and stored as JSON text. [`SqliteAccessor`] binds the store to one type
//! key and runs each load on the blocking pool.
//!
//! ## Invariants
//! - Stored documents must decode to JSON objects; anything else is corrupt.
//! - The schema version is checked on open and mismatches fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use lexis_core::AccessorError;
use lexis_core::LoadedResource;
use lexis_core::MAX_RESOURCE_ID_BYTES;
use lexis_core::OwnerField;
use lexis_core::OwnershipError;
use lexis_core::PrincipalId;
use lexis_core::ResourceAccessor;
use lexis_core::ResourceId;
use lexis_core::TypeKey;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum stored document size in bytes.
pub const MAX_DOCUMENT_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode.
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// Configuration for the `SQLite` document store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
}

impl SqliteStoreConfig {
    /// Creates a config for the given path with default settings.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored document could not be decoded.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store input.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Document exceeded the size limit.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for AccessorError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::TooLarge {
                ..
            } => Self::Corrupt(error.to_string()),
            SqliteStoreError::Invalid(message) => Self::MalformedId(message),
            SqliteStoreError::Io(_)
            | SqliteStoreError::Db(_)
            | SqliteStoreError::VersionMismatch(_) => Self::Unavailable(error.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed resource document store.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteDocumentStore {
    /// Opens or creates the document store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Inserts or replaces a document.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the document is too large or the
    /// write fails.
    pub fn put(
        &self,
        type_key: &TypeKey,
        id: &ResourceId,
        document: &Map<String, Value>,
    ) -> Result<(), SqliteStoreError> {
        validate_id(id.as_str())?;
        let text = serde_json::to_string(document)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        if text.len() > MAX_DOCUMENT_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_DOCUMENT_BYTES,
                actual_bytes: text.len(),
            });
        }
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO resources (type_key, id, document) VALUES (?1, ?2, ?3)
                 ON CONFLICT (type_key, id) DO UPDATE SET document = excluded.document",
                params![type_key.as_str(), id.as_str(), text],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    /// Loads a document by type key and raw id.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the id is malformed, the read fails,
    /// or the stored document cannot be decoded.
    pub fn get(
        &self,
        type_key: &TypeKey,
        id: &str,
    ) -> Result<Option<Map<String, Value>>, SqliteStoreError> {
        validate_id(id)?;
        let text: Option<String> = {
            let guard = self.lock()?;
            guard
                .query_row(
                    "SELECT document FROM resources WHERE type_key = ?1 AND id = ?2",
                    params![type_key.as_str(), id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?
        };
        text.map(|text| decode_document(type_key, id, &text)).transpose()
    }

    /// Deletes a document, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the delete fails.
    pub fn delete(&self, type_key: &TypeKey, id: &ResourceId) -> Result<bool, SqliteStoreError> {
        let guard = self.lock()?;
        let removed = guard
            .execute(
                "DELETE FROM resources WHERE type_key = ?1 AND id = ?2",
                params![type_key.as_str(), id.as_str()],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(removed > 0)
    }

    /// Creates an accessor bound to one type key.
    #[must_use]
    pub fn accessor(&self, type_key: TypeKey, owner_field: OwnerField) -> SqliteAccessor {
        SqliteAccessor {
            store: self.clone(),
            type_key,
            owner_field,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Accessor
// ============================================================================

/// Resource accessor reading one type key from a [`SqliteDocumentStore`].
#[derive(Clone)]
pub struct SqliteAccessor {
    /// Backing store.
    store: SqliteDocumentStore,
    /// Bound type key.
    type_key: TypeKey,
    /// Owner field resolver.
    owner_field: OwnerField,
}

#[async_trait]
impl ResourceAccessor for SqliteAccessor {
    async fn load(&self, id: &ResourceId) -> Result<Option<LoadedResource>, AccessorError> {
        let store = self.store.clone();
        let type_key = self.type_key.clone();
        let raw_id = id.as_str().to_string();
        let document = tokio::task::spawn_blocking(move || store.get(&type_key, &raw_id))
            .await
            .map_err(|err| AccessorError::Unavailable(err.to_string()))??;
        Ok(document.map(|document| LoadedResource::new(self.type_key.clone(), id.clone(), document)))
    }

    fn owner_of(&self, resource: &LoadedResource) -> Result<PrincipalId, OwnershipError> {
        self.owner_field.resolve(resource)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects ids the store cannot address.
fn validate_id(id: &str) -> Result<(), SqliteStoreError> {
    if id.is_empty() || id.len() > MAX_RESOURCE_ID_BYTES {
        return Err(SqliteStoreError::Invalid("resource id length out of range".to_string()));
    }
    if id.chars().any(char::is_control) {
        return Err(SqliteStoreError::Invalid(
            "resource id contains control characters".to_string(),
        ));
    }
    Ok(())
}

/// Decodes a stored document, failing closed on anything but an object.
fn decode_document(
    type_key: &TypeKey,
    id: &str,
    text: &str,
) -> Result<Map<String, Value>, SqliteStoreError> {
    if text.len() > MAX_DOCUMENT_BYTES {
        return Err(SqliteStoreError::TooLarge {
            max_bytes: MAX_DOCUMENT_BYTES,
            actual_bytes: text.len(),
        });
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(SqliteStoreError::Corrupt(format!(
            "document {type_key}/{id} is not a json object"
        ))),
        Err(err) => Err(SqliteStoreError::Corrupt(format!("document {type_key}/{id}: {err}"))),
    }
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
        }
        _ => Ok(()),
    }
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    if path.components().any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(SqliteStoreError::Invalid(
            "store path contains an overlong component".to_string(),
        ));
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with the configured pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(connection)
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS resources (
                    type_key TEXT NOT NULL,
                    id TEXT NOT NULL,
                    document TEXT NOT NULL,
                    PRIMARY KEY (type_key, id)
                );",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}
