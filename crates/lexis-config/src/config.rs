// crates/lexis-config/src/config.rs
// ============================================================================
// Module: Lexis Configuration
// Description: Configuration loading and validation for Lexis Gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: lexis-core, lexis-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed. Identifiers in the file
//! (type keys, principal ids) pass through the same canonical constructors
//! used at request time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use lexis_core::Identity;
use lexis_core::OwnerField;
use lexis_core::PermissionLevel;
use lexis_core::PrincipalId;
use lexis_core::TypeKey;
use lexis_store_sqlite::SqliteStoreConfig;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "lexis.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "LEXIS_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of configured principals.
pub const MAX_AUTH_PRINCIPALS: usize = 1024;
/// Maximum length of a principal bearer token.
pub const MAX_AUTH_TOKEN_LENGTH: usize = 256;
/// Maximum managed students per principal.
pub const MAX_MANAGED_STUDENTS: usize = 4096;
/// Maximum number of resource types.
pub const MAX_RESOURCE_TYPES: usize = 256;
/// Minimum request head buffer size.
pub const MIN_HEAD_BYTES: usize = 1024;
/// Maximum request head buffer size.
pub const MAX_HEAD_BYTES: usize = 1024 * 1024;
/// Minimum sniff and handshake timeout in milliseconds.
pub const MIN_TIMEOUT_MS: u64 = 100;
/// Maximum sniff and handshake timeout in milliseconds.
pub const MAX_TIMEOUT_MS: u64 = 60_000;
/// Maximum pending-upgrade and channel queue depth.
pub const MAX_CHANNEL_BUFFER: usize = 65_536;
/// Maximum characters of an internal error exposed to clients.
pub const MAX_ERROR_CHARS: usize = 4096;
/// Resource types served when `[[resources]]` is omitted.
pub const DEFAULT_RESOURCE_KEYS: [&str; 5] =
    ["expressions", "generic-resources", "grammatical-rules", "sentences", "vocabularies"];

// ============================================================================
// SECTION: Top-Level Config
// ============================================================================

/// Root `lexis.toml` configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LexisConfig {
    /// Listener and multiplexer settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Document storage backend.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Registered resource types.
    #[serde(default = "default_resources")]
    pub resources: Vec<ResourceConfig>,
    /// Static bearer-token principals.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Audit logging settings.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Directory of the loaded config file (not serialized).
    #[serde(skip)]
    pub source_dir: Option<PathBuf>,
}

impl Default for LexisConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            resources: default_resources(),
            auth: AuthConfig::default(),
            audit: AuditConfig::default(),
            source_dir: None,
        }
    }
}

impl LexisConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config = Self::from_toml_str(content)?;
        config.source_dir = resolved.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate(&self.auth)?;
        self.storage.validate()?;
        self.auth.validate()?;
        self.audit.validate()?;
        if self.resources.is_empty() {
            return Err(ConfigError::Invalid("at least one resource type is required".to_string()));
        }
        if self.resources.len() > MAX_RESOURCE_TYPES {
            return Err(ConfigError::Invalid("too many resource types".to_string()));
        }
        let mut seen = BTreeSet::new();
        for resource in &self.resources {
            resource.validate()?;
            if !seen.insert(resource.key.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate resource type: {}",
                    resource.key
                )));
            }
        }
        Ok(())
    }

    /// Resolves a config-relative path against the config file's directory.
    #[must_use]
    pub fn resolve_relative(&self, value: &str) -> PathBuf {
        let path = Path::new(value.trim());
        match &self.source_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Listener and upgrade multiplexer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address shared by REST and WebSocket traffic.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum buffered request head while classifying a connection.
    #[serde(default = "default_max_head_bytes")]
    pub max_head_bytes: usize,
    /// Time allowed for a new connection to send its request head.
    #[serde(default = "default_timeout_ms")]
    pub sniff_timeout_ms: u64,
    /// Time allowed for the WebSocket handshake reply.
    #[serde(default = "default_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Bounded queue depth for pending upgrades and established channels.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer: usize,
    /// Send truncated internal error messages to clients.
    #[serde(default)]
    pub expose_internal_errors: bool,
    /// Truncation limit for exposed internal error messages.
    #[serde(default = "default_max_error_chars")]
    pub max_error_chars: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_head_bytes: default_max_head_bytes(),
            sniff_timeout_ms: default_timeout_ms(),
            handshake_timeout_ms: default_timeout_ms(),
            channel_buffer: default_channel_buffer(),
            expose_internal_errors: false,
            max_error_chars: default_max_error_chars(),
        }
    }
}

impl ServerConfig {
    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid("invalid bind address".to_string()))
    }

    /// Returns the head sniff timeout.
    #[must_use]
    pub const fn sniff_timeout(&self) -> Duration {
        Duration::from_millis(self.sniff_timeout_ms)
    }

    /// Returns the handshake timeout.
    #[must_use]
    pub const fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Validates server configuration against the auth posture.
    fn validate(&self, auth: &AuthConfig) -> Result<(), ConfigError> {
        let addr = self.bind_addr()?;
        if !addr.ip().is_loopback() && auth.principals.is_empty() {
            return Err(ConfigError::Invalid(
                "non-loopback bind disallowed without auth principals".to_string(),
            ));
        }
        if !(MIN_HEAD_BYTES ..= MAX_HEAD_BYTES).contains(&self.max_head_bytes) {
            return Err(ConfigError::Invalid(format!(
                "server.max_head_bytes must be between {MIN_HEAD_BYTES} and {MAX_HEAD_BYTES}"
            )));
        }
        for (field, value) in [
            ("server.sniff_timeout_ms", self.sniff_timeout_ms),
            ("server.handshake_timeout_ms", self.handshake_timeout_ms),
        ] {
            if !(MIN_TIMEOUT_MS ..= MAX_TIMEOUT_MS).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{field} must be between {MIN_TIMEOUT_MS} and {MAX_TIMEOUT_MS}"
                )));
            }
        }
        if !(1 ..= MAX_CHANNEL_BUFFER).contains(&self.channel_buffer) {
            return Err(ConfigError::Invalid(format!(
                "server.channel_buffer must be between 1 and {MAX_CHANNEL_BUFFER}"
            )));
        }
        if !(1 ..= MAX_ERROR_CHARS).contains(&self.max_error_chars) {
            return Err(ConfigError::Invalid(format!(
                "server.max_error_chars must be between 1 and {MAX_ERROR_CHARS}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Storage
// ============================================================================

/// Document storage backend selection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Process-local store, optionally seeded from JSON files.
    #[default]
    Memory,
    /// `SQLite` document store.
    Sqlite(SqliteStoreConfig),
}

impl StorageConfig {
    /// Validates storage configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Memory => Ok(()),
            Self::Sqlite(config) => validate_sqlite(config),
        }
    }
}

/// Validates `SQLite` storage settings.
fn validate_sqlite(config: &SqliteStoreConfig) -> Result<(), ConfigError> {
    validate_path_string("storage.path", &config.path.to_string_lossy())?;
    if config.busy_timeout_ms == 0 {
        return Err(ConfigError::Invalid(
            "storage.busy_timeout_ms must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// SECTION: Resources
// ============================================================================

/// One registered resource type.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    /// Type key, also the REST path segment.
    pub key: TypeKey,
    /// Document field holding the owner id.
    #[serde(default)]
    pub owner_field: OwnerField,
    /// Optional JSON seed file for the memory store.
    #[serde(default)]
    pub seed: Option<String>,
}

impl ResourceConfig {
    /// Creates a resource entry with the default owner field and no seed.
    #[must_use]
    pub fn new(key: TypeKey) -> Self {
        Self {
            key,
            owner_field: OwnerField::default(),
            seed: None,
        }
    }

    /// Validates a resource entry.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.owner_field.as_str().trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "resources.{}.owner_field must be non-empty",
                self.key
            )));
        }
        if let Some(seed) = &self.seed {
            validate_path_string("resources.seed", seed)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Auth
// ============================================================================

/// Static bearer-token authentication settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Principals recognized by token.
    #[serde(default)]
    pub principals: Vec<PrincipalConfig>,
}

impl AuthConfig {
    /// Validates principal entries.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.principals.len() > MAX_AUTH_PRINCIPALS {
            return Err(ConfigError::Invalid("too many auth principals".to_string()));
        }
        let mut tokens = BTreeSet::new();
        for principal in &self.principals {
            principal.validate()?;
            if !tokens.insert(principal.token.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate auth token for principal {}",
                    principal.id
                )));
            }
        }
        Ok(())
    }
}

/// A principal recognized by a static bearer token.
#[derive(Clone, Deserialize)]
pub struct PrincipalConfig {
    /// Bearer token presented by the principal.
    pub token: String,
    /// Canonical principal id.
    pub id: PrincipalId,
    /// Permission level; zero is administrator.
    pub permission_level: PermissionLevel,
    /// Students this principal tutors.
    #[serde(default)]
    pub managed_students: Vec<PrincipalId>,
}

impl PrincipalConfig {
    /// Builds the request identity for this principal.
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::new(self.id.clone(), self.permission_level)
            .with_managed_students(self.managed_students.iter().cloned())
    }

    /// Validates a principal entry.
    fn validate(&self) -> Result<(), ConfigError> {
        let token = self.token.as_str();
        if token.is_empty() || token.len() > MAX_AUTH_TOKEN_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "auth token for principal {} must be 1 to {MAX_AUTH_TOKEN_LENGTH} bytes",
                self.id
            )));
        }
        if token.chars().any(|ch| ch.is_whitespace() || ch.is_control()) {
            return Err(ConfigError::Invalid(format!(
                "auth token for principal {} contains whitespace",
                self.id
            )));
        }
        if self.managed_students.len() > MAX_MANAGED_STUDENTS {
            return Err(ConfigError::Invalid(format!(
                "principal {} manages too many students",
                self.id
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for PrincipalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrincipalConfig")
            .field("token", &"<redacted>")
            .field("id", &self.id)
            .field("permission_level", &self.permission_level)
            .field("managed_students", &self.managed_students)
            .finish()
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines); stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    if path.components().any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(ConfigError::Invalid("config path component too long".to_string()));
    }
    Ok(())
}

/// Validates a path string from the config body.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    if Path::new(trimmed)
        .components()
        .any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(ConfigError::Invalid(format!("{field} path component too long")));
    }
    Ok(())
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

const fn default_max_head_bytes() -> usize {
    16 * 1024
}

const fn default_timeout_ms() -> u64 {
    10_000
}

const fn default_channel_buffer() -> usize {
    64
}

const fn default_max_error_chars() -> usize {
    256
}

const fn default_audit_enabled() -> bool {
    true
}

fn default_resources() -> Vec<ResourceConfig> {
    DEFAULT_RESOURCE_KEYS
        .iter()
        .filter_map(|key| TypeKey::parse(key).ok())
        .map(ResourceConfig::new)
        .collect()
}
