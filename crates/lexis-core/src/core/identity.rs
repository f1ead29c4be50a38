// crates/lexis-core/src/core/identity.rs
// ============================================================================
// Module: Lexis Identity Context
// Description: Canonical principal identifiers and the per-request identity.
// Purpose: Give every identity comparison a single canonical representation.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A [`PrincipalId`] is the one canonical form used for requester ids,
//! managed-student ids and resource owner ids. Values enter the system only
//! through the constructors in this module, so two ids that denote the same
//! principal always compare equal regardless of how the source encoded them
//! (JSON string, JSON integer, or `{"$oid": ...}` extended JSON).
//!
//! ## Invariants
//! - Canonical ids are non-empty, at most [`MAX_PRINCIPAL_ID_BYTES`] bytes,
//!   and contain no control characters.
//! - Ids are taken verbatim; no trimming or case folding is applied.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of a canonical principal identifier in bytes.
pub const MAX_PRINCIPAL_ID_BYTES: usize = 128;

/// Extended JSON key used by document stores for object identifiers.
const OBJECT_ID_KEY: &str = "$oid";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identifier validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Identifier is empty.
    #[error("identifier must be non-empty")]
    Empty,
    /// Identifier exceeds the maximum length.
    #[error("identifier exceeds {max} bytes")]
    TooLong {
        /// Maximum allowed length in bytes.
        max: usize,
    },
    /// Identifier contains control characters.
    #[error("identifier contains control characters")]
    ControlCharacter,
    /// Identifier has an unsupported shape.
    #[error("unsupported identifier encoding: {0}")]
    Unsupported(&'static str),
}

// ============================================================================
// SECTION: Principal Identifier
// ============================================================================

/// Canonical principal identifier.
///
/// # Invariants
/// - Constructed only through validated constructors.
/// - Deserialization accepts every encoding [`PrincipalId::from_json`] does.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "String")]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Parses a canonical identifier from its string form.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the value is empty, too long, or
    /// contains control characters.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        if value.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if value.len() > MAX_PRINCIPAL_ID_BYTES {
            return Err(IdentifierError::TooLong {
                max: MAX_PRINCIPAL_ID_BYTES,
            });
        }
        if value.chars().any(char::is_control) {
            return Err(IdentifierError::ControlCharacter);
        }
        Ok(Self(value.to_string()))
    }

    /// Builds a canonical identifier from an unsigned integer.
    #[must_use]
    pub fn from_u64(value: u64) -> Self {
        Self(value.to_string())
    }

    /// Canonicalizes an identifier stored in a JSON document.
    ///
    /// Strings are taken verbatim, integers are rendered in decimal, and
    /// `{"$oid": "..."}` objects unwrap to their inner string.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] for floats, booleans, nulls, arrays,
    /// other objects, or values that fail [`PrincipalId::parse`].
    pub fn from_json(value: &Value) -> Result<Self, IdentifierError> {
        match value {
            Value::String(text) => Self::parse(text),
            Value::Number(number) => {
                if let Some(unsigned) = number.as_u64() {
                    Ok(Self::from_u64(unsigned))
                } else if let Some(signed) = number.as_i64() {
                    Self::parse(&signed.to_string())
                } else {
                    Err(IdentifierError::Unsupported("non-integer number"))
                }
            }
            Value::Object(map) => match (map.len(), map.get(OBJECT_ID_KEY)) {
                (1, Some(Value::String(text))) => Self::parse(text),
                _ => Err(IdentifierError::Unsupported("object without $oid")),
            },
            Value::Null => Err(IdentifierError::Unsupported("null")),
            Value::Bool(_) => Err(IdentifierError::Unsupported("boolean")),
            Value::Array(_) => Err(IdentifierError::Unsupported("array")),
        }
    }

    /// Returns the canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<Value> for PrincipalId {
    type Error = IdentifierError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(&value)
    }
}

impl From<PrincipalId> for String {
    fn from(value: PrincipalId) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Permission Level
// ============================================================================

/// Numeric permission level; zero is the administrator level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionLevel(u32);

impl PermissionLevel {
    /// Administrator level; bypasses ownership checks.
    pub const ADMIN: Self = Self(0);

    /// Creates a permission level from its numeric value.
    #[must_use]
    pub const fn new(level: u32) -> Self {
        Self(level)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns true for the administrator level.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        self.0 == 0
    }
}

// ============================================================================
// SECTION: Identity
// ============================================================================

/// Authenticated caller snapshot for a single request.
///
/// # Invariants
/// - Built per request by the authentication collaborator and never shared
///   across requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Caller identifier.
    pub id: PrincipalId,
    /// Caller permission level.
    pub permission_level: PermissionLevel,
    /// Students this caller tutors.
    #[serde(default)]
    pub managed_students: BTreeSet<PrincipalId>,
}

impl Identity {
    /// Creates an identity with no managed students.
    #[must_use]
    pub const fn new(id: PrincipalId, permission_level: PermissionLevel) -> Self {
        Self {
            id,
            permission_level,
            managed_students: BTreeSet::new(),
        }
    }

    /// Returns a copy with the managed-student set replaced.
    #[must_use]
    pub fn with_managed_students(
        mut self,
        students: impl IntoIterator<Item = PrincipalId>,
    ) -> Self {
        self.managed_students = students.into_iter().collect();
        self
    }

    /// Returns true when the caller tutors the given principal.
    #[must_use]
    pub fn manages(&self, student: &PrincipalId) -> bool {
        self.managed_students.contains(student)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
