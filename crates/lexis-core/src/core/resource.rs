// crates/lexis-core/src/core/resource.rs
// ============================================================================
// Module: Lexis Resources
// Description: Resource type keys, resource ids, and loaded resource documents.
// Purpose: Model typed, owned entities and resolve their owner identity.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Resources are JSON documents addressed by a [`TypeKey`] namespace and a
//! [`ResourceId`]. Each document records exactly one owner; [`OwnerField`]
//! extracts it and canonicalizes it into a [`PrincipalId`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::identity::IdentifierError;
use crate::core::identity::PrincipalId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of a resource type key in bytes.
pub const MAX_TYPE_KEY_BYTES: usize = 64;
/// Maximum length of a resource identifier in bytes.
pub const MAX_RESOURCE_ID_BYTES: usize = 256;
/// Default document field holding the owner identifier.
pub const DEFAULT_OWNER_FIELD: &str = "owner";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Type key or resource id validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceKeyError {
    /// Type key does not match the allowed grammar.
    #[error("invalid type key: {0}")]
    InvalidTypeKey(String),
    /// Resource id is empty or too long.
    #[error("invalid resource id")]
    InvalidResourceId,
}

/// Owner extraction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OwnershipError {
    /// Owner field is absent from the document.
    #[error("owner field `{field}` missing from {type_key}/{id}")]
    Missing {
        /// Field name that was expected.
        field: String,
        /// Resource type key.
        type_key: String,
        /// Resource identifier.
        id: String,
    },
    /// Owner field holds a value that is not a valid identifier.
    #[error("owner field `{field}` on {type_key}/{id} is invalid: {source}")]
    Invalid {
        /// Field name that was read.
        field: String,
        /// Resource type key.
        type_key: String,
        /// Resource identifier.
        id: String,
        /// Canonicalization failure.
        source: IdentifierError,
    },
}

// ============================================================================
// SECTION: Type Key
// ============================================================================

/// Resource-type discriminator, also used as the REST path segment.
///
/// # Invariants
/// - Lowercase ASCII letters, digits and `-`, starting with a letter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeKey(String);

impl TypeKey {
    /// Parses and validates a type key.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceKeyError::InvalidTypeKey`] when the key is empty,
    /// too long, or uses characters outside the allowed set.
    pub fn parse(value: &str) -> Result<Self, ResourceKeyError> {
        let mut chars = value.chars();
        let starts_with_letter = chars.next().is_some_and(|first| first.is_ascii_lowercase());
        let valid_rest =
            chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-');
        if !starts_with_letter || !valid_rest || value.len() > MAX_TYPE_KEY_BYTES {
            return Err(ResourceKeyError::InvalidTypeKey(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for TypeKey {
    type Error = ResourceKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TypeKey> for String {
    fn from(value: TypeKey) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Resource Id
// ============================================================================

/// Opaque resource identifier as received from the caller.
///
/// Only length is checked here; accessors decide whether an id is
/// well-formed for their storage.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    /// Parses a resource id.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceKeyError::InvalidResourceId`] when the id is empty
    /// or exceeds [`MAX_RESOURCE_ID_BYTES`].
    pub fn parse(value: &str) -> Result<Self, ResourceKeyError> {
        if value.is_empty() || value.len() > MAX_RESOURCE_ID_BYTES {
            return Err(ResourceKeyError::InvalidResourceId);
        }
        Ok(Self(value.to_string()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for ResourceId {
    type Error = ResourceKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ResourceId> for String {
    fn from(value: ResourceId) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Loaded Resource
// ============================================================================

/// Resource document loaded fresh for a single request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedResource {
    /// Resource type key.
    pub type_key: TypeKey,
    /// Resource identifier.
    pub id: ResourceId,
    /// Stored document fields.
    pub document: Map<String, Value>,
}

impl LoadedResource {
    /// Creates a loaded resource from its parts.
    #[must_use]
    pub const fn new(type_key: TypeKey, id: ResourceId, document: Map<String, Value>) -> Self {
        Self {
            type_key,
            id,
            document,
        }
    }
}

// ============================================================================
// SECTION: Ownership Resolver
// ============================================================================

/// Names the document field holding a resource's owner id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerField(String);

impl OwnerField {
    /// Creates an owner field resolver.
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self(field.into())
    }

    /// Returns the field name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extracts and canonicalizes the owner of a loaded resource.
    ///
    /// # Errors
    ///
    /// Returns [`OwnershipError`] when the field is absent or its value is
    /// not a canonicalizable identifier.
    pub fn resolve(&self, resource: &LoadedResource) -> Result<PrincipalId, OwnershipError> {
        let value = resource.document.get(&self.0).ok_or_else(|| OwnershipError::Missing {
            field: self.0.clone(),
            type_key: resource.type_key.to_string(),
            id: resource.id.to_string(),
        })?;
        PrincipalId::from_json(value).map_err(|source| OwnershipError::Invalid {
            field: self.0.clone(),
            type_key: resource.type_key.to_string(),
            id: resource.id.to_string(),
            source,
        })
    }
}

impl Default for OwnerField {
    fn default() -> Self {
        Self::new(DEFAULT_OWNER_FIELD)
    }
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

    use serde_json::json;

    use super::*;

    fn resource(document: Value) -> LoadedResource {
        let Value::Object(map) = document else {
            unreachable!("fixture documents are objects");
        };
        LoadedResource::new(
            TypeKey::parse("sentences").unwrap(),
            ResourceId::parse("s1").unwrap(),
            map,
        )
    }

    #[test]
    fn type_key_grammar() {
        for ok in ["expressions", "generic-resources", "v2-items"] {
            assert!(TypeKey::parse(ok).is_ok(), "{ok}");
        }
        for bad in ["", "Sentences", "-lead", "9start", "with space", "a/b"] {
            assert!(TypeKey::parse(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn resource_id_bounds() {
        assert!(ResourceId::parse("").is_err());
        assert!(ResourceId::parse(&"x".repeat(MAX_RESOURCE_ID_BYTES + 1)).is_err());
        assert!(ResourceId::parse("65f0c0ffee").is_ok());
    }

    #[test]
    fn owner_field_resolves_supported_encodings() {
        let field = OwnerField::default();
        let expected = PrincipalId::parse("42").unwrap();
        for owner in [json!("42"), json!(42), json!({ "$oid": "42" })] {
            let loaded = resource(json!({ "owner": owner, "text": "hola" }));
            assert_eq!(field.resolve(&loaded).unwrap(), expected);
        }
    }

    #[test]
    fn owner_field_reports_missing_and_invalid() {
        let field = OwnerField::new("author");
        let missing = field.resolve(&resource(json!({ "owner": "1" })));
        assert!(matches!(missing, Err(OwnershipError::Missing { .. })));
        let invalid = field.resolve(&resource(json!({ "author": null })));
        assert!(matches!(invalid, Err(OwnershipError::Invalid { .. })));
    }
}
