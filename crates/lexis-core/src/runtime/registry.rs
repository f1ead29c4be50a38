// crates/lexis-core/src/runtime/registry.rs
// ============================================================================
// Module: Resource Accessor Registry
// Description: Startup-built mapping from type keys to resource accessors.
// Purpose: Resolve the accessor for a request's resource type without locks.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Accessors are registered through [`AccessorRegistryBuilder`] during
//! startup. [`AccessorRegistryBuilder::build`] consumes the builder and
//! returns an immutable [`AccessorRegistry`], which is shared behind an
//! `Arc` and read concurrently without synchronization.
//!
//! ## Invariants
//! - Type keys are unique; duplicates are rejected at registration time.
//! - The registry cannot be mutated after `build`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::core::TypeKey;
use crate::interfaces::ResourceAccessor;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registry configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Type key registered twice.
    #[error("resource type already registered: {0}")]
    Duplicate(TypeKey),
    /// Type key has no registered accessor.
    #[error("resource type not registered: {0}")]
    UnknownType(TypeKey),
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Mutable registry builder used only during startup.
#[derive(Default)]
pub struct AccessorRegistryBuilder {
    /// Accessors keyed by type key.
    accessors: BTreeMap<TypeKey, Box<dyn ResourceAccessor>>,
}

impl AccessorRegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an accessor for a type key.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] when the key is already taken.
    pub fn register(
        &mut self,
        type_key: TypeKey,
        accessor: impl ResourceAccessor + 'static,
    ) -> Result<(), RegistryError> {
        if self.accessors.contains_key(&type_key) {
            return Err(RegistryError::Duplicate(type_key));
        }
        self.accessors.insert(type_key, Box::new(accessor));
        Ok(())
    }

    /// Finishes startup registration.
    #[must_use]
    pub fn build(self) -> AccessorRegistry {
        AccessorRegistry {
            accessors: self.accessors,
        }
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Immutable accessor registry.
pub struct AccessorRegistry {
    /// Accessors keyed by type key.
    accessors: BTreeMap<TypeKey, Box<dyn ResourceAccessor>>,
}

impl AccessorRegistry {
    /// Looks up the accessor registered for a type key.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownType`] when no accessor is registered.
    pub fn lookup(&self, type_key: &TypeKey) -> Result<&dyn ResourceAccessor, RegistryError> {
        self.accessors
            .get(type_key)
            .map(AsRef::as_ref)
            .ok_or_else(|| RegistryError::UnknownType(type_key.clone()))
    }

    /// Returns registered type keys in sorted order.
    pub fn type_keys(&self) -> impl Iterator<Item = &TypeKey> {
        self.accessors.keys()
    }

    /// Returns true when the key is registered.
    #[must_use]
    pub fn contains(&self, type_key: &TypeKey) -> bool {
        self.accessors.contains_key(type_key)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accessors.len()
    }

    /// Returns true when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accessors.is_empty()
    }
}

impl fmt::Debug for AccessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorRegistry")
            .field("type_keys", &self.accessors.keys().collect::<Vec<_>>())
            .finish()
    }
}
