// crates/lexis-core/src/interfaces/mod.rs
// ============================================================================
// Module: Lexis Interfaces
// Description: Storage-facing interfaces consumed by the authorization path.
// Purpose: Define the resource accessor capability implemented by backends.
// Dependencies: async-trait, thiserror, crate::core
// ============================================================================

//! ## Overview
//! A [`ResourceAccessor`] is bound to one type key. It loads a resource by id
//! and extracts its owner. Backends (in-memory, `SQLite`, or a deployment's
//! own store) implement this trait; the registry and guard never see storage
//! details.
//!
//! ## Invariants
//! - `load` returning `Ok(None)` is the only "not found" signal.
//! - Any `Err` is an unexpected failure and is surfaced as an internal error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use thiserror::Error;

use crate::core::LoadedResource;
use crate::core::OwnershipError;
use crate::core::PrincipalId;
use crate::core::ResourceId;

// ============================================================================
// SECTION: Accessor Errors
// ============================================================================

/// Unexpected accessor failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessorError {
    /// Resource id is not valid for the backing store.
    #[error("malformed resource id: {0}")]
    MalformedId(String),
    /// Backing store is unavailable.
    #[error("resource store unavailable: {0}")]
    Unavailable(String),
    /// Stored data could not be decoded.
    #[error("resource store corruption: {0}")]
    Corrupt(String),
}

// ============================================================================
// SECTION: Resource Accessor
// ============================================================================

/// Load-by-id and owner-extraction capability for one resource type.
#[async_trait]
pub trait ResourceAccessor: Send + Sync {
    /// Loads a resource by id.
    ///
    /// # Errors
    ///
    /// Returns [`AccessorError`] when the store fails or the id is malformed.
    /// A missing resource is `Ok(None)`, not an error.
    async fn load(&self, id: &ResourceId) -> Result<Option<LoadedResource>, AccessorError>;

    /// Extracts the canonical owner id from a loaded resource.
    ///
    /// # Errors
    ///
    /// Returns [`OwnershipError`] when the owner cannot be determined.
    fn owner_of(&self, resource: &LoadedResource) -> Result<PrincipalId, OwnershipError>;
}
