// crates/lexis-core/src/runtime/store.rs
// ============================================================================
// Module: In-Memory Document Store
// Description: Process-local document store and its resource accessors.
// Purpose: Provide a storage collaborator for tests and the memory mode.
// Dependencies: async-trait, serde_json, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Documents are grouped by type key. Each [`InMemoryAccessor`] is bound to
//! one type key and one [`OwnerField`] and reads through the shared store,
//! so inserts after registry construction are visible to later requests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;

use crate::core::LoadedResource;
use crate::core::OwnerField;
use crate::core::OwnershipError;
use crate::core::PrincipalId;
use crate::core::ResourceId;
use crate::core::TypeKey;
use crate::interfaces::AccessorError;
use crate::interfaces::ResourceAccessor;

// ============================================================================
// SECTION: Store
// ============================================================================

/// Documents keyed by type key then resource id.
type Documents = BTreeMap<TypeKey, BTreeMap<ResourceId, Map<String, Value>>>;

/// Shared in-memory document store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    /// Stored documents.
    documents: Arc<Mutex<Documents>>,
}

impl InMemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a document.
    ///
    /// # Errors
    ///
    /// Returns [`AccessorError::Unavailable`] when the store lock is poisoned.
    pub fn insert(
        &self,
        type_key: TypeKey,
        id: ResourceId,
        document: Map<String, Value>,
    ) -> Result<(), AccessorError> {
        let mut guard = self.lock()?;
        guard.entry(type_key).or_default().insert(id, document);
        Ok(())
    }

    /// Removes a document, returning it when present.
    ///
    /// # Errors
    ///
    /// Returns [`AccessorError::Unavailable`] when the store lock is poisoned.
    pub fn remove(
        &self,
        type_key: &TypeKey,
        id: &ResourceId,
    ) -> Result<Option<Map<String, Value>>, AccessorError> {
        let mut guard = self.lock()?;
        Ok(guard.get_mut(type_key).and_then(|documents| documents.remove(id)))
    }

    /// Returns the number of documents stored under a type key.
    ///
    /// # Errors
    ///
    /// Returns [`AccessorError::Unavailable`] when the store lock is poisoned.
    pub fn count(&self, type_key: &TypeKey) -> Result<usize, AccessorError> {
        let guard = self.lock()?;
        Ok(guard.get(type_key).map_or(0, BTreeMap::len))
    }

    /// Creates an accessor bound to one type key.
    #[must_use]
    pub fn accessor(&self, type_key: TypeKey, owner_field: OwnerField) -> InMemoryAccessor {
        InMemoryAccessor {
            store: self.clone(),
            type_key,
            owner_field,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Documents>, AccessorError> {
        self.documents
            .lock()
            .map_err(|_| AccessorError::Unavailable("in-memory store lock poisoned".to_string()))
    }

    fn get(
        &self,
        type_key: &TypeKey,
        id: &ResourceId,
    ) -> Result<Option<Map<String, Value>>, AccessorError> {
        let guard = self.lock()?;
        Ok(guard.get(type_key).and_then(|documents| documents.get(id)).cloned())
    }
}

// ============================================================================
// SECTION: Accessor
// ============================================================================

/// Resource accessor reading one type key from an [`InMemoryDocumentStore`].
#[derive(Debug, Clone)]
pub struct InMemoryAccessor {
    /// Backing store.
    store: InMemoryDocumentStore,
    /// Bound type key.
    type_key: TypeKey,
    /// Owner field resolver.
    owner_field: OwnerField,
}

#[async_trait]
impl ResourceAccessor for InMemoryAccessor {
    async fn load(&self, id: &ResourceId) -> Result<Option<LoadedResource>, AccessorError> {
        let document = self.store.get(&self.type_key, id)?;
        Ok(document.map(|document| LoadedResource::new(self.type_key.clone(), id.clone(), document)))
    }

    fn owner_of(&self, resource: &LoadedResource) -> Result<PrincipalId, OwnershipError> {
        self.owner_field.resolve(resource)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
