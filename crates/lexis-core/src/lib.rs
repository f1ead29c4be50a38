// crates/lexis-core/src/lib.rs
// ============================================================================
// Module: Lexis Core
// Description: Ownership authorization engine and resource accessor registry.
// Purpose: Decide per-resource access for owners, tutors, and administrators.
// Dependencies: async-trait, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Lexis Core holds the transport-agnostic authorization path. Requests carry
//! an [`Identity`]; a [`ResourceGuard`] resolves the accessor for the requested
//! [`TypeKey`] from an immutable [`AccessorRegistry`], loads the resource, and
//! applies the fixed owner, tutor-of-owner, admin precedence from [`decide`].
//! The HTTP surface and the upgrade multiplexer live in `lexis-server`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::DEFAULT_OWNER_FIELD;
pub use crate::core::Decision;
pub use crate::core::DecisionEngine;
pub use crate::core::DecisionReason;
pub use crate::core::IdentifierError;
pub use crate::core::Identity;
pub use crate::core::LoadedResource;
pub use crate::core::MAX_PRINCIPAL_ID_BYTES;
pub use crate::core::MAX_RESOURCE_ID_BYTES;
pub use crate::core::MAX_TYPE_KEY_BYTES;
pub use crate::core::OwnerField;
pub use crate::core::OwnershipError;
pub use crate::core::OwnershipPolicy;
pub use crate::core::PermissionLevel;
pub use crate::core::PrincipalId;
pub use crate::core::ResourceId;
pub use crate::core::ResourceKeyError;
pub use crate::core::TypeKey;
pub use crate::core::decide;
pub use crate::interfaces::AccessorError;
pub use crate::interfaces::ResourceAccessor;
pub use crate::runtime::AccessorRegistry;
pub use crate::runtime::AccessorRegistryBuilder;
pub use crate::runtime::AuthorizedResource;
pub use crate::runtime::GuardFailure;
pub use crate::runtime::GuardOutcome;
pub use crate::runtime::GuardRejection;
pub use crate::runtime::InMemoryAccessor;
pub use crate::runtime::InMemoryDocumentStore;
pub use crate::runtime::RegistryError;
pub use crate::runtime::ResourceGuard;
