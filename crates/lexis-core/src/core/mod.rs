// crates/lexis-core/src/core/mod.rs
// ============================================================================
// Module: Lexis Core Types
// Description: Identity, resource, and decision data model.
// Purpose: Group the request-scoped data types used by the authorization path.
// Dependencies: crate::core::{decision, identity, resource}
// ============================================================================

//! ## Overview
//! Request-scoped identity, resource, and decision data types.

pub mod decision;
pub mod identity;
pub mod resource;

pub use decision::Decision;
pub use decision::DecisionEngine;
pub use decision::DecisionReason;
pub use decision::OwnershipPolicy;
pub use decision::decide;
pub use identity::IdentifierError;
pub use identity::Identity;
pub use identity::MAX_PRINCIPAL_ID_BYTES;
pub use identity::PermissionLevel;
pub use identity::PrincipalId;
pub use resource::DEFAULT_OWNER_FIELD;
pub use resource::LoadedResource;
pub use resource::MAX_RESOURCE_ID_BYTES;
pub use resource::MAX_TYPE_KEY_BYTES;
pub use resource::OwnerField;
pub use resource::OwnershipError;
pub use resource::ResourceId;
pub use resource::ResourceKeyError;
pub use resource::TypeKey;
