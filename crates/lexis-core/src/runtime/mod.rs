// crates/lexis-core/src/runtime/mod.rs
// ============================================================================
// Module: Lexis Runtime
// Description: Registry, guard, and in-memory storage runtime components.
// Purpose: Compose accessors and the decision engine into request handling.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Runtime pieces built once at startup and shared immutably afterwards.

pub mod guard;
pub mod registry;
pub mod store;

pub use guard::AuthorizedResource;
pub use guard::GuardFailure;
pub use guard::GuardOutcome;
pub use guard::GuardRejection;
pub use guard::ResourceGuard;
pub use registry::AccessorRegistry;
pub use registry::AccessorRegistryBuilder;
pub use registry::RegistryError;
pub use store::InMemoryAccessor;
pub use store::InMemoryDocumentStore;
