// crates/lexis-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Document Store
// Description: Durable resource document backend using SQLite WAL.
// Purpose: Provide persistent storage behind the resource accessor seam.
// Dependencies: lexis-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed document store and a
//! [`lexis_core::ResourceAccessor`] implementation bound to one type key.
//! Stored documents are untrusted and decoded fail-closed on every load.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_DOCUMENT_BYTES;
pub use store::SqliteAccessor;
pub use store::SqliteDocumentStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
