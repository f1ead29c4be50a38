// crates/lexis-config/src/lib.rs
// ============================================================================
// Module: Lexis Config Library
// Description: Canonical config model and validation for lexis.toml.
// Purpose: Single source of truth for server, storage, and auth settings.
// Dependencies: lexis-core, serde, toml
// ============================================================================

//! ## Overview
//! `lexis-config` loads `lexis.toml` with strict size and path limits and
//! rejects any configuration that is inconsistent or unsafe to serve.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
