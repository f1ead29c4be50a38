// crates/lexis-cli/src/lib.rs
// ============================================================================
// Module: Lexis CLI Library
// Description: Startup wiring shared by the `lexis` binary and its tests.
// Purpose: Keep storage, registry, and audit bootstrap testable.
// Dependencies: lexis-config, lexis-core, lexis-server, lexis-store-sqlite
// ============================================================================

//! ## Overview
//! The `lexis` binary sequences startup; [`bootstrap`] does the work.

pub mod bootstrap;
