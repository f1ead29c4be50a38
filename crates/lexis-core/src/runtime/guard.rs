// crates/lexis-core/src/runtime/guard.rs
// ============================================================================
// Module: Resource Guard
// Description: Generic load-then-authorize middleware for owned resources.
// Purpose: Gate every resource request on existence and ownership.
// Dependencies: thiserror, crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! [`ResourceGuard::handle`] is the transport-agnostic half of the resource
//! middleware. It resolves the accessor for the requested type, loads the
//! resource, extracts its owner, and asks the decision engine. The HTTP layer
//! maps the resulting [`GuardOutcome`] onto status codes.
//!
//! ## Invariants
//! - Order within a request is strict: load, then decide, then continue.
//! - A missing resource never reaches the decision engine.
//! - An existing resource never yields `NotFound` for a denied caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::core::Decision;
use crate::core::DecisionEngine;
use crate::core::Identity;
use crate::core::LoadedResource;
use crate::core::OwnershipError;
use crate::core::OwnershipPolicy;
use crate::core::PrincipalId;
use crate::core::ResourceId;
use crate::core::TypeKey;
use crate::interfaces::AccessorError;
use crate::runtime::registry::AccessorRegistry;
use crate::runtime::registry::RegistryError;

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Resource that passed the guard, handed to the downstream handler.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizedResource {
    /// Loaded resource document.
    pub resource: LoadedResource,
    /// Canonical owner id.
    pub owner: PrincipalId,
    /// Allow decision that admitted the request.
    pub decision: Decision,
}

/// Unexpected failures while guarding a request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GuardFailure {
    /// Requested type has no accessor.
    #[error(transparent)]
    UnknownType(#[from] RegistryError),
    /// Accessor failed to load the resource.
    #[error(transparent)]
    Accessor(#[from] AccessorError),
    /// Owner could not be extracted from the loaded resource.
    #[error(transparent)]
    Ownership(#[from] OwnershipError),
}

/// Reasons a guarded request does not continue.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardRejection {
    /// Resource does not exist.
    NotFound,
    /// Resource exists but the caller may not access it.
    Forbidden {
        /// Deny decision.
        decision: Decision,
    },
    /// Unexpected failure.
    Internal(GuardFailure),
}

/// Result of guarding one request.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardOutcome {
    /// Request may proceed with the loaded resource.
    Continue(AuthorizedResource),
    /// Request is rejected.
    Reject(GuardRejection),
}

impl GuardOutcome {
    /// Returns the authorized resource when the request may continue.
    #[must_use]
    pub fn into_authorized(self) -> Option<AuthorizedResource> {
        match self {
            Self::Continue(authorized) => Some(authorized),
            Self::Reject(_) => None,
        }
    }
}

// ============================================================================
// SECTION: Guard
// ============================================================================

/// Generic ownership guard shared across all resource routes.
#[derive(Clone)]
pub struct ResourceGuard {
    /// Immutable accessor registry.
    registry: Arc<AccessorRegistry>,
    /// Decision engine.
    engine: Arc<dyn DecisionEngine>,
}

impl ResourceGuard {
    /// Creates a guard using the fixed ownership policy.
    #[must_use]
    pub fn new(registry: Arc<AccessorRegistry>) -> Self {
        Self {
            registry,
            engine: Arc::new(OwnershipPolicy),
        }
    }

    /// Replaces the decision engine.
    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn DecisionEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Returns the registry backing this guard.
    #[must_use]
    pub fn registry(&self) -> &AccessorRegistry {
        &self.registry
    }

    /// Loads the resource and decides whether the requester may access it.
    pub async fn handle(
        &self,
        type_key: &TypeKey,
        id: &ResourceId,
        requester: &Identity,
    ) -> GuardOutcome {
        match self.evaluate(type_key, id, requester).await {
            Ok(outcome) => outcome,
            Err(failure) => GuardOutcome::Reject(GuardRejection::Internal(failure)),
        }
    }

    async fn evaluate(
        &self,
        type_key: &TypeKey,
        id: &ResourceId,
        requester: &Identity,
    ) -> Result<GuardOutcome, GuardFailure> {
        let accessor = self.registry.lookup(type_key)?;
        let Some(resource) = accessor.load(id).await? else {
            return Ok(GuardOutcome::Reject(GuardRejection::NotFound));
        };
        let owner = accessor.owner_of(&resource)?;
        let decision = self.engine.decide(requester, &owner);
        if !decision.allowed {
            return Ok(GuardOutcome::Reject(GuardRejection::Forbidden {
                decision,
            }));
        }
        Ok(GuardOutcome::Continue(AuthorizedResource {
            resource,
            owner,
            decision,
        }))
    }
}
