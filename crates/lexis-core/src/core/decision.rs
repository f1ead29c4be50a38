// crates/lexis-core/src/core/decision.rs
// ============================================================================
// Module: Lexis Authorization Decisions
// Description: Fixed-precedence ownership decision engine.
// Purpose: Decide whether a requester may act on a resource owned by another.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The decision rule is intentionally fixed. Evaluated in order, first match
//! wins:
//!
//! 1. requester is the owner: allow ([`DecisionReason::Owner`])
//! 2. owner is one of the requester's managed students: allow
//!    ([`DecisionReason::TutorOfOwner`])
//! 3. requester is an administrator: allow ([`DecisionReason::Admin`])
//! 4. otherwise deny ([`DecisionReason::Denied`])
//!
//! ## Invariants
//! - [`decide`] is pure, deterministic, and total.
//! - The reason is for audit only and is never sent to callers.

use serde::Serialize;

use crate::core::identity::Identity;
use crate::core::identity::PrincipalId;

// ============================================================================
// SECTION: Decision Types
// ============================================================================

/// Why a decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// Requester owns the resource.
    Owner,
    /// Requester tutors the resource owner.
    TutorOfOwner,
    /// Requester is an administrator.
    Admin,
    /// No rule matched.
    Denied,
}

impl DecisionReason {
    /// Returns a stable label for audit records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::TutorOfOwner => "tutor_of_owner",
            Self::Admin => "admin",
            Self::Denied => "denied",
        }
    }
}

/// Authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Decision {
    /// Whether access is allowed.
    pub allowed: bool,
    /// Matching rule.
    pub reason: DecisionReason,
}

impl Decision {
    /// Allow decision with the given reason.
    #[must_use]
    pub const fn allow(reason: DecisionReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    /// Deny decision.
    #[must_use]
    pub const fn deny() -> Self {
        Self {
            allowed: false,
            reason: DecisionReason::Denied,
        }
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Decides a requester's access to a resource owned by `owner`.
#[must_use]
pub fn decide(requester: &Identity, owner: &PrincipalId) -> Decision {
    if requester.id == *owner {
        return Decision::allow(DecisionReason::Owner);
    }
    if requester.manages(owner) {
        return Decision::allow(DecisionReason::TutorOfOwner);
    }
    if requester.permission_level.is_admin() {
        return Decision::allow(DecisionReason::Admin);
    }
    Decision::deny()
}

/// Decision engine seam used by the resource guard.
pub trait DecisionEngine: Send + Sync {
    /// Decides a requester's access to a resource owned by `owner`.
    fn decide(&self, requester: &Identity, owner: &PrincipalId) -> Decision;
}

/// The fixed owner / tutor-of-owner / admin policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipPolicy;

impl DecisionEngine for OwnershipPolicy {
    fn decide(&self, requester: &Identity, owner: &PrincipalId) -> Decision {
        decide(requester, owner)
    }
}
