// crates/lexis-core/tests/decision.rs
// ============================================================================
// Module: Decision Engine Tests
// Description: Property and scenario tests for ownership decisions.
// Purpose: Validate owner, tutor-of-owner, and admin precedence.
// ============================================================================

//! Decision engine property tests.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeSet;

use lexis_core::Decision;
use lexis_core::DecisionReason;
use lexis_core::Identity;
use lexis_core::PermissionLevel;
use lexis_core::PrincipalId;
use lexis_core::decide;
use proptest::prelude::*;

fn principal(value: &str) -> PrincipalId {
    PrincipalId::parse(value).unwrap()
}

fn identity(id: &str, level: u32, students: &[&str]) -> Identity {
    Identity::new(principal(id), PermissionLevel::new(level))
        .with_managed_students(students.iter().map(|student| principal(student)))
}

fn id_strategy() -> impl Strategy<Value = PrincipalId> {
    "[a-f0-9]{1,6}".prop_map(|value| PrincipalId::parse(&value).unwrap())
}

fn identity_strategy() -> impl Strategy<Value = Identity> {
    (id_strategy(), 0u32 .. 4, prop::collection::btree_set(id_strategy(), 0 .. 4)).prop_map(
        |(id, level, students): (PrincipalId, u32, BTreeSet<PrincipalId>)| {
            Identity::new(id, PermissionLevel::new(level)).with_managed_students(students)
        },
    )
}

// ============================================================================
// SECTION: Scenarios
// ============================================================================

#[test]
fn student_reads_own_sentence() {
    let decision = decide(&identity("7", 2, &[]), &principal("7"));
    assert_eq!(decision, Decision::allow(DecisionReason::Owner));
}

#[test]
fn tutor_reads_students_sentence() {
    let decision = decide(&identity("3", 1, &["7", "9"]), &principal("7"));
    assert_eq!(decision, Decision::allow(DecisionReason::TutorOfOwner));
}

#[test]
fn stranger_is_denied() {
    let decision = decide(&identity("4", 2, &["9"]), &principal("7"));
    assert_eq!(decision, Decision::deny());
}

#[test]
fn admin_without_relationship_is_allowed() {
    let decision = decide(&identity("1", 0, &[]), &principal("7"));
    assert_eq!(decision, Decision::allow(DecisionReason::Admin));
}

#[test]
fn owner_rule_wins_over_admin() {
    let decision = decide(&identity("7", 0, &["7"]), &principal("7"));
    assert_eq!(decision.reason, DecisionReason::Owner);
}

#[test]
fn tutor_rule_wins_over_admin() {
    let decision = decide(&identity("1", 0, &["7"]), &principal("7"));
    assert_eq!(decision.reason, DecisionReason::TutorOfOwner);
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #[test]
    fn admin_is_always_allowed(requester in identity_strategy(), owner in id_strategy()) {
        let admin = Identity { permission_level: PermissionLevel::ADMIN, ..requester };
        prop_assert!(decide(&admin, &owner).allowed);
    }

    #[test]
    fn owner_is_always_allowed(requester in identity_strategy()) {
        let owner = requester.id.clone();
        prop_assert_eq!(decide(&requester, &owner), Decision::allow(DecisionReason::Owner));
    }

    #[test]
    fn tutor_is_allowed_for_managed_students(
        requester in identity_strategy(),
        student in id_strategy(),
    ) {
        prop_assume!(student != requester.id);
        let mut tutor = requester;
        tutor.managed_students.insert(student.clone());
        prop_assert_eq!(decide(&tutor, &student), Decision::allow(DecisionReason::TutorOfOwner));
    }

    #[test]
    fn unrelated_non_admin_is_denied(
        requester in identity_strategy(),
        owner in id_strategy(),
    ) {
        prop_assume!(!requester.permission_level.is_admin());
        prop_assume!(requester.id != owner);
        prop_assume!(!requester.manages(&owner));
        prop_assert_eq!(decide(&requester, &owner), Decision::deny());
    }

    #[test]
    fn decisions_are_idempotent(requester in identity_strategy(), owner in id_strategy()) {
        let first = decide(&requester, &owner);
        let second = decide(&requester, &owner);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn string_and_integer_owner_encodings_agree(
        requester in identity_strategy(),
        raw in any::<u64>(),
    ) {
        let from_int = PrincipalId::from_json(&serde_json::json!(raw)).unwrap();
        let from_str = PrincipalId::from_json(&serde_json::json!(raw.to_string())).unwrap();
        prop_assert_eq!(decide(&requester, &from_int), decide(&requester, &from_str));
    }
}
