mod common;

use std::sync::Arc;

use common::{manifest, reserved, target, CountingHook, MockPlatform};
use repokeeper_core::domain::state::{BranchRecord, RepoState};
use repokeeper_core::domain::manifest::{BranchKind, DEFAULT_BRANCH};
use repokeeper_core::reconcile::RepoReconciler;

fn reconciler(platform: Arc<MockPlatform>) -> RepoReconciler {
    RepoReconciler::new(platform, "openeuler", reserved(&[]), CountingHook::new())
}

fn reconciler_reserving(platform: Arc<MockPlatform>, logins: &[&str]) -> RepoReconciler {
    RepoReconciler::new(platform, "openeuler", reserved(logins), CountingHook::new())
}

/// Converge-path fixture with the branch step pre-satisfied, so only
/// member calls show up in the log.
fn before_with(members: &[&str], admins: &[&str], owner: &str) -> RepoState {
    RepoState {
        available: true,
        branches: vec![BranchRecord::new(DEFAULT_BRANCH, BranchKind::Plain)],
        members: members.iter().map(|s| s.to_string()).collect(),
        admins: admins.iter().map(|s| s.to_string()).collect(),
        owner: owner.to_string(),
        ..RepoState::default()
    }
}

#[tokio::test]
async fn owner_is_never_removed_or_demoted() {
    let platform = MockPlatform::new();
    platform.seed_repo(
        "kernel",
        false,
        &[(DEFAULT_BRANCH, false)],
        &[("carol", false), ("bob", true)],
    );

    // bob loses admin, carol (the owner) is undesired entirely.
    let target = target(manifest("kernel", "public", Vec::new()), &["bob"], &[]);
    let before = before_with(&["bob", "carol"], &["bob"], "carol");

    let after = reconciler(platform.clone()).apply(&target, before).await;

    assert!(platform.calls_mentioning("carol").is_empty(), "{:?}", platform.calls());

    let bob_calls = platform.calls_mentioning("bob");
    assert_eq!(
        bob_calls,
        vec![
            "remove_collaborator openeuler/kernel bob".to_string(),
            "add_collaborator openeuler/kernel bob push".to_string(),
        ]
    );

    assert_eq!(after.members, vec!["bob"]);
    assert!(after.admins.is_empty());
    assert_eq!(after.owner, "carol");
}

#[tokio::test]
async fn promotion_removes_then_re_adds_elevated() {
    let platform = MockPlatform::new();
    platform.seed_repo(
        "kernel",
        false,
        &[(DEFAULT_BRANCH, false)],
        &[("alice", false), ("bob", false)],
    );

    let target = target(
        manifest("kernel", "public", Vec::new()),
        &["alice", "bob"],
        &["bob"],
    );
    let before = before_with(&["alice", "bob"], &[], "alice");

    let after = reconciler(platform.clone()).apply(&target, before).await;

    assert_eq!(
        platform.calls_mentioning("bob"),
        vec![
            "remove_collaborator openeuler/kernel bob".to_string(),
            "add_collaborator openeuler/kernel bob maintain".to_string(),
        ]
    );

    assert_eq!(after.admins, vec!["bob"]);
    assert!(!after.members.contains(&"bob".to_string()));
}

#[tokio::test]
async fn promotion_add_failure_leaves_login_in_neither_set() {
    let platform = MockPlatform::new();
    platform.seed_repo(
        "kernel",
        false,
        &[(DEFAULT_BRANCH, false)],
        &[("alice", false), ("bob", false)],
    );
    platform.fail_on("add_collaborator openeuler/kernel bob");

    let target = target(
        manifest("kernel", "public", Vec::new()),
        &["alice", "bob"],
        &["bob"],
    );
    let before = before_with(&["alice", "bob"], &[], "alice");

    let after = reconciler(platform.clone()).apply(&target, before).await;

    // Absent from both sets: the next cycle sees bob missing and
    // re-drives the promotion from the add step.
    assert!(!after.members.contains(&"bob".to_string()));
    assert!(!after.admins.contains(&"bob".to_string()));
}

#[tokio::test]
async fn removal_failure_retains_member() {
    let platform = MockPlatform::new();
    platform.seed_repo(
        "kernel",
        false,
        &[(DEFAULT_BRANCH, false)],
        &[("alice", false), ("eve", false)],
    );
    platform.fail_on("remove_collaborator openeuler/kernel eve");

    let target = target(manifest("kernel", "public", Vec::new()), &["alice"], &[]);
    let before = before_with(&["alice", "eve"], &[], "alice");

    let after = reconciler(platform.clone()).apply(&target, before).await;

    assert_eq!(platform.calls_mentioning("remove_collaborator").len(), 1);
    assert!(after.members.contains(&"eve".to_string()));
}

#[tokio::test]
async fn unknown_owner_blocks_all_removals() {
    let platform = MockPlatform::new();
    platform.seed_repo(
        "kernel",
        false,
        &[(DEFAULT_BRANCH, false)],
        &[("alice", false), ("eve", false)],
    );
    platform.fail_on("get_repo");

    let target = target(manifest("kernel", "public", Vec::new()), &["alice"], &[]);
    let before = before_with(&["alice", "eve"], &[], "");

    let after = reconciler(platform.clone()).apply(&target, before).await;

    assert!(platform.calls_mentioning("remove_collaborator").is_empty());
    assert!(after.members.contains(&"eve".to_string()));
}

#[tokio::test]
async fn add_failure_does_not_stop_other_adds() {
    let platform = MockPlatform::new();
    platform.seed_repo("kernel", false, &[(DEFAULT_BRANCH, false)], &[("dave", false)]);
    platform.fail_on("add_collaborator openeuler/kernel bob");

    let target = target(
        manifest("kernel", "public", Vec::new()),
        &["bob", "carol", "dave"],
        &[],
    );
    let before = before_with(&["dave"], &[], "dave");

    let after = reconciler(platform.clone()).apply(&target, before).await;

    assert_eq!(after.members, vec!["carol", "dave"]);
}

#[tokio::test]
async fn reserved_login_is_untouchable() {
    let platform = MockPlatform::new();
    platform.seed_repo(
        "kernel",
        false,
        &[(DEFAULT_BRANCH, false)],
        &[("alice", false), ("ci-bot", false)],
    );

    let target = target(manifest("kernel", "public", Vec::new()), &["alice"], &[]);
    let before = before_with(&["alice", "ci-bot"], &[], "alice");

    let after = reconciler_reserving(platform.clone(), &["ci-bot"])
        .apply(&target, before)
        .await;

    assert!(platform.calls_mentioning("ci-bot").is_empty(), "{:?}", platform.calls());
    assert!(!after.members.contains(&"ci-bot".to_string()));
}

#[tokio::test]
async fn empty_collaborator_listing_abandons_member_step() {
    let platform = MockPlatform::new();
    // Repo exists but its collaborator listing comes back empty, which
    // can only be a platform anomaly. Nothing is mutated.
    platform.seed_repo("kernel", false, &[(DEFAULT_BRANCH, false)], &[]);

    let target = target(manifest("kernel", "public", Vec::new()), &["alice"], &[]);
    let before = RepoState {
        available: true,
        branches: vec![BranchRecord::new(DEFAULT_BRANCH, BranchKind::Plain)],
        owner: "alice".to_string(),
        ..RepoState::default()
    };

    let after = reconciler(platform.clone()).apply(&target, before).await;

    assert!(platform.calls_mentioning("add_collaborator").is_empty());
    assert!(after.members.is_empty());
    assert!(after.admins.is_empty());
    assert_eq!(after.owner, "alice");
}

#[tokio::test]
async fn logins_are_compared_case_insensitively() {
    let platform = MockPlatform::new();
    platform.seed_repo("kernel", false, &[(DEFAULT_BRANCH, false)], &[("alice", false)]);

    // Mixed-case desired id matches the lowercased observed login; no
    // add call is issued.
    let target = target(manifest("kernel", "public", Vec::new()), &["Alice"], &[]);
    let before = before_with(&["alice"], &[], "alice");

    let after = reconciler(platform.clone()).apply(&target, before).await;

    assert!(platform.mutating_calls().is_empty(), "{:?}", platform.calls());
    assert_eq!(after.members, vec!["alice"]);
}
