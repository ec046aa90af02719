//! Branch reconciliation: diff desired vs. observed branch sets and issue
//! the minimal create/protection calls.
//!
//! Branches are never deleted. Observed-only branches are left untouched
//! on the platform and excluded from the returned record: only branches
//! the desired set has ever declared are tracked.

use std::collections::HashMap;
use tracing::{error, info, warn};

use crate::domain::manifest::{BranchKind, BranchSpec, DEFAULT_BRANCH};
use crate::domain::state::BranchRecord;
use crate::platform::HostPlatform;

/// Converge the branch set of `org/repo` and return the new record.
///
/// `observed` is the cached branch list; when empty it is fetched live.
/// Mutation failures retain the observed record for the affected branch;
/// the next cycle retries.
pub(crate) async fn reconcile_branches(
    platform: &dyn HostPlatform,
    org: &str,
    repo: &str,
    desired: &[BranchSpec],
    mut observed: Vec<BranchRecord>,
) -> Vec<BranchRecord> {
    if observed.is_empty() {
        observed = match list_observed_branches(platform, org, repo).await {
            Ok(v) => v,
            Err(err) => {
                error!(repo = %repo, error = %err, "listing branches failed, abandoning branch step");
                return Vec::new();
            }
        };
    }

    let desired_by_name: HashMap<&str, &BranchSpec> =
        desired.iter().map(|b| (b.name.as_str(), b)).collect();
    let observed_by_name: HashMap<&str, &BranchRecord> =
        observed.iter().map(|b| (b.name.as_str(), b)).collect();

    let mut new_state = Vec::new();

    for (name, spec) in &desired_by_name {
        match observed_by_name.get(name) {
            Some(record) => {
                new_state.push(converge_existing(platform, org, repo, spec, record).await);
            }
            None => {
                if let Some(record) = create_branch(platform, org, repo, spec).await {
                    new_state.push(record);
                }
            }
        }
    }

    new_state.sort_by(|a, b| a.name.cmp(&b.name));
    new_state
}

/// Converge protection of a branch present on both sides.
async fn converge_existing(
    platform: &dyn HostPlatform,
    org: &str,
    repo: &str,
    spec: &BranchSpec,
    record: &BranchRecord,
) -> BranchRecord {
    if spec.kind == record.kind {
        return record.clone();
    }

    // Readonly is a bookkeeping-only marker, not an enforceable platform
    // setting: adopt the desired record without any call.
    if spec.kind == BranchKind::Readonly {
        return desired_record(spec);
    }

    info!(repo = %repo, branch = %spec.name, kind = ?spec.kind, "updating branch protection");
    match update_protection(platform, org, repo, &spec.name, spec.kind == BranchKind::Protected)
        .await
    {
        Ok(()) => desired_record(spec),
        Err(err) => {
            error!(repo = %repo, branch = %spec.name, kind = ?spec.kind, error = %err,
                   "updating branch protection failed");
            record.clone()
        }
    }
}

/// Create a desired-only branch from its source ref. Returns the new
/// record, or `None` when creation failed.
pub(crate) async fn create_branch(
    platform: &dyn HostPlatform,
    org: &str,
    repo: &str,
    spec: &BranchSpec,
) -> Option<BranchRecord> {
    let source = spec.create_from.as_deref().unwrap_or(DEFAULT_BRANCH);

    info!(repo = %repo, branch = %spec.name, from = %source, "creating branch");

    let src_ref = match platform.get_ref(org, repo, &format!("heads/{}", source)).await {
        Ok(r) => r,
        Err(err) => {
            error!(repo = %repo, branch = %spec.name, from = %source, error = %err,
                   "resolving creation source ref failed");
            return None;
        }
    };

    let ref_name = format!("refs/heads/{}", spec.name);
    if let Err(err) = platform.create_branch(org, repo, &ref_name, &src_ref.sha).await {
        // Benign race: a concurrent actor may have created the ref.
        if platform
            .get_ref(org, repo, &format!("heads/{}", spec.name))
            .await
            .is_err()
        {
            error!(repo = %repo, branch = %spec.name, from = %source, error = %err,
                   "creating branch failed");
            return None;
        }
    }

    if spec.kind == BranchKind::Protected {
        if let Err(err) = platform.set_branch_protection(org, repo, &spec.name).await {
            // The branch exists; losing its record over a protection
            // failure would orphan it. Record it unprotected instead.
            warn!(repo = %repo, branch = %spec.name, error = %err,
                  "protecting newly created branch failed, recording it unprotected");
            return Some(BranchRecord {
                name: spec.name.clone(),
                kind: BranchKind::Plain,
                create_from: Some(source.to_string()),
            });
        }
    }

    Some(desired_record(spec))
}

/// Set or remove platform protection to match the desired kind.
pub(crate) async fn update_protection(
    platform: &dyn HostPlatform,
    org: &str,
    repo: &str,
    branch: &str,
    protected: bool,
) -> crate::platform::PlatformResult<()> {
    if protected {
        platform.set_branch_protection(org, repo, branch).await
    } else {
        platform.remove_branch_protection(org, repo, branch).await
    }
}

pub(crate) async fn list_observed_branches(
    platform: &dyn HostPlatform,
    org: &str,
    repo: &str,
) -> crate::platform::PlatformResult<Vec<BranchRecord>> {
    let items = platform.list_branches(org, repo).await?;
    Ok(items
        .into_iter()
        .map(|b| BranchRecord {
            name: b.name,
            kind: if b.protected {
                BranchKind::Protected
            } else {
                BranchKind::Plain
            },
            create_from: None,
        })
        .collect())
}

fn desired_record(spec: &BranchSpec) -> BranchRecord {
    BranchRecord {
        name: spec.name.clone(),
        kind: spec.kind,
        create_from: spec.create_from.clone(),
    }
}
