//! Collaborator membership reconciliation: plain and elevated tiers.
//!
//! Every add/remove/promote/demote is independent: one identifier's
//! failure is logged and its prior state retained, the rest continue.
//! The repository owner and the configured reserved automation logins
//! are never removed or demoted.

use std::collections::HashSet;
use tracing::{error, info};

use crate::platform::{HostPlatform, Permission};

/// The membership sets produced by one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberOutcome {
    pub members: Vec<String>,
    pub admins: Vec<String>,
    pub owner: String,
}

/// Converge collaborators of `org/repo` toward the desired sets.
///
/// `owner` is cached in observed state and fetched lazily, at most once,
/// when a removal or demotion needs it.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn reconcile_members(
    platform: &dyn HostPlatform,
    org: &str,
    repo: &str,
    desired_members: &[String],
    desired_admins: &[String],
    mut observed_members: Vec<String>,
    mut observed_admins: Vec<String>,
    mut owner: String,
    reserved: &HashSet<String>,
) -> MemberOutcome {
    if observed_members.is_empty() {
        match platform.list_collaborators(org, repo).await {
            Ok(collabs) if !collabs.is_empty() => {
                observed_members = collabs.iter().map(|c| c.login.to_lowercase()).collect();
            }
            Ok(_) => {
                error!(repo = %repo, "collaborator listing came back empty, abandoning member step");
                return MemberOutcome {
                    owner,
                    ..MemberOutcome::default()
                };
            }
            Err(err) => {
                error!(repo = %repo, error = %err, "listing collaborators failed, abandoning member step");
                return MemberOutcome {
                    owner,
                    ..MemberOutcome::default()
                };
            }
        }
    }

    let expect: HashSet<String> = desired_members.iter().map(|s| s.to_lowercase()).collect();
    let local: HashSet<String> = observed_members.iter().map(|s| s.to_lowercase()).collect();

    let expect_admins: HashSet<String> = desired_admins.iter().map(|s| s.to_lowercase()).collect();
    if !expect_admins.is_empty() && observed_admins.is_empty() {
        match platform.list_collaborators(org, repo).await {
            Ok(collabs) => {
                observed_admins = collabs
                    .iter()
                    .filter(|c| c.admin)
                    .map(|c| c.login.to_lowercase())
                    .collect();
            }
            Err(err) => {
                error!(repo = %repo, error = %err, "listing admin collaborators failed");
            }
        }
    }
    let local_admins: HashSet<String> =
        observed_admins.iter().map(|s| s.to_lowercase()).collect();

    let mut members: HashSet<String> = expect.intersection(&local).cloned().collect();
    let mut admins: HashSet<String> =
        expect_admins.intersection(&local_admins).cloned().collect();

    // Add missing plain collaborators. Adding an existing one is
    // idempotent on the platform side.
    for login in expect.difference(&local) {
        info!(repo = %repo, login = %login, "adding collaborator");
        match platform
            .add_collaborator(org, repo, login, Permission::Push)
            .await
        {
            Ok(()) => {
                members.insert(login.clone());
            }
            Err(err) => error!(repo = %repo, login = %login, error = %err, "adding collaborator failed"),
        }
    }

    // Remove undesired plain collaborators, never the owner or a
    // reserved automation login.
    let mut to_remove: Vec<&String> = local.difference(&expect).collect();
    to_remove.sort();
    if !to_remove.is_empty() {
        resolve_owner(platform, org, repo, &mut owner).await;
    }
    if !to_remove.is_empty() && owner.is_empty() {
        // The owner must never be swept up in a removal. With the owner
        // unknown, retain everything and retry next cycle.
        for login in to_remove.drain(..) {
            members.insert(login.clone());
        }
    }
    for login in to_remove {
        if login == &owner || reserved.contains(login) {
            continue;
        }
        info!(repo = %repo, login = %login, "removing collaborator");
        if let Err(err) = platform.remove_collaborator(org, repo, login).await {
            error!(repo = %repo, login = %login, error = %err, "removing collaborator failed");
            members.insert(login.clone());
        }
    }

    // Promote: the platform models permission as set-on-add, so promote
    // by removing plain membership and re-adding at the elevated tier.
    for login in expect_admins.difference(&local_admins) {
        if !expect.contains(login) {
            continue;
        }
        info!(repo = %repo, login = %login, "promoting collaborator to admin");
        if let Err(err) = platform.remove_collaborator(org, repo, login).await {
            error!(repo = %repo, login = %login, error = %err, "removing collaborator before promotion failed");
        }
        match platform
            .add_collaborator(org, repo, login, Permission::Maintain)
            .await
        {
            Ok(()) => {
                admins.insert(login.clone());
            }
            Err(err) => {
                error!(repo = %repo, login = %login, error = %err, "re-adding collaborator as admin failed");
            }
        }
        // Intentional: the login leaves the recorded plain set in either
        // case. If the elevated add failed, the next cycle sees the
        // login as absent and re-adds it.
        members.remove(login);
    }

    // Demote: remove admin membership and re-add at the plain tier,
    // skipping the owner and reserved automation logins.
    let mut to_demote: Vec<&String> = local_admins.difference(&expect_admins).collect();
    to_demote.sort();
    to_demote.retain(|login| expect.contains(*login));
    if !to_demote.is_empty() {
        resolve_owner(platform, org, repo, &mut owner).await;
    }
    if !to_demote.is_empty() && owner.is_empty() {
        for login in to_demote.drain(..) {
            admins.insert(login.clone());
        }
    }
    for login in to_demote {
        if login == &owner || reserved.contains(login) {
            continue;
        }
        info!(repo = %repo, login = %login, "demoting admin to collaborator");
        if let Err(err) = platform.remove_collaborator(org, repo, login).await {
            error!(repo = %repo, login = %login, error = %err, "removing admin failed");
            admins.insert(login.clone());
            continue;
        }
        match platform
            .add_collaborator(org, repo, login, Permission::Push)
            .await
        {
            Ok(()) => {
                members.insert(login.clone());
            }
            Err(err) => {
                error!(repo = %repo, login = %login, error = %err, "re-adding demoted admin failed");
            }
        }
    }

    let mut members: Vec<String> = members.into_iter().collect();
    members.sort();
    let mut admins: Vec<String> = admins.into_iter().collect();
    admins.sort();

    MemberOutcome {
        members,
        admins,
        owner,
    }
}

/// Fetch the repository owner login if not yet cached. Removal and
/// demotion loops must not run with an unknown owner.
async fn resolve_owner(platform: &dyn HostPlatform, org: &str, repo: &str, owner: &mut String) {
    if !owner.is_empty() {
        return;
    }
    match platform.get_repo(org, repo).await {
        Ok(remote) => *owner = remote.owner.to_lowercase(),
        Err(err) => {
            error!(repo = %repo, error = %err, "resolving repository owner failed");
        }
    }
}
