//! Repository lifecycle state machine.
//!
//! Evaluated once per repository per cycle: an unavailable repository is
//! created (or renamed from its declared source), an available one is
//! converged in place. Every path is idempotent under partial failure;
//! whatever could not be finished this cycle is retried on the next.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::manifest::{BranchKind, RepoManifest, DEFAULT_BRANCH};
use crate::domain::state::{BranchRecord, RepoProperty, RepoState};
use crate::platform::{HostPlatform, PlatformError, RepoPatch, RepoSettings};
use crate::reconcile::branch::{create_branch, reconcile_branches, update_protection};
use crate::reconcile::member::reconcile_members;
use crate::registry::PostCreateHook;

/// Desired target for one reconciliation task, ownership already
/// translated to platform logins.
#[derive(Debug, Clone)]
pub struct RepoTarget {
    pub manifest: Arc<RepoManifest>,
    pub owners: Vec<String>,
    pub admins: Vec<String>,
}

/// Whether this reconciler should touch the repository at all.
///
/// A manifest carrying an external-hosting marker, or declaring a
/// different platform, leaves the repository entirely alone.
pub fn should_process(manifest: &RepoManifest, platform: &str) -> bool {
    if !manifest.repository_url.is_empty() {
        info!(repo = %manifest.name, url = %manifest.repository_url,
              "hosted on another platform, skipping");
        return false;
    }
    manifest.platform == platform
}

/// Drives creation, rename, and in-place convergence of repositories.
pub struct RepoReconciler {
    platform: Arc<dyn HostPlatform>,
    org: String,
    reserved: HashSet<String>,
    hook: Arc<dyn PostCreateHook>,
}

impl RepoReconciler {
    pub fn new(
        platform: Arc<dyn HostPlatform>,
        org: &str,
        reserved: HashSet<String>,
        hook: Arc<dyn PostCreateHook>,
    ) -> Self {
        Self {
            platform,
            org: org.to_string(),
            reserved,
            hook,
        }
    }

    /// One lifecycle evaluation: `before` in, new observed state out.
    pub async fn apply(&self, target: &RepoTarget, before: RepoState) -> RepoState {
        if !before.available {
            self.create(target).await
        } else {
            self.converge(target, before).await
        }
    }

    /// Converge an available repository in place.
    async fn converge(&self, target: &RepoTarget, before: RepoState) -> RepoState {
        let repo = &target.manifest.name;

        let outcome = reconcile_members(
            &*self.platform,
            &self.org,
            repo,
            &target.owners,
            &target.admins,
            before.members,
            before.admins,
            before.owner,
            &self.reserved,
        )
        .await;

        let branches = reconcile_branches(
            &*self.platform,
            &self.org,
            repo,
            &target.manifest.branches,
            before.branches,
        )
        .await;

        let property = self.update_property(target, before.property).await;

        RepoState {
            available: true,
            branches,
            members: outcome.members,
            admins: outcome.admins,
            owner: outcome.owner,
            property,
        }
    }

    /// Create path for a repository the engine believes absent.
    async fn create(&self, target: &RepoTarget) -> RepoState {
        let manifest = &target.manifest;
        let repo = &manifest.name;

        if let Some(from) = manifest.rename_from.as_deref() {
            if from != repo {
                return self.rename(target, from).await;
            }
        }

        info!(repo = %repo, "creating repository");

        let settings = RepoSettings {
            name: repo.clone(),
            description: manifest.description.clone(),
            private: manifest.is_private(),
            // auto_init makes the platform seed the default branch.
            auto_init: true,
            has_issues: true,
            has_wiki: true,
        };

        if let Err(err) = self.platform.create_repo(&self.org, &settings).await {
            if matches!(err, PlatformError::AlreadyExists(_)) {
                warn!(repo = %repo, "repository exists already, converging instead");
            } else {
                error!(repo = %repo, error = %err, "creating repository failed");
            }

            // Self-heal a stale absent-cache entry: the repository may
            // exist remotely even when the create call failed for other
            // reasons.
            if let Some(state) = self.lookup_existing(repo).await {
                return self.converge_found(target, state).await;
            }
            return RepoState::default();
        }

        let (branches, members) = self.init_new_repo(target).await;

        let state = RepoState {
            available: true,
            branches,
            members,
            admins: Vec::new(),
            owner: String::new(),
            property: RepoProperty {
                private: manifest.is_private(),
                can_comment: manifest.commentable,
            },
        };

        // Clean create only; fallback converge and rename never re-invoke.
        self.hook.repo_created(repo).await;

        state
    }

    /// Initialize a freshly created repository: the platform default
    /// branch (re-protected if the manifest demands it), every other
    /// declared branch, and the desired owners as plain collaborators.
    async fn init_new_repo(&self, target: &RepoTarget) -> (Vec<BranchRecord>, Vec<String>) {
        let repo = &target.manifest.name;

        let mut branches = vec![BranchRecord::new(DEFAULT_BRANCH, BranchKind::Plain)];
        for spec in &target.manifest.branches {
            if spec.name == DEFAULT_BRANCH {
                if spec.kind != BranchKind::Protected {
                    continue;
                }
                match update_protection(&*self.platform, &self.org, repo, &spec.name, true).await {
                    Ok(()) => branches[0].kind = BranchKind::Protected,
                    Err(err) => {
                        error!(repo = %repo, branch = %spec.name, error = %err,
                               "protecting default branch failed");
                    }
                }
            } else if let Some(record) =
                create_branch(&*self.platform, &self.org, repo, spec).await
            {
                branches.push(record);
            }
        }

        let mut members = Vec::new();
        for login in &target.owners {
            match self
                .platform
                .add_collaborator(&self.org, repo, login, crate::platform::Permission::Push)
                .await
            {
                Ok(()) => members.push(login.clone()),
                Err(err) => {
                    error!(repo = %repo, login = %login, error = %err, "adding initial collaborator failed");
                }
            }
        }

        (branches, members)
    }

    /// Rename path: issue the rename, then look the target up and
    /// converge it. The lookup runs even when the rename call failed, to
    /// catch a rename that partially succeeded.
    async fn rename(&self, target: &RepoTarget, from: &str) -> RepoState {
        let repo = &target.manifest.name;

        info!(repo = %repo, from = %from, "renaming repository");

        let rename_err = self
            .platform
            .update_repo(
                &self.org,
                from,
                &RepoPatch {
                    name: Some(repo.clone()),
                    description: Some(target.manifest.description.clone()),
                    private: None,
                },
            )
            .await
            .err();

        if let Some(state) = self.lookup_existing(repo).await {
            return self.converge_found(target, state).await;
        }

        match rename_err {
            Some(err) => {
                error!(repo = %repo, from = %from, error = %err, "renaming repository failed");
                RepoState::default()
            }
            None => RepoState {
                available: true,
                ..RepoState::default()
            },
        }
    }

    /// Branch and member convergence for a repository found by lookup
    /// during a create/rename fallback.
    async fn converge_found(&self, target: &RepoTarget, mut state: RepoState) -> RepoState {
        let repo = &target.manifest.name;

        let outcome = reconcile_members(
            &*self.platform,
            &self.org,
            repo,
            &target.owners,
            &target.admins,
            state.members,
            state.admins,
            state.owner,
            &self.reserved,
        )
        .await;
        state.members = outcome.members;
        state.admins = outcome.admins;
        state.owner = outcome.owner;

        state.branches = reconcile_branches(
            &*self.platform,
            &self.org,
            repo,
            &target.manifest.branches,
            state.branches,
        )
        .await;

        state
    }

    /// Fetch the full observed state of an existing repository.
    async fn lookup_existing(&self, repo: &str) -> Option<RepoState> {
        let remote = match self.platform.get_repo(&self.org, repo).await {
            Ok(r) => r,
            Err(err) => {
                error!(repo = %repo, error = %err, "looking up repository failed");
                return None;
            }
        };

        let mut state = RepoState {
            available: true,
            owner: remote.owner.to_lowercase(),
            property: RepoProperty {
                private: remote.private,
                can_comment: false,
            },
            ..RepoState::default()
        };

        match self.platform.list_collaborators(&self.org, repo).await {
            Ok(collabs) => {
                state.members = collabs.iter().map(|c| c.login.to_lowercase()).collect();
                state.admins = collabs
                    .iter()
                    .filter(|c| c.admin)
                    .map(|c| c.login.to_lowercase())
                    .collect();
            }
            Err(err) => {
                error!(repo = %repo, error = %err, "listing collaborators failed");
            }
        }

        match crate::reconcile::branch::list_observed_branches(&*self.platform, &self.org, repo)
            .await
        {
            Ok(branches) => state.branches = branches,
            Err(err) => {
                error!(repo = %repo, error = %err, "listing branches failed");
            }
        }

        Some(state)
    }

    /// Property reconciliation: visibility only. Description and
    /// comment-ability are not mutated after creation.
    async fn update_property(&self, target: &RepoTarget, current: RepoProperty) -> RepoProperty {
        let repo = &target.manifest.name;
        let desired_private = target.manifest.is_private();

        if desired_private == current.private {
            return current;
        }

        info!(repo = %repo, private = desired_private, "updating repository visibility");
        match self
            .platform
            .update_repo(
                &self.org,
                repo,
                &RepoPatch {
                    name: Some(repo.clone()),
                    description: None,
                    private: Some(desired_private),
                },
            )
            .await
        {
            Ok(()) => RepoProperty {
                private: desired_private,
                can_comment: current.can_comment,
            },
            Err(err) => {
                error!(repo = %repo, private = desired_private, error = %err,
                       "updating repository visibility failed");
                current
            }
        }
    }
}
