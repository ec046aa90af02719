//! Local (observed) repository state store.
//!
//! One entry per repository name, each holding the last-known
//! [`RepoState`] behind a single-slot gate: `update` runs the supplied
//! transformation under the entry's lock, and if a previous update is
//! still in flight the new one is dropped rather than queued. The next
//! poll cycle simply picks the repository up again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::error::{KeeperError, Result};
use crate::domain::state::{RepoProperty, RepoState};
use crate::platform::HostPlatform;

/// One repository's observed state plus its reconciliation gate.
pub struct RepoEntry {
    name: String,
    state: Mutex<RepoState>,
}

impl RepoEntry {
    fn new(name: &str, state: RepoState) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(state),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply `f` to the current state under the entry's gate.
    ///
    /// Returns `false` without running `f` when the gate is already
    /// held. `try_lock` rather than `lock`: skip, never pile up.
    pub async fn update<F, Fut>(&self, f: F) -> bool
    where
        F: FnOnce(RepoState) -> Fut,
        Fut: Future<Output = RepoState>,
    {
        let Ok(mut guard) = self.state.try_lock() else {
            debug!(repo = %self.name, "reconciliation already in flight, skipping");
            return false;
        };
        let before = guard.clone();
        *guard = f(before).await;
        true
    }

    /// Current state, waiting for any in-flight update to finish.
    pub async fn snapshot(&self) -> RepoState {
        self.state.lock().await.clone()
    }
}

/// Map of repository name → shared state entry.
#[derive(Default)]
pub struct LocalState {
    repos: Mutex<HashMap<String, Arc<RepoEntry>>>,
}

impl LocalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared entry for `name`, creating an unavailable placeholder
    /// if absent.
    pub async fn get_or_create(&self, name: &str) -> Arc<RepoEntry> {
        let mut repos = self.repos.lock().await;
        repos
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RepoEntry::new(name, RepoState::default())))
            .clone()
    }

    /// Drop entries whose name fails `keep`. Run once per cycle against
    /// the current desired-name set.
    pub async fn prune<F>(&self, keep: F)
    where
        F: Fn(&str) -> bool,
    {
        self.repos.lock().await.retain(|name, _| keep(name));
    }

    pub async fn len(&self) -> usize {
        self.repos.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.repos.lock().await.is_empty()
    }

    /// Seed the store from a full organization listing so early cycles
    /// do not mistake an existing-but-uncached repository for
    /// non-existent. Fatal on failure: without the bulk listing every
    /// known repository would look absent at startup.
    pub async fn bootstrap(platform: &dyn HostPlatform, org: &str) -> Result<Self> {
        let items = platform.list_repos(org).await.map_err(|err| {
            KeeperError::Bootstrap(format!("listing repositories of {}: {}", org, err))
        })?;

        let store = Self::new();
        {
            let mut repos = store.repos.lock().await;
            for item in items {
                let members = match platform.list_collaborators(org, &item.name).await {
                    Ok(ms) => ms.into_iter().map(|c| c.login.to_lowercase()).collect(),
                    Err(err) => {
                        warn!(repo = %item.name, error = %err, "bootstrap: listing collaborators failed");
                        Vec::new()
                    }
                };
                repos.insert(
                    item.name.clone(),
                    Arc::new(RepoEntry::new(
                        &item.name,
                        RepoState {
                            available: true,
                            members,
                            property: RepoProperty {
                                private: item.private,
                                can_comment: false,
                            },
                            ..RepoState::default()
                        },
                    )),
                );
            }
        }
        Ok(store)
    }
}
