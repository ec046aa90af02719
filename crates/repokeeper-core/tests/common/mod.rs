//! Shared test doubles: an in-memory recording platform client and a
//! counting post-create hook.

// Not every test binary uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use repokeeper_core::platform::{
    Collaborator, FileContent, GitRef, HostPlatform, Permission, PlatformError, PlatformResult,
    RemoteBranch, RemoteRepo, RepoPatch, RepoSettings, TreeEntry,
};
use repokeeper_core::registry::PostCreateHook;

/// In-memory platform backend. Every call is recorded as a formatted
/// line; specific calls can be armed to fail, and mutations can be
/// denied wholesale for idempotence checks.
#[derive(Default)]
pub struct MockPlatform {
    calls: Mutex<Vec<String>>,
    fail_prefixes: Mutex<Vec<String>>,
    deny_mutations: Mutex<bool>,

    pub tree: Mutex<Vec<TreeEntry>>,
    pub files: Mutex<HashMap<String, FileContent>>,
    repos: Mutex<HashMap<String, RemoteRepo>>,
    branches: Mutex<HashMap<String, Vec<RemoteBranch>>>,
    collaborators: Mutex<HashMap<String, Vec<Collaborator>>>,
    refs: Mutex<HashMap<String, String>>,
}

const MUTATING_VERBS: &[&str] = &[
    "create_repo",
    "update_repo",
    "add_collaborator",
    "remove_collaborator",
    "set_protection",
    "remove_protection",
    "create_branch",
    "create_file",
];

impl MockPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Arm every call whose formatted line starts with `prefix` to fail.
    pub fn fail_on(&self, prefix: &str) {
        self.fail_prefixes.lock().unwrap().push(prefix.to_string());
    }

    /// Make any further mutating call an error, for no-spurious-call
    /// assertions.
    pub fn deny_mutations(&self) {
        *self.deny_mutations.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| MUTATING_VERBS.iter().any(|v| c.starts_with(v)))
            .collect()
    }

    pub fn calls_mentioning(&self, needle: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.contains(needle))
            .collect()
    }

    /// Seed an existing repository with branches and collaborators.
    /// `logins` are `(login, admin)` pairs; the first is the owner.
    pub fn seed_repo(
        &self,
        repo: &str,
        private: bool,
        branch_list: &[(&str, bool)],
        logins: &[(&str, bool)],
    ) {
        self.repos.lock().unwrap().insert(
            repo.to_string(),
            RemoteRepo {
                name: repo.to_string(),
                owner: logins.first().map(|(l, _)| l.to_string()).unwrap_or_default(),
                private,
                description: String::new(),
            },
        );
        self.branches.lock().unwrap().insert(
            repo.to_string(),
            branch_list
                .iter()
                .map(|(name, protected)| RemoteBranch {
                    name: name.to_string(),
                    protected: *protected,
                })
                .collect(),
        );
        let mut refs = self.refs.lock().unwrap();
        for (name, _) in branch_list {
            refs.insert(format!("{}#heads/{}", repo, name), format!("sha-{}", name));
        }
        self.collaborators.lock().unwrap().insert(
            repo.to_string(),
            logins
                .iter()
                .map(|(login, admin)| Collaborator {
                    login: login.to_string(),
                    admin: *admin,
                })
                .collect(),
        );
    }

    fn record(&self, line: String) -> PlatformResult<()> {
        let mutating = MUTATING_VERBS.iter().any(|v| line.starts_with(v));
        self.calls.lock().unwrap().push(line.clone());
        if mutating && *self.deny_mutations.lock().unwrap() {
            return Err(PlatformError::Api {
                status: 500,
                message: format!("unexpected mutating call: {}", line),
            });
        }
        let armed = self.fail_prefixes.lock().unwrap();
        if armed.iter().any(|p| line.starts_with(p.as_str())) {
            return Err(PlatformError::Api {
                status: 500,
                message: format!("armed failure: {}", line),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl HostPlatform for MockPlatform {
    async fn get_directory_tree(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
    ) -> PlatformResult<Vec<TreeEntry>> {
        self.record(format!("get_tree {}/{}@{}", org, repo, branch))?;
        Ok(self.tree.lock().unwrap().clone())
    }

    async fn get_path_content(
        &self,
        org: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> PlatformResult<FileContent> {
        self.record(format!("get_content {}/{} {}@{}", org, repo, path, branch))?;
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(path.to_string()))
    }

    async fn create_file(
        &self,
        org: &str,
        repo: &str,
        path: &str,
        branch: &str,
        _message: &str,
        _sha: &str,
        content: &[u8],
    ) -> PlatformResult<()> {
        self.record(format!("create_file {}/{} {}@{}", org, repo, path, branch))?;
        self.files.lock().unwrap().insert(
            path.to_string(),
            FileContent {
                content: String::from_utf8_lossy(content).to_string(),
                sha: "patched".to_string(),
            },
        );
        Ok(())
    }

    async fn list_repos(&self, org: &str) -> PlatformResult<Vec<RemoteRepo>> {
        self.record(format!("list_repos {}", org))?;
        Ok(self.repos.lock().unwrap().values().cloned().collect())
    }

    async fn get_repo(&self, org: &str, repo: &str) -> PlatformResult<RemoteRepo> {
        self.record(format!("get_repo {}/{}", org, repo))?;
        self.repos
            .lock()
            .unwrap()
            .get(repo)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(repo.to_string()))
    }

    async fn create_repo(&self, org: &str, settings: &RepoSettings) -> PlatformResult<()> {
        self.record(format!("create_repo {}/{}", org, settings.name))?;
        let mut repos = self.repos.lock().unwrap();
        if repos.contains_key(&settings.name) {
            return Err(PlatformError::AlreadyExists(settings.name.clone()));
        }
        repos.insert(
            settings.name.clone(),
            RemoteRepo {
                name: settings.name.clone(),
                owner: "platform-owner".to_string(),
                private: settings.private,
                description: settings.description.clone(),
            },
        );
        if settings.auto_init {
            self.branches.lock().unwrap().insert(
                settings.name.clone(),
                vec![RemoteBranch {
                    name: "master".to_string(),
                    protected: false,
                }],
            );
            self.refs.lock().unwrap().insert(
                format!("{}#heads/master", settings.name),
                "sha-master".to_string(),
            );
        }
        Ok(())
    }

    async fn update_repo(&self, org: &str, repo: &str, patch: &RepoPatch) -> PlatformResult<()> {
        self.record(format!(
            "update_repo {}/{} name={:?} private={:?}",
            org, repo, patch.name, patch.private
        ))?;
        let mut repos = self.repos.lock().unwrap();
        let Some(mut current) = repos.remove(repo) else {
            return Err(PlatformError::NotFound(repo.to_string()));
        };
        if let Some(name) = &patch.name {
            current.name = name.clone();
        }
        if let Some(private) = patch.private {
            current.private = private;
        }
        let new_name = current.name.clone();
        repos.insert(new_name.clone(), current);
        drop(repos);
        if new_name != repo {
            // Carry branches, refs, and collaborators across a rename.
            let mut branches = self.branches.lock().unwrap();
            if let Some(b) = branches.remove(repo) {
                branches.insert(new_name.clone(), b);
            }
            drop(branches);
            let mut collabs = self.collaborators.lock().unwrap();
            if let Some(c) = collabs.remove(repo) {
                collabs.insert(new_name.clone(), c);
            }
            drop(collabs);
            let mut refs = self.refs.lock().unwrap();
            let moved: Vec<(String, String)> = refs
                .iter()
                .filter(|(k, _)| k.starts_with(&format!("{}#", repo)))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            for (k, v) in moved {
                refs.remove(&k);
                let suffix = k.split_once('#').map(|(_, s)| s.to_string()).unwrap_or(k);
                refs.insert(format!("{}#{}", new_name, suffix), v);
            }
        }
        Ok(())
    }

    async fn list_collaborators(
        &self,
        org: &str,
        repo: &str,
    ) -> PlatformResult<Vec<Collaborator>> {
        self.record(format!("list_collaborators {}/{}", org, repo))?;
        Ok(self
            .collaborators
            .lock()
            .unwrap()
            .get(repo)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_collaborator(
        &self,
        org: &str,
        repo: &str,
        login: &str,
        permission: Permission,
    ) -> PlatformResult<()> {
        self.record(format!(
            "add_collaborator {}/{} {} {}",
            org,
            repo,
            login,
            permission.as_str()
        ))?;
        let mut collabs = self.collaborators.lock().unwrap();
        let list = collabs.entry(repo.to_string()).or_default();
        let admin = matches!(permission, Permission::Maintain);
        match list.iter_mut().find(|c| c.login == login) {
            Some(c) => c.admin = admin,
            None => list.push(Collaborator {
                login: login.to_string(),
                admin,
            }),
        }
        Ok(())
    }

    async fn remove_collaborator(
        &self,
        org: &str,
        repo: &str,
        login: &str,
    ) -> PlatformResult<()> {
        self.record(format!("remove_collaborator {}/{} {}", org, repo, login))?;
        if let Some(list) = self.collaborators.lock().unwrap().get_mut(repo) {
            list.retain(|c| c.login != login);
        }
        Ok(())
    }

    async fn set_branch_protection(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
    ) -> PlatformResult<()> {
        self.record(format!("set_protection {}/{} {}", org, repo, branch))?;
        if let Some(list) = self.branches.lock().unwrap().get_mut(repo) {
            if let Some(b) = list.iter_mut().find(|b| b.name == branch) {
                b.protected = true;
                return Ok(());
            }
        }
        Err(PlatformError::NotFound(branch.to_string()))
    }

    async fn remove_branch_protection(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
    ) -> PlatformResult<()> {
        self.record(format!("remove_protection {}/{} {}", org, repo, branch))?;
        if let Some(list) = self.branches.lock().unwrap().get_mut(repo) {
            if let Some(b) = list.iter_mut().find(|b| b.name == branch) {
                b.protected = false;
                return Ok(());
            }
        }
        Err(PlatformError::NotFound(branch.to_string()))
    }

    async fn get_ref(&self, org: &str, repo: &str, r: &str) -> PlatformResult<GitRef> {
        self.record(format!("get_ref {}/{} {}", org, repo, r))?;
        self.refs
            .lock()
            .unwrap()
            .get(&format!("{}#{}", repo, r))
            .map(|sha| GitRef {
                ref_name: r.to_string(),
                sha: sha.clone(),
            })
            .ok_or_else(|| PlatformError::NotFound(r.to_string()))
    }

    async fn create_branch(
        &self,
        org: &str,
        repo: &str,
        ref_name: &str,
        sha: &str,
    ) -> PlatformResult<()> {
        self.record(format!("create_branch {}/{} {}", org, repo, ref_name))?;
        let name = ref_name.trim_start_matches("refs/heads/").to_string();
        let key = format!("{}#heads/{}", repo, name);
        let mut refs = self.refs.lock().unwrap();
        if refs.contains_key(&key) {
            return Err(PlatformError::AlreadyExists(ref_name.to_string()));
        }
        refs.insert(key, sha.to_string());
        self.branches
            .lock()
            .unwrap()
            .entry(repo.to_string())
            .or_default()
            .push(RemoteBranch {
                name,
                protected: false,
            });
        Ok(())
    }

    async fn list_branches(&self, org: &str, repo: &str) -> PlatformResult<Vec<RemoteBranch>> {
        self.record(format!("list_branches {}/{}", org, repo))?;
        Ok(self
            .branches
            .lock()
            .unwrap()
            .get(repo)
            .cloned()
            .unwrap_or_default())
    }
}

/// Counts post-create invocations and remembers the repository names.
#[derive(Default)]
pub struct CountingHook {
    count: AtomicUsize,
    pub names: Mutex<Vec<String>>,
}

impl CountingHook {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PostCreateHook for CountingHook {
    async fn repo_created(&self, repo: &str) {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.names.lock().unwrap().push(repo.to_string());
    }
}

/// Reserved-login set helper.
pub fn reserved(logins: &[&str]) -> HashSet<String> {
    logins.iter().map(|s| s.to_string()).collect()
}

use repokeeper_core::domain::manifest::{BranchSpec, RepoManifest};
use repokeeper_core::reconcile::RepoTarget;

pub fn manifest(name: &str, visibility: &str, branches: Vec<BranchSpec>) -> RepoManifest {
    RepoManifest {
        name: name.to_string(),
        visibility: visibility.to_string(),
        platform: "github".to_string(),
        branches,
        ..RepoManifest::default()
    }
}

pub fn target(manifest: RepoManifest, owners: &[&str], admins: &[&str]) -> RepoTarget {
    RepoTarget {
        manifest: Arc::new(manifest),
        owners: owners.iter().map(|s| s.to_string()).collect(),
        admins: admins.iter().map(|s| s.to_string()).collect(),
    }
}
