//! Static configuration for the reconciliation engine.
//!
//! Loaded once at startup from a YAML file; invalid configuration is a
//! fatal startup error.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::domain::error::{KeeperError, Result};

/// Coordinates of one repository/branch on the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoCoordinates {
    pub org: String,
    pub repo: String,
    pub branch: String,
}

impl RepoCoordinates {
    fn validate(&self, what: &str) -> Result<()> {
        if self.org.is_empty() || self.repo.is_empty() || self.branch.is_empty() {
            return Err(KeeperError::Config(format!(
                "{}: org, repo and branch are all required",
                what
            )));
        }
        Ok(())
    }
}

/// The tracking repository holding manifests and ownership files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchingFiles {
    #[serde(flatten)]
    pub coordinates: RepoCoordinates,
    /// Organization segment manifests must carry in their path
    /// (`<group_dir>/<group>/<repo_org>/<shard>/<repo>.yaml`).
    pub repo_org: String,
    /// Root directory of the group tree, e.g. `sig`.
    pub group_dir: String,
}

impl WatchingFiles {
    fn validate(&self) -> Result<()> {
        self.coordinates.validate("watching_files")?;
        if self.repo_org.is_empty() {
            return Err(KeeperError::Config(
                "watching_files: repo_org is required".to_string(),
            ));
        }
        if self.group_dir.is_empty() {
            return Err(KeeperError::Config(
                "watching_files: group_dir is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Target of the post-create registry patch: a shared YAML document that
/// newly created repositories are appended to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryPatch {
    pub target: RepoCoordinates,
    /// Directory containing the registry document.
    pub dir: String,
    /// File name of the registry document.
    pub file_name: String,
    /// Classification recorded for each new repository.
    pub classification: String,
}

impl RegistryPatch {
    fn validate(&self) -> Result<()> {
        self.target.validate("registry_patch.target")?;
        if self.dir.is_empty() || self.file_name.is_empty() {
            return Err(KeeperError::Config(
                "registry_patch: dir and file_name are required".to_string(),
            ));
        }
        Ok(())
    }

    /// Path of the registry document inside the target repository.
    pub fn file_path(&self) -> String {
        format!("{}/{}", self.dir.trim_end_matches('/'), self.file_name)
    }
}

/// Optional identity-translation service endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityService {
    pub token_endpoint: String,
    pub user_endpoint: String,
    pub app_id: String,
    #[serde(default)]
    pub app_secret: String,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeeperConfig {
    pub watching_files: WatchingFiles,

    /// Hosting platform this reconciler serves; manifests declaring a
    /// different platform are skipped entirely.
    pub platform: String,

    /// Worker pool size for reconciliation tasks. Required, > 0.
    pub concurrent_size: usize,

    /// Minutes between poll cycles. 0 or unset means run back-to-back.
    #[serde(default)]
    pub interval: u64,

    /// Switch for the post-create registry patch.
    #[serde(default)]
    pub enable_registry_patch: bool,

    #[serde(default)]
    pub registry_patch: RegistryPatch,

    /// Groups whose repositories are never reconciled.
    #[serde(default)]
    pub excluded_groups: Vec<String>,

    /// `org/repo` pairs that are never reconciled.
    #[serde(default)]
    pub excluded_repos: Vec<String>,

    /// Automation logins that must never be demoted or removed.
    #[serde(default)]
    pub reserved_logins: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_service: Option<IdentityService>,
}

impl KeeperConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut cfg: KeeperConfig = serde_yaml::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&mut self) -> Result<()> {
        self.watching_files.validate()?;

        if self.platform.is_empty() {
            return Err(KeeperError::Config("platform is required".to_string()));
        }
        if self.concurrent_size == 0 {
            return Err(KeeperError::Config(
                "concurrent_size must be bigger than 0".to_string(),
            ));
        }
        if self.enable_registry_patch {
            self.registry_patch.validate()?;
        }

        for login in &mut self.reserved_logins {
            *login = login.to_lowercase();
        }
        Ok(())
    }

    /// Whether `group` is excluded from reconciliation.
    pub fn group_excluded(&self, group: &str) -> bool {
        self.excluded_groups.iter().any(|g| g == group)
    }

    /// Whether `org/repo` is excluded from reconciliation.
    pub fn repo_excluded(&self, org: &str, repo: &str) -> bool {
        let full = format!("{}/{}", org, repo);
        self.excluded_repos.iter().any(|r| r == &full)
    }

    /// Reserved automation logins, as a lookup set.
    pub fn reserved_login_set(&self) -> HashSet<String> {
        self.reserved_logins.iter().cloned().collect()
    }
}
