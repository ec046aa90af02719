//! Repository manifest entities parsed from the tracking repository.
//!
//! A manifest file declares the desired shape of one hosted repository:
//! visibility, description, branch list, and an optional rename source.
//! Validation folds the `protected_branches` shorthand into the branch
//! list and enforces name uniqueness.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::error::{KeeperError, Result};

/// Name of the branch the platform initialises on repository creation.
pub const DEFAULT_BRANCH: &str = "master";

/// Protection kind declared for a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchKind {
    /// No protection managed.
    #[default]
    Plain,
    /// Platform branch protection is applied.
    Protected,
    /// Bookkeeping-only marker; never enforced via the platform.
    Readonly,
}

/// One declared branch of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: BranchKind,
    /// Ref the branch is created from; the default branch when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_from: Option<String>,
}

impl BranchSpec {
    pub fn new(name: &str, kind: BranchKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            create_from: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(KeeperError::Manifest("missing branch name".to_string()));
        }
        Ok(())
    }
}

/// Desired state of one hosted repository, as declared in its manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoManifest {
    #[serde(default)]
    pub name: String,
    /// Visibility kind: `public` or `private`.
    #[serde(rename = "type", default)]
    pub visibility: String,
    /// Hosting platform this manifest targets (e.g. `github`).
    #[serde(default)]
    pub platform: String,
    /// Set when the repository is hosted elsewhere; such repos are skipped.
    #[serde(default)]
    pub repository_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename_from: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub commentable: bool,
    /// Shorthand for protected branches; folded into `branches` at
    /// validation time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protected_branches: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<BranchSpec>,
}

impl RepoManifest {
    pub fn is_private(&self) -> bool {
        self.visibility == "private"
    }

    /// Validate the manifest and fold `protected_branches` into the
    /// branch list. Branch names must be unique after folding.
    pub fn validate(&mut self) -> Result<()> {
        if self.name.is_empty() {
            return Err(KeeperError::Manifest("missing repo name".to_string()));
        }
        if self.visibility.is_empty() {
            return Err(KeeperError::Manifest(format!(
                "repo {}: missing repo type",
                self.name
            )));
        }

        for b in &self.branches {
            b.validate()?;
        }

        let folded: Vec<BranchSpec> = self
            .protected_branches
            .drain(..)
            .map(|name| BranchSpec::new(&name, BranchKind::Protected))
            .collect();
        self.branches.extend(folded);

        let mut seen = HashSet::new();
        for b in &self.branches {
            if !seen.insert(b.name.as_str()) {
                return Err(KeeperError::Manifest(format!(
                    "repo {}: duplicate branch: {}",
                    self.name, b.name
                )));
            }
        }

        Ok(())
    }
}
