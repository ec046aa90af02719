//! Interest-group ownership documents and owner resolution.
//!
//! Each group directory in the tracking repository may carry an `OWNERS`
//! file (flat maintainer list) and a group-info document (maintainers
//! plus per-repository admin/committer lists). Owner resolution between
//! the two is deliberately asymmetric, see [`resolve_owners`].
//!
//! All identifiers are lowercased at the parse boundary; collaborator
//! comparison is case-insensitive everywhere downstream.

use serde::{Deserialize, Serialize};

use crate::domain::error::{KeeperError, Result};

/// Flat maintainer list from a group `OWNERS` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOwners {
    #[serde(default)]
    pub maintainers: Vec<String>,
}

impl GroupOwners {
    /// Maintainer logins, lowercased.
    pub fn owners(&self) -> Vec<String> {
        to_lower(&self.maintainers)
    }

    pub fn validate(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One person entry in a group-info document. Only the community id is
/// consumed; the rest is informational.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRef {
    #[serde(default)]
    pub gitee_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub email: String,
}

/// Per-repository role declarations inside a group-info document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRoles {
    /// Repository full names this entry applies to (`org/repo`).
    #[serde(default)]
    pub repo: Vec<String>,
    #[serde(default)]
    pub admins: Vec<PersonRef>,
    #[serde(default)]
    pub committers: Vec<PersonRef>,
}

/// Group-info document (`sig-info.yaml`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mailing_list: String,
    #[serde(default)]
    pub mature_level: String,
    #[serde(default)]
    pub mentors: Vec<PersonRef>,
    #[serde(default)]
    pub maintainers: Vec<PersonRef>,
    #[serde(default)]
    pub repositories: Vec<RepoRoles>,
}

impl GroupInfo {
    pub fn validate(&mut self) -> Result<()> {
        if self.name.is_empty() {
            return Err(KeeperError::Ownership(
                "missing group name".to_string(),
            ));
        }
        for m in &self.maintainers {
            if m.gitee_id.is_empty() {
                return Err(KeeperError::Ownership(format!(
                    "group {}: maintainer missing id",
                    self.name
                )));
            }
        }
        for r in &self.repositories {
            if r.repo.is_empty() {
                return Err(KeeperError::Ownership(format!(
                    "group {}: repository roles missing repo name",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Group-level maintainer ids, lowercased.
    pub fn owners(&self) -> Vec<String> {
        self.maintainers
            .iter()
            .map(|m| m.gitee_id.to_lowercase())
            .collect()
    }

    /// Declared admins for `org/repo`, lowercased.
    pub fn admins_of(&self, org: &str, repo: &str) -> Vec<String> {
        self.roles_of(org, repo, |r| &r.admins)
    }

    /// Declared committers for `org/repo`, lowercased. These supplement
    /// the group maintainers in the fallback branch of owner resolution.
    pub fn additional_owners_of(&self, org: &str, repo: &str) -> Vec<String> {
        self.roles_of(org, repo, |r| &r.committers)
    }

    fn roles_of<F>(&self, org: &str, repo: &str, pick: F) -> Vec<String>
    where
        F: Fn(&RepoRoles) -> &Vec<PersonRef>,
    {
        let full = format!("{}/{}", org, repo);
        for roles in &self.repositories {
            if roles.repo.iter().any(|r| r == &full) {
                return pick(roles)
                    .iter()
                    .map(|p| p.gitee_id.to_lowercase())
                    .collect();
            }
        }
        Vec::new()
    }
}

/// Resolved owner and admin lists for one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerResolution {
    pub owners: Vec<String>,
    pub admins: Vec<String>,
}

/// Resolve the desired owner and admin lists for `org/repo`.
///
/// Precedence is asymmetric and must stay that way: when the group
/// `OWNERS` file yields any maintainers it is authoritative and the
/// group-info document is not consulted at all (no admins, no
/// additional owners). Only when it yields zero maintainers does
/// resolution fall back to the group-info document, where the
/// repository-scoped additional owners (if any) are appended to the
/// group maintainer list.
pub fn resolve_owners(
    owners_file: Option<&GroupOwners>,
    info: Option<&GroupInfo>,
    org: &str,
    repo: &str,
) -> OwnerResolution {
    if let Some(of) = owners_file {
        let owners = of.owners();
        if !owners.is_empty() {
            return OwnerResolution {
                owners,
                admins: Vec::new(),
            };
        }
    }

    let Some(info) = info else {
        return OwnerResolution::default();
    };

    let mut owners = info.owners();
    let additional = info.additional_owners_of(org, repo);
    if !additional.is_empty() {
        owners.extend(additional);
    }

    OwnerResolution {
        owners,
        admins: info.admins_of(org, repo),
    }
}

pub(crate) fn to_lower(ids: &[String]) -> Vec<String> {
    ids.iter().map(|s| s.to_lowercase()).collect()
}
