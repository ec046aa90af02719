//! Observed repository state as last known by the engine.

use serde::{Deserialize, Serialize};

use crate::domain::manifest::BranchKind;

/// A branch as recorded in observed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRecord {
    pub name: String,
    pub kind: BranchKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_from: Option<String>,
}

impl BranchRecord {
    pub fn new(name: &str, kind: BranchKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            create_from: None,
        }
    }
}

/// Mutable repository properties the engine reconciles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoProperty {
    pub private: bool,
    pub can_comment: bool,
}

/// Last-known state of one hosted repository.
///
/// Created unavailable when a repository name is first seen; populated by
/// bootstrap or by the first reconciliation; mutated only under the
/// entry's gate in [`crate::local::LocalState`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoState {
    pub available: bool,
    pub branches: Vec<BranchRecord>,
    /// Plain collaborators, lowercased.
    pub members: Vec<String>,
    /// Elevated collaborators, lowercased.
    pub admins: Vec<String>,
    /// Resolved owner login; empty until first fetched.
    pub owner: String,
    pub property: RepoProperty,
}
