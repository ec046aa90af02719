//! Domain model: manifests, ownership documents, observed state, errors.

pub mod error;
pub mod manifest;
pub mod ownership;
pub mod state;

pub use error::{KeeperError, Result};
pub use manifest::{BranchKind, BranchSpec, RepoManifest, DEFAULT_BRANCH};
pub use ownership::{resolve_owners, GroupInfo, GroupOwners, OwnerResolution, PersonRef, RepoRoles};
pub use state::{BranchRecord, RepoProperty, RepoState};
