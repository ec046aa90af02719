//! Repokeeper Core Library
//!
//! Reconciliation engine that keeps a fleet of hosted repositories
//! converged to the desired state declared in a tracking repository.
//! The engine consumes the hosting platform only through the
//! [`platform::HostPlatform`] capability trait; concrete clients live in
//! sibling crates.

pub mod config;
pub mod desired;
pub mod domain;
pub mod identity;
pub mod local;
pub mod platform;
pub mod reconcile;
pub mod registry;
pub mod scheduler;
pub mod telemetry;
pub mod watch;

pub use config::{IdentityService, KeeperConfig, RegistryPatch, RepoCoordinates, WatchingFiles};

pub use domain::{
    resolve_owners, BranchKind, BranchRecord, BranchSpec, GroupInfo, GroupOwners, KeeperError,
    OwnerResolution, RepoManifest, RepoProperty, RepoState, Result, DEFAULT_BRANCH,
};

pub use desired::{DesiredRepo, DesiredSnapshot, DesiredStateLoader};

pub use identity::{translate, IdentityDirectory, IdentityError, LinkedIdentity};

pub use local::{LocalState, RepoEntry};

pub use platform::{
    Collaborator, FileContent, GitRef, HostPlatform, Permission, PlatformError, PlatformResult,
    RemoteBranch, RemoteRepo, RepoPatch, RepoSettings, TreeEntry,
};

pub use reconcile::{should_process, MemberOutcome, RepoReconciler, RepoTarget};

pub use registry::{NoopHook, PostCreateHook, RegistryPatcher};

pub use scheduler::{Cycle, TaskPool};

pub use telemetry::init_tracing;

pub use watch::Watcher;

/// Repokeeper version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
