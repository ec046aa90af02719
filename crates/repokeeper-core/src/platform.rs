//! Hosting-platform capability interface.
//!
//! The engine consumes the platform exclusively through [`HostPlatform`];
//! HTTP, authentication, and pagination live behind it. The trait surface
//! is the minimal set of reads and mutations the reconcilers need.
//!
//! No retry or timeout policy is imposed here. Transient-failure handling
//! is the client's concern; the engine's only retry mechanism is the next
//! poll cycle.

use async_trait::async_trait;

/// Errors surfaced by a platform client.
///
/// `NotFound` and `AlreadyExists` must be distinguishable from generic
/// API failures: the lifecycle state machine keys its self-heal fallbacks
/// on them (create-but-exists, benign branch-create race).
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),
}

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// One entry of a repository tree listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    /// Content fingerprint (opaque version token, e.g. a blob sha).
    pub sha: String,
}

/// File content at a path, plus its fingerprint. `content` is the
/// decoded text; transfer encodings are the client's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub content: String,
    pub sha: String,
}

/// A repository as reported by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteRepo {
    pub name: String,
    pub owner: String,
    pub private: bool,
    pub description: String,
}

/// A branch as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBranch {
    pub name: String,
    pub protected: bool,
}

/// A collaborator as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collaborator {
    pub login: String,
    pub admin: bool,
}

/// A git ref and the commit it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRef {
    pub ref_name: String,
    pub sha: String,
}

/// Settings for repository creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoSettings {
    pub name: String,
    pub description: String,
    pub private: bool,
    /// Initialise the default branch with a README on creation.
    pub auto_init: bool,
    pub has_issues: bool,
    pub has_wiki: bool,
}

/// Partial update of repository properties; `None` fields are untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub private: Option<bool>,
}

/// Collaborator permission tier set on add.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Plain collaborator.
    Push,
    /// Elevated/admin tier.
    Maintain,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Push => "push",
            Permission::Maintain => "maintain",
        }
    }
}

/// Capability interface to the hosting platform.
#[async_trait]
pub trait HostPlatform: Send + Sync {
    /// Recursive tree listing of `org/repo` at `branch`.
    async fn get_directory_tree(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
    ) -> PlatformResult<Vec<TreeEntry>>;

    /// Decoded file content plus fingerprint at `path`.
    async fn get_path_content(
        &self,
        org: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> PlatformResult<FileContent>;

    /// Create or update a file with a commit message. `sha` is the
    /// current blob fingerprint when updating.
    async fn create_file(
        &self,
        org: &str,
        repo: &str,
        path: &str,
        branch: &str,
        message: &str,
        sha: &str,
        content: &[u8],
    ) -> PlatformResult<()>;

    async fn list_repos(&self, org: &str) -> PlatformResult<Vec<RemoteRepo>>;

    async fn get_repo(&self, org: &str, repo: &str) -> PlatformResult<RemoteRepo>;

    async fn create_repo(&self, org: &str, settings: &RepoSettings) -> PlatformResult<()>;

    async fn update_repo(&self, org: &str, repo: &str, patch: &RepoPatch) -> PlatformResult<()>;

    async fn list_collaborators(&self, org: &str, repo: &str)
        -> PlatformResult<Vec<Collaborator>>;

    async fn add_collaborator(
        &self,
        org: &str,
        repo: &str,
        login: &str,
        permission: Permission,
    ) -> PlatformResult<()>;

    async fn remove_collaborator(&self, org: &str, repo: &str, login: &str) -> PlatformResult<()>;

    async fn set_branch_protection(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
    ) -> PlatformResult<()>;

    async fn remove_branch_protection(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
    ) -> PlatformResult<()>;

    /// Look up a ref (e.g. `heads/master`).
    async fn get_ref(&self, org: &str, repo: &str, r: &str) -> PlatformResult<GitRef>;

    /// Create a branch ref (`refs/heads/<name>`) pointing at `sha`.
    async fn create_branch(
        &self,
        org: &str,
        repo: &str,
        ref_name: &str,
        sha: &str,
    ) -> PlatformResult<()>;

    async fn list_branches(&self, org: &str, repo: &str) -> PlatformResult<Vec<RemoteBranch>>;
}
