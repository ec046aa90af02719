//! Domain-level error taxonomy for repokeeper.

use crate::platform::PlatformError;

/// Repokeeper domain errors.
///
/// Non-fatal conditions (a bad manifest edit, a failed platform call for
/// one repository) are handled locally by the loader and reconcilers and
/// never bubble up to the watch loop. Variants here cover validation and
/// the startup path, where failure aborts the process.
#[derive(Debug, thiserror::Error)]
pub enum KeeperError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid manifest: {0}")]
    Manifest(String),

    #[error("invalid ownership document: {0}")]
    Ownership(String),

    #[error("desired-state load failed: {0}")]
    Load(String),

    #[error("local-state bootstrap failed: {0}")]
    Bootstrap(String),

    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for repokeeper domain operations.
pub type Result<T> = std::result::Result<T, KeeperError>;
