//! Post-create registry patch.
//!
//! When enabled, every cleanly created repository is appended to a shared
//! YAML registry document in an external tracking repository (name,
//! target classification, creation date). The document is a single file
//! read-modified-written per creation event, so patching is serialized
//! behind a mutex.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::config::RegistryPatch;
use crate::platform::HostPlatform;

/// Hook invoked by the lifecycle state machine exactly once per clean
/// repository creation.
#[async_trait]
pub trait PostCreateHook: Send + Sync {
    async fn repo_created(&self, repo: &str);
}

/// Hook used when the registry patch is disabled.
pub struct NoopHook;

#[async_trait]
impl PostCreateHook for NoopHook {
    async fn repo_created(&self, _repo: &str) {}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryDoc {
    #[serde(default)]
    packages: Vec<PackageRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct PackageRecord {
    name: String,
    target: String,
    date: String,
}

/// Appends creation records to the registry document.
pub struct RegistryPatcher {
    platform: Arc<dyn HostPlatform>,
    cfg: RegistryPatch,
    lock: Mutex<()>,
}

impl RegistryPatcher {
    pub fn new(platform: Arc<dyn HostPlatform>, cfg: RegistryPatch) -> Self {
        Self {
            platform,
            cfg,
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl PostCreateHook for RegistryPatcher {
    async fn repo_created(&self, repo: &str) {
        let _guard = self.lock.lock().await;

        let target = &self.cfg.target;
        let path = self.cfg.file_path();

        let file = match self
            .platform
            .get_path_content(&target.org, &target.repo, &path, &target.branch)
            .await
        {
            Ok(f) => f,
            Err(err) => {
                error!(path = %path, error = %err, "reading registry document failed");
                return;
            }
        };

        let mut doc: RegistryDoc = match serde_yaml::from_str(&file.content) {
            Ok(d) => d,
            Err(err) => {
                error!(path = %path, error = %err, "registry document is not valid yaml");
                return;
            }
        };

        doc.packages.push(PackageRecord {
            name: repo.to_string(),
            target: self.cfg.classification.clone(),
            date: chrono::Utc::now().format("%Y-%m-%d").to_string(),
        });

        let body = match serde_yaml::to_string(&doc) {
            Ok(b) => b,
            Err(err) => {
                error!(path = %path, error = %err, "serializing registry document failed");
                return;
            }
        };

        let message = format!("register newly created repository {}", repo);
        match self
            .platform
            .create_file(
                &target.org,
                &target.repo,
                &path,
                &target.branch,
                &message,
                &file.sha,
                body.as_bytes(),
            )
            .await
        {
            Ok(()) => info!(repo = %repo, path = %path, "registry document updated"),
            Err(err) => error!(repo = %repo, path = %path, error = %err, "updating registry document failed"),
        }
    }
}
