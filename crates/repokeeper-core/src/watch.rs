//! The watch loop: polling cadence, per-cycle task submission,
//! cancellation, and graceful drain.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::KeeperConfig;
use crate::desired::DesiredStateLoader;
use crate::domain::error::Result;
use crate::identity::{translate, IdentityDirectory};
use crate::local::LocalState;
use crate::platform::HostPlatform;
use crate::reconcile::{should_process, RepoReconciler, RepoTarget};
use crate::registry::PostCreateHook;
use crate::scheduler::TaskPool;

/// Long-running reconciliation driver.
pub struct Watcher {
    platform: Arc<dyn HostPlatform>,
    identity: Option<Arc<dyn IdentityDirectory>>,
    hook: Arc<dyn PostCreateHook>,
    cfg: KeeperConfig,
}

impl Watcher {
    pub fn new(
        platform: Arc<dyn HostPlatform>,
        identity: Option<Arc<dyn IdentityDirectory>>,
        hook: Arc<dyn PostCreateHook>,
        cfg: KeeperConfig,
    ) -> Self {
        Self {
            platform,
            identity,
            hook,
            cfg,
        }
    }

    /// Run until cancelled. Startup (initial desired-state load and
    /// observed-state bootstrap) is fatal on failure; once the loop is
    /// running every error is absorbed, logged, and retried next cycle.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let org = &self.cfg.watching_files.repo_org;

        let mut loader = DesiredStateLoader::new(
            self.cfg.watching_files.clone(),
            self.cfg.excluded_groups.clone(),
        );
        loader.init(&*self.platform).await?;

        let local = LocalState::bootstrap(&*self.platform, org).await?;
        info!(repos = local.len().await, "observed-state bootstrap complete");

        let pool = TaskPool::new(self.cfg.concurrent_size);
        let reconciler = Arc::new(RepoReconciler::new(
            self.platform.clone(),
            org,
            self.cfg.reserved_login_set(),
            self.hook.clone(),
        ));

        let interval = Duration::from_secs(self.cfg.interval * 60);

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let started = Instant::now();
            self.cycle(&mut loader, &local, &pool, &reconciler, &cancel)
                .await;

            if interval.is_zero() {
                continue;
            }
            let elapsed = started.elapsed();
            if elapsed < interval {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval - elapsed) => {}
                }
            }
        }

        info!("watch loop stopped");
        Ok(())
    }

    /// One poll cycle: refresh desired state, prune the store, submit
    /// one task per repository, drain.
    async fn cycle(
        &self,
        loader: &mut DesiredStateLoader,
        local: &LocalState,
        pool: &TaskPool,
        reconciler: &Arc<RepoReconciler>,
        cancel: &CancellationToken,
    ) {
        info!("new check cycle");

        let snapshot = match loader.refresh(&*self.platform).await {
            Ok(s) => s,
            Err(err) => {
                warn!(error = %err, "desired-state refresh failed, skipping cycle");
                return;
            }
        };
        if snapshot.repos.is_empty() {
            // Keep the store intact: an empty desired set here is a load
            // anomaly, not a fleet deletion.
            warn!("desired set is empty, skipping cycle");
            return;
        }

        local.prune(|name| snapshot.contains(name)).await;

        let org = &self.cfg.watching_files.repo_org;
        let mut cycle = pool.start_cycle();

        for (name, desired) in &snapshot.repos {
            if cancel.is_cancelled() {
                break;
            }
            if self.cfg.group_excluded(&desired.group) || self.cfg.repo_excluded(org, name) {
                continue;
            }
            if !should_process(&desired.manifest, &self.cfg.platform) {
                continue;
            }

            let directory = self.identity.as_deref();
            let owners = translate(directory, &self.cfg.platform, &desired.owners).await;
            let admins = translate(directory, &self.cfg.platform, &desired.admins).await;

            let target = RepoTarget {
                manifest: desired.manifest.clone(),
                owners,
                admins,
            };
            let entry = local.get_or_create(name).await;
            let reconciler = reconciler.clone();

            cycle.submit(async move {
                entry
                    .update(move |before| async move { reconciler.apply(&target, before).await })
                    .await;
            });
        }

        let submitted = cycle.len();
        cycle.drain().await;
        info!(submitted, "cycle drained");
    }
}
