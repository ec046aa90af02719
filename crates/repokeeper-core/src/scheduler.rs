//! Bounded task scheduler for reconciliation work.
//!
//! A fixed number of worker permits bounds how many reconciliation tasks
//! run at once. Submission never blocks the caller: tasks queue on the
//! semaphore, and the cycle as a whole is drained before the next one
//! begins. Per-repository exclusion is the store's concern, not the
//! pool's (see [`crate::local::RepoEntry::update`]).

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

/// Worker-permit pool shared across poll cycles.
pub struct TaskPool {
    permits: Arc<Semaphore>,
}

impl TaskPool {
    /// `size` must be > 0; validated by configuration.
    pub fn new(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size)),
        }
    }

    /// Begin a new submission cycle.
    pub fn start_cycle(&self) -> Cycle {
        Cycle {
            permits: self.permits.clone(),
            tasks: JoinSet::new(),
        }
    }
}

/// Tasks submitted within one poll cycle.
pub struct Cycle {
    permits: Arc<Semaphore>,
    tasks: JoinSet<()>,
}

impl Cycle {
    /// Submit a task. Returns immediately; the task runs once a worker
    /// permit is free.
    pub fn submit<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = self.permits.clone();
        self.tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                // Pool closed during shutdown; nothing to do.
                return;
            };
            task.await;
        });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every submitted task of this cycle to finish.
    pub async fn drain(mut self) {
        while let Some(res) = self.tasks.join_next().await {
            if let Err(err) = res {
                warn!(error = %err, "reconciliation task panicked");
            }
        }
    }
}
