//! Versioned cell for one tracked file: last-seen fingerprint plus the
//! last successfully parsed and validated object.
//!
//! A refresh only fetches when the fingerprint changed, and only adopts
//! the new value when parse and validation both succeed. A bad edit to a
//! tracked file therefore never wipes previously-known-good state; the
//! cell keeps serving the old value until the file is fixed.

use std::future::Future;
use std::sync::Arc;
use tracing::warn;

use crate::domain::error::Result;
use crate::platform::{FileContent, PlatformResult};

#[derive(Debug)]
pub(crate) struct TrackedCell<T> {
    pub path: String,
    fingerprint: String,
    value: Option<Arc<T>>,
}

impl<T> TrackedCell<T> {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            fingerprint: String::new(),
            value: None,
        }
    }

    /// The last known-good value, if any.
    pub fn value(&self) -> Option<Arc<T>> {
        self.value.clone()
    }

    /// Refresh against the fingerprint reported by the latest tree
    /// listing. `parse` must validate as well as deserialize.
    pub async fn refresh<F, Fut, P>(&mut self, latest: &str, fetch: F, parse: P)
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = PlatformResult<FileContent>>,
        P: FnOnce(&str) -> Result<T>,
    {
        if latest.is_empty() || latest == self.fingerprint {
            return;
        }

        let file = match fetch(self.path.clone()).await {
            Ok(f) => f,
            Err(err) => {
                warn!(path = %self.path, error = %err, "load tracked file failed");
                return;
            }
        };

        match parse(&file.content) {
            Ok(v) => {
                self.value = Some(Arc::new(v));
                self.fingerprint = file.sha;
            }
            Err(err) => {
                warn!(
                    path = %self.path,
                    error = %err,
                    "tracked file failed to parse/validate, keeping previous value"
                );
            }
        }
    }
}
