//! Identity translation: community identifiers → platform logins.
//!
//! Ownership documents declare people by their community id. Before the
//! membership reconciler runs, each id is translated to its linked login
//! on the hosting platform via an external directory service. A failed
//! or unlinked lookup drops that id from the desired set for the cycle.

use async_trait::async_trait;
use tracing::warn;

/// One linked identity of a community account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedIdentity {
    /// Platform the identity belongs to (e.g. `github`).
    pub platform: String,
    pub login: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity service error: {0}")]
    Service(String),
}

/// Lookup service mapping a community id to its linked identities.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn lookup(&self, id: &str) -> Result<Vec<LinkedIdentity>, IdentityError>;
}

/// Translate community ids to lowercased platform logins.
///
/// Without a directory the ids pass through unchanged (they are assumed
/// to already be platform logins). With one, an id whose lookup fails or
/// yields no identity on `platform` is omitted for this cycle.
pub async fn translate(
    directory: Option<&dyn IdentityDirectory>,
    platform: &str,
    ids: &[String],
) -> Vec<String> {
    let Some(directory) = directory else {
        return ids.iter().map(|id| id.to_lowercase()).collect();
    };

    let mut logins = Vec::with_capacity(ids.len());
    for id in ids {
        let identities = match directory.lookup(id).await {
            Ok(v) => v,
            Err(err) => {
                warn!(id = %id, error = %err, "identity lookup failed, omitting for this cycle");
                continue;
            }
        };
        match identities.iter().find(|i| i.platform == platform) {
            Some(identity) => logins.push(identity.login.to_lowercase()),
            None => {
                warn!(id = %id, platform = %platform, "no linked identity, omitting for this cycle");
            }
        }
    }
    logins
}
