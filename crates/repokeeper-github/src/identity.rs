//! Community identity directory client.
//!
//! Ownership documents name people by their community id; the membership
//! reconciler needs GitHub logins. This client talks to the community's
//! account service: a short-lived token is obtained per lookup from the
//! token endpoint, then the user endpoint returns the linked identities
//! of the queried id.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use repokeeper_core::config::IdentityService;
use repokeeper_core::identity::{IdentityDirectory, IdentityError, LinkedIdentity};

/// Client for the community account service.
pub struct OmDirectory {
    http: reqwest::Client,
    cfg: IdentityService,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    app_id: &'a str,
    app_secret: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    status: u16,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    token: String,
}

#[derive(Deserialize)]
struct UserInfoResponse {
    code: u16,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: UserInfoData,
}

#[derive(Default, Deserialize)]
struct UserInfoData {
    #[serde(default)]
    identities: Vec<IdentityRecord>,
}

#[derive(Deserialize)]
struct IdentityRecord {
    #[serde(default)]
    login_name: String,
    #[serde(default)]
    identity: String,
}

impl OmDirectory {
    pub fn new(cfg: IdentityService) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("repokeeper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IdentityError::Service(e.to_string()))?;
        Ok(Self { http, cfg })
    }

    async fn token(&self) -> Result<String, IdentityError> {
        let body = TokenRequest {
            grant_type: "token",
            app_id: &self.cfg.app_id,
            app_secret: &self.cfg.app_secret,
        };

        let resp: TokenResponse = self
            .http
            .post(&self.cfg.token_endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| IdentityError::Service(e.to_string()))?
            .json()
            .await
            .map_err(|e| IdentityError::Service(e.to_string()))?;

        if resp.status != 200 {
            return Err(IdentityError::Service(resp.msg));
        }
        Ok(resp.token)
    }
}

#[async_trait]
impl IdentityDirectory for OmDirectory {
    async fn lookup(&self, id: &str) -> Result<Vec<LinkedIdentity>, IdentityError> {
        let token = self.token().await?;

        let url = format!("{}?giteeLogin={}", self.cfg.user_endpoint, id);
        let resp: UserInfoResponse = self
            .http
            .get(&url)
            .header("token", token)
            .send()
            .await
            .map_err(|e| IdentityError::Service(e.to_string()))?
            .json()
            .await
            .map_err(|e| IdentityError::Service(e.to_string()))?;

        if resp.code != 200 {
            // An unknown id is not an error, just an unlinked identity.
            if resp.msg.contains("User doesn't exist") {
                debug!(id, "no community account");
                return Ok(Vec::new());
            }
            return Err(IdentityError::Service(resp.msg));
        }

        Ok(resp
            .data
            .identities
            .into_iter()
            .map(|i| LinkedIdentity {
                platform: i.identity,
                login: i.login_name,
            })
            .collect())
    }
}
