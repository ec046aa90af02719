//! GitHub v3 REST client implementing the platform capability trait.
//!
//! Only the endpoints the reconciliation engine needs are covered. List
//! endpoints paginate at 100 items per page; file content is transferred
//! base64-encoded and decoded at this boundary so the engine only ever
//! sees plain text.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use repokeeper_core::platform::{
    Collaborator, FileContent, GitRef, HostPlatform, Permission, PlatformError, PlatformResult,
    RemoteBranch, RemoteRepo, RepoPatch, RepoSettings, TreeEntry,
};

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const PER_PAGE: usize = 100;
const USER_AGENT: &str = concat!("repokeeper/", env!("CARGO_PKG_VERSION"));

/// Authenticated GitHub API client.
pub struct GithubClient {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl GithubClient {
    pub fn new(token: &str) -> PlatformResult<Self> {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    /// Client against a non-default API root (GitHub Enterprise, test
    /// servers).
    pub fn with_base_url(token: &str, base: &str) -> PlatformResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PlatformError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base, path))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
    }

    async fn send(&self, req: RequestBuilder) -> PlatformResult<reqwest::Response> {
        let resp = req
            .send()
            .await
            .map_err(|e| PlatformError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let message = resp.text().await.unwrap_or_default();
        Err(status_error(status, message))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> PlatformResult<T> {
        let resp = self.send(self.request(Method::GET, path)).await?;
        resp.json()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))
    }

    /// Fetch every page of a list endpoint.
    async fn get_paged<T: DeserializeOwned>(&self, path: &str) -> PlatformResult<Vec<T>> {
        let sep = if path.contains('?') { '&' } else { '?' };
        let mut all = Vec::new();
        for page in 1.. {
            let url = format!("{}{}per_page={}&page={}", path, sep, PER_PAGE, page);
            let items: Vec<T> = self.get_json(&url).await?;
            let len = items.len();
            all.extend(items);
            if len < PER_PAGE {
                break;
            }
        }
        Ok(all)
    }
}

/// Map an HTTP status to the engine's error taxonomy. The engine keys
/// its self-heal fallbacks on `NotFound` and `AlreadyExists`; on the
/// mutating endpoints used here a 422 means the name is already taken.
fn status_error(status: StatusCode, message: String) -> PlatformError {
    match status.as_u16() {
        404 => PlatformError::NotFound(message),
        401 | 403 => PlatformError::Auth(message),
        422 => PlatformError::AlreadyExists(message),
        s => PlatformError::Api { status: s, message },
    }
}

fn decode_base64(content: &str) -> PlatformResult<String> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64
        .decode(compact)
        .map_err(|e| PlatformError::Decode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| PlatformError::Decode(e.to_string()))
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TreeResponse {
    tree: Vec<TreeItem>,
}

#[derive(Deserialize)]
struct TreeItem {
    path: String,
    sha: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct ContentResponse {
    content: String,
    sha: String,
}

#[derive(Deserialize)]
struct OwnerRef {
    login: String,
}

#[derive(Deserialize)]
struct RepoResponse {
    name: String,
    owner: OwnerRef,
    private: bool,
    #[serde(default)]
    description: Option<String>,
}

impl From<RepoResponse> for RemoteRepo {
    fn from(r: RepoResponse) -> Self {
        RemoteRepo {
            name: r.name,
            owner: r.owner.login,
            private: r.private,
            description: r.description.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct BranchResponse {
    name: String,
    #[serde(default)]
    protected: bool,
}

#[derive(Default, Deserialize)]
struct PermissionFlags {
    #[serde(default)]
    admin: bool,
}

#[derive(Deserialize)]
struct CollaboratorResponse {
    login: String,
    #[serde(default)]
    permissions: PermissionFlags,
}

#[derive(Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Serialize)]
struct CreateFileRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Serialize)]
struct CreateRepoRequest<'a> {
    name: &'a str,
    description: &'a str,
    private: bool,
    auto_init: bool,
    has_issues: bool,
    has_wiki: bool,
}

#[derive(Serialize)]
struct UpdateRepoRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    private: Option<bool>,
}

#[derive(Serialize)]
struct AddCollaboratorRequest<'a> {
    permission: &'a str,
}

#[derive(Serialize)]
struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    ref_name: &'a str,
    sha: &'a str,
}

// ---------------------------------------------------------------------------
// HostPlatform
// ---------------------------------------------------------------------------

#[async_trait]
impl HostPlatform for GithubClient {
    async fn get_directory_tree(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
    ) -> PlatformResult<Vec<TreeEntry>> {
        let path = format!("/repos/{}/{}/git/trees/{}?recursive=1", org, repo, branch);
        let resp: TreeResponse = self.get_json(&path).await?;

        debug!(org, repo, branch, entries = resp.tree.len(), "fetched tree");
        Ok(resp
            .tree
            .into_iter()
            .filter(|t| t.kind == "blob")
            .map(|t| TreeEntry {
                path: t.path,
                sha: t.sha,
            })
            .collect())
    }

    async fn get_path_content(
        &self,
        org: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> PlatformResult<FileContent> {
        let url = format!("/repos/{}/{}/contents/{}?ref={}", org, repo, path, branch);
        let resp: ContentResponse = self.get_json(&url).await?;

        Ok(FileContent {
            content: decode_base64(&resp.content)?,
            sha: resp.sha,
        })
    }

    async fn create_file(
        &self,
        org: &str,
        repo: &str,
        path: &str,
        branch: &str,
        message: &str,
        sha: &str,
        content: &[u8],
    ) -> PlatformResult<()> {
        let url = format!("/repos/{}/{}/contents/{}", org, repo, path);
        let body = CreateFileRequest {
            message,
            content: BASE64.encode(content),
            branch,
            sha: (!sha.is_empty()).then_some(sha),
        };
        self.send(self.request(Method::PUT, &url).json(&body)).await?;
        Ok(())
    }

    async fn list_repos(&self, org: &str) -> PlatformResult<Vec<RemoteRepo>> {
        let path = format!("/orgs/{}/repos?type=all", org);
        let repos: Vec<RepoResponse> = self.get_paged(&path).await?;
        Ok(repos.into_iter().map(Into::into).collect())
    }

    async fn get_repo(&self, org: &str, repo: &str) -> PlatformResult<RemoteRepo> {
        let resp: RepoResponse = self.get_json(&format!("/repos/{}/{}", org, repo)).await?;
        Ok(resp.into())
    }

    async fn create_repo(&self, org: &str, settings: &RepoSettings) -> PlatformResult<()> {
        let body = CreateRepoRequest {
            name: &settings.name,
            description: &settings.description,
            private: settings.private,
            auto_init: settings.auto_init,
            has_issues: settings.has_issues,
            has_wiki: settings.has_wiki,
        };
        self.send(
            self.request(Method::POST, &format!("/orgs/{}/repos", org))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn update_repo(&self, org: &str, repo: &str, patch: &RepoPatch) -> PlatformResult<()> {
        let body = UpdateRepoRequest {
            name: patch.name.as_deref(),
            description: patch.description.as_deref(),
            private: patch.private,
        };
        self.send(
            self.request(Method::PATCH, &format!("/repos/{}/{}", org, repo))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn list_collaborators(
        &self,
        org: &str,
        repo: &str,
    ) -> PlatformResult<Vec<Collaborator>> {
        let path = format!("/repos/{}/{}/collaborators?affiliation=all", org, repo);
        let collabs: Vec<CollaboratorResponse> = self.get_paged(&path).await?;
        Ok(collabs
            .into_iter()
            .map(|c| Collaborator {
                login: c.login,
                admin: c.permissions.admin,
            })
            .collect())
    }

    async fn add_collaborator(
        &self,
        org: &str,
        repo: &str,
        login: &str,
        permission: Permission,
    ) -> PlatformResult<()> {
        let url = format!("/repos/{}/{}/collaborators/{}", org, repo, login);
        let body = AddCollaboratorRequest {
            permission: permission.as_str(),
        };
        self.send(self.request(Method::PUT, &url).json(&body)).await?;
        Ok(())
    }

    async fn remove_collaborator(&self, org: &str, repo: &str, login: &str) -> PlatformResult<()> {
        let url = format!("/repos/{}/{}/collaborators/{}", org, repo, login);
        self.send(self.request(Method::DELETE, &url)).await?;
        Ok(())
    }

    async fn set_branch_protection(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
    ) -> PlatformResult<()> {
        let url = format!("/repos/{}/{}/branches/{}/protection", org, repo, branch);
        // Minimal protection rule: no status checks or review gates, just
        // the branch lock itself.
        let body = serde_json::json!({
            "required_status_checks": null,
            "enforce_admins": true,
            "required_pull_request_reviews": null,
            "restrictions": null,
        });
        self.send(self.request(Method::PUT, &url).json(&body)).await?;
        Ok(())
    }

    async fn remove_branch_protection(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
    ) -> PlatformResult<()> {
        let url = format!("/repos/{}/{}/branches/{}/protection", org, repo, branch);
        self.send(self.request(Method::DELETE, &url)).await?;
        Ok(())
    }

    async fn get_ref(&self, org: &str, repo: &str, r: &str) -> PlatformResult<GitRef> {
        let url = format!("/repos/{}/{}/git/ref/{}", org, repo, r);
        let resp: RefResponse = self.get_json(&url).await?;
        Ok(GitRef {
            ref_name: r.to_string(),
            sha: resp.object.sha,
        })
    }

    async fn create_branch(
        &self,
        org: &str,
        repo: &str,
        ref_name: &str,
        sha: &str,
    ) -> PlatformResult<()> {
        let url = format!("/repos/{}/{}/git/refs", org, repo);
        let body = CreateRefRequest { ref_name, sha };
        self.send(self.request(Method::POST, &url).json(&body)).await?;
        Ok(())
    }

    async fn list_branches(&self, org: &str, repo: &str) -> PlatformResult<Vec<RemoteBranch>> {
        let path = format!("/repos/{}/{}/branches", org, repo);
        let branches: Vec<BranchResponse> = self.get_paged(&path).await?;
        Ok(branches
            .into_iter()
            .map(|b| RemoteBranch {
                name: b.name,
                protected: b.protected,
            })
            .collect())
    }
}
