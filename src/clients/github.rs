use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;
use percent_encoding::utf8_percent_encode;
use serde::Deserialize;
use serde::Serialize;
use tracing::instrument;

use super::github_curl::GithubCurlClient;
use crate::Config;

/// Everything but the RFC 3986 unreserved characters gets escaped.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Escape a single query value or path segment.
fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Escape each segment of a slash separated path, keeping the slashes.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(encode_component)
        .collect::<Vec<_>>()
        .join("/")
}

// -----------------------------------------------------------------------------
// Types

/// A git commit SHA as reported by the GitHub API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSha(pub String);

impl std::fmt::Display for CommitSha {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of a create-or-update file call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileUpdate {
    pub message: String,
    /// Base64 encoded file contents.
    pub content: String,
    pub branch: String,
    /// Blob SHA of the revision being replaced. Omitted when creating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    /// Web URL of the PR. Absent in malformed responses.
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatePullRequest {
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatePullRequest {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Serialize)]
struct CreateRef<'a> {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: &'a str,
}

#[derive(Debug, Deserialize)]
struct ContentMetadata {
    #[serde(default)]
    sha: Option<String>,
}

// -----------------------------------------------------------------------------
// GithubOps trait

/// Operations against the GitHub REST API of one repository.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GithubOps: Send + Sync {
    /// Check whether `refs/heads/<branch>` exists.
    async fn branch_exists(&self, branch: &str) -> Result<bool>;

    /// Get the commit a branch currently points at.
    async fn branch_tip(&self, branch: &str) -> Result<CommitSha>;

    /// Create `refs/heads/<branch>` at `sha`. Only a 201 counts as success.
    async fn create_branch(&self, branch: &str, sha: &CommitSha) -> Result<()>;

    /// Get the blob SHA of a file on a branch, or `None` if there is no such file.
    async fn file_sha(&self, path: &str, branch: &str) -> Result<Option<String>>;

    /// Create or update a file.
    async fn put_file(&self, path: &str, update: &FileUpdate) -> Result<()>;

    /// List open PRs from `head` (a branch in this repository) into `base`.
    async fn open_prs(&self, head: &str, base: &str) -> Result<Vec<PullRequest>>;

    async fn pr_create(&self, pr: &CreatePullRequest) -> Result<PullRequest>;

    async fn pr_update(&self, number: u64, pr: &UpdatePullRequest) -> Result<PullRequest>;
}

// -----------------------------------------------------------------------------
// GithubClient

/// Client to interact with GitHub API.
pub struct GithubClient {
    api_url: String,
    owner: String,
    repo: String,
    http_client: GithubCurlClient,
}

impl GithubClient {
    pub fn new(config: &Config) -> Self {
        Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            owner: config.repo_owner.clone(),
            repo: config.repo_name.clone(),
            http_client: GithubCurlClient::new(config.github_token.clone()),
        }
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_url, self.owner, self.repo, path
        )
    }

    fn ref_url(&self, branch: &str) -> String {
        self.repo_url(&format!("git/ref/heads/{}", encode_path(branch)))
    }

    fn contents_url(&self, path: &str, branch: Option<&str>) -> String {
        let url = self.repo_url(&format!("contents/{}", encode_path(path)));
        match branch {
            Some(branch) => format!("{}?ref={}", url, encode_component(branch)),
            None => url,
        }
    }

    fn open_prs_url(&self, head: &str, base: &str) -> String {
        self.repo_url(&format!(
            "pulls?head={}&base={}&state=open",
            encode_component(&format!("{}:{}", self.owner, head)),
            encode_component(base)
        ))
    }
}

#[async_trait]
impl GithubOps for GithubClient {
    #[instrument(skip(self))]
    async fn branch_exists(&self, branch: &str) -> Result<bool> {
        let url = self.ref_url(branch);
        let response = self.http_client.get(&url).await?;
        if response.status == 404 {
            return Ok(false);
        }
        response.error_for_status()?;
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn branch_tip(&self, branch: &str) -> Result<CommitSha> {
        let url = self.ref_url(branch);
        let response = self.http_client.get(&url).await?.error_for_status()?;
        let git_ref: GitRef = serde_json::from_str(&response.body)
            .with_context(|| format!("Unexpected ref response for branch {}", branch))?;
        Ok(CommitSha(git_ref.object.sha))
    }

    #[instrument(skip(self))]
    async fn create_branch(&self, branch: &str, sha: &CommitSha) -> Result<()> {
        let url = self.repo_url("git/refs");
        let request_body = CreateRef {
            ref_name: format!("refs/heads/{}", branch),
            sha: &sha.0,
        };

        let json_data = serde_json::to_string(&request_body)?;
        let response = self
            .http_client
            .post(&url, &json_data)
            .await?
            .error_for_status()?;
        if response.status != 201 {
            bail!(
                "Creating branch {} returned status {} instead of 201",
                branch,
                response.status
            );
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn file_sha(&self, path: &str, branch: &str) -> Result<Option<String>> {
        let url = self.contents_url(path, Some(branch));
        let response = self.http_client.get(&url).await?;
        if response.status == 404 {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        let metadata: ContentMetadata = serde_json::from_str(&response.body)
            .with_context(|| format!("{} is not a file", path))?;
        Ok(metadata.sha)
    }

    #[instrument(skip(self, update), fields(branch = %update.branch, has_sha = update.sha.is_some()))]
    async fn put_file(&self, path: &str, update: &FileUpdate) -> Result<()> {
        let url = self.contents_url(path, None);
        let json_data = serde_json::to_string(update)?;
        self.http_client
            .put(&url, &json_data)
            .await?
            .error_for_status()?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn open_prs(&self, head: &str, base: &str) -> Result<Vec<PullRequest>> {
        let url = self.open_prs_url(head, base);
        let response = self.http_client.get(&url).await?.error_for_status()?;
        let prs: Vec<PullRequest> = serde_json::from_str(&response.body)?;
        Ok(prs)
    }

    #[instrument(skip_all, fields(head = %pr.head, base = %pr.base))]
    async fn pr_create(&self, pr: &CreatePullRequest) -> Result<PullRequest> {
        let url = self.repo_url("pulls");
        let json_data = serde_json::to_string(pr)?;
        let response = self
            .http_client
            .post(&url, &json_data)
            .await?
            .error_for_status()?;
        Ok(serde_json::from_str(&response.body)?)
    }

    #[instrument(skip(self, pr))]
    async fn pr_update(&self, number: u64, pr: &UpdatePullRequest) -> Result<PullRequest> {
        let url = self.repo_url(&format!("pulls/{}", number));
        let json_data = serde_json::to_string(pr)?;
        let response = self
            .http_client
            .patch(&url, &json_data)
            .await?
            .error_for_status()?;
        Ok(serde_json::from_str(&response.body)?)
    }
}
