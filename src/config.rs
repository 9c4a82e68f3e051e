use std::fmt;

/// Public GitHub API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Process-wide settings, built once at startup and never mutated.
#[derive(Clone)]
pub struct Config {
    pub github_token: String,
    pub repo_owner: String,
    pub repo_name: String,
    /// Base URL of the GitHub REST API.
    pub api_url: String,
    /// The main line that branches start from and PRs merge into.
    pub base_branch: String,
    /// Branch prefix used when a submission doesn't name one.
    pub default_branch_prefix: String,
}

impl Config {
    /// Create a new config for the public GitHub API with a `main` base branch.
    pub fn new(github_token: String, repo_owner: String, repo_name: String) -> Self {
        Self {
            github_token,
            repo_owner,
            repo_name,
            api_url: DEFAULT_API_URL.to_string(),
            base_branch: "main".to_string(),
            default_branch_prefix: "changes".to_string(),
        }
    }

    /// Default config for tests
    pub fn default_for_tests() -> Self {
        Self::new(
            "test-token".to_string(),
            "octo".to_string(),
            "configs".to_string(),
        )
    }

    /// The per-user branch a submission is written to.
    pub fn submission_branch(&self, branch_name: Option<&str>, user_id: &str) -> String {
        let prefix = match branch_name {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.default_branch_prefix.as_str(),
        };
        format!("{}-{}", prefix, user_id)
    }
}

// Keep the token out of logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("github_token", &"<redacted>")
            .field("repo_owner", &self.repo_owner)
            .field("repo_name", &self.repo_name)
            .field("api_url", &self.api_url)
            .field("base_branch", &self.base_branch)
            .field("default_branch_prefix", &self.default_branch_prefix)
            .finish()
    }
}
