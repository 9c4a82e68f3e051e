//! Clients for the remote version control service.
//!
//! - [`github`]: The [`github::GithubOps`] trait covering refs, contents and pull requests,
//!   and [`github::GithubClient`], its real implementation
//! - [`github_curl`]: Curl-based HTTP client for making GitHub API requests
//!
//! Everything above this layer talks to [`github::GithubOps`] so it can be mocked in tests.

pub mod github;
pub mod github_curl;
