use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::App;
use crate::clients::github::CreatePullRequest;
use crate::clients::github::GithubOps;
use crate::clients::github::UpdatePullRequest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestOutcome {
    pub number: u64,
    pub url: String,
    /// False if an already open PR was refreshed.
    pub created: bool,
}

impl<G: GithubOps> App<G> {
    /// Open a PR from `branch` into the base branch, or refresh the one that's open.
    ///
    /// When several PRs are open for the same branch only the first one
    /// GitHub lists is touched.
    #[instrument(skip(self, comment))]
    pub async fn upsert_pull_request(
        &self,
        branch: &str,
        user_id: &str,
        comment: &str,
    ) -> Result<PullRequestOutcome> {
        let base_branch = &self.config.base_branch;
        let open_prs = self
            .gh
            .open_prs(branch, base_branch)
            .await
            .with_context(|| format!("Failed to list open PRs for {}", branch))?;
        if open_prs.len() > 1 {
            warn!(
                branch,
                count = open_prs.len(),
                "several open PRs for branch, updating the first"
            );
        }

        let (pr, created) = match open_prs.first() {
            Some(existing) => {
                let update = UpdatePullRequest {
                    title: format!("Updated Automated PR by {}", user_id),
                    body: format!("{}\n\nUpdated by {}.", comment, user_id),
                };
                let pr = self
                    .gh
                    .pr_update(existing.number, &update)
                    .await
                    .with_context(|| format!("Failed to update PR #{}", existing.number))?;
                (pr, false)
            }
            None => {
                let create = CreatePullRequest {
                    title: format!("Automated PR by {}", user_id),
                    head: branch.to_string(),
                    base: base_branch.clone(),
                    body: format!("{}\n\nSubmitted by {}.", comment, user_id),
                };
                let pr = self
                    .gh
                    .pr_create(&create)
                    .await
                    .with_context(|| format!("Failed to create PR for {}", branch))?;
                (pr, true)
            }
        };

        let number = pr.number;
        let Some(url) = pr.html_url else {
            bail!("GitHub returned PR #{} without a URL", number);
        };
        info!(branch, number, %url, created, "pull request ready");

        Ok(PullRequestOutcome {
            number,
            url,
            created,
        })
    }
}
