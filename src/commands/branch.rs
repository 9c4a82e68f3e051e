use anyhow::Context;
use anyhow::Result;
use tracing::info;
use tracing::instrument;

use crate::App;
use crate::clients::github::CommitSha;
use crate::clients::github::GithubOps;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchOutcome {
    /// The branch was already there and was left alone.
    Existed,
    /// The branch was created at this commit of the base branch.
    Created(CommitSha),
}

impl<G: GithubOps> App<G> {
    /// Make sure `branch` exists, creating it from the tip of the base branch.
    ///
    /// An existing branch is reused as-is; its tip is never reset.
    #[instrument(skip(self))]
    pub async fn ensure_branch(&self, branch: &str) -> Result<BranchOutcome> {
        if self
            .gh
            .branch_exists(branch)
            .await
            .with_context(|| format!("Failed to look up branch {}", branch))?
        {
            info!(branch, "branch already exists");
            return Ok(BranchOutcome::Existed);
        }

        let base_branch = &self.config.base_branch;
        let tip = self
            .gh
            .branch_tip(base_branch)
            .await
            .with_context(|| format!("Failed to read tip of {}", base_branch))?;

        self.gh
            .create_branch(branch, &tip)
            .await
            .with_context(|| format!("Failed to create branch {} at {}", branch, tip))?;
        info!(branch, %tip, "created branch");

        Ok(BranchOutcome::Created(tip))
    }
}
