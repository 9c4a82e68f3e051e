use anyhow::Context;
use anyhow::Result;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use tracing::info;
use tracing::instrument;

use crate::App;
use crate::clients::github::FileUpdate;
use crate::clients::github::GithubOps;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Created,
    /// Replaced the revision with this blob SHA.
    Updated { previous_sha: String },
}

/// Serialize `content` as JSON and base64 it for the contents API.
pub fn encode_content(content: &Value) -> Result<String> {
    let json = serde_json::to_string(content).context("Failed to serialize file content")?;
    Ok(STANDARD.encode(json))
}

impl<G: GithubOps> App<G> {
    /// Create or overwrite `path` on `branch` with `content`.
    ///
    /// The current blob SHA is read first and sent with the write. Another
    /// writer landing between the two calls makes GitHub reject the write.
    #[instrument(skip(self, content))]
    pub async fn upsert_file(
        &self,
        branch: &str,
        path: &str,
        content: &Value,
        message: &str,
    ) -> Result<FileOutcome> {
        let sha = self
            .gh
            .file_sha(path, branch)
            .await
            .with_context(|| format!("Failed to read {} on {}", path, branch))?;

        let update = FileUpdate {
            message: message.to_string(),
            content: encode_content(content)?,
            branch: branch.to_string(),
            sha: sha.clone(),
        };
        self.gh
            .put_file(path, &update)
            .await
            .with_context(|| format!("Failed to write {} on {}", path, branch))?;

        let outcome = match sha {
            Some(previous_sha) => FileOutcome::Updated { previous_sha },
            None => FileOutcome::Created,
        };
        info!(path, branch, ?outcome, "wrote file");
        Ok(outcome)
    }
}
