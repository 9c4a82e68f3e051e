use serde::Deserialize;
use serde::Deserializer;
use serde_json::Value;
use tracing::info;
use tracing::instrument;

use crate::App;
use crate::clients::github::GithubOps;
use crate::clients::github_curl::GithubApiError;
use crate::error::SubmitError;

/// A submission as posted by a client. Nothing is required at this stage,
/// and a text field holding anything but a string reads as absent.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default, deserialize_with = "string_only")]
    pub file_path: Option<String>,
    pub file_content: Option<Value>,
    #[serde(default, deserialize_with = "string_only")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "string_only")]
    pub pr_comment: Option<String>,
    #[serde(default, deserialize_with = "string_only")]
    pub branch_name: Option<String>,
}

fn string_only<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

/// A submission with every required field present.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub file_path: String,
    pub file_content: Value,
    pub user_id: String,
    pub pr_comment: String,
    pub branch_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub branch: String,
    pub pr_url: String,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// `null`, `""`, `{}` and `[]` count as no content.
fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

impl SubmitRequest {
    pub fn validate(self) -> Result<Submission, SubmitError> {
        let file_path = present(self.file_path);
        let file_content = self.file_content.filter(has_content);
        let user_id = present(self.user_id);
        let pr_comment = present(self.pr_comment);

        match (file_path, file_content, user_id, pr_comment) {
            (Some(file_path), Some(file_content), Some(user_id), Some(pr_comment)) => {
                Ok(Submission {
                    file_path,
                    file_content,
                    user_id,
                    pr_comment,
                    branch_name: self.branch_name,
                })
            }
            (file_path, file_content, user_id, pr_comment) => {
                let missing = [
                    ("file_path", file_path.is_none()),
                    ("file_content", file_content.is_none()),
                    ("user_id", user_id.is_none()),
                    ("pr_comment", pr_comment.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, missing)| missing.then_some(name))
                .collect();
                Err(SubmitError::MissingFields(missing))
            }
        }
    }
}

fn is_conflict(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<GithubApiError>()
            .is_some_and(|api_err| api_err.status == 409)
    })
}

impl<G: GithubOps> App<G> {
    /// Propose `submission` as a PR.
    ///
    /// 1. Make sure the user's branch exists.
    /// 2. Write the file to it.
    /// 3. Open a PR into the base branch, or refresh the open one.
    ///
    /// The first failing step ends the submission. Earlier steps are not
    /// undone.
    #[instrument(skip_all, fields(user_id = %submission.user_id, path = %submission.file_path))]
    pub async fn submit(&self, submission: &Submission) -> Result<Submitted, SubmitError> {
        let branch = self
            .config
            .submission_branch(submission.branch_name.as_deref(), &submission.user_id);

        self.ensure_branch(&branch)
            .await
            .map_err(|cause| SubmitError::Branch {
                branch: branch.clone(),
                cause,
            })?;

        let commit_message = format!(
            "Update {} by {}",
            submission.file_path, submission.user_id
        );
        self.upsert_file(
            &branch,
            &submission.file_path,
            &submission.file_content,
            &commit_message,
        )
        .await
        .map_err(|cause| {
            let branch = branch.clone();
            let path = submission.file_path.clone();
            if is_conflict(&cause) {
                SubmitError::FileConflict {
                    branch,
                    path,
                    cause,
                }
            } else {
                SubmitError::File {
                    branch,
                    path,
                    cause,
                }
            }
        })?;

        let pr = self
            .upsert_pull_request(&branch, &submission.user_id, &submission.pr_comment)
            .await
            .map_err(|cause| SubmitError::PullRequest {
                branch: branch.clone(),
                cause,
            })?;
        info!(%branch, pr_url = %pr.url, created = pr.created, "submission complete");

        Ok(Submitted {
            branch,
            pr_url: pr.url,
        })
    }
}
