use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde_json::json;
use thiserror::Error;
use tracing::error;
use tracing::warn;

/// Why a submission failed.
///
/// Remote failures keep the step that failed and the underlying cause. Only
/// the step is shown to clients.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("failed to ensure branch {branch}: {cause:#}")]
    Branch { branch: String, cause: anyhow::Error },

    #[error("failed to write {path} on {branch}: {cause:#}")]
    File {
        branch: String,
        path: String,
        cause: anyhow::Error,
    },

    /// The file changed on the branch between reading its SHA and writing.
    #[error("{path} on {branch} was modified concurrently: {cause:#}")]
    FileConflict {
        branch: String,
        path: String,
        cause: anyhow::Error,
    },

    #[error("failed to open or update pull request from {branch}: {cause:#}")]
    PullRequest { branch: String, cause: anyhow::Error },
}

impl SubmitError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingFields(_) | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to clients.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::MissingFields(_) => "Missing required fields",
            Self::InvalidBody(_) => "Invalid request body",
            Self::Branch { .. } => "Failed to create branch",
            Self::File { .. } | Self::FileConflict { .. } => "Failed to update file",
            Self::PullRequest { .. } => "Failed to create pull request",
        }
    }
}

impl IntoResponse for SubmitError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "submission failed");
        } else {
            warn!(error = %self, "submission rejected");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
