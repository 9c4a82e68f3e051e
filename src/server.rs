use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::header::CONTENT_TYPE;
use axum::routing::post;
use serde::Serialize;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::App;
use crate::clients::github::GithubOps;
use crate::commands::submit::SubmitRequest;
use crate::error::SubmitError;

pub const SUBMIT_PATH: &str = "/submit-changes";

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub message: &'static str,
    pub pr_url: String,
}

/// Build the HTTP router.
pub fn router<G: GithubOps + 'static>(app: Arc<App<G>>, cors: CorsLayer) -> Router {
    Router::new()
        .route(SUBMIT_PATH, post(submit_changes::<G>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

/// CORS for browser front-ends. `None` allows any origin.
pub fn cors_layer(allowed_origin: Option<&str>) -> Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_methods([Method::POST])
        .allow_headers([CONTENT_TYPE]);
    Ok(match allowed_origin {
        Some(origin) => cors.allow_origin(
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {}", origin))?,
        ),
        None => cors.allow_origin(Any),
    })
}

async fn submit_changes<G: GithubOps>(
    State(app): State<Arc<App<G>>>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, SubmitError> {
    let Json(request) = body.map_err(|rejection| SubmitError::InvalidBody(rejection.body_text()))?;
    let submission = request.validate()?;
    let submitted = app.submit(&submission).await?;
    Ok(Json(SubmitResponse {
        message: "Pull request created successfully",
        pr_url: submitted.pr_url,
    }))
}
