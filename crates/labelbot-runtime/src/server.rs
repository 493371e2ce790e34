//! HTTP server wiring for the labeling bot.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;

use labelbot_classifier::IssueClassifier;
use labelbot_github::IssuePlatform;
use labelbot_store::LabelStore;

use crate::config::RuntimeConfig;
use crate::event::extract_issue_opened_event;
use crate::ingest::{process_issue_opened, IngestOutcome};
use crate::reconciler::FeedbackReconciler;
use crate::render::render_predictions_page;
use crate::signature::{verify_github_signature, SIGNATURE_HEADER};

pub const EVENT_HANDLER_ENDPOINT: &str = "/event_handler";
pub const UPDATE_FEEDBACK_ENDPOINT: &str = "/update_feedback/{owner}/{repo}";
pub const PREDICTIONS_API_ENDPOINT: &str = "/api/predictions/{owner}/{repo}";
pub const DATA_PAGE_ENDPOINT: &str = "/data/{owner}/{repo}";
pub const HEALTH_ENDPOINT: &str = "/healthz";

/// Shared state behind every handler: the immutable config plus the three
/// injected collaborators.
pub struct ServerState {
    pub config: RuntimeConfig,
    pub classifier: Arc<dyn IssueClassifier>,
    pub platform: Arc<dyn IssuePlatform>,
    pub store: Arc<dyn LabelStore>,
}

pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route(EVENT_HANDLER_ENDPOINT, post(handle_event))
        .route(UPDATE_FEEDBACK_ENDPOINT, post(handle_update_feedback))
        .route(PREDICTIONS_API_ENDPOINT, get(handle_predictions_api))
        .route(DATA_PAGE_ENDPOINT, get(handle_data_page))
        .route(HEALTH_ENDPOINT, get(handle_health))
        .with_state(state)
}

/// Binds the configured address and serves until ctrl-c.
pub async fn run_server(state: Arc<ServerState>) -> Result<()> {
    let bind_addr = state
        .config
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid --bind '{}'", state.config.bind))?;
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind labelbot server on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound server address")?;

    tracing::info!(addr = %local_addr, "labelbot server listening");
    if state.config.webhook_secret.is_none() {
        tracing::warn!("webhook signature verification is disabled");
    }

    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("labelbot server exited unexpectedly")?;
    Ok(())
}

async fn handle_event(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = &state.config.webhook_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());
        if let Err(error) = verify_github_signature(&body, signature, secret) {
            tracing::warn!(%error, "rejected webhook delivery");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "signature verification failed" })),
            )
                .into_response();
        }
    }

    let event = match extract_issue_opened_event(&body) {
        Ok(Some(event)) => event,
        Ok(None) => {
            return (StatusCode::OK, Json(json!({ "status": "ignored" }))).into_response();
        }
        Err(error) => {
            tracing::warn!(%error, "rejected malformed webhook payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": error.to_string() })),
            )
                .into_response();
        }
    };

    match process_issue_opened(&state, event).await {
        Ok(IngestOutcome::Labeled(prediction)) => (
            StatusCode::OK,
            Json(json!({
                "status": "labeled",
                "class": prediction.predicted_class,
                "probability": prediction.probability,
                "comment_id": prediction.comment_id,
            })),
        )
            .into_response(),
        Ok(IngestOutcome::Silent) => {
            (StatusCode::OK, Json(json!({ "status": "silent" }))).into_response()
        }
        Err(error) => {
            tracing::error!(%error, "failed to process issue opened event");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": error.to_string() })),
            )
                .into_response()
        }
    }
}

async fn handle_update_feedback(
    State(state): State<Arc<ServerState>>,
    Path((owner, repo)): Path<(String, String)>,
) -> Response {
    let reconciler = FeedbackReconciler::new(state.platform.clone(), state.store.clone());
    match reconciler.reconcile(&owner, &repo).await {
        Ok(report) => (StatusCode::OK, Json(json!(report))).into_response(),
        Err(error) => {
            tracing::error!(%error, %owner, %repo, "feedback reconciliation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": error.to_string() })),
            )
                .into_response()
        }
    }
}

async fn handle_predictions_api(
    State(state): State<Arc<ServerState>>,
    Path((owner, repo)): Path<(String, String)>,
) -> Response {
    match state.store.predictions_for_repo(&owner, &repo).await {
        Ok(predictions) => (
            StatusCode::OK,
            Json(json!({
                "owner": owner,
                "repo": repo,
                "predictions": predictions,
            })),
        )
            .into_response(),
        Err(error) => {
            tracing::error!(%error, %owner, %repo, "failed to load predictions");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": error.to_string() })),
            )
                .into_response()
        }
    }
}

async fn handle_data_page(
    State(state): State<Arc<ServerState>>,
    Path((owner, repo)): Path<(String, String)>,
) -> Response {
    let predictions = match state.store.predictions_for_repo(&owner, &repo).await {
        Ok(predictions) => predictions,
        Err(error) => {
            tracing::error!(%error, %owner, %repo, "failed to load predictions");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html("<p>failed to load predictions</p>".to_string()),
            )
                .into_response();
        }
    };
    match render_predictions_page(&owner, &repo, &predictions) {
        Ok(html) => (StatusCode::OK, Html(html)).into_response(),
        Err(error) => {
            tracing::error!(%error, "failed to render predictions page");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html("<p>failed to render predictions</p>".to_string()),
            )
                .into_response()
        }
    }
}

async fn handle_health(State(state): State<Arc<ServerState>>) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "webhook_signing": state.config.webhook_secret.is_some(),
        })),
    )
        .into_response()
}
