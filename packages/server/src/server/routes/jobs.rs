//! Job control surface: `POST {action, kind?, job_id?}` plus a status GET.

use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::common::JobId;
use crate::domains::enrichment::{ControlError, EnrichmentJob, JobKind};
use crate::server::app::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobAction {
    Start,
    Pause,
    Resume,
    Cancel,
    Status,
}

#[derive(Debug, Deserialize)]
pub struct JobControlRequest {
    pub action: JobAction,
    pub kind: Option<JobKind>,
    pub job_id: Option<JobId>,
}

/// `POST /api/enrichment/jobs`
pub async fn job_control_handler(
    Extension(state): Extension<AppState>,
    Json(request): Json<JobControlRequest>,
) -> Response {
    match request.action {
        JobAction::Start => {
            let Some(kind) = request.kind else {
                return bad_request("start requires a kind");
            };
            match state.manager.start(kind).await {
                Ok(job) => job_summary(&job),
                Err(e) => control_error(e),
            }
        }
        JobAction::Pause | JobAction::Resume | JobAction::Cancel | JobAction::Status => {
            let Some(job_id) = request.job_id else {
                return bad_request("action requires a job_id");
            };
            let result = match request.action {
                JobAction::Pause => state.manager.pause(job_id).await,
                JobAction::Resume => state.manager.resume(job_id).await,
                JobAction::Cancel => state.manager.cancel(job_id).await,
                JobAction::Status => {
                    return match state.manager.status(job_id).await {
                        Ok(report) => Json(json!({ "job": report })).into_response(),
                        Err(e) => not_found(&format!("{:#}", e)),
                    };
                }
                JobAction::Start => unreachable!(),
            };
            match result {
                Ok(job) => job_summary(&job),
                Err(e) => control_error(e),
            }
        }
    }
}

/// `GET /api/enrichment/jobs/:id`
pub async fn job_status_handler(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<JobId>,
) -> Response {
    match state.manager.status(job_id).await {
        Ok(report) => Json(json!({ "job": report })).into_response(),
        Err(e) => not_found(&format!("{:#}", e)),
    }
}

fn job_summary(job: &EnrichmentJob) -> Response {
    Json(json!({ "job_id": job.id, "status": job.status })).into_response()
}

fn control_error(error: ControlError) -> Response {
    match &error {
        ControlError::AlreadyActive(_) | ControlError::InvalidTransition { .. } => (
            StatusCode::CONFLICT,
            Json(json!({ "error": error.to_string() })),
        )
            .into_response(),
        ControlError::Other(e) => {
            tracing::error!(error = %format!("{:#}", e), "job control failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error" })),
            )
                .into_response()
        }
    }
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message })),
    )
        .into_response()
}

fn not_found(message: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": message })),
    )
        .into_response()
}
