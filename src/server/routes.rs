use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use super::AppState;
use crate::daemon::events::{BoardEvent, JobChangeKind};
use crate::errors::BoardError;
use crate::models::{JobFilter, JobRecordUpdate, NewJobRecord};

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

pub(crate) fn error_response(status: StatusCode, error: &str, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        }),
    )
        .into_response()
}

/// Map a domain error onto a status code and `{error, message}` body.
pub(crate) fn board_error_response(err: &BoardError) -> Response {
    let (status, code) = match err {
        BoardError::AlreadyRunning => (StatusCode::CONFLICT, "already_running"),
        BoardError::NotRunning => (StatusCode::CONFLICT, "not_running"),
        BoardError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        BoardError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        BoardError::TransientFetch(_) | BoardError::UnrecoverableSource(_) => {
            (StatusCode::BAD_GATEWAY, "source_error")
        }
        BoardError::Storage(_) | BoardError::Internal(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    };
    error_response(status, code, &err.to_string())
}

/// Store errors carry a `BoardError` when the cause is the caller's fault.
fn store_error_response(action: &str, err: &anyhow::Error) -> Response {
    match err.downcast_ref::<BoardError>() {
        Some(board_err) => board_error_response(board_err),
        None => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            &format!("Failed to {}: {:#}", action, err),
        ),
    }
}

fn parse_job_id(id: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(id).map_err(|e| {
        tracing::warn!("Invalid job id '{}': {}", id, e);
        board_error_response(&BoardError::from(e))
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/jobs
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<JobFilter>,
) -> Response {
    match state.job_store.list_jobs(&filter).await {
        Ok(jobs) => {
            tracing::debug!("Listing {} jobs", jobs.len());
            (StatusCode::OK, Json(jobs)).into_response()
        }
        Err(e) => {
            tracing::warn!("Failed to list jobs: {:#}", e);
            store_error_response("list jobs", &e)
        }
    }
}

/// GET /api/jobs/stats
pub async fn job_stats(State(state): State<Arc<AppState>>) -> Response {
    match state.job_store.stats().await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => {
            tracing::warn!("Failed to compute job stats: {:#}", e);
            store_error_response("compute stats", &e)
        }
    }
}

/// GET /api/jobs/{id}
pub async fn get_job(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let id = match parse_job_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.job_store.get_job(id).await {
        Ok(Some(job)) => (StatusCode::OK, Json(job)).into_response(),
        Ok(None) => {
            tracing::warn!("Job not found: '{}'", id);
            error_response(
                StatusCode::NOT_FOUND,
                "not_found",
                &format!("Job with id '{}' not found", id),
            )
        }
        Err(e) => {
            tracing::warn!("Failed to fetch job '{}': {:#}", id, e);
            store_error_response("fetch job", &e)
        }
    }
}

/// POST /api/jobs
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(new_job): Json<NewJobRecord>,
) -> Response {
    match state.job_store.create_job(new_job).await {
        Ok(job) => {
            tracing::info!("Job '{}' at '{}' created (id: {})", job.title, job.company, job.id);
            let _ = state
                .event_tx
                .send(BoardEvent::job_changed(job.id, JobChangeKind::Added));
            (StatusCode::CREATED, Json(job)).into_response()
        }
        Err(e) => {
            tracing::warn!("Job creation failed: {:#}", e);
            store_error_response("create job", &e)
        }
    }
}

/// PUT /api/jobs/{id}
pub async fn update_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<JobRecordUpdate>,
) -> Response {
    let id = match parse_job_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.job_store.update_job(id, update).await {
        Ok(updated) => {
            tracing::info!("Job '{}' updated (id: {})", updated.title, updated.id);
            let _ = state
                .event_tx
                .send(BoardEvent::job_changed(updated.id, JobChangeKind::Updated));
            (StatusCode::OK, Json(updated)).into_response()
        }
        Err(e) => {
            tracing::warn!("Job update failed for '{}': {:#}", id, e);
            store_error_response("update job", &e)
        }
    }
}

/// DELETE /api/jobs/{id}
pub async fn delete_job(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let id = match parse_job_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.job_store.delete_job(id).await {
        Ok(()) => {
            tracing::info!("Job {} deleted", id);
            let _ = state
                .event_tx
                .send(BoardEvent::job_changed(id, JobChangeKind::Removed));
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            tracing::warn!("Job deletion failed for '{}': {:#}", id, e);
            store_error_response("delete job", &e)
        }
    }
}
