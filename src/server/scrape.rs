use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::routes::{board_error_response, error_response};
use super::AppState;
use crate::models::{ScrapeRequest, ScrapeStatus};

#[derive(Debug, Serialize, Deserialize)]
pub struct ScrapeAck {
    pub run_id: Uuid,
    pub message: String,
}

/// POST /api/scrape/start
///
/// The body is optional; an empty body starts a run with the defaults.
pub async fn start_scrape(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ScrapeRequest::default()
    } else {
        match serde_json::from_slice::<ScrapeRequest>(&body) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Rejected scrape start body: {}", e);
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "validation_error",
                    &format!("Invalid scrape request: {}", e),
                );
            }
        }
    };

    match state.controller.start(request).await {
        Ok(handle) => (
            StatusCode::ACCEPTED,
            Json(ScrapeAck {
                run_id: handle.run_id,
                message: "Scraping started".to_string(),
            }),
        )
            .into_response(),
        Err(e) => board_error_response(&e),
    }
}

/// POST /api/scrape/stop
pub async fn stop_scrape(State(state): State<Arc<AppState>>) -> Response {
    match state.controller.stop().await {
        Ok(run_id) => (
            StatusCode::OK,
            Json(ScrapeAck {
                run_id,
                message: "Stop requested".to_string(),
            }),
        )
            .into_response(),
        Err(e) => board_error_response(&e),
    }
}

/// GET /api/scrape/status
pub async fn scrape_status(State(state): State<Arc<AppState>>) -> Json<ScrapeStatus> {
    let snapshot = state.controller.status();
    Json(ScrapeStatus::from_snapshot(
        &snapshot,
        state.config.poll_interval_secs,
    ))
}
