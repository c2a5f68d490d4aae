pub mod health;
pub mod routes;
pub mod scrape;
pub mod sse;

use std::sync::Arc;
use std::time::Instant;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::daemon::events::BoardEvent;
use crate::models::BoardConfig;
use crate::scraper::ScrapeController;
use crate::storage::JobStore;

/// Shared application state for the Axum server.
pub struct AppState {
    pub job_store: Arc<dyn JobStore>,
    pub controller: Arc<ScrapeController>,
    pub event_tx: broadcast::Sender<BoardEvent>,
    pub config: Arc<BoardConfig>,
    pub start_time: Instant,
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Create the Axum router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/health", get(health::health_check))
        .route("/api/jobs", get(routes::list_jobs).post(routes::create_job))
        .route("/api/jobs/stats", get(routes::job_stats))
        .route(
            "/api/jobs/{id}",
            get(routes::get_job)
                .put(routes::update_job)
                .delete(routes::delete_job),
        )
        .route("/api/scrape/start", post(scrape::start_scrape))
        .route("/api/scrape/stop", post(scrape::stop_scrape))
        .route("/api/scrape/status", get(scrape::scrape_status))
        .route("/api/events", get(sse::sse_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
