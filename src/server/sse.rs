use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tokio_stream::StreamExt;

use super::AppState;
use crate::daemon::events::BoardEvent;

/// Logs at debug level when the SSE stream is dropped (client disconnects).
struct SseDropGuard;

impl Drop for SseDropGuard {
    fn drop(&mut self) {
        tracing::debug!("SSE client disconnected");
    }
}

fn to_sse(event: &BoardEvent) -> Result<Event, Infallible> {
    match serde_json::to_string(event) {
        Ok(data) => Ok(Event::default().event(event.name()).data(data)),
        Err(e) => Ok(Event::default().comment(format!("unserializable event: {}", e))),
    }
}

/// GET /api/events
///
/// Streams every published scrape snapshot (starting with the current one)
/// interleaved with job change notifications.
pub async fn sse_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::info!("SSE client connected");

    let _drop_guard = SseDropGuard;

    let progress = WatchStream::new(state.controller.subscribe()).map(move |run| {
        let _ = &_drop_guard;
        to_sse(&BoardEvent::ScrapeProgress { run })
    });

    let changes = BroadcastStream::new(state.event_tx.subscribe()).map(|result| match result {
        Ok(event) => to_sse(&event),
        Err(_) => Ok(Event::default().comment("lagged: some events were missed")),
    });

    Sse::new(progress.merge(changes)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}
