use std::sync::Arc;

use tokio::sync::watch;

use crate::models::ScrapeRun;

/// Single-writer, many-reader holder of the latest scrape snapshot.
///
/// Each publish swaps in a whole `Arc<ScrapeRun>`, so readers always see a
/// complete snapshot. Within one `run_id` a publish that would move progress
/// or any counter backwards is dropped whole, and once a run has published a
/// terminal state later publishes for that run are dropped too.
pub struct StatusPublisher {
    tx: watch::Sender<Arc<ScrapeRun>>,
}

impl StatusPublisher {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(ScrapeRun::idle()));
        Self { tx }
    }

    /// Replace the current snapshot. Returns false when the publish was
    /// dropped because the same run already finished or is further along.
    pub fn publish(&self, next: ScrapeRun) -> bool {
        self.tx.send_if_modified(|current| {
            if next.run_id.is_some() && next.run_id == current.run_id {
                if current.state.is_terminal() {
                    tracing::debug!(
                        "Ignoring snapshot for finished run {:?} ({:?})",
                        next.run_id,
                        next.state
                    );
                    return false;
                }
                if regresses(current, &next) {
                    tracing::debug!(
                        "Ignoring stale snapshot for run {:?} ({}% < {}%)",
                        next.run_id,
                        next.progress_percent,
                        current.progress_percent
                    );
                    return false;
                }
            }
            *current = Arc::new(next);
            true
        })
    }

    /// The latest snapshot. Never blocks on the run task.
    pub fn read(&self) -> Arc<ScrapeRun> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ScrapeRun>> {
        self.tx.subscribe()
    }
}

/// True when `next` is behind `current` on progress or any counter.
fn regresses(current: &ScrapeRun, next: &ScrapeRun) -> bool {
    next.progress_percent < current.progress_percent
        || next.jobs_found < current.jobs_found
        || next.jobs_saved < current.jobs_saved
        || next.jobs_skipped < current.jobs_skipped
        || next.jobs_failed < current.jobs_failed
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}
