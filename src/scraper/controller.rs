use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::daemon::events::{BoardEvent, JobChangeKind};
use crate::errors::BoardError;
use crate::models::{BoardConfig, RunState, ScrapeConfig, ScrapeRequest, ScrapeRun};
use crate::scraper::dedup::{self, DedupKey, Resolution};
use crate::scraper::source::{JobSource, PageRequest, SourceError, SourcePage};
use crate::scraper::status::StatusPublisher;
use crate::storage::JobStore;

/// Returned by a successful `start`. The run itself continues in the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunHandle {
    pub run_id: Uuid,
}

/// Knobs the controller takes from `BoardConfig`.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub default_max_jobs: u32,
    pub max_jobs_limit: u32,
    pub fetch_retries: u32,
    pub retry_backoff: Duration,
}

impl From<&BoardConfig> for ControllerSettings {
    fn from(config: &BoardConfig) -> Self {
        Self {
            default_max_jobs: config.default_max_jobs,
            max_jobs_limit: config.max_jobs_limit,
            fetch_retries: config.fetch_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

struct ActiveRun {
    run_id: Uuid,
    cancel: CancellationToken,
    join_handle: tokio::task::JoinHandle<()>,
}

/// Owns the lifecycle of at most one scrape run at a time.
pub struct ScrapeController {
    source: Arc<dyn JobSource>,
    store: Arc<dyn JobStore>,
    publisher: Arc<StatusPublisher>,
    settings: ControllerSettings,
    events: Option<broadcast::Sender<BoardEvent>>,
    active: Mutex<Option<ActiveRun>>,
}

impl ScrapeController {
    pub fn new(
        source: Arc<dyn JobSource>,
        store: Arc<dyn JobStore>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            source,
            store,
            publisher: Arc::new(StatusPublisher::new()),
            settings,
            events: None,
            active: Mutex::new(None),
        }
    }

    /// Announce every job a run saves on `events`.
    pub fn with_events(mut self, events: broadcast::Sender<BoardEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Begin a run unless one is already in progress.
    ///
    /// The busy check and the publish of the fresh `Running` snapshot happen
    /// under one lock, so concurrent callers cannot both get through.
    pub async fn start(&self, request: ScrapeRequest) -> Result<RunHandle, BoardError> {
        let config = request.resolve(self.settings.default_max_jobs, self.settings.max_jobs_limit)?;

        let mut active = self.active.lock().await;
        if self.publisher.read().is_running() {
            tracing::warn!("Scrape start rejected: a run is already in progress");
            return Err(BoardError::AlreadyRunning);
        }

        let run_id = Uuid::now_v7();
        let cancel = CancellationToken::new();
        let snapshot = ScrapeRun::started(run_id, config);
        self.publisher.publish(snapshot.clone());

        let task = RunTask {
            config,
            source: Arc::clone(&self.source),
            store: Arc::clone(&self.store),
            publisher: Arc::clone(&self.publisher),
            events: self.events.clone(),
            cancel: cancel.clone(),
            fetch_retries: self.settings.fetch_retries,
            retry_backoff: self.settings.retry_backoff,
            snapshot,
        };
        let join_handle = tokio::spawn(task.run());

        if let Some(previous) = active.replace(ActiveRun {
            run_id,
            cancel,
            join_handle,
        }) {
            tracing::debug!("Released handle of finished run {}", previous.run_id);
        }

        tracing::info!(
            "Scrape run {} started (max_jobs: {}, headless: {})",
            run_id,
            config.max_jobs,
            config.headless
        );
        Ok(RunHandle { run_id })
    }

    /// Ask the active run to stop at its next checkpoint.
    pub async fn stop(&self) -> Result<Uuid, BoardError> {
        let active = self.active.lock().await;
        let snapshot = self.publisher.read();
        match active.as_ref() {
            Some(run) if snapshot.is_running() && snapshot.run_id == Some(run.run_id) => {
                run.cancel.cancel();
                tracing::info!("Cancellation requested for scrape run {}", run.run_id);
                Ok(run.run_id)
            }
            _ => {
                tracing::warn!("Scrape stop rejected: no run in progress");
                Err(BoardError::NotRunning)
            }
        }
    }

    /// The latest published snapshot.
    pub fn status(&self) -> Arc<ScrapeRun> {
        self.publisher.read()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ScrapeRun>> {
        self.publisher.subscribe()
    }

    /// Cancel any active run and wait up to `grace` for it to finish.
    pub async fn shutdown(&self, grace: Duration) {
        let Some(run) = self.active.lock().await.take() else {
            return;
        };
        run.cancel.cancel();
        match tokio::time::timeout(grace, run.join_handle).await {
            Ok(Ok(())) => tracing::debug!("Scrape run {} finished during shutdown", run.run_id),
            Ok(Err(e)) => tracing::error!("Scrape run {} task failed: {}", run.run_id, e),
            Err(_) => tracing::warn!(
                "Scrape run {} did not stop within {:?}, abandoning it",
                run.run_id,
                grace
            ),
        }
    }
}

enum RunOutcome {
    Completed,
    Cancelled,
}

enum FetchOutcome {
    Page(SourcePage),
    Cancelled,
    Failed(BoardError),
}

/// State owned by one spawned run. Only this task publishes for its run_id.
struct RunTask {
    config: ScrapeConfig,
    source: Arc<dyn JobSource>,
    store: Arc<dyn JobStore>,
    publisher: Arc<StatusPublisher>,
    events: Option<broadcast::Sender<BoardEvent>>,
    cancel: CancellationToken,
    fetch_retries: u32,
    retry_backoff: Duration,
    snapshot: ScrapeRun,
}

impl RunTask {
    async fn run(mut self) {
        let _guard = RunGuard {
            run_id: self.snapshot.run_id,
            publisher: Arc::clone(&self.publisher),
        };
        let outcome = self.execute().await;

        let mut last = self.snapshot.clone();
        last.finished_at = Some(Utc::now());
        match outcome {
            Ok(RunOutcome::Completed) => {
                last.state = RunState::Completed;
                last.progress_percent = 100;
                last.current_step = format!(
                    "Completed: {} saved, {} duplicates skipped",
                    last.jobs_saved, last.jobs_skipped
                );
                tracing::info!(
                    "Scrape run {:?} completed: found {}, saved {}, skipped {}, failed {}",
                    last.run_id,
                    last.jobs_found,
                    last.jobs_saved,
                    last.jobs_skipped,
                    last.jobs_failed
                );
            }
            Ok(RunOutcome::Cancelled) => {
                last.state = RunState::Cancelled;
                last.current_step = "Cancelled".to_string();
                tracing::info!(
                    "Scrape run {:?} cancelled after {} jobs",
                    last.run_id,
                    last.jobs_found
                );
            }
            Err(err) => {
                last.state = RunState::Failed;
                last.current_step = "Failed".to_string();
                tracing::error!("Scrape run {:?} failed: {}", last.run_id, err);
                last.error_message = Some(err.to_string());
            }
        }
        self.publisher.publish(last);
    }

    async fn execute(&mut self) -> Result<RunOutcome, BoardError> {
        self.step("Loading existing jobs".to_string());
        let mut seen: HashSet<DedupKey> = self
            .store
            .existing_keys()
            .await
            .map_err(|e| BoardError::Storage(format!("Failed to load existing jobs: {:#}", e)))?;

        let mut page = 1;
        loop {
            if self.cancel.is_cancelled() {
                return Ok(RunOutcome::Cancelled);
            }
            if self.limit_reached() {
                break;
            }

            self.step(format!("Fetching page {}", page));
            let fetched = match self.fetch_with_retry(page).await {
                FetchOutcome::Page(p) => p,
                FetchOutcome::Cancelled => return Ok(RunOutcome::Cancelled),
                FetchOutcome::Failed(err) => return Err(err),
            };
            tracing::debug!("Page {} returned {} candidates", page, fetched.candidates.len());
            if fetched.candidates.is_empty() {
                break;
            }

            for candidate in fetched.candidates {
                if self.cancel.is_cancelled() {
                    return Ok(RunOutcome::Cancelled);
                }
                if self.limit_reached() {
                    break;
                }

                self.snapshot.jobs_found += 1;
                match dedup::resolve(&candidate, &seen) {
                    Resolution::Duplicate => {
                        tracing::debug!("Skipping duplicate '{}'", candidate.title);
                        self.snapshot.jobs_skipped += 1;
                    }
                    Resolution::New(key) => {
                        let title = candidate.title.clone();
                        match self.store.create_job(candidate).await {
                            Ok(job) => {
                                tracing::debug!("Saved '{}' ({})", job.title, job.id);
                                self.snapshot.jobs_saved += 1;
                                seen.insert(key);
                                if let Some(events) = &self.events {
                                    let _ = events
                                        .send(BoardEvent::job_changed(job.id, JobChangeKind::Added));
                                }
                            }
                            Err(e) => {
                                tracing::warn!("Failed to save scraped job '{}': {:#}", title, e);
                                self.snapshot.jobs_failed += 1;
                            }
                        }
                    }
                }
                self.step(format!(
                    "Processed {} of {} jobs",
                    self.snapshot.jobs_found, self.config.max_jobs
                ));
            }

            if !fetched.has_more {
                break;
            }
            page += 1;
        }

        Ok(RunOutcome::Completed)
    }

    /// Fetch one page, retrying transient errors with exponential backoff.
    async fn fetch_with_retry(&self, page: u32) -> FetchOutcome {
        let request = PageRequest {
            page,
            headless: self.config.headless,
        };
        let mut attempt: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return FetchOutcome::Cancelled;
            }

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return FetchOutcome::Cancelled,
                result = self.source.fetch_page(&request) => result,
            };

            match result {
                Ok(fetched) => return FetchOutcome::Page(fetched),
                Err(err @ SourceError::Unrecoverable(_)) => {
                    return FetchOutcome::Failed(err.into());
                }
                Err(SourceError::Transient(message)) => {
                    if attempt >= self.fetch_retries {
                        return FetchOutcome::Failed(BoardError::TransientFetch(format!(
                            "Giving up on page {} after {} attempts: {}",
                            page,
                            attempt + 1,
                            message
                        )));
                    }
                    let delay = self.retry_backoff.saturating_mul(2u32.saturating_pow(attempt));
                    attempt += 1;
                    tracing::warn!(
                        "Page {} fetch failed ({}), retry {}/{} in {:?}",
                        page,
                        message,
                        attempt,
                        self.fetch_retries,
                        delay
                    );
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return FetchOutcome::Cancelled,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    fn limit_reached(&self) -> bool {
        self.snapshot.jobs_found >= self.config.max_jobs
    }

    /// Publish the current counters with a new step label.
    fn step(&mut self, label: String) {
        self.snapshot.current_step = label;
        let max = self.config.max_jobs.max(1);
        self.snapshot.progress_percent = (self.snapshot.jobs_found.saturating_mul(100) / max).min(99) as u8;
        self.publisher.publish(self.snapshot.clone());
    }
}

/// Fails a run whose task goes away (panic or abort) before publishing a
/// terminal snapshot, so the controller never stays busy.
struct RunGuard {
    run_id: Option<Uuid>,
    publisher: Arc<StatusPublisher>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let current = self.publisher.read();
        if current.run_id != self.run_id || !current.is_running() {
            return;
        }
        let err = BoardError::Internal("scrape task ended unexpectedly".to_string());
        tracing::error!("Scrape run {:?} failed: {}", self.run_id, err);

        let mut last = (*current).clone();
        last.state = RunState::Failed;
        last.current_step = "Failed".to_string();
        last.finished_at = Some(Utc::now());
        last.error_message = Some(err.to_string());
        self.publisher.publish(last);
    }
}
