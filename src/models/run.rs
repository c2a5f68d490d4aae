use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::BoardError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed | RunState::Cancelled
        )
    }
}

/// Body of `POST /api/scrape/start`. Both fields are optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ScrapeRequest {
    pub max_jobs: Option<u32>,
    pub headless: Option<bool>,
}

/// A resolved, bounded scrape configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScrapeConfig {
    pub max_jobs: u32,
    pub headless: bool,
}

impl ScrapeRequest {
    /// Fill defaults and clamp `max_jobs` to `limit`. Zero is rejected.
    pub fn resolve(&self, default_max_jobs: u32, limit: u32) -> Result<ScrapeConfig, BoardError> {
        let max_jobs = self.max_jobs.unwrap_or(default_max_jobs);
        if max_jobs == 0 {
            return Err(BoardError::Validation(
                "max_jobs must be a positive integer".to_string(),
            ));
        }
        Ok(ScrapeConfig {
            max_jobs: max_jobs.min(limit.max(1)),
            headless: self.headless.unwrap_or(true),
        })
    }
}

/// Immutable snapshot of the current (or most recent) scrape run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapeRun {
    pub run_id: Option<Uuid>,
    pub state: RunState,
    pub progress_percent: u8,
    pub current_step: String,
    pub jobs_found: u32,
    pub jobs_saved: u32,
    pub jobs_skipped: u32,
    /// Candidates the store refused to persist.
    pub jobs_failed: u32,
    pub max_jobs: u32,
    pub headless: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl ScrapeRun {
    /// The snapshot a controller publishes before its first run.
    pub fn idle() -> Self {
        Self {
            run_id: None,
            state: RunState::Idle,
            progress_percent: 0,
            current_step: String::new(),
            jobs_found: 0,
            jobs_saved: 0,
            jobs_skipped: 0,
            jobs_failed: 0,
            max_jobs: 0,
            headless: true,
            started_at: None,
            finished_at: None,
            error_message: None,
        }
    }

    pub fn started(run_id: Uuid, config: ScrapeConfig) -> Self {
        Self {
            run_id: Some(run_id),
            state: RunState::Running,
            current_step: "Starting scraper".to_string(),
            max_jobs: config.max_jobs,
            headless: config.headless,
            started_at: Some(Utc::now()),
            ..Self::idle()
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }
}

/// Wire shape of `GET /api/scrape/status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapeStatus {
    pub state: RunState,
    pub is_running: bool,
    pub run_id: Option<Uuid>,
    pub progress_percent: u8,
    pub current_step: String,
    pub jobs_found: u32,
    pub jobs_saved: u32,
    pub jobs_skipped: u32,
    pub jobs_failed: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub last_run_finished_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub poll_interval_secs: u64,
}

impl ScrapeStatus {
    pub fn from_snapshot(run: &ScrapeRun, poll_interval_secs: u64) -> Self {
        Self {
            state: run.state,
            is_running: run.is_running(),
            run_id: run.run_id,
            progress_percent: run.progress_percent,
            current_step: run.current_step.clone(),
            jobs_found: run.jobs_found,
            jobs_saved: run.jobs_saved,
            jobs_skipped: run.jobs_skipped,
            jobs_failed: run.jobs_failed,
            started_at: run.started_at,
            last_run_finished_at: run.finished_at,
            error_message: run.error_message.clone(),
            poll_interval_secs,
        }
    }
}
