//! Test doubles shared by unit tests across modules.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, Notify, RwLock};
use uuid::Uuid;

use crate::errors::BoardError;
use crate::models::job::{apply_job_update, normalize_new_job, validate_job_update};
use crate::models::{JobFilter, JobRecord, JobRecordUpdate, JobStats, NewJobRecord};
use crate::scraper::dedup::DedupKey;
use crate::scraper::source::{JobSource, PageRequest, SourceError, SourcePage};
use crate::storage::JobStore;

// ---------------------------------------------------------------------------
// InMemoryJobStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryJobStore {
    pub jobs: RwLock<Vec<JobRecord>>,
    /// Titles whose insert fails with a storage error.
    pub failing_titles: HashSet<String>,
    pub fail_existing_keys: bool,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, new: NewJobRecord) -> JobRecord {
        self.create_job(new).await.expect("seed job")
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn list_jobs(&self, filter: &JobFilter) -> anyhow::Result<Vec<JobRecord>> {
        let mut jobs: Vec<JobRecord> = self
            .jobs
            .read()
            .await
            .iter()
            .filter(|j| filter.matches(j))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.posting_date.cmp(&a.posting_date));
        Ok(jobs)
    }

    async fn get_job(&self, id: Uuid) -> anyhow::Result<Option<JobRecord>> {
        Ok(self.jobs.read().await.iter().find(|j| j.id == id).cloned())
    }

    async fn create_job(&self, new: NewJobRecord) -> anyhow::Result<JobRecord> {
        if self.failing_titles.contains(&new.title) {
            return Err(BoardError::Storage(format!("disk full while saving '{}'", new.title)).into());
        }
        let new = normalize_new_job(new)?;
        let now = Utc::now();
        let job = JobRecord {
            id: Uuid::now_v7(),
            title: new.title,
            company: new.company,
            location: new.location,
            job_type: new.job_type,
            description: new.description,
            experience_level: new.experience_level,
            remote_allowed: new.remote_allowed,
            tags: new.tags,
            salary_range: new.salary_range,
            source_url: new.source_url,
            posting_date: new.posting_date.unwrap_or(now),
            is_scraped: new.is_scraped,
            created_at: now,
            updated_at: now,
        };
        self.jobs.write().await.push(job.clone());
        Ok(job)
    }

    async fn update_job(&self, id: Uuid, update: JobRecordUpdate) -> anyhow::Result<JobRecord> {
        validate_job_update(&update)?;
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| BoardError::NotFound(format!("Job with id '{}' not found", id)))?;
        apply_job_update(job, update);
        Ok(job.clone())
    }

    async fn delete_job(&self, id: Uuid) -> anyhow::Result<()> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|j| j.id != id);
        if jobs.len() == before {
            return Err(BoardError::NotFound(format!("Job with id '{}' not found", id)).into());
        }
        Ok(())
    }

    async fn existing_keys(&self) -> anyhow::Result<HashSet<DedupKey>> {
        if self.fail_existing_keys {
            return Err(BoardError::Storage("store offline".to_string()).into());
        }
        Ok(self.jobs.read().await.iter().map(DedupKey::from_record).collect())
    }

    async fn stats(&self) -> anyhow::Result<JobStats> {
        Ok(JobStats::from_jobs(&self.jobs.read().await, Utc::now()))
    }
}

// ---------------------------------------------------------------------------
// ScriptedSource
// ---------------------------------------------------------------------------

pub enum Step {
    Page(Vec<NewJobRecord>, bool),
    Fail(SourceError),
    /// Never resolves; only cancellation gets the run past it.
    Hang,
    /// Panics inside the fetch.
    Panic,
}

/// Replays a fixed script of page responses. Once the script runs out every
/// fetch returns an empty last page.
#[derive(Default)]
pub struct ScriptedSource {
    steps: Mutex<VecDeque<Step>>,
    pub calls: AtomicUsize,
    /// When set, each fetch waits for one permit before answering.
    pub gate: Option<Arc<Notify>>,
}

impl ScriptedSource {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            ..Default::default()
        }
    }

    pub fn gated(steps: Vec<Step>, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(steps)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobSource for ScriptedSource {
    async fn fetch_page(&self, _request: &PageRequest) -> Result<SourcePage, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let step = self.steps.lock().await.pop_front();
        match step {
            Some(Step::Page(candidates, has_more)) => Ok(SourcePage {
                candidates,
                has_more,
            }),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Hang) => std::future::pending().await,
            Some(Step::Panic) => panic!("scripted source crashed"),
            None => Ok(SourcePage::default()),
        }
    }
}

pub fn candidate(title: &str, company: &str, location: &str) -> NewJobRecord {
    NewJobRecord {
        title: title.to_string(),
        company: company.to_string(),
        location: location.to_string(),
        is_scraped: true,
        ..Default::default()
    }
}

/// `count` distinct candidates titled "{prefix} {n}".
pub fn candidates(prefix: &str, count: usize) -> Vec<NewJobRecord> {
    (0..count)
        .map(|n| candidate(&format!("{} {}", prefix, n), "Acme", "NY"))
        .collect()
}
