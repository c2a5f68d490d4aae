use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::BoardError;
use crate::models::job::{apply_job_update, normalize_new_job, validate_job_update};
use crate::models::{JobFilter, JobRecord, JobRecordUpdate, JobStats, NewJobRecord};
use crate::scraper::dedup::DedupKey;
use crate::storage::JobStore;

pub struct JsonJobStore {
    file_path: PathBuf,
    cache: RwLock<Vec<JobRecord>>,
}

impl JsonJobStore {
    /// Open the store in `data_dir`, loading `jobs.json` if present.
    ///
    /// A corrupted `jobs.json` is copied to `jobs.json.bak` and the store
    /// starts empty.
    pub async fn new(data_dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&data_dir)
            .await
            .context("Failed to create data directory")?;

        let file_path = data_dir.join("jobs.json");

        let jobs = if file_path.exists() {
            let content = tokio::fs::read_to_string(&file_path)
                .await
                .context("Failed to read jobs.json")?;
            match serde_json::from_str::<Vec<JobRecord>>(&content) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!(
                        "jobs.json is corrupted ({}), creating backup and starting empty",
                        e
                    );
                    let backup_path = data_dir.join("jobs.json.bak");
                    if let Err(backup_err) = tokio::fs::copy(&file_path, &backup_path).await {
                        tracing::error!(
                            "Failed to create backup of corrupted jobs.json: {}",
                            backup_err
                        );
                    }
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        tracing::debug!("Loaded {} jobs from {}", jobs.len(), file_path.display());

        Ok(Self {
            file_path,
            cache: RwLock::new(jobs),
        })
    }

    /// Write to `jobs.json.tmp`, then rename over `jobs.json`.
    async fn persist(&self, jobs: &[JobRecord]) -> Result<()> {
        let tmp_path = self.file_path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(jobs).context("Failed to serialize jobs")?;

        tokio::fs::write(&tmp_path, json.as_bytes())
            .await
            .context("Failed to write temporary jobs file")?;

        tokio::fs::rename(&tmp_path, &self.file_path)
            .await
            .context("Failed to rename temporary jobs file")?;

        Ok(())
    }
}

#[async_trait]
impl JobStore for JsonJobStore {
    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<JobRecord>> {
        let cache = self.cache.read().await;
        let mut jobs: Vec<JobRecord> = cache.iter().filter(|j| filter.matches(j)).cloned().collect();
        jobs.sort_by(|a, b| b.posting_date.cmp(&a.posting_date));
        Ok(jobs)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<JobRecord>> {
        let cache = self.cache.read().await;
        Ok(cache.iter().find(|j| j.id == id).cloned())
    }

    async fn create_job(&self, new: NewJobRecord) -> Result<JobRecord> {
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

        let mut cache = self.cache.write().await;
        cache.push(job.clone());
        if let Err(e) = self.persist(&cache).await {
            cache.pop();
            return Err(e);
        }

        Ok(job)
    }

    async fn update_job(&self, id: Uuid, update: JobRecordUpdate) -> Result<JobRecord> {
        validate_job_update(&update)?;

        let mut cache = self.cache.write().await;

        let idx = cache
            .iter()
            .position(|j| j.id == id)
            .ok_or_else(|| BoardError::NotFound(format!("Job with id '{}' not found", id)))?;

        let previous = cache[idx].clone();
        apply_job_update(&mut cache[idx], update);
        let updated = cache[idx].clone();

        if let Err(e) = self.persist(&cache).await {
            cache[idx] = previous;
            return Err(e);
        }

        Ok(updated)
    }

    async fn delete_job(&self, id: Uuid) -> Result<()> {
        let mut cache = self.cache.write().await;

        let idx = cache
            .iter()
            .position(|j| j.id == id)
            .ok_or_else(|| BoardError::NotFound(format!("Job with id '{}' not found", id)))?;

        let removed = cache.remove(idx);
        if let Err(e) = self.persist(&cache).await {
            cache.insert(idx, removed);
            return Err(e);
        }

        Ok(())
    }

    async fn existing_keys(&self) -> Result<HashSet<DedupKey>> {
        let cache = self.cache.read().await;
        Ok(cache.iter().map(DedupKey::from_record).collect())
    }

    async fn stats(&self) -> Result<JobStats> {
        let cache = self.cache.read().await;
        Ok(JobStats::from_jobs(&cache, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_new_job(title: &str, company: &str) -> NewJobRecord {
        NewJobRecord {
            title: title.to_string(),
            company: company.to_string(),
            location: "Chicago, IL".to_string(),
            description: "Pension valuation work.".to_string(),
            ..Default::default()
        }
    }

    async fn setup_store() -> (JsonJobStore, TempDir) {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let store = JsonJobStore::new(tmp_dir.path().to_path_buf())
            .await
            .expect("create store");
        (store, tmp_dir)
    }

    #[tokio::test]
    async fn test_create_job() {
        let (store, _tmp) = setup_store().await;
        let job = store
            .create_job(make_new_job("Pension Actuary", "Mercer"))
            .await
            .expect("create");
        assert_eq!(job.title, "Pension Actuary");
        assert_eq!(job.company, "Mercer");
        assert_eq!(job.job_type, "Full-time");
        assert!(!job.is_scraped);
        assert_eq!(job.created_at, job.updated_at);
    }

    #[tokio::test]
    async fn test_create_job_keeps_scraped_flag_and_posting_date() {
        let (store, _tmp) = setup_store().await;
        let posted = Utc::now() - chrono::Duration::days(4);
        let mut new = make_new_job("Pricing Analyst", "Allstate");
        new.is_scraped = true;
        new.posting_date = Some(posted);
        let job = store.create_job(new).await.expect("create");
        assert!(job.is_scraped);
        assert_eq!(job.posting_date, posted);
    }

    #[tokio::test]
    async fn test_create_job_invalid_rejected_with_validation_error() {
        let (store, _tmp) = setup_store().await;
        let result = store.create_job(make_new_job("Actuary", "   ")).await;
        let err = result.unwrap_err();
        match err.downcast_ref::<BoardError>() {
            Some(BoardError::Validation(msg)) => assert!(msg.contains("company")),
            other => panic!("Expected Validation, got: {:?}", other),
        }
        let jobs = store.list_jobs(&JobFilter::default()).await.expect("list");
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn test_get_job() {
        let (store, _tmp) = setup_store().await;
        let created = store
            .create_job(make_new_job("Pension Actuary", "Mercer"))
            .await
            .expect("create");
        let fetched = store
            .get_job(created.id)
            .await
            .expect("get")
            .expect("found");
        assert_eq!(created, fetched);
    }

    #[tokio::test]
    async fn test_get_job_not_found() {
        let (store, _tmp) = setup_store().await;
        let result = store.get_job(Uuid::now_v7()).await.expect("get");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_list_jobs_newest_first() {
        let (store, _tmp) = setup_store().await;
        let now = Utc::now();
        for (title, age_days) in [("Old", 10), ("Newest", 0), ("Middle", 5)] {
            let mut new = make_new_job(title, "Milliman");
            new.posting_date = Some(now - chrono::Duration::days(age_days));
            store.create_job(new).await.expect("create");
        }
        let jobs = store.list_jobs(&JobFilter::default()).await.expect("list");
        let titles: Vec<&str> = jobs.iter().map(|j| j.title.as_str()).collect();
        assert_eq!(titles, vec!["Newest", "Middle", "Old"]);
    }

    #[tokio::test]
    async fn test_list_jobs_applies_filter() {
        let (store, _tmp) = setup_store().await;
        store
            .create_job(make_new_job("Life Actuary", "Prudential"))
            .await
            .expect("create");
        store
            .create_job(make_new_job("Health Analyst", "Cigna"))
            .await
            .expect("create");
        let filter = JobFilter {
            search: Some("cigna".to_string()),
            ..Default::default()
        };
        let jobs = store.list_jobs(&filter).await.expect("list");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].company, "Cigna");
    }

    #[tokio::test]
    async fn test_list_jobs_empty() {
        let (store, _tmp) = setup_store().await;
        let jobs = store.list_jobs(&JobFilter::default()).await.expect("list");
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn test_update_job() {
        let (store, _tmp) = setup_store().await;
        let created = store
            .create_job(make_new_job("Pension Actuary", "Mercer"))
            .await
            .expect("create");

        let update = JobRecordUpdate {
            title: Some("Senior Pension Actuary".to_string()),
            remote_allowed: Some(true),
            ..Default::default()
        };

        let updated = store.update_job(created.id, update).await.expect("update");
        assert_eq!(updated.title, "Senior Pension Actuary");
        assert!(updated.remote_allowed);
        assert_eq!(updated.company, "Mercer");
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn test_update_job_empty_required_field_rejected() {
        let (store, _tmp) = setup_store().await;
        let created = store
            .create_job(make_new_job("Pension Actuary", "Mercer"))
            .await
            .expect("create");
        let update = JobRecordUpdate {
            location: Some(" ".to_string()),
            ..Default::default()
        };
        let err = store.update_job(created.id, update).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BoardError>(),
            Some(BoardError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_job_not_found() {
        let (store, _tmp) = setup_store().await;
        let update = JobRecordUpdate {
            title: Some("Anything".to_string()),
            ..Default::default()
        };
        let err = store.update_job(Uuid::now_v7(), update).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BoardError>(),
            Some(BoardError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_job() {
        let (store, _tmp) = setup_store().await;
        let created = store
            .create_job(make_new_job("Pension Actuary", "Mercer"))
            .await
            .expect("create");
        store.delete_job(created.id).await.expect("delete");
        let result = store.get_job(created.id).await.expect("get");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_delete_job_not_found() {
        let (store, _tmp) = setup_store().await;
        let result = store.delete_job(Uuid::now_v7()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_existing_keys_are_normalized() {
        let (store, _tmp) = setup_store().await;
        store
            .create_job(make_new_job("Pension Actuary", "Mercer"))
            .await
            .expect("create");
        let keys = store.existing_keys().await.expect("keys");
        assert_eq!(keys.len(), 1);
        assert!(keys.contains(&DedupKey::new(
            "  pension ACTUARY",
            Some("mercer"),
            Some("chicago,   il")
        )));
    }

    #[tokio::test]
    async fn test_stats() {
        let (store, _tmp) = setup_store().await;
        store
            .create_job(make_new_job("Pension Actuary", "Mercer"))
            .await
            .expect("create");
        store
            .create_job(make_new_job("Pricing Actuary", "Mercer"))
            .await
            .expect("create");
        let mut old = make_new_job("Life Actuary", "MetLife");
        old.posting_date = Some(Utc::now() - chrono::Duration::days(30));
        store.create_job(old).await.expect("create");

        let stats = store.stats().await.expect("stats");
        assert_eq!(stats.total, 3);
        assert_eq!(stats.recent, 2);
        assert_eq!(stats.companies, 2);
    }

    #[tokio::test]
    async fn test_atomic_write_produces_valid_json() {
        let (store, tmp) = setup_store().await;
        store
            .create_job(make_new_job("Persisted Actuary", "Mercer"))
            .await
            .expect("create");

        let file_path = tmp.path().join("jobs.json");
        let content = tokio::fs::read_to_string(&file_path)
            .await
            .expect("read file");
        let jobs: Vec<JobRecord> = serde_json::from_str(&content).expect("parse JSON");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].title, "Persisted Actuary");
    }

    #[tokio::test]
    async fn test_persistence_across_instances() {
        let tmp_dir = TempDir::new().expect("create temp dir");

        {
            let store = JsonJobStore::new(tmp_dir.path().to_path_buf())
                .await
                .expect("create store");
            store
                .create_job(make_new_job("Persistent Actuary", "Mercer"))
                .await
                .expect("create");
        }

        {
            let store = JsonJobStore::new(tmp_dir.path().to_path_buf())
                .await
                .expect("create store");
            let jobs = store.list_jobs(&JobFilter::default()).await.expect("list");
            assert_eq!(jobs.len(), 1);
            assert_eq!(jobs[0].title, "Persistent Actuary");
        }
    }

    #[tokio::test]
    async fn test_no_tmp_file_left_after_write() {
        let (store, tmp) = setup_store().await;
        store
            .create_job(make_new_job("Clean Write", "Mercer"))
            .await
            .expect("create");

        let tmp_file = tmp.path().join("jobs.json.tmp");
        assert!(
            !tmp_file.exists(),
            "Temporary file should not remain after write"
        );
    }

    #[tokio::test]
    async fn test_corrupted_jobs_json_recovers_empty() {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let jobs_file = tmp_dir.path().join("jobs.json");

        tokio::fs::write(&jobs_file, b"this is not valid JSON{{{")
            .await
            .expect("write corrupted file");

        let store = JsonJobStore::new(tmp_dir.path().to_path_buf())
            .await
            .expect("create store from corrupted file");

        let jobs = store.list_jobs(&JobFilter::default()).await.expect("list");
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn test_corrupted_jobs_json_creates_backup() {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let jobs_file = tmp_dir.path().join("jobs.json");
        let backup_file = tmp_dir.path().join("jobs.json.bak");

        let corrupted_content = b"corrupted data!!!";
        tokio::fs::write(&jobs_file, corrupted_content)
            .await
            .expect("write corrupted file");

        let _store = JsonJobStore::new(tmp_dir.path().to_path_buf())
            .await
            .expect("create store");

        assert!(backup_file.exists(), "Backup file should have been created");
        let backup_content = tokio::fs::read(&backup_file).await.expect("read backup");
        assert_eq!(backup_content, corrupted_content);
    }
}
