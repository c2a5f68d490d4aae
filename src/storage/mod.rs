pub mod jobs;

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{JobFilter, JobRecord, JobRecordUpdate, JobStats, NewJobRecord};
use crate::scraper::dedup::DedupKey;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Jobs matching `filter`, newest `posting_date` first.
    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<JobRecord>>;
    async fn get_job(&self, id: Uuid) -> Result<Option<JobRecord>>;
    async fn create_job(&self, new: NewJobRecord) -> Result<JobRecord>;
    async fn update_job(&self, id: Uuid, update: JobRecordUpdate) -> Result<JobRecord>;
    async fn delete_job(&self, id: Uuid) -> Result<()>;
    /// Dedup keys of every stored job. Used once per scrape run.
    async fn existing_keys(&self) -> Result<HashSet<DedupKey>>;
    async fn stats(&self) -> Result<JobStats>;
}
