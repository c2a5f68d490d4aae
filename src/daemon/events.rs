use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::models::ScrapeRun;

/// Serialize a shared snapshot as the plain struct.
fn serialize_snapshot<S>(run: &Arc<ScrapeRun>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    run.as_ref().serialize(serializer)
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum BoardEvent {
    ScrapeProgress {
        #[serde(serialize_with = "serialize_snapshot")]
        run: Arc<ScrapeRun>,
    },
    JobChanged {
        job_id: Uuid,
        change: JobChangeKind,
        timestamp: DateTime<Utc>,
    },
}

impl BoardEvent {
    pub fn job_changed(job_id: Uuid, change: JobChangeKind) -> Self {
        BoardEvent::JobChanged {
            job_id,
            change,
            timestamp: Utc::now(),
        }
    }

    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            BoardEvent::ScrapeProgress { .. } => "scrape_progress",
            BoardEvent::JobChanged { .. } => "job_changed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum JobChangeKind {
    Added,
    Updated,
    Removed,
}
