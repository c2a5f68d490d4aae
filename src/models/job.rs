use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::errors::BoardError;

/// Longest accepted title, company or location, matching the column widths
/// the board has always used.
pub const MAX_FIELD_LEN: usize = 200;

pub const DEFAULT_JOB_TYPE: &str = "Full-time";
pub const DEFAULT_EXPERIENCE_LEVEL: &str = "Mid-Level";
pub const PLACEHOLDER_DESCRIPTION: &str = "No description provided.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    pub location: String,
    pub job_type: String,
    pub description: String,
    pub experience_level: String,
    pub remote_allowed: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub salary_range: Option<String>,
    pub source_url: Option<String>,
    pub posting_date: DateTime<Utc>,
    pub is_scraped: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create payload for a job posting, either typed in by a user or produced
/// by the scraper as a candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewJobRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default = "default_job_type")]
    pub job_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_experience_level")]
    pub experience_level: String,
    #[serde(default)]
    pub remote_allowed: bool,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub salary_range: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub posting_date: Option<DateTime<Utc>>,
    /// Set by the scraper only; API clients cannot mark entries as scraped.
    #[serde(skip)]
    pub is_scraped: bool,
}

impl Default for NewJobRecord {
    fn default() -> Self {
        Self {
            title: String::new(),
            company: String::new(),
            location: String::new(),
            job_type: default_job_type(),
            description: String::new(),
            experience_level: default_experience_level(),
            remote_allowed: false,
            tags: Vec::new(),
            salary_range: None,
            source_url: None,
            posting_date: None,
            is_scraped: false,
        }
    }
}

fn default_job_type() -> String {
    DEFAULT_JOB_TYPE.to_string()
}

fn default_experience_level() -> String {
    DEFAULT_EXPERIENCE_LEVEL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JobRecordUpdate {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub description: Option<String>,
    pub experience_level: Option<String>,
    pub remote_allowed: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_optional_tags")]
    pub tags: Option<Vec<String>>,
    pub salary_range: Option<String>,
    pub source_url: Option<String>,
}

/// Tags arrive either as a JSON array or as the legacy comma-separated string.
#[derive(Deserialize)]
#[serde(untagged)]
enum TagsInput {
    List(Vec<String>),
    Csv(String),
}

impl TagsInput {
    fn into_tags(self) -> Vec<String> {
        match self {
            TagsInput::List(list) => clean_tags(list),
            TagsInput::Csv(csv) => split_tags(&csv),
        }
    }
}

fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let input = Option::<TagsInput>::deserialize(deserializer)?;
    Ok(input.map(TagsInput::into_tags).unwrap_or_default())
}

fn deserialize_optional_tags<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let input = Option::<TagsInput>::deserialize(deserializer)?;
    Ok(input.map(TagsInput::into_tags))
}

/// Split a comma-separated tag string, dropping blanks.
pub fn split_tags(csv: &str) -> Vec<String> {
    clean_tags(csv.split(',').map(str::to_string).collect())
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| collapse_whitespace(&t))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Trim and collapse every run of internal whitespace to a single space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a create payload and check the required-field invariants.
///
/// Title, company and location are whitespace-collapsed and must be
/// non-empty. An empty description is replaced by a placeholder so every
/// stored record carries one.
pub fn normalize_new_job(mut job: NewJobRecord) -> Result<NewJobRecord, BoardError> {
    job.title = collapse_whitespace(&job.title);
    job.company = collapse_whitespace(&job.company);
    job.location = collapse_whitespace(&job.location);
    job.job_type = collapse_whitespace(&job.job_type);
    job.experience_level = collapse_whitespace(&job.experience_level);
    job.description = job.description.trim().to_string();
    job.tags = clean_tags(job.tags);
    job.salary_range = non_blank(job.salary_range);
    job.source_url = non_blank(job.source_url);

    if job.description.is_empty() {
        job.description = PLACEHOLDER_DESCRIPTION.to_string();
    }
    if job.job_type.is_empty() {
        job.job_type = default_job_type();
    }
    if job.experience_level.is_empty() {
        job.experience_level = default_experience_level();
    }

    require_field("title", &job.title)?;
    require_field("company", &job.company)?;
    require_field("location", &job.location)?;

    Ok(job)
}

/// Validate a partial update before it is applied.
pub fn validate_job_update(update: &JobRecordUpdate) -> Result<(), BoardError> {
    if let Some(ref title) = update.title {
        require_field("title", &collapse_whitespace(title))?;
    }
    if let Some(ref company) = update.company {
        require_field("company", &collapse_whitespace(company))?;
    }
    if let Some(ref location) = update.location {
        require_field("location", &collapse_whitespace(location))?;
    }
    if let Some(ref description) = update.description {
        if description.trim().is_empty() {
            return Err(BoardError::Validation(
                "description cannot be empty".to_string(),
            ));
        }
    }
    Ok(())
}

/// Apply a validated update in place, bumping `updated_at`.
pub fn apply_job_update(job: &mut JobRecord, update: JobRecordUpdate) {
    if let Some(title) = update.title {
        job.title = collapse_whitespace(&title);
    }
    if let Some(company) = update.company {
        job.company = collapse_whitespace(&company);
    }
    if let Some(location) = update.location {
        job.location = collapse_whitespace(&location);
    }
    if let Some(job_type) = update.job_type {
        job.job_type = collapse_whitespace(&job_type);
    }
    if let Some(description) = update.description {
        job.description = description.trim().to_string();
    }
    if let Some(level) = update.experience_level {
        job.experience_level = collapse_whitespace(&level);
    }
    if let Some(remote) = update.remote_allowed {
        job.remote_allowed = remote;
    }
    if let Some(tags) = update.tags {
        job.tags = clean_tags(tags);
    }
    if let Some(salary) = update.salary_range {
        job.salary_range = non_blank(Some(salary));
    }
    if let Some(url) = update.source_url {
        job.source_url = non_blank(Some(url));
    }
    job.updated_at = Utc::now();
}

fn require_field(name: &str, value: &str) -> Result<(), BoardError> {
    if value.is_empty() {
        return Err(BoardError::Validation(format!(
            "Missing required field: {}",
            name
        )));
    }
    if value.chars().count() > MAX_FIELD_LEN {
        return Err(BoardError::Validation(format!(
            "Field '{}' exceeds {} characters",
            name, MAX_FIELD_LEN
        )));
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Listing filters
// ---------------------------------------------------------------------------

/// Query filters for `GET /api/jobs`. Every filter is optional; `all` is
/// treated as "no filter" for the enumerated fields.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JobFilter {
    pub search: Option<String>,
    pub job_type: Option<String>,
    pub location: Option<String>,
    pub experience_level: Option<String>,
    pub remote_allowed: Option<String>,
    pub tags: Option<String>,
}

impl JobFilter {
    pub fn matches(&self, job: &JobRecord) -> bool {
        if let Some(needle) = active(&self.search) {
            let needle = needle.to_lowercase();
            let hit = [&job.title, &job.company, &job.description]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        if let Some(job_type) = enumerated(&self.job_type) {
            if !job.job_type.eq_ignore_ascii_case(job_type) {
                return false;
            }
        }

        if let Some(location) = active(&self.location) {
            if !job
                .location
                .to_lowercase()
                .contains(&location.to_lowercase())
            {
                return false;
            }
        }

        if let Some(level) = enumerated(&self.experience_level) {
            if !job.experience_level.eq_ignore_ascii_case(level) {
                return false;
            }
        }

        if let Some(remote) = enumerated(&self.remote_allowed) {
            let wanted = remote.eq_ignore_ascii_case("true");
            if job.remote_allowed != wanted {
                return false;
            }
        }

        if let Some(tags) = active(&self.tags) {
            let job_tags: Vec<String> = job.tags.iter().map(|t| t.to_lowercase()).collect();
            for wanted in split_tags(tags) {
                let wanted = wanted.to_lowercase();
                if !job_tags.iter().any(|t| t.contains(&wanted)) {
                    return false;
                }
            }
        }

        true
    }
}

fn active(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn enumerated(value: &Option<String>) -> Option<&str> {
    active(value).filter(|v| !v.eq_ignore_ascii_case("all"))
}

/// Aggregate counts for `GET /api/jobs/stats`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct JobStats {
    pub total: usize,
    /// Jobs posted since midnight UTC today.
    pub recent: usize,
    /// Distinct company names.
    pub companies: usize,
}

impl JobStats {
    pub fn from_jobs(jobs: &[JobRecord], now: DateTime<Utc>) -> Self {
        let midnight = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc())
            .unwrap_or(now);
        let companies: std::collections::HashSet<&str> =
            jobs.iter().map(|j| j.company.as_str()).collect();
        Self {
            total: jobs.len(),
            recent: jobs.iter().filter(|j| j.posting_date >= midnight).count(),
            companies: companies.len(),
        }
    }
}
