//! Duplicate detection for scraped postings.
//!
//! Two postings are the same job when their title, company and location
//! match after trimming, collapsing internal whitespace and case folding.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::job::collapse_whitespace;
use crate::models::{JobRecord, NewJobRecord};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupKey {
    title: String,
    company: String,
    location: String,
}

impl DedupKey {
    /// Missing company or location normalize to the empty string.
    pub fn new(title: &str, company: Option<&str>, location: Option<&str>) -> Self {
        Self {
            title: fold(title),
            company: company.map(fold).unwrap_or_default(),
            location: location.map(fold).unwrap_or_default(),
        }
    }

    pub fn from_record(job: &JobRecord) -> Self {
        Self::new(&job.title, Some(&job.company), Some(&job.location))
    }

    pub fn from_candidate(candidate: &NewJobRecord) -> Self {
        Self::new(
            &candidate.title,
            Some(&candidate.company),
            Some(&candidate.location),
        )
    }
}

fn fold(value: &str) -> String {
    collapse_whitespace(value).to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Not seen before. Carries the key to record once the insert succeeds.
    New(DedupKey),
    Duplicate,
}

/// Classify `candidate` against the keys already stored or seen this run.
///
/// Pure: the caller owns `existing` and adds the returned key after a
/// successful insert.
pub fn resolve(candidate: &NewJobRecord, existing: &HashSet<DedupKey>) -> Resolution {
    let key = DedupKey::from_candidate(candidate);
    if existing.contains(&key) {
        Resolution::Duplicate
    } else {
        Resolution::New(key)
    }
}
