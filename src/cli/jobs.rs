// CLI job commands: list

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;

use super::{api_error_message, base_url, handle_request_error};
use crate::models::{JobFilter, JobRecord};

/// Format a relative time string like "3 days ago".
fn format_relative_time(dt: &DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = now.signed_duration_since(*dt).num_seconds().max(0);
    if secs < 3600 {
        "just now".to_string()
    } else if secs < 86400 {
        format!("{} hours ago", secs / 3600)
    } else if secs < 2 * 86400 {
        "yesterday".to_string()
    } else {
        format!("{} days ago", secs / 86400)
    }
}

/// Shorten `text` to `max` characters, marking the cut with "...".
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let kept: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

fn format_row(job: &JobRecord, now: DateTime<Utc>) -> String {
    format!(
        "{:<32}{:<24}{:<20}{:<12}{:<14}",
        truncate(&job.title, 31),
        truncate(&job.company, 23),
        truncate(&job.location, 19),
        truncate(&job.job_type, 11),
        format_relative_time(&job.posting_date, now)
    )
}

/// ajb list
pub async fn cmd_list(host: &str, port: u16, filter: &JobFilter, json: bool) -> anyhow::Result<()> {
    let client = Client::new();
    let url = format!("{}/api/jobs", base_url(host, port));

    let response = client
        .get(&url)
        .query(filter)
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;

    let status = response.status();
    if !status.is_success() {
        let body: Value = response.json().await.unwrap_or_default();
        anyhow::bail!("{}", api_error_message(&body));
    }

    let jobs: Vec<JobRecord> = response
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to parse response: {}", e))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!("No jobs found.");
        return Ok(());
    }

    println!(
        "{:<32}{:<24}{:<20}{:<12}{:<14}",
        "TITLE", "COMPANY", "LOCATION", "TYPE", "POSTED"
    );

    let now = Utc::now();
    for job in &jobs {
        println!("{}", format_row(job, now));
    }
    println!("\n{} job(s)", jobs.len());

    Ok(())
}
