// CLI scrape commands: start, stop, status

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use super::{api_error_message, base_url, handle_request_error};
use crate::models::{RunState, ScrapeRequest, ScrapeStatus};

/// One-line progress summary used by `--follow`.
fn progress_line(status: &ScrapeStatus) -> String {
    format!(
        "[{:>3}%] {} (found: {}, saved: {}, skipped: {}, failed: {})",
        status.progress_percent,
        status.current_step,
        status.jobs_found,
        status.jobs_saved,
        status.jobs_skipped,
        status.jobs_failed
    )
}

/// Multi-line report used by `ajb scrape status`.
fn format_status(status: &ScrapeStatus) -> String {
    let mut lines = vec![format!("State:     {:?}", status.state)];
    if let Some(run_id) = status.run_id {
        lines.push(format!("Run:       {}", run_id));
    }
    lines.push(format!("Progress:  {}%", status.progress_percent));
    lines.push(format!("Step:      {}", status.current_step));
    lines.push(format!(
        "Jobs:      {} found, {} saved, {} skipped, {} failed",
        status.jobs_found, status.jobs_saved, status.jobs_skipped, status.jobs_failed
    ));
    if let Some(started) = status.started_at {
        lines.push(format!("Started:   {}", started.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    if let Some(finished) = status.last_run_finished_at {
        lines.push(format!("Finished:  {}", finished.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    if let Some(ref error) = status.error_message {
        lines.push(format!("Error:     {}", error));
    }
    lines.join("\n")
}

async fn fetch_status(client: &Client, host: &str, port: u16) -> anyhow::Result<ScrapeStatus> {
    let url = format!("{}/api/scrape/status", base_url(host, port));
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;

    if !response.status().is_success() {
        let body: Value = response.json().await.unwrap_or_default();
        anyhow::bail!("{}", api_error_message(&body));
    }

    response
        .json::<ScrapeStatus>()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to parse response: {}", e))
}

/// ajb scrape start
pub async fn cmd_start(
    host: &str,
    port: u16,
    max_jobs: Option<u32>,
    headless: bool,
    follow: bool,
) -> anyhow::Result<()> {
    let client = Client::new();
    let url = format!("{}/api/scrape/start", base_url(host, port));
    let request = ScrapeRequest {
        max_jobs,
        headless: Some(headless),
    };

    let response = client
        .post(&url)
        .json(&request)
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;

    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to parse response: {}", e))?;

    if !status.is_success() {
        anyhow::bail!("{}", api_error_message(&body));
    }

    println!(
        "Scrape started (run: {}).",
        body["run_id"].as_str().unwrap_or("unknown")
    );

    if follow {
        follow_run(&client, host, port).await?;
    }

    Ok(())
}

/// Poll the status endpoint at the server's recommended interval until the
/// run leaves `Running`.
async fn follow_run(client: &Client, host: &str, port: u16) -> anyhow::Result<()> {
    let mut last_line = String::new();
    loop {
        let status = fetch_status(client, host, port).await?;
        let line = progress_line(&status);
        if line != last_line {
            println!("{}", line);
            last_line = line;
        }

        if !status.is_running {
            return match status.state {
                RunState::Failed => anyhow::bail!(
                    "Scrape failed: {}",
                    status.error_message.as_deref().unwrap_or("unknown error")
                ),
                RunState::Cancelled => {
                    println!("Scrape cancelled.");
                    Ok(())
                }
                _ => {
                    println!(
                        "Scrape finished: {} new jobs saved, {} duplicates skipped.",
                        status.jobs_saved, status.jobs_skipped
                    );
                    Ok(())
                }
            };
        }

        tokio::time::sleep(Duration::from_secs(status.poll_interval_secs.max(1))).await;
    }
}

/// ajb scrape stop
pub async fn cmd_stop(host: &str, port: u16) -> anyhow::Result<()> {
    let client = Client::new();
    let url = format!("{}/api/scrape/stop", base_url(host, port));

    let response = client
        .post(&url)
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;

    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to parse response: {}", e))?;

    if !status.is_success() {
        anyhow::bail!("{}", api_error_message(&body));
    }

    println!(
        "Stop requested for run {}.",
        body["run_id"].as_str().unwrap_or("unknown")
    );
    Ok(())
}

/// ajb scrape status
pub async fn cmd_status(host: &str, port: u16, json: bool) -> anyhow::Result<()> {
    let client = Client::new();
    let status = fetch_status(&client, host, port).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{}", format_status(&status));
    }
    Ok(())
}
