//! Shared harness for the integration tests: a board server wired to a
//! throwaway data directory, and a fake ActuaryList site serving canned
//! listing pages.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;

use actuary_job_board::daemon;
use actuary_job_board::models::BoardConfig;
use actuary_job_board::server;

// ---------------------------------------------------------------------------
// Board server
// ---------------------------------------------------------------------------

pub struct TestBoard {
    pub base_url: String,
    pub data_dir: TempDir,
    pub handle: tokio::task::JoinHandle<()>,
}

/// A config pointed at `source_base_url` with fast retries.
pub fn test_config(source_base_url: &str, data_dir: &TempDir) -> BoardConfig {
    BoardConfig {
        data_dir: Some(data_dir.path().to_path_buf()),
        source_base_url: source_base_url.to_string(),
        request_timeout_secs: 5,
        fetch_retries: 1,
        retry_backoff_ms: 10,
        poll_interval_secs: 1,
        ..BoardConfig::default()
    }
}

pub async fn spawn_board(source_base_url: &str) -> TestBoard {
    let data_dir = TempDir::new().expect("create temp dir");
    let config = test_config(source_base_url, &data_dir);
    spawn_board_with(config, data_dir).await
}

pub async fn spawn_board_with(config: BoardConfig, data_dir: TempDir) -> TestBoard {
    let state = daemon::build_state(config).await.expect("build state");
    let router = server::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to random port");
    let addr = listener.local_addr().expect("get local addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    TestBoard {
        base_url: format!("http://{}", addr),
        data_dir,
        handle,
    }
}

/// Poll `/api/scrape/status` until the run is no longer running.
pub async fn wait_for_finish(client: &reqwest::Client, base_url: &str) -> Value {
    for _ in 0..200 {
        let status: Value = client
            .get(format!("{}/api/scrape/status", base_url))
            .send()
            .await
            .expect("status request")
            .json()
            .await
            .expect("status json");
        if status["is_running"] == false {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("scrape run did not finish in time");
}

// ---------------------------------------------------------------------------
// Fake ActuaryList site
// ---------------------------------------------------------------------------

pub struct Card {
    pub title: &'static str,
    pub company: &'static str,
    pub location: &'static str,
}

pub const fn card(title: &'static str, company: &'static str, location: &'static str) -> Card {
    Card {
        title,
        company,
        location,
    }
}

/// Render one listing page in ActuaryList's card markup.
pub fn listing_html(cards: &[Card]) -> String {
    let mut body = String::from("<html><body><main>");
    for (i, c) in cards.iter().enumerate() {
        body.push_str("<div class=\"job-listing\">");
        body.push_str(&format!(
            "<h3 class=\"job-title\"><a href=\"/jobs/{}\">{}</a></h3>",
            i, c.title
        ));
        if !c.company.is_empty() {
            body.push_str(&format!("<span class=\"company\">{}</span>", c.company));
        }
        body.push_str(&format!("<span class=\"location\">{}</span>", c.location));
        body.push_str("<span class=\"date\">2 days ago</span>");
        body.push_str("</div>");
    }
    body.push_str("</main></body></html>");
    body
}

#[derive(Clone)]
struct Site {
    pages: Arc<Vec<String>>,
    delay: Duration,
    status: StatusCode,
    hits: Arc<AtomicUsize>,
}

async fn jobs_page(State(site): State<Site>, Query(query): Query<HashMap<String, String>>) -> Response {
    site.hits.fetch_add(1, Ordering::SeqCst);
    if !site.delay.is_zero() {
        tokio::time::sleep(site.delay).await;
    }
    if !site.status.is_success() {
        return site.status.into_response();
    }
    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    match site.pages.get(page.saturating_sub(1)) {
        Some(html) => Html(html.clone()).into_response(),
        None => Html("<html><body><p>No more jobs</p></body></html>".to_string()).into_response(),
    }
}

pub struct FakeSite {
    pub base_url: String,
    pub hits: Arc<AtomicUsize>,
}

impl FakeSite {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn spawn_site(site: Site) -> FakeSite {
    let hits = Arc::clone(&site.hits);
    let router = Router::new().route("/jobs", get(jobs_page)).with_state(site);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake site");
    let addr = listener.local_addr().expect("fake site addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    FakeSite {
        base_url: format!("http://{}", addr),
        hits,
    }
}

/// Serve `pages` as `/jobs?page=1..`; later pages have no cards.
pub async fn spawn_listing_site(pages: Vec<String>) -> FakeSite {
    spawn_slow_listing_site(pages, Duration::ZERO).await
}

pub async fn spawn_slow_listing_site(pages: Vec<String>, delay: Duration) -> FakeSite {
    spawn_site(Site {
        pages: Arc::new(pages),
        delay,
        status: StatusCode::OK,
        hits: Arc::new(AtomicUsize::new(0)),
    })
    .await
}

/// Answer every request with `status`.
pub async fn spawn_failing_site(status: StatusCode) -> FakeSite {
    spawn_site(Site {
        pages: Arc::new(Vec::new()),
        delay: Duration::ZERO,
        status,
        hits: Arc::new(AtomicUsize::new(0)),
    })
    .await
}
