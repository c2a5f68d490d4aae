use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, Url};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::models::job::collapse_whitespace;
use crate::models::{BoardConfig, NewJobRecord};

const CARD_SELECTORS: &[&str] = &[
    ".job-listing",
    ".job-item",
    ".job-card",
    ".job",
    "[class*='job-']",
    ".listing",
    ".position",
];
const TITLE_SELECTOR: &str = "h3, .job-title, [class*='title']";
const COMPANY_SELECTOR: &str = ".company, [class*='company'], .employer";
const LOCATION_SELECTOR: &str = ".location, [class*='location'], .city";
const DATE_SELECTOR: &str = ".date, [class*='date'], .posted, time";
const TAG_SELECTOR: &str = ".tag, .skill, .keyword, [class*='tag'], [class*='skill']";
const LINK_SELECTOR: &str = "a[href]";

const DEFAULT_LOCATION: &str = "Remote";
const MAX_TAGS: usize = 5;
const MAX_TAG_LEN: usize = 50;

const TAG_KEYWORDS: &[&str] = &[
    "Life", "Health", "Property", "Casualty", "Pension", "Annuity", "Pricing", "Reserving",
    "Modeling", "Valuation", "Risk", "Analytics", "Python", "R", "SQL", "Excel", "SAS",
    "Prophet", "AXIS", "ASA", "FSA", "ACAS", "FCAS", "Actuary", "Analyst", "Senior", "Junior",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    pub headless: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    pub candidates: Vec<NewJobRecord>,
    pub has_more: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Worth retrying: 5xx, 429, timeouts, dropped connections.
    #[error("transient source error: {0}")]
    Transient(String),

    #[error("unrecoverable source error: {0}")]
    Unrecoverable(String),
}

/// A paginated origin of job candidates.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<SourcePage, SourceError>;
}

/// Scrapes the public actuarylist.com listing pages.
pub struct ActuaryListSource {
    client: Client,
    base_url: String,
}

impl ActuaryListSource {
    pub fn new(config: &BoardConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.source_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn page_url(&self, page: u32) -> String {
        format!("{}/jobs?page={}", self.base_url, page)
    }
}

#[async_trait]
impl JobSource for ActuaryListSource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<SourcePage, SourceError> {
        let url = self.page_url(request.page);
        tracing::debug!("Fetching {} (headless: {})", url, request.headless);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| classify_request_error(&e, request.page))?;

        let status = response.status();
        if let Some(err) = classify_status(status) {
            if status == StatusCode::NOT_FOUND && request.page > 1 {
                tracing::debug!("Page {} returned 404, treating as end of listings", request.page);
                return Ok(SourcePage::default());
            }
            return Err(err);
        }

        let html = response
            .text()
            .await
            .map_err(|e| SourceError::Transient(format!("Failed to read response body: {}", e)))?;

        let candidates = parse_listing_page(&html, &self.base_url, Utc::now());
        tracing::debug!("Page {} yielded {} candidates", request.page, candidates.len());

        Ok(SourcePage {
            has_more: !candidates.is_empty(),
            candidates,
        })
    }
}

fn classify_request_error(err: &reqwest::Error, page: u32) -> SourceError {
    if err.is_builder() {
        return SourceError::Unrecoverable(format!("Invalid source request: {}", err));
    }
    if err.is_connect() && page <= 1 {
        return SourceError::Unrecoverable(format!("Cannot reach source: {}", err));
    }
    SourceError::Transient(err.to_string())
}

fn classify_status(status: StatusCode) -> Option<SourceError> {
    if status.is_success() {
        None
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Some(SourceError::Transient(format!("HTTP {}", status)))
    } else {
        Some(SourceError::Unrecoverable(format!("HTTP {}", status)))
    }
}

/// Extract job candidates from one listing page.
///
/// The first card selector that matches anything wins. Cards without a title
/// are dropped. Missing companies stay empty so the store can reject them.
pub fn parse_listing_page(html: &str, base_url: &str, now: DateTime<Utc>) -> Vec<NewJobRecord> {
    let document = Html::parse_document(html);

    let cards: Vec<ElementRef> = CARD_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .map(|selector| document.select(&selector).collect::<Vec<_>>())
        .find(|found| !found.is_empty())
        .unwrap_or_default();

    cards
        .into_iter()
        .filter_map(|card| extract_candidate(card, base_url, now))
        .collect()
}

fn extract_candidate(card: ElementRef, base_url: &str, now: DateTime<Utc>) -> Option<NewJobRecord> {
    let title = first_text(card, TITLE_SELECTOR)?;
    let company = first_text(card, COMPANY_SELECTOR).unwrap_or_default();
    let location = first_text(card, LOCATION_SELECTOR).unwrap_or_else(|| DEFAULT_LOCATION.to_string());
    let posting_date = first_text(card, DATE_SELECTOR)
        .map(|text| parse_posting_date(&text, now))
        .unwrap_or(now);

    let mut tags: Vec<String> = all_texts(card, TAG_SELECTOR)
        .into_iter()
        .filter(|t| t.chars().count() < MAX_TAG_LEN)
        .collect();
    tags.dedup();
    if tags.is_empty() {
        tags = keyword_tags(&format!("{} {}", title, company));
    }
    tags.truncate(MAX_TAGS);

    let source_url = first_href(card).and_then(|href| resolve_url(base_url, &href));

    Some(NewJobRecord {
        job_type: infer_job_type(&title).to_string(),
        remote_allowed: location.to_lowercase().contains("remote"),
        description: "Job scraped from ActuaryList.com".to_string(),
        title,
        company,
        location,
        tags,
        source_url,
        posting_date: Some(posting_date),
        is_scraped: true,
        ..Default::default()
    })
}

fn first_text(card: ElementRef, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    card.select(&selector)
        .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
        .find(|text| !text.is_empty())
}

fn all_texts(card: ElementRef, selector: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };
    card.select(&selector)
        .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
        .filter(|text| !text.is_empty())
        .collect()
}

fn first_href(card: ElementRef) -> Option<String> {
    if let Some(href) = card.value().attr("href") {
        return Some(href.to_string());
    }
    let selector = Selector::parse(LINK_SELECTOR).ok()?;
    card.select(&selector)
        .find_map(|el| el.value().attr("href"))
        .map(str::to_string)
}

/// Resolve `href` against `base_url`. Absolute links pass through.
pub fn resolve_url(base_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/'))).ok()?;
    base.join(href).ok().map(String::from)
}

/// Internship, Part-time or Contract when the title says so, else Full-time.
pub fn infer_job_type(title: &str) -> &'static str {
    let lower = title.to_lowercase();
    if lower.contains("intern") {
        "Internship"
    } else if lower.contains("part-time") || lower.contains("part time") {
        "Part-time"
    } else if ["contract", "contractor", "consulting"]
        .iter()
        .any(|w| lower.contains(w))
    {
        "Contract"
    } else {
        "Full-time"
    }
}

/// Whole-word keyword matches, in keyword order, at most five.
pub fn keyword_tags(text: &str) -> Vec<String> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    TAG_KEYWORDS
        .iter()
        .filter(|kw| words.iter().any(|w| *w == kw.to_lowercase()))
        .take(MAX_TAGS)
        .map(|kw| kw.to_string())
        .collect()
}

/// Parse listing dates such as "3 days ago", "2 weeks ago", "today".
///
/// A month counts as 30 days. Anything unrecognized maps to `now`.
pub fn parse_posting_date(text: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let text = text.trim().to_lowercase();
    if text.is_empty() {
        return now;
    }

    let amount = leading_number(&text);
    let offset = if text.contains("today") || text.contains("just now") {
        Some(chrono::Duration::zero())
    } else if text.contains("yesterday") {
        Some(chrono::Duration::days(1))
    } else if text.contains("hour") {
        amount.map(chrono::Duration::hours)
    } else if text.contains("day") {
        amount.map(chrono::Duration::days)
    } else if text.contains("week") {
        amount.map(chrono::Duration::weeks)
    } else if text.contains("month") {
        amount.map(|n| chrono::Duration::days(n * 30))
    } else {
        None
    };

    offset.map(|o| now - o).unwrap_or(now)
}

fn leading_number(text: &str) -> Option<i64> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
