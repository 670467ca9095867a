//! Greenhouse job-board adapter.
//!
//! Greenhouse exposes a public JSON API per board token. The primary endpoint
//! returns full job content; the embed endpoint is the fallback for boards
//! that disabled the API host.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::http::{HttpClient, RequestOptions};
use crate::models::{ScrapedJob, ScraperResult};
use crate::normalize::{
    generate_external_id, looks_like_html, normalize_description, normalize_location,
    normalize_posted_date, parse_seniority,
};
use crate::platform::Platform;
use crate::scrapers::{JobScraper, ScrapeOptions};

const API_BASE: &str = "https://boards-api.greenhouse.io/v1/boards";
const EMBED_BASE: &str = "https://boards.greenhouse.io";

#[derive(Debug, Deserialize)]
struct JobsResponse {
    #[serde(default)]
    jobs: Vec<GreenhouseJob>,
}

#[derive(Debug, Deserialize)]
struct GreenhouseJob {
    id: i64,
    title: String,
    absolute_url: String,
    #[serde(default)]
    location: Option<GreenhouseLocation>,
    #[serde(default)]
    metadata: Option<Vec<GreenhouseMetadata>>,
    #[serde(default)]
    departments: Option<Vec<GreenhouseDepartment>>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    updated_at: Option<Value>,
    #[serde(default)]
    first_published: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GreenhouseLocation {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GreenhouseMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GreenhouseDepartment {
    #[serde(default)]
    name: Option<String>,
}

pub struct GreenhouseScraper {
    http: Arc<dyn HttpClient>,
}

impl GreenhouseScraper {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    async fn fetch_board(&self, token: &str) -> Result<JobsResponse, String> {
        let options = RequestOptions::new();
        let primary = format!("{API_BASE}/{}/jobs?content=true", urlencoding::encode(token));

        match self.http.get(&primary, &options).await {
            Ok(response) if response.ok() => {
                return response.json().map_err(|e| e.to_string());
            }
            Ok(response) => {
                debug!(
                    token,
                    status = response.status,
                    "Greenhouse API endpoint rejected, trying embed"
                );
            }
            Err(e) => {
                debug!(token, error = %e, "Greenhouse API endpoint unreachable, trying embed");
            }
        }

        let fallback = format!(
            "{EMBED_BASE}/{}/embed/job_board/jobs.json",
            urlencoding::encode(token)
        );
        let response = self
            .http
            .get(&fallback, &options)
            .await
            .map_err(|e| e.to_string())?;
        if !response.ok() {
            return Err(format!(
                "greenhouse board '{token}' returned status {}",
                response.status
            ));
        }
        response.json().map_err(|e| e.to_string())
    }

    fn map_job(&self, token: &str, job: GreenhouseJob) -> ScrapedJob {
        let external_id = generate_external_id(
            Platform::Greenhouse,
            &[Some(token), Some(job.id.to_string().as_str())],
        );

        let mut scraped = ScrapedJob::new(external_id, job.title.trim(), job.absolute_url.clone());

        let location = merge_locations(
            job.location.as_ref().and_then(|l| l.name.as_deref()),
            job.metadata.as_deref().unwrap_or_default(),
        );
        if let Some(raw) = location {
            let normalized = normalize_location(&raw);
            scraped.location = normalized.location;
            scraped.location_type = normalized.location_type;
        }

        scraped.department = job
            .departments
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find_map(|d| d.name.clone());

        if let Some(content) = job.content.as_deref() {
            // The API double-escapes HTML entities in content
            let decoded = htmlize::unescape(content);
            if looks_like_html(&decoded) {
                let (text, format) = normalize_description(&decoded);
                scraped.description = Some(text);
                scraped.description_format = format;
            } else if !decoded.trim().is_empty() {
                scraped.description = Some(decoded.trim().to_string());
                scraped.description_format = crate::models::DescriptionFormat::Markdown;
            }
        }

        scraped.posted_date = job
            .updated_at
            .as_ref()
            .or(job.first_published.as_ref())
            .and_then(normalize_posted_date);
        scraped.seniority_level = parse_seniority(&scraped.title);

        scraped
    }
}

/// Merge the primary location name with any metadata entry whose name
/// mentions "location".
fn merge_locations(primary: Option<&str>, metadata: &[GreenhouseMetadata]) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    if let Some(name) = primary {
        if !name.trim().is_empty() {
            parts.push(name.trim().to_string());
        }
    }
    for entry in metadata {
        let is_location = entry
            .name
            .as_deref()
            .is_some_and(|n| n.to_lowercase().contains("location"));
        if !is_location {
            continue;
        }
        match &entry.value {
            Some(Value::String(s)) if !s.trim().is_empty() => parts.push(s.trim().to_string()),
            Some(Value::Array(values)) => {
                parts.extend(
                    values
                        .iter()
                        .filter_map(|v| v.as_str())
                        .filter(|s| !s.trim().is_empty())
                        .map(|s| s.trim().to_string()),
                );
            }
            _ => {}
        }
    }
    parts.dedup();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

#[async_trait]
impl JobScraper for GreenhouseScraper {
    fn platform(&self) -> Platform {
        Platform::Greenhouse
    }

    fn validate(&self, url: &str) -> bool {
        url.to_lowercase().contains("greenhouse.io")
    }

    fn extract_identifier(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        // Embed URLs carry the token in the `for` query parameter
        if let Some((_, token)) = parsed.query_pairs().find(|(k, _)| k == "for") {
            if !token.is_empty() {
                return Some(token.into_owned());
            }
        }
        parsed
            .path_segments()?
            .find(|s| !s.is_empty() && *s != "embed" && *s != "job_board")
            .map(str::to_string)
    }

    async fn scrape(&self, url: &str, options: &ScrapeOptions) -> ScraperResult {
        let detected = self.extract_identifier(url);
        let Some(token) = options.board_token.clone().or_else(|| detected.clone()) else {
            return ScraperResult::error(format!("could not extract greenhouse board token from '{url}'"));
        };

        let payload = match self.fetch_board(&token).await {
            Ok(payload) => payload,
            Err(message) => return ScraperResult::error(message),
        };

        let jobs: Vec<ScrapedJob> = payload
            .jobs
            .into_iter()
            .map(|job| self.map_job(&token, job))
            .collect();

        let mut result = ScraperResult::success(jobs);
        if options.board_token.is_none() {
            if let Some(token) = detected {
                result = result.with_board_token(token);
            }
        }
        result
    }
}
