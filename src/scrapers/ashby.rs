//! Ashby job-board adapter.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

use crate::http::{HttpClient, RequestOptions};
use crate::models::{EmploymentType, LocationType, ScrapedJob, ScraperResult};
use crate::normalize::{
    generate_external_id, normalize_description, normalize_location, normalize_posted_date,
    parse_seniority,
};
use crate::platform::Platform;
use crate::scrapers::{JobScraper, ScrapeOptions};

const API_BASE: &str = "https://api.ashbyhq.com/posting-api/job-board";

#[derive(Debug, Deserialize)]
struct BoardResponse {
    #[serde(default)]
    jobs: Vec<AshbyJob>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AshbyJob {
    title: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    secondary_locations: Vec<AshbySecondaryLocation>,
    #[serde(default)]
    department: Option<String>,
    #[serde(default)]
    team: Option<String>,
    #[serde(default)]
    employment_type: Option<String>,
    #[serde(default)]
    is_remote: Option<bool>,
    #[serde(default)]
    job_url: Option<String>,
    #[serde(default)]
    apply_url: Option<String>,
    #[serde(default)]
    description_html: Option<String>,
    #[serde(default)]
    description_plain: Option<String>,
    #[serde(default)]
    published_at: Option<serde_json::Value>,
    #[serde(default)]
    compensation: Option<AshbyCompensation>,
}

#[derive(Debug, Deserialize)]
struct AshbySecondaryLocation {
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AshbyCompensation {
    #[serde(default)]
    compensation_tier_summary: Option<String>,
}

/// Ashby's employment-type tokens are PascalCase variants of the enum.
fn map_employment_type(token: &str) -> Option<EmploymentType> {
    match token {
        "FullTime" => Some(EmploymentType::FullTime),
        "PartTime" => Some(EmploymentType::PartTime),
        "Intern" => Some(EmploymentType::Intern),
        "Contract" => Some(EmploymentType::Contract),
        "Temporary" => Some(EmploymentType::Temporary),
        _ => None,
    }
}

pub struct AshbyScraper {
    http: Arc<dyn HttpClient>,
}

impl AshbyScraper {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    fn map_job(&self, board: &str, index: usize, job: AshbyJob) -> ScrapedJob {
        // No stable posting id in the payload; the job URL is the identity,
        // with the index as the last resort
        let index_part = index.to_string();
        let id_part = job
            .job_url
            .as_deref()
            .or(job.apply_url.as_deref())
            .unwrap_or(index_part.as_str());
        let external_id = generate_external_id(Platform::Ashby, &[Some(board), Some(id_part)]);

        let url = job
            .job_url
            .clone()
            .or_else(|| job.apply_url.clone())
            .unwrap_or_else(|| format!("https://jobs.ashbyhq.com/{board}"));

        let mut scraped = ScrapedJob::new(external_id, job.title.trim(), url);

        let mut location_parts: Vec<String> = Vec::new();
        if let Some(location) = job.location.as_deref().filter(|l| !l.trim().is_empty()) {
            location_parts.push(location.trim().to_string());
        }
        location_parts.extend(
            job.secondary_locations
                .iter()
                .filter_map(|s| s.location.as_deref())
                .filter(|l| !l.trim().is_empty())
                .map(|l| l.trim().to_string()),
        );
        if !location_parts.is_empty() {
            let normalized = normalize_location(&location_parts.join(", "));
            scraped.location = normalized.location;
            scraped.location_type = normalized.location_type;
        }
        if job.is_remote == Some(true) {
            scraped.location_type = Some(LocationType::Remote);
        }

        scraped.department = job.department.clone().or_else(|| job.team.clone());
        scraped.employment_type = job
            .employment_type
            .as_deref()
            .and_then(map_employment_type);

        if let Some(plain) = job
            .description_plain
            .as_deref()
            .filter(|d| !d.trim().is_empty())
        {
            scraped.description = Some(plain.trim().to_string());
        } else if let Some(html) = job
            .description_html
            .as_deref()
            .filter(|d| !d.trim().is_empty())
        {
            let (text, format) = normalize_description(html);
            scraped.description = Some(text);
            scraped.description_format = format;
        }

        scraped.posted_date = job.published_at.as_ref().and_then(normalize_posted_date);
        scraped.salary = job
            .compensation
            .as_ref()
            .and_then(|c| c.compensation_tier_summary.clone());
        scraped.seniority_level = parse_seniority(&scraped.title);

        scraped
    }
}

#[async_trait]
impl JobScraper for AshbyScraper {
    fn platform(&self) -> Platform {
        Platform::Ashby
    }

    fn validate(&self, url: &str) -> bool {
        url.to_lowercase().contains("ashbyhq.com")
    }

    fn extract_identifier(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        parsed
            .path_segments()?
            .find(|s| !s.is_empty())
            .map(|s| urlencoding::decode(s).map(|d| d.into_owned()).unwrap_or_else(|_| s.to_string()))
    }

    async fn scrape(&self, url: &str, options: &ScrapeOptions) -> ScraperResult {
        let detected = self.extract_identifier(url);
        let Some(board) = options.board_token.clone().or_else(|| detected.clone()) else {
            return ScraperResult::error(format!("could not extract ashby board name from '{url}'"));
        };

        let endpoint = format!(
            "{API_BASE}/{}?includeCompensation=true",
            urlencoding::encode(&board)
        );
        let response = match self.http.get(&endpoint, &RequestOptions::new()).await {
            Ok(response) => response,
            Err(e) => return ScraperResult::error(e.to_string()),
        };
        if !response.ok() {
            return ScraperResult::error(format!(
                "ashby board '{board}' returned status {}",
                response.status
            ));
        }

        let payload: BoardResponse = match response.json() {
            Ok(payload) => payload,
            Err(e) => return ScraperResult::error(e.to_string()),
        };

        let jobs: Vec<ScrapedJob> = payload
            .jobs
            .into_iter()
            .enumerate()
            .map(|(index, job)| self.map_job(&board, index, job))
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
