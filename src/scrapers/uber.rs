//! Uber careers adapter.
//!
//! Uber exposes a search API over its own careers site. Pagination is
//! sequential with a fixed pause between pages; the crawl is large enough
//! that the orchestrator applies a conservative archival guard to Uber
//! results (see the orchestrator's missing-jobs threshold).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::filters::EarlyFilter;
use crate::http::{HttpClient, RequestOptions};
use crate::models::{ScrapedJob, ScraperResult};
use crate::normalize::{
    generate_external_id, normalize_description, normalize_location, normalize_posted_date,
    parse_employment_type, parse_seniority,
};
use crate::platform::Platform;
use crate::scrapers::{JobScraper, ScrapeOptions};

const SEARCH_ENDPOINT: &str = "https://www.uber.com/api/loadSearchJobsResults?localeCode=en";
const PAGE_SIZE: usize = 100;
const PAGE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchData {
    #[serde(default)]
    results: Option<Vec<UberJob>>,
    #[serde(default)]
    total_results: Option<TotalResults>,
}

#[derive(Debug, Deserialize)]
struct TotalResults {
    #[serde(default)]
    low: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UberJob {
    id: i64,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<UberLocation>,
    #[serde(default)]
    all_locations: Vec<UberLocation>,
    #[serde(default)]
    department: Option<String>,
    #[serde(default)]
    time_type: Option<String>,
    #[serde(default)]
    creation_date: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct UberLocation {
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

impl UberLocation {
    fn display(&self) -> Option<String> {
        let parts: Vec<&str> = [self.city.as_deref(), self.region.as_deref(), self.country.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

pub struct UberScraper {
    http: Arc<dyn HttpClient>,
}

impl UberScraper {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    async fn fetch_page(&self, page: usize) -> crate::error::Result<SearchData> {
        let body = json!({
            "params": {
                "location": [],
                "department": [],
                "team": [],
                "programAndPlatform": [],
                "lineOfBusinessName": [],
            },
            "limit": PAGE_SIZE,
            "page": page,
        });
        let options = RequestOptions::new().with_header("Content-Type", "application/json");
        let response = self.http.post(SEARCH_ENDPOINT, body, &options).await?;
        if !response.ok() {
            return Err(crate::error::ScraperError::Network(format!(
                "uber search returned status {}",
                response.status
            )));
        }
        let payload: SearchResponse = response.json()?;
        payload.data.ok_or_else(|| {
            crate::error::ScraperError::Parse("uber search response had no data".to_string())
        })
    }

    fn map_job(&self, job: UberJob) -> ScrapedJob {
        let id_string = job.id.to_string();
        let external_id = generate_external_id(Platform::Uber, &[Some(id_string.as_str())]);
        let url = format!("https://www.uber.com/global/en/careers/list/{}/", job.id);

        let mut scraped = ScrapedJob::new(external_id, job.title.trim(), url);

        let location_display = job
            .location
            .as_ref()
            .and_then(UberLocation::display)
            .or_else(|| job.all_locations.iter().find_map(UberLocation::display));
        if let Some(raw) = location_display {
            let normalized = normalize_location(&raw);
            scraped.location = normalized.location;
            scraped.location_type = normalized.location_type;
        }

        if let Some(description) = job.description.as_deref().filter(|d| !d.trim().is_empty()) {
            let (text, format) = normalize_description(description);
            scraped.description = Some(text);
            scraped.description_format = format;
        }

        scraped.department = job.department;
        scraped.employment_type = job.time_type.as_deref().and_then(parse_employment_type);
        scraped.posted_date = job.creation_date.as_ref().and_then(normalize_posted_date);
        scraped.seniority_level = parse_seniority(&scraped.title);

        scraped
    }
}

#[async_trait]
impl JobScraper for UberScraper {
    fn platform(&self) -> Platform {
        Platform::Uber
    }

    fn validate(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        lower.contains("uber.com") && lower.contains("careers")
    }

    fn extract_identifier(&self, _url: &str) -> Option<String> {
        // One global board; there is no per-company token
        None
    }

    async fn scrape(&self, _url: &str, options: &ScrapeOptions) -> ScraperResult {
        let mut raw_jobs: Vec<UberJob> = Vec::new();
        let mut page = 0usize;
        let mut complete = true;
        let mut total: Option<usize> = None;

        loop {
            match self.fetch_page(page).await {
                Ok(data) => {
                    total = total.or(data.total_results.map(|t| t.low));
                    let results = data.results.unwrap_or_default();
                    if results.is_empty() {
                        break;
                    }
                    let fetched = results.len();
                    raw_jobs.extend(results);
                    if fetched < PAGE_SIZE {
                        break;
                    }
                    if let Some(total) = total {
                        if raw_jobs.len() >= total {
                            break;
                        }
                    }
                }
                Err(e) => {
                    if page == 0 {
                        return ScraperResult::error(e.to_string());
                    }
                    warn!(page, error = %e, "Uber search page failed, stopping pagination");
                    complete = false;
                    break;
                }
            }
            page += 1;
            sleep(PAGE_DELAY).await;
        }

        let open_external_ids: Vec<String> = raw_jobs
            .iter()
            .map(|job| {
                generate_external_id(Platform::Uber, &[Some(job.id.to_string().as_str())])
            })
            .collect();

        let mut early = EarlyFilter::new(options.filters.as_ref());
        let jobs: Vec<ScrapedJob> = raw_jobs
            .into_iter()
            .filter(|job| match &mut early {
                Some(filter) => {
                    let location = job.location.as_ref().and_then(UberLocation::display);
                    filter.keep(&job.title, location.as_deref())
                }
                None => true,
            })
            .map(|job| self.map_job(job))
            .collect();

        let mut result = if complete {
            ScraperResult::success(jobs)
        } else {
            ScraperResult::partial(jobs, Some("pagination stopped early".to_string()))
        };
        result.open_external_ids = open_external_ids;
        result.open_external_ids_complete = complete;
        if let Some(filter) = early {
            result = result.with_early_filtered(filter.stats());
        }
        result
    }
}
