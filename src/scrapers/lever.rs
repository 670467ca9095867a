//! Lever job-board adapter.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

use crate::http::{HttpClient, RequestOptions};
use crate::models::{DescriptionFormat, LocationType, ScrapedJob, ScraperResult};
use crate::normalize::{
    generate_external_id, normalize_description, normalize_location, parse_employment_type,
    parse_seniority,
};
use crate::platform::Platform;
use crate::scrapers::{JobScraper, ScrapeOptions};

const API_BASE: &str = "https://api.lever.co/v0/postings";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeverPosting {
    id: String,
    /// Lever calls the title `text`
    text: String,
    #[serde(default)]
    hosted_url: Option<String>,
    #[serde(default)]
    apply_url: Option<String>,
    #[serde(default)]
    categories: Option<LeverCategories>,
    #[serde(default)]
    workplace_type: Option<String>,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    description_plain: Option<String>,
    #[serde(default)]
    salary_range: Option<LeverSalaryRange>,
}

#[derive(Debug, Deserialize)]
struct LeverCategories {
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    team: Option<String>,
    #[serde(default)]
    department: Option<String>,
    #[serde(default)]
    commitment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeverSalaryRange {
    #[serde(default)]
    min: Option<i64>,
    #[serde(default)]
    max: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    interval: Option<String>,
}

impl LeverSalaryRange {
    fn display(&self) -> Option<String> {
        let (min, max) = (self.min?, self.max?);
        let currency = self.currency.as_deref().unwrap_or("USD");
        let interval = self
            .interval
            .as_deref()
            .map(|i| format!(" {}", i.replace('-', " ")))
            .unwrap_or_default();
        Some(format!("{currency} {min}-{max}{interval}"))
    }
}

pub struct LeverScraper {
    http: Arc<dyn HttpClient>,
}

impl LeverScraper {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    fn map_posting(&self, slug: &str, posting: LeverPosting) -> ScrapedJob {
        let external_id =
            generate_external_id(Platform::Lever, &[Some(slug), Some(posting.id.as_str())]);
        let url = posting
            .hosted_url
            .clone()
            .or_else(|| posting.apply_url.clone())
            .unwrap_or_else(|| format!("https://jobs.lever.co/{slug}/{}", posting.id));

        let mut scraped = ScrapedJob::new(external_id, posting.text.trim(), url);

        if let Some(categories) = &posting.categories {
            if let Some(location) = categories.location.as_deref() {
                let normalized = normalize_location(location);
                scraped.location = normalized.location;
                scraped.location_type = normalized.location_type;
            }
            scraped.department = categories
                .team
                .clone()
                .or_else(|| categories.department.clone());
            scraped.employment_type = categories
                .commitment
                .as_deref()
                .and_then(parse_employment_type);
        }

        // Explicit workplace type wins over whatever the location string implied
        if let Some(workplace) = posting.workplace_type.as_deref() {
            scraped.location_type = match workplace.to_lowercase().as_str() {
                "remote" => Some(LocationType::Remote),
                "hybrid" => Some(LocationType::Hybrid),
                "on-site" | "onsite" => Some(LocationType::Onsite),
                _ => scraped.location_type,
            };
        }

        if let Some(plain) = posting
            .description_plain
            .as_deref()
            .filter(|d| !d.trim().is_empty())
        {
            scraped.description = Some(plain.trim().to_string());
            scraped.description_format = DescriptionFormat::Plain;
        } else if let Some(html) = posting
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
        {
            let (text, format) = normalize_description(html);
            scraped.description = Some(text);
            scraped.description_format = format;
        }

        scraped.posted_date = posting
            .created_at
            .and_then(|ms| crate::normalize::normalize_posted_date(&serde_json::Value::from(ms)));
        scraped.salary = posting.salary_range.as_ref().and_then(LeverSalaryRange::display);
        scraped.seniority_level = parse_seniority(&scraped.title);

        scraped
    }
}

#[async_trait]
impl JobScraper for LeverScraper {
    fn platform(&self) -> Platform {
        Platform::Lever
    }

    fn validate(&self, url: &str) -> bool {
        url.to_lowercase().contains("lever.co")
    }

    fn extract_identifier(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        parsed
            .path_segments()?
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }

    async fn scrape(&self, url: &str, options: &ScrapeOptions) -> ScraperResult {
        let detected = self.extract_identifier(url);
        let Some(slug) = options.board_token.clone().or_else(|| detected.clone()) else {
            return ScraperResult::error(format!("could not extract lever board slug from '{url}'"));
        };

        let endpoint = format!("{API_BASE}/{}?mode=json", urlencoding::encode(&slug));
        let response = match self.http.get(&endpoint, &RequestOptions::new()).await {
            Ok(response) => response,
            Err(e) => return ScraperResult::error(e.to_string()),
        };
        if response.status == 404 {
            return ScraperResult::error(format!("lever board '{slug}' not found"));
        }
        if !response.ok() {
            return ScraperResult::error(format!(
                "lever board '{slug}' returned status {}",
                response.status
            ));
        }

        let postings: Vec<LeverPosting> = match response.json() {
            Ok(postings) => postings,
            Err(e) => return ScraperResult::error(e.to_string()),
        };

        let jobs: Vec<ScrapedJob> = postings
            .into_iter()
            .map(|posting| self.map_posting(&slug, posting))
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
