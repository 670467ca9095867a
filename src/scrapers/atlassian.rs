//! Atlassian careers adapter.
//!
//! Atlassian serves its whole listing set from one endpoint. The source URL's
//! `team`, `location`, and `search` query parameters act as a server-side
//! pre-filter against that set; details are fetched per job only when the
//! listing row did not carry its text sections inline.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::http::{HttpClient, RequestOptions};
use crate::models::{ScrapedJob, ScraperResult};
use crate::normalize::{
    generate_external_id, normalize_description, normalize_location, normalize_posted_date,
    parse_seniority,
};
use crate::platform::Platform;
use crate::scrapers::{JobScraper, ScrapeOptions};

const LISTINGS_ENDPOINT: &str = "https://www.atlassian.com/endpoint/careers/listings";
const DETAILS_ENDPOINT: &str = "https://www.atlassian.com/endpoint/careers/details";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtlassianListing {
    id: serde_json::Value,
    title: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    department: Option<String>,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    responsibilities: Option<String>,
    #[serde(default)]
    qualifications: Option<String>,
    #[serde(default)]
    apply_url: Option<String>,
    #[serde(default)]
    posted_date: Option<serde_json::Value>,
}

impl AtlassianListing {
    fn id_string(&self) -> String {
        match &self.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn has_inline_sections(&self) -> bool {
        [&self.overview, &self.responsibilities, &self.qualifications]
            .iter()
            .any(|s| s.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }

    fn assemble_description(&self) -> Option<String> {
        let sections: Vec<(&str, &str)> = [
            ("Overview", self.overview.as_deref()),
            ("Responsibilities", self.responsibilities.as_deref()),
            ("Qualifications", self.qualifications.as_deref()),
        ]
        .into_iter()
        .filter_map(|(heading, body)| body.filter(|b| !b.trim().is_empty()).map(|b| (heading, b)))
        .collect();

        if sections.is_empty() {
            return None;
        }
        Some(
            sections
                .into_iter()
                .map(|(heading, body)| format!("## {heading}\n\n{}", body.trim()))
                .collect::<Vec<_>>()
                .join("\n\n"),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtlassianDetails {
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    responsibilities: Option<String>,
    #[serde(default)]
    qualifications: Option<String>,
}

/// Pre-filter criteria taken from the company's source URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SourceFilter {
    team: Option<String>,
    location: Option<String>,
    search: Option<String>,
}

impl SourceFilter {
    fn from_url(url: &str) -> Self {
        let Ok(parsed) = Url::parse(url) else {
            return Self::default();
        };
        let mut filter = Self::default();
        for (key, value) in parsed.query_pairs() {
            let value = value.trim().to_lowercase();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "team" => filter.team = Some(value),
                "location" => filter.location = Some(value),
                "search" => filter.search = Some(value),
                _ => {}
            }
        }
        filter
    }

    fn keep(&self, listing: &AtlassianListing) -> bool {
        if let Some(team) = &self.team {
            let candidate = listing
                .category
                .as_deref()
                .or(listing.department.as_deref())
                .unwrap_or_default()
                .to_lowercase();
            if !candidate.contains(team) {
                return false;
            }
        }
        if let Some(location) = &self.location {
            if !listing
                .location
                .as_deref()
                .unwrap_or_default()
                .to_lowercase()
                .contains(location)
            {
                return false;
            }
        }
        if let Some(search) = &self.search {
            if !listing.title.to_lowercase().contains(search) {
                return false;
            }
        }
        true
    }
}

pub struct AtlassianScraper {
    http: Arc<dyn HttpClient>,
}

impl AtlassianScraper {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    async fn fetch_details(&self, id: &str) -> Option<AtlassianDetails> {
        let endpoint = format!("{DETAILS_ENDPOINT}/{}", urlencoding::encode(id));
        match self.http.get(&endpoint, &RequestOptions::new()).await {
            Ok(response) if response.ok() => response.json().ok(),
            Ok(response) => {
                debug!(id, status = response.status, "Atlassian details rejected");
                None
            }
            Err(e) => {
                debug!(id, error = %e, "Atlassian details failed");
                None
            }
        }
    }

    fn map_listing(&self, listing: &AtlassianListing) -> ScrapedJob {
        let id = listing.id_string();
        let external_id = generate_external_id(Platform::Atlassian, &[Some(id.as_str())]);
        let url = listing
            .apply_url
            .clone()
            .unwrap_or_else(|| format!("https://www.atlassian.com/company/careers/details/{id}"));

        let mut scraped = ScrapedJob::new(external_id, listing.title.trim(), url);

        if let Some(raw) = listing.location.as_deref().filter(|l| !l.trim().is_empty()) {
            let normalized = normalize_location(raw);
            scraped.location = normalized.location;
            scraped.location_type = normalized.location_type;
        }
        scraped.department = listing
            .category
            .clone()
            .or_else(|| listing.department.clone());
        if let Some(assembled) = listing.assemble_description() {
            let (text, format) = normalize_description(&assembled);
            scraped.description = Some(text);
            scraped.description_format = format;
        }
        scraped.posted_date = listing.posted_date.as_ref().and_then(normalize_posted_date);
        scraped.seniority_level = parse_seniority(&scraped.title);

        scraped
    }
}

#[async_trait]
impl JobScraper for AtlassianScraper {
    fn platform(&self) -> Platform {
        Platform::Atlassian
    }

    fn validate(&self, url: &str) -> bool {
        url.to_lowercase().contains("atlassian.com")
    }

    fn extract_identifier(&self, _url: &str) -> Option<String> {
        // One global board; there is no per-company token
        None
    }

    async fn scrape(&self, url: &str, options: &ScrapeOptions) -> ScraperResult {
        let response = match self.http.get(LISTINGS_ENDPOINT, &RequestOptions::new()).await {
            Ok(response) => response,
            Err(e) => return ScraperResult::error(e.to_string()),
        };
        if !response.ok() {
            return ScraperResult::error(format!(
                "atlassian listings returned status {}",
                response.status
            ));
        }
        let listings: Vec<AtlassianListing> = match response.json() {
            Ok(listings) => listings,
            Err(e) => return ScraperResult::error(e.to_string()),
        };

        // Server-side pre-filter from the company's source URL
        let source_filter = SourceFilter::from_url(url);
        let listings: Vec<AtlassianListing> = listings
            .into_iter()
            .filter(|l| source_filter.keep(l))
            .collect();

        let mut jobs: Vec<ScrapedJob> = Vec::with_capacity(listings.len());
        let mut detail_failures = 0usize;
        for listing in &listings {
            let mut job = self.map_listing(listing);
            let needs_details = !listing.has_inline_sections()
                && !options.existing_external_ids.contains(&job.external_id);
            if needs_details {
                match self.fetch_details(&listing.id_string()).await {
                    Some(details) => {
                        let full = AtlassianListing {
                            id: listing.id.clone(),
                            title: listing.title.clone(),
                            location: None,
                            category: None,
                            department: None,
                            overview: details.overview,
                            responsibilities: details.responsibilities,
                            qualifications: details.qualifications,
                            apply_url: None,
                            posted_date: None,
                        };
                        if let Some(assembled) = full.assemble_description() {
                            let (text, format) = normalize_description(&assembled);
                            job.description = Some(text);
                            job.description_format = format;
                        }
                    }
                    None => detail_failures += 1,
                }
            }
            jobs.push(job);
        }

        if detail_failures > 0 {
            ScraperResult::partial(
                jobs,
                Some(format!("{detail_failures} detail fetches failed")),
            )
        } else {
            ScraperResult::success(jobs)
        }
    }
}
