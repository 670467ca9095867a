//! Workday career-site adapter.
//!
//! Workday's CXS JSON API requires cookies and a CSRF token from a real page
//! load, so every scrape starts with a browser bootstrap. Listing pages are
//! POSTed twenty at a time with a staggered pair of parallel fetches; details
//! run through the adaptive hydrator. A job whose detail fetch fails is
//! dropped from the output, but its id stays in the open set: the listing
//! enumeration is what feeds archival.

use async_trait::async_trait;
use futures::future::join_all;
use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::browser::{BrowserClient, BrowserSession};
use crate::config::HydratorConfig;
use crate::filters::EarlyFilter;
use crate::http::{HttpClient, RequestOptions};
use crate::hydrate::hydrate;
use crate::models::{ScrapedJob, ScraperResult};
use crate::normalize::{
    generate_external_id, normalize_description, normalize_location, parse_employment_type,
    parse_posted_date_str, parse_seniority,
};
use crate::platform::Platform;
use crate::scrapers::{JobScraper, ScrapeOptions};

const PAGE_SIZE: usize = 20;
const PARALLEL_LIST_FETCHES: usize = 2;
const LIST_STAGGER_MIN_MS: u64 = 300;
const LIST_STAGGER_MAX_MS: u64 = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    job_postings: Vec<WorkdayPosting>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkdayPosting {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    external_path: Option<String>,
    #[serde(default)]
    locations_text: Option<String>,
    #[serde(default)]
    posted_on: Option<String>,
    /// First entry is the job posting id
    #[serde(default)]
    bullet_fields: Vec<String>,
}

impl WorkdayPosting {
    fn posting_id(&self) -> Option<&str> {
        self.bullet_fields
            .iter()
            .map(String::as_str)
            .find(|f| !f.is_empty())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailResponse {
    #[serde(default)]
    job_posting_info: Option<JobPostingInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobPostingInfo {
    #[serde(default)]
    job_description: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    time_type: Option<String>,
    #[serde(default)]
    external_url: Option<String>,
}

/// Tenant and board parsed from a Workday URL like
/// `https://acme.wd5.myworkdayjobs.com/en-US/External`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BoardAddress {
    tenant: String,
    board: String,
}

fn locale_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z]{2}-[A-Z]{2}$").unwrap())
}

fn parse_board_address(url: &str) -> Option<BoardAddress> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let tenant = host.split('.').next().filter(|t| !t.is_empty())?;
    let board = parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .find(|s| !locale_pattern().is_match(s))?;
    Some(BoardAddress {
        tenant: tenant.to_string(),
        board: board.to_string(),
    })
}

pub struct WorkdayScraper {
    http: Arc<dyn HttpClient>,
    browser: Arc<dyn BrowserClient>,
    hydrator: HydratorConfig,
}

impl WorkdayScraper {
    pub fn new(
        http: Arc<dyn HttpClient>,
        browser: Arc<dyn BrowserClient>,
        hydrator: HydratorConfig,
    ) -> Self {
        Self {
            http,
            browser,
            hydrator,
        }
    }

    fn session_options(&self, session: &BrowserSession) -> RequestOptions {
        let mut options = RequestOptions::new()
            .with_header("Accept", "application/json")
            .with_header("Content-Type", "application/json");
        if let Some(cookie) = session.cookie_header() {
            options = options.with_header("Cookie", cookie);
        }
        if let Some(token) = &session.csrf_token {
            options = options.with_header("X-CALYPSO-CSRF-TOKEN", token.clone());
        }
        options
    }

    async fn fetch_list_page(
        &self,
        origin: &str,
        address: &BoardAddress,
        session: &BrowserSession,
        offset: usize,
    ) -> crate::error::Result<ListResponse> {
        let endpoint = format!(
            "{origin}/wday/cxs/{}/{}/jobs",
            address.tenant, address.board
        );
        let body = json!({
            "appliedFacets": {},
            "limit": PAGE_SIZE,
            "offset": offset,
            "searchText": "",
        });
        let response = self
            .http
            .post(&endpoint, body, &self.session_options(session))
            .await?;
        if response.status == 403 {
            return Err(crate::error::ScraperError::Csrf(format!(
                "workday list rejected with status {}",
                response.status
            )));
        }
        if !response.ok() {
            return Err(crate::error::ScraperError::Network(format!(
                "workday list returned status {}",
                response.status
            )));
        }
        response.json()
    }

    async fn fetch_all_postings(
        &self,
        origin: &str,
        address: &BoardAddress,
        session: &BrowserSession,
    ) -> crate::error::Result<(Vec<WorkdayPosting>, bool)> {
        // First page alone establishes the total and validates the session
        let first = self.fetch_list_page(origin, address, session, 0).await?;
        let total = first.total;
        let mut postings = first.job_postings;
        let mut complete = true;
        let mut offset = PAGE_SIZE;

        while offset < total {
            let fetches: Vec<_> = (0..PARALLEL_LIST_FETCHES)
                .map(|i| offset + i * PAGE_SIZE)
                .filter(|page_offset| *page_offset < total)
                .enumerate()
                .map(|(i, page_offset)| {
                    let stagger = rand::rng().random_range(LIST_STAGGER_MIN_MS..=LIST_STAGGER_MAX_MS);
                    async move {
                        sleep(Duration::from_millis(stagger * i as u64)).await;
                        self.fetch_list_page(origin, address, session, page_offset)
                            .await
                    }
                })
                .collect();

            let pages = join_all(fetches).await;
            for page in pages {
                match page {
                    Ok(response) => postings.extend(response.job_postings),
                    Err(e) => {
                        warn!(tenant = %address.tenant, error = %e, "Workday list page failed");
                        complete = false;
                    }
                }
            }
            if !complete {
                break;
            }
            offset += PARALLEL_LIST_FETCHES * PAGE_SIZE;
        }

        Ok((postings, complete))
    }

    async fn fetch_detail(
        &self,
        origin: &str,
        address: &BoardAddress,
        session: &BrowserSession,
        external_path: &str,
    ) -> Option<JobPostingInfo> {
        let endpoint = format!(
            "{origin}/wday/cxs/{}/{}{external_path}",
            address.tenant, address.board
        );
        match self.http.get(&endpoint, &self.session_options(session)).await {
            Ok(response) if response.ok() => response
                .json::<DetailResponse>()
                .ok()
                .and_then(|d| d.job_posting_info),
            Ok(response) => {
                debug!(external_path, status = response.status, "Workday detail rejected");
                None
            }
            Err(e) => {
                debug!(external_path, error = %e, "Workday detail failed");
                None
            }
        }
    }

    fn map_posting(
        &self,
        origin: &str,
        board: &str,
        posting: &WorkdayPosting,
        posting_id: &str,
        detail: Option<JobPostingInfo>,
    ) -> ScrapedJob {
        let external_id = generate_external_id(Platform::Workday, &[Some(board), Some(posting_id)]);
        let detail_url = detail.as_ref().and_then(|d| d.external_url.clone());
        let url = detail_url.unwrap_or_else(|| {
            format!(
                "{origin}{}",
                posting.external_path.as_deref().unwrap_or_default()
            )
        });
        let title = posting.title.as_deref().unwrap_or("Untitled role").trim();

        let mut scraped = ScrapedJob::new(external_id, title, url);

        let location_raw = detail
            .as_ref()
            .and_then(|d| d.location.clone())
            .or_else(|| posting.locations_text.clone());
        if let Some(raw) = location_raw.filter(|l| !l.trim().is_empty()) {
            let normalized = normalize_location(&raw);
            scraped.location = normalized.location;
            scraped.location_type = normalized.location_type;
        }

        if let Some(info) = &detail {
            if let Some(description) = info.job_description.as_deref().filter(|d| !d.trim().is_empty()) {
                let (text, format) = normalize_description(description);
                scraped.description = Some(text);
                scraped.description_format = format;
            }
            scraped.employment_type = info.time_type.as_deref().and_then(parse_employment_type);
        }

        scraped.posted_date = posting.posted_on.as_deref().and_then(parse_posted_date_str);
        scraped.seniority_level = parse_seniority(&scraped.title);

        scraped
    }
}

#[async_trait]
impl JobScraper for WorkdayScraper {
    fn platform(&self) -> Platform {
        Platform::Workday
    }

    fn validate(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        lower.contains("myworkdayjobs.com") || lower.contains("myworkdaysite.com")
    }

    fn extract_identifier(&self, url: &str) -> Option<String> {
        parse_board_address(url).map(|address| address.board)
    }

    async fn scrape(&self, url: &str, options: &ScrapeOptions) -> ScraperResult {
        let Some(address) = parse_board_address(url) else {
            return ScraperResult::error(format!(
                "could not extract workday tenant/board from '{url}'"
            ));
        };
        let origin = match Url::parse(url) {
            Ok(parsed) => parsed.origin().ascii_serialization(),
            Err(_) => return ScraperResult::error(format!("invalid workday url '{url}'")),
        };

        let session = match self.browser.bootstrap(url).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                return ScraperResult::error(format!(
                    "workday session bootstrap yielded no session for '{url}'"
                ));
            }
            Err(e) => return ScraperResult::error(format!("workday session bootstrap failed: {e}")),
        };

        let (postings, list_complete) =
            match self.fetch_all_postings(&origin, &address, &session).await {
                Ok(result) => result,
                Err(e) => return ScraperResult::error(e.to_string()),
            };

        // Keep only postings with an id; everything listed counts as open
        let postings: Vec<(String, WorkdayPosting)> = postings
            .into_iter()
            .filter_map(|p| p.posting_id().map(|id| (id.to_string(), p.clone())))
            .collect();
        let open_external_ids: Vec<String> = postings
            .iter()
            .map(|(id, _)| {
                generate_external_id(Platform::Workday, &[Some(address.board.as_str()), Some(id.as_str())])
            })
            .collect();

        let mut early = EarlyFilter::new(options.filters.as_ref());
        let postings: Vec<(String, WorkdayPosting)> = postings
            .into_iter()
            .filter(|(_, p)| match &mut early {
                Some(filter) => filter.keep(
                    p.title.as_deref().unwrap_or_default(),
                    p.locations_text.as_deref(),
                ),
                None => true,
            })
            .collect();

        // Skip detail fetches for rows that already carry a description
        let existing: HashSet<&String> = options.existing_external_ids.iter().collect();
        let mut listing_only: Vec<ScrapedJob> = Vec::new();
        let mut to_hydrate: Vec<(String, WorkdayPosting)> = Vec::new();
        for (id, posting) in postings {
            let external_id = generate_external_id(
                Platform::Workday,
                &[Some(address.board.as_str()), Some(id.as_str())],
            );
            if existing.contains(&external_id) {
                listing_only.push(self.map_posting(&origin, &address.board, &posting, &id, None));
            } else {
                to_hydrate.push((id, posting));
            }
        }

        let hydrated = hydrate(to_hydrate, &self.hydrator, |(id, posting)| {
            let origin = origin.clone();
            let address = address.clone();
            let session = session.clone();
            async move {
                let path = posting.external_path.clone()?;
                let detail = self
                    .fetch_detail(&origin, &address, &session, &path)
                    .await?;
                Some(self.map_posting(&origin, &address.board, &posting, &id, Some(detail)))
            }
        })
        .await;

        // Details that failed drop their job from the output entirely
        let detail_failures = hydrated.failures;
        let mut jobs = listing_only;
        jobs.extend(hydrated.results);

        let mut result = if detail_failures > 0 || !list_complete {
            let message = if detail_failures > 0 {
                format!("{detail_failures} detail fetches failed")
            } else {
                "list pagination incomplete".to_string()
            };
            ScraperResult::partial(jobs, Some(message))
        } else {
            ScraperResult::success(jobs)
        };
        result.open_external_ids = open_external_ids;
        result.open_external_ids_complete = list_complete;
        if options.board_token.is_none() {
            result = result.with_board_token(address.board.clone());
        }
        if let Some(filter) = early {
            result = result.with_early_filtered(filter.stats());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_address_parsing() {
        let address =
            parse_board_address("https://acme.wd5.myworkdayjobs.com/en-US/External").unwrap();
        assert_eq!(address.tenant, "acme");
        assert_eq!(address.board, "External");

        let address = parse_board_address("https://acme.wd103.myworkdayjobs.com/careers").unwrap();
        assert_eq!(address.board, "careers");

        assert!(parse_board_address("not a url").is_none());
        assert!(parse_board_address("https://acme.wd5.myworkdayjobs.com/").is_none());
    }

    #[test]
    fn posting_id_is_first_nonempty_bullet() {
        let posting = WorkdayPosting {
            title: Some("SE".to_string()),
            external_path: None,
            locations_text: None,
            posted_on: None,
            bullet_fields: vec!["".to_string(), "JR-1234".to_string()],
        };
        assert_eq!(posting.posting_id(), Some("JR-1234"));
    }
}
