//! Eightfold career-site adapter.
//!
//! Eightfold boards serve JSON from `/api/pcsx/*` endpoints keyed by a tenant
//! domain. The domain comes from a bootstrapped browser session when one is
//! available, otherwise it is scraped out of the careers page itself. Detail
//! fetches are the throttled surface, so they run through the adaptive
//! hydrator; a missing detail never drops a job, it just leaves the
//! listing-level record and marks the run partial.

use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::browser::BrowserClient;
use crate::config::HydratorConfig;
use crate::filters::EarlyFilter;
use crate::http::{HttpClient, RequestOptions};
use crate::hydrate::hydrate;
use crate::models::{ScrapedJob, ScraperResult};
use crate::normalize::{
    generate_external_id, normalize_description, normalize_location, normalize_posted_date,
    parse_seniority,
};
use crate::platform::Platform;
use crate::scrapers::{JobScraper, ScrapeOptions};

const PAGE_SIZE: usize = 10;
const PARALLEL_LIST_FETCHES: usize = 2;
const LIST_STAGGER: Duration = Duration::from_millis(300);

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    positions: Vec<EightfoldPosition>,
    #[serde(default)]
    count: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
struct EightfoldPosition {
    id: i64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    locations: Vec<String>,
    #[serde(default)]
    business_unit: Option<String>,
    #[serde(default)]
    t_update: Option<serde_json::Value>,
    #[serde(default)]
    t_create: Option<serde_json::Value>,
    #[serde(default)]
    canonical_position_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PositionDetails {
    #[serde(default)]
    job_description: Option<String>,
}

fn domain_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#""domain"\s*:\s*"([^"]+)""#).unwrap())
}

pub struct EightfoldScraper {
    http: Arc<dyn HttpClient>,
    browser: Arc<dyn BrowserClient>,
    hydrator: HydratorConfig,
}

impl EightfoldScraper {
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

    /// Resolve the tenant domain: browser session first, then the careers
    /// page's embedded `job_cart` JSON.
    async fn resolve_domain(&self, url: &str) -> Option<String> {
        match self.browser.bootstrap(url).await {
            Ok(Some(session)) => {
                if let Some(domain) = session.domain.filter(|d| !d.is_empty()) {
                    return Some(domain);
                }
            }
            Ok(None) => debug!(url, "Browser bootstrap yielded no session"),
            Err(e) => warn!(url, error = %e, "Browser bootstrap failed, scraping page for domain"),
        }

        let response = self.http.get(url, &RequestOptions::new()).await.ok()?;
        if !response.ok() {
            return None;
        }
        domain_pattern()
            .captures(response.text())
            .map(|caps| caps[1].to_string())
    }

    async fn fetch_list_page(
        &self,
        origin: &str,
        domain: &str,
        offset: usize,
    ) -> crate::error::Result<SearchResponse> {
        let endpoint = format!(
            "{origin}/api/pcsx/search?domain={}&start={offset}&sort_by=timestamp",
            urlencoding::encode(domain)
        );
        let response = self.http.get(&endpoint, &RequestOptions::new()).await?;
        if !response.ok() {
            return Err(crate::error::ScraperError::Network(format!(
                "eightfold search returned status {}",
                response.status
            )));
        }
        response.json()
    }

    /// Paginate the search endpoint, two pages at a time with a stagger.
    /// Returns the positions and whether the enumeration completed.
    async fn fetch_all_positions(
        &self,
        origin: &str,
        domain: &str,
    ) -> (Vec<EightfoldPosition>, bool) {
        let mut seen: HashSet<i64> = HashSet::new();
        let mut positions: Vec<EightfoldPosition> = Vec::new();
        let mut offset = 0usize;
        let mut complete = true;

        loop {
            let fetches = (0..PARALLEL_LIST_FETCHES).map(|i| {
                let page_offset = offset + i * PAGE_SIZE;
                async move {
                    sleep(LIST_STAGGER * i as u32).await;
                    self.fetch_list_page(origin, domain, page_offset).await
                }
            });
            let pages = join_all(fetches).await;

            let mut reached_end = false;
            let mut total: Option<usize> = None;
            for page in pages {
                match page {
                    Ok(response) => {
                        total = total.or(response.count);
                        let fetched = response.positions.len();
                        for position in response.positions {
                            if seen.insert(position.id) {
                                positions.push(position);
                            }
                        }
                        if fetched < PAGE_SIZE {
                            reached_end = true;
                        }
                    }
                    Err(e) => {
                        warn!(domain, error = %e, "Eightfold list page failed");
                        complete = false;
                        reached_end = true;
                    }
                }
            }

            if let Some(total) = total {
                if positions.len() >= total {
                    reached_end = true;
                }
            }
            if reached_end {
                break;
            }
            offset += PARALLEL_LIST_FETCHES * PAGE_SIZE;
        }

        (positions, complete)
    }

    async fn fetch_details(&self, origin: &str, domain: &str, id: i64) -> Option<String> {
        let endpoint = format!(
            "{origin}/api/pcsx/position_details?position_id={id}&domain={}",
            urlencoding::encode(domain)
        );
        match self.http.get(&endpoint, &RequestOptions::new()).await {
            Ok(response) if response.ok() => response
                .json::<PositionDetails>()
                .ok()
                .and_then(|d| d.job_description)
                .filter(|d| !d.trim().is_empty()),
            Ok(response) => {
                // 403/429 here is the throttle kicking in; the hydrator reacts
                debug!(id, status = response.status, "Eightfold detail rejected");
                None
            }
            Err(e) => {
                debug!(id, error = %e, "Eightfold detail failed");
                None
            }
        }
    }

    fn map_position(&self, origin: &str, token: &str, position: &EightfoldPosition) -> ScrapedJob {
        let id_string = position.id.to_string();
        let external_id =
            generate_external_id(Platform::Eightfold, &[Some(token), Some(id_string.as_str())]);
        let url = position
            .canonical_position_url
            .clone()
            .unwrap_or_else(|| format!("{origin}/careers?pid={}", position.id));
        let title = position.name.as_deref().unwrap_or("Untitled role").trim();

        let mut scraped = ScrapedJob::new(external_id, title, url);

        let location_raw = position
            .location
            .clone()
            .filter(|l| !l.trim().is_empty())
            .or_else(|| {
                if position.locations.is_empty() {
                    None
                } else {
                    Some(position.locations.join(", "))
                }
            });
        if let Some(raw) = location_raw {
            let normalized = normalize_location(&raw);
            scraped.location = normalized.location;
            scraped.location_type = normalized.location_type;
        }

        scraped.department = position.business_unit.clone();
        scraped.posted_date = position
            .t_update
            .as_ref()
            .or(position.t_create.as_ref())
            .and_then(normalize_posted_date);
        scraped.seniority_level = parse_seniority(&scraped.title);

        scraped
    }
}

#[async_trait]
impl JobScraper for EightfoldScraper {
    fn platform(&self) -> Platform {
        Platform::Eightfold
    }

    fn validate(&self, url: &str) -> bool {
        url.to_lowercase().contains("eightfold.ai")
    }

    fn extract_identifier(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        // Tenant-hosted boards look like acme.eightfold.ai
        let suffix = ".eightfold.ai";
        host.strip_suffix(suffix)
            .filter(|prefix| !prefix.is_empty() && *prefix != "careers" && *prefix != "app")
            .map(str::to_string)
    }

    async fn scrape(&self, url: &str, options: &ScrapeOptions) -> ScraperResult {
        let origin = match Url::parse(url) {
            Ok(parsed) => parsed.origin().ascii_serialization(),
            Err(_) => return ScraperResult::error(format!("invalid eightfold url '{url}'")),
        };

        let Some(domain) = self.resolve_domain(url).await else {
            return ScraperResult::error(format!(
                "could not resolve eightfold tenant domain for '{url}'"
            ));
        };
        let token = options.board_token.clone().unwrap_or_else(|| domain.clone());

        let (positions, list_complete) = self.fetch_all_positions(&origin, &domain).await;
        if positions.is_empty() && !list_complete {
            return ScraperResult::error("eightfold listing produced no usable data".to_string());
        }

        // Everything the listing saw counts as open, including records the
        // early filter drops below: they still exist at the source
        let open_external_ids: Vec<String> = positions
            .iter()
            .map(|p| {
                generate_external_id(
                    Platform::Eightfold,
                    &[Some(token.as_str()), Some(p.id.to_string().as_str())],
                )
            })
            .collect();

        // Early filter raw listing records before spending detail requests
        let mut early = EarlyFilter::new(options.filters.as_ref());
        let positions: Vec<EightfoldPosition> = positions
            .into_iter()
            .filter(|p| match &mut early {
                Some(filter) => filter.keep(
                    p.name.as_deref().unwrap_or_default(),
                    p.location.as_deref(),
                ),
                None => true,
            })
            .collect();

        let mut jobs_by_id: HashMap<i64, ScrapedJob> = positions
            .iter()
            .map(|p| (p.id, self.map_position(&origin, &token, p)))
            .collect();

        // Split out positions whose rows already carry a description
        let to_hydrate: Vec<&EightfoldPosition> = positions
            .iter()
            .filter(|p| {
                !options
                    .existing_external_ids
                    .contains(&jobs_by_id[&p.id].external_id)
            })
            .collect();

        let hydrated = hydrate(to_hydrate, &self.hydrator, |position| {
            let origin = origin.clone();
            let domain = domain.clone();
            let id = position.id;
            async move {
                self.fetch_details(&origin, &domain, id)
                    .await
                    .map(|description| (id, description))
            }
        })
        .await;

        let detail_failures = hydrated.failures;
        for (id, description) in hydrated.results {
            if let Some(job) = jobs_by_id.get_mut(&id) {
                let (text, format) = normalize_description(&description);
                job.description = Some(text);
                job.description_format = format;
            }
        }

        // Listing order is the output order
        let jobs: Vec<ScrapedJob> = positions
            .iter()
            .filter_map(|p| jobs_by_id.remove(&p.id))
            .collect();

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
            result = result.with_board_token(token);
        }
        if let Some(filter) = early {
            result = result.with_early_filtered(filter.stats());
        }
        result
    }
}
