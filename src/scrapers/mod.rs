//! Platform adapters and the registry that dispatches to them.
//!
//! Every adapter implements [`JobScraper`]: a cheap URL validator, a board
//! identifier extractor, and `scrape`, which never raises — failures come back
//! as a [`ScraperResult`] with an error outcome so the orchestrator can log
//! them uniformly.

pub mod ashby;
pub mod atlassian;
pub mod eightfold;
pub mod google;
pub mod greenhouse;
pub mod lever;
pub mod uber;
pub mod workday;

pub use ashby::AshbyScraper;
pub use atlassian::AtlassianScraper;
pub use eightfold::EightfoldScraper;
pub use google::GoogleScraper;
pub use greenhouse::GreenhouseScraper;
pub use lever::LeverScraper;
pub use uber::UberScraper;
pub use workday::WorkdayScraper;

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use crate::browser::BrowserClient;
use crate::config::ScraperConfig;
use crate::filters::JobFilters;
use crate::http::HttpClient;
use crate::models::ScraperResult;
use crate::platform::Platform;

/// Options passed to an adapter for one scrape call.
#[derive(Debug, Clone, Default)]
pub struct ScrapeOptions {
    /// Board identifier when the company already has one persisted
    pub board_token: Option<String>,
    /// Early-filter criteria; adapters apply them to raw listing records when
    /// they can do so before detail fetches
    pub filters: Option<JobFilters>,
    /// External ids whose rows already carry a description; adapters skip
    /// detail fetches for these
    pub existing_external_ids: HashSet<String>,
}

/// One platform adapter.
#[async_trait]
pub trait JobScraper: Send + Sync {
    fn platform(&self) -> Platform;

    /// Cheap check whether this adapter understands the URL.
    fn validate(&self, url: &str) -> bool;

    /// Extract the board slug/tenant from the URL, when the URL carries one.
    fn extract_identifier(&self, url: &str) -> Option<String>;

    /// Scrape the board. Never raises: any failure becomes a result with
    /// `outcome = error` and an empty job list.
    async fn scrape(&self, url: &str, options: &ScrapeOptions) -> ScraperResult;
}

/// Holds the adapters; dispatches by explicit platform or URL validation in
/// registration order. Built once at startup.
#[derive(Default)]
pub struct ScraperRegistry {
    scrapers: Vec<Arc<dyn JobScraper>>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry with all eight platform adapters registered.
    pub fn with_default_scrapers(
        http: Arc<dyn HttpClient>,
        browser: Arc<dyn BrowserClient>,
        config: &ScraperConfig,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GreenhouseScraper::new(http.clone())));
        registry.register(Arc::new(LeverScraper::new(http.clone())));
        registry.register(Arc::new(AshbyScraper::new(http.clone())));
        registry.register(Arc::new(EightfoldScraper::new(
            http.clone(),
            browser.clone(),
            config.hydrator.clone(),
        )));
        registry.register(Arc::new(WorkdayScraper::new(
            http.clone(),
            browser,
            config.hydrator.clone(),
        )));
        registry.register(Arc::new(UberScraper::new(http.clone())));
        registry.register(Arc::new(GoogleScraper::new(
            http.clone(),
            config.hydrator.clone(),
        )));
        registry.register(Arc::new(AtlassianScraper::new(http)));
        registry
    }

    pub fn register(&mut self, scraper: Arc<dyn JobScraper>) {
        self.scrapers.push(scraper);
    }

    /// First registered adapter whose validator accepts the URL.
    pub fn get_scraper_for_url(&self, url: &str) -> Option<Arc<dyn JobScraper>> {
        self.scrapers.iter().find(|s| s.validate(url)).cloned()
    }

    pub fn get_scraper_by_platform(&self, platform: Platform) -> Option<Arc<dyn JobScraper>> {
        self.scrapers
            .iter()
            .find(|s| s.platform() == platform)
            .cloned()
    }

    pub fn supported_platforms(&self) -> Vec<Platform> {
        self.scrapers.iter().map(|s| s.platform()).collect()
    }

    /// Dispatch a scrape: an explicit platform wins, then URL detection, then
    /// an error result listing what is supported.
    pub async fn scrape(
        &self,
        url: &str,
        platform: Option<Platform>,
        options: &ScrapeOptions,
    ) -> ScraperResult {
        let scraper = match platform {
            Some(p) => self.get_scraper_by_platform(p),
            None => None,
        }
        .or_else(|| self.get_scraper_for_url(url));

        match scraper {
            Some(scraper) => scraper.scrape(url, options).await,
            None => {
                let supported = self
                    .supported_platforms()
                    .iter()
                    .map(Platform::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                ScraperResult::error(format!(
                    "no scraper available for url '{url}'; supported platforms: {supported}"
                ))
            }
        }
    }
}
