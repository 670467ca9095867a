//! Persistence seam consumed by the orchestrator.
//!
//! The concrete store lives outside this crate; the orchestrator only needs
//! the operations below. All methods are I/O and may fail; the repository is
//! assumed to serialize its own writes.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    Company, CompanyPatch, ExistingJob, JobStatus, ScrapeSession, ScrapedJob, ScrapingLogRow,
    ScrapingLogPatch, SessionProgress, SessionStatus, TriggerSource,
};

pub type RepoResult<T> = anyhow::Result<T>;

/// A description patch queued for an existing row when a duplicate scraped job
/// carries fresher text (external-id or url matches only).
#[derive(Debug, Clone)]
pub struct JobHydration {
    pub existing_job_id: i64,
    pub job: ScrapedJob,
}

#[async_trait]
pub trait Repository: Send + Sync {
    // -- companies --
    async fn get_company(&self, id: i64) -> RepoResult<Option<Company>>;
    async fn get_active_companies(&self) -> RepoResult<Vec<Company>>;
    async fn update_company(&self, id: i64, patch: CompanyPatch) -> RepoResult<()>;

    // -- jobs --
    async fn get_existing_jobs(&self, company_id: i64) -> RepoResult<Vec<ExistingJob>>;
    /// Insert rows, returning their ids in input order.
    async fn insert_jobs(&self, company_id: i64, jobs: &[ScrapedJob]) -> RepoResult<Vec<i64>>;
    /// Apply description patches; returns the number of rows mutated.
    async fn update_existing_jobs_from_scrape(
        &self,
        patches: &[JobHydration],
    ) -> RepoResult<u64>;
    /// Reopen previously scraper-archived jobs whose external id reappeared.
    async fn reopen_scraper_archived_jobs(
        &self,
        company_id: i64,
        external_ids: &[String],
    ) -> RepoResult<u64>;
    /// Archive jobs in `archivable_statuses` whose external id is missing from
    /// `open_external_ids`; returns the number archived.
    async fn archive_missing_jobs(
        &self,
        company_id: i64,
        open_external_ids: &[String],
        archivable_statuses: &[JobStatus],
    ) -> RepoResult<u64>;
    /// Subset of `ids` whose rows have a non-empty description.
    async fn get_matchable_job_ids(&self, ids: &[i64]) -> RepoResult<Vec<i64>>;

    // -- settings --
    async fn get_setting(&self, key: &str) -> RepoResult<Option<String>>;

    // -- sessions --
    async fn create_session(
        &self,
        trigger_source: TriggerSource,
        companies_total: usize,
    ) -> RepoResult<ScrapeSession>;
    async fn is_session_in_progress(&self, session_id: Uuid) -> RepoResult<bool>;
    async fn stop_session(&self, session_id: Uuid) -> RepoResult<()>;
    async fn update_session_progress(
        &self,
        session_id: Uuid,
        progress: SessionProgress,
    ) -> RepoResult<()>;
    async fn complete_session(&self, session_id: Uuid, status: SessionStatus) -> RepoResult<()>;

    // -- scraping logs --
    async fn create_scraping_log(&self, row: ScrapingLogRow) -> RepoResult<i64>;
    async fn update_scraping_log(&self, log_id: i64, patch: ScrapingLogPatch) -> RepoResult<()>;

    // -- scheduler lock (used by the external periodic trigger, not the orchestrator) --
    async fn acquire_scheduler_lock(&self, name: &str, ttl_secs: u64) -> RepoResult<bool>;
    async fn refresh_scheduler_lock(&self, name: &str, ttl_secs: u64) -> RepoResult<bool>;
    async fn release_scheduler_lock(&self, name: &str) -> RepoResult<()>;
}

/// Settings keys the orchestrator reads for filter and parallelism defaults.
pub mod settings {
    pub const FILTER_COUNTRY: &str = "scraper_filter_country";
    pub const FILTER_CITY: &str = "scraper_filter_city";
    /// JSON string array
    pub const FILTER_TITLE_KEYWORDS: &str = "scraper_filter_title_keywords";
    /// Integer in 1..=10; anything else falls back to the default
    pub const MAX_PARALLEL_SCRAPES: &str = "scraper_max_parallel_scrapes";
}
