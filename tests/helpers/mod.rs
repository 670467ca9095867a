//! Shared in-memory doubles for integration tests: repository, HTTP
//! transport, browser, and matcher, plus row builders.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use uuid::Uuid;

use jobscout::browser::{BrowserClient, BrowserSession};
use jobscout::http::{HttpClient, HttpResponse, RequestOptions};
use jobscout::matcher::{MatchContext, MatchEngine, MatchRun, MatcherConfig};
use jobscout::models::{
    Company, CompanyPatch, ExistingJob, JobStatus, ScrapeSession, ScrapedJob, ScrapingLogPatch,
    ScrapingLogRow, SessionCounters, SessionProgress, SessionStatus, TriggerSource,
};
use jobscout::platform::Platform;
use jobscout::repository::{JobHydration, RepoResult, Repository};

// -- builders ----------------------------------------------------------------

pub fn make_company(id: i64, name: &str, url: &str, platform: Platform) -> Company {
    Company {
        id,
        name: name.to_string(),
        url: url.to_string(),
        platform,
        board_token: None,
        active: true,
        last_scraped_at: None,
        updated_at: None,
    }
}

pub fn make_existing_job(
    id: i64,
    external_id: Option<&str>,
    title: &str,
    url: &str,
    status: JobStatus,
    description: Option<&str>,
) -> ExistingJob {
    ExistingJob {
        id,
        external_id: external_id.map(str::to_string),
        title: title.to_string(),
        url: url.to_string(),
        status,
        description: description.map(str::to_string),
    }
}

// -- mock repository ---------------------------------------------------------

#[derive(Default)]
pub struct MockRepository {
    pub companies: Mutex<Vec<Company>>,
    /// company id -> rows
    pub jobs: Mutex<HashMap<i64, Vec<ExistingJob>>>,
    pub settings: Mutex<HashMap<String, String>>,
    pub sessions: Mutex<HashMap<Uuid, ScrapeSession>>,
    pub logs: Mutex<Vec<(i64, ScrapingLogRow)>>,
    pub log_patches: Mutex<Vec<(i64, ScrapingLogPatch)>>,
    pub inserted: Mutex<Vec<(i64, Vec<ScrapedJob>)>>,
    pub hydrations: Mutex<Vec<JobHydration>>,
    pub archive_calls: Mutex<Vec<(i64, Vec<String>)>>,
    pub reopen_calls: Mutex<Vec<(i64, Vec<String>)>>,
    pub progress_updates: Mutex<Vec<(Uuid, SessionProgress)>>,
    pub completed_sessions: Mutex<Vec<(Uuid, SessionStatus)>>,
    pub company_patches: Mutex<Vec<(i64, CompanyPatch)>>,
    next_job_id: AtomicI64,
    next_log_id: AtomicI64,
    /// When set, the session is stopped after this many progress updates
    pub stop_after_progress_updates: Mutex<Option<usize>>,
}

impl MockRepository {
    pub fn new() -> Self {
        Self {
            next_job_id: AtomicI64::new(1000),
            next_log_id: AtomicI64::new(1),
            ..Default::default()
        }
    }

    pub fn with_company(self, company: Company) -> Self {
        self.companies.lock().unwrap().push(company);
        self
    }

    pub fn with_jobs(self, company_id: i64, rows: Vec<ExistingJob>) -> Self {
        self.jobs.lock().unwrap().insert(company_id, rows);
        self
    }

    pub fn with_setting(self, key: &str, value: &str) -> Self {
        self.settings
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn log_rows(&self) -> Vec<(i64, ScrapingLogRow)> {
        self.logs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Repository for MockRepository {
    async fn get_company(&self, id: i64) -> RepoResult<Option<Company>> {
        Ok(self
            .companies
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn get_active_companies(&self) -> RepoResult<Vec<Company>> {
        Ok(self
            .companies
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.active)
            .cloned()
            .collect())
    }

    async fn update_company(&self, id: i64, patch: CompanyPatch) -> RepoResult<()> {
        self.company_patches.lock().unwrap().push((id, patch));
        Ok(())
    }

    async fn get_existing_jobs(&self, company_id: i64) -> RepoResult<Vec<ExistingJob>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .get(&company_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_jobs(&self, company_id: i64, jobs: &[ScrapedJob]) -> RepoResult<Vec<i64>> {
        let mut ids = Vec::with_capacity(jobs.len());
        let mut store = self.jobs.lock().unwrap();
        let rows = store.entry(company_id).or_default();
        for job in jobs {
            let id = self.next_job_id.fetch_add(1, Ordering::SeqCst);
            rows.push(ExistingJob {
                id,
                external_id: Some(job.external_id.clone()),
                title: job.title.clone(),
                url: job.url.clone(),
                status: JobStatus::New,
                description: job.description.clone(),
            });
            ids.push(id);
        }
        self.inserted
            .lock()
            .unwrap()
            .push((company_id, jobs.to_vec()));
        Ok(ids)
    }

    async fn update_existing_jobs_from_scrape(&self, patches: &[JobHydration]) -> RepoResult<u64> {
        let mut mutated = 0u64;
        let mut store = self.jobs.lock().unwrap();
        for patch in patches {
            for rows in store.values_mut() {
                if let Some(row) = rows.iter_mut().find(|r| r.id == patch.existing_job_id) {
                    row.description = patch.job.description.clone();
                    mutated += 1;
                }
            }
        }
        self.hydrations.lock().unwrap().extend(patches.iter().cloned());
        Ok(mutated)
    }

    async fn reopen_scraper_archived_jobs(
        &self,
        company_id: i64,
        external_ids: &[String],
    ) -> RepoResult<u64> {
        self.reopen_calls
            .lock()
            .unwrap()
            .push((company_id, external_ids.to_vec()));
        let mut reopened = 0u64;
        if let Some(rows) = self.jobs.lock().unwrap().get_mut(&company_id) {
            for row in rows.iter_mut() {
                if row.status == JobStatus::Archived
                    && row
                        .external_id
                        .as_deref()
                        .is_some_and(|id| external_ids.iter().any(|e| e == id))
                {
                    row.status = JobStatus::New;
                    reopened += 1;
                }
            }
        }
        Ok(reopened)
    }

    async fn archive_missing_jobs(
        &self,
        company_id: i64,
        open_external_ids: &[String],
        archivable_statuses: &[JobStatus],
    ) -> RepoResult<u64> {
        self.archive_calls
            .lock()
            .unwrap()
            .push((company_id, open_external_ids.to_vec()));
        let mut archived = 0u64;
        if let Some(rows) = self.jobs.lock().unwrap().get_mut(&company_id) {
            for row in rows.iter_mut() {
                let missing = row
                    .external_id
                    .as_deref()
                    .is_some_and(|id| !open_external_ids.iter().any(|e| e == id));
                if missing && archivable_statuses.contains(&row.status) {
                    row.status = JobStatus::Archived;
                    archived += 1;
                }
            }
        }
        Ok(archived)
    }

    async fn get_matchable_job_ids(&self, ids: &[i64]) -> RepoResult<Vec<i64>> {
        let store = self.jobs.lock().unwrap();
        let mut matchable = Vec::new();
        for rows in store.values() {
            for row in rows {
                if ids.contains(&row.id)
                    && row
                        .description
                        .as_deref()
                        .is_some_and(|d| !d.trim().is_empty())
                {
                    matchable.push(row.id);
                }
            }
        }
        matchable.sort_unstable();
        Ok(matchable)
    }

    async fn get_setting(&self, key: &str) -> RepoResult<Option<String>> {
        Ok(self.settings.lock().unwrap().get(key).cloned())
    }

    async fn create_session(
        &self,
        trigger_source: TriggerSource,
        companies_total: usize,
    ) -> RepoResult<ScrapeSession> {
        let session = ScrapeSession {
            id: Uuid::new_v4(),
            trigger_source,
            status: SessionStatus::InProgress,
            companies_total,
            counters: SessionCounters::default(),
            started_at: Utc::now(),
        };
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id, session.clone());
        Ok(session)
    }

    async fn is_session_in_progress(&self, session_id: Uuid) -> RepoResult<bool> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(&session_id)
            .is_some_and(|s| s.status == SessionStatus::InProgress))
    }

    async fn stop_session(&self, session_id: Uuid) -> RepoResult<()> {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(&session_id) {
            session.status = SessionStatus::Stopped;
        }
        Ok(())
    }

    async fn update_session_progress(
        &self,
        session_id: Uuid,
        progress: SessionProgress,
    ) -> RepoResult<()> {
        let update_count = {
            let mut updates = self.progress_updates.lock().unwrap();
            updates.push((session_id, progress));
            updates.len()
        };
        if let Some(session) = self.sessions.lock().unwrap().get_mut(&session_id) {
            session.counters.companies_completed += progress.companies_completed;
            session.counters.total_jobs_found += progress.jobs_found;
            session.counters.total_jobs_added += progress.jobs_added;
            session.counters.total_jobs_filtered += progress.jobs_filtered;
            session.counters.total_jobs_archived += progress.jobs_archived;
        }
        // Simulated external stop for cancellation tests
        let stop_after = *self.stop_after_progress_updates.lock().unwrap();
        if stop_after.is_some_and(|n| update_count >= n) {
            if let Some(session) = self.sessions.lock().unwrap().get_mut(&session_id) {
                if session.status == SessionStatus::InProgress {
                    session.status = SessionStatus::Stopped;
                }
            }
        }
        Ok(())
    }

    async fn complete_session(&self, session_id: Uuid, status: SessionStatus) -> RepoResult<()> {
        self.completed_sessions
            .lock()
            .unwrap()
            .push((session_id, status));
        if let Some(session) = self.sessions.lock().unwrap().get_mut(&session_id) {
            session.status = status;
        }
        Ok(())
    }

    async fn create_scraping_log(&self, row: ScrapingLogRow) -> RepoResult<i64> {
        let id = self.next_log_id.fetch_add(1, Ordering::SeqCst);
        self.logs.lock().unwrap().push((id, row));
        Ok(id)
    }

    async fn update_scraping_log(&self, log_id: i64, patch: ScrapingLogPatch) -> RepoResult<()> {
        self.log_patches.lock().unwrap().push((log_id, patch));
        Ok(())
    }

    async fn acquire_scheduler_lock(&self, _name: &str, _ttl_secs: u64) -> RepoResult<bool> {
        Ok(true)
    }

    async fn refresh_scheduler_lock(&self, _name: &str, _ttl_secs: u64) -> RepoResult<bool> {
        Ok(true)
    }

    async fn release_scheduler_lock(&self, _name: &str) -> RepoResult<()> {
        Ok(())
    }
}

// -- mock HTTP transport -----------------------------------------------------

/// Substring-routed canned transport. The first route whose pattern appears in
/// the request URL answers; unrouted requests fail as network errors.
#[derive(Default)]
pub struct MockHttpClient {
    routes: Mutex<Vec<(String, u16, String)>>,
    pub requests: Mutex<Vec<String>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, pattern: &str, status: u16, body: &str) -> Self {
        self.routes
            .lock()
            .unwrap()
            .push((pattern.to_string(), status, body.to_string()));
        self
    }

    pub fn add_route(&self, pattern: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .push((pattern.to_string(), status, body.to_string()));
    }

    pub fn request_count(&self, pattern: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.contains(pattern))
            .count()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn fetch(
        &self,
        url: &str,
        _options: &RequestOptions,
    ) -> jobscout::Result<HttpResponse> {
        self.requests.lock().unwrap().push(url.to_string());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        // Yield so overlapping fetches actually overlap
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let routes = self.routes.lock().unwrap();
        match routes.iter().find(|(pattern, _, _)| url.contains(pattern)) {
            Some((_, status, body)) => Ok(HttpResponse::new(*status, body.clone())),
            None => Err(jobscout::ScraperError::Network(format!(
                "no canned route for '{url}'"
            ))),
        }
    }
}

// -- mock browser ------------------------------------------------------------

pub struct MockBrowser {
    pub session: Option<BrowserSession>,
}

impl MockBrowser {
    pub fn none() -> Self {
        Self { session: None }
    }

    pub fn with_session(session: BrowserSession) -> Self {
        Self {
            session: Some(session),
        }
    }
}

#[async_trait]
impl BrowserClient for MockBrowser {
    async fn bootstrap(&self, _url: &str) -> jobscout::Result<Option<BrowserSession>> {
        Ok(self.session.clone())
    }

    async fn close(&self) {}
}

// -- mock matcher ------------------------------------------------------------

pub struct MockMatcher {
    pub auto_match: bool,
    pub calls: Mutex<Vec<Vec<i64>>>,
    pub run: MatchRun,
}

impl MockMatcher {
    pub fn disabled() -> Self {
        Self {
            auto_match: false,
            calls: Mutex::new(Vec::new()),
            run: MatchRun::default(),
        }
    }

    pub fn enabled(run: MatchRun) -> Self {
        Self {
            auto_match: true,
            calls: Mutex::new(Vec::new()),
            run,
        }
    }
}

#[async_trait]
impl MatchEngine for MockMatcher {
    async fn get_matcher_config(&self) -> anyhow::Result<MatcherConfig> {
        Ok(MatcherConfig {
            auto_match_after_scrape: self.auto_match,
        })
    }

    async fn match_with_tracking(
        &self,
        job_ids: &[i64],
        context: MatchContext,
    ) -> anyhow::Result<MatchRun> {
        self.calls.lock().unwrap().push(job_ids.to_vec());
        if let Some(on_progress) = &context.on_progress {
            for completed in 1..=job_ids.len() {
                on_progress(completed);
            }
        }
        Ok(self.run)
    }
}
