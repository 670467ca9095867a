//! The scrape orchestrator: per-company runs, batch sessions, archival
//! lifecycle, and the matcher hand-off.
//!
//! Dependencies come in through trait objects (repository, matcher) and the
//! adapter registry, so the orchestrator owns only the pipeline: look up →
//! scrape → reopen → archive → dedupe → hydrate → filter → insert → log.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ScraperConfig;
use crate::dedup::{Deduplicator, MatchReason};
use crate::filters::{JobFilters, apply_filters};
use crate::logging::ScraperLogger;
use crate::matcher::{MatchContext, MatchEngine};
use crate::models::{
    Company, CompanyPatch, FetchResult, JobStatus, LogStatus, MatcherStatus, ScrapeOutcome,
    ScrapingLogPatch, ScrapingLogRow, SessionProgress, SessionStatus, TriggerSource,
};
use crate::platform::Platform;
use crate::repository::{JobHydration, Repository, settings};
use crate::scrapers::{ScrapeOptions, ScraperRegistry};

/// Uber enumerates its whole global board; a truncated crawl would look like a
/// mass disappearance. Archival is skipped when more than
/// `max(UBER_GUARD_MIN, ceil(UBER_GUARD_RATIO * archivable))` jobs went missing
/// at once.
const UBER_GUARD_MIN: usize = 5;
const UBER_GUARD_RATIO: f64 = 0.05;

/// Bounds for the persisted `scraper_max_parallel_scrapes` setting.
const MAX_PARALLEL_RANGE: std::ops::RangeInclusive<i64> = 1..=10;

/// Per-call options for a single-company scrape.
#[derive(Debug, Clone, Default)]
pub struct ScrapeCompanyOptions {
    pub session_id: Option<Uuid>,
    pub trigger_source: Option<TriggerSource>,
    pub filters: Option<JobFilters>,
}

/// Outcome of one batch run.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub session_id: Uuid,
    pub status: SessionStatus,
    /// Per-company results in input company order; companies never started
    /// because the session was stopped are absent
    pub results: Vec<FetchResult>,
}

pub struct ScrapeOrchestrator {
    repository: Arc<dyn Repository>,
    registry: Arc<ScraperRegistry>,
    matcher: Arc<dyn MatchEngine>,
    dedup: Deduplicator,
    logger: ScraperLogger,
    config: ScraperConfig,
}

impl ScrapeOrchestrator {
    pub fn new(
        repository: Arc<dyn Repository>,
        registry: Arc<ScraperRegistry>,
        matcher: Arc<dyn MatchEngine>,
        config: ScraperConfig,
    ) -> Self {
        Self {
            repository,
            registry,
            matcher,
            dedup: Deduplicator::default(),
            logger: ScraperLogger,
            config,
        }
    }

    // -- single company ------------------------------------------------------

    pub async fn scrape_company(
        &self,
        company_id: i64,
        options: ScrapeCompanyOptions,
    ) -> FetchResult {
        let started = Instant::now();
        let trigger = options.trigger_source.unwrap_or(TriggerSource::Manual);
        let session_id = options.session_id;

        let company = match self.repository.get_company(company_id).await {
            Ok(Some(company)) => company,
            Ok(None) => {
                let mut result =
                    FetchResult::empty(company_id, "unknown", ScrapeOutcome::Error);
                result.error = Some(format!("company {company_id} not found"));
                return result;
            }
            Err(e) => {
                let mut result =
                    FetchResult::empty(company_id, "unknown", ScrapeOutcome::Error);
                result.error = Some(format!("failed to load company {company_id}: {e}"));
                return result;
            }
        };

        // Companies without an adapter are skipped, not failed
        if company.platform == Platform::Custom {
            return self
                .skip_custom_company(&company, session_id, trigger, started)
                .await;
        }

        match self
            .run_company_pipeline(&company, trigger, options, started)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                let message = e.to_string();
                self.logger.error(&company.name, &message);
                let log_id = self
                    .write_error_log(&company, session_id, trigger, &message, started)
                    .await;
                let mut result =
                    FetchResult::empty(company.id, company.name.clone(), ScrapeOutcome::Error);
                result.platform = Some(company.platform);
                result.log_id = log_id;
                result.duration_ms = started.elapsed().as_millis() as u64;
                result.error = Some(message);
                result
            }
        }
    }

    async fn skip_custom_company(
        &self,
        company: &Company,
        session_id: Option<Uuid>,
        trigger: TriggerSource,
        started: Instant,
    ) -> FetchResult {
        debug!(company = %company.name, "Custom platform, skipping scrape");
        let log_id = self
            .repository
            .create_scraping_log(ScrapingLogRow {
                company_id: company.id,
                session_id,
                status: LogStatus::Success,
                trigger_source: trigger,
                jobs_found: 0,
                jobs_added: 0,
                jobs_updated: 0,
                jobs_filtered: 0,
                jobs_archived: 0,
                error: None,
                duration_ms: started.elapsed().as_millis() as u64,
            })
            .await
            .ok();

        let mut result =
            FetchResult::empty(company.id, company.name.clone(), ScrapeOutcome::Success);
        result.platform = Some(Platform::Custom);
        result.log_id = log_id;
        result.duration_ms = started.elapsed().as_millis() as u64;
        result
    }

    async fn write_error_log(
        &self,
        company: &Company,
        session_id: Option<Uuid>,
        trigger: TriggerSource,
        message: &str,
        started: Instant,
    ) -> Option<i64> {
        self.repository
            .create_scraping_log(ScrapingLogRow {
                company_id: company.id,
                session_id,
                status: LogStatus::Error,
                trigger_source: trigger,
                jobs_found: 0,
                jobs_added: 0,
                jobs_updated: 0,
                jobs_filtered: 0,
                jobs_archived: 0,
                error: Some(message.to_string()),
                duration_ms: started.elapsed().as_millis() as u64,
            })
            .await
            .ok()
    }

    async fn run_company_pipeline(
        &self,
        company: &Company,
        trigger: TriggerSource,
        options: ScrapeCompanyOptions,
        started: Instant,
    ) -> anyhow::Result<FetchResult> {
        self.logger.start(&company.name, company.platform);

        let existing_jobs = self.repository.get_existing_jobs(company.id).await?;
        // Rows without a description stay out of this set so the adapter
        // re-fetches their details
        let existing_external_ids: HashSet<String> = existing_jobs
            .iter()
            .filter(|j| j.has_description())
            .filter_map(|j| j.external_id.clone())
            .collect();

        let filters = self.load_filters(options.filters).await?;

        let scrape_options = ScrapeOptions {
            board_token: company.board_token.clone(),
            filters: Some(filters.clone()),
            existing_external_ids,
        };
        let result = self
            .registry
            .scrape(&company.url, Some(company.platform), &scrape_options)
            .await;

        match result.early_filtered.as_ref() {
            Some(stats) => self.logger.fetched_with_early_filter(
                &company.name,
                company.platform,
                result.jobs.len(),
                stats,
            ),
            None => self
                .logger
                .fetched(&company.name, company.platform, result.jobs.len()),
        }

        if result.outcome == ScrapeOutcome::Error {
            let message = result
                .error
                .unwrap_or_else(|| "scrape failed with no error message".to_string());
            self.logger.error(&company.name, &message);
            let log_id = self
                .write_error_log(company, options.session_id, trigger, &message, started)
                .await;
            let mut fetch =
                FetchResult::empty(company.id, company.name.clone(), ScrapeOutcome::Error);
            fetch.platform = Some(company.platform);
            fetch.log_id = log_id;
            fetch.duration_ms = started.elapsed().as_millis() as u64;
            fetch.error = Some(message);
            return Ok(fetch);
        }

        // The open set falls back to the returned jobs when the adapter did
        // not enumerate separately
        let open_external_ids: Vec<String> = dedup_preserving_order(
            if result.open_external_ids.is_empty() {
                result.jobs.iter().map(|j| j.external_id.clone()).collect()
            } else {
                result.open_external_ids.clone()
            },
        );

        if !open_external_ids.is_empty() {
            self.repository
                .reopen_scraper_archived_jobs(company.id, &open_external_ids)
                .await?;
        }

        let jobs_archived = if result.open_external_ids_complete {
            self.archive_missing(company, &existing_jobs, &open_external_ids)
                .await?
        } else {
            debug!(
                company = %company.name,
                "Open-id enumeration incomplete, skipping archival"
            );
            0
        };

        let jobs_found = result.jobs.len();
        let outcome = result.outcome;
        let dedup_outcome = self.dedup.batch_deduplicate(result.jobs, &existing_jobs);

        // Re-hydrate descriptions on trusted duplicate matches
        let existing_by_id: HashMap<i64, _> =
            existing_jobs.iter().map(|j| (j.id, j)).collect();
        let patches: Vec<JobHydration> = dedup_outcome
            .duplicates
            .iter()
            .filter(|dup| {
                matches!(dup.match_reason, MatchReason::ExternalId | MatchReason::Url)
            })
            .filter(|dup| dup.job.has_description())
            .filter_map(|dup| {
                let existing_id = dup.existing_job_id?;
                let existing = existing_by_id.get(&existing_id)?;
                let scraped_description = dup.job.description.as_deref().unwrap_or_default();
                let stale = match existing.description.as_deref() {
                    None => true,
                    Some(current) => current.trim().is_empty() || current != scraped_description,
                };
                stale.then(|| JobHydration {
                    existing_job_id: existing_id,
                    job: dup.job.clone(),
                })
            })
            .collect();
        let jobs_updated = if patches.is_empty() {
            0
        } else {
            self.repository
                .update_existing_jobs_from_scrape(&patches)
                .await?
        };

        let (kept, breakdown) = apply_filters(dedup_outcome.new_jobs, &filters);
        self.logger.filtered(&company.name, &breakdown);

        let inserted_ids = if kept.is_empty() {
            Vec::new()
        } else {
            self.repository.insert_jobs(company.id, &kept).await?
        };

        let now = chrono::Utc::now();
        let board_token = match (&company.board_token, &result.detected_board_token) {
            (None, Some(token)) => Some(token.clone()),
            _ => None,
        };
        self.repository
            .update_company(
                company.id,
                CompanyPatch {
                    last_scraped_at: Some(now),
                    updated_at: Some(now),
                    board_token,
                },
            )
            .await?;

        let early_filtered = result.early_filtered.map(|s| s.total).unwrap_or(0);
        let jobs_filtered = breakdown.dropped() + early_filtered;
        let log_id = self
            .repository
            .create_scraping_log(ScrapingLogRow {
                company_id: company.id,
                session_id: options.session_id,
                status: LogStatus::from(outcome),
                trigger_source: trigger,
                jobs_found,
                jobs_added: inserted_ids.len(),
                jobs_updated: jobs_updated as usize,
                jobs_filtered,
                jobs_archived: jobs_archived as usize,
                error: result.error.clone(),
                duration_ms: started.elapsed().as_millis() as u64,
            })
            .await?;

        self.logger
            .added(&company.name, inserted_ids.len(), jobs_updated as usize, jobs_archived);

        self.maybe_spawn_matcher(company, trigger, log_id, &inserted_ids)
            .await;

        Ok(FetchResult {
            company_id: company.id,
            company_name: company.name.clone(),
            success: outcome == ScrapeOutcome::Success,
            outcome,
            jobs_found,
            jobs_added: inserted_ids.len(),
            jobs_updated: jobs_updated as usize,
            jobs_filtered,
            jobs_archived: jobs_archived as usize,
            platform: Some(company.platform),
            log_id: Some(log_id),
            duration_ms: started.elapsed().as_millis() as u64,
            error: result.error,
        })
    }

    /// Merge explicit filters over persisted settings.
    async fn load_filters(&self, explicit: Option<JobFilters>) -> anyhow::Result<JobFilters> {
        let country = self
            .repository
            .get_setting(settings::FILTER_COUNTRY)
            .await?
            .filter(|v| !v.trim().is_empty());
        let city = self
            .repository
            .get_setting(settings::FILTER_CITY)
            .await?
            .filter(|v| !v.trim().is_empty());
        let title_keywords = match self
            .repository
            .get_setting(settings::FILTER_TITLE_KEYWORDS)
            .await?
        {
            Some(raw) => serde_json::from_str::<Vec<String>>(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Unparsable title keyword setting, ignoring");
                Vec::new()
            }),
            None => Vec::new(),
        };

        let persisted = JobFilters {
            country,
            city,
            title_keywords,
        };
        Ok(match explicit {
            Some(filters) => filters.merged_over(persisted),
            None => persisted,
        })
    }

    async fn archive_missing(
        &self,
        company: &Company,
        existing_jobs: &[crate::models::ExistingJob],
        open_external_ids: &[String],
    ) -> anyhow::Result<u64> {
        if company.platform == Platform::Uber {
            let open: HashSet<&str> = open_external_ids.iter().map(String::as_str).collect();
            let archivable: Vec<&crate::models::ExistingJob> = existing_jobs
                .iter()
                .filter(|j| JobStatus::ARCHIVABLE.contains(&j.status))
                .filter(|j| j.external_id.is_some())
                .collect();
            let missing = archivable
                .iter()
                .filter(|j| {
                    j.external_id
                        .as_deref()
                        .is_some_and(|id| !open.contains(id))
                })
                .count();
            if uber_guard_trips(archivable.len(), missing) {
                warn!(
                    company = %company.name,
                    missing,
                    archivable = archivable.len(),
                    "Uber archive guard tripped, skipping archival"
                );
                return Ok(0);
            }
        }

        self.repository
            .archive_missing_jobs(company.id, open_external_ids, JobStatus::ARCHIVABLE)
            .await
            .map_err(Into::into)
    }

    /// Kick off background matching for inserted jobs that have descriptions.
    /// The spawned task owns only clones; its failures are recorded on the log
    /// row and never surface to the caller.
    async fn maybe_spawn_matcher(
        &self,
        company: &Company,
        trigger: TriggerSource,
        log_id: i64,
        inserted_ids: &[i64],
    ) {
        if inserted_ids.is_empty() {
            return;
        }
        let auto_match = match self.matcher.get_matcher_config().await {
            Ok(config) => config.auto_match_after_scrape,
            Err(e) => {
                warn!(error = %e, "Failed to load matcher config, skipping auto-match");
                false
            }
        };
        if !auto_match {
            return;
        }

        let matchable = match self.repository.get_matchable_job_ids(inserted_ids).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Failed to resolve matchable jobs, skipping auto-match");
                return;
            }
        };
        if matchable.is_empty() {
            return;
        }

        let pending = ScrapingLogPatch {
            matcher_status: Some(MatcherStatus::Pending),
            matcher_jobs_total: Some(matchable.len()),
            ..Default::default()
        };
        if let Err(e) = self.repository.update_scraping_log(log_id, pending).await {
            warn!(error = %e, "Failed to stamp matcher hand-off, skipping auto-match");
            return;
        }

        let repository = self.repository.clone();
        let matcher = self.matcher.clone();
        let company_id = company.id;
        let company_name = company.name.clone();
        let job_ids = matchable;
        tokio::spawn(async move {
            let matcher_started = Instant::now();
            let _ = repository
                .update_scraping_log(
                    log_id,
                    ScrapingLogPatch {
                        matcher_status: Some(MatcherStatus::InProgress),
                        ..Default::default()
                    },
                )
                .await;

            let progress_repo = repository.clone();
            let context = MatchContext {
                trigger_source: trigger,
                company_id: Some(company_id),
                on_progress: Some(Box::new(move |completed| {
                    let repo = progress_repo.clone();
                    tokio::spawn(async move {
                        let _ = repo
                            .update_scraping_log(
                                log_id,
                                ScrapingLogPatch {
                                    matcher_jobs_completed: Some(completed),
                                    ..Default::default()
                                },
                            )
                            .await;
                    });
                })),
            };

            let terminal = match matcher.match_with_tracking(&job_ids, context).await {
                Ok(run) => {
                    info!(
                        company = %company_name,
                        total = run.total,
                        succeeded = run.succeeded,
                        failed = run.failed,
                        "Matcher run finished"
                    );
                    ScrapingLogPatch {
                        matcher_status: Some(if run.all_failed() {
                            MatcherStatus::Failed
                        } else {
                            MatcherStatus::Completed
                        }),
                        matcher_jobs_completed: Some(run.succeeded + run.failed),
                        matcher_error_count: Some(run.failed),
                        matcher_duration_ms: Some(matcher_started.elapsed().as_millis() as u64),
                        ..Default::default()
                    }
                }
                Err(e) => {
                    warn!(company = %company_name, error = %e, "Matcher run failed");
                    ScrapingLogPatch {
                        matcher_status: Some(MatcherStatus::Failed),
                        matcher_duration_ms: Some(matcher_started.elapsed().as_millis() as u64),
                        ..Default::default()
                    }
                }
            };
            let _ = repository.update_scraping_log(log_id, terminal).await;
        });
    }

    // -- batches -------------------------------------------------------------

    pub async fn scrape_all_companies(&self, trigger: TriggerSource) -> anyhow::Result<BatchResult> {
        let companies = self.repository.get_active_companies().await?;
        self.run_batch(companies, trigger).await
    }

    pub async fn scrape_companies(
        &self,
        company_ids: &[i64],
        trigger: TriggerSource,
    ) -> anyhow::Result<BatchResult> {
        let wanted: HashSet<i64> = company_ids.iter().copied().collect();
        let companies = self
            .repository
            .get_active_companies()
            .await?
            .into_iter()
            .filter(|c| wanted.contains(&c.id))
            .collect();
        self.run_batch(companies, trigger).await
    }

    async fn run_batch(
        &self,
        companies: Vec<Company>,
        trigger: TriggerSource,
    ) -> anyhow::Result<BatchResult> {
        // Custom-platform companies are skip-logged in per-company runs, but a
        // batch does not bother calling them at all
        let companies: Vec<Company> = companies
            .into_iter()
            .filter(|c| c.active && c.platform != Platform::Custom)
            .collect();

        let session = self
            .repository
            .create_session(trigger, companies.len())
            .await?;

        let worker_count = self.resolve_max_parallel().await.min(companies.len()).max(1);
        self.logger.batch_start(companies.len(), worker_count);

        let cursor = AtomicUsize::new(0);
        let results: Vec<std::sync::Mutex<Option<FetchResult>>> =
            (0..companies.len()).map(|_| std::sync::Mutex::new(None)).collect();
        // Progress updates are serialized so counters never overlap
        let progress_lock = AsyncMutex::new(());

        let workers = (0..worker_count).map(|worker_id| {
            let cursor = &cursor;
            let results = &results;
            let progress_lock = &progress_lock;
            let companies = &companies;
            let session_id = session.id;
            async move {
                loop {
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    if index >= companies.len() {
                        break;
                    }

                    // Cooperative stop: observed on every new task pickup
                    match self.repository.is_session_in_progress(session_id).await {
                        Ok(true) => {}
                        Ok(false) => {
                            debug!(worker_id, "Session no longer in progress, worker draining");
                            break;
                        }
                        Err(e) => {
                            warn!(worker_id, error = %e, "Session status check failed, continuing");
                        }
                    }

                    let company = &companies[index];
                    let fetch = self
                        .scrape_company(
                            company.id,
                            ScrapeCompanyOptions {
                                session_id: Some(session_id),
                                trigger_source: Some(trigger),
                                filters: None,
                            },
                        )
                        .await;

                    let progress = SessionProgress {
                        companies_completed: 1,
                        jobs_found: fetch.jobs_found,
                        jobs_added: fetch.jobs_added,
                        jobs_filtered: fetch.jobs_filtered,
                        jobs_archived: fetch.jobs_archived,
                    };
                    *results[index].lock().unwrap() = Some(fetch);

                    let _guard = progress_lock.lock().await;
                    if let Err(e) = self
                        .repository
                        .update_session_progress(session_id, progress)
                        .await
                    {
                        warn!(worker_id, error = %e, "Failed to update session progress");
                    }
                }
            }
        });
        futures::future::join_all(workers).await;

        let results: Vec<FetchResult> = results
            .into_iter()
            .filter_map(|slot| slot.into_inner().unwrap())
            .collect();

        let outcomes: Vec<ScrapeOutcome> = results.iter().map(|r| r.outcome).collect();
        let mut status = SessionStatus::from_outcomes(&outcomes);
        match self.repository.is_session_in_progress(session.id).await {
            Ok(true) => {
                self.repository.complete_session(session.id, status).await?;
            }
            Ok(false) => {
                info!(session_id = %session.id, "Session stopped externally, leaving its status as-is");
                status = SessionStatus::Stopped;
            }
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Failed to check session before completion");
            }
        }

        let mut counters = crate::models::SessionCounters::default();
        for result in &results {
            counters.companies_completed += 1;
            counters.total_jobs_found += result.jobs_found;
            counters.total_jobs_added += result.jobs_added;
            counters.total_jobs_filtered += result.jobs_filtered;
            counters.total_jobs_archived += result.jobs_archived;
        }
        self.logger.batch_complete(&counters);

        Ok(BatchResult {
            session_id: session.id,
            status,
            results,
        })
    }

    /// Clamp the persisted parallelism setting into range, defaulting on
    /// anything missing or unparsable.
    async fn resolve_max_parallel(&self) -> usize {
        let raw = self
            .repository
            .get_setting(settings::MAX_PARALLEL_SCRAPES)
            .await
            .ok()
            .flatten();
        resolve_max_parallel_setting(raw.as_deref(), self.config.default_max_parallel_scrapes)
    }
}

fn resolve_max_parallel_setting(raw: Option<&str>, default: usize) -> usize {
    match raw.and_then(|v| v.trim().parse::<i64>().ok()) {
        Some(value) if MAX_PARALLEL_RANGE.contains(&value) => value as usize,
        Some(_) | None => default,
    }
}

/// Whether the Uber archive guard should skip archival: true when `missing`
/// exceeds `max(5, ceil(0.05 * archivable))`.
fn uber_guard_trips(archivable: usize, missing: usize) -> bool {
    let threshold = UBER_GUARD_MIN.max((UBER_GUARD_RATIO * archivable as f64).ceil() as usize);
    missing > threshold
}

fn dedup_preserving_order(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
