use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::job::ScrapedJob;
use crate::platform::Platform;

/// How a single adapter run ended.
///
/// `Partial` means the data is usable but incomplete: some details missing, or
/// list pagination cut short.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeOutcome {
    Success,
    Partial,
    Error,
}

impl fmt::Display for ScrapeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Counts of listing records dropped by an adapter's early filter, before any
/// detail fetch was spent on them.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EarlyFilterStats {
    pub total: usize,
    pub country: usize,
    pub city: usize,
    pub title: usize,
}

impl EarlyFilterStats {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// The output of one adapter `scrape` call.
///
/// Invariants: when `outcome == Error`, `jobs` is empty. When
/// `open_external_ids_complete` is false the orchestrator must not archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperResult {
    pub success: bool,
    pub outcome: ScrapeOutcome,
    pub jobs: Vec<ScrapedJob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Board identifier the adapter inferred from the URL, surfaced so the
    /// orchestrator can persist it for companies that had none configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_board_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub early_filtered: Option<EarlyFilterStats>,
    /// Every external id the adapter saw open at the source, including jobs it
    /// skipped detail-fetching for. Feeds the archival pass.
    pub open_external_ids: Vec<String>,
    /// Whether the listing enumeration covered the whole board without gaps
    pub open_external_ids_complete: bool,
}

impl ScraperResult {
    /// A full-success result over the given jobs; `open_external_ids` defaults
    /// to the job ids.
    pub fn success(jobs: Vec<ScrapedJob>) -> Self {
        let open_external_ids = jobs.iter().map(|j| j.external_id.clone()).collect();
        Self {
            success: true,
            outcome: ScrapeOutcome::Success,
            jobs,
            error: None,
            detected_board_token: None,
            early_filtered: None,
            open_external_ids,
            open_external_ids_complete: true,
        }
    }

    /// A partial result: usable jobs, but some details or pages are missing.
    pub fn partial(jobs: Vec<ScrapedJob>, error: Option<String>) -> Self {
        let open_external_ids = jobs.iter().map(|j| j.external_id.clone()).collect();
        Self {
            success: false,
            outcome: ScrapeOutcome::Partial,
            jobs,
            error,
            detected_board_token: None,
            early_filtered: None,
            open_external_ids,
            open_external_ids_complete: true,
        }
    }

    /// An error result. `jobs` is always empty and archival is disabled.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            outcome: ScrapeOutcome::Error,
            jobs: Vec::new(),
            error: Some(message.into()),
            detected_board_token: None,
            early_filtered: None,
            open_external_ids: Vec::new(),
            open_external_ids_complete: false,
        }
    }

    pub fn with_board_token(mut self, token: impl Into<String>) -> Self {
        self.detected_board_token = Some(token.into());
        self
    }

    pub fn with_early_filtered(mut self, stats: EarlyFilterStats) -> Self {
        if !stats.is_empty() {
            self.early_filtered = Some(stats);
        }
        self
    }
}

/// The orchestrator's per-company return value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub company_id: i64,
    pub company_name: String,
    pub success: bool,
    pub outcome: ScrapeOutcome,
    pub jobs_found: usize,
    pub jobs_added: usize,
    pub jobs_updated: usize,
    pub jobs_filtered: usize,
    pub jobs_archived: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_id: Option<i64>,
    /// Wall-clock duration of the company run in milliseconds
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchResult {
    /// A zero-counter result for a company that was not scraped (custom
    /// platform, or a lookup failure).
    pub fn empty(company_id: i64, company_name: impl Into<String>, outcome: ScrapeOutcome) -> Self {
        Self {
            company_id,
            company_name: company_name.into(),
            success: outcome == ScrapeOutcome::Success,
            outcome,
            jobs_found: 0,
            jobs_added: 0,
            jobs_updated: 0,
            jobs_filtered: 0,
            jobs_archived: 0,
            platform: None,
            log_id: None,
            duration_ms: 0,
            error: None,
        }
    }
}
