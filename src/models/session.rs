use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::result::ScrapeOutcome;

/// What kicked off a scrape run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Manual,
    Scheduler,
    AutoMatch,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Manual => "manual",
            Self::Scheduler => "scheduler",
            Self::AutoMatch => "auto_match",
        };
        f.write_str(s)
    }
}

/// Session lifecycle status.
///
/// `Stopped` is set out-of-band by an external actor; workers observe it via
/// `is_session_in_progress` and drain cooperatively.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Partial,
    Failed,
    Stopped,
}

impl SessionStatus {
    /// Terminal status for a batch given the per-company outcomes: completed
    /// if all succeeded, failed if all errored, partial otherwise.
    pub fn from_outcomes(outcomes: &[ScrapeOutcome]) -> Self {
        if outcomes.is_empty() {
            return Self::Completed;
        }
        if outcomes.iter().all(|o| *o == ScrapeOutcome::Success) {
            Self::Completed
        } else if outcomes.iter().all(|o| *o == ScrapeOutcome::Error) {
            Self::Failed
        } else {
            Self::Partial
        }
    }
}

/// Aggregate counters mutated over the life of a session.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionCounters {
    pub companies_completed: usize,
    pub total_jobs_found: usize,
    pub total_jobs_added: usize,
    pub total_jobs_filtered: usize,
    pub total_jobs_archived: usize,
}

/// A scrape session row: one per batch (or single-company) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSession {
    pub id: Uuid,
    pub trigger_source: TriggerSource,
    pub status: SessionStatus,
    pub companies_total: usize,
    pub counters: SessionCounters,
    pub started_at: DateTime<Utc>,
}

/// Per-company counter delta applied to a session after each worker task.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionProgress {
    pub companies_completed: usize,
    pub jobs_found: usize,
    pub jobs_added: usize,
    pub jobs_filtered: usize,
    pub jobs_archived: usize,
}

/// Status of a per-company scraping log row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Success,
    Partial,
    Error,
}

impl From<ScrapeOutcome> for LogStatus {
    fn from(outcome: ScrapeOutcome) -> Self {
        match outcome {
            ScrapeOutcome::Success => Self::Success,
            ScrapeOutcome::Partial => Self::Partial,
            ScrapeOutcome::Error => Self::Error,
        }
    }
}

/// Sub-state of the background matcher hand-off recorded on a log row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatcherStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// A new per-company per-session scraping log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingLogRow {
    pub company_id: i64,
    pub session_id: Option<Uuid>,
    pub status: LogStatus,
    pub trigger_source: TriggerSource,
    pub jobs_found: usize,
    pub jobs_added: usize,
    pub jobs_updated: usize,
    pub jobs_filtered: usize,
    pub jobs_archived: usize,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Patch applied to an existing log row, mainly by the matcher hand-off task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapingLogPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matcher_status: Option<MatcherStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matcher_jobs_total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matcher_jobs_completed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matcher_error_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matcher_duration_ms: Option<u64>,
}
