//! AI match-engine seam.
//!
//! After a scrape inserts jobs with descriptions, the orchestrator can hand
//! their ids to the matcher in a background task. The engine lives outside
//! this crate.

use async_trait::async_trait;

use crate::models::TriggerSource;

#[derive(Debug, Clone, Copy, Default)]
pub struct MatcherConfig {
    /// Whether scrapes should trigger matching automatically
    pub auto_match_after_scrape: bool,
}

/// Final tally of one matching run.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchRun {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl MatchRun {
    /// A run where every job failed (and there was at least one).
    pub fn all_failed(&self) -> bool {
        self.total > 0 && self.failed == self.total
    }
}

/// Context passed along with a matching request. `on_progress` receives the
/// cumulative completed count as jobs finish.
pub struct MatchContext {
    pub trigger_source: TriggerSource,
    pub company_id: Option<i64>,
    pub on_progress: Option<Box<dyn Fn(usize) + Send + Sync>>,
}

#[async_trait]
pub trait MatchEngine: Send + Sync {
    async fn get_matcher_config(&self) -> anyhow::Result<MatcherConfig>;

    /// Match the given jobs, reporting progress through the context callback.
    async fn match_with_tracking(
        &self,
        job_ids: &[i64],
        context: MatchContext,
    ) -> anyhow::Result<MatchRun>;
}
