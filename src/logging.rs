//! Logging setup and the per-company scrape log verbs.

use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::ScraperConfig;
use crate::filters::FilterBreakdown;
use crate::models::{EarlyFilterStats, SessionCounters};
use crate::platform::Platform;

/// Configure and initialize logging for the embedding application.
///
/// `RUST_LOG` wins when set; otherwise the config's log level applies to this
/// crate's target only, with everything else at warn.
pub fn setup_logging(config: &ScraperConfig, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,jobscout={}", config.log_level)));

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = if json {
        Box::new(
            FmtSubscriber::builder()
                .with_target(true)
                .json()
                .with_env_filter(filter)
                .finish(),
        )
    } else {
        Box::new(
            FmtSubscriber::builder()
                .with_target(true)
                .with_env_filter(filter)
                .finish(),
        )
    };

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

/// Structured per-company scrape events, keyed by company name and platform.
///
/// Stateless; exists so every call site emits the same field shapes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScraperLogger;

impl ScraperLogger {
    pub fn start(&self, company: &str, platform: Platform) {
        info!(company, platform = %platform, "Scrape started");
    }

    pub fn fetched(&self, company: &str, platform: Platform, count: usize) {
        info!(company, platform = %platform, count, "Fetched jobs");
    }

    pub fn fetched_with_early_filter(
        &self,
        company: &str,
        platform: Platform,
        count: usize,
        stats: &EarlyFilterStats,
    ) {
        info!(
            company,
            platform = %platform,
            count,
            early_filtered = stats.total,
            by_country = stats.country,
            by_city = stats.city,
            by_title = stats.title,
            "Fetched jobs (early filter applied)"
        );
    }

    pub fn filtered(&self, company: &str, breakdown: &FilterBreakdown) {
        info!(
            company,
            dropped = breakdown.dropped(),
            failed_country = breakdown.failed_country,
            failed_city = breakdown.failed_city,
            failed_title = breakdown.failed_title,
            kept = breakdown.final_count,
            "Applied filters"
        );
    }

    pub fn added(&self, company: &str, added: usize, updated: usize, archived: u64) {
        info!(company, added, updated, archived, "Company scrape complete");
    }

    pub fn error(&self, company: &str, message: &str) {
        error!(company, error = message, "Company scrape failed");
    }

    pub fn batch_start(&self, companies: usize, workers: usize) {
        info!(companies, workers, "Batch scrape started");
    }

    pub fn batch_complete(&self, counters: &SessionCounters) {
        info!(
            companies_completed = counters.companies_completed,
            jobs_found = counters.total_jobs_found,
            jobs_added = counters.total_jobs_added,
            jobs_filtered = counters.total_jobs_filtered,
            jobs_archived = counters.total_jobs_archived,
            "Batch scrape complete"
        );
    }
}
