//! jobscout scrape core.
//!
//! Discovers open job postings from company career sites across eight board
//! platforms, normalizes them into uniform records, deduplicates against known
//! jobs, filters by operator-chosen criteria, and coordinates persistence,
//! archival, and the downstream AI-matcher hand-off. Persistence, browser
//! bootstrap, and the matcher are injected through trait objects; this crate
//! owns the adapters and the pipeline between them.

pub mod browser;
pub mod config;
pub mod countries;
pub mod dedup;
pub mod error;
pub mod filters;
pub mod http;
pub mod hydrate;
pub mod logging;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod platform;
pub mod repository;
pub mod scrapers;

pub use error::{Result, ScraperError, ScraperErrorCode};
pub use orchestrator::{BatchResult, ScrapeCompanyOptions, ScrapeOrchestrator};
pub use platform::Platform;
pub use scrapers::{JobScraper, ScrapeOptions, ScraperRegistry};
