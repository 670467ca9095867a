//! Location and title filtering applied to scraped jobs.
//!
//! The same predicates run in two places: *early* inside adapters that can
//! cheaply drop listing records before spending detail fetches, and *late* in
//! the orchestrator on jobs that survived dedup.

use serde::{Deserialize, Serialize};

use crate::countries::location_matches_country;
use crate::models::{EarlyFilterStats, ScrapedJob};

/// Operator-chosen filter criteria. Defaults come from persisted settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub title_keywords: Vec<String>,
}

impl JobFilters {
    /// Whether any criterion is set. Adapters use this to decide if early
    /// filtering is worth running on raw listing records.
    pub fn has_early_filters(&self) -> bool {
        self.country.as_deref().is_some_and(|c| !c.trim().is_empty())
            || self.city.as_deref().is_some_and(|c| !c.trim().is_empty())
            || self.title_keywords.iter().any(|k| !k.trim().is_empty())
    }

    /// Overlay `self` on top of `base`: any criterion set here wins.
    pub fn merged_over(self, base: JobFilters) -> JobFilters {
        JobFilters {
            country: self.country.or(base.country),
            city: self.city.or(base.city),
            title_keywords: if self.title_keywords.is_empty() {
                base.title_keywords
            } else {
                self.title_keywords
            },
        }
    }
}

/// True when the location names the preferred country (variant table,
/// word-boundary) or is a remote sentinel. An absent location passes: there is
/// nothing to judge it by.
pub fn matches_preferred_country(location: Option<&str>, country: &str) -> bool {
    if country.trim().is_empty() {
        return true;
    }
    match location {
        Some(loc) if !loc.trim().is_empty() => location_matches_country(loc, country),
        _ => true,
    }
}

/// Case-insensitive substring match on the preferred city. Empty city passes.
pub fn matches_preferred_city(location: Option<&str>, city: &str) -> bool {
    let city = city.trim();
    if city.is_empty() {
        return true;
    }
    match location {
        Some(loc) if !loc.trim().is_empty() => {
            loc.to_lowercase().contains(&city.to_lowercase())
        }
        _ => true,
    }
}

/// Any keyword appearing case-insensitively in the title passes. No keywords
/// pass everything.
pub fn matches_title_keywords(title: &str, keywords: &[String]) -> bool {
    let keywords: Vec<&str> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.is_empty() {
        return true;
    }
    let title_lower = title.to_lowercase();
    keywords
        .iter()
        .any(|k| title_lower.contains(&k.to_lowercase()))
}

/// Per-axis pass/fail accounting from one `apply_filters` run. Rejection
/// short-circuits: a job failing the country check is only counted there.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterBreakdown {
    pub passed_country: usize,
    pub failed_country: usize,
    pub passed_city: usize,
    pub failed_city: usize,
    pub passed_title: usize,
    pub failed_title: usize,
    pub final_count: usize,
}

impl FilterBreakdown {
    pub fn dropped(&self) -> usize {
        self.failed_country + self.failed_city + self.failed_title
    }
}

/// Run all predicates over a batch, keeping survivors and counting each
/// rejection under the first axis that failed.
pub fn apply_filters(jobs: Vec<ScrapedJob>, filters: &JobFilters) -> (Vec<ScrapedJob>, FilterBreakdown) {
    let mut breakdown = FilterBreakdown::default();
    let mut kept = Vec::with_capacity(jobs.len());

    for job in jobs {
        let location = job.location.as_deref();

        if let Some(country) = filters.country.as_deref() {
            if !matches_preferred_country(location, country) {
                breakdown.failed_country += 1;
                continue;
            }
        }
        breakdown.passed_country += 1;

        if let Some(city) = filters.city.as_deref() {
            if !matches_preferred_city(location, city) {
                breakdown.failed_city += 1;
                continue;
            }
        }
        breakdown.passed_city += 1;

        if !matches_title_keywords(&job.title, &filters.title_keywords) {
            breakdown.failed_title += 1;
            continue;
        }
        breakdown.passed_title += 1;

        kept.push(job);
    }

    breakdown.final_count = kept.len();
    (kept, breakdown)
}

/// Streaming filter for adapters that drop raw listing records before the
/// detail fetch. Tracks the per-axis drop counts reported on the result.
#[derive(Debug, Clone)]
pub struct EarlyFilter {
    filters: JobFilters,
    stats: EarlyFilterStats,
}

impl EarlyFilter {
    /// `None` when no criterion is set, so adapters skip the pass entirely.
    pub fn new(filters: Option<&JobFilters>) -> Option<Self> {
        let filters = filters?;
        if !filters.has_early_filters() {
            return None;
        }
        Some(Self {
            filters: filters.clone(),
            stats: EarlyFilterStats::default(),
        })
    }

    /// Judge one listing record; rejections are counted under the first axis
    /// that failed, mirroring `apply_filters`.
    pub fn keep(&mut self, title: &str, location: Option<&str>) -> bool {
        if let Some(country) = self.filters.country.as_deref() {
            if !matches_preferred_country(location, country) {
                self.stats.total += 1;
                self.stats.country += 1;
                return false;
            }
        }
        if let Some(city) = self.filters.city.as_deref() {
            if !matches_preferred_city(location, city) {
                self.stats.total += 1;
                self.stats.city += 1;
                return false;
            }
        }
        if !matches_title_keywords(title, &self.filters.title_keywords) {
            self.stats.total += 1;
            self.stats.title += 1;
            return false;
        }
        true
    }

    pub fn stats(&self) -> EarlyFilterStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(title: &str, location: Option<&str>) -> ScrapedJob {
        let mut j = ScrapedJob::new(
            format!("test-{}", title.to_lowercase().replace(' ', "-")),
            title,
            format!("https://example.com/{title}"),
        );
        j.location = location.map(str::to_string);
        j
    }

    #[test]
    fn remote_location_matches_every_country() {
        assert!(matches_preferred_country(Some("Remote"), "india"));
        assert!(matches_preferred_country(Some("Worldwide"), "germany"));
    }

    #[test]
    fn empty_criteria_pass() {
        assert!(matches_preferred_city(Some("Berlin"), ""));
        assert!(matches_title_keywords("Software Engineer", &[]));
        assert!(matches_preferred_country(Some("Berlin"), "  "));
    }

    #[test]
    fn missing_location_passes_location_predicates() {
        assert!(matches_preferred_country(None, "india"));
        assert!(matches_preferred_city(None, "berlin"));
    }

    #[test]
    fn title_keywords_any_match() {
        let keywords = vec!["rust".to_string(), "backend".to_string()];
        assert!(matches_title_keywords("Senior Rust Engineer", &keywords));
        assert!(matches_title_keywords("Backend Developer", &keywords));
        assert!(!matches_title_keywords("Account Executive", &keywords));
    }

    #[test]
    fn apply_filters_short_circuits_per_axis() {
        let filters = JobFilters {
            country: Some("india".to_string()),
            city: Some("bangalore".to_string()),
            title_keywords: vec!["engineer".to_string()],
        };
        let jobs = vec![
            job("Engineer", Some("Bangalore, India")), // keeps
            job("Engineer", Some("Berlin, DE")),       // fails country
            job("Engineer", Some("Mumbai, India")),    // fails city
            job("Designer", Some("Bangalore, India")), // fails title
        ];
        let (kept, breakdown) = apply_filters(jobs, &filters);
        assert_eq!(kept.len(), 1);
        assert_eq!(breakdown.failed_country, 1);
        assert_eq!(breakdown.failed_city, 1);
        assert_eq!(breakdown.failed_title, 1);
        assert_eq!(breakdown.passed_country, 3);
        assert_eq!(breakdown.passed_city, 2);
        assert_eq!(breakdown.passed_title, 1);
        assert_eq!(breakdown.final_count, 1);
        assert_eq!(breakdown.dropped(), 3);
    }

    #[test]
    fn has_early_filters_detects_any_criterion() {
        assert!(!JobFilters::default().has_early_filters());
        assert!(JobFilters {
            country: Some("india".into()),
            ..Default::default()
        }
        .has_early_filters());
        assert!(JobFilters {
            title_keywords: vec!["rust".into()],
            ..Default::default()
        }
        .has_early_filters());
        // Whitespace-only keywords do not count
        assert!(!JobFilters {
            title_keywords: vec!["  ".into()],
            ..Default::default()
        }
        .has_early_filters());
    }

    #[test]
    fn early_filter_counts_axis_drops() {
        let filters = JobFilters {
            country: Some("india".to_string()),
            city: None,
            title_keywords: vec!["engineer".to_string()],
        };
        let mut early = EarlyFilter::new(Some(&filters)).unwrap();
        assert!(early.keep("Engineer", Some("Remote")));
        assert!(!early.keep("Engineer", Some("Berlin, DE")));
        assert!(!early.keep("Designer", Some("Bangalore, India")));
        let stats = early.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.country, 1);
        assert_eq!(stats.title, 1);
        // No criteria set: the pass is skipped entirely
        assert!(EarlyFilter::new(Some(&JobFilters::default())).is_none());
        assert!(EarlyFilter::new(None).is_none());
    }

    #[test]
    fn merged_over_prefers_explicit_values() {
        let base = JobFilters {
            country: Some("germany".into()),
            city: Some("berlin".into()),
            title_keywords: vec!["sre".into()],
        };
        let overlay = JobFilters {
            country: Some("india".into()),
            ..Default::default()
        };
        let merged = overlay.merged_over(base);
        assert_eq!(merged.country.as_deref(), Some("india"));
        assert_eq!(merged.city.as_deref(), Some("berlin"));
        assert_eq!(merged.title_keywords, vec!["sre".to_string()]);
    }
}
