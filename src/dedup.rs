//! Deduplication of scraped jobs against a company's known jobs.
//!
//! Matching runs in three stages per scraped job: exact external id, exact
//! url, then fuzzy title similarity (Dice coefficient over character bigrams)
//! above a threshold. Jobs judged new join a synthetic comparison set so two
//! identical records inside the same batch also deduplicate against each
//! other.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

use crate::models::{ExistingJob, ScrapedJob};

pub const DEFAULT_TITLE_SIMILARITY_THRESHOLD: f64 = 0.9;

/// Which stage matched a duplicate. Only `ExternalId` and `Url` matches are
/// trusted enough for description re-hydration of the existing row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MatchReason {
    ExternalId,
    Url,
    TitleSimilarity,
}

/// A scraped job that matched a known one.
#[derive(Debug, Clone)]
pub struct DuplicateMatch {
    pub job: ScrapedJob,
    /// The matched row's id; `None` when the match was against another job in
    /// the same scraped batch rather than a persisted row
    pub existing_job_id: Option<i64>,
    pub similarity: f64,
    pub match_reason: MatchReason,
}

/// Result of one `batch_deduplicate` call.
/// Invariant: `new_jobs.len() + duplicates.len()` equals the input batch size.
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    pub new_jobs: Vec<ScrapedJob>,
    pub duplicates: Vec<DuplicateMatch>,
}

/// Identity of a comparison entry: a persisted row or a synthetic in-batch
/// record. The public [`DuplicateMatch`] only ever exposes real row ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComparisonId {
    Known(i64),
    Synthetic(usize),
}

struct ComparisonEntry {
    id: ComparisonId,
    external_id: Option<String>,
    url: String,
    title_key: String,
}

#[derive(Debug, Clone)]
pub struct Deduplicator {
    title_similarity_threshold: f64,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE_SIMILARITY_THRESHOLD)
    }
}

impl Deduplicator {
    pub fn new(title_similarity_threshold: f64) -> Self {
        Self {
            title_similarity_threshold,
        }
    }

    /// Split a scraped batch into new jobs and duplicates, in iteration order.
    pub fn batch_deduplicate(
        &self,
        scraped: Vec<ScrapedJob>,
        existing: &[ExistingJob],
    ) -> DedupOutcome {
        let mut entries: Vec<ComparisonEntry> = existing
            .iter()
            .map(|row| ComparisonEntry {
                id: ComparisonId::Known(row.id),
                external_id: row.external_id.clone(),
                url: row.url.clone(),
                title_key: title_key(&row.title),
            })
            .collect();

        let mut outcome = DedupOutcome::default();

        for (index, job) in scraped.into_iter().enumerate() {
            match self.find_match(&job, &entries) {
                Some((id, similarity, match_reason)) => {
                    outcome.duplicates.push(DuplicateMatch {
                        job,
                        existing_job_id: match id {
                            ComparisonId::Known(row_id) => Some(row_id),
                            ComparisonId::Synthetic(_) => None,
                        },
                        similarity,
                        match_reason,
                    });
                }
                None => {
                    entries.push(ComparisonEntry {
                        id: ComparisonId::Synthetic(index),
                        external_id: Some(job.external_id.clone()),
                        url: job.url.clone(),
                        title_key: title_key(&job.title),
                    });
                    outcome.new_jobs.push(job);
                }
            }
        }

        outcome
    }

    fn find_match(
        &self,
        job: &ScrapedJob,
        entries: &[ComparisonEntry],
    ) -> Option<(ComparisonId, f64, MatchReason)> {
        // Stage 1: external id
        if let Some(entry) = entries
            .iter()
            .find(|e| e.external_id.as_deref() == Some(job.external_id.as_str()))
        {
            return Some((entry.id, 1.0, MatchReason::ExternalId));
        }

        // Stage 2: url
        if let Some(entry) = entries.iter().find(|e| e.url == job.url) {
            return Some((entry.id, 1.0, MatchReason::Url));
        }

        // Stage 3: best title similarity above the threshold
        let key = title_key(&job.title);
        let best = entries
            .iter()
            .map(|e| (e.id, dice_coefficient(&key, &e.title_key)))
            .max_by(|a, b| a.1.total_cmp(&b.1))?;
        if best.1 > self.title_similarity_threshold {
            return Some((best.0, best.1, MatchReason::TitleSimilarity));
        }

        None
    }
}

/// Comparison key for titles: NFKC-normalized, lowercased.
fn title_key(title: &str) -> String {
    title.nfkc().collect::<String>().to_lowercase()
}

/// Dice coefficient over character bigrams, whitespace stripped.
///
/// Identical strings score 1; strings shorter than one bigram score 0 unless
/// identical.
pub fn dice_coefficient(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().filter(|c| !c.is_whitespace()).collect();
    let b: Vec<char> = b.chars().filter(|c| !c.is_whitespace()).collect();

    if a == b {
        return 1.0;
    }
    if a.len() < 2 || b.len() < 2 {
        return 0.0;
    }

    let mut bigrams: HashMap<(char, char), usize> = HashMap::new();
    for pair in a.windows(2) {
        *bigrams.entry((pair[0], pair[1])).or_insert(0) += 1;
    }

    let mut intersection = 0usize;
    for pair in b.windows(2) {
        if let Some(count) = bigrams.get_mut(&(pair[0], pair[1])) {
            if *count > 0 {
                *count -= 1;
                intersection += 1;
            }
        }
    }

    (2.0 * intersection as f64) / ((a.len() - 1) + (b.len() - 1)) as f64
}
