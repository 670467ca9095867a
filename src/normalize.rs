//! Canonicalization of raw board data: locations, descriptions, dates,
//! employment types, and external ids.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use htmd::HtmlToMarkdown;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::models::{DescriptionFormat, EmploymentType, LocationType, SeniorityLevel};
use crate::platform::Platform;

/// A location string plus the work arrangement inferred from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLocation {
    pub location: Option<String>,
    pub location_type: Option<LocationType>,
}

/// Trim a raw location and infer the arrangement: "remote" anywhere in the
/// string wins, then "hybrid", then any non-empty location is onsite.
pub fn normalize_location(raw: &str) -> NormalizedLocation {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return NormalizedLocation {
            location: None,
            location_type: None,
        };
    }
    let lower = trimmed.to_lowercase();
    let location_type = if lower.contains("remote") {
        LocationType::Remote
    } else if lower.contains("hybrid") {
        LocationType::Hybrid
    } else {
        LocationType::Onsite
    };
    NormalizedLocation {
        location: Some(trimmed.to_string()),
        location_type: Some(location_type),
    }
}

/// Builds the stable external id for a job: the platform tag followed by the
/// non-null parts, joined by dashes. Order-sensitive; adapters must always
/// pass the same key components.
pub fn generate_external_id(platform: Platform, parts: &[Option<&str>]) -> String {
    let mut id = platform.to_string();
    for part in parts.iter().flatten() {
        id.push('-');
        id.push_str(part);
    }
    id
}

fn html_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"</?[a-zA-Z][^>]*>").unwrap())
}

fn markdown_converter() -> &'static HtmlToMarkdown {
    static CONVERTER: OnceLock<HtmlToMarkdown> = OnceLock::new();
    CONVERTER.get_or_init(|| {
        HtmlToMarkdown::builder()
            .skip_tags(vec!["script", "style"])
            .build()
    })
}

/// Whether a description body contains HTML markup.
pub fn looks_like_html(text: &str) -> bool {
    html_tag_pattern().is_match(text)
}

/// Normalize a description body: HTML is converted to Markdown, anything else
/// passes through as plain text. Idempotent on already-plain strings.
///
/// When the Markdown conversion fails the original body is kept and tagged as
/// HTML so downstream consumers know what they are holding.
pub fn normalize_description(raw: &str) -> (String, DescriptionFormat) {
    let trimmed = raw.trim();
    if !looks_like_html(trimmed) {
        return (trimmed.to_string(), DescriptionFormat::Plain);
    }
    match markdown_converter().convert(trimmed) {
        Ok(markdown) => (markdown.trim().to_string(), DescriptionFormat::Markdown),
        Err(_) => (trimmed.to_string(), DescriptionFormat::Html),
    }
}

/// Epoch values at or above this are interpreted as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

fn relative_days_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)(?:posted\s+)?(\d+)\s+days?\s+ago").unwrap())
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value <= 0 {
        return None;
    }
    if value >= EPOCH_MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

/// Coerce a posted-date value into a UTC timestamp.
///
/// Accepts epoch seconds, epoch milliseconds, ISO-8601 / RFC-2822 strings,
/// bare dates, and loose "posted N days ago" phrasing. Returns `None` on
/// anything unparseable.
pub fn normalize_posted_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                from_epoch(i)
            } else {
                n.as_f64().and_then(|f| from_epoch(f as i64))
            }
        }
        Value::String(s) => parse_posted_date_str(s),
        _ => None,
    }
}

/// String half of [`normalize_posted_date`].
pub fn parse_posted_date_str(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    // Numeric strings are epoch values
    if let Ok(epoch) = s.parse::<i64>() {
        return from_epoch(epoch);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }

    let lower = s.to_lowercase();
    if lower == "today" || lower == "just posted" {
        return Some(Utc::now());
    }
    if lower == "yesterday" {
        return Some(Utc::now() - Duration::days(1));
    }
    if let Some(caps) = relative_days_pattern().captures(&lower) {
        let days: i64 = caps.get(1)?.as_str().parse().ok()?;
        return Some(Utc::now() - Duration::days(days));
    }

    None
}

/// Parse a loose employment-type token against the fixed enum.
pub fn parse_employment_type(raw: &str) -> Option<EmploymentType> {
    raw.parse().ok()
}

/// Infer a seniority band from the job title. Checked most-senior first so
/// "Senior Engineering Manager" lands on manager, not senior.
pub fn parse_seniority(title: &str) -> Option<SeniorityLevel> {
    let lower = title.to_lowercase();
    const MANAGER: &[&str] = &["manager", "head of", "director", "vp ", "vp,", "vice president"];
    const LEAD: &[&str] = &["staff", "principal", "lead"];
    const SENIOR: &[&str] = &["senior", "sr.", "sr "];
    const ENTRY: &[&str] = &["intern", "junior", "entry", "graduate", "apprentice"];

    if MANAGER.iter().any(|k| lower.contains(k)) {
        return Some(SeniorityLevel::Manager);
    }
    if LEAD.iter().any(|k| lower.contains(k)) {
        return Some(SeniorityLevel::Lead);
    }
    if SENIOR.iter().any(|k| lower.contains(k)) {
        return Some(SeniorityLevel::Senior);
    }
    if ENTRY.iter().any(|k| lower.contains(k)) {
        return Some(SeniorityLevel::Entry);
    }
    None
}
