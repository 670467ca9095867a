//! Platform detection: career-site URL → platform tag.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// A supported job-board platform. `Custom` means "no adapter": the
/// orchestrator skips such companies without marking them failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Greenhouse,
    Lever,
    Ashby,
    Eightfold,
    Workday,
    Uber,
    Google,
    Atlassian,
    Custom,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Greenhouse => "greenhouse",
            Self::Lever => "lever",
            Self::Ashby => "ashby",
            Self::Eightfold => "eightfold",
            Self::Workday => "workday",
            Self::Uber => "uber",
            Self::Google => "google",
            Self::Atlassian => "atlassian",
            Self::Custom => "custom",
        };
        f.write_str(s)
    }
}

impl FromStr for Platform {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "greenhouse" => Ok(Self::Greenhouse),
            "lever" => Ok(Self::Lever),
            "ashby" => Ok(Self::Ashby),
            "eightfold" => Ok(Self::Eightfold),
            "workday" => Ok(Self::Workday),
            "uber" => Ok(Self::Uber),
            "google" => Ok(Self::Google),
            "atlassian" => Ok(Self::Atlassian),
            "custom" => Ok(Self::Custom),
            _ => Err(()),
        }
    }
}

/// Static rule table for URL classification. Ordered most-specific first;
/// matching is a case-insensitive substring check.
const DETECTION_RULES: &[(Platform, &[&str])] = &[
    (
        Platform::Greenhouse,
        &["greenhouse.io", "boards.greenhouse"],
    ),
    (Platform::Lever, &["lever.co", "jobs.lever"]),
    (Platform::Ashby, &["ashbyhq.com", "jobs.ashby"]),
    (Platform::Eightfold, &["eightfold.ai"]),
    (Platform::Workday, &["myworkdayjobs.com", "myworkdaysite.com"]),
    (Platform::Uber, &["uber.com/careers", "uber.com/us/en/careers"]),
    (
        Platform::Google,
        &["google.com/about/careers", "careers.google.com"],
    ),
    (Platform::Atlassian, &["atlassian.com/company/careers"]),
];

fn workday_host_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\.wd\d*\.myworkdayjobs\.com").unwrap())
}

impl Platform {
    /// Classifies a URL into a platform using [`DETECTION_RULES`], falling
    /// back to [`Platform::Custom`] for anything unrecognized.
    pub fn detect(url: &str) -> Platform {
        let lower = url.to_lowercase();
        for (platform, patterns) in DETECTION_RULES {
            if patterns.iter().any(|p| lower.contains(p)) {
                return *platform;
            }
        }
        // Tenant-scoped Workday hosts like acme.wd5.myworkdayjobs.com
        if workday_host_pattern().is_match(&lower) {
            return Platform::Workday;
        }
        Platform::Custom
    }
}
