use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a role expects people to work from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Remote,
    Hybrid,
    Onsite,
}

/// The markup of a job description after normalization.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionFormat {
    #[default]
    Plain,
    Markdown,
    Html,
}

/// Employment type as advertised by the source board.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Intern,
    Temporary,
}

impl FromStr for EmploymentType {
    type Err = ();

    /// Parses a loose employment-type token: lower-cased, with spaces and
    /// underscores treated as dashes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_lowercase().replace([' ', '_'], "-");
        match token.as_str() {
            "full-time" | "fulltime" => Ok(Self::FullTime),
            "part-time" | "parttime" => Ok(Self::PartTime),
            "contract" | "contractor" => Ok(Self::Contract),
            "intern" | "internship" => Ok(Self::Intern),
            "temporary" | "temp" => Ok(Self::Temporary),
            _ => Err(()),
        }
    }
}

impl fmt::Display for EmploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FullTime => "full-time",
            Self::PartTime => "part-time",
            Self::Contract => "contract",
            Self::Intern => "intern",
            Self::Temporary => "temporary",
        };
        f.write_str(s)
    }
}

/// Seniority band inferred from the title when the board has no explicit field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeniorityLevel {
    Entry,
    Mid,
    Senior,
    Lead,
    Manager,
}

/// A job posting as produced by a platform adapter, before dedup and filtering.
///
/// `external_id`, `title`, and `url` are always set; everything else is
/// best-effort per platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedJob {
    /// Stable identifier, unique within one company scrape
    /// (`{platform}-{ordered parts}` — see [`crate::normalize::generate_external_id`])
    pub external_id: String,
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_type: Option<LocationType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub description_format: DescriptionFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employment_type: Option<EmploymentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seniority_level: Option<SeniorityLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
}

impl ScrapedJob {
    /// A minimal record with only the required fields set.
    pub fn new(external_id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            url: url.into(),
            location: None,
            location_type: None,
            department: None,
            description: None,
            description_format: DescriptionFormat::Plain,
            employment_type: None,
            seniority_level: None,
            posted_date: None,
            salary: None,
        }
    }

    pub fn has_description(&self) -> bool {
        self.description.as_deref().is_some_and(|d| !d.trim().is_empty())
    }
}

/// Lifecycle status of a stored job row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    New,
    Viewed,
    Interested,
    Rejected,
    Archived,
    Applied,
}

impl JobStatus {
    /// Statuses eligible for automatic archival when a job disappears from the
    /// source board. User-acted statuses (applied) and already-archived rows
    /// are never touched.
    pub const ARCHIVABLE: &'static [JobStatus] = &[
        JobStatus::New,
        JobStatus::Viewed,
        JobStatus::Interested,
        JobStatus::Rejected,
    ];
}

/// The repository's view of an already-persisted job for one company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistingJob {
    pub id: i64,
    pub external_id: Option<String>,
    pub title: String,
    pub url: String,
    pub status: JobStatus,
    pub description: Option<String>,
}

impl ExistingJob {
    pub fn has_description(&self) -> bool {
        self.description.as_deref().is_some_and(|d| !d.trim().is_empty())
    }
}
