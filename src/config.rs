//! Configuration for the scrape core.
//!
//! Loaded from environment variables via figment. Duration knobs accept both
//! numeric values (interpreted as seconds) and duration strings with units
//! ("400ms", "30s", "2m").

use figment::{Figment, providers::Env};
use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Top-level configuration for the scrape core.
///
/// Every field has a default so the crate works with an empty environment;
/// operators override individual knobs with `SCRAPER_`-prefixed variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Log level for this crate's target ("trace".."error", default "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// HTTP transport defaults applied when an adapter does not override them
    #[serde(default)]
    pub http: HttpConfig,
    /// Adaptive detail-hydrator tuning
    #[serde(default)]
    pub hydrator: HydratorConfig,
    /// Fallback parallelism for batch runs when the persisted
    /// `scraper_max_parallel_scrapes` setting is missing or out of range
    #[serde(default = "default_max_parallel_scrapes")]
    pub default_max_parallel_scrapes: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            http: HttpConfig::default(),
            hydrator: HydratorConfig::default(),
            default_max_parallel_scrapes: default_max_parallel_scrapes(),
        }
    }
}

impl ScraperConfig {
    /// Extract the configuration from `SCRAPER_`-prefixed environment variables.
    pub fn from_env() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Env::prefixed("SCRAPER_").split("__"))
            .extract()
    }
}

/// Per-request HTTP defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Overall request timeout
    #[serde(
        default = "default_http_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub timeout: Duration,
    /// Retry attempts for transient failures (connect errors, 5xx)
    #[serde(default = "default_http_retries")]
    pub retries: u32,
    /// Base delay for exponential backoff between retries
    #[serde(
        default = "default_http_base_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub base_delay: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_http_timeout(),
            retries: default_http_retries(),
            base_delay: default_http_base_delay(),
        }
    }
}

/// Tuning for the adaptive detail hydrator.
///
/// The batch size floats between `min_batch` and `max_batch`, shrinking by one
/// on any in-batch failure and growing by one on a clean batch. The inter-batch
/// delay grows by `delay_increment` on failure and shrinks by `delay_decrement`
/// on success, clamped to `[min_delay, max_delay]`.
#[derive(Debug, Clone, Deserialize)]
pub struct HydratorConfig {
    #[serde(default = "default_initial_batch")]
    pub initial_batch: usize,
    #[serde(default = "default_min_batch")]
    pub min_batch: usize,
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
    #[serde(
        default = "default_initial_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub initial_delay: Duration,
    #[serde(
        default = "default_min_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub min_delay: Duration,
    #[serde(
        default = "default_max_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub max_delay: Duration,
    #[serde(
        default = "default_delay_increment",
        deserialize_with = "deserialize_duration"
    )]
    pub delay_increment: Duration,
    #[serde(
        default = "default_delay_decrement",
        deserialize_with = "deserialize_duration"
    )]
    pub delay_decrement: Duration,
}

impl Default for HydratorConfig {
    fn default() -> Self {
        Self {
            initial_batch: default_initial_batch(),
            min_batch: default_min_batch(),
            max_batch: default_max_batch(),
            initial_delay: default_initial_delay(),
            min_delay: default_min_delay(),
            max_delay: default_max_delay(),
            delay_increment: default_delay_increment(),
            delay_decrement: default_delay_decrement(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Default worker parallelism for batch runs (clamp target for the setting)
fn default_max_parallel_scrapes() -> usize {
    3
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_http_retries() -> u32 {
    3
}

fn default_http_base_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_initial_batch() -> usize {
    4
}

fn default_min_batch() -> usize {
    1
}

fn default_max_batch() -> usize {
    4
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(400)
}

fn default_min_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_delay_increment() -> Duration {
    Duration::from_millis(250)
}

fn default_delay_decrement() -> Duration {
    Duration::from_millis(100)
}

/// Either shape a duration knob arrives in: a bare number of seconds, or a
/// string fundu can parse (`"400ms"`, `"30s"`, `"2m"`; a bare-number string
/// also reads as seconds, which is what env-provided values look like).
#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    const PARSER: DurationParser<'static> = DurationParser::builder()
        .time_units(&[TimeUnit::MilliSecond, TimeUnit::Second, TimeUnit::Minute])
        .default_unit(TimeUnit::Second)
        .build();

    match RawDuration::deserialize(deserializer)? {
        RawDuration::Seconds(secs) => Ok(Duration::from_secs(secs)),
        RawDuration::Text(text) => PARSER
            .parse(text.trim())
            .map_err(|e| serde::de::Error::custom(format!("invalid duration '{text}': {e}")))?
            .try_into()
            .map_err(|e| serde::de::Error::custom(format!("duration out of range: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ScraperConfig::default();
        assert_eq!(config.default_max_parallel_scrapes, 3);
        assert_eq!(config.hydrator.initial_batch, 4);
        assert_eq!(config.hydrator.min_batch, 1);
        assert_eq!(config.hydrator.initial_delay, Duration::from_millis(400));
        assert_eq!(config.http.retries, 3);
    }

    #[test]
    fn duration_accepts_numbers_and_unit_strings() {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(deserialize_with = "deserialize_duration")]
            value: Duration,
        }

        let probe: Probe = serde_json::from_str(r#"{"value": "250ms"}"#).unwrap();
        assert_eq!(probe.value, Duration::from_millis(250));

        let probe: Probe = serde_json::from_str(r#"{"value": "2m"}"#).unwrap();
        assert_eq!(probe.value, Duration::from_secs(120));

        let probe: Probe = serde_json::from_str(r#"{"value": 5}"#).unwrap();
        assert_eq!(probe.value, Duration::from_secs(5));

        // Env values arrive as strings; bare numbers still mean seconds
        let probe: Probe = serde_json::from_str(r#"{"value": "45"}"#).unwrap();
        assert_eq!(probe.value, Duration::from_secs(45));

        let err = serde_json::from_str::<Probe>(r#"{"value": "soon"}"#);
        assert!(err.is_err());
    }
}
