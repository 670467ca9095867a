//! Google careers adapter.
//!
//! Google has no public JSON listing API; the adapter scrapes the careers
//! search results HTML, paginated by the `page` query parameter. Listing cards
//! are identified by anchors whose href matches the job-results path; detail
//! pages prefer the embedded JSON-LD `JobPosting` block and fall back to
//! assembling the description from the page's section headings. Selectors are
//! best-effort by design: a page that yields no parseable cards ends
//! pagination.

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;
use url::Url;

use crate::config::HydratorConfig;
use crate::filters::EarlyFilter;
use crate::http::{HttpClient, RequestOptions};
use crate::hydrate::hydrate;
use crate::models::{DescriptionFormat, ScrapedJob, ScraperResult};
use crate::normalize::{
    generate_external_id, normalize_description, normalize_location, parse_posted_date_str,
    parse_seniority,
};
use crate::platform::Platform;
use crate::scrapers::{JobScraper, ScrapeOptions};

const MAX_PAGES: usize = 30;
const PAGE_DELAY: Duration = Duration::from_millis(400);
const CAREERS_PATH: &str = "/about/careers/applications/";

/// The description is assembled from these section headings when no JSON-LD
/// block is present.
const DETAIL_SECTIONS: &[&str] = &[
    "About the job",
    "Minimum qualifications",
    "Preferred qualifications",
    "Responsibilities",
];

fn job_href_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"jobs/results/(\d+)-([^/?#]+)").unwrap())
}

/// One listing card scraped out of a results page.
#[derive(Debug, Clone)]
struct JobCard {
    id: String,
    url: String,
    title: Option<String>,
    location: Option<String>,
}

/// Extract listing cards from a results page. Owned data only: the parsed DOM
/// never crosses an await point.
fn parse_listing_cards(html: &str, origin: &str) -> Vec<JobCard> {
    let document = Html::parse_document(html);
    let anchor_selector = Selector::parse("a[href]").unwrap();
    let h3_selector = Selector::parse("h3").unwrap();

    let mut cards: Vec<JobCard> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for anchor in document.select(&anchor_selector) {
        let href = anchor.value().attr("href").unwrap_or_default();
        let Some(caps) = job_href_pattern().captures(href) else {
            continue;
        };
        let id = caps[1].to_string();
        if !seen.insert(id.clone()) {
            continue;
        }

        let url = absolutize_href(href, origin);
        let container = find_card_container(anchor, &h3_selector);
        let title = container
            .as_ref()
            .and_then(|c| c.select(&h3_selector).next())
            .map(|h3| collect_text(&h3))
            .filter(|t| !t.is_empty())
            .or_else(|| {
                anchor
                    .value()
                    .attr("aria-label")
                    .map(|label| label.trim_start_matches("Learn more about").trim().to_string())
            });
        let location = container.as_ref().and_then(extract_card_location);

        cards.push(JobCard {
            id,
            url,
            title,
            location,
        });
    }

    cards
}

/// Walk up from the anchor to the nearest ancestor that contains an `h3`; that
/// element is treated as the job card.
fn find_card_container<'a>(
    anchor: ElementRef<'a>,
    h3_selector: &Selector,
) -> Option<ElementRef<'a>> {
    for node in anchor.ancestors().take(6) {
        if let Some(element) = ElementRef::wrap(node) {
            if element.select(h3_selector).next().is_some() {
                return Some(element);
            }
        }
    }
    None
}

/// The location sits in an element whose class mentions "location"; fall back
/// to the text following a "place" icon marker.
fn extract_card_location(container: &ElementRef<'_>) -> Option<String> {
    let location_selector = Selector::parse("[class*=location], [class*=Location]").unwrap();
    if let Some(element) = container.select(&location_selector).next() {
        let text = collect_text(&element);
        if !text.is_empty() {
            return Some(text);
        }
    }

    let icon_selector = Selector::parse("i").unwrap();
    for icon in container.select(&icon_selector) {
        if collect_text(&icon) == "place" {
            if let Some(parent) = icon.parent().and_then(ElementRef::wrap) {
                let text = collect_text(&parent).replace("place", "");
                let trimmed = text.trim().trim_start_matches(';').trim().to_string();
                if !trimmed.is_empty() {
                    return Some(trimmed);
                }
            }
        }
    }
    None
}

fn collect_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Relative hrefs on the results page are relative to the careers application
/// root, not the page URL.
fn absolutize_href(href: &str, origin: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if let Some(stripped) = href.strip_prefix('/') {
        format!("{origin}/{stripped}")
    } else {
        format!("{origin}{CAREERS_PATH}{href}")
    }
}

/// Detail extracted from a job page.
#[derive(Debug, Clone, Default)]
struct JobDetail {
    description: Option<String>,
    description_format: DescriptionFormat,
    location: Option<String>,
    posted_date: Option<String>,
}

fn parse_detail_page(html: &str) -> Option<JobDetail> {
    let document = Html::parse_document(html);

    // JSON-LD JobPosting block is the authoritative source when present
    let script_selector = Selector::parse(r#"script[type="application/ld+json"]"#).unwrap();
    for script in document.select(&script_selector) {
        let raw = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };
        if value.get("@type").and_then(Value::as_str) != Some("JobPosting") {
            continue;
        }
        let description = value
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        let location = value
            .get("jobLocation")
            .and_then(|l| {
                l.get("address")
                    .or(Some(l))
                    .and_then(|a| a.get("addressLocality"))
            })
            .and_then(Value::as_str)
            .map(str::to_string);
        let posted_date = value
            .get("datePosted")
            .and_then(Value::as_str)
            .map(str::to_string);
        if description.is_some() {
            let (text, format) = normalize_description(description.as_deref().unwrap_or_default());
            return Some(JobDetail {
                description: Some(text),
                description_format: format,
                location,
                posted_date,
            });
        }
    }

    // Fall back to assembling known sections from the page headings
    let heading_selector = Selector::parse("h2, h3").unwrap();
    let mut sections: Vec<String> = Vec::new();
    for heading in document.select(&heading_selector) {
        let heading_text = collect_text(&heading);
        if !DETAIL_SECTIONS
            .iter()
            .any(|s| heading_text.eq_ignore_ascii_case(s))
        {
            continue;
        }
        let mut body = String::new();
        for sibling in heading.next_siblings() {
            if let Some(element) = ElementRef::wrap(sibling) {
                let name = element.value().name();
                if name == "h2" || name == "h3" {
                    break;
                }
                let text = collect_text(&element);
                if !text.is_empty() {
                    if !body.is_empty() {
                        body.push('\n');
                    }
                    body.push_str(&text);
                }
            }
        }
        if !body.is_empty() {
            sections.push(format!("## {heading_text}\n\n{body}"));
        }
    }

    if sections.is_empty() {
        return None;
    }
    Some(JobDetail {
        description: Some(sections.join("\n\n")),
        description_format: DescriptionFormat::Markdown,
        location: None,
        posted_date: None,
    })
}

pub struct GoogleScraper {
    http: Arc<dyn HttpClient>,
    hydrator: HydratorConfig,
}

impl GoogleScraper {
    pub fn new(http: Arc<dyn HttpClient>, hydrator: HydratorConfig) -> Self {
        Self { http, hydrator }
    }

    fn page_url(&self, base: &Url, page: usize) -> String {
        let mut url = base.clone();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "page")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        {
            let mut editor = url.query_pairs_mut();
            editor.clear();
            for (k, v) in &pairs {
                editor.append_pair(k, v);
            }
            editor.append_pair("page", &page.to_string());
        }
        url.to_string()
    }

    async fn fetch_page_cards(
        &self,
        base: &Url,
        origin: &str,
        page: usize,
    ) -> crate::error::Result<Vec<JobCard>> {
        let url = self.page_url(base, page);
        let response = self.http.get(&url, &RequestOptions::new()).await?;
        if !response.ok() {
            return Err(crate::error::ScraperError::Network(format!(
                "google careers page {page} returned status {}",
                response.status
            )));
        }
        Ok(parse_listing_cards(response.text(), origin))
    }
}

#[async_trait]
impl JobScraper for GoogleScraper {
    fn platform(&self) -> Platform {
        Platform::Google
    }

    fn validate(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        lower.contains("google.com/about/careers") || lower.contains("careers.google.com")
    }

    fn extract_identifier(&self, _url: &str) -> Option<String> {
        // One global board; there is no per-company token
        None
    }

    async fn scrape(&self, url: &str, options: &ScrapeOptions) -> ScraperResult {
        let base = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => return ScraperResult::error(format!("invalid google careers url '{url}'")),
        };
        let origin = base.origin().ascii_serialization();

        let mut cards: Vec<JobCard> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut complete = true;
        for page in 1..=MAX_PAGES {
            match self.fetch_page_cards(&base, &origin, page).await {
                Ok(page_cards) => {
                    if page_cards.is_empty() {
                        break;
                    }
                    let mut fresh = 0usize;
                    for card in page_cards {
                        if seen.insert(card.id.clone()) {
                            cards.push(card);
                            fresh += 1;
                        }
                    }
                    // A page of only repeats means pagination wrapped around
                    if fresh == 0 {
                        break;
                    }
                }
                Err(e) => {
                    if page == 1 {
                        return ScraperResult::error(e.to_string());
                    }
                    debug!(page, error = %e, "Google careers page failed, stopping pagination");
                    complete = false;
                    break;
                }
            }
            sleep(PAGE_DELAY).await;
        }

        if cards.is_empty() {
            return ScraperResult::error("no job cards parsed from google careers".to_string());
        }

        let open_external_ids: Vec<String> = cards
            .iter()
            .map(|card| generate_external_id(Platform::Google, &[Some(card.id.as_str())]))
            .collect();

        let mut early = EarlyFilter::new(options.filters.as_ref());
        let cards: Vec<JobCard> = cards
            .into_iter()
            .filter(|card| match &mut early {
                Some(filter) => filter.keep(
                    card.title.as_deref().unwrap_or_default(),
                    card.location.as_deref(),
                ),
                None => true,
            })
            .collect();

        // Listing-level records; details fill descriptions below
        let mut jobs: Vec<ScrapedJob> = cards
            .iter()
            .map(|card| {
                let external_id =
                    generate_external_id(Platform::Google, &[Some(card.id.as_str())]);
                let title = card.title.as_deref().unwrap_or("Untitled role");
                let mut job = ScrapedJob::new(external_id, title, card.url.clone());
                if let Some(raw) = card.location.as_deref() {
                    let normalized = normalize_location(raw);
                    job.location = normalized.location;
                    job.location_type = normalized.location_type;
                }
                job.seniority_level = parse_seniority(&job.title);
                job
            })
            .collect();

        let to_hydrate: Vec<(usize, String)> = jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| !options.existing_external_ids.contains(&job.external_id))
            .map(|(index, job)| (index, job.url.clone()))
            .collect();

        let hydrated = hydrate(to_hydrate, &self.hydrator, |(index, job_url)| async move {
            let response = self.http.get(&job_url, &RequestOptions::new()).await.ok()?;
            if !response.ok() {
                return None;
            }
            let detail = parse_detail_page(response.text())?;
            Some((index, detail))
        })
        .await;

        let detail_failures = hydrated.failures;
        for (index, detail) in hydrated.results {
            if let Some(job) = jobs.get_mut(index) {
                job.description = detail.description;
                job.description_format = detail.description_format;
                if job.location.is_none() {
                    if let Some(raw) = detail.location.as_deref() {
                        let normalized = normalize_location(raw);
                        job.location = normalized.location;
                        job.location_type = normalized.location_type;
                    }
                }
                job.posted_date = detail
                    .posted_date
                    .as_deref()
                    .and_then(parse_posted_date_str);
            }
        }

        let mut result = if detail_failures > 0 || !complete {
            let message = if detail_failures > 0 {
                format!("{detail_failures} detail fetches failed")
            } else {
                "list pagination incomplete".to_string()
            };
            ScraperResult::partial(jobs, Some(message))
        } else {
            ScraperResult::success(jobs)
        };
        result.open_external_ids = open_external_ids;
        result.open_external_ids_complete = complete;
        if let Some(filter) = early {
            result = result.with_early_filtered(filter.stats());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING_HTML: &str = r#"
        <html><body><ul>
          <li><div class="card">
            <h3>Software Engineer, Search</h3>
            <span class="location">Bangalore, India</span>
            <a href="jobs/results/123456-software-engineer-search?src=list">Learn more</a>
          </div></li>
          <li><div class="card">
            <h3>Site Reliability Engineer</h3>
            <span class="location">Sydney, Australia</span>
            <a href="/about/careers/applications/jobs/results/789012-site-reliability-engineer">Learn more</a>
          </div></li>
        </ul></body></html>
    "#;

    #[test]
    fn listing_cards_parse_id_title_location() {
        let cards = parse_listing_cards(LISTING_HTML, "https://www.google.com");
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].id, "123456");
        assert_eq!(cards[0].title.as_deref(), Some("Software Engineer, Search"));
        assert_eq!(cards[0].location.as_deref(), Some("Bangalore, India"));
        assert_eq!(
            cards[0].url,
            "https://www.google.com/about/careers/applications/jobs/results/123456-software-engineer-search?src=list"
        );
        assert_eq!(
            cards[1].url,
            "https://www.google.com/about/careers/applications/jobs/results/789012-site-reliability-engineer"
        );
    }

    #[test]
    fn detail_prefers_json_ld() {
        let html = r#"
            <html><head>
            <script type="application/ld+json">
              {"@type": "JobPosting", "description": "<p>Build search systems</p>",
               "datePosted": "2024-01-01", "jobLocation": {"address": {"addressLocality": "Bangalore"}}}
            </script>
            </head><body><h2>About the job</h2><p>ignored</p></body></html>
        "#;
        let detail = parse_detail_page(html).unwrap();
        assert!(detail.description.unwrap().contains("Build search systems"));
        assert_eq!(detail.location.as_deref(), Some("Bangalore"));
        assert_eq!(detail.posted_date.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn detail_assembles_sections_without_json_ld() {
        let html = r#"
            <html><body>
              <h2>About the job</h2><p>We build things.</p>
              <h3>Minimum qualifications</h3><ul><li>BS degree</li></ul>
              <h2>Unrelated heading</h2><p>skip me</p>
            </body></html>
        "#;
        let detail = parse_detail_page(html).unwrap();
        let description = detail.description.unwrap();
        assert!(description.contains("## About the job"));
        assert!(description.contains("We build things."));
        assert!(description.contains("## Minimum qualifications"));
        assert!(!description.contains("skip me"));
        assert_eq!(detail.description_format, DescriptionFormat::Markdown);
    }

    #[test]
    fn unparseable_page_yields_no_cards() {
        let cards = parse_listing_cards("<html><body><p>nothing here</p></body></html>", "https://www.google.com");
        assert!(cards.is_empty());
    }
}
