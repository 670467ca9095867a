//! Single-company orchestrator pipeline tests.

mod helpers;

use std::sync::Arc;

use jobscout::config::ScraperConfig;
use jobscout::matcher::MatchRun;
use jobscout::models::{JobStatus, LogStatus, MatcherStatus, ScrapeOutcome};
use jobscout::orchestrator::{ScrapeCompanyOptions, ScrapeOrchestrator};
use jobscout::platform::Platform;
use jobscout::repository::settings;
use jobscout::scrapers::ScraperRegistry;

use helpers::{MockBrowser, MockHttpClient, MockMatcher, MockRepository, make_company, make_existing_job};

const GREENHOUSE_BODY: &str = r#"{
    "jobs": [
        {"id": 1, "title": "SE", "absolute_url": "u1",
         "location": {"name": "Remote - India"},
         "updated_at": "2024-01-01T00:00:00Z"},
        {"id": 2, "title": "SRE", "absolute_url": "u2",
         "location": {"name": "Berlin, DE"},
         "updated_at": "2024-01-02T00:00:00Z"}
    ]
}"#;

fn orchestrator_with(
    repository: Arc<MockRepository>,
    http: Arc<MockHttpClient>,
    matcher: Arc<MockMatcher>,
) -> ScrapeOrchestrator {
    let config = ScraperConfig::default();
    let registry = Arc::new(ScraperRegistry::with_default_scrapers(
        http,
        Arc::new(MockBrowser::none()),
        &config,
    ));
    ScrapeOrchestrator::new(repository, registry, matcher, config)
}

#[tokio::test]
async fn greenhouse_ingest_with_late_country_filter() {
    let repository = Arc::new(
        MockRepository::new()
            .with_company(make_company(
                1,
                "Acme",
                "https://boards.greenhouse.io/acme",
                Platform::Greenhouse,
            ))
            .with_setting(settings::FILTER_COUNTRY, "india"),
    );
    let http = Arc::new(
        MockHttpClient::new().route("boards-api.greenhouse.io/v1/boards/acme/", 200, GREENHOUSE_BODY),
    );
    let orchestrator = orchestrator_with(repository.clone(), http, Arc::new(MockMatcher::disabled()));

    let result = orchestrator
        .scrape_company(1, ScrapeCompanyOptions::default())
        .await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.outcome, ScrapeOutcome::Success);
    assert_eq!(result.jobs_found, 2);
    assert_eq!(result.jobs_added, 1, "Berlin is dropped by the late filter");
    assert_eq!(result.jobs_filtered, 1);
    assert_eq!(result.jobs_updated, 0);

    // The remote job survived and was inserted
    let inserted = repository.inserted.lock().unwrap();
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0].1.len(), 1);
    assert_eq!(inserted[0].1[0].external_id, "greenhouse-acme-1");

    // Detected board token persisted because the company had none
    let patches = repository.company_patches.lock().unwrap();
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].1.board_token.as_deref(), Some("acme"));

    // Log row carries the counters
    let logs = repository.log_rows();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].1.status, LogStatus::Success);
    assert_eq!(logs[0].1.jobs_found, 2);
    assert_eq!(logs[0].1.jobs_added, 1);
    assert_eq!(logs[0].1.jobs_filtered, 1);
}

#[tokio::test]
async fn duplicate_with_description_hydrates_existing_row() {
    let body = r#"{
        "jobs": [
            {"id": 1, "title": "SE", "absolute_url": "u1", "content": "Role details"}
        ]
    }"#;
    let repository = Arc::new(
        MockRepository::new()
            .with_company(make_company(
                7,
                "Acme",
                "https://boards.greenhouse.io/acme",
                Platform::Greenhouse,
            ))
            .with_jobs(
                7,
                vec![make_existing_job(
                    41,
                    Some("greenhouse-acme-1"),
                    "SE",
                    "u1",
                    JobStatus::New,
                    None,
                )],
            ),
    );
    let http =
        Arc::new(MockHttpClient::new().route("boards-api.greenhouse.io/v1/boards/acme/", 200, body));
    let orchestrator = orchestrator_with(repository.clone(), http, Arc::new(MockMatcher::disabled()));

    let result = orchestrator
        .scrape_company(7, ScrapeCompanyOptions::default())
        .await;

    assert_eq!(result.jobs_added, 0);
    assert_eq!(result.jobs_updated, 1);

    let hydrations = repository.hydrations.lock().unwrap();
    assert_eq!(hydrations.len(), 1);
    assert_eq!(hydrations[0].existing_job_id, 41);
    assert_eq!(hydrations[0].job.description.as_deref(), Some("Role details"));

    assert!(repository.inserted.lock().unwrap().is_empty());
    let logs = repository.log_rows();
    assert_eq!(logs[0].1.jobs_added, 0);
    assert_eq!(logs[0].1.jobs_updated, 1);
}

#[tokio::test]
async fn similarity_only_duplicates_are_never_hydrated() {
    let body = r#"{
        "jobs": [
            {"id": 9, "title": "Senior Software Engineer.", "absolute_url": "u-new", "content": "Fresh text"}
        ]
    }"#;
    let repository = Arc::new(
        MockRepository::new()
            .with_company(make_company(
                7,
                "Acme",
                "https://boards.greenhouse.io/acme",
                Platform::Greenhouse,
            ))
            .with_jobs(
                7,
                vec![make_existing_job(
                    50,
                    Some("greenhouse-acme-other"),
                    "Senior Software Engineer",
                    "u-old",
                    JobStatus::New,
                    None,
                )],
            ),
    );
    let http =
        Arc::new(MockHttpClient::new().route("boards-api.greenhouse.io/v1/boards/acme/", 200, body));
    let orchestrator = orchestrator_with(repository.clone(), http, Arc::new(MockMatcher::disabled()));

    let result = orchestrator
        .scrape_company(7, ScrapeCompanyOptions::default())
        .await;

    // Title-similarity match: duplicate, but no hydration and no insert
    assert_eq!(result.jobs_added, 0);
    assert_eq!(result.jobs_updated, 0);
    assert!(repository.hydrations.lock().unwrap().is_empty());
}

#[tokio::test]
async fn custom_platform_is_skipped_as_success() {
    let repository = Arc::new(MockRepository::new().with_company(make_company(
        3,
        "Nameless",
        "https://example.com/jobs",
        Platform::Custom,
    )));
    let http = Arc::new(MockHttpClient::new());
    let orchestrator =
        orchestrator_with(repository.clone(), http.clone(), Arc::new(MockMatcher::disabled()));

    let result = orchestrator
        .scrape_company(3, ScrapeCompanyOptions::default())
        .await;

    assert!(result.success);
    assert_eq!(result.outcome, ScrapeOutcome::Success);
    assert_eq!(result.jobs_found, 0);
    // No adapter was invoked
    assert!(http.requests.lock().unwrap().is_empty());
    // A skipped-but-success log row exists
    let logs = repository.log_rows();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].1.status, LogStatus::Success);
}

#[tokio::test]
async fn missing_company_is_an_error_without_log() {
    let repository = Arc::new(MockRepository::new());
    let orchestrator = orchestrator_with(
        repository.clone(),
        Arc::new(MockHttpClient::new()),
        Arc::new(MockMatcher::disabled()),
    );

    let result = orchestrator
        .scrape_company(999, ScrapeCompanyOptions::default())
        .await;

    assert_eq!(result.outcome, ScrapeOutcome::Error);
    assert!(result.error.unwrap().contains("not found"));
    assert!(repository.log_rows().is_empty());
}

#[tokio::test]
async fn adapter_error_writes_error_log() {
    let repository = Arc::new(MockRepository::new().with_company(make_company(
        1,
        "Acme",
        "https://boards.greenhouse.io/acme",
        Platform::Greenhouse,
    )));
    let http = Arc::new(MockHttpClient::new()); // no routes: every fetch fails
    let orchestrator = orchestrator_with(repository.clone(), http, Arc::new(MockMatcher::disabled()));

    let result = orchestrator
        .scrape_company(1, ScrapeCompanyOptions::default())
        .await;

    assert_eq!(result.outcome, ScrapeOutcome::Error);
    assert!(!result.success);
    let logs = repository.log_rows();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].1.status, LogStatus::Error);
    assert!(logs[0].1.error.is_some());
    // No archival on an error run
    assert!(repository.archive_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn archive_and_reopen_follow_the_open_set() {
    let body = r#"{
        "jobs": [
            {"id": 1, "title": "SE", "absolute_url": "u1"}
        ]
    }"#;
    let repository = Arc::new(
        MockRepository::new()
            .with_company(make_company(
                5,
                "Acme",
                "https://boards.greenhouse.io/acme",
                Platform::Greenhouse,
            ))
            .with_jobs(
                5,
                vec![
                    // Reappeared in the source: must be reopened
                    make_existing_job(
                        60,
                        Some("greenhouse-acme-1"),
                        "SE",
                        "u1",
                        JobStatus::Archived,
                        Some("old text"),
                    ),
                    // Vanished from the source: must be archived
                    make_existing_job(
                        61,
                        Some("greenhouse-acme-2"),
                        "SRE",
                        "u2",
                        JobStatus::New,
                        Some("desc"),
                    ),
                ],
            ),
    );
    let http =
        Arc::new(MockHttpClient::new().route("boards-api.greenhouse.io/v1/boards/acme/", 200, body));
    let orchestrator = orchestrator_with(repository.clone(), http, Arc::new(MockMatcher::disabled()));

    let result = orchestrator
        .scrape_company(5, ScrapeCompanyOptions::default())
        .await;

    assert_eq!(result.jobs_archived, 1);
    let reopen = repository.reopen_calls.lock().unwrap();
    assert_eq!(reopen.len(), 1);
    assert_eq!(reopen[0].1, vec!["greenhouse-acme-1"]);

    let jobs = repository.jobs.lock().unwrap();
    let rows = jobs.get(&5).unwrap();
    assert_eq!(rows.iter().find(|r| r.id == 60).unwrap().status, JobStatus::New);
    assert_eq!(
        rows.iter().find(|r| r.id == 61).unwrap().status,
        JobStatus::Archived
    );
}

fn uber_body(present: usize) -> String {
    let results: Vec<serde_json::Value> = (1..=present)
        .map(|i| serde_json::json!({"id": i, "title": format!("Role {i}")}))
        .collect();
    serde_json::json!({
        "data": {"results": results, "totalResults": {"low": present}}
    })
    .to_string()
}

fn uber_repository(present: usize) -> Arc<MockRepository> {
    // 100 archivable existing jobs uber-1..uber-100
    let rows = (1..=100)
        .map(|i| {
            make_existing_job(
                i,
                Some(&format!("uber-{i}")),
                &format!("Role {i}"),
                &format!("https://www.uber.com/global/en/careers/list/{i}/"),
                JobStatus::New,
                Some("desc"),
            )
        })
        .collect();
    Arc::new(
        MockRepository::new()
            .with_company(make_company(
                9,
                "Uber",
                "https://www.uber.com/us/en/careers/list/",
                Platform::Uber,
            ))
            .with_jobs(9, rows),
    )
}

#[tokio::test]
async fn uber_archive_guard_skips_mass_disappearance() {
    // 90 of 100 still open: missing = 10 > threshold 5 → no archival
    let repository = uber_repository(90);
    let http = Arc::new(MockHttpClient::new().route("loadSearchJobsResults", 200, &uber_body(90)));
    let orchestrator = orchestrator_with(repository.clone(), http, Arc::new(MockMatcher::disabled()));

    let result = orchestrator
        .scrape_company(9, ScrapeCompanyOptions::default())
        .await;

    assert_eq!(result.jobs_archived, 0);
    assert!(repository.archive_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn uber_archive_guard_allows_small_disappearance() {
    // 96 of 100 still open: missing = 4 ≤ threshold 5 → archive runs
    let repository = uber_repository(96);
    let http = Arc::new(MockHttpClient::new().route("loadSearchJobsResults", 200, &uber_body(96)));
    let orchestrator = orchestrator_with(repository.clone(), http, Arc::new(MockMatcher::disabled()));

    let result = orchestrator
        .scrape_company(9, ScrapeCompanyOptions::default())
        .await;

    assert_eq!(result.jobs_archived, 4);
    assert_eq!(repository.archive_calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn incomplete_open_set_never_archives() {
    use async_trait::async_trait;
    use jobscout::models::{ScrapedJob, ScraperResult};
    use jobscout::scrapers::{JobScraper, ScrapeOptions};

    /// Returns a partial result whose enumeration is flagged incomplete.
    struct TruncatedScraper;

    #[async_trait]
    impl JobScraper for TruncatedScraper {
        fn platform(&self) -> Platform {
            Platform::Lever
        }

        fn validate(&self, _url: &str) -> bool {
            true
        }

        fn extract_identifier(&self, _url: &str) -> Option<String> {
            None
        }

        async fn scrape(&self, _url: &str, _options: &ScrapeOptions) -> ScraperResult {
            let mut result = ScraperResult::partial(
                vec![ScrapedJob::new("lever-acme-1", "SE", "u1")],
                Some("list pagination incomplete".to_string()),
            );
            result.open_external_ids_complete = false;
            result
        }
    }

    let repository = Arc::new(
        MockRepository::new()
            .with_company(make_company(
                4,
                "Acme",
                "https://jobs.lever.co/acme",
                Platform::Lever,
            ))
            .with_jobs(
                4,
                vec![make_existing_job(
                    70,
                    Some("lever-acme-gone"),
                    "Old role",
                    "u-old",
                    JobStatus::New,
                    Some("desc"),
                )],
            ),
    );
    let mut registry = ScraperRegistry::new();
    registry.register(Arc::new(TruncatedScraper));
    let orchestrator = ScrapeOrchestrator::new(
        repository.clone(),
        Arc::new(registry),
        Arc::new(MockMatcher::disabled()),
        ScraperConfig::default(),
    );

    let result = orchestrator
        .scrape_company(4, ScrapeCompanyOptions::default())
        .await;

    assert_eq!(result.outcome, ScrapeOutcome::Partial);
    assert_eq!(result.jobs_archived, 0);
    assert!(repository.archive_calls.lock().unwrap().is_empty());
    // Reopen still runs: the ids we did see are authoritative for reopening
    assert_eq!(repository.reopen_calls.lock().unwrap().len(), 1);
    // The partial run's log row is partial
    let logs = repository.log_rows();
    assert_eq!(logs[0].1.status, LogStatus::Partial);
}

#[tokio::test]
async fn matcher_hand_off_runs_in_background() {
    let body = r#"{
        "jobs": [
            {"id": 1, "title": "SE", "absolute_url": "u1", "content": "<p>Long role description</p>"}
        ]
    }"#;
    let repository = Arc::new(MockRepository::new().with_company(make_company(
        1,
        "Acme",
        "https://boards.greenhouse.io/acme",
        Platform::Greenhouse,
    )));
    let http =
        Arc::new(MockHttpClient::new().route("boards-api.greenhouse.io/v1/boards/acme/", 200, body));
    let matcher = Arc::new(MockMatcher::enabled(MatchRun {
        total: 1,
        succeeded: 1,
        failed: 0,
    }));
    let orchestrator = orchestrator_with(repository.clone(), http, matcher.clone());

    let result = orchestrator
        .scrape_company(1, ScrapeCompanyOptions::default())
        .await;
    assert_eq!(result.jobs_added, 1);

    // The hand-off is stamped pending synchronously
    let pending_seen = repository
        .log_patches
        .lock()
        .unwrap()
        .iter()
        .any(|(_, p)| p.matcher_status == Some(MatcherStatus::Pending));
    assert!(pending_seen);

    // The background task reaches a terminal state shortly after
    let mut completed = false;
    for _ in 0..100 {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let patches = repository.log_patches.lock().unwrap();
        if patches
            .iter()
            .any(|(_, p)| p.matcher_status == Some(MatcherStatus::Completed))
        {
            completed = true;
            break;
        }
    }
    assert!(completed, "matcher never reached a terminal state");
    assert_eq!(matcher.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn matcher_not_invoked_without_matchable_jobs() {
    // Inserted job has no description, so it is not matchable
    let body = r#"{"jobs": [{"id": 1, "title": "SE", "absolute_url": "u1"}]}"#;
    let repository = Arc::new(MockRepository::new().with_company(make_company(
        1,
        "Acme",
        "https://boards.greenhouse.io/acme",
        Platform::Greenhouse,
    )));
    let http =
        Arc::new(MockHttpClient::new().route("boards-api.greenhouse.io/v1/boards/acme/", 200, body));
    let matcher = Arc::new(MockMatcher::enabled(MatchRun::default()));
    let orchestrator = orchestrator_with(repository.clone(), http, matcher.clone());

    let result = orchestrator
        .scrape_company(1, ScrapeCompanyOptions::default())
        .await;
    assert_eq!(result.jobs_added, 1);

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(matcher.calls.lock().unwrap().is_empty());
    let patches = repository.log_patches.lock().unwrap();
    assert!(patches.iter().all(|(_, p)| p.matcher_status.is_none()));
}
