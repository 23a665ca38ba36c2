//! Tests for engine module

use super::*;
use crate::http::{ManualClock, SubmitClientConfig};
use crate::validate::ValidatorConfig;
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use test_case::test_case;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const ENDPOINT: &str = "/api/historical-comments";

fn row(i: usize) -> NormalizedRecord {
    NormalizedRecord::default()
        .with(Field::MkId, "1")
        .with(Field::Content, format!("Statement {i} about the draft law"))
        .with(Field::SourceUrl, format!("https://news.example.com/{i}"))
        .with(Field::SourcePlatform, "News")
        .with(Field::SourceType, "Primary")
        .with(Field::CommentDate, "2024-01-15T10:00:00.000Z")
        .with(Field::SourceName, "Example News")
}

fn rows(n: usize) -> Vec<NormalizedRecord> {
    (0..n).map(row).collect()
}

fn always(_: &Checkpoint) -> bool {
    true
}

fn never(_: &Checkpoint) -> bool {
    false
}

struct Harness {
    server: MockServer,
    dir: TempDir,
    clock: Arc<ManualClock>,
}

impl Harness {
    async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            dir: tempfile::tempdir().unwrap(),
            clock: Arc::new(ManualClock::new(
                Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            )),
        }
    }

    /// Accept every submission and report a healthy quota
    async fn mount_accepting_api(&self) {
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"success": true})))
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path(ENDPOINT))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-ratelimit-limit", "1000")
                    .insert_header("x-ratelimit-remaining", "900"),
            )
            .mount(&self.server)
            .await;
    }

    fn store(&self) -> CheckpointStore {
        CheckpointStore::new(self.dir.path().join("checkpoint.json"))
    }

    fn error_log_path(&self) -> std::path::PathBuf {
        self.dir.path().join("errors.log")
    }

    fn engine(&self, config: ImportConfig) -> ImportEngine {
        let client_config = SubmitClientConfig::builder()
            .base_url(self.server.uri())
            .api_key("test-key")
            .no_rate_limit()
            .build();
        let client = SubmitClient::with_clock(client_config, self.clock.clone()).unwrap();

        ImportEngine::new(
            client,
            self.store(),
            Validator::structural(ValidatorConfig::default()),
        )
        .with_config(config.with_error_log(self.error_log_path()))
    }

    async fn submissions(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.to_string() == "POST")
            .count()
    }
}

/// Accepts submissions and raises the shutdown flag after `after` of them
struct StopAfter {
    flag: ShutdownFlag,
    after: usize,
    seen: AtomicUsize,
}

impl Respond for StopAfter {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        if self.seen.fetch_add(1, Ordering::SeqCst) + 1 >= self.after {
            self.flag.request();
        }
        ResponseTemplate::new(201)
    }
}

// ============================================================================
// Config and Batch Math Tests
// ============================================================================

#[test]
fn test_import_config_default() {
    let config = ImportConfig::default();
    assert_eq!(config.batch_size, 100);
    assert!(!config.resume);
    assert_eq!(config.low_water_mark, 100);
    assert_eq!(
        config.error_log_path,
        std::path::PathBuf::from("import-errors.log")
    );
}

#[test]
fn test_import_config_builder() {
    let config = ImportConfig::new()
        .with_batch_size(25)
        .with_resume(true)
        .with_low_water_mark(10)
        .with_max_rate_limit_wait(Duration::from_secs(5))
        .with_error_log("/tmp/errors.log");

    assert_eq!(config.batch_size, 25);
    assert!(config.resume);
    assert_eq!(config.low_water_mark, 10);
    assert_eq!(config.max_rate_limit_wait, Duration::from_secs(5));
}

#[test_case(250, 100, 3 ; "partial last batch")]
#[test_case(200, 100, 2 ; "exact multiple")]
#[test_case(1, 100, 1 ; "single row")]
#[test_case(0, 100, 0 ; "empty input")]
#[test_case(10, 0, 0 ; "zero batch size")]
fn test_batch_count(rows: usize, batch_size: usize, expected: usize) {
    assert_eq!(batch_count(rows, batch_size), expected);
}

#[test]
fn test_shutdown_flag_is_shared() {
    let flag = ShutdownFlag::new();
    let clone = flag.clone();
    assert!(!flag.is_requested());
    clone.request();
    assert!(flag.is_requested());
}

#[test]
fn test_format_duration() {
    assert_eq!(format_duration(Duration::from_secs(3)), "3s");
    assert_eq!(format_duration(Duration::from_secs(123)), "2m 03s");
    assert_eq!(format_duration(Duration::from_secs(3723)), "1h 02m 03s");
}

#[test]
fn test_report_summary() {
    let report = ImportReport {
        outcome: RunOutcome::Interrupted,
        source_file: "comments.csv".to_string(),
        total_rows: 250,
        total_batches: 3,
        batches_completed: 1,
        resumed_from: None,
        imported: 90,
        duplicates: 5,
        errors: 5,
        skipped: 0,
        processed_this_run: 100,
        elapsed: Duration::from_secs(50),
    };

    assert!(!report.is_complete());
    assert!((report.throughput() - 2.0).abs() < f64::EPSILON);
    let text = report.summary();
    assert!(text.contains("Import interrupted: comments.csv"));
    assert!(text.contains("Duplicates: 5"));
    assert!(text.contains("--resume"));
}

// ============================================================================
// Run Tests
// ============================================================================

#[tokio::test]
async fn test_import_processes_all_batches() {
    let h = Harness::start().await;
    h.mount_accepting_api().await;

    let engine = h.engine(ImportConfig::default());
    let report = engine.run("comments.csv", &rows(250), &always).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.total_batches, 3);
    assert_eq!(report.batches_completed, 3);
    assert_eq!(report.imported, 250);
    assert_eq!(report.errors, 0);
    assert_eq!(report.processed_this_run, 250);
    assert_eq!(h.submissions().await, 250);
    assert!(!h.store().exists());
    assert!(!h.error_log_path().exists());
}

#[tokio::test]
async fn test_checkpoint_saved_after_each_batch() {
    let h = Harness::start().await;
    let flag = ShutdownFlag::new();

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(StopAfter {
            flag: flag.clone(),
            after: 200,
            seen: AtomicUsize::new(0),
        })
        .mount(&h.server)
        .await;

    let engine = h.engine(ImportConfig::default()).with_shutdown(flag);
    let report = engine.run("comments.csv", &rows(250), &always).await.unwrap();

    // Two full batches of 100, third never started
    assert_eq!(report.outcome, RunOutcome::Interrupted);
    assert_eq!(report.batches_completed, 2);
    assert_eq!(report.imported, 200);

    let checkpoint = h.store().load().await.unwrap().unwrap();
    assert_eq!(checkpoint.current_batch, 2);
    assert_eq!(checkpoint.total_batches, 3);
    assert_eq!(checkpoint.processed_urls.len(), 200);
    assert_eq!(
        checkpoint.last_successful_url.as_deref(),
        Some("https://news.example.com/199")
    );
}

#[tokio::test]
async fn test_repeated_row_counts_as_duplicate() {
    let h = Harness::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(201))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"isDuplicate": true})),
        )
        .mount(&h.server)
        .await;

    let engine = h.engine(ImportConfig::default());
    let report = engine
        .run("comments.csv", &[row(1), row(1)], &always)
        .await
        .unwrap();

    assert_eq!(report.imported, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.errors, 0);
    assert_eq!(h.submissions().await, 2);
}

#[tokio::test]
async fn test_invalid_rows_are_not_submitted() {
    let h = Harness::start().await;
    h.mount_accepting_api().await;

    let invalid = row(2).with(Field::Content, "too short");
    let missing = NormalizedRecord::default().with(Field::Content, "draft law statement");

    let engine = h.engine(ImportConfig::default());
    let report = engine
        .run("comments.csv", &[row(1), invalid, missing], &always)
        .await
        .unwrap();

    assert_eq!(report.imported, 1);
    assert_eq!(report.errors, 2);
    assert_eq!(h.submissions().await, 1);

    let log = std::fs::read_to_string(h.error_log_path()).unwrap();
    assert!(log.contains("Row 3: https://news.example.com/2"));
    assert!(log.contains("CONTENT_LENGTH"));
    assert!(log.contains("Row 4: (no url)"));
    assert!(log.contains("MISSING_FIELD"));
}

#[tokio::test]
async fn test_failed_submissions_are_logged_and_counted() {
    let h = Harness::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(serde_json::json!({"error": "MK not found"})),
        )
        .mount(&h.server)
        .await;

    let engine = h.engine(ImportConfig::default());
    let report = engine.run("comments.csv", &rows(2), &always).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.errors, 2);
    assert_eq!(h.submissions().await, 2);

    let log = std::fs::read_to_string(h.error_log_path()).unwrap();
    assert!(log.contains("HTTP 422: MK not found"));
}

#[tokio::test]
async fn test_interrupt_then_resume() {
    let h = Harness::start().await;
    let flag = ShutdownFlag::new();
    let input = rows(5);

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(StopAfter {
            flag: flag.clone(),
            after: 3,
            seen: AtomicUsize::new(0),
        })
        .up_to_n_times(3)
        .mount(&h.server)
        .await;
    h.mount_accepting_api().await;

    let config = ImportConfig::default().with_batch_size(2);
    let first = h
        .engine(config.clone())
        .with_shutdown(flag)
        .run("comments.csv", &input, &always)
        .await
        .unwrap();

    assert_eq!(first.outcome, RunOutcome::Interrupted);
    assert_eq!(first.imported, 3);
    assert_eq!(first.batches_completed, 1);

    let saved = h.store().load().await.unwrap().unwrap();
    assert_eq!(saved.current_batch, 1);
    assert_eq!(saved.processed_urls.len(), 3);

    let second = h
        .engine(config.with_resume(true))
        .run("comments.csv", &input, &always)
        .await
        .unwrap();

    assert_eq!(second.outcome, RunOutcome::Completed);
    assert_eq!(second.resumed_from, Some(2));
    assert_eq!(second.imported, 5);
    assert_eq!(second.skipped, 1);
    assert_eq!(second.processed_this_run, 2);
    assert_eq!(h.submissions().await, 5);
    assert!(!h.store().exists());
}

#[tokio::test]
async fn test_resume_is_idempotent() {
    let h = Harness::start().await;
    h.mount_accepting_api().await;
    let input = rows(4);

    let mut checkpoint = Checkpoint::new("comments.csv", 4, 2);
    checkpoint.imported = 4;
    checkpoint.processed_urls = input
        .iter()
        .filter_map(|r| r.get(Field::SourceUrl).map(ToString::to_string))
        .collect();
    h.store().save(&checkpoint).await.unwrap();

    let engine = h.engine(ImportConfig::default().with_batch_size(2).with_resume(true));
    let report = engine.run("comments.csv", &input, &always).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.imported, 4);
    assert_eq!(report.duplicates, 0);
    assert_eq!(report.skipped, 4);
    assert_eq!(report.processed_this_run, 0);
    assert_eq!(h.submissions().await, 0);
}

#[tokio::test]
async fn test_resume_with_changed_batch_size_starts_fresh() {
    let h = Harness::start().await;
    h.mount_accepting_api().await;
    let input = rows(250);

    // 20 of 25 batches of 10 done in an earlier run
    let mut checkpoint = Checkpoint::new("comments.csv", 250, 10);
    checkpoint.current_batch = 20;
    checkpoint.imported = 200;
    checkpoint.processed_urls = input
        .iter()
        .take(200)
        .filter_map(|r| r.get(Field::SourceUrl).map(ToString::to_string))
        .collect();
    h.store().save(&checkpoint).await.unwrap();

    let engine = h.engine(ImportConfig::default().with_batch_size(100).with_resume(true));
    let report = engine.run("comments.csv", &input, &always).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.resumed_from, None);
    assert_eq!(report.imported, 250);
    assert_eq!(h.submissions().await, 250);
}

#[tokio::test]
async fn test_invalid_checkpoint_starts_fresh() {
    let h = Harness::start().await;
    h.mount_accepting_api().await;

    let mut stale = Checkpoint::new("comments.csv", 99, 1);
    stale.imported = 50;
    h.store().save(&stale).await.unwrap();

    let engine = h.engine(ImportConfig::default().with_resume(true));
    let report = engine.run("comments.csv", &rows(3), &always).await.unwrap();

    assert_eq!(report.resumed_from, None);
    assert_eq!(report.imported, 3);
    assert_eq!(h.submissions().await, 3);
}

#[tokio::test]
async fn test_declined_resume_starts_fresh() {
    let h = Harness::start().await;
    h.mount_accepting_api().await;
    let input = rows(3);

    let mut checkpoint = Checkpoint::new("comments.csv", 3, 100);
    checkpoint.processed_urls.insert("https://news.example.com/0".to_string());
    h.store().save(&checkpoint).await.unwrap();

    let engine = h.engine(ImportConfig::default().with_resume(true));
    let report = engine.run("comments.csv", &input, &never).await.unwrap();

    assert_eq!(report.resumed_from, None);
    assert_eq!(report.skipped, 0);
    assert_eq!(h.submissions().await, 3);
}

#[tokio::test]
async fn test_without_resume_flag_checkpoint_is_discarded() {
    let h = Harness::start().await;
    h.mount_accepting_api().await;

    let mut checkpoint = Checkpoint::new("comments.csv", 2, 100);
    checkpoint.processed_urls.insert("https://news.example.com/0".to_string());
    h.store().save(&checkpoint).await.unwrap();

    let engine = h.engine(ImportConfig::default());
    let report = engine.run("comments.csv", &rows(2), &always).await.unwrap();

    assert_eq!(report.skipped, 0);
    assert_eq!(h.submissions().await, 2);
}

#[tokio::test]
async fn test_pauses_when_quota_runs_low() {
    let h = Harness::start().await;
    let reset = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap().timestamp();

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(201))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-limit", "1000")
                .insert_header("x-ratelimit-remaining", "10")
                .insert_header("x-ratelimit-reset", reset.to_string().as_str()),
        )
        .mount(&h.server)
        .await;

    let engine = h.engine(ImportConfig::default().with_batch_size(1));
    let report = engine.run("comments.csv", &rows(2), &always).await.unwrap();

    assert!(report.is_complete());
    // One probe between the two batches, none after the last
    assert_eq!(h.clock.sleeps(), vec![Duration::from_secs(31)]);
}

#[tokio::test]
async fn test_probe_failure_does_not_abort() {
    let h = Harness::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(201))
        .mount(&h.server)
        .await;

    let engine = h.engine(ImportConfig::default().with_batch_size(1));
    let report = engine.run("comments.csv", &rows(3), &always).await.unwrap();

    assert_eq!(report.imported, 3);
    assert!(h.clock.sleeps().is_empty());
}

#[tokio::test]
async fn test_unwritable_checkpoint_is_fatal() {
    let h = Harness::start().await;
    h.mount_accepting_api().await;

    let client_config = SubmitClientConfig::builder()
        .base_url(h.server.uri())
        .no_rate_limit()
        .build();
    let engine = ImportEngine::new(
        SubmitClient::with_clock(client_config, h.clock.clone()).unwrap(),
        CheckpointStore::new(h.dir.path().join("missing").join("checkpoint.json")),
        Validator::structural(ValidatorConfig::default()),
    );

    let err = engine.run("comments.csv", &rows(1), &always).await.unwrap_err();
    assert!(matches!(err, Error::Checkpoint { .. }));
    assert_eq!(h.submissions().await, 0);
}

#[tokio::test]
async fn test_zero_batch_size_is_rejected() {
    let h = Harness::start().await;
    let engine = h.engine(ImportConfig::default().with_batch_size(0));
    assert!(engine.run("comments.csv", &rows(1), &always).await.is_err());
}

#[tokio::test]
async fn test_empty_input_completes() {
    let h = Harness::start().await;
    let engine = h.engine(ImportConfig::default());
    let report = engine.run("comments.csv", &[], &always).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.total_batches, 0);
    assert!(!h.store().exists());
}
