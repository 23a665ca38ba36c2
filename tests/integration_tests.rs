//! Integration tests using mock HTTP server
//!
//! Tests the full flow: input file → normalize → validate → import against a
//! mock API, through both the library API and the CLI runner.

use clap::Parser;
use knesset_import::cli::{Cli, Runner, EXIT_FAILURE, EXIT_SUCCESS};
use knesset_import::config::ENV_API_KEY;
use knesset_import::decode::read_records;
use knesset_import::normalize::{normalize_records, write_csv};
use knesset_import::state::{Checkpoint, CheckpointStore};
use knesset_import::validate::{EntityCache, ErrorType, ValidationReport, Validator, ValidatorConfig};
use knesset_import::{SourcePlatform, SourceType};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENDPOINT: &str = "/api/historical-comments";

const ENTITIES: &str = r#"[
    {"id": 1, "name": "חבר כנסת א", "category": "coalition"},
    {"id": 2, "name": "חבר כנסת ב", "coalitionStatus": "opposition"}
]"#;

const HEBREW_CSV: &str = "\u{feff}mkId,content,sourceUrl,sourcePlatform,sourceType,commentDate,sourceName,sourceCredibility\n\
1,אני תומך בחוק הגיוס כי הוא מקדם שוויון בנטל,https://www.ynet.co.il/news/article/abc123,חדשות,Primary,2024-01-15T10:00:00Z,ynet,8\n";

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn settings_file(dir: &TempDir, server: &MockServer) -> PathBuf {
    let entities = write(dir, "mks.json", ENTITIES);
    let yaml = format!(
        "api:\n  base_url: \"{}\"\nrate_limit:\n  enabled: false\nimport:\n  batch_size: 2\n  checkpoint_path: \"{}\"\n  error_log_path: \"{}\"\nvalidation:\n  entities_path: \"{}\"\n",
        server.uri(),
        dir.path().join("checkpoint.json").display(),
        dir.path().join("errors.log").display(),
        entities.display(),
    );
    write(dir, "settings.yaml", &yaml)
}

fn runner(args: &[&str]) -> Runner {
    let mut argv = vec!["knesset-import"];
    argv.extend_from_slice(args);
    Runner::new(Cli::parse_from(argv)).with_env(ENV_API_KEY, "integration-key")
}

fn s(path: &Path) -> &str {
    path.to_str().unwrap()
}

async fn mount_api(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("authorization", "Bearer integration-key"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"success": true})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-limit", "1000")
                .insert_header("x-ratelimit-remaining", "990"),
        )
        .mount(server)
        .await;
}

async fn post_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.to_string() == "POST")
        .count()
}

fn comment_csv(n: usize) -> String {
    let mut csv = String::from("mk,text,link,platform,date\n");
    for i in 0..n {
        csv.push_str(&format!(
            "1,Statement {i} on the draft exemption,news.example.com/{i},news,15/01/2024\n"
        ));
    }
    csv
}

// ============================================================================
// Normalize + Validate
// ============================================================================

#[test]
fn test_hebrew_row_validates_clean() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(&dir, "hebrew.csv", HEBREW_CSV);

    let rows = normalize_records(&read_records(&input).unwrap());
    let validator = Validator::new(
        ValidatorConfig::default(),
        EntityCache::from_json_str(ENTITIES).unwrap(),
    );
    let results = validator.validate_all(&rows);

    assert_eq!(results.len(), 1);
    assert!(results[0].errors.is_empty(), "{:?}", results[0].errors);
    assert!(results[0].warnings.is_empty(), "{:?}", results[0].warnings);

    let comment = results[0].comment.as_ref().unwrap();
    assert_eq!(comment.mk_id, 1);
    assert_eq!(comment.source_platform, SourcePlatform::News);
    assert_eq!(comment.source_type, SourceType::Primary);
    assert_eq!(comment.source_credibility, Some(8));
}

#[test]
fn test_aliased_json_round_trips_through_canonical_csv() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(
        &dir,
        "input.json",
        r#"[{"url": "example.com/a", "platform": "x", "mk": 1, "quote": "draft law comment"}]"#,
    );
    let output = dir.path().join("canonical.csv");

    let rows = normalize_records(&read_records(&input).unwrap());
    write_csv(&output, &rows).unwrap();
    let reread = normalize_records(&read_records(&output).unwrap());

    assert_eq!(reread, rows);
    assert_eq!(reread[0].source_url.as_deref(), Some("https://example.com/a"));
    assert_eq!(reread[0].source_platform.as_deref(), Some("Twitter"));
}

#[test]
fn test_validation_report_counts_referential_errors() {
    let csv = "mkId,content,sourceUrl,sourcePlatform,sourceType,commentDate\n\
        1,Statement about the draft law,https://a.com/1,News,Primary,2024-01-15T10:00:00Z\n\
        2,Statement about the draft law,https://a.com/2,News,Primary,2024-01-15T10:00:00Z\n\
        9,Statement about the draft law,https://a.com/3,News,Primary,2024-01-15T10:00:00Z\n\
        3,Statement about the draft law,https://a.com/4,News,Primary,2024-01-15T10:00:00Z\n";
    let dir = tempfile::tempdir().unwrap();
    let input = write(&dir, "in.csv", csv);

    let rows = normalize_records(&read_records(&input).unwrap());
    let validator = Validator::new(
        ValidatorConfig::default(),
        EntityCache::from_json_str(ENTITIES).unwrap(),
    );
    let results = validator.validate_all(&rows);
    let report = ValidationReport::from_rows("in.csv", &results);

    assert_eq!(report.valid_rows, 1);
    assert_eq!(report.invalid_rows, 3);
    assert_eq!(report.errors_by_type[0].kind, ErrorType::NotFound.to_string());
    assert_eq!(report.errors_by_type[0].count, 2);
    assert_eq!(report.errors_by_type[1].kind, ErrorType::NotEligible.to_string());
}

// ============================================================================
// CLI
// ============================================================================

#[tokio::test]
async fn test_cli_validate_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(&dir, "hebrew.csv", HEBREW_CSV);
    let entities = write(&dir, "mks.json", ENTITIES);
    let report = dir.path().join("report.json");

    let code = runner(&[
        "validate",
        s(&input),
        "--entities",
        s(&entities),
        "--report",
        s(&report),
    ])
    .run()
    .await
    .unwrap();

    assert_eq!(code, EXIT_SUCCESS);
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["totalRows"], 1);
    assert_eq!(json["errorCount"], 0);
}

#[tokio::test]
async fn test_cli_validate_unknown_entity_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(&dir, "hebrew.csv", &HEBREW_CSV.replace("\n1,", "\n42,"));
    let entities = write(&dir, "mks.json", ENTITIES);
    let report = dir.path().join("report.json");

    let code = runner(&[
        "validate",
        s(&input),
        "--entities",
        s(&entities),
        "--report",
        s(&report),
    ])
    .run()
    .await
    .unwrap();

    assert_eq!(code, EXIT_FAILURE);
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["errors"][0]["type"], "NOT_FOUND");
    assert_eq!(json["errors"][0]["row"], 2);
}

#[tokio::test]
async fn test_cli_import_rejects_unknown_member_without_submitting() {
    let server = MockServer::start().await;
    mount_api(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let settings = settings_file(&dir, &server);
    let input = write(&dir, "comments.csv", &comment_csv(2).replace("\n1,", "\n2,"));

    let code = runner(&["import", s(&input), "--config", s(&settings)])
        .run()
        .await
        .unwrap();

    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(post_count(&server).await, 0);
    let log = std::fs::read_to_string(dir.path().join("errors.log")).unwrap();
    assert!(log.contains("Validation failed"));
}

#[tokio::test]
async fn test_cli_import_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(body_partial_json(json!({
            "mkId": 1,
            "sourceUrl": "https://news.example.com/0",
            "sourcePlatform": "News",
            "sourceType": "Secondary",
            "commentDate": "2024-01-15T00:00:00.000Z"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    mount_api(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let settings = settings_file(&dir, &server);
    let input = write(&dir, "comments.csv", &comment_csv(5));

    let code = runner(&["import", s(&input), "--config", s(&settings)])
        .run()
        .await
        .unwrap();

    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(post_count(&server).await, 5);
    assert!(!dir.path().join("checkpoint.json").exists());
    assert!(!dir.path().join("errors.log").exists());
}

#[tokio::test]
async fn test_cli_import_logs_rejected_rows() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(body_partial_json(json!({"sourceUrl": "https://news.example.com/1"})))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Bad source"})))
        .mount(&server)
        .await;
    mount_api(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let settings = settings_file(&dir, &server);
    let input = write(&dir, "comments.csv", &comment_csv(3));

    let code = runner(&["import", s(&input), "--config", s(&settings), "--format", "json"])
        .run()
        .await
        .unwrap();

    assert_eq!(code, EXIT_SUCCESS);
    let log = std::fs::read_to_string(dir.path().join("errors.log")).unwrap();
    assert!(log.contains("https://news.example.com/1"));
    assert!(log.contains("HTTP 400: Bad source"));
    assert!(!log.contains("https://news.example.com/0"));
}

#[tokio::test]
async fn test_cli_import_resumes_from_checkpoint() {
    let server = MockServer::start().await;
    mount_api(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let settings = settings_file(&dir, &server);
    let input = write(&dir, "comments.csv", &comment_csv(5));

    // First two rows done in a previous run
    let mut checkpoint = Checkpoint::new(input.display().to_string(), 5, 2);
    checkpoint.current_batch = 1;
    checkpoint.imported = 2;
    checkpoint.processed_urls.insert("https://news.example.com/0".to_string());
    checkpoint.processed_urls.insert("https://news.example.com/1".to_string());
    let store = CheckpointStore::new(dir.path().join("checkpoint.json"));
    store.save(&checkpoint).await.unwrap();

    let code = runner(&[
        "import",
        s(&input),
        "--config",
        s(&settings),
        "--resume",
        "--yes",
    ])
    .run()
    .await
    .unwrap();

    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(post_count(&server).await, 3);
    assert!(!store.exists());
}

#[tokio::test]
async fn test_cli_import_without_api_key_fails() {
    if std::env::var(ENV_API_KEY).is_ok() {
        return;
    }
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_file(&dir, &server);
    let input = write(&dir, "comments.csv", &comment_csv(1));

    let cli = Cli::parse_from(["knesset-import", "import", s(&input), "--config", s(&settings)]);
    let err = Runner::new(cli).run().await.unwrap_err();

    assert!(err.to_string().contains(ENV_API_KEY));
    assert_eq!(post_count(&server).await, 0);
}
