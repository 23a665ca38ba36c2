//! Tests for Checkpoint and CheckpointStore

use super::*;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn row_error(row: usize, url: &str) -> RowError {
    RowError {
        row,
        url: url.to_string(),
        message: "HTTP 400: bad".to_string(),
        mk_id: Some("1".to_string()),
        content: None,
        platform: None,
        date: None,
    }
}

// ============================================================================
// Checkpoint Tests
// ============================================================================

#[test]
fn test_checkpoint_new() {
    let checkpoint = Checkpoint::new("comments.csv", 250, 100);
    assert_eq!(checkpoint.current_batch, 0);
    assert_eq!(checkpoint.rows_processed(), 0);
    assert!(!checkpoint.is_complete());
    assert!(checkpoint.processed_urls.is_empty());
}

#[test]
fn test_checkpoint_validity() {
    let checkpoint = Checkpoint::new("comments.csv", 250, 100);

    assert!(checkpoint.is_valid_for("comments.csv", 250, 100).is_ok());

    let err = checkpoint.is_valid_for("other.csv", 250, 100).unwrap_err();
    assert!(err.contains("other.csv"));

    let err = checkpoint.is_valid_for("comments.csv", 251, 100).unwrap_err();
    assert!(err.contains("251"));
}

#[test]
fn test_checkpoint_rejects_other_batch_size() {
    let mut checkpoint = Checkpoint::new("comments.csv", 250, 10);
    for _ in 0..20 {
        checkpoint.complete_batch();
    }
    assert_eq!(checkpoint.total_batches, 25);

    let err = checkpoint.is_valid_for("comments.csv", 250, 100).unwrap_err();
    assert!(err.contains("batch size 10"));
    assert!(checkpoint.is_valid_for("comments.csv", 250, 10).is_ok());
}

#[test]
fn test_checkpoint_without_batch_size_is_rejected() {
    let json = r#"{
        "timestamp": "2024-01-15T10:00:00Z",
        "sourceFile": "comments.csv",
        "totalRows": 250,
        "totalBatches": 3,
        "currentBatch": 1,
        "imported": 100,
        "duplicates": 0,
        "errors": 0
    }"#;
    let checkpoint: Checkpoint = serde_json::from_str(json).unwrap();
    assert_eq!(checkpoint.batch_size, 0);
    assert!(checkpoint.is_valid_for("comments.csv", 250, 100).is_err());
}

#[test]
fn test_completed_checkpoint_is_invalid() {
    let mut checkpoint = Checkpoint::new("comments.csv", 250, 100);
    for _ in 0..3 {
        checkpoint.complete_batch();
    }
    assert!(checkpoint.is_complete());
    assert!(checkpoint.is_valid_for("comments.csv", 250, 100).is_err());
}

#[test]
fn test_complete_batch_never_exceeds_total() {
    let mut checkpoint = Checkpoint::new("comments.csv", 10, 10);
    checkpoint.complete_batch();
    checkpoint.complete_batch();
    assert_eq!(checkpoint.current_batch, 1);
}

#[test]
fn test_record_batch_result() {
    let mut checkpoint = Checkpoint::new("comments.csv", 4, 4);

    let mut result = BatchResult::new(1);
    result.record_imported("https://a.com/1");
    result.record_duplicate("https://a.com/2");
    result.record_error(row_error(3, "https://a.com/3"));
    result.record_imported("https://a.com/4");
    checkpoint.record(&result);

    assert_eq!(checkpoint.imported, 2);
    assert_eq!(checkpoint.duplicates, 1);
    assert_eq!(checkpoint.errors, 1);
    assert_eq!(checkpoint.processed_urls.len(), 4);
    assert!(checkpoint.is_processed("https://a.com/3"));
    assert_eq!(
        checkpoint.last_successful_url.as_deref(),
        Some("https://a.com/4")
    );
    assert!((checkpoint.progress_percent() - 100.0).abs() < f64::EPSILON);
}

#[test]
fn test_record_keeps_last_successful_url() {
    let mut checkpoint = Checkpoint::new("comments.csv", 2, 2);

    let mut first = BatchResult::new(1);
    first.record_imported("https://a.com/1");
    checkpoint.record(&first);

    let mut second = BatchResult::new(1);
    second.record_duplicate("https://a.com/2");
    checkpoint.record(&second);

    assert_eq!(
        checkpoint.last_successful_url.as_deref(),
        Some("https://a.com/1")
    );
}

#[test]
fn test_checkpoint_json_shape() {
    let mut checkpoint = Checkpoint::new("comments.csv", 2, 2);
    checkpoint.processed_urls.insert("https://a.com/1".to_string());

    let json: serde_json::Value = serde_json::to_value(&checkpoint).unwrap();
    assert_eq!(json["sourceFile"], "comments.csv");
    assert_eq!(json["totalRows"], 2);
    assert_eq!(json["batchSize"], 2);
    assert_eq!(json["totalBatches"], 1);
    assert_eq!(json["currentBatch"], 0);
    assert_eq!(json["processedUrls"][0], "https://a.com/1");
    assert!(json["lastSuccessfulUrl"].is_null());
}

#[test]
fn test_batch_result_counts() {
    let mut result = BatchResult::new(2);
    assert!(result.is_empty());
    result.record_error(row_error(101, "https://a.com/x"));
    assert_eq!(result.rows(), 1);
    assert_eq!(result.row_errors.len(), 1);
    assert_eq!(result.last_successful_url, None);
}

// ============================================================================
// Store Tests
// ============================================================================

#[test]
fn test_store_default_path() {
    let store = CheckpointStore::default();
    assert_eq!(store.path().to_str().unwrap(), ".import-checkpoint.json");
}

#[tokio::test]
async fn test_load_missing() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("checkpoint.json"));

    assert!(!store.exists());
    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_save_and_load() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("checkpoint.json"));

    let mut checkpoint = Checkpoint::new("comments.csv", 250, 100);
    let mut result = BatchResult::new(1);
    result.record_imported("https://a.com/1");
    checkpoint.record(&result);
    checkpoint.complete_batch();

    store.save(&checkpoint).await.unwrap();
    assert!(store.exists());

    let loaded = store.load().await.unwrap().unwrap();
    assert_eq!(loaded, checkpoint);
}

#[tokio::test]
async fn test_save_overwrites() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("checkpoint.json"));

    let mut checkpoint = Checkpoint::new("comments.csv", 250, 100);
    store.save(&checkpoint).await.unwrap();
    checkpoint.complete_batch();
    store.save(&checkpoint).await.unwrap();

    let loaded = store.load().await.unwrap().unwrap();
    assert_eq!(loaded.current_batch, 1);
}

#[tokio::test]
async fn test_save_leaves_no_temp_file() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("checkpoint.json"));

    store
        .save(&Checkpoint::new("comments.csv", 1, 1))
        .await
        .unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["checkpoint.json".to_string()]);
}

#[tokio::test]
async fn test_load_corrupt_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("checkpoint.json");
    std::fs::write(&path, "{not json").unwrap();

    let store = CheckpointStore::new(&path);
    let err = store.load().await.unwrap_err();
    assert!(matches!(err, crate::error::Error::Checkpoint { .. }));
}

#[tokio::test]
async fn test_delete() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("checkpoint.json"));

    assert!(!store.delete().await.unwrap());

    store
        .save(&Checkpoint::new("comments.csv", 1, 1))
        .await
        .unwrap();
    assert!(store.delete().await.unwrap());
    assert!(!store.exists());
}
