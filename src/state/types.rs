//! Checkpoint types
//!
//! The checkpoint is serialized to JSON and rewritten after every batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Durable progress record for one import run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Time of the last save
    pub timestamp: DateTime<Utc>,
    /// Identity of the input file
    pub source_file: String,
    pub total_rows: usize,
    /// Rows per batch; `current_batch` only means something under this size
    #[serde(default)]
    pub batch_size: usize,
    pub total_batches: usize,
    /// Number of fully processed batches
    pub current_batch: usize,
    pub imported: usize,
    pub duplicates: usize,
    pub errors: usize,
    #[serde(default)]
    pub last_successful_url: Option<String>,
    /// Every URL already submitted or rejected; only grows
    #[serde(default)]
    pub processed_urls: BTreeSet<String>,
}

impl Checkpoint {
    /// Create an empty checkpoint for a fresh run of `total_rows` rows
    /// in batches of `batch_size`
    pub fn new(source_file: impl Into<String>, total_rows: usize, batch_size: usize) -> Self {
        let total_batches = if batch_size == 0 {
            0
        } else {
            total_rows.div_ceil(batch_size)
        };
        Self {
            timestamp: Utc::now(),
            source_file: source_file.into(),
            total_rows,
            batch_size,
            total_batches,
            current_batch: 0,
            imported: 0,
            duplicates: 0,
            errors: 0,
            last_successful_url: None,
            processed_urls: BTreeSet::new(),
        }
    }

    /// Whether every batch has been processed
    pub fn is_complete(&self) -> bool {
        self.current_batch >= self.total_batches
    }

    /// Check that this checkpoint can resume a run over `source_file`
    /// with `total_rows` rows in batches of `batch_size`; the error is a
    /// diagnostic for the operator
    pub fn is_valid_for(
        &self,
        source_file: &str,
        total_rows: usize,
        batch_size: usize,
    ) -> Result<(), String> {
        if self.source_file != source_file {
            return Err(format!(
                "checkpoint is for '{}', not '{}'",
                self.source_file, source_file
            ));
        }
        if self.total_rows != total_rows {
            return Err(format!(
                "checkpoint expects {} rows but the file has {}",
                self.total_rows, total_rows
            ));
        }
        if self.batch_size != batch_size {
            return Err(format!(
                "checkpoint was written with batch size {} but this run uses {}",
                self.batch_size, batch_size
            ));
        }
        if self.is_complete() {
            return Err(format!(
                "checkpoint already reports all {} batches complete",
                self.total_batches
            ));
        }
        Ok(())
    }

    /// Whether a row with this URL was already handled
    pub fn is_processed(&self, url: &str) -> bool {
        self.processed_urls.contains(url)
    }

    /// Rows accounted for so far
    pub fn rows_processed(&self) -> usize {
        self.imported + self.duplicates + self.errors
    }

    /// Share of rows processed, 0 to 100
    pub fn progress_percent(&self) -> f64 {
        if self.total_rows == 0 {
            return 100.0;
        }
        self.rows_processed() as f64 * 100.0 / self.total_rows as f64
    }

    /// Fold a batch's counts and URLs into the running totals
    pub fn record(&mut self, result: &BatchResult) {
        self.imported += result.imported;
        self.duplicates += result.duplicates;
        self.errors += result.errors;
        self.processed_urls
            .extend(result.processed_urls.iter().cloned());
        if result.last_successful_url.is_some() {
            self.last_successful_url = result.last_successful_url.clone();
        }
        self.timestamp = Utc::now();
    }

    /// Mark the next batch as done
    pub fn complete_batch(&mut self) {
        self.current_batch = (self.current_batch + 1).min(self.total_batches);
        self.timestamp = Utc::now();
    }
}

/// One failed row, as written to the error log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// Spreadsheet row number, the header being row 1
    pub row: usize,
    pub url: String,
    pub message: String,
    pub mk_id: Option<String>,
    pub content: Option<String>,
    pub platform: Option<String>,
    pub date: Option<String>,
}

/// Outcome of one batch; folded into the checkpoint and discarded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// 1-based batch number
    pub batch_number: usize,
    pub imported: usize,
    pub duplicates: usize,
    pub errors: usize,
    pub processed_urls: Vec<String>,
    pub last_successful_url: Option<String>,
    pub row_errors: Vec<RowError>,
}

impl BatchResult {
    /// Create an empty result for a batch
    pub fn new(batch_number: usize) -> Self {
        Self {
            batch_number,
            ..Self::default()
        }
    }

    pub fn record_imported(&mut self, url: &str) {
        self.imported += 1;
        self.last_successful_url = Some(url.to_string());
        self.processed_urls.push(url.to_string());
    }

    pub fn record_duplicate(&mut self, url: &str) {
        self.duplicates += 1;
        self.processed_urls.push(url.to_string());
    }

    /// Count a failed row; rows without a URL cannot be marked processed
    pub fn record_error(&mut self, error: RowError) {
        self.errors += 1;
        if !error.url.is_empty() {
            self.processed_urls.push(error.url.clone());
        }
        self.row_errors.push(error);
    }

    /// Rows handled in this batch
    pub fn rows(&self) -> usize {
        self.imported + self.duplicates + self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }
}
