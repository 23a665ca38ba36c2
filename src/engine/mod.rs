//! Import engine module
//!
//! Batch orchestration with checkpointing.
//!
//! # Overview
//!
//! The engine module provides:
//! - `ImportEngine` - slices rows into batches, validates and submits each
//!   row, saves a checkpoint after every batch, and resumes from one
//! - `ImportConfig` - batch size, resume and pacing settings
//! - `ErrorLog` - append-only record of failed rows
//! - `ImportReport` - final statistics
//!
//! A run ends `Completed` (checkpoint deleted), `Interrupted` (checkpoint
//! saved), or with an `Err` (checkpoint left as it was last saved).

mod error_log;
mod types;

pub use error_log::ErrorLog;
pub use types::{
    batch_count, format_duration, ImportConfig, ImportReport, ResumePrompt, RunOutcome,
    ShutdownFlag, DEFAULT_ERROR_LOG_PATH,
};

use crate::error::{Error, Result};
use crate::http::{OutcomeKind, SubmitClient};
use crate::normalize::NormalizedRecord;
use crate::state::{BatchResult, Checkpoint, CheckpointStore, RowError};
use crate::types::Field;
use crate::validate::{row_number, Validator};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Import engine for pushing normalized rows to the API
pub struct ImportEngine {
    client: SubmitClient,
    store: CheckpointStore,
    validator: Validator,
    config: ImportConfig,
    shutdown: ShutdownFlag,
}

/// Where a run starts
struct StartPoint {
    checkpoint: Checkpoint,
    /// URLs handled before this run; rows carrying one are skipped
    already_processed: BTreeSet<String>,
    resumed_from: Option<usize>,
}

impl ImportEngine {
    /// Create a new import engine
    pub fn new(client: SubmitClient, store: CheckpointStore, validator: Validator) -> Self {
        Self {
            client,
            store,
            validator,
            config: ImportConfig::default(),
            shutdown: ShutdownFlag::default(),
        }
    }

    /// Set import configuration
    #[must_use]
    pub fn with_config(mut self, config: ImportConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a shutdown flag with a signal handler
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: ShutdownFlag) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Get the checkpoint store
    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Get the shutdown flag
    pub fn shutdown_flag(&self) -> &ShutdownFlag {
        &self.shutdown
    }

    /// Import `rows` read from `source_file`
    pub async fn run(
        &self,
        source_file: &str,
        rows: &[NormalizedRecord],
        prompt: &dyn ResumePrompt,
    ) -> Result<ImportReport> {
        let batch_size = self.config.batch_size;
        if batch_size == 0 {
            return Err(Error::invalid_value("batch_size", "must be at least 1"));
        }

        let total_rows = rows.len();
        let total_batches = batch_count(total_rows, batch_size);
        let start = self
            .resolve_start(source_file, total_rows, batch_size, prompt)
            .await?;
        let StartPoint {
            mut checkpoint,
            already_processed,
            resumed_from,
        } = start;

        if !self.validator.checks_entities() {
            warn!("No entity snapshot loaded; mkId existence and eligibility are not checked");
        }

        info!(
            source = source_file,
            rows = total_rows,
            batches = total_batches,
            batch_size,
            "Starting import"
        );

        let error_log = ErrorLog::new(&self.config.error_log_path);
        let started = Instant::now();
        let mut processed_this_run = 0;
        let mut skipped = 0;

        for batch_index in checkpoint.current_batch..total_batches {
            let first = batch_index * batch_size;
            let last = (first + batch_size).min(total_rows);
            let mut result = BatchResult::new(batch_index + 1);

            debug!("Processing batch {}/{}", batch_index + 1, total_batches);

            for (index, record) in rows.iter().enumerate().take(last).skip(first) {
                if self.shutdown.is_requested() {
                    warn!("Shutdown requested, saving checkpoint");
                    checkpoint.record(&result);
                    self.store.save(&checkpoint).await?;
                    self.log_errors(&error_log, &result).await;

                    return Ok(self.report(
                        RunOutcome::Interrupted,
                        &checkpoint,
                        resumed_from,
                        skipped,
                        processed_this_run + result.rows(),
                        started.elapsed(),
                    ));
                }

                let url = record.get(Field::SourceUrl).unwrap_or_default();
                if !url.is_empty() && already_processed.contains(url) {
                    skipped += 1;
                    continue;
                }

                self.process_row(record, row_number(index), &mut result)
                    .await;
            }

            processed_this_run += result.rows();
            self.log_errors(&error_log, &result).await;
            checkpoint.record(&result);
            checkpoint.complete_batch();
            self.store.save(&checkpoint).await?;

            self.log_progress(&checkpoint, &result, started.elapsed(), processed_this_run);

            if checkpoint.current_batch < total_batches && !result.is_empty() {
                self.pause_if_quota_low().await;
            }
        }

        if self.store.delete().await? {
            debug!("Checkpoint removed after completed import");
        }

        let report = self.report(
            RunOutcome::Completed,
            &checkpoint,
            resumed_from,
            skipped,
            processed_this_run,
            started.elapsed(),
        );
        info!(
            imported = report.imported,
            duplicates = report.duplicates,
            errors = report.errors,
            "Import complete"
        );
        Ok(report)
    }

    /// Pick up a valid checkpoint if asked to, otherwise start fresh
    async fn resolve_start(
        &self,
        source_file: &str,
        total_rows: usize,
        batch_size: usize,
        prompt: &dyn ResumePrompt,
    ) -> Result<StartPoint> {
        if self.config.resume {
            match self.store.load().await {
                Ok(Some(checkpoint)) => match checkpoint
                    .is_valid_for(source_file, total_rows, batch_size)
                {
                    Ok(()) if prompt.should_resume(&checkpoint) => {
                        info!(
                            "Resuming at batch {}/{} ({} rows already processed)",
                            checkpoint.current_batch + 1,
                            checkpoint.total_batches,
                            checkpoint.rows_processed()
                        );
                        return Ok(StartPoint {
                            already_processed: checkpoint.processed_urls.clone(),
                            resumed_from: Some(checkpoint.current_batch + 1),
                            checkpoint,
                        });
                    }
                    Ok(()) => info!("Resume declined, starting a fresh import"),
                    Err(reason) => warn!("Cannot resume: {reason}; starting a fresh import"),
                },
                Ok(None) => info!("No checkpoint found, starting a fresh import"),
                Err(e) => warn!("Ignoring unreadable checkpoint: {e}"),
            }
        }

        if self.store.delete().await? {
            info!("Discarded stale checkpoint {}", self.store.path().display());
        }

        let checkpoint = Checkpoint::new(source_file, total_rows, batch_size);
        self.store.save(&checkpoint).await?;

        Ok(StartPoint {
            checkpoint,
            already_processed: BTreeSet::new(),
            resumed_from: None,
        })
    }

    /// Validate and submit one row, recording the outcome
    async fn process_row(&self, record: &NormalizedRecord, row: usize, result: &mut BatchResult) {
        let url = record.get(Field::SourceUrl).unwrap_or_default();
        let validation = self.validator.validate(record, row);

        let comment = match validation.comment {
            Some(ref comment) if validation.is_valid() => comment,
            _ => {
                debug!(row, "Row failed validation: {}", validation.error_summary());
                result.record_error(row_error(
                    record,
                    row,
                    format!("Validation failed: {}", validation.error_summary()),
                ));
                return;
            }
        };

        let outcome = self.client.submit(comment).await;
        match outcome.kind() {
            OutcomeKind::Imported => {
                debug!(row, url, attempts = outcome.attempts, "Imported");
                result.record_imported(url);
            }
            OutcomeKind::Duplicate => {
                debug!(row, url, "Duplicate");
                result.record_duplicate(url);
            }
            OutcomeKind::Failed => {
                let message = outcome
                    .error
                    .unwrap_or_else(|| "Unknown submission error".to_string());
                warn!(row, url, "Submission failed: {message}");
                result.record_error(row_error(record, row, message));
            }
        }
    }

    async fn log_errors(&self, error_log: &ErrorLog, result: &BatchResult) {
        if let Err(e) = error_log.append(result).await {
            warn!(
                "Failed to write error log {}: {e}",
                error_log.path().display()
            );
        }
    }

    fn log_progress(
        &self,
        checkpoint: &Checkpoint,
        result: &BatchResult,
        elapsed: Duration,
        processed_this_run: usize,
    ) {
        let remaining_rows = checkpoint
            .total_rows
            .saturating_sub(checkpoint.rows_processed());
        let eta = if processed_this_run > 0 {
            elapsed.mul_f64(remaining_rows as f64 / processed_this_run as f64)
        } else {
            Duration::ZERO
        };

        info!(
            batch = checkpoint.current_batch,
            batches = checkpoint.total_batches,
            imported = result.imported,
            duplicates = result.duplicates,
            errors = result.errors,
            "Batch {}/{} done, {:.1}% complete, ETA {}",
            checkpoint.current_batch,
            checkpoint.total_batches,
            checkpoint.progress_percent(),
            format_duration(eta)
        );
    }

    /// Probe the quota and sleep until reset when it runs low
    async fn pause_if_quota_low(&self) {
        let info = match self.client.probe_rate_limit().await {
            Ok(Some(info)) => info,
            Ok(None) => return,
            Err(e) => {
                warn!("Rate limit probe failed: {e}");
                return;
            }
        };

        if !info.is_low(self.config.low_water_mark) {
            debug!("Rate limit: {info}");
            return;
        }

        let clock = self.client.clock();
        if let Some(wait) = info.wait_until_reset(clock.now()) {
            let wait = wait.min(self.config.max_rate_limit_wait);
            warn!(
                "Rate limit low ({info}), pausing {} before next batch",
                format_duration(wait)
            );
            clock.sleep(wait).await;
        }
    }

    fn report(
        &self,
        outcome: RunOutcome,
        checkpoint: &Checkpoint,
        resumed_from: Option<usize>,
        skipped: usize,
        processed_this_run: usize,
        elapsed: Duration,
    ) -> ImportReport {
        ImportReport {
            outcome,
            source_file: checkpoint.source_file.clone(),
            total_rows: checkpoint.total_rows,
            total_batches: checkpoint.total_batches,
            batches_completed: checkpoint.current_batch,
            resumed_from,
            imported: checkpoint.imported,
            duplicates: checkpoint.duplicates,
            errors: checkpoint.errors,
            skipped,
            processed_this_run,
            elapsed,
        }
    }
}

impl std::fmt::Debug for ImportEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportEngine")
            .field("client", &self.client)
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn row_error(record: &NormalizedRecord, row: usize, message: String) -> RowError {
    let field = |f: Field| record.get(f).map(ToString::to_string);
    RowError {
        row,
        url: record.get(Field::SourceUrl).unwrap_or_default().to_string(),
        message,
        mk_id: field(Field::MkId),
        content: field(Field::Content),
        platform: field(Field::SourcePlatform),
        date: field(Field::CommentDate),
    }
}

#[cfg(test)]
mod tests;
