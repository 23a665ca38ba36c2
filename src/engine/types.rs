//! Engine types
//!
//! Configuration, cancellation and reporting for the import engine.

use crate::state::Checkpoint;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default error log location
pub const DEFAULT_ERROR_LOG_PATH: &str = "import-errors.log";

/// Configuration for an import run
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Rows per batch; the checkpoint is saved after each one
    pub batch_size: usize,
    /// Offer to resume from an existing checkpoint
    pub resume: bool,
    /// Pause between batches when the server reports fewer remaining requests
    pub low_water_mark: u64,
    /// Upper bound for one proactive pause
    pub max_rate_limit_wait: Duration,
    pub error_log_path: PathBuf,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            resume: false,
            low_water_mark: 100,
            max_rate_limit_wait: Duration::from_secs(3600),
            error_log_path: PathBuf::from(DEFAULT_ERROR_LOG_PATH),
        }
    }
}

impl ImportConfig {
    /// Create a new import config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set batch size
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Offer to resume from a checkpoint
    #[must_use]
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Set the low-water mark for proactive pauses
    #[must_use]
    pub fn with_low_water_mark(mut self, remaining: u64) -> Self {
        self.low_water_mark = remaining;
        self
    }

    /// Cap a proactive pause
    #[must_use]
    pub fn with_max_rate_limit_wait(mut self, wait: Duration) -> Self {
        self.max_rate_limit_wait = wait;
        self
    }

    /// Set the error log path
    #[must_use]
    pub fn with_error_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.error_log_path = path.into();
        self
    }
}

/// Number of batches needed for `total_rows`
pub fn batch_count(total_rows: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    total_rows.div_ceil(batch_size)
}

/// Cooperative cancellation, checked between rows
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running import to stop after the current row
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Decides whether an existing valid checkpoint is resumed
pub trait ResumePrompt {
    fn should_resume(&self, checkpoint: &Checkpoint) -> bool;
}

impl<F> ResumePrompt for F
where
    F: Fn(&Checkpoint) -> bool,
{
    fn should_resume(&self, checkpoint: &Checkpoint) -> bool {
        self(checkpoint)
    }
}

/// How an import run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every batch processed; checkpoint deleted
    Completed,
    /// Stopped by a shutdown request; checkpoint saved
    Interrupted,
}

/// Final statistics of an import run
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub outcome: RunOutcome,
    pub source_file: String,
    pub total_rows: usize,
    pub total_batches: usize,
    /// Batches fully processed, including those from before a resume
    pub batches_completed: usize,
    /// Batch this run resumed at (1-based), if it resumed
    pub resumed_from: Option<usize>,
    pub imported: usize,
    pub duplicates: usize,
    pub errors: usize,
    /// Rows skipped because a resumed checkpoint had already processed them
    pub skipped: usize,
    /// Rows handled by this run
    pub processed_this_run: usize,
    pub elapsed: Duration,
}

impl ImportReport {
    pub fn is_complete(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    /// Rows per second handled by this run
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.processed_this_run as f64 / secs
    }

    /// Human-readable final report
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let status = match self.outcome {
            RunOutcome::Completed => "complete",
            RunOutcome::Interrupted => "interrupted",
        };

        let _ = writeln!(out, "Import {status}: {}", self.source_file);
        if let Some(batch) = self.resumed_from {
            let _ = writeln!(out, "  Resumed at batch {batch}");
        }
        let _ = writeln!(
            out,
            "  Batches:    {}/{}",
            self.batches_completed, self.total_batches
        );
        let _ = writeln!(out, "  Rows:       {}", self.total_rows);
        let _ = writeln!(out, "  Imported:   {}", self.imported);
        let _ = writeln!(out, "  Duplicates: {}", self.duplicates);
        let _ = writeln!(out, "  Errors:     {}", self.errors);
        if self.skipped > 0 {
            let _ = writeln!(out, "  Skipped:    {} (already processed)", self.skipped);
        }
        let _ = writeln!(
            out,
            "  Elapsed:    {}",
            format_duration(self.elapsed)
        );
        let _ = writeln!(out, "  Throughput: {:.2} rows/s", self.throughput());

        if self.outcome == RunOutcome::Interrupted {
            let _ = writeln!(out, "\nProgress saved. Re-run with --resume to continue.");
        }
        out
    }
}

/// Format a duration as `1h 02m 03s`, `2m 03s` or `3s`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}
