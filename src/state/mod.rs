//! Checkpoint module
//!
//! Tracks import progress so an interrupted run can resume without
//! resubmitting rows.
//!
//! # Overview
//!
//! - `Checkpoint` - progress record: batch counter, totals, processed URLs
//! - `BatchResult` - per-batch outcome folded into the checkpoint
//! - `CheckpointStore` - file-based persistence with atomic writes

mod manager;
mod types;

pub use manager::{CheckpointStore, DEFAULT_CHECKPOINT_PATH};
pub use types::{BatchResult, Checkpoint, RowError};

#[cfg(test)]
mod manager_tests;
