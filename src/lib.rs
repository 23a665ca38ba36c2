// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # knesset-import
//!
//! Batch importer for historical comments by Knesset members: normalizes
//! third-party spreadsheets, validates them against business rules, and
//! pushes them through a rate-limited API with retries, duplicate detection
//! and crash-resumable checkpoints.
//!
//! ## Pipeline
//!
//! ```text
//! input file ──▶ decode ──▶ normalize ──▶ validate ──▶ engine ──▶ http
//!  csv/tsv/json   raw rows   canonical     findings     batches    POST
//!                            fields                        │
//!                                                          ▼
//!                                                     checkpoint
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use knesset_import::{
//!     decode::read_records, normalize::normalize_records, config::ImportSettings,
//!     engine::ImportEngine, http::SubmitClient, state::Checkpoint, Result,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut settings = ImportSettings::load(None)?;
//!     settings.apply_env();
//!
//!     let rows = normalize_records(&read_records("comments.csv")?);
//!     let engine = ImportEngine::new(
//!         SubmitClient::new(settings.client_config()?)?,
//!         settings.checkpoint_store(),
//!         settings.validator()?,
//!     )
//!     .with_config(settings.import_config(true));
//!
//!     let report = engine.run("comments.csv", &rows, &|_: &Checkpoint| true).await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_precision_loss)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the importer
pub mod error;

/// Canonical comment schema
pub mod types;

/// Input decoders (CSV, TSV, JSON)
pub mod decode;

/// Column aliasing, value cleaning and canonical CSV output
pub mod normalize;

/// Business rules and validation reports
pub mod validate;

/// Submission client with retry and rate limiting
pub mod http;

/// Checkpoint persistence
pub mod state;

/// Batch orchestration
pub mod engine;

/// Layered settings
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
