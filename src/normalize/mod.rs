//! Row normalization module
//!
//! Maps raw records with arbitrary column names onto the canonical comment
//! schema and cleans the values on the way through.
//!
//! # Overview
//!
//! - `aliases` - case-insensitive alias tables for column names, platforms
//!   and source types
//! - `normalizer` - per-field cleaners and [`normalize_record`]
//! - `writer` - the inverse direction: canonical CSV output and templates
//!
//! Normalization never fails. Values that cannot be cleaned pass through
//! unchanged so the validator stays the single source of truth on correctness.

mod aliases;
mod normalizer;
mod writer;

pub use aliases::{is_canonical_column, resolve_field, resolve_platform, resolve_source_type};
pub use normalizer::{
    clean_content, normalize_credibility, normalize_date, normalize_platform, normalize_record,
    normalize_records, normalize_source_type, normalize_url, parse_iso_instant, NormalizedRecord,
};
pub use writer::{to_csv_string, write_csv, write_template, CanonicalCsvWriter};
