//! Whole-file validation report
//!
//! Machine-readable JSON for the correction workflow, plus a console summary
//! with error types sorted by frequency.

use super::types::{RowValidation, ValidationError, ValidationWarning};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::hash::Hash;
use std::path::Path;

/// Occurrences of one finding type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub kind: String,
    pub count: usize,
}

/// Aggregated validation results for one input file
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub generated_at: DateTime<Utc>,
    pub source_file: String,
    pub total_rows: usize,
    pub valid_rows: usize,
    pub invalid_rows: usize,
    pub error_count: usize,
    pub warning_count: usize,
    /// Error types, most frequent first
    pub errors_by_type: Vec<TypeCount>,
    /// Warning types, most frequent first
    pub warnings_by_type: Vec<TypeCount>,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    /// Build a report from per-row results
    pub fn from_rows(source_file: impl Into<String>, rows: &[RowValidation]) -> Self {
        let errors: Vec<ValidationError> = rows.iter().flat_map(|r| r.errors.clone()).collect();
        let warnings: Vec<ValidationWarning> =
            rows.iter().flat_map(|r| r.warnings.clone()).collect();
        let invalid_rows = rows.iter().filter(|r| !r.is_valid()).count();

        Self {
            generated_at: Utc::now(),
            source_file: source_file.into(),
            total_rows: rows.len(),
            valid_rows: rows.len() - invalid_rows,
            invalid_rows,
            error_count: errors.len(),
            warning_count: warnings.len(),
            errors_by_type: count_by_type(errors.iter().map(|e| e.kind)),
            warnings_by_type: count_by_type(warnings.iter().map(|w| w.kind)),
            errors,
            warnings,
        }
    }

    /// Whether any row has at least one error
    pub fn has_errors(&self) -> bool {
        self.invalid_rows > 0
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Human-readable console summary
    pub fn summary(&self, max_examples: usize) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "Validation report for {}", self.source_file);
        let _ = writeln!(
            out,
            "  Rows: {} total, {} valid, {} with errors",
            self.total_rows, self.valid_rows, self.invalid_rows
        );
        let _ = writeln!(
            out,
            "  Findings: {} errors, {} warnings",
            self.error_count, self.warning_count
        );

        if !self.errors_by_type.is_empty() {
            let _ = writeln!(out, "\nErrors by type:");
            for tc in &self.errors_by_type {
                let _ = writeln!(out, "  {:<22} {}", tc.kind, tc.count);
            }
        }

        if !self.warnings_by_type.is_empty() {
            let _ = writeln!(out, "\nWarnings by type:");
            for tc in &self.warnings_by_type {
                let _ = writeln!(out, "  {:<22} {}", tc.kind, tc.count);
            }
        }

        if !self.errors.is_empty() && max_examples > 0 {
            let _ = writeln!(out, "\nFirst errors:");
            for e in self.errors.iter().take(max_examples) {
                let _ = writeln!(out, "  row {:>5}  {:<18} {}: {}", e.row, e.kind, e.field, e.message);
            }
            if self.errors.len() > max_examples {
                let _ = writeln!(out, "  ... and {} more", self.errors.len() - max_examples);
            }
        }

        out
    }
}

/// Count occurrences, most frequent first, ties broken by type name
fn count_by_type<K>(kinds: impl Iterator<Item = K>) -> Vec<TypeCount>
where
    K: Eq + Hash + std::fmt::Display,
{
    let mut counts: HashMap<K, usize> = HashMap::new();
    for kind in kinds {
        *counts.entry(kind).or_default() += 1;
    }

    let mut sorted: Vec<TypeCount> = counts
        .into_iter()
        .map(|(kind, count)| TypeCount {
            kind: kind.to_string(),
            count,
        })
        .collect();
    sorted.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.kind.cmp(&b.kind)));
    sorted
}
