//! Append-only log of failed rows
//!
//! One timestamped section per batch with at least one failure, so an
//! operator can fix the rows and feed them back through `validate`.

use crate::error::Result;
use crate::state::{BatchResult, RowError};
use chrono::{SecondsFormat, Utc};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const CONTENT_EXCERPT_CHARS: usize = 100;

/// Writer for the import error log
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the failures of one batch; batches without failures write nothing
    pub async fn append(&self, result: &BatchResult) -> Result<()> {
        if result.row_errors.is_empty() {
            return Ok(());
        }

        let section = format_section(result);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(section.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

fn format_section(result: &BatchResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "=== Batch {} @ {} ({} failed) ===",
        result.batch_number,
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        result.row_errors.len()
    );
    for error in &result.row_errors {
        write_entry(&mut out, error);
    }
    out.push('\n');
    out
}

fn write_entry(out: &mut String, error: &RowError) {
    let url = if error.url.is_empty() { "(no url)" } else { &error.url };
    let _ = writeln!(out, "Row {}: {}", error.row, url);
    let _ = writeln!(out, "  Error:    {}", error.message);
    let _ = writeln!(out, "  MK:       {}", error.mk_id.as_deref().unwrap_or("-"));
    let _ = writeln!(
        out,
        "  Content:  {}",
        error.content.as_deref().map_or_else(|| "-".to_string(), excerpt)
    );
    let _ = writeln!(out, "  Platform: {}", error.platform.as_deref().unwrap_or("-"));
    let _ = writeln!(out, "  Date:     {}", error.date.as_deref().unwrap_or("-"));
}

fn excerpt(content: &str) -> String {
    if content.chars().count() <= CONTENT_EXCERPT_CHARS {
        content.to_string()
    } else {
        let cut: String = content.chars().take(CONTENT_EXCERPT_CHARS).collect();
        format!("{cut}...")
    }
}
