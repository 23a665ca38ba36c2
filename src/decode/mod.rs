//! Input decoder module
//!
//! Supports: CSV, TSV, JSON
//!
//! # Overview
//!
//! The decode module turns an input file into raw records (column name to cell
//! text). Column names are left untouched here; alias resolution happens in the
//! normalizer. The format is chosen from the file extension.

mod decoders;
mod types;

pub use decoders::{CsvDecoder, JsonDecoder};
pub use types::{InputFormat, RecordDecoder};

use crate::error::{Error, Result};
use crate::types::RawRecord;
use std::path::Path;

/// Read every record from an input file, auto-detecting the format
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<RawRecord>> {
    let path = path.as_ref();
    let format = InputFormat::from_path(path)?;

    if !path.exists() {
        return Err(Error::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let body = std::fs::read_to_string(path)?;
    let records = format.decoder().decode(&body)?;

    tracing::debug!(
        path = %path.display(),
        format = ?format,
        records = records.len(),
        "Decoded input file"
    );

    Ok(records)
}
