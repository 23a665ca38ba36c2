//! Decoder types and traits
//!
//! Defines the core decoder abstractions.

use super::decoders::{CsvDecoder, JsonDecoder};
use crate::error::{Error, Result};
use crate::types::RawRecord;
use std::path::Path;

/// Format of an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Comma-separated values
    Csv,
    /// Tab-separated values
    Tsv,
    /// JSON array of objects
    Json,
}

impl InputFormat {
    /// Detect the format from a file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("tsv" | "tab") => Ok(Self::Tsv),
            Some("json") => Ok(Self::Json),
            _ => Err(Error::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }
    }

    /// Build the decoder for this format
    pub fn decoder(self) -> Box<dyn RecordDecoder> {
        match self {
            Self::Csv => Box::new(CsvDecoder::new()),
            Self::Tsv => Box::new(CsvDecoder::tsv()),
            Self::Json => Box::new(JsonDecoder::new()),
        }
    }
}

/// Trait for turning a file body into raw records
pub trait RecordDecoder: Send + Sync {
    /// Decode the full body into records
    fn decode(&self, body: &str) -> Result<Vec<RawRecord>>;
}
