//! Decoder implementations
//!
//! Each decoder handles a specific input format.

use super::types::RecordDecoder;
use crate::error::{Error, Result};
use crate::types::RawRecord;
use serde_json::Value;

const BOM: char = '\u{feff}';

// ============================================================================
// CSV / TSV Decoder
// ============================================================================

/// Delimited-text decoder. A header row is always required.
#[derive(Debug, Clone)]
pub struct CsvDecoder {
    /// Field delimiter
    delimiter: u8,
}

impl Default for CsvDecoder {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvDecoder {
    /// Create a comma-separated decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tab-separated decoder
    pub fn tsv() -> Self {
        Self { delimiter: b'\t' }
    }
}

impl RecordDecoder for CsvDecoder {
    fn decode(&self, body: &str) -> Result<Vec<RawRecord>> {
        let body = body.strip_prefix(BOM).unwrap_or(body);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(body.as_bytes());

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches(BOM).trim().to_string())
            .collect();

        if headers.iter().all(String::is_empty) {
            return Err(Error::decode("Missing header row"));
        }

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;

            // Spreadsheets like to leave trailing blank lines behind
            if row.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }

            let record: RawRecord = headers
                .iter()
                .zip(row.iter())
                .filter(|(header, _)| !header.is_empty())
                .map(|(header, cell)| (header.clone(), cell.to_string()))
                .collect();

            records.push(record);
        }

        Ok(records)
    }
}

// ============================================================================
// JSON Decoder
// ============================================================================

/// JSON decoder; the document must be an array of objects
#[derive(Debug, Clone, Default)]
pub struct JsonDecoder;

impl JsonDecoder {
    /// Create a new JSON decoder
    pub fn new() -> Self {
        Self
    }
}

impl RecordDecoder for JsonDecoder {
    fn decode(&self, body: &str) -> Result<Vec<RawRecord>> {
        let body = body.strip_prefix(BOM).unwrap_or(body);
        let value: Value = serde_json::from_str(body).map_err(|e| Error::Decode {
            message: format!("Failed to parse JSON: {e}"),
        })?;

        let Value::Array(items) = &value else {
            return Err(Error::decode("JSON input must be an array of objects"));
        };

        items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(map) => Ok(map
                    .iter()
                    .filter_map(|(key, v)| json_cell(v).map(|cell| (key.clone(), cell)))
                    .collect()),
                _ => Err(Error::decode(format!(
                    "JSON record {} is not an object",
                    index + 1
                ))),
            })
            .collect()
    }
}

/// Render a JSON value as cell text; nulls are treated as absent
fn json_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
