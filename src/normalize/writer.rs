//! Canonical CSV writer
//!
//! Output is always UTF-8 with a BOM (so spreadsheets pick the right
//! encoding for Hebrew text), a header with all eleven canonical columns, and
//! an empty cell for every absent value. Files written here decode back
//! through [`crate::decode::CsvDecoder`] and the normalizer unchanged.

use super::normalizer::NormalizedRecord;
use crate::error::{Error, Result};
use crate::types::Field;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Streaming writer for canonical comment CSV
pub struct CanonicalCsvWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl<W: Write> CanonicalCsvWriter<W> {
    /// Write the BOM and header row, returning a writer ready for records
    pub fn new(mut sink: W) -> Result<Self> {
        sink.write_all(UTF8_BOM)?;

        let mut inner = csv::WriterBuilder::new().from_writer(sink);
        inner.write_record(Field::ALL.iter().map(|f| f.as_str()))?;

        Ok(Self { inner })
    }

    /// Write one record in canonical column order
    pub fn write(&mut self, record: &NormalizedRecord) -> Result<()> {
        self.inner
            .write_record(Field::ALL.iter().map(|f| record.get(*f).unwrap_or("")))?;
        Ok(())
    }

    /// Flush and return the underlying sink
    pub fn finish(self) -> Result<W> {
        self.inner
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))
    }
}

/// Write records to a canonical CSV file
pub fn write_csv(path: impl AsRef<Path>, records: &[NormalizedRecord]) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = CanonicalCsvWriter::new(BufWriter::new(file))?;
    for record in records {
        writer.write(record)?;
    }
    writer.finish()?.flush()?;
    Ok(())
}

/// Render records as a canonical CSV string (BOM included)
pub fn to_csv_string(records: &[NormalizedRecord]) -> Result<String> {
    let mut writer = CanonicalCsvWriter::new(Vec::new())?;
    for record in records {
        writer.write(record)?;
    }
    let bytes = writer.finish()?;
    String::from_utf8(bytes).map_err(|e| Error::decode(format!("Invalid UTF-8 in CSV output: {e}")))
}

/// Write an empty import template: the header plus one example row
pub fn write_template(path: impl AsRef<Path>) -> Result<()> {
    write_csv(path, &[example_record()])
}

fn example_record() -> NormalizedRecord {
    NormalizedRecord::default()
        .with(Field::MkId, "1")
        .with(Field::Content, "חוק הגיוס הוא חוק חשוב לשוויון בנטל")
        .with(Field::SourceUrl, "https://www.example.com/news/article-1")
        .with(Field::SourcePlatform, "News")
        .with(Field::SourceType, "Primary")
        .with(Field::CommentDate, "2024-01-15T10:00:00.000Z")
        .with(Field::SourceName, "Example News")
        .with(Field::SourceCredibility, "8")
}
