//! Field normalization
//!
//! Every cleaner here is total: it returns a best-effort value and never an
//! error.

use super::aliases::{is_canonical_column, resolve_field, resolve_platform, resolve_source_type};
use crate::types::{Field, RawRecord, SourceType};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use url::Url;

/// Strict ISO-8601 timestamp: date, `T`, time with seconds, optional fraction and zone
static ISO_8601: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d{1,9})?(Z|[+-]\d{2}:\d{2})?$").unwrap()
});

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

static HTML_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap());

/// Date-time layouts tried after RFC 3339 / RFC 2822, day-first as in the source data
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d.%m.%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%d-%m-%Y",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

// ============================================================================
// Normalized Record
// ============================================================================

/// A partial comment row after alias resolution.
///
/// Every canonical field is optional text; typing happens in the validator.
/// Columns that did not resolve to a canonical field are kept in `extra` and
/// never reach the submission body or the canonical CSV.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedRecord {
    pub mk_id: Option<String>,
    pub content: Option<String>,
    pub source_url: Option<String>,
    pub source_platform: Option<String>,
    pub source_type: Option<String>,
    pub comment_date: Option<String>,
    pub source_name: Option<String>,
    pub source_credibility: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub additional_context: Option<String>,
    /// Unrecognized columns, passed through unchanged
    pub extra: RawRecord,
}

impl NormalizedRecord {
    /// Get a canonical field value
    pub fn get(&self, field: Field) -> Option<&str> {
        self.slot(field).as_deref()
    }

    /// Set a canonical field value; empty strings clear the field
    pub fn set(&mut self, field: Field, value: Option<String>) {
        *self.slot_mut(field) = value.filter(|v| !v.trim().is_empty());
    }

    /// Builder-style setter, mostly for tests and fixtures
    #[must_use]
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, Some(value.into()));
        self
    }

    fn slot(&self, field: Field) -> &Option<String> {
        match field {
            Field::MkId => &self.mk_id,
            Field::Content => &self.content,
            Field::SourceUrl => &self.source_url,
            Field::SourcePlatform => &self.source_platform,
            Field::SourceType => &self.source_type,
            Field::CommentDate => &self.comment_date,
            Field::SourceName => &self.source_name,
            Field::SourceCredibility => &self.source_credibility,
            Field::ImageUrl => &self.image_url,
            Field::VideoUrl => &self.video_url,
            Field::AdditionalContext => &self.additional_context,
        }
    }

    fn slot_mut(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::MkId => &mut self.mk_id,
            Field::Content => &mut self.content,
            Field::SourceUrl => &mut self.source_url,
            Field::SourcePlatform => &mut self.source_platform,
            Field::SourceType => &mut self.source_type,
            Field::CommentDate => &mut self.comment_date,
            Field::SourceName => &mut self.source_name,
            Field::SourceCredibility => &mut self.source_credibility,
            Field::ImageUrl => &mut self.image_url,
            Field::VideoUrl => &mut self.video_url,
            Field::AdditionalContext => &mut self.additional_context,
        }
    }
}

// ============================================================================
// Record Normalization
// ============================================================================

/// Normalize one raw record.
///
/// When two columns map to the same field, a column spelling the canonical
/// name wins over any alias; among aliases the first non-empty one (in column
/// name order) wins. The losing column is kept in `extra`.
pub fn normalize_record(raw: &RawRecord) -> NormalizedRecord {
    let mut record = NormalizedRecord::default();

    let (canonical, aliased): (Vec<_>, Vec<_>) =
        raw.iter().partition(|(column, _)| is_canonical_column(column));

    for (column, value) in canonical.into_iter().chain(aliased) {
        match resolve_field(column) {
            Some(field) if record.get(field).is_none() && !value.trim().is_empty() => {
                record.set(field, Some(normalize_field(field, value)));
            }
            Some(_) if value.trim().is_empty() => {}
            _ => {
                record.extra.insert(column.clone(), value.clone());
            }
        }
    }

    // Credibility is dropped rather than coerced
    record.source_credibility = record
        .source_credibility
        .as_deref()
        .and_then(normalize_credibility);

    if record.source_type.is_none() {
        record.source_type = Some(SourceType::default().to_string());
    }

    record
}

/// Normalize a batch of raw records
pub fn normalize_records(raw: &[RawRecord]) -> Vec<NormalizedRecord> {
    raw.iter().map(normalize_record).collect()
}

fn normalize_field(field: Field, value: &str) -> String {
    match field {
        Field::Content => clean_content(value),
        Field::SourceUrl | Field::ImageUrl | Field::VideoUrl => normalize_url(value),
        Field::SourcePlatform => normalize_platform(value),
        Field::SourceType => normalize_source_type(value),
        Field::CommentDate => normalize_date(value),
        _ => value.trim().to_string(),
    }
}

// ============================================================================
// Field Cleaners
// ============================================================================

/// Strip HTML tags, decode common entities and trim
pub fn clean_content(value: &str) -> String {
    let without_tags = HTML_TAG.replace_all(value, "");
    let decoded = HTML_ENTITY.replace_all(&without_tags, |caps: &Captures<'_>| {
        decode_entity(&caps[1]).map_or_else(|| caps[0].to_string(), |c| c.to_string())
    });
    decoded.trim().to_string()
}

fn decode_entity(entity: &str) -> Option<char> {
    if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(dec) = entity.strip_prefix('#') {
        return dec.parse().ok().and_then(char::from_u32);
    }

    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        "ndash" => Some('–'),
        "mdash" => Some('—'),
        "hellip" => Some('…'),
        "laquo" => Some('«'),
        "raquo" => Some('»'),
        _ => None,
    }
}

/// Parse a strict ISO-8601 timestamp into an instant.
///
/// Timestamps without a zone are taken as UTC.
pub fn parse_iso_instant(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let captures = ISO_8601.captures(value)?;

    if captures.get(2).is_some() {
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    } else {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive))
    }
}

/// Re-emit any recognizable date as ISO-8601; unparseable input is returned unchanged
pub fn normalize_date(value: &str) -> String {
    let trimmed = value.trim();
    if ISO_8601.is_match(trimmed) {
        return trimmed.to_string();
    }

    parse_loose_date(trimmed).map_or_else(
        || value.to_string(),
        |dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

fn parse_loose_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Add a missing `https://` scheme when that yields a valid absolute URL
pub fn normalize_url(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.contains("://") {
        return trimmed.to_string();
    }

    let candidate = format!("https://{}", trimmed.trim_start_matches('/'));
    match Url::parse(&candidate) {
        Ok(url) if url.host_str().is_some_and(|h| !h.is_empty()) => candidate,
        _ => trimmed.to_string(),
    }
}

/// Map a platform alias to its canonical name; unknown values pass through trimmed
pub fn normalize_platform(value: &str) -> String {
    resolve_platform(value).map_or_else(|| value.trim().to_string(), |p| p.to_string())
}

/// Map a source type alias to its canonical name; unknown values pass through trimmed
pub fn normalize_source_type(value: &str) -> String {
    resolve_source_type(value).map_or_else(|| value.trim().to_string(), |t| t.to_string())
}

/// Parse a credibility score; anything that is not an integer in `[1, 10]` is dropped
pub fn normalize_credibility(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let score = trimmed.parse::<i64>().ok().or_else(|| {
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })?;

    (1..=10).contains(&score).then(|| score.to_string())
}
