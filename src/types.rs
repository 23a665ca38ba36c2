//! Common types used throughout the importer
//!
//! The canonical comment schema: field names, the closed platform and
//! source-type enums, and the fully validated [`CommentRow`] that is the only
//! shape ever sent to the submission endpoint.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// One raw input record: column name to cell text, before alias resolution
pub type RawRecord = BTreeMap<String, String>;

// ============================================================================
// Canonical Fields
// ============================================================================

/// A field of the canonical comment schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    MkId,
    Content,
    SourceUrl,
    SourcePlatform,
    SourceType,
    CommentDate,
    SourceName,
    SourceCredibility,
    ImageUrl,
    VideoUrl,
    AdditionalContext,
}

impl Field {
    /// All canonical fields, in canonical CSV column order
    pub const ALL: [Field; 11] = [
        Field::MkId,
        Field::Content,
        Field::SourceUrl,
        Field::SourcePlatform,
        Field::SourceType,
        Field::CommentDate,
        Field::SourceName,
        Field::SourceCredibility,
        Field::ImageUrl,
        Field::VideoUrl,
        Field::AdditionalContext,
    ];

    /// Fields that must be present for a row to be submitted
    pub const REQUIRED: [Field; 6] = [
        Field::MkId,
        Field::Content,
        Field::SourceUrl,
        Field::SourcePlatform,
        Field::SourceType,
        Field::CommentDate,
    ];

    /// Canonical column name
    pub fn as_str(self) -> &'static str {
        match self {
            Field::MkId => "mkId",
            Field::Content => "content",
            Field::SourceUrl => "sourceUrl",
            Field::SourcePlatform => "sourcePlatform",
            Field::SourceType => "sourceType",
            Field::CommentDate => "commentDate",
            Field::SourceName => "sourceName",
            Field::SourceCredibility => "sourceCredibility",
            Field::ImageUrl => "imageUrl",
            Field::VideoUrl => "videoUrl",
            Field::AdditionalContext => "additionalContext",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Source Platform
// ============================================================================

/// Where a comment was published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourcePlatform {
    News,
    Twitter,
    Facebook,
    YouTube,
    Knesset,
    Interview,
    Other,
}

impl SourcePlatform {
    /// All platforms, in display order
    pub const ALL: [SourcePlatform; 7] = [
        SourcePlatform::News,
        SourcePlatform::Twitter,
        SourcePlatform::Facebook,
        SourcePlatform::YouTube,
        SourcePlatform::Knesset,
        SourcePlatform::Interview,
        SourcePlatform::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourcePlatform::News => "News",
            SourcePlatform::Twitter => "Twitter",
            SourcePlatform::Facebook => "Facebook",
            SourcePlatform::YouTube => "YouTube",
            SourcePlatform::Knesset => "Knesset",
            SourcePlatform::Interview => "Interview",
            SourcePlatform::Other => "Other",
        }
    }
}

impl fmt::Display for SourcePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Source Type
// ============================================================================

/// Whether the source quotes the member directly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SourceType {
    Primary,
    #[default]
    Secondary,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Primary => "Primary",
            SourceType::Secondary => "Secondary",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Comment Row
// ============================================================================

/// A fully validated comment, ready for submission.
///
/// Serializes to the JSON body the submission endpoint expects: numeric
/// fields as numbers, absent optional fields omitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRow {
    pub mk_id: u32,
    pub content: String,
    pub source_url: String,
    pub source_platform: SourcePlatform,
    pub source_type: SourceType,
    #[serde(serialize_with = "serialize_instant")]
    pub comment_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_credibility: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

fn serialize_instant<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_field_order_matches_canonical_columns() {
        let names: Vec<_> = Field::ALL.iter().map(|f| f.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "mkId",
                "content",
                "sourceUrl",
                "sourcePlatform",
                "sourceType",
                "commentDate",
                "sourceName",
                "sourceCredibility",
                "imageUrl",
                "videoUrl",
                "additionalContext"
            ]
        );
    }

    #[test]
    fn test_source_type_default() {
        assert_eq!(SourceType::default(), SourceType::Secondary);
    }

    #[test]
    fn test_comment_row_serialization_omits_absent_optionals() {
        let row = CommentRow {
            mk_id: 42,
            content: "חוק הגיוס הוא חוק חשוב".to_string(),
            source_url: "https://example.com/a".to_string(),
            source_platform: SourcePlatform::YouTube,
            source_type: SourceType::Primary,
            comment_date: Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
            source_name: None,
            source_credibility: Some(8),
            image_url: None,
            video_url: None,
            additional_context: None,
        };

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["mkId"], 42);
        assert_eq!(json["sourceCredibility"], 8);
        assert_eq!(json["sourcePlatform"], "YouTube");
        assert_eq!(json["sourceType"], "Primary");
        assert_eq!(json["commentDate"], "2024-01-15T10:00:00.000Z");
        assert!(json.get("sourceName").is_none());
        assert!(json.get("imageUrl").is_none());
    }
}
