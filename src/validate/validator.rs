//! Validation rules
//!
//! Rules run in a fixed order. A row missing any required field gets one
//! `MISSING_FIELD` error per missing field and nothing else.

use super::entities::EntityCache;
use super::types::{ErrorType, RowValidation, ValidationError, ValidationWarning, WarningType};
use crate::normalize::{parse_iso_instant, resolve_platform, resolve_source_type, NormalizedRecord};
use crate::types::{CommentRow, Field};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// Topical keywords; a comment must mention at least one to be relevant
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "גיוס",
    "שוויון בנטל",
    "חרדים",
    "חרדי",
    "ישיבות",
    "ישיבה",
    "צה\"ל",
    "צבא",
    "שירות צבאי",
    "שירות לאומי",
    "פטור",
    "draft",
    "conscription",
    "enlistment",
    "haredi",
    "yeshiva",
    "idf",
    "military service",
    "exemption",
];

/// Row number for the record at `index`, counting the header as row 1
pub fn row_number(index: usize) -> usize {
    index + 2
}

/// Tunable rule parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub min_content_length: usize,
    pub max_content_length: usize,
    pub max_url_length: usize,
    pub max_source_name_length: usize,
    /// Credibility below this is flagged as a warning
    pub low_credibility_threshold: u8,
    pub keywords: Vec<String>,
    /// Entity categories allowed to have comments imported
    pub eligible_categories: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_content_length: 10,
            max_content_length: 5000,
            max_url_length: 2000,
            max_source_name_length: 200,
            low_credibility_threshold: 5,
            keywords: DEFAULT_KEYWORDS.iter().map(ToString::to_string).collect(),
            eligible_categories: vec!["coalition".to_string()],
        }
    }
}

/// Row validator
#[derive(Debug, Clone)]
pub struct Validator {
    config: ValidatorConfig,
    /// `None` skips the referential checks (existence and eligibility)
    entities: Option<EntityCache>,
    keywords: Vec<String>,
}

impl Validator {
    /// Create a validator with full referential checks
    pub fn new(config: ValidatorConfig, entities: EntityCache) -> Self {
        Self::build(config, Some(entities))
    }

    /// Create a validator that only checks structure and format
    pub fn structural(config: ValidatorConfig) -> Self {
        Self::build(config, None)
    }

    fn build(config: ValidatorConfig, entities: Option<EntityCache>) -> Self {
        let keywords = config.keywords.iter().map(|k| k.to_lowercase()).collect();
        Self {
            config,
            entities,
            keywords,
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Whether existence/eligibility of `mkId` is checked
    pub fn checks_entities(&self) -> bool {
        self.entities.is_some()
    }

    /// Validate one row
    pub fn validate(&self, record: &NormalizedRecord, row: usize) -> RowValidation {
        let mut result = RowValidation {
            row,
            ..RowValidation::default()
        };

        // Rule 1: required fields, short-circuit
        for field in Field::REQUIRED {
            if record.get(field).is_none() {
                result.errors.push(ValidationError::new(
                    row,
                    ErrorType::MissingField,
                    field.as_str(),
                    format!("Missing required field '{field}'"),
                    None,
                ));
            }
        }
        if !result.errors.is_empty() {
            return result;
        }

        let mk_id = self.check_mk_id(record, row, &mut result);
        let content = self.check_content(record, row, &mut result);
        let source_url = self.check_source_url(record, row, &mut result);

        let raw_platform = record.source_platform.as_deref().unwrap_or_default();
        let platform = resolve_platform(raw_platform);
        if platform.is_none() {
            result.errors.push(ValidationError::new(
                row,
                ErrorType::InvalidPlatform,
                Field::SourcePlatform.as_str(),
                "Platform must be one of News, Twitter, Facebook, YouTube, Knesset, Interview, Other",
                Some(raw_platform),
            ));
        }

        let raw_type = record.source_type.as_deref().unwrap_or_default();
        let source_type = resolve_source_type(raw_type);
        if source_type.is_none() {
            result.errors.push(ValidationError::new(
                row,
                ErrorType::InvalidSourceType,
                Field::SourceType.as_str(),
                "Source type must be Primary or Secondary",
                Some(raw_type),
            ));
        }

        let raw_date = record.comment_date.as_deref().unwrap_or_default();
        let comment_date = parse_iso_instant(raw_date);
        if comment_date.is_none() {
            result.errors.push(ValidationError::new(
                row,
                ErrorType::InvalidDate,
                Field::CommentDate.as_str(),
                "Date must be an ISO-8601 timestamp (e.g. 2024-01-15T10:00:00Z)",
                Some(raw_date),
            ));
        }

        let credibility = self.check_optional_fields(record, row, &mut result);

        if !result.errors.is_empty() {
            return result;
        }

        if let (
            Some(mk_id),
            Some(content),
            Some(source_url),
            Some(source_platform),
            Some(source_type),
            Some(comment_date),
        ) = (mk_id, content, source_url, platform, source_type, comment_date)
        {
            result.comment = Some(CommentRow {
                mk_id,
                content,
                source_url,
                source_platform,
                source_type,
                comment_date,
                source_name: record.source_name.clone(),
                source_credibility: credibility,
                image_url: record.image_url.clone(),
                video_url: record.video_url.clone(),
                additional_context: record.additional_context.clone(),
            });
        }

        result
    }

    /// Validate every row of a file, adding file-level warnings
    pub fn validate_all(&self, records: &[NormalizedRecord]) -> Vec<RowValidation> {
        let mut results: Vec<RowValidation> = records
            .iter()
            .enumerate()
            .map(|(index, record)| self.validate(record, row_number(index)))
            .collect();

        let mut first_seen: HashMap<&str, usize> = HashMap::new();
        for (index, record) in records.iter().enumerate() {
            let row = row_number(index);

            if let Some(url) = record.source_url.as_deref() {
                if let Some(first_row) = first_seen.get(url) {
                    results[index].warnings.push(ValidationWarning::new(
                        row,
                        WarningType::DuplicateUrl,
                        Field::SourceUrl.as_str(),
                        format!("Same source URL as row {first_row}"),
                        Some(url),
                    ));
                } else {
                    first_seen.insert(url, row);
                }
            }

            for column in record.extra.keys() {
                results[index].warnings.push(ValidationWarning::new(
                    row,
                    WarningType::UnknownField,
                    column.as_str(),
                    format!("Column '{column}' is not part of the import schema and was ignored"),
                    None,
                ));
            }
        }

        results
    }

    // ========================================================================
    // Individual Rules
    // ========================================================================

    fn check_mk_id(
        &self,
        record: &NormalizedRecord,
        row: usize,
        result: &mut RowValidation,
    ) -> Option<u32> {
        let raw = record.mk_id.as_deref().unwrap_or_default();
        let field = Field::MkId.as_str();

        let Some(id) = raw.trim().parse::<u32>().ok().filter(|id| *id > 0) else {
            result.errors.push(ValidationError::new(
                row,
                ErrorType::InvalidId,
                field,
                "mkId must be a positive integer",
                Some(raw),
            ));
            return None;
        };

        let Some(entities) = &self.entities else {
            return Some(id);
        };

        let Some(entity) = entities.get(id) else {
            result.errors.push(ValidationError::new(
                row,
                ErrorType::NotFound,
                field,
                format!("No Knesset member with id {id}"),
                Some(raw),
            ));
            return None;
        };

        let eligible = self
            .config
            .eligible_categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&entity.category));
        if !eligible {
            result.errors.push(ValidationError::new(
                row,
                ErrorType::NotEligible,
                field,
                format!(
                    "{} ({}) is not in an eligible category (allowed: {})",
                    entity.name,
                    entity.category,
                    self.config.eligible_categories.join(", ")
                ),
                Some(raw),
            ));
            return None;
        }

        Some(id)
    }

    fn check_content(
        &self,
        record: &NormalizedRecord,
        row: usize,
        result: &mut RowValidation,
    ) -> Option<String> {
        let content = record.content.as_deref().unwrap_or_default();
        let field = Field::Content.as_str();
        let length = content.chars().count();
        let mut ok = true;

        if length < self.config.min_content_length || length > self.config.max_content_length {
            result.errors.push(ValidationError::new(
                row,
                ErrorType::ContentLength,
                field,
                format!(
                    "Content must be {}-{} characters (got {length})",
                    self.config.min_content_length, self.config.max_content_length
                ),
                Some(excerpt(content)),
            ));
            ok = false;
        }

        let lowered = content.to_lowercase();
        if !self.keywords.iter().any(|k| lowered.contains(k.as_str())) {
            result.errors.push(ValidationError::new(
                row,
                ErrorType::MissingKeywords,
                field,
                "Content does not mention any tracked topic keyword",
                Some(excerpt(content)),
            ));
            ok = false;
        }

        ok.then(|| content.to_string())
    }

    fn check_source_url(
        &self,
        record: &NormalizedRecord,
        row: usize,
        result: &mut RowValidation,
    ) -> Option<String> {
        let raw = record.source_url.as_deref().unwrap_or_default();
        let field = Field::SourceUrl.as_str();

        if raw.chars().count() > self.config.max_url_length {
            result.errors.push(ValidationError::new(
                row,
                ErrorType::InvalidUrl,
                field,
                format!("URL exceeds {} characters", self.config.max_url_length),
                Some(excerpt(raw)),
            ));
            return None;
        }

        if !is_web_url(raw) {
            result.errors.push(ValidationError::new(
                row,
                ErrorType::InvalidUrl,
                field,
                "Source URL must be an absolute http(s) URL",
                Some(raw),
            ));
            return None;
        }

        Some(raw.to_string())
    }

    fn check_optional_fields(
        &self,
        record: &NormalizedRecord,
        row: usize,
        result: &mut RowValidation,
    ) -> Option<u8> {
        let mut credibility = None;

        if let Some(raw) = record.source_credibility.as_deref() {
            match raw.trim().parse::<u8>().ok().filter(|c| (1..=10).contains(c)) {
                Some(score) => {
                    if score < self.config.low_credibility_threshold {
                        result.warnings.push(ValidationWarning::new(
                            row,
                            WarningType::LowCredibility,
                            Field::SourceCredibility.as_str(),
                            format!("Low source credibility ({score}/10)"),
                            Some(raw),
                        ));
                    }
                    credibility = Some(score);
                }
                None => result.errors.push(ValidationError::new(
                    row,
                    ErrorType::InvalidCredibility,
                    Field::SourceCredibility.as_str(),
                    "Credibility must be an integer between 1 and 10",
                    Some(raw),
                )),
            }
        }

        match record.source_name.as_deref() {
            None => result.warnings.push(ValidationWarning::new(
                row,
                WarningType::MissingSourceName,
                Field::SourceName.as_str(),
                "No source name given",
                None,
            )),
            Some(name) if name.chars().count() > self.config.max_source_name_length => {
                result.errors.push(ValidationError::new(
                    row,
                    ErrorType::NameTooLong,
                    Field::SourceName.as_str(),
                    format!(
                        "Source name exceeds {} characters",
                        self.config.max_source_name_length
                    ),
                    Some(excerpt(name)),
                ));
            }
            Some(_) => {}
        }

        for field in [Field::ImageUrl, Field::VideoUrl] {
            if let Some(url) = record.get(field) {
                if !is_web_url(url) {
                    result.warnings.push(ValidationWarning::new(
                        row,
                        WarningType::InvalidOptionalUrl,
                        field.as_str(),
                        format!("{field} is not a valid http(s) URL"),
                        Some(url),
                    ));
                }
            }
        }

        credibility
    }
}

fn is_web_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|url| {
        matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
    })
}

/// First 100 characters, for messages and logs
fn excerpt(value: &str) -> &str {
    match value.char_indices().nth(100) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}
