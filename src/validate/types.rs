//! Validation finding types

use crate::types::CommentRow;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A rule violation that blocks submission of the row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    MissingField,
    InvalidId,
    NotFound,
    NotEligible,
    ContentLength,
    MissingKeywords,
    InvalidUrl,
    InvalidPlatform,
    InvalidSourceType,
    InvalidDate,
    InvalidCredibility,
    NameTooLong,
}

impl ErrorType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingField => "MISSING_FIELD",
            Self::InvalidId => "INVALID_ID",
            Self::NotFound => "NOT_FOUND",
            Self::NotEligible => "NOT_ELIGIBLE",
            Self::ContentLength => "CONTENT_LENGTH",
            Self::MissingKeywords => "MISSING_KEYWORDS",
            Self::InvalidUrl => "INVALID_URL",
            Self::InvalidPlatform => "INVALID_PLATFORM",
            Self::InvalidSourceType => "INVALID_SOURCE_TYPE",
            Self::InvalidDate => "INVALID_DATE",
            Self::InvalidCredibility => "INVALID_CREDIBILITY",
            Self::NameTooLong => "NAME_TOO_LONG",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An informational finding; never blocks submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningType {
    LowCredibility,
    MissingSourceName,
    InvalidOptionalUrl,
    DuplicateUrl,
    UnknownField,
}

impl WarningType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LowCredibility => "LOW_CREDIBILITY",
            Self::MissingSourceName => "MISSING_SOURCE_NAME",
            Self::InvalidOptionalUrl => "INVALID_OPTIONAL_URL",
            Self::DuplicateUrl => "DUPLICATE_URL",
            Self::UnknownField => "UNKNOWN_FIELD",
        }
    }
}

impl fmt::Display for WarningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validation finding for one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding<K> {
    /// Row number in the input file (header is row 1)
    pub row: usize,
    #[serde(rename = "type")]
    pub kind: K,
    /// Canonical field (or raw column) the finding is about
    pub field: String,
    pub message: String,
    /// Offending raw value, if there was one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl<K> Finding<K> {
    pub fn new(
        row: usize,
        kind: K,
        field: impl Into<String>,
        message: impl Into<String>,
        value: Option<&str>,
    ) -> Self {
        Self {
            row,
            kind,
            field: field.into(),
            message: message.into(),
            value: value.map(ToString::to_string),
        }
    }
}

pub type ValidationError = Finding<ErrorType>;
pub type ValidationWarning = Finding<WarningType>;

/// Result of validating a single row
#[derive(Debug, Clone, Default)]
pub struct RowValidation {
    pub row: usize,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    /// The typed row, present exactly when there are no errors
    pub comment: Option<CommentRow>,
}

impl RowValidation {
    /// Whether the row may be submitted
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Check for a specific error type
    pub fn has_error(&self, kind: ErrorType) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    /// Check for a specific warning type
    pub fn has_warning(&self, kind: WarningType) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }

    /// All error messages joined for logs
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.kind, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
