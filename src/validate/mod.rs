//! Row validation module
//!
//! Applies the business rules that decide whether a normalized row may be
//! submitted.
//!
//! # Overview
//!
//! - `Validator` - ordered per-row rules plus file-level checks
//! - `EntityCache` - read-only snapshot of known Knesset members
//! - `ValidationReport` - whole-file aggregation, JSON report, console summary
//!
//! Errors block a row; warnings never do.

mod entities;
mod report;
mod types;
mod validator;

pub use entities::{Entity, EntityCache};
pub use report::{TypeCount, ValidationReport};
pub use types::{ErrorType, Finding, RowValidation, ValidationError, ValidationWarning, WarningType};
pub use validator::{row_number, Validator, ValidatorConfig, DEFAULT_KEYWORDS};
