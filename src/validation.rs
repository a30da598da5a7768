//! Input validation for rotation problems.
//!
//! Checks structural integrity of a [`ProblemInput`] before a problem is
//! assembled. Detects:
//! - Duplicate resident ids and posting codes
//! - Empty identifiers
//! - References to unknown residents or postings
//! - Blocks outside 1..=12, ranks outside 1..=5, durations outside 1..=12
//! - History entries dated after the planned year or filed twice
//!
//! Rule violations (capacity, contiguity, curriculum) are not input errors;
//! they are reported by the constraint engine.

use crate::models::{ProblemInput, BLOCKS_PER_YEAR, MAX_RANK};
use std::collections::HashSet;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same id or code.
    DuplicateId,
    /// An id or code is empty.
    MissingField,
    /// A record references a resident that doesn't exist.
    UnknownResident,
    /// A record references a posting that doesn't exist.
    UnknownPosting,
    /// A block number outside 1..=12.
    BlockOutOfRange,
    /// A preference rank outside 1..=5.
    InvalidRank,
    /// A posting duration outside 1..=12.
    InvalidDuration,
    /// A history entry dated after the planned year, or flagged current for another year.
    InvalidYear,
    /// Two history entries for the same resident, year and block.
    ConflictingEntry,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

fn block_in_range(block: u8) -> bool {
    (1..=BLOCKS_PER_YEAR).contains(&block)
}

/// Validates the input document of a rotation problem.
///
/// Checks:
/// 1. No duplicate resident ids or posting codes, none empty
/// 2. Posting durations within 1..=12
/// 3. History, leave, preference and pin records reference known residents
/// 4. Non-leave history and preferences reference known postings
/// 5. Blocks within 1..=12, ranks within 1..=5
/// 6. History is not dated after the planned year and has one entry per block
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_input(input: &ProblemInput) -> ValidationResult {
    let mut errors = Vec::new();

    let mut resident_ids = HashSet::new();
    for r in &input.residents {
        if r.id.trim().is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::MissingField,
                "Resident with empty id",
            ));
        }
        if !resident_ids.insert(r.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate resident ID: {}", r.id),
            ));
        }
    }

    let mut posting_codes = HashSet::new();
    for p in &input.postings {
        if p.code.trim().is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::MissingField,
                "Posting with empty code",
            ));
        }
        if !posting_codes.insert(p.code.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate posting code: {}", p.code),
            ));
        }
        if !(1..=BLOCKS_PER_YEAR).contains(&p.required_block_duration) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidDuration,
                format!(
                    "Posting '{}' has duration {} (expected 1..={BLOCKS_PER_YEAR})",
                    p.code, p.required_block_duration
                ),
            ));
        }
    }

    let unknown_resident = |context: &str, id: &str, errors: &mut Vec<ValidationError>| {
        if !resident_ids.contains(id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownResident,
                format!("{context} references unknown resident '{id}'"),
            ));
        }
    };

    // History
    let mut filed = HashSet::new();
    for h in &input.history {
        unknown_resident("History entry", &h.resident_id, &mut errors);
        if !block_in_range(h.block) {
            errors.push(ValidationError::new(
                ValidationErrorKind::BlockOutOfRange,
                format!(
                    "History entry for '{}' in {} has block {}",
                    h.resident_id, h.academic_year, h.block
                ),
            ));
        }
        if !h.is_leave && !posting_codes.contains(h.posting_code.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownPosting,
                format!(
                    "History entry for '{}' references unknown posting '{}'",
                    h.resident_id, h.posting_code
                ),
            ));
        }
        if h.academic_year > input.academic_year
            || (h.is_current_year && h.academic_year != input.academic_year)
        {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidYear,
                format!(
                    "History entry for '{}' is dated {} while planning {}",
                    h.resident_id, h.academic_year, input.academic_year
                ),
            ));
        }
        if !filed.insert((h.resident_id.as_str(), h.academic_year, h.block)) {
            errors.push(ValidationError::new(
                ValidationErrorKind::ConflictingEntry,
                format!(
                    "Resident '{}' has more than one entry for {} block {}",
                    h.resident_id, h.academic_year, h.block
                ),
            ));
        }
    }

    for l in &input.leave {
        unknown_resident("Leave record", &l.resident_id, &mut errors);
        if !block_in_range(l.block) {
            errors.push(ValidationError::new(
                ValidationErrorKind::BlockOutOfRange,
                format!("Leave record for '{}' has block {}", l.resident_id, l.block),
            ));
        }
    }

    // Preferences
    for p in &input.preferences {
        unknown_resident("Preference", &p.resident_id, &mut errors);
        if !(1..=MAX_RANK).contains(&p.rank) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidRank,
                format!("Preference of '{}' has rank {}", p.resident_id, p.rank),
            ));
        }
        if !posting_codes.contains(p.posting_code.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownPosting,
                format!(
                    "Preference of '{}' references unknown posting '{}'",
                    p.resident_id, p.posting_code
                ),
            ));
        }
    }

    for p in &input.sr_preferences {
        unknown_resident("SR preference", &p.resident_id, &mut errors);
        if !(1..=MAX_RANK).contains(&p.rank) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidRank,
                format!("SR preference of '{}' has rank {}", p.resident_id, p.rank),
            ));
        }
        if p.base.trim().is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::MissingField,
                format!("SR preference of '{}' has an empty base", p.resident_id),
            ));
        }
    }

    for id in &input.pinned {
        unknown_resident("Pin", id, &mut errors);
    }

    if let Some(overrides) = &input.deviation_overrides {
        for code in overrides.keys() {
            if !posting_codes.contains(code.as_str()) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnknownPosting,
                    format!("Deviation override references unknown posting '{code}'"),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
