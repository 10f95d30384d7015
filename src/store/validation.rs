//! Field rules shared by `create`, `update` and CSV import.

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::ValidationError;

pub const MIN_YEAR: i32 = 1000;
pub const MAX_YEAR: i32 = 2030;

/// Ten digits, thirteen digits, or a 13-17 character run of digits and
/// hyphens. ASCII digits only.
static ISBN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[0-9]{10}|[0-9]{13}|[0-9-]{13,17})$").expect("ISBN pattern is valid")
});

pub fn is_valid_year(year: i32) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&year)
}

pub fn is_valid_isbn(isbn: &str) -> bool {
    ISBN_PATTERN.is_match(isbn)
}

pub(crate) fn require_text(value: &str, err: ValidationError) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(err)
    } else {
        Ok(())
    }
}

pub(crate) fn check_year(year: i32) -> Result<(), ValidationError> {
    if is_valid_year(year) {
        Ok(())
    } else {
        Err(ValidationError::YearOutOfRange(year))
    }
}

pub(crate) fn check_isbn(isbn: &str) -> Result<(), ValidationError> {
    if is_valid_isbn(isbn) {
        Ok(())
    } else {
        Err(ValidationError::InvalidIsbn(isbn.to_string()))
    }
}
