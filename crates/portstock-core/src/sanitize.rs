//! # Input Sanitization
//!
//! Every free-text form field passes through [`clean_text`] or
//! [`clean_optional`] before it is stored. Sanitization normalizes the
//! value (trim, drop control characters, collapse whitespace) and enforces
//! a per-field length limit. HTML escaping is NOT done here; the view layer
//! escapes on output.

use chrono::NaiveDate;

use crate::error::ValidationError;

/// Normalize a required text field.
///
/// Returns [`ValidationError::EmptyField`] if nothing is left after
/// normalization and [`ValidationError::TooLong`] if the result has more
/// than `max_chars` characters.
pub fn clean_text(
    field: &'static str,
    input: &str,
    max_chars: usize,
) -> Result<String, ValidationError> {
    clean_optional(field, input, max_chars)?.ok_or(ValidationError::EmptyField { field })
}

/// Normalize an optional text field. Blank input yields `None`.
pub fn clean_optional(
    field: &'static str,
    input: &str,
    max_chars: usize,
) -> Result<Option<String>, ValidationError> {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;
    for c in input.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if c.is_control() {
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }

    if out.is_empty() {
        return Ok(None);
    }
    let actual = out.chars().count();
    if actual > max_chars {
        return Err(ValidationError::TooLong {
            field,
            max: max_chars,
            actual,
        });
    }
    Ok(Some(out))
}

/// Parse a business date (receipt, issue or return date).
///
/// Blank input means `today`. Dates after `today` are rejected: stock
/// cannot move on a day that has not happened yet.
pub fn parse_business_date(
    field: &'static str,
    input: &str,
    today: NaiveDate,
) -> Result<NaiveDate, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(today);
    }
    let date = parse_date(field, trimmed)?;
    if date > today {
        return Err(ValidationError::FutureDate {
            field,
            value: date.to_string(),
        });
    }
    Ok(date)
}

/// Parse a `YYYY-MM-DD` date without the future-date rule (report filters).
pub fn parse_date(field: &'static str, input: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate {
        field,
        value: input.to_string(),
    })
}
