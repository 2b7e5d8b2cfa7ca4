//! # Error Hierarchy
//!
//! Structured errors built with `thiserror`. Validation errors carry the
//! field name and the offending input so the web layer can show the
//! operator exactly what to fix.

use chrono::NaiveDate;
use thiserror::Error;

use crate::catalog::Terminal;

/// Input validation failures for form fields and domain primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was empty after sanitization.
    #[error("{field} is required")]
    EmptyField {
        /// Form field name.
        field: &'static str,
    },

    /// A field exceeded its maximum length.
    #[error("{field} must be at most {max} characters (got {actual})")]
    TooLong {
        /// Form field name.
        field: &'static str,
        /// Maximum allowed characters.
        max: usize,
        /// Characters supplied.
        actual: usize,
    },

    /// Item code contains characters outside `[A-Z0-9-_/.]` or has a bad length.
    #[error("invalid item code \"{0}\" (expected 1-32 letters, digits, '-', '_', '/' or '.')")]
    InvalidItemCode(String),

    /// Department code is not 2-12 letters or digits.
    #[error("invalid department code \"{0}\" (expected 2-12 letters or digits)")]
    InvalidDepartmentCode(String),

    /// Username does not match `[a-z0-9._-]{3,32}`.
    #[error("invalid username \"{0}\" (expected 3-32 lowercase letters, digits, '.', '_' or '-')")]
    InvalidUsername(String),

    /// Password does not meet the minimum policy.
    #[error("password must be between 8 and 128 characters and not blank")]
    WeakPassword,

    /// Password and its confirmation differ.
    #[error("the new password and its confirmation do not match")]
    PasswordMismatch,

    /// Quantity is not an integer in the accepted range.
    #[error("{field} must be a whole number between {min} and {max} (got \"{value}\")")]
    InvalidQuantity {
        /// Form field name.
        field: &'static str,
        /// The raw input.
        value: String,
        /// Minimum accepted value.
        min: i64,
        /// Maximum accepted value.
        max: i64,
    },

    /// Date string is not `YYYY-MM-DD`.
    #[error("{field} must be a date in YYYY-MM-DD format (got \"{value}\")")]
    InvalidDate {
        /// Form field name.
        field: &'static str,
        /// The raw input.
        value: String,
    },

    /// A business date lies after today.
    #[error("{field} cannot be in the future ({value})")]
    FutureDate {
        /// Form field name.
        field: &'static str,
        /// The rejected date.
        value: String,
    },

    /// Report range has `from` after `to`.
    #[error("date range start {from} is after end {to}")]
    InvalidDateRange {
        /// Range start.
        from: String,
        /// Range end.
        to: String,
    },

    /// Category name is not recognised.
    #[error("unknown category \"{0}\"")]
    UnknownCategory(String),

    /// Terminal name is not recognised.
    #[error("unknown terminal \"{0}\" (expected jct or uct)")]
    UnknownTerminal(String),

    /// Movement kind is not recognised.
    #[error("unknown movement kind \"{0}\" (expected receipt, issue or return)")]
    UnknownMovementKind(String),

    /// Role name is not recognised.
    #[error("unknown role \"{0}\"")]
    UnknownRole(String),

    /// Identifier is not a valid UUID.
    #[error("invalid identifier \"{0}\"")]
    InvalidId(String),
}

/// Stock arithmetic failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StockError {
    /// The terminal holds fewer units than requested.
    #[error("insufficient stock at {terminal}: {available} available, {requested} requested")]
    InsufficientStock {
        /// Terminal the withdrawal targeted.
        terminal: Terminal,
        /// Units on hand.
        available: i64,
        /// Units requested.
        requested: i64,
    },

    /// A backdated withdrawal would drive the stock card below zero on or
    /// after its business date, even though the terminal holds enough today.
    #[error("insufficient stock at {terminal} on {date}: {available} available, {requested} requested")]
    InsufficientOnDate {
        /// Terminal the withdrawal targeted.
        terminal: Terminal,
        /// Business date of the withdrawal.
        date: NaiveDate,
        /// Lowest balance from that date onwards.
        available: i64,
        /// Units requested.
        requested: i64,
    },

    /// A deposit would overflow the counter.
    #[error("stock counter overflow at {terminal}")]
    Overflow {
        /// Terminal the deposit targeted.
        terminal: Terminal,
    },

    /// A return exceeds what is still outstanding on the issue.
    #[error("return of {requested} exceeds the {outstanding} unit(s) still outstanding on this issue")]
    ReturnExceedsIssued {
        /// Units issued and not yet returned.
        outstanding: i64,
        /// Units the caller tried to return.
        requested: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_field_names_the_field() {
        let err = ValidationError::EmptyField { field: "supplier" };
        assert_eq!(err.to_string(), "supplier is required");
    }

    #[test]
    fn insufficient_stock_mentions_terminal_and_counts() {
        let err = StockError::InsufficientStock {
            terminal: Terminal::Uct,
            available: 3,
            requested: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("UCT"), "got: {msg}");
        assert!(msg.contains("3 available"));
        assert!(msg.contains("5 requested"));
    }

    #[test]
    fn return_exceeds_issued_display() {
        let err = StockError::ReturnExceedsIssued {
            outstanding: 2,
            requested: 4,
        };
        assert!(err.to_string().contains("2 unit(s) still outstanding"));
    }
}
