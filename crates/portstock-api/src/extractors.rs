//! # Form Extraction & Validation
//!
//! Browser forms arrive as raw strings. Each form type implements
//! [`Validate`] to turn itself into a typed command, and [`CsrfForm`] so the
//! handler can check the session's CSRF token before acting on it.

use std::str::FromStr;

use axum::extract::rejection::FormRejection;
use axum::Form;
use chrono::NaiveDate;
use portstock_core::ValidationError;

use crate::auth::{check_csrf, CurrentUser};
use crate::error::AppError;

/// Turn a raw form into a validated command.
pub trait Validate {
    type Output;

    /// `today` is the business date used for default and future-date checks.
    fn validate(&self, today: NaiveDate) -> Result<Self::Output, ValidationError>;
}

/// Forms that carry a `csrf_token` field.
pub trait CsrfForm {
    fn csrf_token(&self) -> &str;
}

/// Implement [`CsrfForm`] for structs with a `csrf_token: String` field.
macro_rules! csrf_form {
    ($($ty:ty),+ $(,)?) => {
        $(impl $crate::extractors::CsrfForm for $ty {
            fn csrf_token(&self) -> &str {
                &self.csrf_token
            }
        })+
    };
}
pub(crate) use csrf_form;

/// Unwrap a form body, mapping rejections to 422.
pub fn extract_form<T>(result: Result<Form<T>, FormRejection>) -> Result<T, AppError> {
    result
        .map(|Form(v)| v)
        .map_err(|err| AppError::Validation(err.body_text()))
}

/// Unwrap a form body and check its CSRF token.
pub fn extract_csrf_form<T: CsrfForm>(
    user: &CurrentUser,
    result: Result<Form<T>, FormRejection>,
) -> Result<T, AppError> {
    let form = extract_form(result)?;
    check_csrf(user, form.csrf_token())?;
    Ok(form)
}

/// HTML checkboxes submit nothing when unticked.
pub fn checked(value: &Option<String>) -> bool {
    matches!(value.as_deref(), Some("on" | "true" | "1"))
}

/// Parse an optional query/form value, treating blank as absent.
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a required identifier or enum from a `<select>`.
pub fn required<T>(field: &'static str, value: &str) -> Result<T, ValidationError>
where
    T: FromStr<Err = ValidationError>,
{
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField { field });
    }
    value.parse()
}

/// Parse an optional filter value; blank means "any".
pub fn optional<T>(value: &Option<String>) -> Result<Option<T>, ValidationError>
where
    T: FromStr<Err = ValidationError>,
{
    non_blank(value).map(str::parse).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkbox_values() {
        assert!(checked(&Some("on".into())));
        assert!(!checked(&None));
        assert!(!checked(&Some("off".into())));
    }

    #[test]
    fn select_values() {
        use portstock_core::Terminal;
        assert_eq!(required::<Terminal>("terminal", "uct").unwrap(), Terminal::Uct);
        assert_eq!(
            required::<Terminal>("terminal", " "),
            Err(ValidationError::EmptyField { field: "terminal" })
        );
        assert_eq!(optional::<Terminal>(&Some(String::new())).unwrap(), None);
        assert!(optional::<Terminal>(&Some("dock".into())).is_err());
    }

    #[test]
    fn blank_is_absent() {
        assert_eq!(non_blank(&Some("  ".into())), None);
        assert_eq!(non_blank(&Some(" toner ".into())), Some("toner"));
        assert_eq!(non_blank(&None), None);
    }
}
