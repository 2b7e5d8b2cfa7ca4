//! # Route Modules
//!
//! Each module defines an Axum router for one area of the application.
//! [`public`] is mounted without a session; [`protected`] sits behind
//! [`crate::auth::session_middleware`] and is assembled in `lib.rs`.

pub mod account;
pub mod api;
pub mod audit;
pub mod dashboard;
pub mod departments;
pub mod issuing;
pub mod items;
pub mod receiving;
pub mod reports;
pub mod returns;
pub mod session;
pub mod users;

use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Router;
use chrono::NaiveDate;
use portstock_core::report::MovementFilter;
use portstock_core::{DateRange, DepartmentId, ItemId, MovementKind, Terminal, ValidationError};
use serde::Deserialize;

use crate::auth::{CurrentUser, Flash};
use crate::error::AppError;
use crate::extractors::{checked, optional};
use crate::state::AppState;

/// Routes reachable without signing in.
pub fn public() -> Router<AppState> {
    session::router()
}

/// Routes that require a session.
pub fn protected() -> Router<AppState> {
    Router::new()
        .merge(session::protected_router())
        .merge(dashboard::router())
        .merge(account::router())
        .merge(items::router())
        .merge(receiving::router())
        .merge(issuing::router())
        .merge(returns::router())
        .merge(departments::router())
        .merge(users::router())
        .merge(reports::router())
        .merge(audit::router())
        .merge(api::router())
        .merge(crate::openapi::router())
}

/// `?print=1` switches a page to the print layout.
#[derive(Debug, Default, Deserialize)]
pub struct PrintQuery {
    pub print: Option<String>,
}

impl PrintQuery {
    pub fn is_print(&self) -> bool {
        checked(&self.print)
    }
}

/// Filters shared by the movement registers and reports.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RegisterQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub item_id: Option<String>,
    pub terminal: Option<String>,
    pub department_id: Option<String>,
    pub kind: Option<String>,
    pub print: Option<String>,
}

impl RegisterQuery {
    pub fn range(&self, today: NaiveDate) -> Result<DateRange, ValidationError> {
        DateRange::parse(self.from.as_deref(), self.to.as_deref(), today)
    }

    pub fn filter(&self) -> Result<MovementFilter, ValidationError> {
        Ok(MovementFilter {
            kind: optional::<MovementKind>(&self.kind)?,
            terminal: optional::<Terminal>(&self.terminal)?,
            item_id: optional::<ItemId>(&self.item_id)?,
            department_id: optional::<DepartmentId>(&self.department_id)?,
        })
    }

    pub fn is_print(&self) -> bool {
        checked(&self.print)
    }
}

/// Redirect after a successful POST, leaving a flash for the next page.
pub(crate) fn redirect_with(
    state: &AppState,
    user: &CurrentUser,
    to: &str,
    flash: Flash,
) -> Response {
    state.sessions.set_flash(&user.session_token, flash);
    Redirect::to(to).into_response()
}

/// Re-render the form with the error message when the user can fix it;
/// otherwise hand the error to the error page.
pub(crate) fn form_error(
    err: AppError,
    render: impl FnOnce(&str) -> Html<String>,
) -> Result<Response, AppError> {
    if err.is_user_correctable() {
        let (status, _) = err.status_and_code();
        Ok((status, render(&err.public_message())).into_response())
    } else {
        Err(err)
    }
}

/// Parse an identifier from a path segment. Malformed ids are 404s.
pub(crate) fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, AppError> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("{what} {raw}")))
}

/// Append `print=1` to the current query string.
pub(crate) fn print_href(path: &str, query: &str) -> String {
    let rest: Vec<&str> = query
        .split('&')
        .filter(|p| !p.is_empty() && !p.starts_with("print="))
        .collect();
    if rest.is_empty() {
        format!("{path}?print=1")
    } else {
        format!("{path}?{}&print=1", rest.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_href_keeps_filters() {
        assert_eq!(print_href("/reports/stock", ""), "/reports/stock?print=1");
        assert_eq!(
            print_href("/reports/movements", "from=2026-03-01&print=0&kind=issue"),
            "/reports/movements?from=2026-03-01&kind=issue&print=1"
        );
    }

    #[test]
    fn register_query_defaults_to_month_to_date() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let q = RegisterQuery::default();
        let range = q.range(today).unwrap();
        assert_eq!(range.from, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert_eq!(range.to, today);
        let filter = q.filter().unwrap();
        assert!(filter.kind.is_none() && filter.terminal.is_none());
    }

    #[test]
    fn register_query_rejects_bad_filters() {
        let q = RegisterQuery {
            terminal: Some("dock".into()),
            ..Default::default()
        };
        assert!(q.filter().is_err());
        let q = RegisterQuery {
            from: Some("2026-03-10".into()),
            to: Some("2026-03-01".into()),
            ..Default::default()
        };
        assert!(q.range(NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()).is_err());
    }

    #[test]
    fn print_flag() {
        assert!(PrintQuery { print: Some("1".into()) }.is_print());
        assert!(!PrintQuery::default().is_print());
    }
}
