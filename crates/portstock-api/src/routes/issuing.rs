//! # Issuing
//!
//! Routes:
//! - GET  /issues      — Issue register (date range, item, terminal, department; `?print=1`)
//! - GET  /issues/new  — Issue form with live stock hints
//! - POST /issues      — Issue stock; refused with 409 when the terminal is short
//! - GET  /issues/:id  — Issue voucher (`?print=1`)

use axum::extract::rejection::FormRejection;
use axum::extract::{Path, Query, RawQuery, State};
use axum::response::{Html, Response};
use axum::routing::get;
use axum::{Form, Router};
use chrono::NaiveDate;
use portstock_core::sanitize::{clean_optional, clean_text, parse_business_date};
use portstock_core::{
    DepartmentId, DepartmentRecord, ItemId, ItemRecord, MovementId, Quantity, Role, Terminal,
    ValidationError,
};
use serde::Deserialize;

use crate::auth::{require_role, CurrentUser, Flash};
use crate::error::AppError;
use crate::extractors::{csrf_form, extract_csrf_form, required, Validate};
use crate::inventory::{self, IssueInput};
use crate::routes::{form_error, parse_id, print_href, redirect_with, PrintQuery, RegisterQuery};
use crate::state::AppState;
use crate::views::{self, voucher_no, Layout, Lookup};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/issues", get(list_issues).post(create_issue))
        .route("/issues/new", get(new_issue))
        .route("/issues/:id", get(show_voucher))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IssueForm {
    pub csrf_token: String,
    pub item_id: String,
    pub terminal: String,
    pub quantity: String,
    pub department_id: String,
    pub requested_by: String,
    pub issued_on: String,
    pub remarks: String,
}

csrf_form!(IssueForm);

impl Validate for IssueForm {
    type Output = IssueInput;

    fn validate(&self, today: NaiveDate) -> Result<IssueInput, ValidationError> {
        Ok(IssueInput {
            item_id: required::<ItemId>("item", &self.item_id)?,
            terminal: required::<Terminal>("terminal", &self.terminal)?,
            quantity: Quantity::parse("quantity", &self.quantity)?,
            department_id: required::<DepartmentId>("department", &self.department_id)?,
            requested_by: clean_text("requested by", &self.requested_by, 120)?,
            issued_on: parse_business_date("date issued", &self.issued_on, today)?,
            remarks: clean_optional("remarks", &self.remarks, 500)?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PreselectQuery {
    pub item_id: Option<String>,
}

/// Active items with stock on hand at either terminal.
fn issuable_items(state: &AppState) -> Vec<ItemRecord> {
    let mut items = state.items.filter(|i| i.active && i.stock.total() > 0);
    items.sort_by(|a, b| a.code.cmp(&b.code));
    items
}

fn active_departments(state: &AppState) -> Vec<DepartmentRecord> {
    let mut departments = state.departments.filter(|d| d.active);
    departments.sort_by(|a, b| a.name.cmp(&b.name));
    departments
}

async fn list_issues(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<RegisterQuery>,
    RawQuery(raw): RawQuery,
) -> Result<Html<String>, AppError> {
    let range = query.range(state.today())?;
    let filter = query.filter()?;
    let mut issues = state.issues.filter(|i| {
        range.contains(i.issued_on)
            && filter.item_id.map_or(true, |id| i.item_id == id)
            && filter.terminal.map_or(true, |t| i.terminal == t)
            && filter.department_id.map_or(true, |d| i.department_id == d)
    });
    issues.sort_by(|a, b| {
        b.issued_on
            .cmp(&a.issued_on)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });

    let mut items = state.items.list();
    items.sort_by(|a, b| a.code.cmp(&b.code));
    let mut departments = state.departments.list();
    departments.sort_by(|a, b| a.name.cmp(&b.name));
    let layout = Layout::for_user(&state, &user, "Issue register").print(query.is_print());
    Ok(views::inventory::issue_list(
        layout,
        &issues,
        &items,
        &departments,
        &Lookup::new(&state),
        &query,
        (range.from, range.to),
        &print_href("/issues", raw.as_deref().unwrap_or("")),
        user.has_role(Role::Storekeeper),
    ))
}

async fn new_issue(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(pre): Query<PreselectQuery>,
) -> Result<Html<String>, AppError> {
    require_role(&user, Role::Storekeeper)?;
    let form = IssueForm {
        item_id: pre.item_id.unwrap_or_default(),
        issued_on: state.today().to_string(),
        ..IssueForm::default()
    };
    Ok(views::inventory::issue_form(
        Layout::for_user(&state, &user, "Issue stock"),
        &user,
        &issuable_items(&state),
        &active_departments(&state),
        &form,
        state.today(),
        None,
    ))
}

async fn create_issue(
    State(state): State<AppState>,
    user: CurrentUser,
    form: Result<Form<IssueForm>, FormRejection>,
) -> Result<Response, AppError> {
    require_role(&user, Role::Storekeeper)?;
    let form = extract_csrf_form(&user, form)?;
    let today = state.today();
    let result: Result<_, AppError> = async {
        let input = form.validate(today)?;
        inventory::issue(&state, &user, input).await
    }
    .await;
    match result {
        Ok(issue) => Ok(redirect_with(
            &state,
            &user,
            &format!("/issues/{}", issue.id),
            Flash::success(format!("Issued under voucher {}.", voucher_no(issue.id))),
        )),
        Err(e) => form_error(e, |msg| {
            views::inventory::issue_form(
                Layout::for_user(&state, &user, "Issue stock"),
                &user,
                &issuable_items(&state),
                &active_departments(&state),
                &form,
                today,
                Some(msg),
            )
        }),
    }
}

async fn show_voucher(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Query(print): Query<PrintQuery>,
) -> Result<Html<String>, AppError> {
    let id: MovementId = parse_id(&id, "issue")?;
    let issue = state
        .issues
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("issue {id}")))?;
    let mut returns = state.returns.filter(|r| r.issue_id == id);
    returns.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let title = format!("Issue voucher {}", voucher_no(id));
    let layout = Layout::for_user(&state, &user, &title).print(print.is_print());
    Ok(views::inventory::issue_voucher(
        layout,
        &issue,
        &returns,
        &Lookup::new(&state),
        user.has_role(Role::Storekeeper),
        print.is_print(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
    }

    fn form() -> IssueForm {
        IssueForm {
            item_id: ItemId::new().to_string(),
            terminal: "uct".into(),
            quantity: "3".into(),
            department_id: DepartmentId::new().to_string(),
            requested_by: "Gate supervisor".into(),
            issued_on: "".into(),
            ..Default::default()
        }
    }

    #[test]
    fn blank_date_means_today() {
        let input = form().validate(today()).unwrap();
        assert_eq!(input.issued_on, today());
        assert_eq!(input.terminal, Terminal::Uct);
        assert_eq!(input.remarks, None);
    }

    #[test]
    fn department_is_required() {
        let f = IssueForm { department_id: "".into(), ..form() };
        assert_eq!(
            f.validate(today()).unwrap_err(),
            ValidationError::EmptyField { field: "department" }
        );
    }

    #[test]
    fn quantity_must_be_positive_integer() {
        for bad in ["-1", "1.5", "abc", ""] {
            let f = IssueForm { quantity: bad.into(), ..form() };
            assert!(f.validate(today()).is_err(), "accepted {bad:?}");
        }
    }
}
