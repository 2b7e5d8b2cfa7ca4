//! # Returns
//!
//! Routes:
//! - GET  /issues/:id/return — Return form for one issue voucher
//! - POST /issues/:id/return — Record a return; never more than is outstanding
//! - GET  /returns           — Return register (`?print=1`)

use axum::extract::rejection::FormRejection;
use axum::extract::{Path, Query, RawQuery, State};
use axum::response::{Html, Response};
use axum::routing::get;
use axum::{Form, Router};
use chrono::NaiveDate;
use portstock_core::sanitize::{clean_text, parse_business_date};
use portstock_core::{IssueRecord, MovementId, Quantity, Role, ValidationError};
use serde::Deserialize;

use crate::auth::{require_role, CurrentUser, Flash};
use crate::error::AppError;
use crate::extractors::{csrf_form, extract_csrf_form, Validate};
use crate::inventory::{self, ReturnInput};
use crate::routes::{form_error, parse_id, print_href, redirect_with, RegisterQuery};
use crate::state::AppState;
use crate::views::{self, voucher_no, Layout, Lookup};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/issues/:id/return", get(return_form).post(create_return))
        .route("/returns", get(list_returns))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReturnForm {
    pub csrf_token: String,
    pub quantity: String,
    pub reason: String,
    pub returned_on: String,
}

csrf_form!(ReturnForm);

impl Validate for ReturnForm {
    type Output = ReturnInput;

    fn validate(&self, today: NaiveDate) -> Result<ReturnInput, ValidationError> {
        Ok(ReturnInput {
            quantity: Quantity::parse("quantity", &self.quantity)?,
            reason: clean_text("reason", &self.reason, 200)?,
            returned_on: parse_business_date("date returned", &self.returned_on, today)?,
        })
    }
}

fn find_issue(state: &AppState, raw: &str) -> Result<IssueRecord, AppError> {
    let id: MovementId = parse_id(raw, "issue")?;
    state
        .issues
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("issue {id}")))
}

async fn return_form(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    require_role(&user, Role::Storekeeper)?;
    let issue = find_issue(&state, &id)?;
    if issue.outstanding() == 0 {
        return Err(AppError::Conflict(format!(
            "everything issued under voucher {} has already been returned",
            voucher_no(issue.id)
        )));
    }
    let form = ReturnForm {
        returned_on: state.today().to_string(),
        ..ReturnForm::default()
    };
    let title = format!("Return against {}", voucher_no(issue.id));
    Ok(views::inventory::return_form(
        Layout::for_user(&state, &user, &title),
        &user,
        &issue,
        &Lookup::new(&state),
        &form,
        state.today(),
        None,
    ))
}

async fn create_return(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    form: Result<Form<ReturnForm>, FormRejection>,
) -> Result<Response, AppError> {
    require_role(&user, Role::Storekeeper)?;
    let issue = find_issue(&state, &id)?;
    let form = extract_csrf_form(&user, form)?;
    let today = state.today();
    let result: Result<_, AppError> = async {
        let input = form.validate(today)?;
        inventory::record_return(&state, &user, issue.id, input).await
    }
    .await;
    match result {
        Ok(ret) => Ok(redirect_with(
            &state,
            &user,
            &format!("/issues/{}", issue.id),
            Flash::success(format!(
                "Returned {} to {} against voucher {}.",
                ret.quantity.get(),
                ret.terminal.label(),
                voucher_no(issue.id)
            )),
        )),
        Err(e) => {
            // Show the form against the latest outstanding quantity.
            let current = state.issues.get(&issue.id).unwrap_or(issue);
            let title = format!("Return against {}", voucher_no(current.id));
            form_error(e, |msg| {
                views::inventory::return_form(
                    Layout::for_user(&state, &user, &title),
                    &user,
                    &current,
                    &Lookup::new(&state),
                    &form,
                    today,
                    Some(msg),
                )
            })
        }
    }
}

async fn list_returns(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<RegisterQuery>,
    RawQuery(raw): RawQuery,
) -> Result<Html<String>, AppError> {
    let range = query.range(state.today())?;
    let filter = query.filter()?;
    let mut returns = state.returns.filter(|r| {
        range.contains(r.returned_on)
            && filter.item_id.map_or(true, |id| r.item_id == id)
            && filter.terminal.map_or(true, |t| r.terminal == t)
    });
    returns.sort_by(|a, b| {
        b.returned_on
            .cmp(&a.returned_on)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });

    let mut items = state.items.list();
    items.sort_by(|a, b| a.code.cmp(&b.code));
    let layout = Layout::for_user(&state, &user, "Return register").print(query.is_print());
    Ok(views::inventory::return_list(
        layout,
        &returns,
        &items,
        &Lookup::new(&state),
        &query,
        (range.from, range.to),
        &print_href("/returns", raw.as_deref().unwrap_or("")),
    ))
}
