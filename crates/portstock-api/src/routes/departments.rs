//! # Departments
//!
//! Routes:
//! - GET  /departments      — Department list (any role); admins also get the edit dialogs
//! - POST /departments      — Create a department (Admin)
//! - POST /departments/:id  — Rename or (de)activate a department (Admin)
//!
//! Departments are never deleted: issue vouchers keep pointing at them.

use std::collections::HashMap;

use axum::extract::rejection::FormRejection;
use axum::extract::{Path, State};
use axum::response::{Html, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::{NaiveDate, Utc};
use portstock_core::sanitize::clean_text;
use portstock_core::{DepartmentId, DepartmentRecord, Role, ValidationError};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{require_role, CurrentUser, Flash};
use crate::error::AppError;
use crate::extractors::{checked, csrf_form, extract_csrf_form, Validate};
use crate::routes::{form_error, parse_id, redirect_with};
use crate::state::AppState;
use crate::views::{self, Layout};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/departments", get(list_departments).post(create_department))
        .route("/departments/:id", post(update_department))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DepartmentForm {
    pub csrf_token: String,
    pub code: String,
    pub name: String,
    pub active: Option<String>,
}

csrf_form!(DepartmentForm);

/// Validated department fields.
#[derive(Debug)]
pub struct DepartmentDraft {
    pub code: String,
    pub name: String,
}

impl Validate for DepartmentForm {
    type Output = DepartmentDraft;

    fn validate(&self, _today: NaiveDate) -> Result<DepartmentDraft, ValidationError> {
        if self.code.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "code" });
        }
        Ok(DepartmentDraft {
            code: DepartmentRecord::normalize_code(&self.code)?,
            name: clean_text("name", &self.name, 120)?,
        })
    }
}

fn code_conflict(code: &str) -> AppError {
    AppError::Conflict(format!("a department with code {code} already exists"))
}

fn render_page(state: &AppState, user: &CurrentUser, error: Option<&str>) -> Html<String> {
    let mut departments = state.departments.list();
    departments.sort_by(|a, b| a.name.cmp(&b.name));
    let mut issue_counts: HashMap<DepartmentId, usize> = HashMap::new();
    for issue in state.issues.list() {
        *issue_counts.entry(issue.department_id).or_default() += 1;
    }
    views::admin::department_page(
        Layout::for_user(state, user, "Departments"),
        user,
        &departments,
        &issue_counts,
        error,
    )
}

async fn list_departments(State(state): State<AppState>, user: CurrentUser) -> Html<String> {
    render_page(&state, &user, None)
}

async fn create_department(
    State(state): State<AppState>,
    user: CurrentUser,
    form: Result<Form<DepartmentForm>, FormRejection>,
) -> Result<Response, AppError> {
    require_role(&user, Role::Admin)?;
    let form = extract_csrf_form(&user, form)?;
    match create(&state, &user, &form).await {
        Ok(dept) => Ok(redirect_with(
            &state,
            &user,
            "/departments",
            Flash::success(format!("Department {} added.", dept.name)),
        )),
        Err(e) => form_error(e, |msg| render_page(&state, &user, Some(msg))),
    }
}

async fn create(
    state: &AppState,
    actor: &CurrentUser,
    form: &DepartmentForm,
) -> Result<DepartmentRecord, AppError> {
    let draft = form.validate(state.today())?;
    let record = DepartmentRecord {
        id: DepartmentId::new(),
        code: draft.code,
        name: draft.name,
        active: true,
        created_at: Utc::now(),
    };
    let code = record.code.clone();
    state
        .departments
        .try_insert_unique(record.id, record.clone(), |d| d.code == code)
        .map_err(|rejected| code_conflict(&rejected.code))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::departments::insert(pool, &record).await {
            state.departments.remove(&record.id);
            if crate::db::is_unique_violation(&e) {
                return Err(code_conflict(&record.code));
            }
            tracing::error!(department_id = %record.id, error = %e, "failed to persist department");
            return Err(AppError::from(e));
        }
    }

    tracing::info!(
        department_id = %record.id,
        code = %record.code,
        user = %actor.username,
        "department created"
    );
    crate::audit::record(
        state,
        &actor.username,
        "department.create",
        "department",
        *record.id.as_uuid(),
        json!({ "code": &record.code, "name": &record.name }),
    )
    .await;
    Ok(record)
}

async fn update_department(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    form: Result<Form<DepartmentForm>, FormRejection>,
) -> Result<Response, AppError> {
    require_role(&user, Role::Admin)?;
    let id: DepartmentId = parse_id(&id, "department")?;
    let form = extract_csrf_form(&user, form)?;
    match update(&state, &user, id, &form).await {
        Ok(dept) => Ok(redirect_with(
            &state,
            &user,
            "/departments",
            Flash::success(format!("Department {} saved.", dept.name)),
        )),
        Err(e) => form_error(e, |msg| render_page(&state, &user, Some(msg))),
    }
}

async fn update(
    state: &AppState,
    actor: &CurrentUser,
    id: DepartmentId,
    form: &DepartmentForm,
) -> Result<DepartmentRecord, AppError> {
    let existing = state
        .departments
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("department {id}")))?;
    let draft = form.validate(state.today())?;
    if state.departments.any(|d| d.id != id && d.code == draft.code) {
        return Err(code_conflict(&draft.code));
    }
    let updated = DepartmentRecord {
        code: draft.code,
        name: draft.name,
        active: checked(&form.active),
        ..existing.clone()
    };

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::departments::update(pool, &updated).await {
            if crate::db::is_unique_violation(&e) {
                return Err(code_conflict(&updated.code));
            }
            tracing::error!(department_id = %id, error = %e, "failed to update department");
            return Err(AppError::from(e));
        }
    }
    let stored = updated.clone();
    state.departments.update(&id, move |d| *d = stored);

    tracing::info!(
        department_id = %id,
        code = %updated.code,
        active = updated.active,
        user = %actor.username,
        "department updated"
    );
    crate::audit::record(
        state,
        &actor.username,
        "department.update",
        "department",
        *id.as_uuid(),
        json!({
            "code": &updated.code,
            "name": &updated.name,
            "active": updated.active,
            "previous": {
                "code": &existing.code,
                "name": &existing.name,
                "active": existing.active,
            },
        }),
    )
    .await;
    Ok(updated)
}
