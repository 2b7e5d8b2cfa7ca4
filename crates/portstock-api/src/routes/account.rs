//! # Own Account
//!
//! Routes:
//! - GET  /account/password — Change-password form
//! - POST /account/password — Verify the current password and set a new one

use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::response::{Html, Response};
use axum::routing::get;
use axum::{Form, Router};
use chrono::{NaiveDate, Utc};
use portstock_core::{validate_password, ValidationError};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{hash_password, run_password_task, verify_password, CurrentUser, Flash};
use crate::error::AppError;
use crate::extractors::{csrf_form, extract_csrf_form, Validate};
use crate::routes::{form_error, redirect_with};
use crate::state::AppState;
use crate::views;

pub fn router() -> Router<AppState> {
    Router::new().route("/account/password", get(password_form).post(change_password))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChangePasswordForm {
    pub csrf_token: String,
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

csrf_form!(ChangePasswordForm);

impl Validate for ChangePasswordForm {
    type Output = String;

    fn validate(&self, _today: NaiveDate) -> Result<String, ValidationError> {
        validate_password(&self.new_password)?;
        if self.new_password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        Ok(self.new_password.clone())
    }
}

async fn password_form(State(state): State<AppState>, user: CurrentUser) -> Html<String> {
    views::admin::password_page(&state, &user, None)
}

async fn change_password(
    State(state): State<AppState>,
    user: CurrentUser,
    form: Result<Form<ChangePasswordForm>, FormRejection>,
) -> Result<Response, AppError> {
    let form = extract_csrf_form(&user, form)?;
    match apply(&state, &user, &form).await {
        Ok(()) => Ok(redirect_with(
            &state,
            &user,
            "/",
            Flash::success("Your password has been changed."),
        )),
        Err(e) => form_error(e, |msg| views::admin::password_page(&state, &user, Some(msg))),
    }
}

async fn apply(
    state: &AppState,
    user: &CurrentUser,
    form: &ChangePasswordForm,
) -> Result<(), AppError> {
    let record = state
        .users
        .get(&user.id)
        .ok_or_else(|| AppError::NotFound("user account".into()))?;
    let current = form.current_password.clone();
    let stored = record.password_hash;
    if !run_password_task(move || verify_password(&current, &stored)).await? {
        tracing::info!(user = %user.username, "password change with wrong current password");
        return Err(AppError::Validation("The current password is incorrect.".into()));
    }
    let new_password = form.validate(state.today())?;
    let iterations = state.config.password_iterations;
    let hash = run_password_task(move || hash_password(&new_password, iterations)).await?;
    let now = Utc::now();

    if let Some(pool) = &state.db_pool {
        crate::db::users::update_password(pool, user.id, &hash, now).await?;
    }
    state.users.update(&user.id, |u| {
        u.password_hash = hash;
        u.updated_at = now;
    });
    // Other browsers signed in as this user must sign in again.
    let ended = state.sessions.remove_user(user.id, Some(&user.session_token));

    tracing::info!(user = %user.username, other_sessions_ended = ended, "password changed");
    crate::audit::record(
        state,
        &user.username,
        "user.password_change",
        "user",
        *user.id.as_uuid(),
        json!({ "other_sessions_ended": ended }),
    )
    .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(new: &str, confirm: &str) -> ChangePasswordForm {
        ChangePasswordForm {
            new_password: new.into(),
            confirm_password: confirm.into(),
            ..Default::default()
        }
    }

    #[test]
    fn confirmation_must_match() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert!(form("long enough pw", "long enough pw").validate(today).is_ok());
        assert_eq!(
            form("long enough pw", "long enough pX").validate(today),
            Err(ValidationError::PasswordMismatch)
        );
        assert_eq!(
            form("short", "short").validate(today),
            Err(ValidationError::WeakPassword)
        );
    }
}
