//! # User Administration
//!
//! Routes (Admin only):
//! - GET  /users               — Account list
//! - GET  /users/new           — New account form
//! - POST /users               — Create an account
//! - GET  /users/:id/edit      — Edit profile and reset password
//! - POST /users/:id           — Update name, role and active flag
//! - POST /users/:id/password  — Set a new password and end the user's sessions
//!
//! An administrator cannot deactivate or demote their own account, and the
//! last active administrator cannot be deactivated or demoted by anyone.

use axum::extract::rejection::FormRejection;
use axum::extract::{Path, State};
use axum::response::{Html, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::{NaiveDate, Utc};
use portstock_core::sanitize::clean_text;
use portstock_core::{validate_password, Role, UserId, UserRecord, Username, ValidationError};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{hash_password, require_role, run_password_task, CurrentUser, Flash};
use crate::error::AppError;
use crate::extractors::{checked, csrf_form, extract_csrf_form, required, Validate};
use crate::routes::{form_error, parse_id, redirect_with};
use crate::state::AppState;
use crate::views::{self, Layout};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/new", get(new_user))
        .route("/users/:id", post(update_user))
        .route("/users/:id/edit", get(edit_user))
        .route("/users/:id/password", post(reset_password))
}

// ── Forms ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewUserForm {
    pub csrf_token: String,
    pub username: String,
    pub full_name: String,
    pub role: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    pub csrf_token: String,
    pub full_name: String,
    pub role: String,
    pub active: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResetPasswordForm {
    pub csrf_token: String,
    pub password: String,
    pub confirm_password: String,
}

csrf_form!(NewUserForm, ProfileForm, ResetPasswordForm);

#[derive(Debug)]
pub struct NewUser {
    pub username: Username,
    pub full_name: String,
    pub role: Role,
    pub password: String,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Profile {
    pub full_name: String,
    pub role: Role,
    pub active: bool,
}

fn confirmed_password(password: &str, confirm: &str) -> Result<String, ValidationError> {
    validate_password(password)?;
    if password != confirm {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(password.to_string())
}

impl Validate for NewUserForm {
    type Output = NewUser;

    fn validate(&self, _today: NaiveDate) -> Result<NewUser, ValidationError> {
        if self.username.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "username" });
        }
        Ok(NewUser {
            username: Username::new(&self.username)?,
            full_name: clean_text("full name", &self.full_name, 120)?,
            role: required::<Role>("role", &self.role)?,
            password: confirmed_password(&self.password, &self.confirm_password)?,
        })
    }
}

impl Validate for ProfileForm {
    type Output = Profile;

    fn validate(&self, _today: NaiveDate) -> Result<Profile, ValidationError> {
        Ok(Profile {
            full_name: clean_text("full name", &self.full_name, 120)?,
            role: required::<Role>("role", &self.role)?,
            active: checked(&self.active),
        })
    }
}

impl Validate for ResetPasswordForm {
    type Output = String;

    fn validate(&self, _today: NaiveDate) -> Result<String, ValidationError> {
        confirmed_password(&self.password, &self.confirm_password)
    }
}

impl ProfileForm {
    fn from_record(user: &UserRecord) -> Self {
        Self {
            csrf_token: String::new(),
            full_name: user.full_name.clone(),
            role: user.role.as_str().to_string(),
            active: user.active.then(|| "on".to_string()),
        }
    }
}

/// Refuse profile changes that would lock administrators out.
pub fn check_admin_safety(
    actor: UserId,
    target: &UserRecord,
    change: &Profile,
    active_admins: usize,
) -> Result<(), AppError> {
    let loses_admin = target.role == Role::Admin
        && target.active
        && (change.role != Role::Admin || !change.active);
    if target.id == actor && (!change.active || change.role < target.role) {
        return Err(AppError::Conflict(
            "you cannot deactivate or demote your own account".into(),
        ));
    }
    if loses_admin && active_admins <= 1 {
        return Err(AppError::Conflict(
            "this is the last active administrator; promote another user first".into(),
        ));
    }
    Ok(())
}

fn username_conflict(name: &Username) -> AppError {
    AppError::Conflict(format!("the username {name} is already taken"))
}

fn find_user(state: &AppState, raw: &str) -> Result<UserRecord, AppError> {
    let id: UserId = parse_id(raw, "user")?;
    state
        .users
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))
}

// ── Handlers ────────────────────────────────────────────────────────────────

async fn list_users(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Html<String>, AppError> {
    require_role(&user, Role::Admin)?;
    let mut users = state.users.list();
    users.sort_by(|a, b| a.username.cmp(&b.username));
    Ok(views::admin::user_list(
        Layout::for_user(&state, &user, "Users"),
        &user,
        &users,
    ))
}

async fn new_user(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Html<String>, AppError> {
    require_role(&user, Role::Admin)?;
    let form = NewUserForm {
        role: Role::Viewer.as_str().to_string(),
        ..NewUserForm::default()
    };
    Ok(views::admin::new_user_form(
        Layout::for_user(&state, &user, "New user"),
        &user,
        &form,
        None,
    ))
}

async fn create_user(
    State(state): State<AppState>,
    user: CurrentUser,
    form: Result<Form<NewUserForm>, FormRejection>,
) -> Result<Response, AppError> {
    require_role(&user, Role::Admin)?;
    let form = extract_csrf_form(&user, form)?;
    match create(&state, &user, &form).await {
        Ok(created) => Ok(redirect_with(
            &state,
            &user,
            "/users",
            Flash::success(format!("Account {} created.", created.username)),
        )),
        Err(e) => form_error(e, |msg| {
            views::admin::new_user_form(
                Layout::for_user(&state, &user, "New user"),
                &user,
                &form,
                Some(msg),
            )
        }),
    }
}

async fn create(
    state: &AppState,
    actor: &CurrentUser,
    form: &NewUserForm,
) -> Result<UserRecord, AppError> {
    let input = form.validate(state.today())?;
    let iterations = state.config.password_iterations;
    let password = input.password;
    let password_hash = run_password_task(move || hash_password(&password, iterations)).await?;
    let now = Utc::now();
    let record = UserRecord {
        id: UserId::new(),
        username: input.username,
        full_name: input.full_name,
        role: input.role,
        password_hash,
        active: true,
        created_at: now,
        updated_at: now,
        last_login_at: None,
    };
    let name = record.username.clone();
    state
        .users
        .try_insert_unique(record.id, record.clone(), |u| u.username == name)
        .map_err(|rejected| username_conflict(&rejected.username))?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::users::insert(pool, &record).await {
            state.users.remove(&record.id);
            if crate::db::is_unique_violation(&e) {
                return Err(username_conflict(&record.username));
            }
            tracing::error!(user_id = %record.id, error = %e, "failed to persist user");
            return Err(AppError::from(e));
        }
    }

    tracing::info!(
        user_id = %record.id,
        username = %record.username,
        role = %record.role,
        by = %actor.username,
        "user created"
    );
    crate::audit::record(
        state,
        &actor.username,
        "user.create",
        "user",
        *record.id.as_uuid(),
        json!({ "username": record.username.as_str(), "role": record.role.as_str() }),
    )
    .await;
    Ok(record)
}

async fn edit_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    require_role(&user, Role::Admin)?;
    let target = find_user(&state, &id)?;
    let title = format!("Edit {}", target.username);
    Ok(views::admin::edit_user_form(
        Layout::for_user(&state, &user, &title),
        &user,
        &target,
        &ProfileForm::from_record(&target),
        None,
    ))
}

async fn update_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    form: Result<Form<ProfileForm>, FormRejection>,
) -> Result<Response, AppError> {
    require_role(&user, Role::Admin)?;
    let target = find_user(&state, &id)?;
    let form = extract_csrf_form(&user, form)?;
    match update(&state, &user, &target, &form).await {
        Ok(updated) => Ok(redirect_with(
            &state,
            &user,
            "/users",
            Flash::success(format!("Account {} saved.", updated.username)),
        )),
        Err(e) => {
            let title = format!("Edit {}", target.username);
            form_error(e, |msg| {
                views::admin::edit_user_form(
                    Layout::for_user(&state, &user, &title),
                    &user,
                    &target,
                    &form,
                    Some(msg),
                )
            })
        }
    }
}

async fn update(
    state: &AppState,
    actor: &CurrentUser,
    target: &UserRecord,
    form: &ProfileForm,
) -> Result<UserRecord, AppError> {
    let change = form.validate(state.today())?;
    let now = Utc::now();

    // Count and write under one lock so two admins demoting each other
    // cannot both pass the last-admin check.
    let (previous, updated) = state
        .users
        .try_update_against_all(
            &target.id,
            |current, all| {
                let active_admins = all.filter(|u| u.active && u.role == Role::Admin).count();
                check_admin_safety(actor.id, current, &change, active_admins)
            },
            |u| {
                let previous = u.clone();
                u.full_name = change.full_name.clone();
                u.role = change.role;
                u.active = change.active;
                u.updated_at = now;
                (previous, u.clone())
            },
        )
        .ok_or_else(|| AppError::NotFound(format!("user {}", target.id)))??;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::users::update_profile(pool, &updated).await {
            let restore = previous.clone();
            state.users.update(&target.id, move |u| {
                u.full_name = restore.full_name;
                u.role = restore.role;
                u.active = restore.active;
                u.updated_at = restore.updated_at;
            });
            return Err(e.into());
        }
    }

    let ended = if updated.active {
        0
    } else {
        state.sessions.remove_user(updated.id, None)
    };
    tracing::info!(
        user_id = %updated.id,
        role = %updated.role,
        active = updated.active,
        sessions_ended = ended,
        by = %actor.username,
        "user updated"
    );
    crate::audit::record(
        state,
        &actor.username,
        "user.update",
        "user",
        *updated.id.as_uuid(),
        json!({
            "full_name": &updated.full_name,
            "role": updated.role.as_str(),
            "active": updated.active,
            "previous": { "role": previous.role.as_str(), "active": previous.active },
        }),
    )
    .await;
    Ok(updated)
}

async fn reset_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    form: Result<Form<ResetPasswordForm>, FormRejection>,
) -> Result<Response, AppError> {
    require_role(&user, Role::Admin)?;
    let target = find_user(&state, &id)?;
    let form = extract_csrf_form(&user, form)?;
    let result: Result<usize, AppError> = async {
        let password = form.validate(state.today())?;
        let iterations = state.config.password_iterations;
        let hash = run_password_task(move || hash_password(&password, iterations)).await?;
        let now = Utc::now();
        if let Some(pool) = &state.db_pool {
            crate::db::users::update_password(pool, target.id, &hash, now).await?;
        }
        state.users.update(&target.id, |u| {
            u.password_hash = hash;
            u.updated_at = now;
        });
        Ok(state.sessions.remove_user(target.id, None))
    }
    .await;

    match result {
        Ok(ended) => {
            tracing::info!(
                user_id = %target.id,
                sessions_ended = ended,
                by = %user.username,
                "password reset"
            );
            crate::audit::record(
                &state,
                &user.username,
                "user.password_reset",
                "user",
                *target.id.as_uuid(),
                json!({ "sessions_ended": ended }),
            )
            .await;
            // Resetting your own password also ends your own session.
            let to = if target.id == user.id { "/login" } else { "/users" };
            Ok(redirect_with(
                &state,
                &user,
                to,
                Flash::success(format!("Password for {} has been reset.", target.username)),
            ))
        }
        Err(e) => {
            let title = format!("Edit {}", target.username);
            form_error(e, |msg| {
                views::admin::edit_user_form(
                    Layout::for_user(&state, &user, &title),
                    &user,
                    &target,
                    &ProfileForm::from_record(&target),
                    Some(msg),
                )
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(role: Role, active: bool) -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id: UserId::new(),
            username: Username::new("someone").unwrap(),
            full_name: "Some One".into(),
            role,
            password_hash: String::new(),
            active,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    fn change(role: Role, active: bool) -> Profile {
        Profile { full_name: "Some One".into(), role, active }
    }

    #[test]
    fn admin_cannot_demote_or_deactivate_self() {
        let me = record(Role::Admin, true);
        assert!(check_admin_safety(me.id, &me, &change(Role::Storekeeper, true), 3).is_err());
        assert!(check_admin_safety(me.id, &me, &change(Role::Admin, false), 3).is_err());
        assert!(check_admin_safety(me.id, &me, &change(Role::Admin, true), 3).is_ok());
    }

    #[test]
    fn last_active_admin_is_protected() {
        let other = record(Role::Admin, true);
        let actor = UserId::new();
        assert!(check_admin_safety(actor, &other, &change(Role::Viewer, true), 1).is_err());
        assert!(check_admin_safety(actor, &other, &change(Role::Viewer, true), 2).is_ok());
    }

    fn signed_in(user: &UserRecord) -> CurrentUser {
        CurrentUser {
            id: user.id,
            username: user.username.to_string(),
            full_name: user.full_name.clone(),
            role: user.role,
            session_token: format!("session-{}", user.id),
            csrf_token: "tok".into(),
        }
    }

    fn demotion() -> ProfileForm {
        ProfileForm {
            full_name: "Some One".into(),
            role: "viewer".into(),
            active: Some("on".into()),
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn admins_demoting_each_other_leave_one_admin() {
        let state = AppState::new();
        let mut a = record(Role::Admin, true);
        a.username = Username::new("admin.a").unwrap();
        let mut b = record(Role::Admin, true);
        b.username = Username::new("admin.b").unwrap();
        state.users.insert(a.id, a.clone());
        state.users.insert(b.id, b.clone());

        let tasks = [(a.clone(), b.clone()), (b, a)].map(|(actor, target)| {
            let state = state.clone();
            tokio::spawn(async move {
                update(&state, &signed_in(&actor), &target, &demotion())
                    .await
                    .is_ok()
            })
        });
        let mut demoted = 0;
        for task in tasks {
            if task.await.unwrap() {
                demoted += 1;
            }
        }
        assert_eq!(demoted, 1);
        assert_eq!(
            state
                .users
                .filter(|u| u.active && u.role == Role::Admin)
                .len(),
            1
        );
    }

    #[test]
    fn non_admin_changes_are_unrestricted() {
        let clerk = record(Role::Storekeeper, true);
        assert!(check_admin_safety(UserId::new(), &clerk, &change(Role::Viewer, false), 1).is_ok());
        assert!(check_admin_safety(UserId::new(), &clerk, &change(Role::Admin, true), 1).is_ok());
    }

    #[test]
    fn new_user_form_validation() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let form = NewUserForm {
            username: "J.Silva".into(),
            full_name: "João Silva".into(),
            role: "storekeeper".into(),
            password: "a long password".into(),
            confirm_password: "a long password".into(),
            ..Default::default()
        };
        let input = form.validate(today).unwrap();
        assert_eq!(input.username.as_str(), "j.silva");
        assert_eq!(input.role, Role::Storekeeper);

        let mismatch = NewUserForm { confirm_password: "different pw".into(), ..form };
        assert_eq!(mismatch.validate(today).unwrap_err(), ValidationError::PasswordMismatch);
    }
}
