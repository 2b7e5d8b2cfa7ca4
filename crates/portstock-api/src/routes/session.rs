//! # Sign-in and Sign-out
//!
//! Routes:
//! - GET  /login  — Sign-in form
//! - POST /login  — Verify credentials, start a session (throttled per username)
//! - POST /logout — End the current session

use axum::extract::rejection::FormRejection;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::Utc;
use serde::Deserialize;

use crate::auth::{
    clear_session_cookie, dummy_hash, read_cookie, run_password_task, safe_next, session_cookie,
    verify_password, CurrentUser, SESSION_COOKIE,
};
use crate::error::AppError;
use crate::extractors::{csrf_form, extract_csrf_form, extract_form};
use crate::state::AppState;
use crate::views;

pub fn router() -> Router<AppState> {
    Router::new().route("/login", get(login_form).post(login))
}

pub fn protected_router() -> Router<AppState> {
    Router::new().route("/logout", post(logout))
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LogoutForm {
    pub csrf_token: String,
}

csrf_form!(LogoutForm);

const INVALID_CREDENTIALS: &str = "Invalid username or password.";

async fn login_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LoginQuery>,
) -> Response {
    // Already signed in: skip the form.
    let signed_in = read_cookie(&headers, SESSION_COOKIE)
        .and_then(|token| state.sessions.touch(&token))
        .is_some();
    if signed_in {
        return Redirect::to(&safe_next(query.next.as_deref())).into_response();
    }
    views::admin::login_page("", query.next.as_deref().unwrap_or(""), None).into_response()
}

async fn login(
    State(state): State<AppState>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<Response, AppError> {
    let form = extract_form(form)?;
    let key = form.username.trim().to_lowercase();
    let page =
        |msg: &str| -> Html<String> { views::admin::login_page(&key, &form.next, Some(msg)) };

    if !state.login_limiter.try_acquire(&key) {
        tracing::warn!(username = %key, "sign-in blocked after repeated failures");
        return Ok((
            StatusCode::TOO_MANY_REQUESTS,
            page("Too many failed sign-in attempts. Try again in 15 minutes."),
        )
            .into_response());
    }

    let user = state
        .users
        .filter(|u| u.username.as_str() == key)
        .into_iter()
        .next();
    let password = form.password.clone();
    let stored = user.as_ref().map(|u| u.password_hash.clone());
    let iterations = state.config.password_iterations;
    let verified = run_password_task(move || match stored {
        Some(hash) => verify_password(&password, &hash),
        None => {
            verify_password(&password, &dummy_hash(iterations));
            false
        }
    })
    .await?;

    // The attempt reserved above stays counted unless the sign-in succeeds.
    let user = match user {
        Some(u) if verified && u.active => u,
        Some(_) if verified => {
            tracing::info!(username = %key, "sign-in refused for inactive account");
            return Ok((StatusCode::UNAUTHORIZED, page(INVALID_CREDENTIALS)).into_response());
        }
        _ => {
            tracing::info!(username = %key, "failed sign-in");
            return Ok((StatusCode::UNAUTHORIZED, page(INVALID_CREDENTIALS)).into_response());
        }
    };

    state.login_limiter.reset(&key);
    let now = Utc::now();
    state.users.update(&user.id, |u| u.last_login_at = Some(now));
    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::users::touch_login(pool, user.id, now).await {
            tracing::warn!(user = %key, error = %e, "failed to record last sign-in time");
        }
    }

    let session = state.sessions.create(user.id);
    tracing::info!(user = %key, role = user.role.as_str(), "signed in");
    let target = safe_next(Some(&form.next));
    Ok((
        [(header::SET_COOKIE, session_cookie(&session.token, state.config.secure_cookies))],
        Redirect::to(&target),
    )
        .into_response())
}

async fn logout(
    State(state): State<AppState>,
    user: CurrentUser,
    form: Result<Form<LogoutForm>, FormRejection>,
) -> Result<Response, AppError> {
    extract_csrf_form(&user, form)?;
    state.sessions.remove(&user.session_token);
    tracing::info!(user = %user.username, "signed out");
    Ok((
        [(header::SET_COOKIE, clear_session_cookie(state.config.secure_cookies))],
        Redirect::to("/login"),
    )
        .into_response())
}
