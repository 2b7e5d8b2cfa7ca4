//! # Audit Trail
//!
//! Routes:
//! - GET /audit — Recent audit entries with chain verification (Admin)

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use portstock_core::Role;
use serde::Deserialize;

use crate::auth::{require_role, CurrentUser};
use crate::error::AppError;
use crate::extractors::non_blank;
use crate::state::AppState;
use crate::views::{self, Layout};

const DEFAULT_LIMIT: usize = 200;
const MAX_LIMIT: usize = 2000;

pub fn router() -> Router<AppState> {
    Router::new().route("/audit", get(audit_log))
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub resource_type: Option<String>,
    pub limit: Option<usize>,
}

async fn audit_log(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<AuditQuery>,
) -> Result<Html<String>, AppError> {
    require_role(&user, Role::Admin)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let resource_type = non_blank(&query.resource_type);
    let entries = state.audit.recent(limit, resource_type);
    let integrity = state.audit.verify();
    if !integrity.is_valid() {
        tracing::warn!(broken = ?integrity.broken, "audit chain verification failed");
    }
    Ok(views::admin::audit_page(
        Layout::for_user(&state, &user, "Audit trail"),
        &entries,
        &integrity,
        resource_type.unwrap_or(""),
    ))
}
