//! # Dashboard
//!
//! Routes:
//! - GET /           — Headline figures, low-stock list, recent movements
//! - GET /dashboard  — Same page

use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use portstock_core::report::{all_movements, stock_summary, StockFilter};

use crate::auth::CurrentUser;
use crate::state::AppState;
use crate::views::inventory::DashboardFigures;
use crate::views::{self, Layout, Lookup};

/// Movements shown under "Recent movements".
const RECENT_MOVEMENTS: usize = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/dashboard", get(dashboard))
}

async fn dashboard(State(state): State<AppState>, user: CurrentUser) -> Html<String> {
    let items = state.items.list();
    let today = state.today();
    let all = stock_summary(&items, &StockFilter::default());
    let low = stock_summary(
        &items,
        &StockFilter {
            low_only: true,
            ..StockFilter::default()
        },
    );

    let figures = DashboardFigures {
        active_items: all.rows.len(),
        units_jct: all.total_jct,
        units_uct: all.total_uct,
        issues_today: state.issues.filter(|i| i.issued_on == today).len(),
        receipts_today: state.receipts.filter(|r| r.received_on == today).len(),
    };

    let mut recent = all_movements(
        &state.receipts.list(),
        &state.issues.list(),
        &state.returns.list(),
    );
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent.truncate(RECENT_MOVEMENTS);

    views::inventory::dashboard(
        Layout::for_user(&state, &user, "Dashboard"),
        &user,
        &figures,
        &low,
        &recent,
        &Lookup::new(&state),
    )
}
