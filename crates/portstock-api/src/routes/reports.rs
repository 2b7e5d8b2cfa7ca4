//! # Reports
//!
//! Routes (any signed-in user; every report takes `?print=1`):
//! - GET /reports              — Report index
//! - GET /reports/stock        — Stock position per item and terminal
//! - GET /reports/movements    — Movement register for a date range
//! - GET /reports/consumption  — Net consumption per department and item

use axum::extract::{Query, RawQuery, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use portstock_core::report::{department_consumption, movement_register, stock_summary, StockFilter};
use portstock_core::{Category, ValidationError};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::extractors::{checked, non_blank, optional};
use crate::routes::{print_href, RegisterQuery};
use crate::state::AppState;
use crate::views::{self, Layout, Lookup};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reports", get(index))
        .route("/reports/stock", get(stock_report))
        .route("/reports/movements", get(movement_report))
        .route("/reports/consumption", get(consumption_report))
}

#[derive(Debug, Default, Deserialize)]
pub struct StockReportQuery {
    pub category: Option<String>,
    pub low: Option<String>,
    pub inactive: Option<String>,
    pub q: Option<String>,
    pub print: Option<String>,
}

impl StockReportQuery {
    pub fn filter(&self) -> Result<StockFilter, ValidationError> {
        Ok(StockFilter {
            category: optional::<Category>(&self.category)?,
            low_only: checked(&self.low),
            include_inactive: checked(&self.inactive),
            search: non_blank(&self.q).map(str::to_string),
        })
    }

    pub fn is_print(&self) -> bool {
        checked(&self.print)
    }
}

async fn index(State(state): State<AppState>, user: CurrentUser) -> Html<String> {
    views::reports::index(Layout::for_user(&state, &user, "Reports"))
}

async fn stock_report(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<StockReportQuery>,
    RawQuery(raw): RawQuery,
) -> Result<Html<String>, AppError> {
    let filter = query.filter()?;
    let summary = stock_summary(&state.items.list(), &filter);
    let layout = Layout::for_user(&state, &user, "Stock position").print(query.is_print());
    Ok(views::reports::stock(
        layout,
        &summary,
        &query,
        &print_href("/reports/stock", raw.as_deref().unwrap_or("")),
    ))
}

async fn movement_report(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<RegisterQuery>,
    RawQuery(raw): RawQuery,
) -> Result<Html<String>, AppError> {
    let range = query.range(state.today())?;
    let filter = query.filter()?;
    let register = movement_register(
        &state.receipts.list(),
        &state.issues.list(),
        &state.returns.list(),
        &range,
        &filter,
    );
    let mut items = state.items.list();
    items.sort_by(|a, b| a.code.cmp(&b.code));
    let layout = Layout::for_user(&state, &user, "Movement register").print(query.is_print());
    Ok(views::reports::movements(
        layout,
        &register,
        &items,
        &Lookup::new(&state),
        &query,
        &range,
        &print_href("/reports/movements", raw.as_deref().unwrap_or("")),
    ))
}

async fn consumption_report(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<RegisterQuery>,
    RawQuery(raw): RawQuery,
) -> Result<Html<String>, AppError> {
    let range = query.range(state.today())?;
    let filter = query.filter()?;
    let mut departments = state.departments.list();
    departments.sort_by(|a, b| a.name.cmp(&b.name));
    let rows: Vec<_> = department_consumption(
        &state.items.list(),
        &departments,
        &state.issues.list(),
        &state.returns.list(),
        &range,
    )
    .into_iter()
    .filter(|r| filter.department_id.map_or(true, |d| r.department_id == d))
    .filter(|r| filter.item_id.map_or(true, |i| r.item_id == i))
    .collect();

    let layout =
        Layout::for_user(&state, &user, "Departmental consumption").print(query.is_print());
    Ok(views::reports::consumption(
        layout,
        &rows,
        &departments,
        &query,
        &range,
        &print_href("/reports/consumption", raw.as_deref().unwrap_or("")),
    ))
}
