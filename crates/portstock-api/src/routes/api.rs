//! # JSON API
//!
//! Read-only endpoints for spreadsheets and other tools. They use the same
//! session cookie as the pages; without one they answer 401 JSON.
//!
//! Routes:
//! - GET /api/v1/stock             — Stock position of active items
//! - GET /api/v1/stock/low         — Items at or below their reorder level
//! - GET /api/v1/items/:id/ledger  — Stock card of one item

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use portstock_core::report::{item_ledger, stock_summary, StockFilter, StockRow, StockSummary};
use portstock_core::{Category, ItemId};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::CurrentUser;
use crate::error::{ApiError, AppError};
use crate::extractors::{checked, non_blank, optional};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/stock", get(stock))
        .route("/api/v1/stock/low", get(low_stock))
        .route("/api/v1/items/:id/ledger", get(ledger))
}

// ── DTOs ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StockParams {
    /// paper, toner, ribbon or other.
    pub category: Option<String>,
    /// Substring of the item code or name.
    pub q: Option<String>,
    /// `true` to include deactivated items.
    pub include_inactive: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockItem {
    pub item_id: uuid::Uuid,
    pub code: String,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub jct_stock: i64,
    pub uct_stock: i64,
    pub total: i64,
    pub reorder_level: i64,
    pub low_stock: bool,
    pub active: bool,
}

impl From<&StockRow> for StockItem {
    fn from(r: &StockRow) -> Self {
        Self {
            item_id: *r.item_id.as_uuid(),
            code: r.code.clone(),
            name: r.name.clone(),
            category: r.category.as_str().to_string(),
            unit: r.unit.clone(),
            jct_stock: r.jct,
            uct_stock: r.uct,
            total: r.total,
            reorder_level: r.reorder_level,
            low_stock: r.low,
            active: r.active,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockResponse {
    pub items: Vec<StockItem>,
    pub total_jct: i64,
    pub total_uct: i64,
    pub low_stock_count: usize,
}

impl From<StockSummary> for StockResponse {
    fn from(s: StockSummary) -> Self {
        Self {
            items: s.rows.iter().map(StockItem::from).collect(),
            total_jct: s.total_jct,
            total_uct: s.total_uct,
            low_stock_count: s.low_count,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LedgerLine {
    pub movement_id: uuid::Uuid,
    /// receipt, issue or return.
    pub kind: String,
    /// jct or uct.
    pub terminal: String,
    pub date: NaiveDate,
    /// Signed change to the terminal's stock.
    pub delta: i64,
    pub party: String,
    pub balance_jct: i64,
    pub balance_uct: i64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LedgerResponse {
    pub item_id: uuid::Uuid,
    pub code: String,
    pub name: String,
    pub entries: Vec<LedgerLine>,
    pub closing_jct: i64,
    pub closing_uct: i64,
    /// Current counters; equal to the closing balance unless records were edited outside the application.
    pub current_jct: i64,
    pub current_uct: i64,
}

// ── Handlers ────────────────────────────────────────────────────────────────

fn stock_filter(params: &StockParams, low_only: bool) -> Result<StockFilter, AppError> {
    Ok(StockFilter {
        category: optional::<Category>(&params.category)?,
        low_only,
        include_inactive: checked(&params.include_inactive),
        search: non_blank(&params.q).map(str::to_string),
    })
}

/// Stock position of every matching item.
#[utoipa::path(
    get,
    path = "/api/v1/stock",
    params(StockParams),
    responses(
        (status = 200, description = "Stock position", body = StockResponse),
        (status = 401, description = "Not signed in", body = crate::error::ErrorBody),
        (status = 422, description = "Bad filter", body = crate::error::ErrorBody),
    ),
    tag = "stock"
)]
async fn stock(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(params): Query<StockParams>,
) -> Result<Json<StockResponse>, ApiError> {
    let filter = stock_filter(&params, false)?;
    Ok(Json(stock_summary(&state.items.list(), &filter).into()))
}

/// Items at or below their reorder level.
#[utoipa::path(
    get,
    path = "/api/v1/stock/low",
    params(StockParams),
    responses(
        (status = 200, description = "Reorder list", body = StockResponse),
        (status = 401, description = "Not signed in", body = crate::error::ErrorBody),
    ),
    tag = "stock"
)]
async fn low_stock(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(params): Query<StockParams>,
) -> Result<Json<StockResponse>, ApiError> {
    let filter = stock_filter(&params, true)?;
    Ok(Json(stock_summary(&state.items.list(), &filter).into()))
}

/// Stock card of one item with running balances per terminal.
#[utoipa::path(
    get,
    path = "/api/v1/items/{id}/ledger",
    params(("id" = String, Path, description = "Item identifier")),
    responses(
        (status = 200, description = "Stock card", body = LedgerResponse),
        (status = 401, description = "Not signed in", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown item", body = crate::error::ErrorBody),
    ),
    tag = "items"
)]
async fn ledger(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<LedgerResponse>, ApiError> {
    let id: ItemId = id
        .parse()
        .map_err(|_| AppError::NotFound(format!("item {id}")))?;
    let item = state
        .items
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("item {id}")))?;
    let receipts = state.receipts.filter(|r| r.item_id == id);
    let issues = state.issues.filter(|i| i.item_id == id);
    let returns = state.returns.filter(|r| r.item_id == id);
    let card = item_ledger(id, &receipts, &issues, &returns);

    Ok(Json(LedgerResponse {
        item_id: *id.as_uuid(),
        code: item.code.to_string(),
        name: item.name.clone(),
        entries: card
            .entries
            .iter()
            .map(|e| LedgerLine {
                movement_id: *e.movement.id.as_uuid(),
                kind: e.movement.kind.as_str().to_string(),
                terminal: e.movement.terminal.as_str().to_string(),
                date: e.movement.date,
                delta: e.movement.delta,
                party: e.movement.party.clone(),
                balance_jct: e.balance.jct,
                balance_uct: e.balance.uct,
                recorded_at: e.movement.created_at,
            })
            .collect(),
        closing_jct: card.closing.jct,
        closing_uct: card.closing.uct,
        current_jct: item.stock.jct,
        current_uct: item.stock.uct,
    }))
}
