//! # Item Catalog
//!
//! Routes:
//! - GET  /items             — Catalog with search, category and status filters
//! - GET  /items/new         — New-item form (Storekeeper)
//! - POST /items             — Create item with optional opening stock (Storekeeper)
//! - GET  /items/:id         — Item detail and stock card (`?print=1`)
//! - GET  /items/:id/edit    — Edit form (Storekeeper)
//! - POST /items/:id         — Update details, activate/deactivate (Storekeeper)
//! - POST /items/:id/delete  — Delete an item that never moved (Admin)

use axum::extract::rejection::FormRejection;
use axum::extract::{Path, Query, State};
use axum::response::{Html, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::NaiveDate;
use portstock_core::report::{item_ledger, stock_summary, StockFilter};
use portstock_core::sanitize::{clean_optional, clean_text, parse_business_date};
use portstock_core::{
    Category, ItemCode, ItemId, ItemRecord, Quantity, Role, Terminal, ValidationError,
};
use serde::Deserialize;

use crate::auth::{require_role, CurrentUser, Flash};
use crate::error::AppError;
use crate::extractors::{checked, csrf_form, extract_csrf_form, optional, required, Validate};
use crate::inventory::{self, ItemInput};
use crate::routes::{form_error, parse_id, redirect_with, PrintQuery};
use crate::state::AppState;
use crate::views::{self, Layout, Lookup};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/new", get(new_item))
        .route("/items/:id", get(show_item).post(update_item))
        .route("/items/:id/edit", get(edit_item))
        .route("/items/:id/delete", post(delete_item))
}

// ── Forms ───────────────────────────────────────────────────────────────────

/// Catalog filters.
#[derive(Debug, Default, Deserialize)]
pub struct ItemListQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    /// `active` (default), `all` or `inactive`.
    pub status: Option<String>,
    pub low: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ItemForm {
    pub csrf_token: String,
    pub code: String,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub reorder_level: String,
    pub opening_jct: String,
    pub opening_uct: String,
    pub opened_on: String,
    pub active: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteForm {
    pub csrf_token: String,
}

csrf_form!(ItemForm, DeleteForm);

/// Validated item form.
#[derive(Debug)]
pub struct ItemDraft {
    pub input: ItemInput,
    pub opening: Vec<(Terminal, Quantity)>,
    pub opened_on: NaiveDate,
    pub active: bool,
}

impl ItemForm {
    fn from_record(item: &ItemRecord) -> Self {
        Self {
            code: item.code.to_string(),
            name: item.name.clone(),
            category: item.category.as_str().to_string(),
            unit: item.unit.clone(),
            reorder_level: item.reorder_level.to_string(),
            active: item.active.then(|| "on".to_string()),
            ..Self::default()
        }
    }
}

fn reorder_level(input: &str) -> Result<i64, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    match trimmed.parse::<i64>() {
        Ok(n) if (0..=Quantity::MAX).contains(&n) => Ok(n),
        _ => Err(ValidationError::InvalidQuantity {
            field: "reorder level",
            value: input.to_string(),
            min: 0,
            max: Quantity::MAX,
        }),
    }
}

fn opening(field: &'static str, input: &str) -> Result<Option<Quantity>, ValidationError> {
    match input.trim() {
        "" | "0" => Ok(None),
        s => Quantity::parse(field, s).map(Some),
    }
}

impl Validate for ItemForm {
    type Output = ItemDraft;

    fn validate(&self, today: NaiveDate) -> Result<ItemDraft, ValidationError> {
        let input = ItemInput {
            code: ItemCode::new(&self.code)?,
            name: clean_text("name", &self.name, 120)?,
            category: required::<Category>("category", &self.category)?,
            unit: clean_optional("unit", &self.unit, 24)?.unwrap_or_else(|| "piece".to_string()),
            reorder_level: reorder_level(&self.reorder_level)?,
        };
        let mut opening_stock = Vec::new();
        if let Some(q) = opening("opening stock at JCT", &self.opening_jct)? {
            opening_stock.push((Terminal::Jct, q));
        }
        if let Some(q) = opening("opening stock at UCT", &self.opening_uct)? {
            opening_stock.push((Terminal::Uct, q));
        }
        Ok(ItemDraft {
            input,
            opening: opening_stock,
            opened_on: parse_business_date("opening date", &self.opened_on, today)?,
            active: checked(&self.active),
        })
    }
}

// ── Handlers ────────────────────────────────────────────────────────────────

async fn list_items(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ItemListQuery>,
) -> Result<Html<String>, AppError> {
    let status = query.status.as_deref().unwrap_or("active");
    let filter = StockFilter {
        category: optional::<Category>(&query.category)?,
        low_only: checked(&query.low),
        include_inactive: status != "active",
        search: query.q.clone().filter(|s| !s.trim().is_empty()),
    };
    let mut summary = stock_summary(&state.items.list(), &filter);
    if status == "inactive" {
        summary.rows.retain(|r| !r.active);
    }
    let layout = Layout::for_user(&state, &user, "Items");
    Ok(views::inventory::item_list(
        layout,
        &summary,
        &query,
        user.has_role(Role::Storekeeper),
    ))
}

async fn new_item(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Html<String>, AppError> {
    require_role(&user, Role::Storekeeper)?;
    let form = ItemForm {
        category: Category::Paper.as_str().to_string(),
        ..ItemForm::default()
    };
    Ok(views::inventory::item_form(
        Layout::for_user(&state, &user, "New item"),
        &user,
        &form,
        None,
        None,
    ))
}

async fn create_item(
    State(state): State<AppState>,
    user: CurrentUser,
    form: Result<Form<ItemForm>, FormRejection>,
) -> Result<Response, AppError> {
    require_role(&user, Role::Storekeeper)?;
    let form = extract_csrf_form(&user, form)?;
    let result: Result<ItemRecord, AppError> = async {
        let draft = form.validate(state.today())?;
        inventory::create_item(&state, &user, draft.input, &draft.opening, draft.opened_on).await
    }
    .await;
    match result {
        Ok(item) => Ok(redirect_with(
            &state,
            &user,
            &format!("/items/{}", item.id),
            Flash::success(format!("Item {} created.", item.code)),
        )),
        Err(e) => form_error(e, |msg| {
            views::inventory::item_form(
                Layout::for_user(&state, &user, "New item"),
                &user,
                &form,
                None,
                Some(msg),
            )
        }),
    }
}

async fn show_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Query(print): Query<PrintQuery>,
) -> Result<Html<String>, AppError> {
    let id: ItemId = parse_id(&id, "item")?;
    let item = state
        .items
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("item {id}")))?;
    let ledger = item_ledger(
        id,
        &state.receipts.list(),
        &state.issues.list(),
        &state.returns.list(),
    );
    let title = format!("Stock card: {} {}", item.code, item.name);
    let layout = Layout::for_user(&state, &user, &title).print(print.is_print());
    Ok(views::inventory::item_detail(
        layout,
        &user,
        &item,
        &ledger,
        &Lookup::new(&state),
        print.is_print(),
    ))
}

async fn edit_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    require_role(&user, Role::Storekeeper)?;
    let id: ItemId = parse_id(&id, "item")?;
    let item = state
        .items
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("item {id}")))?;
    Ok(views::inventory::item_form(
        Layout::for_user(&state, &user, "Edit item"),
        &user,
        &ItemForm::from_record(&item),
        Some(&item),
        None,
    ))
}

async fn update_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    form: Result<Form<ItemForm>, FormRejection>,
) -> Result<Response, AppError> {
    require_role(&user, Role::Storekeeper)?;
    let id: ItemId = parse_id(&id, "item")?;
    let form = extract_csrf_form(&user, form)?;
    let existing = state
        .items
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("item {id}")))?;
    let result: Result<ItemRecord, AppError> = async {
        let draft = form.validate(state.today())?;
        inventory::update_item(&state, &user, id, draft.input, draft.active).await
    }
    .await;
    match result {
        Ok(item) => Ok(redirect_with(
            &state,
            &user,
            &format!("/items/{id}"),
            Flash::success(format!("Item {} updated.", item.code)),
        )),
        Err(e) => form_error(e, |msg| {
            views::inventory::item_form(
                Layout::for_user(&state, &user, "Edit item"),
                &user,
                &form,
                Some(&existing),
                Some(msg),
            )
        }),
    }
}

async fn delete_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    form: Result<Form<DeleteForm>, FormRejection>,
) -> Result<Response, AppError> {
    require_role(&user, Role::Admin)?;
    let id: ItemId = parse_id(&id, "item")?;
    extract_csrf_form(&user, form)?;
    match inventory::delete_item(&state, &user, id).await {
        Ok(item) => Ok(redirect_with(
            &state,
            &user,
            "/items",
            Flash::success(format!("Item {} deleted.", item.code)),
        )),
        Err(AppError::Conflict(msg)) => Ok(redirect_with(
            &state,
            &user,
            &format!("/items/{id}"),
            Flash::error(msg),
        )),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
    }

    fn form() -> ItemForm {
        ItemForm {
            code: " tn-85a ".into(),
            name: "HP 85A  toner".into(),
            category: "toner".into(),
            unit: "cartridge".into(),
            reorder_level: "4".into(),
            opening_jct: "10".into(),
            opening_uct: "".into(),
            active: Some("on".into()),
            ..Default::default()
        }
    }

    #[test]
    fn valid_form_normalizes_fields() {
        let draft = form().validate(today()).unwrap();
        assert_eq!(draft.input.code.as_str(), "TN-85A");
        assert_eq!(draft.input.name, "HP 85A toner");
        assert_eq!(draft.input.category, Category::Toner);
        assert_eq!(draft.input.reorder_level, 4);
        assert_eq!(draft.opening, vec![(Terminal::Jct, Quantity::new(10).unwrap())]);
        assert_eq!(draft.opened_on, today());
        assert!(draft.active);
    }

    #[test]
    fn blank_unit_and_reorder_level_default() {
        let draft = ItemForm {
            unit: " ".into(),
            reorder_level: "".into(),
            ..form()
        }
        .validate(today())
        .unwrap();
        assert_eq!(draft.input.unit, "piece");
        assert_eq!(draft.input.reorder_level, 0);
    }

    #[test]
    fn rejects_bad_input() {
        let bad_code = ItemForm { code: "TN 85A".into(), ..form() };
        assert!(matches!(
            bad_code.validate(today()),
            Err(ValidationError::InvalidItemCode(_))
        ));

        let negative = ItemForm { opening_uct: "-3".into(), ..form() };
        assert!(matches!(
            negative.validate(today()),
            Err(ValidationError::InvalidQuantity { .. })
        ));

        let future = ItemForm { opened_on: "2026-03-16".into(), ..form() };
        assert!(matches!(
            future.validate(today()),
            Err(ValidationError::FutureDate { .. })
        ));

        let no_category = ItemForm { category: "".into(), ..form() };
        assert_eq!(
            no_category.validate(today()).unwrap_err(),
            ValidationError::EmptyField { field: "category" }
        );
    }
}
