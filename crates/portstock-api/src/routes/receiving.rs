//! # Receiving
//!
//! Routes:
//! - GET  /receipts      — Receipt register (date range, item, terminal; `?print=1`)
//! - GET  /receipts/new  — Receive form, optionally preselecting `?item_id=`
//! - POST /receipts      — Record a receipt and increment the terminal counter

use axum::extract::rejection::FormRejection;
use axum::extract::{Query, RawQuery, State};
use axum::response::{Html, Response};
use axum::routing::get;
use axum::{Form, Router};
use chrono::NaiveDate;
use portstock_core::sanitize::{clean_optional, clean_text, parse_business_date};
use portstock_core::{ItemId, ItemRecord, Quantity, Role, Terminal, ValidationError};
use serde::Deserialize;

use crate::auth::{require_role, CurrentUser, Flash};
use crate::error::AppError;
use crate::extractors::{csrf_form, extract_csrf_form, required, Validate};
use crate::inventory::{self, ReceiptInput};
use crate::routes::{form_error, print_href, redirect_with, RegisterQuery};
use crate::state::AppState;
use crate::views::{self, Layout, Lookup};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/receipts", get(list_receipts).post(create_receipt))
        .route("/receipts/new", get(new_receipt))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReceiptForm {
    pub csrf_token: String,
    pub item_id: String,
    pub terminal: String,
    pub quantity: String,
    pub supplier: String,
    pub reference: String,
    pub received_on: String,
    pub remarks: String,
}

csrf_form!(ReceiptForm);

impl Validate for ReceiptForm {
    type Output = ReceiptInput;

    fn validate(&self, today: NaiveDate) -> Result<ReceiptInput, ValidationError> {
        Ok(ReceiptInput {
            item_id: required::<ItemId>("item", &self.item_id)?,
            terminal: required::<Terminal>("terminal", &self.terminal)?,
            quantity: Quantity::parse("quantity", &self.quantity)?,
            supplier: clean_text("supplier", &self.supplier, 120)?,
            reference: clean_optional("reference", &self.reference, 64)?,
            received_on: parse_business_date("date received", &self.received_on, today)?,
            remarks: clean_optional("remarks", &self.remarks, 500)?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PreselectQuery {
    pub item_id: Option<String>,
}

fn receivable_items(state: &AppState) -> Vec<ItemRecord> {
    let mut items = state.items.filter(|i| i.active);
    items.sort_by(|a, b| a.code.cmp(&b.code));
    items
}

async fn list_receipts(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<RegisterQuery>,
    RawQuery(raw): RawQuery,
) -> Result<Html<String>, AppError> {
    let range = query.range(state.today())?;
    let filter = query.filter()?;
    let mut receipts = state.receipts.filter(|r| {
        range.contains(r.received_on)
            && filter.item_id.map_or(true, |id| r.item_id == id)
            && filter.terminal.map_or(true, |t| r.terminal == t)
    });
    receipts.sort_by(|a, b| {
        b.received_on
            .cmp(&a.received_on)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });

    let mut items = state.items.list();
    items.sort_by(|a, b| a.code.cmp(&b.code));
    let layout = Layout::for_user(&state, &user, "Receipt register").print(query.is_print());
    Ok(views::inventory::receipt_list(
        layout,
        &receipts,
        &items,
        &Lookup::new(&state),
        &query,
        (range.from, range.to),
        &print_href("/receipts", raw.as_deref().unwrap_or("")),
        user.has_role(Role::Storekeeper),
    ))
}

async fn new_receipt(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(pre): Query<PreselectQuery>,
) -> Result<Html<String>, AppError> {
    require_role(&user, Role::Storekeeper)?;
    let form = ReceiptForm {
        item_id: pre.item_id.unwrap_or_default(),
        received_on: state.today().to_string(),
        ..ReceiptForm::default()
    };
    Ok(views::inventory::receipt_form(
        Layout::for_user(&state, &user, "Receive stock"),
        &user,
        &receivable_items(&state),
        &form,
        state.today(),
        None,
    ))
}

async fn create_receipt(
    State(state): State<AppState>,
    user: CurrentUser,
    form: Result<Form<ReceiptForm>, FormRejection>,
) -> Result<Response, AppError> {
    require_role(&user, Role::Storekeeper)?;
    let form = extract_csrf_form(&user, form)?;
    let today = state.today();
    let result: Result<_, AppError> = async {
        let input = form.validate(today)?;
        inventory::receive(&state, &user, input).await
    }
    .await;
    match result {
        Ok(receipt) => {
            let lookup = Lookup::new(&state);
            Ok(redirect_with(
                &state,
                &user,
                "/receipts",
                Flash::success(format!(
                    "Received {} {} of {} into {}.",
                    receipt.quantity.get(),
                    lookup.unit(receipt.item_id),
                    lookup.item_code(receipt.item_id),
                    receipt.terminal.label()
                )),
            ))
        }
        Err(e) => form_error(e, |msg| {
            views::inventory::receipt_form(
                Layout::for_user(&state, &user, "Receive stock"),
                &user,
                &receivable_items(&state),
                &form,
                today,
                Some(msg),
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
    }

    fn form() -> ReceiptForm {
        ReceiptForm {
            item_id: ItemId::new().to_string(),
            terminal: "jct".into(),
            quantity: "50".into(),
            supplier: " Office  Supplies Ltd ".into(),
            reference: "".into(),
            received_on: "2026-03-14".into(),
            ..Default::default()
        }
    }

    #[test]
    fn valid_receipt() {
        let input = form().validate(today()).unwrap();
        assert_eq!(input.terminal, Terminal::Jct);
        assert_eq!(input.quantity.get(), 50);
        assert_eq!(input.supplier, "Office Supplies Ltd");
        assert_eq!(input.reference, None);
        assert_eq!(input.received_on, NaiveDate::from_ymd_opt(2026, 3, 14).unwrap());
    }

    #[test]
    fn zero_quantity_and_missing_supplier_are_rejected() {
        let zero = ReceiptForm { quantity: "0".into(), ..form() };
        assert!(matches!(zero.validate(today()), Err(ValidationError::InvalidQuantity { .. })));

        let no_supplier = ReceiptForm { supplier: "   ".into(), ..form() };
        assert_eq!(
            no_supplier.validate(today()).unwrap_err(),
            ValidationError::EmptyField { field: "supplier" }
        );
    }

    #[test]
    fn unknown_item_id_is_rejected() {
        let bad = ReceiptForm { item_id: "not-a-uuid".into(), ..form() };
        assert!(matches!(bad.validate(today()), Err(ValidationError::InvalidId(_))));
    }
}
