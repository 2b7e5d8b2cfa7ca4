//! # Inventory Operations
//!
//! Every stock mutation goes through this module. The sequence is the same
//! for each operation:
//!
//! 1. Validate references (item, department, issue) against the stores.
//! 2. Reserve in memory with an atomic read-check-write
//!    ([`Store::try_update`](crate::state::Store::try_update)), so two
//!    concurrent issues cannot both pass the stock check.
//! 3. Persist the movement and the counter change in one database
//!    transaction; the SQL repeats the guard.
//! 4. If persistence fails, release the reservation before returning.
//! 5. Append to the audit trail.
//!
//! Increments (receipts) need no reservation: they are persisted first and
//! applied to memory afterwards.

use chrono::{NaiveDate, Utc};
use portstock_core::report::item_ledger;
use portstock_core::{
    Category, DepartmentId, IssueRecord, ItemCode, ItemId, ItemRecord, MovementId, Quantity,
    ReceiptRecord, ReturnRecord, StockError, StockLevels, Terminal,
};
use serde_json::json;

use crate::auth::CurrentUser;
use crate::db::movements::MovementError;
use crate::error::AppError;
use crate::state::AppState;

/// Supplier recorded on receipts created from an item's opening stock.
pub const OPENING_SUPPLIER: &str = "Opening balance";

impl From<MovementError> for AppError {
    fn from(err: MovementError) -> Self {
        match err {
            MovementError::InsufficientStock(t) => {
                AppError::Conflict(format!("insufficient stock at {t}"))
            }
            MovementError::ReturnExceedsIssued => AppError::Conflict(err.to_string()),
            MovementError::ItemMissing(_) => AppError::NotFound(err.to_string()),
            MovementError::Database(e) => AppError::from(e),
        }
    }
}

// ── Inputs ──────────────────────────────────────────────────────────────────

/// Validated item details.
#[derive(Debug, Clone)]
pub struct ItemInput {
    pub code: ItemCode,
    pub name: String,
    pub category: Category,
    pub unit: String,
    pub reorder_level: i64,
}

/// Validated receipt.
#[derive(Debug, Clone)]
pub struct ReceiptInput {
    pub item_id: ItemId,
    pub terminal: Terminal,
    pub quantity: Quantity,
    pub supplier: String,
    pub reference: Option<String>,
    pub received_on: NaiveDate,
    pub remarks: Option<String>,
}

/// Validated issue.
#[derive(Debug, Clone)]
pub struct IssueInput {
    pub item_id: ItemId,
    pub terminal: Terminal,
    pub quantity: Quantity,
    pub department_id: DepartmentId,
    pub requested_by: String,
    pub issued_on: NaiveDate,
    pub remarks: Option<String>,
}

/// Validated return against an issue.
#[derive(Debug, Clone)]
pub struct ReturnInput {
    pub quantity: Quantity,
    pub reason: String,
    pub returned_on: NaiveDate,
}

// ── Items ───────────────────────────────────────────────────────────────────

fn code_conflict(code: &ItemCode) -> AppError {
    AppError::Conflict(format!("an item with code {code} already exists"))
}

/// Create an item. Opening stock, if any, is recorded as receipts dated
/// `opened_on` so that the stock card accounts for every unit.
pub async fn create_item(
    state: &AppState,
    actor: &CurrentUser,
    input: ItemInput,
    opening: &[(Terminal, Quantity)],
    opened_on: NaiveDate,
) -> Result<ItemRecord, AppError> {
    let now = Utc::now();
    let id = ItemId::new();

    let mut stock = StockLevels::default();
    let mut receipts = Vec::with_capacity(opening.len());
    for (terminal, quantity) in opening {
        stock.deposit(*terminal, *quantity)?;
        receipts.push(ReceiptRecord {
            id: MovementId::new(),
            item_id: id,
            terminal: *terminal,
            quantity: *quantity,
            supplier: OPENING_SUPPLIER.to_string(),
            reference: None,
            received_on: opened_on,
            received_by: actor.id,
            remarks: None,
            created_at: now,
        });
    }

    let record = ItemRecord {
        id,
        code: input.code,
        name: input.name,
        category: input.category,
        unit: input.unit,
        reorder_level: input.reorder_level,
        stock,
        active: true,
        created_at: now,
        updated_at: now,
    };

    let code = record.code.clone();
    state
        .items
        .try_insert_unique(id, record.clone(), |i| i.code == code)
        .map_err(|rejected| code_conflict(&rejected.code))?;

    if let Some(pool) = &state.db_pool {
        let persisted = async {
            let mut tx = pool.begin().await?;
            crate::db::items::insert(&mut *tx, &record).await?;
            for r in &receipts {
                crate::db::movements::insert_receipt(&mut *tx, r).await?;
            }
            tx.commit().await
        }
        .await;
        if let Err(e) = persisted {
            state.items.remove(&id);
            if crate::db::is_unique_violation(&e) {
                return Err(code_conflict(&record.code));
            }
            tracing::error!(item_id = %id, error = %e, "failed to persist new item");
            return Err(AppError::from(e));
        }
    }

    for r in receipts {
        state.receipts.insert(r.id, r);
    }

    tracing::info!(
        item_id = %id,
        code = %record.code,
        jct = record.stock.jct,
        uct = record.stock.uct,
        user = %actor.username,
        "item created"
    );
    crate::audit::record(
        state,
        &actor.username,
        "item.create",
        "item",
        *id.as_uuid(),
        json!({
            "code": record.code.as_str(),
            "name": &record.name,
            "opening_jct": record.stock.jct,
            "opening_uct": record.stock.uct,
        }),
    )
    .await;
    Ok(record)
}

/// Update an item's details and active flag. Stock is not editable.
pub async fn update_item(
    state: &AppState,
    actor: &CurrentUser,
    id: ItemId,
    input: ItemInput,
    active: bool,
) -> Result<ItemRecord, AppError> {
    let now = Utc::now();
    let (previous, updated) = state
        .items
        .try_update_against_all(
            &id,
            |_, all| {
                let mut others = all;
                if others.any(|i| i.id != id && i.code == input.code) {
                    Err(code_conflict(&input.code))
                } else {
                    Ok(())
                }
            },
            |i| {
                let previous = i.clone();
                i.code = input.code.clone();
                i.name = input.name.clone();
                i.category = input.category;
                i.unit = input.unit.clone();
                i.reorder_level = input.reorder_level;
                i.active = active;
                i.updated_at = now;
                (previous, i.clone())
            },
        )
        .ok_or_else(|| AppError::NotFound(format!("item {id}")))??;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::items::update_details(pool, &updated).await {
            // Put the old details back, keeping whatever stock is current.
            state.items.update(&id, |i| {
                i.code = previous.code.clone();
                i.name = previous.name.clone();
                i.category = previous.category;
                i.unit = previous.unit.clone();
                i.reorder_level = previous.reorder_level;
                i.active = previous.active;
                i.updated_at = previous.updated_at;
            });
            if crate::db::is_unique_violation(&e) {
                return Err(code_conflict(&input.code));
            }
            return Err(AppError::from(e));
        }
    }

    crate::audit::record(
        state,
        &actor.username,
        if previous.active && !active {
            "item.deactivate"
        } else if !previous.active && active {
            "item.activate"
        } else {
            "item.update"
        },
        "item",
        *id.as_uuid(),
        json!({
            "code": updated.code.as_str(),
            "previous_code": previous.code.as_str(),
            "name": &updated.name,
            "reorder_level": updated.reorder_level,
            "active": updated.active,
        }),
    )
    .await;
    Ok(updated)
}

/// Delete an item that has never moved.
pub async fn delete_item(
    state: &AppState,
    actor: &CurrentUser,
    id: ItemId,
) -> Result<ItemRecord, AppError> {
    let item = state
        .items
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("item {id}")))?;
    let has_history =
        state.receipts.any(|r| r.item_id == id) || state.issues.any(|i| i.item_id == id);
    if has_history {
        return Err(AppError::Conflict(format!(
            "item {} has stock movements and cannot be deleted; deactivate it instead",
            item.code
        )));
    }

    if let Some(pool) = &state.db_pool {
        if !crate::db::items::delete_unused(pool, id).await? {
            return Err(AppError::Conflict(format!(
                "item {} has stock movements and cannot be deleted",
                item.code
            )));
        }
    }
    state.items.remove(&id);

    tracing::info!(item_id = %id, code = %item.code, user = %actor.username, "item deleted");
    crate::audit::record(
        state,
        &actor.username,
        "item.delete",
        "item",
        *id.as_uuid(),
        json!({ "code": item.code.as_str(), "name": &item.name }),
    )
    .await;
    Ok(item)
}

fn active_item(state: &AppState, id: ItemId) -> Result<ItemRecord, AppError> {
    let item = state
        .items
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("item {id}")))?;
    if !item.active {
        return Err(AppError::Validation(format!(
            "item {} is inactive",
            item.code
        )));
    }
    Ok(item)
}

// ── Receipts ────────────────────────────────────────────────────────────────

/// Receive stock into a terminal.
pub async fn receive(
    state: &AppState,
    actor: &CurrentUser,
    input: ReceiptInput,
) -> Result<ReceiptRecord, AppError> {
    let item = active_item(state, input.item_id)?;
    // Reject overflow before anything is written.
    let mut projected = item.stock;
    projected.deposit(input.terminal, input.quantity)?;

    let receipt = ReceiptRecord {
        id: MovementId::new(),
        item_id: input.item_id,
        terminal: input.terminal,
        quantity: input.quantity,
        supplier: input.supplier,
        reference: input.reference,
        received_on: input.received_on,
        received_by: actor.id,
        remarks: input.remarks,
        created_at: Utc::now(),
    };

    if let Some(pool) = &state.db_pool {
        crate::db::movements::record_receipt(pool, &receipt)
            .await
            .map_err(|e| {
                tracing::warn!(item_id = %receipt.item_id, error = %e, "receipt not persisted");
                e
            })?;
    }

    let applied = state
        .items
        .try_update(&receipt.item_id, |i| i.stock.deposit(receipt.terminal, receipt.quantity));
    match applied {
        Some(Ok(level)) => {
            tracing::info!(
                item_id = %receipt.item_id,
                terminal = %receipt.terminal,
                quantity = receipt.quantity.get(),
                level,
                user = %actor.username,
                "stock received"
            );
        }
        Some(Err(e)) => {
            tracing::error!(
                item_id = %receipt.item_id,
                error = %e,
                "receipt persisted but not applied in memory"
            );
            return Err(AppError::from(e));
        }
        None => return Err(AppError::NotFound(format!("item {}", receipt.item_id))),
    }
    state.receipts.insert(receipt.id, receipt.clone());

    crate::audit::record(
        state,
        &actor.username,
        "stock.receive",
        "receipt",
        *receipt.id.as_uuid(),
        json!({
            "item": item.code.as_str(),
            "terminal": receipt.terminal.as_str(),
            "quantity": receipt.quantity.get(),
            "supplier": &receipt.supplier,
        }),
    )
    .await;
    Ok(receipt)
}

// ── Issues ──────────────────────────────────────────────────────────────────

/// Issue stock from a terminal to a department.
///
/// Fails with 409 Conflict, leaving nothing changed, if the terminal holds
/// less than the requested quantity.
pub async fn issue(
    state: &AppState,
    actor: &CurrentUser,
    input: IssueInput,
) -> Result<IssueRecord, AppError> {
    let item = active_item(state, input.item_id)?;
    let department = state
        .departments
        .get(&input.department_id)
        .ok_or_else(|| AppError::NotFound(format!("department {}", input.department_id)))?;
    if !department.active {
        return Err(AppError::Validation(format!(
            "department {} is inactive",
            department.name
        )));
    }

    let record = IssueRecord {
        id: MovementId::new(),
        item_id: input.item_id,
        terminal: input.terminal,
        quantity: input.quantity,
        department_id: input.department_id,
        requested_by: input.requested_by,
        issued_on: input.issued_on,
        issued_by: actor.id,
        returned_quantity: 0,
        remarks: input.remarks,
        created_at: Utc::now(),
    };

    // A backdated issue also lowers every later balance on the stock card.
    if record.issued_on < state.today() {
        let ledger = item_ledger(
            record.item_id,
            &state.receipts.filter(|r| r.item_id == record.item_id),
            &state.issues.filter(|i| i.item_id == record.item_id),
            &state.returns.filter(|r| r.item_id == record.item_id),
        );
        let available = ledger.available_on(record.terminal, record.issued_on);
        if record.quantity.get() > available {
            let err = StockError::InsufficientOnDate {
                terminal: record.terminal,
                date: record.issued_on,
                available,
                requested: record.quantity.get(),
            };
            tracing::info!(
                item_id = %record.item_id,
                terminal = %record.terminal,
                quantity = record.quantity.get(),
                user = %actor.username,
                "issue refused: {err}"
            );
            return Err(AppError::from(err));
        }
    }

    // Reserve.
    let remaining = state
        .items
        .try_update(&record.item_id, |i| i.stock.withdraw(record.terminal, record.quantity))
        .ok_or_else(|| AppError::NotFound(format!("item {}", record.item_id)))?
        .map_err(|e| {
            tracing::info!(
                item_id = %record.item_id,
                terminal = %record.terminal,
                quantity = record.quantity.get(),
                user = %actor.username,
                "issue refused: {e}"
            );
            AppError::from(e)
        })?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::movements::record_issue(pool, &record).await {
            release_reservation(state, &record);
            tracing::warn!(
                item_id = %record.item_id,
                terminal = %record.terminal,
                quantity = record.quantity.get(),
                error = %e,
                "issue not persisted, reservation released"
            );
            return Err(AppError::from(e));
        }
    }

    state.issues.insert(record.id, record.clone());
    tracing::info!(
        issue_id = %record.id,
        item_id = %record.item_id,
        terminal = %record.terminal,
        quantity = record.quantity.get(),
        remaining,
        department = %department.name,
        user = %actor.username,
        "stock issued"
    );
    crate::audit::record(
        state,
        &actor.username,
        "stock.issue",
        "issue",
        *record.id.as_uuid(),
        json!({
            "item": item.code.as_str(),
            "terminal": record.terminal.as_str(),
            "quantity": record.quantity.get(),
            "department": &department.name,
            "requested_by": &record.requested_by,
        }),
    )
    .await;
    Ok(record)
}

fn release_reservation(state: &AppState, record: &IssueRecord) {
    let released = state
        .items
        .try_update(&record.item_id, |i| i.stock.deposit(record.terminal, record.quantity));
    if !matches!(released, Some(Ok(_))) {
        tracing::error!(
            item_id = %record.item_id,
            terminal = %record.terminal,
            quantity = record.quantity.get(),
            "failed to release stock reservation; in-memory stock is out of step"
        );
    }
}

// ── Returns ─────────────────────────────────────────────────────────────────

/// Return part or all of an issue to the terminal it was issued from.
pub async fn record_return(
    state: &AppState,
    actor: &CurrentUser,
    issue_id: MovementId,
    input: ReturnInput,
) -> Result<ReturnRecord, AppError> {
    let issue = state
        .issues
        .get(&issue_id)
        .ok_or_else(|| AppError::NotFound(format!("issue {issue_id}")))?;
    if input.returned_on < issue.issued_on {
        return Err(AppError::Validation(format!(
            "return date cannot be before the issue date ({})",
            issue.issued_on
        )));
    }
    if !state.items.contains(&issue.item_id) {
        return Err(AppError::NotFound(format!("item {}", issue.item_id)));
    }

    let record = ReturnRecord {
        id: MovementId::new(),
        issue_id,
        item_id: issue.item_id,
        terminal: issue.terminal,
        quantity: input.quantity,
        reason: input.reason,
        returned_on: input.returned_on,
        recorded_by: actor.id,
        created_at: Utc::now(),
    };

    // Reserve against the issue's outstanding quantity.
    let outstanding = state
        .issues
        .try_update(&issue_id, |i| i.register_return(record.quantity))
        .ok_or_else(|| AppError::NotFound(format!("issue {issue_id}")))?
        .map_err(AppError::from)?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::movements::record_return(pool, &record).await {
            state
                .issues
                .update(&issue_id, |i| i.unregister_return(record.quantity));
            tracing::warn!(
                issue_id = %issue_id,
                error = %e,
                "return not persisted, reservation released"
            );
            return Err(AppError::from(e));
        }
    }

    let applied = state
        .items
        .try_update(&record.item_id, |i| i.stock.deposit(record.terminal, record.quantity));
    if !matches!(applied, Some(Ok(_))) {
        tracing::error!(
            item_id = %record.item_id,
            "return persisted but stock not applied in memory"
        );
    }
    state.returns.insert(record.id, record.clone());

    tracing::info!(
        return_id = %record.id,
        issue_id = %issue_id,
        item_id = %record.item_id,
        terminal = %record.terminal,
        quantity = record.quantity.get(),
        outstanding,
        user = %actor.username,
        "stock returned"
    );
    crate::audit::record(
        state,
        &actor.username,
        "stock.return",
        "return",
        *record.id.as_uuid(),
        json!({
            "issue": issue_id.to_string(),
            "terminal": record.terminal.as_str(),
            "quantity": record.quantity.get(),
            "reason": &record.reason,
        }),
    )
    .await;
    Ok(record)
}

/// Whether an error means the stock guard refused the operation.
pub fn is_stock_refusal(err: &AppError) -> bool {
    matches!(
        err,
        AppError::Conflict(m) if m.contains("insufficient stock") || m.contains("exceeds")
    )
}
