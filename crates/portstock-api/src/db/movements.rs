//! Receipts, issues and returns.
//!
//! Each `record_*` function writes the movement row and the stock counter
//! change in one transaction. If any step fails the transaction is dropped
//! and rolled back, so a movement row never exists without its counter
//! change or the other way round.

use chrono::{DateTime, NaiveDate, Utc};
use portstock_core::{
    DepartmentId, IssueRecord, ItemId, MovementId, Quantity, ReceiptRecord, ReturnRecord,
    Terminal, UserId,
};
use sqlx::{PgExecutor, PgPool};
use thiserror::Error;
use uuid::Uuid;

use super::{decode_error, items};

/// Why a movement could not be persisted.
#[derive(Debug, Error)]
pub enum MovementError {
    /// The guarded decrement matched no row.
    #[error("insufficient stock at {0}")]
    InsufficientStock(Terminal),

    /// The guarded return update matched no row.
    #[error("return exceeds the quantity still outstanding on the issue")]
    ReturnExceedsIssued,

    #[error("item {0} not found")]
    ItemMissing(ItemId),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Receive stock: increment the counter and insert the receipt.
pub async fn record_receipt(pool: &PgPool, receipt: &ReceiptRecord) -> Result<(), MovementError> {
    let mut tx = pool.begin().await?;
    if !items::deposit(
        &mut *tx,
        receipt.item_id,
        receipt.terminal,
        receipt.quantity,
        receipt.created_at,
    )
    .await?
    {
        return Err(MovementError::ItemMissing(receipt.item_id));
    }
    insert_receipt(&mut *tx, receipt).await?;
    tx.commit().await?;
    Ok(())
}

/// Issue stock: guarded decrement, then insert the issue.
pub async fn record_issue(pool: &PgPool, issue: &IssueRecord) -> Result<(), MovementError> {
    let mut tx = pool.begin().await?;
    if !items::withdraw(
        &mut *tx,
        issue.item_id,
        issue.terminal,
        issue.quantity,
        issue.created_at,
    )
    .await?
    {
        return Err(MovementError::InsufficientStock(issue.terminal));
    }
    insert_issue(&mut *tx, issue).await?;
    tx.commit().await?;
    Ok(())
}

/// Return stock: guarded bump of the issue's returned quantity, counter
/// increment, and the return row.
pub async fn record_return(pool: &PgPool, ret: &ReturnRecord) -> Result<(), MovementError> {
    let mut tx = pool.begin().await?;
    let registered = sqlx::query(
        "UPDATE issues SET returned_quantity = returned_quantity + $1
         WHERE id = $2 AND returned_quantity + $1 <= quantity",
    )
    .bind(ret.quantity.get())
    .bind(ret.issue_id.as_uuid())
    .execute(&mut *tx)
    .await?;
    if registered.rows_affected() != 1 {
        return Err(MovementError::ReturnExceedsIssued);
    }
    if !items::deposit(&mut *tx, ret.item_id, ret.terminal, ret.quantity, ret.created_at).await? {
        return Err(MovementError::ItemMissing(ret.item_id));
    }
    insert_return(&mut *tx, ret).await?;
    tx.commit().await?;
    Ok(())
}

pub async fn insert_receipt<'e>(
    exec: impl PgExecutor<'e>,
    r: &ReceiptRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO receipts (id, item_id, terminal, quantity, supplier, reference, received_on,
         received_by, remarks, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(r.id.as_uuid())
    .bind(r.item_id.as_uuid())
    .bind(r.terminal.as_str())
    .bind(r.quantity.get())
    .bind(&r.supplier)
    .bind(&r.reference)
    .bind(r.received_on)
    .bind(r.received_by.as_uuid())
    .bind(&r.remarks)
    .bind(r.created_at)
    .execute(exec)
    .await?;
    Ok(())
}

async fn insert_issue<'e>(exec: impl PgExecutor<'e>, i: &IssueRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO issues (id, item_id, terminal, quantity, department_id, requested_by,
         issued_on, issued_by, returned_quantity, remarks, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(i.id.as_uuid())
    .bind(i.item_id.as_uuid())
    .bind(i.terminal.as_str())
    .bind(i.quantity.get())
    .bind(i.department_id.as_uuid())
    .bind(&i.requested_by)
    .bind(i.issued_on)
    .bind(i.issued_by.as_uuid())
    .bind(i.returned_quantity)
    .bind(&i.remarks)
    .bind(i.created_at)
    .execute(exec)
    .await?;
    Ok(())
}

async fn insert_return<'e>(exec: impl PgExecutor<'e>, r: &ReturnRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO returns (id, issue_id, item_id, terminal, quantity, reason, returned_on,
         recorded_by, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(r.id.as_uuid())
    .bind(r.issue_id.as_uuid())
    .bind(r.item_id.as_uuid())
    .bind(r.terminal.as_str())
    .bind(r.quantity.get())
    .bind(&r.reason)
    .bind(r.returned_on)
    .bind(r.recorded_by.as_uuid())
    .bind(r.created_at)
    .execute(exec)
    .await?;
    Ok(())
}

// ── Loading ────────────────────────────────────────────────────────────────

pub async fn load_receipts<'e>(
    exec: impl PgExecutor<'e>,
) -> Result<Vec<ReceiptRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ReceiptRow>(
        "SELECT id, item_id, terminal, quantity, supplier, reference, received_on, received_by,
         remarks, created_at
         FROM receipts ORDER BY received_on, created_at",
    )
    .fetch_all(exec)
    .await?;
    rows.into_iter().map(ReceiptRow::into_record).collect()
}

pub async fn load_issues<'e>(exec: impl PgExecutor<'e>) -> Result<Vec<IssueRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, IssueRow>(
        "SELECT id, item_id, terminal, quantity, department_id, requested_by, issued_on,
         issued_by, returned_quantity, remarks, created_at
         FROM issues ORDER BY issued_on, created_at",
    )
    .fetch_all(exec)
    .await?;
    rows.into_iter().map(IssueRow::into_record).collect()
}

pub async fn load_returns<'e>(exec: impl PgExecutor<'e>) -> Result<Vec<ReturnRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ReturnRow>(
        "SELECT id, issue_id, item_id, terminal, quantity, reason, returned_on, recorded_by,
         created_at
         FROM returns ORDER BY returned_on, created_at",
    )
    .fetch_all(exec)
    .await?;
    rows.into_iter().map(ReturnRow::into_record).collect()
}

fn terminal(table: &'static str, raw: &str) -> Result<Terminal, sqlx::Error> {
    raw.parse().map_err(|e| decode_error(table, e))
}

fn quantity(table: &'static str, raw: i64) -> Result<Quantity, sqlx::Error> {
    Quantity::new(raw).map_err(|e| decode_error(table, e))
}

#[derive(sqlx::FromRow)]
struct ReceiptRow {
    id: Uuid,
    item_id: Uuid,
    terminal: String,
    quantity: i64,
    supplier: String,
    reference: Option<String>,
    received_on: NaiveDate,
    received_by: Uuid,
    remarks: Option<String>,
    created_at: DateTime<Utc>,
}

impl ReceiptRow {
    fn into_record(self) -> Result<ReceiptRecord, sqlx::Error> {
        Ok(ReceiptRecord {
            id: MovementId::from_uuid(self.id),
            item_id: ItemId::from_uuid(self.item_id),
            terminal: terminal("receipts", &self.terminal)?,
            quantity: quantity("receipts", self.quantity)?,
            supplier: self.supplier,
            reference: self.reference,
            received_on: self.received_on,
            received_by: UserId::from_uuid(self.received_by),
            remarks: self.remarks,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct IssueRow {
    id: Uuid,
    item_id: Uuid,
    terminal: String,
    quantity: i64,
    department_id: Uuid,
    requested_by: String,
    issued_on: NaiveDate,
    issued_by: Uuid,
    returned_quantity: i64,
    remarks: Option<String>,
    created_at: DateTime<Utc>,
}

impl IssueRow {
    fn into_record(self) -> Result<IssueRecord, sqlx::Error> {
        Ok(IssueRecord {
            id: MovementId::from_uuid(self.id),
            item_id: ItemId::from_uuid(self.item_id),
            terminal: terminal("issues", &self.terminal)?,
            quantity: quantity("issues", self.quantity)?,
            department_id: DepartmentId::from_uuid(self.department_id),
            requested_by: self.requested_by,
            issued_on: self.issued_on,
            issued_by: UserId::from_uuid(self.issued_by),
            returned_quantity: self.returned_quantity,
            remarks: self.remarks,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReturnRow {
    id: Uuid,
    issue_id: Uuid,
    item_id: Uuid,
    terminal: String,
    quantity: i64,
    reason: String,
    returned_on: NaiveDate,
    recorded_by: Uuid,
    created_at: DateTime<Utc>,
}

impl ReturnRow {
    fn into_record(self) -> Result<ReturnRecord, sqlx::Error> {
        Ok(ReturnRecord {
            id: MovementId::from_uuid(self.id),
            issue_id: MovementId::from_uuid(self.issue_id),
            item_id: ItemId::from_uuid(self.item_id),
            terminal: terminal("returns", &self.terminal)?,
            quantity: quantity("returns", self.quantity)?,
            reason: self.reason,
            returned_on: self.returned_on,
            recorded_by: UserId::from_uuid(self.recorded_by),
            created_at: self.created_at,
        })
    }
}
