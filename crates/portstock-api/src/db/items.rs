//! Item persistence and the per-terminal stock counters.
//!
//! [`withdraw`] is the guarded decrement: it only matches the row when the
//! chosen terminal holds at least the requested quantity, so zero affected
//! rows means insufficient stock.

use chrono::{DateTime, Utc};
use portstock_core::{Category, ItemCode, ItemId, ItemRecord, Quantity, StockLevels, Terminal};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::decode_error;

/// Insert a new item, including its current stock levels.
pub async fn insert<'e>(exec: impl PgExecutor<'e>, record: &ItemRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO items (id, code, name, category, unit, reorder_level, jct_stock, uct_stock,
         active, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(record.id.as_uuid())
    .bind(record.code.as_str())
    .bind(&record.name)
    .bind(record.category.as_str())
    .bind(&record.unit)
    .bind(record.reorder_level)
    .bind(record.stock.jct)
    .bind(record.stock.uct)
    .bind(record.active)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(exec)
    .await?;
    Ok(())
}

/// Update descriptive fields. Stock counters are never touched here.
pub async fn update_details(pool: &PgPool, record: &ItemRecord) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE items SET code = $1, name = $2, category = $3, unit = $4, reorder_level = $5,
         active = $6, updated_at = $7 WHERE id = $8",
    )
    .bind(record.code.as_str())
    .bind(&record.name)
    .bind(record.category.as_str())
    .bind(&record.unit)
    .bind(record.reorder_level)
    .bind(record.active)
    .bind(record.updated_at)
    .bind(record.id.as_uuid())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete an item that has no movements. Returns `false` if the item is
/// missing or has history.
pub async fn delete_unused(pool: &PgPool, id: ItemId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM items WHERE id = $1
         AND NOT EXISTS (SELECT 1 FROM receipts WHERE item_id = $1)
         AND NOT EXISTS (SELECT 1 FROM issues WHERE item_id = $1)",
    )
    .bind(id.as_uuid())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Guarded decrement. Returns `false` when the terminal holds less than `qty`.
pub async fn withdraw<'e>(
    exec: impl PgExecutor<'e>,
    id: ItemId,
    terminal: Terminal,
    qty: Quantity,
    at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let sql = match terminal {
        Terminal::Jct => {
            "UPDATE items SET jct_stock = jct_stock - $1, updated_at = $3
             WHERE id = $2 AND jct_stock >= $1"
        }
        Terminal::Uct => {
            "UPDATE items SET uct_stock = uct_stock - $1, updated_at = $3
             WHERE id = $2 AND uct_stock >= $1"
        }
    };
    let result = sqlx::query(sql)
        .bind(qty.get())
        .bind(id.as_uuid())
        .bind(at)
        .execute(exec)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Increment a terminal counter. Returns `false` if the item does not exist.
pub async fn deposit<'e>(
    exec: impl PgExecutor<'e>,
    id: ItemId,
    terminal: Terminal,
    qty: Quantity,
    at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let sql = match terminal {
        Terminal::Jct => "UPDATE items SET jct_stock = jct_stock + $1, updated_at = $3 WHERE id = $2",
        Terminal::Uct => "UPDATE items SET uct_stock = uct_stock + $1, updated_at = $3 WHERE id = $2",
    };
    let result = sqlx::query(sql)
        .bind(qty.get())
        .bind(id.as_uuid())
        .bind(at)
        .execute(exec)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Load all items on startup.
pub async fn load_all<'e>(exec: impl PgExecutor<'e>) -> Result<Vec<ItemRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ItemRow>(
        "SELECT id, code, name, category, unit, reorder_level, jct_stock, uct_stock, active,
         created_at, updated_at
         FROM items ORDER BY code",
    )
    .fetch_all(exec)
    .await?;
    rows.into_iter().map(ItemRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    code: String,
    name: String,
    category: String,
    unit: String,
    reorder_level: i64,
    jct_stock: i64,
    uct_stock: i64,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ItemRow {
    fn into_record(self) -> Result<ItemRecord, sqlx::Error> {
        Ok(ItemRecord {
            id: ItemId::from_uuid(self.id),
            code: ItemCode::new(&self.code).map_err(|e| decode_error("items", e))?,
            name: self.name,
            category: self
                .category
                .parse::<Category>()
                .map_err(|e| decode_error("items", e))?,
            unit: self.unit,
            reorder_level: self.reorder_level,
            stock: StockLevels {
                jct: self.jct_stock,
                uct: self.uct_stock,
            },
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
