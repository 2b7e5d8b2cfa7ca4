//! Audit event persistence — append-only hash chain.
//!
//! Hashes are computed in memory by [`crate::audit::AuditTrail`]; this
//! module only stores and reloads them.

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::audit::AuditEntry;

pub async fn insert<'e>(exec: impl PgExecutor<'e>, entry: &AuditEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_events (id, sequence, actor, action, resource_type, resource_id,
         detail, previous_hash, event_hash, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(entry.id)
    .bind(entry.sequence)
    .bind(&entry.actor)
    .bind(&entry.action)
    .bind(&entry.resource_type)
    .bind(entry.resource_id)
    .bind(&entry.detail)
    .bind(&entry.previous_hash)
    .bind(&entry.event_hash)
    .bind(entry.created_at)
    .execute(exec)
    .await?;
    Ok(())
}

pub async fn load_all<'e>(exec: impl PgExecutor<'e>) -> Result<Vec<AuditEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AuditEventRow>(
        "SELECT id, sequence, actor, action, resource_type, resource_id, detail, previous_hash,
         event_hash, created_at
         FROM audit_events ORDER BY sequence",
    )
    .fetch_all(exec)
    .await?;
    Ok(rows.into_iter().map(AuditEventRow::into_entry).collect())
}

#[derive(sqlx::FromRow)]
struct AuditEventRow {
    id: Uuid,
    sequence: i64,
    actor: String,
    action: String,
    resource_type: String,
    resource_id: Uuid,
    detail: serde_json::Value,
    previous_hash: String,
    event_hash: String,
    created_at: DateTime<Utc>,
}

impl AuditEventRow {
    fn into_entry(self) -> AuditEntry {
        AuditEntry {
            id: self.id,
            sequence: self.sequence,
            actor: self.actor,
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            detail: self.detail,
            previous_hash: self.previous_hash,
            event_hash: self.event_hash,
            created_at: self.created_at,
        }
    }
}
