//! Department persistence.

use chrono::{DateTime, Utc};
use portstock_core::{DepartmentId, DepartmentRecord};
use sqlx::PgExecutor;
use uuid::Uuid;

pub async fn insert<'e>(
    exec: impl PgExecutor<'e>,
    dept: &DepartmentRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO departments (id, code, name, active, created_at) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(dept.id.as_uuid())
    .bind(&dept.code)
    .bind(&dept.name)
    .bind(dept.active)
    .bind(dept.created_at)
    .execute(exec)
    .await?;
    Ok(())
}

pub async fn update<'e>(
    exec: impl PgExecutor<'e>,
    dept: &DepartmentRecord,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE departments SET code = $1, name = $2, active = $3 WHERE id = $4")
            .bind(&dept.code)
            .bind(&dept.name)
            .bind(dept.active)
            .bind(dept.id.as_uuid())
            .execute(exec)
            .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn load_all<'e>(
    exec: impl PgExecutor<'e>,
) -> Result<Vec<DepartmentRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, DepartmentRow>(
        "SELECT id, code, name, active, created_at FROM departments ORDER BY name",
    )
    .fetch_all(exec)
    .await?;
    Ok(rows.into_iter().map(DepartmentRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct DepartmentRow {
    id: Uuid,
    code: String,
    name: String,
    active: bool,
    created_at: DateTime<Utc>,
}

impl DepartmentRow {
    fn into_record(self) -> DepartmentRecord {
        DepartmentRecord {
            id: DepartmentId::from_uuid(self.id),
            code: self.code,
            name: self.name,
            active: self.active,
            created_at: self.created_at,
        }
    }
}
