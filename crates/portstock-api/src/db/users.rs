//! User account persistence.

use chrono::{DateTime, Utc};
use portstock_core::{Role, UserId, UserRecord, Username};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::decode_error;

pub async fn insert<'e>(exec: impl PgExecutor<'e>, user: &UserRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, username, full_name, role, password_hash, active, created_at,
         updated_at, last_login_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(user.id.as_uuid())
    .bind(user.username.as_str())
    .bind(&user.full_name)
    .bind(user.role.as_str())
    .bind(&user.password_hash)
    .bind(user.active)
    .bind(user.created_at)
    .bind(user.updated_at)
    .bind(user.last_login_at)
    .execute(exec)
    .await?;
    Ok(())
}

/// Update profile fields (name, role, active flag).
pub async fn update_profile<'e>(
    exec: impl PgExecutor<'e>,
    user: &UserRecord,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET full_name = $1, role = $2, active = $3, updated_at = $4 WHERE id = $5",
    )
    .bind(&user.full_name)
    .bind(user.role.as_str())
    .bind(user.active)
    .bind(user.updated_at)
    .bind(user.id.as_uuid())
    .execute(exec)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn update_password<'e>(
    exec: impl PgExecutor<'e>,
    id: UserId,
    password_hash: &str,
    at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
            .bind(password_hash)
            .bind(at)
            .bind(id.as_uuid())
            .execute(exec)
            .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn touch_login<'e>(
    exec: impl PgExecutor<'e>,
    id: UserId,
    at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_login_at = $1 WHERE id = $2")
        .bind(at)
        .bind(id.as_uuid())
        .execute(exec)
        .await?;
    Ok(())
}

pub async fn find_by_username<'e>(
    exec: impl PgExecutor<'e>,
    username: &Username,
) -> Result<Option<UserRecord>, sqlx::Error> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, full_name, role, password_hash, active, created_at, updated_at,
         last_login_at
         FROM users WHERE username = $1",
    )
    .bind(username.as_str())
    .fetch_optional(exec)
    .await?;
    row.map(UserRow::into_record).transpose()
}

pub async fn load_all<'e>(exec: impl PgExecutor<'e>) -> Result<Vec<UserRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, full_name, role, password_hash, active, created_at, updated_at,
         last_login_at
         FROM users ORDER BY username",
    )
    .fetch_all(exec)
    .await?;
    rows.into_iter().map(UserRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    full_name: String,
    role: String,
    password_hash: String,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

impl UserRow {
    fn into_record(self) -> Result<UserRecord, sqlx::Error> {
        Ok(UserRecord {
            id: UserId::from_uuid(self.id),
            username: Username::new(&self.username).map_err(|e| decode_error("users", e))?,
            full_name: self.full_name,
            role: self
                .role
                .parse::<Role>()
                .map_err(|e| decode_error("users", e))?,
            password_hash: self.password_hash,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_login_at: self.last_login_at,
        })
    }
}
