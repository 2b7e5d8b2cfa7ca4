//! # Startup Bootstrap
//!
//! 1. **Build state** from configuration and the optional database pool.
//! 2. **Hydrate** the in-memory stores from Postgres.
//! 3. **Seed an administrator** when no user accounts exist, so a fresh
//!    installation can be signed into.

use chrono::Utc;
use portstock_core::{validate_password, Role, UserId, UserRecord, Username, ValidationError};
use sqlx::PgPool;

use crate::auth::{hash_password, random_token};
use crate::state::{AppConfig, AppState};

/// Errors during startup.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// `PORTSTOCK_ADMIN_USERNAME` or `PORTSTOCK_ADMIN_PASSWORD` is unusable.
    #[error("invalid bootstrap administrator: {0}")]
    InvalidAdmin(#[from] ValidationError),
}

/// Build, hydrate and seed the application state.
pub async fn bootstrap(
    config: AppConfig,
    db_pool: Option<PgPool>,
) -> Result<AppState, BootstrapError> {
    let state = AppState::with_config(config, db_pool);
    state.hydrate_from_db().await?;
    ensure_admin(&state).await?;
    Ok(state)
}

/// Create the first administrator if there are no users at all.
///
/// Returns the created account, or `None` when users already exist. When no
/// password is configured a random one is generated and logged once.
pub async fn ensure_admin(state: &AppState) -> Result<Option<UserRecord>, BootstrapError> {
    if !state.users.is_empty() {
        return Ok(None);
    }

    let username = Username::new(&state.config.admin_username)?;
    let (password, generated) = match &state.config.admin_password {
        Some(p) => (p.clone(), false),
        None => (random_token()[..20].to_string(), true),
    };
    validate_password(&password)?;

    let now = Utc::now();
    let user = UserRecord {
        id: UserId::new(),
        username,
        full_name: "Administrator".to_string(),
        role: Role::Admin,
        password_hash: hash_password(&password, state.config.password_iterations),
        active: true,
        created_at: now,
        updated_at: now,
        last_login_at: None,
    };

    if let Some(pool) = &state.db_pool {
        crate::db::users::insert(pool, &user).await?;
    }
    state.users.insert(user.id, user.clone());

    if generated {
        tracing::warn!(
            username = %user.username,
            password = %password,
            "created initial administrator with a generated password; change it after signing in"
        );
    } else {
        tracing::info!(username = %user.username, "created initial administrator");
    }
    crate::audit::record(
        state,
        "system",
        "user.create",
        "user",
        *user.id.as_uuid(),
        serde_json::json!({
            "username": user.username.as_str(),
            "role": "admin",
            "bootstrap": true,
        }),
    )
    .await;
    Ok(Some(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;

    fn config() -> AppConfig {
        AppConfig {
            password_iterations: 1_000,
            admin_password: Some("first-boot-pass".into()),
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn seeds_admin_once() {
        let state = bootstrap(config(), None).await.unwrap();
        let users = state.users.list();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, Role::Admin);
        assert!(verify_password("first-boot-pass", &users[0].password_hash));

        assert!(ensure_admin(&state).await.unwrap().is_none());
        assert_eq!(state.users.len(), 1);
    }

    #[tokio::test]
    async fn generates_password_when_unset() {
        let state = AppState::with_config(
            AppConfig {
                admin_password: None,
                ..config()
            },
            None,
        );
        let admin = ensure_admin(&state).await.unwrap().unwrap();
        assert!(admin.password_hash.starts_with("pbkdf2-sha256$1000$"));
    }

    #[tokio::test]
    async fn weak_configured_password_is_rejected() {
        let state = AppState::with_config(
            AppConfig {
                admin_password: Some("short".into()),
                ..config()
            },
            None,
        );
        assert!(matches!(
            ensure_admin(&state).await,
            Err(BootstrapError::InvalidAdmin(_))
        ));
    }
}
