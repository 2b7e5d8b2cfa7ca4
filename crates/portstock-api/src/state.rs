//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! ## Architecture
//!
//! Every table is mirrored in an in-memory [`Store`]. Reads and report
//! computations run against the stores; writes go through
//! [`crate::inventory`], which mutates the store under its write lock and
//! persists to Postgres in the same request. On startup
//! [`AppState::hydrate_from_db`] loads every table into memory.
//!
//! Without `DATABASE_URL` the application runs in-memory only (development
//! and tests). Sessions are always in-memory; a restart signs everyone out.

use std::collections::hash_map::Values;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::RwLock;
use portstock_core::{
    DepartmentId, DepartmentRecord, IssueRecord, ItemId, ItemRecord, MovementId, ReceiptRecord,
    ReturnRecord, UserId, UserRecord,
};
use sqlx::PgPool;

use crate::audit::AuditTrail;
use crate::auth::SessionStore;
use crate::middleware::rate_limit::{LoginLimiter, RateLimitConfig};

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// All operations are synchronous (the RwLock is `parking_lot`, not `tokio::sync`)
/// because we never hold the lock across `.await` points. `parking_lot::RwLock`
/// is non-poisonable: a panicking writer does not permanently corrupt the store.
#[derive(Debug)]
pub struct Store<K, T> {
    data: Arc<RwLock<HashMap<K, T>>>,
}

impl<K, T> Clone for Store<K, T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K: Eq + Hash + Copy, T: Clone> Store<K, T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: K, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Insert a record unless an existing record conflicts with it.
    ///
    /// `conflicts` is evaluated against every stored record under the same
    /// write lock as the insert, so two concurrent inserts of the same
    /// unique value cannot both succeed. On conflict the rejected value is
    /// handed back.
    pub fn try_insert_unique(
        &self,
        id: K,
        value: T,
        conflicts: impl Fn(&T) -> bool,
    ) -> Result<(), T> {
        let mut guard = self.data.write();
        if guard.values().any(&conflicts) {
            return Err(value);
        }
        guard.insert(id, value);
        Ok(())
    }

    /// Retrieve a record by ID.
    pub fn get(&self, id: &K) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// List all records.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// Records matching a predicate.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data.read().values().filter(|v| pred(v)).cloned().collect()
    }

    /// Whether any record matches a predicate.
    pub fn any(&self, pred: impl Fn(&T) -> bool) -> bool {
        self.data.read().values().any(pred)
    }

    /// Update a record in place. Returns the updated record, or `None` if not found.
    pub fn update(&self, id: &K, f: impl FnOnce(&mut T)) -> Option<T> {
        let mut guard = self.data.write();
        if let Some(entry) = guard.get_mut(id) {
            f(entry);
            Some(entry.clone())
        } else {
            None
        }
    }

    /// Atomically read-validate-update a record.
    ///
    /// The closure receives a `&mut T` and may inspect the current state,
    /// validate preconditions, mutate the record, and return `Ok(R)` or
    /// `Err(E)`. The entire operation runs under a single write lock,
    /// eliminating TOCTOU races between read and update.
    ///
    /// Returns `None` if the record doesn't exist, or `Some(result)` with
    /// the closure's `Result`.
    pub fn try_update<R, E>(
        &self,
        id: &K,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(id).map(f)
    }

    /// Validate a change against every stored record, then apply it, all
    /// under one write lock.
    ///
    /// `validate` sees the current target record and all records (the
    /// target included). Invariants that span records, such as "at least
    /// one active administrator", hold against concurrent writers.
    ///
    /// Returns `None` if the record doesn't exist.
    pub fn try_update_against_all<R, E>(
        &self,
        id: &K,
        validate: impl FnOnce(&T, Values<'_, K, T>) -> Result<(), E>,
        apply: impl FnOnce(&mut T) -> R,
    ) -> Option<Result<R, E>> {
        let mut guard = self.data.write();
        let current = guard.get(id)?;
        if let Err(e) = validate(current, guard.values()) {
            return Some(Err(e));
        }
        guard.get_mut(id).map(|entry| Ok(apply(entry)))
    }

    /// Remove a record by ID.
    pub fn remove(&self, id: &K) -> Option<T> {
        self.data.write().remove(id)
    }

    /// Check if a record exists.
    pub fn contains(&self, id: &K) -> bool {
        self.data.read().contains_key(id)
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Copy, T: Clone> Default for Store<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Configuration ------------------------------------------------------------

/// Application configuration.
///
/// Custom `Debug` redacts the bootstrap admin password.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Idle time after which a session expires.
    pub session_idle: chrono::Duration,
    /// Mark the session cookie `Secure` (set behind TLS).
    pub secure_cookies: bool,
    /// PBKDF2 rounds for newly hashed passwords.
    pub password_iterations: u32,
    /// Mount `/metrics` and record request metrics.
    pub metrics_enabled: bool,
    /// Username of the first-boot administrator.
    pub admin_username: String,
    /// Password of the first-boot administrator. Generated when absent.
    pub admin_password: Option<String>,
    /// Emit JSON log lines.
    pub log_json: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("session_idle", &self.session_idle)
            .field("secure_cookies", &self.secure_cookies)
            .field("password_iterations", &self.password_iterations)
            .field("metrics_enabled", &self.metrics_enabled)
            .field("admin_username", &self.admin_username)
            .field(
                "admin_password",
                &self.admin_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("log_json", &self.log_json)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            session_idle: chrono::Duration::minutes(30),
            secure_cookies: false,
            password_iterations: 100_000,
            metrics_enabled: true,
            admin_username: "admin".to_string(),
            admin_password: None,
            log_json: false,
        }
    }
}

impl AppConfig {
    /// Build configuration from the environment, falling back to defaults
    /// for unset or unparseable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            session_idle: env_parse::<i64>("PORTSTOCK_SESSION_IDLE_MINUTES")
                .filter(|m| *m > 0)
                .map(chrono::Duration::minutes)
                .unwrap_or(defaults.session_idle),
            secure_cookies: env_flag("PORTSTOCK_SECURE_COOKIES", defaults.secure_cookies),
            password_iterations: env_parse::<u32>("PORTSTOCK_PASSWORD_ITERATIONS")
                .filter(|n| *n >= 1_000)
                .unwrap_or(defaults.password_iterations),
            metrics_enabled: env_flag("PORTSTOCK_METRICS_ENABLED", defaults.metrics_enabled),
            admin_username: std::env::var("PORTSTOCK_ADMIN_USERNAME")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.admin_username),
            admin_password: std::env::var("PORTSTOCK_ADMIN_PASSWORD")
                .ok()
                .filter(|s| !s.is_empty()),
            log_json: env_flag("PORTSTOCK_LOG_JSON", defaults.log_json),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

// -- Application State --------------------------------------------------------

/// Shared application state accessible to all route handlers.
///
/// Clone-friendly via `Arc` internals in each store.
#[derive(Debug, Clone)]
pub struct AppState {
    pub items: Store<ItemId, ItemRecord>,
    pub departments: Store<DepartmentId, DepartmentRecord>,
    pub users: Store<UserId, UserRecord>,
    pub receipts: Store<MovementId, ReceiptRecord>,
    pub issues: Store<MovementId, IssueRecord>,
    pub returns: Store<MovementId, ReturnRecord>,

    pub sessions: SessionStore,
    pub audit: AuditTrail,
    pub login_limiter: LoginLimiter,

    /// PostgreSQL connection pool. `None` means in-memory only.
    pub db_pool: Option<PgPool>,

    pub config: AppConfig,
}

impl AppState {
    /// In-memory state with default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None)
    }

    /// State with the given configuration and optional database pool.
    pub fn with_config(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        Self {
            items: Store::new(),
            departments: Store::new(),
            users: Store::new(),
            receipts: Store::new(),
            issues: Store::new(),
            returns: Store::new(),
            sessions: SessionStore::new(config.session_idle),
            audit: AuditTrail::new(),
            login_limiter: LoginLimiter::new(RateLimitConfig::login()),
            db_pool,
            config,
        }
    }

    /// Today's business date in the server's local time zone.
    pub fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }

    /// Hydrate in-memory stores from the database.
    ///
    /// Called once on startup when a database pool is available.
    pub async fn hydrate_from_db(&self) -> Result<(), sqlx::Error> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let users = crate::db::users::load_all(pool).await?;
        let user_count = users.len();
        for record in users {
            self.users.insert(record.id, record);
        }

        let departments = crate::db::departments::load_all(pool).await?;
        let department_count = departments.len();
        for record in departments {
            self.departments.insert(record.id, record);
        }

        let items = crate::db::items::load_all(pool).await?;
        let item_count = items.len();
        for record in items {
            self.items.insert(record.id, record);
        }

        let receipts = crate::db::movements::load_receipts(pool).await?;
        let receipt_count = receipts.len();
        for record in receipts {
            self.receipts.insert(record.id, record);
        }

        let issues = crate::db::movements::load_issues(pool).await?;
        let issue_count = issues.len();
        for record in issues {
            self.issues.insert(record.id, record);
        }

        let returns = crate::db::movements::load_returns(pool).await?;
        let return_count = returns.len();
        for record in returns {
            self.returns.insert(record.id, record);
        }

        let audit = crate::db::audit::load_all(pool).await?;
        let audit_count = audit.len();
        self.audit.restore(audit);

        tracing::info!(
            users = user_count,
            departments = department_count,
            items = item_count,
            receipts = receipt_count,
            issues = issue_count,
            returns = return_count,
            audit_events = audit_count,
            "Hydrated in-memory stores from database"
        );

        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
