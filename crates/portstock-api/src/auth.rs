//! # Authentication & Authorization
//!
//! Cookie sessions with role-based access control.
//!
//! ## Passwords
//!
//! PBKDF2-HMAC-SHA256 with a random 16-byte salt, stored as
//!
//! ```text
//! pbkdf2-sha256$<iterations>$<salt, base64>$<hash, base64>
//! ```
//!
//! The iteration count travels with the hash, so raising
//! `PORTSTOCK_PASSWORD_ITERATIONS` only affects new hashes.
//!
//! ## Sessions
//!
//! A sign-in creates a server-side [`Session`] keyed by a random 32-byte
//! token held in the `portstock_session` cookie. Sessions expire after the
//! configured idle time. Each session carries its own CSRF token, which
//! every form POST must echo back as `csrf_token`.
//!
//! ## CurrentUser
//!
//! [`session_middleware`] resolves the cookie and injects a [`CurrentUser`]
//! into the request extensions. Handlers extract it via the
//! `FromRequestParts` impl.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD_NO_PAD as B64;
use base64::Engine;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use pbkdf2::pbkdf2_hmac;
use portstock_core::{Role, UserId, UserRecord};
use rand_core::{OsRng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{AppError, ErrorBody, ErrorDetail};
use crate::state::AppState;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "portstock_session";

const HASH_SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

// ── Passwords ───────────────────────────────────────────────────────────────

/// Hash a password for storage.
pub fn hash_password(password: &str, iterations: u32) -> String {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let key = derive_key(password, &salt, iterations);
    format!(
        "{HASH_SCHEME}${iterations}${}${}",
        B64.encode(salt),
        B64.encode(key.as_slice())
    )
}

/// Check a password against a stored hash.
///
/// Malformed hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(hash), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != HASH_SCHEME {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    if iterations == 0 {
        return false;
    }
    let (Ok(salt), Ok(expected)) = (B64.decode(salt), B64.decode(hash)) else {
        return false;
    };
    if expected.len() != KEY_LEN {
        return false;
    }
    let key = derive_key(password, &salt, iterations);
    key.as_slice().ct_eq(&expected).into()
}

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key[..]);
    key
}

/// A hash that no password verifies against, used to keep the timing of
/// unknown-user sign-ins close to that of wrong-password sign-ins.
pub fn dummy_hash(iterations: u32) -> String {
    hash_password("portstock-unknown-user", iterations)
}

/// Run password hashing or verification on the blocking pool. PBKDF2 at
/// production round counts takes long enough to stall an async worker.
pub async fn run_password_task<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("password task failed: {e}")))
}

/// Random token: 32 bytes from the OS RNG, hex encoded.
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Constant-time string comparison.
fn constant_time_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

// ── Sessions ────────────────────────────────────────────────────────────────

/// Severity of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
}

/// One-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }
}

/// Server-side session.
#[derive(Clone)]
pub struct Session {
    pub token: String,
    pub user_id: UserId,
    pub csrf_token: String,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub flash: Option<Flash>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .field("csrf_token", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("last_seen", &self.last_seen)
            .finish()
    }
}

/// In-memory session table.
#[derive(Clone)]
pub struct SessionStore {
    idle: chrono::Duration,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("idle", &self.idle)
            .field("sessions", &self.sessions.read().len())
            .finish()
    }
}

impl SessionStore {
    pub fn new(idle: chrono::Duration) -> Self {
        Self {
            idle,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start a session for `user_id`.
    pub fn create(&self, user_id: UserId) -> Session {
        self.create_at(user_id, Utc::now())
    }

    fn create_at(&self, user_id: UserId, now: DateTime<Utc>) -> Session {
        let session = Session {
            token: random_token(),
            user_id,
            csrf_token: random_token(),
            created_at: now,
            last_seen: now,
            flash: None,
        };
        let mut sessions = self.sessions.write();
        let idle = self.idle;
        sessions.retain(|_, s| now - s.last_seen < idle);
        sessions.insert(session.token.clone(), session.clone());
        session
    }

    /// Look up a live session and refresh its idle timer.
    ///
    /// An expired session is removed and `None` is returned.
    pub fn touch(&self, token: &str) -> Option<Session> {
        self.touch_at(token, Utc::now())
    }

    fn touch_at(&self, token: &str, now: DateTime<Utc>) -> Option<Session> {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(token) {
            None => return None,
            Some(session) if now - session.last_seen < self.idle => {
                session.last_seen = now;
                return Some(session.clone());
            }
            Some(_) => {}
        }
        sessions.remove(token);
        None
    }

    /// End a session.
    pub fn remove(&self, token: &str) -> Option<Session> {
        self.sessions.write().remove(token)
    }

    /// End every session of `user_id`, optionally sparing one token.
    pub fn remove_user(&self, user_id: UserId, except: Option<&str>) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|token, s| s.user_id != user_id || Some(token.as_str()) == except);
        before - sessions.len()
    }

    /// Queue a flash message for the next page of this session.
    pub fn set_flash(&self, token: &str, flash: Flash) {
        if let Some(session) = self.sessions.write().get_mut(token) {
            session.flash = Some(flash);
        }
    }

    /// Take the queued flash message, if any.
    pub fn take_flash(&self, token: &str) -> Option<Flash> {
        self.sessions
            .write()
            .get_mut(token)
            .and_then(|s| s.flash.take())
    }

    /// Sessions that have not idled out.
    pub fn active_count(&self) -> usize {
        let now = Utc::now();
        self.sessions
            .read()
            .values()
            .filter(|s| now - s.last_seen < self.idle)
            .count()
    }
}

// ── Cookies ─────────────────────────────────────────────────────────────────

/// `Set-Cookie` value for a new session.
pub fn session_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that clears the session cookie.
pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Read a cookie value from the request headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}

// ── CurrentUser ─────────────────────────────────────────────────────────────

/// The signed-in user, injected by [`session_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub session_token: String,
    pub csrf_token: String,
}

impl CurrentUser {
    fn new(user: &UserRecord, session: &Session) -> Self {
        Self {
            id: user.id,
            username: user.username.to_string(),
            full_name: user.full_name.clone(),
            role: user.role,
            session_token: session.token.clone(),
            csrf_token: session.csrf_token.clone(),
        }
    }

    /// Whether the user has at least the given role.
    pub fn has_role(&self, minimum: Role) -> bool {
        self.role >= minimum
    }
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("not signed in".into()))
    }
}

/// Check that the user has at least the required role.
/// Returns 403 Forbidden if the role is insufficient.
pub fn require_role(user: &CurrentUser, minimum: Role) -> Result<(), AppError> {
    if user.has_role(minimum) {
        Ok(())
    } else {
        tracing::info!(
            user = %user.username,
            role = user.role.as_str(),
            required = minimum.as_str(),
            "role check failed"
        );
        Err(AppError::Forbidden(format!(
            "this page requires the {} role",
            minimum.label()
        )))
    }
}

/// Check the CSRF token submitted with a form.
pub fn check_csrf(user: &CurrentUser, submitted: &str) -> Result<(), AppError> {
    if constant_time_eq(submitted, &user.csrf_token) {
        Ok(())
    } else {
        tracing::warn!(user = %user.username, "CSRF token mismatch");
        Err(AppError::Forbidden(
            "the form has expired, reload the page and try again".into(),
        ))
    }
}

// ── Middleware ──────────────────────────────────────────────────────────────

/// Resolve the session cookie and inject [`CurrentUser`].
///
/// Without a live session, `/api/*` requests get a 401 JSON body and page
/// requests are redirected to `/login?next=<path>`. Sessions of deactivated
/// or deleted users are ended here.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let resolved = read_cookie(request.headers(), SESSION_COOKIE).and_then(|token| {
        let session = state.sessions.touch(&token)?;
        match state.users.get(&session.user_id) {
            Some(user) if user.active => Some(CurrentUser::new(&user, &session)),
            _ => {
                tracing::info!(user_id = %session.user_id, "ending session of inactive user");
                state.sessions.remove_user(session.user_id, None);
                None
            }
        }
    });

    match resolved {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => unauthenticated(&request, state.config.secure_cookies),
    }
}

fn unauthenticated(request: &Request, secure: bool) -> Response {
    let path = request.uri().path();
    if path.starts_with("/api/") {
        let body = ErrorBody {
            error: ErrorDetail {
                code: "UNAUTHORIZED".to_string(),
                message: "sign in required".to_string(),
            },
        };
        return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    }

    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let location = if target == "/" {
        "/login".to_string()
    } else {
        format!("/login?next={}", crate::views::url_encode(target))
    };
    let mut response = Redirect::to(&location).into_response();
    if read_cookie(request.headers(), SESSION_COOKIE).is_some() {
        if let Ok(v) = HeaderValue::from_str(&clear_session_cookie(secure)) {
            response.headers_mut().insert(header::SET_COOKIE, v);
        }
    }
    response
}

/// Accept a post-login redirect target only if it is a local path.
///
/// Browsers drop tabs and newlines from `Location`, so `/\t/host` would turn
/// into `//host`. Anything outside printable ASCII is refused before the
/// prefix checks, which also keeps the value a legal header.
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(n)
            if n.chars().all(|c| c.is_ascii_graphic())
                && n.starts_with('/')
                && !n.starts_with("//")
                && !n.contains('\\') =>
        {
            n.to_string()
        }
        _ => "/".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct horse", 1_000);
        assert!(hash.starts_with("pbkdf2-sha256$1000$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("correct horsE", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash_password("same", 1_000), hash_password("same", 1_000));
    }

    #[test]
    fn malformed_hashes_never_verify() {
        for stored in [
            "",
            "plain",
            "pbkdf2-sha256$abc$AAAA$AAAA",
            "pbkdf2-sha256$0$AAAA$AAAA",
            "md5$1000$AAAA$AAAA",
            "pbkdf2-sha256$1000$!!!$AAAA",
            "pbkdf2-sha256$1000$AAAA$AAAA$extra",
        ] {
            assert!(!verify_password("x", stored), "{stored}");
        }
    }

    #[test]
    fn random_tokens_are_hex_and_unique() {
        let a = random_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, random_token());
    }

    #[test]
    fn sessions_expire_when_idle() {
        let store = SessionStore::new(chrono::Duration::minutes(30));
        let t0 = Utc::now();
        let s = store.create_at(UserId::new(), t0);
        assert!(store.touch_at(&s.token, t0 + chrono::Duration::minutes(29)).is_some());
        // Touching refreshed the timer.
        assert!(store.touch_at(&s.token, t0 + chrono::Duration::minutes(58)).is_some());
        assert!(store.touch_at(&s.token, t0 + chrono::Duration::minutes(90)).is_none());
        assert!(store.touch_at(&s.token, t0).is_none(), "expired session is gone");
    }

    #[test]
    fn remove_user_spares_current_session() {
        let store = SessionStore::new(chrono::Duration::minutes(30));
        let user = UserId::new();
        let a = store.create(user);
        let b = store.create(user);
        let other = store.create(UserId::new());
        assert_eq!(store.remove_user(user, Some(&a.token)), 1);
        assert!(store.touch(&a.token).is_some());
        assert!(store.touch(&b.token).is_none());
        assert!(store.touch(&other.token).is_some());
    }

    #[test]
    fn flash_is_one_shot() {
        let store = SessionStore::new(chrono::Duration::minutes(30));
        let s = store.create(UserId::new());
        store.set_flash(&s.token, Flash::success("Saved"));
        assert_eq!(store.take_flash(&s.token), Some(Flash::success("Saved")));
        assert_eq!(store.take_flash(&s.token), None);
    }

    #[test]
    fn cookie_attributes() {
        let c = session_cookie("abc", false);
        assert!(c.contains("portstock_session=abc"));
        assert!(c.contains("HttpOnly"));
        assert!(c.contains("SameSite=Lax"));
        assert!(!c.contains("Secure"));
        assert!(session_cookie("abc", true).ends_with("; Secure"));
        assert!(clear_session_cookie(false).contains("Max-Age=0"));
    }

    #[test]
    fn read_cookie_finds_named_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; portstock_session=tok123"),
        );
        assert_eq!(read_cookie(&headers, SESSION_COOKIE).as_deref(), Some("tok123"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn safe_next_rejects_external_targets() {
        assert_eq!(safe_next(Some("/items?category=toner")), "/items?category=toner");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("/\\evil")), "/");
        assert_eq!(safe_next(Some("/\t/evil.example")), "/");
        assert_eq!(safe_next(Some("/\r\n/evil.example")), "/");
        assert_eq!(safe_next(Some("/a\nb")), "/");
        assert_eq!(safe_next(Some("/items?search=caf\u{e9}")), "/");
        assert_eq!(safe_next(Some("/ /evil.example")), "/");
        assert_eq!(safe_next(None), "/");
    }

    fn user(role: Role) -> CurrentUser {
        CurrentUser {
            id: UserId::new(),
            username: "clerk".into(),
            full_name: "Clerk".into(),
            role,
            session_token: "s".into(),
            csrf_token: "csrf-abc".into(),
        }
    }

    #[test]
    fn role_hierarchy() {
        assert!(require_role(&user(Role::Admin), Role::Storekeeper).is_ok());
        assert!(require_role(&user(Role::Storekeeper), Role::Storekeeper).is_ok());
        assert!(matches!(
            require_role(&user(Role::Viewer), Role::Storekeeper),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn csrf_check() {
        let u = user(Role::Viewer);
        assert!(check_csrf(&u, "csrf-abc").is_ok());
        assert!(check_csrf(&u, "csrf-abd").is_err());
        assert!(check_csrf(&u, "").is_err());
    }
}
