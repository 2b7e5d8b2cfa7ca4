//! End-to-end tests through the full router: session middleware, CSRF,
//! role gates, stock movements, reports and the JSON API.

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use portstock_api::auth::hash_password;
use portstock_api::bootstrap::ensure_admin;
use portstock_api::state::{AppConfig, AppState};
use portstock_api::views::url_encode;
use portstock_core::{ItemRecord, Role, Terminal, UserId, UserRecord, Username};
use tower::ServiceExt;

const ADMIN_PASSWORD: &str = "first-boot-pass";

struct TestApp {
    state: AppState,
    router: Router,
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl Reply {
    fn location(&self) -> &str {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }
}

/// A signed-in browser: session cookie plus the page's CSRF token.
struct Browser {
    cookie: String,
    csrf: String,
}

fn config() -> AppConfig {
    AppConfig {
        password_iterations: 1_000,
        admin_password: Some(ADMIN_PASSWORD.into()),
        ..AppConfig::default()
    }
}

async fn setup() -> TestApp {
    let state = AppState::with_config(config(), None);
    ensure_admin(&state).await.unwrap();
    let router = portstock_api::app(state.clone());
    TestApp { state, router }
}

fn form_body(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}={}", url_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn csrf_from(html: &str) -> String {
    let marker = "<meta name=\"csrf-token\" content=\"";
    let start = html.find(marker).expect("csrf meta tag") + marker.len();
    let end = html[start..].find('"').expect("end of csrf token") + start;
    html[start..end].to_string()
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        Reply {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    async fn get(&self, browser: Option<&Browser>, uri: &str) -> Reply {
        let mut req = Request::get(uri);
        if let Some(b) = browser {
            req = req.header(header::COOKIE, &b.cookie);
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    async fn post(&self, browser: Option<&Browser>, uri: &str, fields: &[(&str, &str)]) -> Reply {
        let mut req = Request::post(uri).header(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        );
        if let Some(b) = browser {
            req = req.header(header::COOKIE, &b.cookie);
        }
        self.send(req.body(Body::from(form_body(fields))).unwrap())
            .await
    }

    /// POST a form carrying the browser's CSRF token.
    async fn submit(&self, browser: &Browser, uri: &str, fields: &[(&str, &str)]) -> Reply {
        let mut all = vec![("csrf_token", browser.csrf.as_str())];
        all.extend_from_slice(fields);
        self.post(Some(browser), uri, &all).await
    }

    async fn login(&self, username: &str, password: &str) -> Browser {
        let reply = self
            .post(
                None,
                "/login",
                &[("username", username), ("password", password), ("next", "")],
            )
            .await;
        assert_eq!(reply.status, StatusCode::SEE_OTHER, "{}", reply.body);
        let set_cookie = reply
            .headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .expect("session cookie");
        let cookie = set_cookie.split(';').next().unwrap().to_string();
        assert!(cookie.starts_with("portstock_session="));

        let mut browser = Browser {
            cookie,
            csrf: String::new(),
        };
        let page = self.get(Some(&browser), "/").await;
        assert_eq!(page.status, StatusCode::OK);
        browser.csrf = csrf_from(&page.body);
        browser
    }

    async fn admin(&self) -> Browser {
        self.login("admin", ADMIN_PASSWORD).await
    }

    fn add_user(&self, username: &str, role: Role) -> UserId {
        let now = Utc::now();
        let user = UserRecord {
            id: UserId::new(),
            username: Username::new(username).unwrap(),
            full_name: format!("{username} test"),
            role,
            password_hash: hash_password("user-password-1", 1_000),
            active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        let id = user.id;
        self.state.users.insert(id, user);
        id
    }

    fn item_by_code(&self, code: &str) -> ItemRecord {
        self.state
            .items
            .filter(|i| i.code.as_str() == code)
            .into_iter()
            .next()
            .expect("item exists")
    }

    /// Create an item with opening stock and a department to issue to.
    async fn stocked(&self, browser: &Browser) -> (String, String) {
        let reply = self
            .submit(
                browser,
                "/items",
                &[
                    ("code", "A4-80"),
                    ("name", "A4 paper 80gsm"),
                    ("category", "paper"),
                    ("unit", "ream"),
                    ("reorder_level", "5"),
                    ("opening_jct", "10"),
                    ("opening_uct", ""),
                    ("opened_on", ""),
                    ("active", "on"),
                ],
            )
            .await;
        assert_eq!(reply.status, StatusCode::SEE_OTHER, "{}", reply.body);

        let reply = self
            .submit(browser, "/departments", &[("code", "FIN"), ("name", "Finance")])
            .await;
        assert_eq!(reply.status, StatusCode::SEE_OTHER, "{}", reply.body);

        let item = self.item_by_code("A4-80");
        let dept = self
            .state
            .departments
            .filter(|d| d.code == "FIN")
            .into_iter()
            .next()
            .expect("department exists");
        (item.id.to_string(), dept.id.to_string())
    }
}

// ── Sessions ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn pages_redirect_to_login_when_signed_out() {
    let app = setup().await;
    let reply = app.get(None, "/items?q=toner").await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert!(reply.location().starts_with("/login?next="));
    assert!(reply.location().contains("items"));

    let reply = app.get(None, "/").await;
    assert_eq!(reply.location(), "/login");
}

#[tokio::test]
async fn api_answers_401_json_when_signed_out() {
    let app = setup().await;
    let reply = app.get(None, "/api/v1/stock").await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn wrong_password_is_refused() {
    let app = setup().await;
    let reply = app
        .post(
            None,
            "/login",
            &[("username", "admin"), ("password", "not-the-password"), ("next", "")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert!(reply.body.contains("Invalid username or password."));
    assert!(reply.headers.get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn login_honours_local_next_only() {
    let app = setup().await;
    let reply = app
        .post(
            None,
            "/login",
            &[("username", "admin"), ("password", ADMIN_PASSWORD), ("next", "/reports")],
        )
        .await;
    assert_eq!(reply.location(), "/reports");

    let reply = app
        .post(
            None,
            "/login",
            &[
                ("username", "admin"),
                ("password", ADMIN_PASSWORD),
                ("next", "//evil.example"),
            ],
        )
        .await;
    assert_eq!(reply.location(), "/");
}

#[tokio::test]
async fn next_with_control_characters_falls_back_to_home() {
    let app = setup().await;
    for next in ["/a\nb", "/\t/evil.example", "/\r\n/evil.example"] {
        let reply = app
            .post(
                None,
                "/login",
                &[("username", "admin"), ("password", ADMIN_PASSWORD), ("next", next)],
            )
            .await;
        assert_eq!(reply.status, StatusCode::SEE_OTHER, "{next:?}");
        assert_eq!(reply.location(), "/", "{next:?}");
    }

    // Already signed in: the form redirects straight away.
    let browser = app.admin().await;
    let reply = app.get(Some(&browser), "/login?next=%0A").await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), "/");
}

#[tokio::test]
async fn sign_in_is_throttled_after_five_failures() {
    let app = setup().await;
    for _ in 0..5 {
        let reply = app
            .post(
                None,
                "/login",
                &[("username", "admin"), ("password", "wrong-password"), ("next", "")],
            )
            .await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    }

    // Even the right password is refused until the window passes.
    let reply = app
        .post(
            None,
            "/login",
            &[("username", "Admin "), ("password", ADMIN_PASSWORD), ("next", "")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(reply.headers.get(header::SET_COOKIE).is_none());

    // Other accounts keep their own budget.
    app.add_user("store1", Role::Storekeeper);
    app.login("store1", "user-password-1").await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failed_sign_ins_share_one_budget() {
    let app = setup().await;
    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let router = app.router.clone();
            tokio::spawn(async move {
                let body = form_body(&[
                    ("username", "admin"),
                    ("password", "wrong-password"),
                    ("next", ""),
                ]);
                let request = Request::post("/login")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(body))
                    .unwrap();
                router.oneshot(request).await.unwrap().status()
            })
        })
        .collect();

    let (mut checked, mut throttled) = (0, 0);
    for task in tasks {
        match task.await.unwrap() {
            StatusCode::UNAUTHORIZED => checked += 1,
            StatusCode::TOO_MANY_REQUESTS => throttled += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(checked, 5);
    assert_eq!(throttled, 15);
}

#[tokio::test]
async fn deactivated_users_are_signed_out_on_their_next_request() {
    let app = setup().await;
    let id = app.add_user("store1", Role::Storekeeper);
    let keeper = app.login("store1", "user-password-1").await;
    assert_eq!(app.get(Some(&keeper), "/items").await.status, StatusCode::OK);

    app.state.users.update(&id, |u| u.active = false);
    let reply = app.get(Some(&keeper), "/items").await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert!(reply.location().starts_with("/login"));

    // The session is gone for good, not just refused once.
    app.state.users.update(&id, |u| u.active = true);
    let reply = app.get(Some(&keeper), "/items").await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn changing_own_password_signs_out_other_browsers() {
    let app = setup().await;
    let laptop = app.admin().await;
    let phone = app.admin().await;

    let reply = app
        .submit(
            &laptop,
            "/account/password",
            &[
                ("current_password", "not-my-password"),
                ("new_password", "harbour-lights-9"),
                ("confirm_password", "harbour-lights-9"),
            ],
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(reply.body.contains("The current password is incorrect."));
    assert_eq!(app.get(Some(&phone), "/items").await.status, StatusCode::OK);

    let reply = app
        .submit(
            &laptop,
            "/account/password",
            &[
                ("current_password", ADMIN_PASSWORD),
                ("new_password", "harbour-lights-9"),
                ("confirm_password", "harbour-lights-9"),
            ],
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER, "{}", reply.body);
    assert_eq!(reply.location(), "/");

    assert_eq!(app.get(Some(&laptop), "/items").await.status, StatusCode::OK);
    let reply = app.get(Some(&phone), "/items").await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);

    let reply = app
        .post(
            None,
            "/login",
            &[("username", "admin"), ("password", ADMIN_PASSWORD), ("next", "")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    app.login("admin", "harbour-lights-9").await;
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = setup().await;
    let browser = app.admin().await;
    let reply = app.submit(&browser, "/logout", &[]).await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), "/login");

    let reply = app.get(Some(&browser), "/items").await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert!(reply.location().starts_with("/login"));
}

// ── Guards ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn forms_without_matching_csrf_token_are_forbidden() {
    let app = setup().await;
    let browser = app.admin().await;
    let reply = app
        .post(
            Some(&browser),
            "/departments",
            &[("csrf_token", "forged"), ("code", "OPS"), ("name", "Operations")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert!(app.state.departments.is_empty());
}

#[tokio::test]
async fn viewers_cannot_record_movements_or_manage_users() {
    let app = setup().await;
    app.add_user("clerk", Role::Viewer);
    let viewer = app.login("clerk", "user-password-1").await;

    assert_eq!(app.get(Some(&viewer), "/issues/new").await.status, StatusCode::FORBIDDEN);
    assert_eq!(app.get(Some(&viewer), "/users").await.status, StatusCode::FORBIDDEN);
    assert_eq!(app.get(Some(&viewer), "/audit").await.status, StatusCode::FORBIDDEN);

    // Read-only pages stay open.
    assert_eq!(app.get(Some(&viewer), "/items").await.status, StatusCode::OK);
    assert_eq!(app.get(Some(&viewer), "/reports/stock").await.status, StatusCode::OK);
}

#[tokio::test]
async fn storekeepers_cannot_administer_departments() {
    let app = setup().await;
    app.add_user("store1", Role::Storekeeper);
    let keeper = app.login("store1", "user-password-1").await;
    let reply = app
        .submit(&keeper, "/departments", &[("code", "OPS"), ("name", "Operations")])
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admins_cannot_demote_themselves() {
    let app = setup().await;
    let browser = app.admin().await;
    let admin_id = app
        .state
        .users
        .filter(|u| u.username.as_str() == "admin")
        .into_iter()
        .next()
        .expect("bootstrap admin")
        .id;

    let reply = app
        .submit(
            &browser,
            &format!("/users/{admin_id}"),
            &[("full_name", "Administrator"), ("role", "storekeeper"), ("active", "on")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert!(reply.body.contains("you cannot deactivate or demote your own account"));
    assert_eq!(app.state.users.get(&admin_id).unwrap().role, Role::Admin);

    // Leaving out `active` would deactivate the account.
    let reply = app
        .submit(
            &browser,
            &format!("/users/{admin_id}"),
            &[("full_name", "Administrator"), ("role", "admin")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert!(app.state.users.get(&admin_id).unwrap().active);
}

#[tokio::test]
async fn deactivating_a_user_ends_their_sessions() {
    let app = setup().await;
    let browser = app.admin().await;
    let other = app.add_user("deputy", Role::Admin);
    let deputy = app.login("deputy", "user-password-1").await;

    let reply = app
        .submit(
            &browser,
            &format!("/users/{other}"),
            &[("full_name", "Deputy"), ("role", "viewer")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER, "{}", reply.body);
    assert_eq!(reply.location(), "/users");

    let record = app.state.users.get(&other).unwrap();
    assert_eq!(record.role, Role::Viewer);
    assert!(!record.active);
    let reply = app.get(Some(&deputy), "/items").await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert!(reply.location().starts_with("/login"));
}

#[tokio::test]
async fn audit_page_shows_a_verified_chain() {
    let app = setup().await;
    let browser = app.admin().await;
    app.stocked(&browser).await;

    let reply = app.get(Some(&browser), "/audit").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.contains("Chain verified"));
    assert!(reply.body.contains("item.create"));
    assert!(reply.body.contains("department.create"));

    let reply = app.get(Some(&browser), "/audit?resource_type=department").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.contains("department.create"));
    assert!(!reply.body.contains("item.create"));
}

// ── Stock movements ─────────────────────────────────────────────────────────

#[tokio::test]
async fn receive_issue_and_return_move_the_terminal_counter() {
    let app = setup().await;
    let browser = app.admin().await;
    let (item_id, dept_id) = app.stocked(&browser).await;
    assert_eq!(app.item_by_code("A4-80").stock.get(Terminal::Jct), 10);

    let reply = app
        .submit(
            &browser,
            "/receipts",
            &[
                ("item_id", &item_id),
                ("terminal", "uct"),
                ("quantity", "4"),
                ("supplier", "Harbour Stationers"),
                ("reference", "INV-7"),
                ("received_on", ""),
                ("remarks", ""),
            ],
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER, "{}", reply.body);
    assert_eq!(reply.location(), "/receipts");
    assert_eq!(app.item_by_code("A4-80").stock.get(Terminal::Uct), 4);

    let reply = app
        .submit(
            &browser,
            "/issues",
            &[
                ("item_id", &item_id),
                ("terminal", "jct"),
                ("quantity", "7"),
                ("department_id", &dept_id),
                ("requested_by", "A. Clerk"),
                ("issued_on", ""),
                ("remarks", ""),
            ],
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER, "{}", reply.body);
    let voucher = reply.location().to_string();
    assert!(voucher.starts_with("/issues/"));
    assert_eq!(app.item_by_code("A4-80").stock.get(Terminal::Jct), 3);

    let page = app.get(Some(&browser), &voucher).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Issued under voucher"));
    assert!(page.body.contains("Finance"));

    let reply = app
        .submit(
            &browser,
            &format!("{voucher}/return"),
            &[("quantity", "2"), ("reason", "Unopened"), ("returned_on", "")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER, "{}", reply.body);
    assert_eq!(reply.location(), voucher);
    assert_eq!(app.item_by_code("A4-80").stock.get(Terminal::Jct), 5);

    // Only five of the seven issued remain returnable.
    let reply = app
        .submit(
            &browser,
            &format!("{voucher}/return"),
            &[("quantity", "6"), ("reason", "Too many"), ("returned_on", "")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(app.item_by_code("A4-80").stock.get(Terminal::Jct), 5);
    assert_eq!(app.state.returns.len(), 1);
}

#[tokio::test]
async fn issuing_more_than_the_terminal_holds_is_refused() {
    let app = setup().await;
    let browser = app.admin().await;
    let (item_id, dept_id) = app.stocked(&browser).await;

    // UCT holds nothing even though JCT holds ten.
    let reply = app
        .submit(
            &browser,
            "/issues",
            &[
                ("item_id", &item_id),
                ("terminal", "uct"),
                ("quantity", "1"),
                ("department_id", &dept_id),
                ("requested_by", "A. Clerk"),
            ],
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert!(reply.body.contains("insufficient stock"));

    let reply = app
        .submit(
            &browser,
            "/issues",
            &[
                ("item_id", &item_id),
                ("terminal", "jct"),
                ("quantity", "11"),
                ("department_id", &dept_id),
                ("requested_by", "A. Clerk"),
            ],
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let item = app.item_by_code("A4-80");
    assert_eq!(item.stock.get(Terminal::Jct), 10);
    assert_eq!(item.stock.get(Terminal::Uct), 0);
    assert!(app.state.issues.is_empty());
}

#[tokio::test]
async fn invalid_receipt_re_renders_the_form() {
    let app = setup().await;
    let browser = app.admin().await;
    let (item_id, _) = app.stocked(&browser).await;
    let reply = app
        .submit(
            &browser,
            "/receipts",
            &[
                ("item_id", &item_id),
                ("terminal", "jct"),
                ("quantity", "0"),
                ("supplier", "Harbour Stationers"),
            ],
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(reply.body.contains("Harbour Stationers"));
    assert_eq!(app.item_by_code("A4-80").stock.get(Terminal::Jct), 10);
}

#[tokio::test]
async fn duplicate_item_code_is_a_conflict() {
    let app = setup().await;
    let browser = app.admin().await;
    app.stocked(&browser).await;
    let reply = app
        .submit(
            &browser,
            "/items",
            &[("code", "a4-80"), ("name", "Another"), ("category", "paper")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(app.state.items.len(), 1);
}

#[tokio::test]
async fn storekeepers_edit_items_but_only_admins_delete_them() {
    let app = setup().await;
    let admin = app.admin().await;
    let (item_id, _) = app.stocked(&admin).await;
    app.add_user("store1", Role::Storekeeper);
    let keeper = app.login("store1", "user-password-1").await;

    // An unchecked `active` box deactivates the item; stock is untouched.
    let reply = app
        .submit(
            &keeper,
            &format!("/items/{item_id}"),
            &[
                ("code", "A4-80"),
                ("name", "A4 paper 80gsm white"),
                ("category", "paper"),
                ("unit", "ream"),
                ("reorder_level", "8"),
            ],
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER, "{}", reply.body);
    assert_eq!(reply.location(), format!("/items/{item_id}"));
    let item = app.item_by_code("A4-80");
    assert!(!item.active);
    assert_eq!(item.reorder_level, 8);
    assert_eq!(item.stock.get(Terminal::Jct), 10);

    let reply = app
        .submit(
            &keeper,
            "/items",
            &[("code", "TMP-9"), ("name", "Temporary"), ("category", "other")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER, "{}", reply.body);
    let spare = app.item_by_code("TMP-9");

    let reply = app
        .submit(&keeper, &format!("/items/{}/delete", spare.id), &[])
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert!(app.state.items.contains(&spare.id));

    let reply = app
        .submit(&admin, &format!("/items/{}/delete", spare.id), &[])
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), "/items");
    assert!(!app.state.items.contains(&spare.id));

    // Items with movements stay; the admin is sent back with a message.
    let reply = app
        .submit(&admin, &format!("/items/{item_id}/delete"), &[])
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), format!("/items/{item_id}"));
    assert_eq!(app.state.items.len(), 1);
}

// ── Rendering ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn user_text_is_escaped() {
    let app = setup().await;
    let browser = app.admin().await;
    let reply = app
        .submit(
            &browser,
            "/items",
            &[
                ("code", "X-1"),
                ("name", "<script>alert(1)</script> & co"),
                ("category", "other"),
            ],
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER, "{}", reply.body);

    let page = app.get(Some(&browser), "/items").await;
    assert!(page.body.contains("&lt;script&gt;alert(1)&lt;/script&gt; &amp; co"));
    assert!(!page.body.contains("<script>alert(1)"));
}

#[tokio::test]
async fn reports_render_and_print() {
    let app = setup().await;
    let browser = app.admin().await;
    app.stocked(&browser).await;

    for uri in [
        "/reports",
        "/reports/stock",
        "/reports/movements",
        "/reports/consumption",
        "/receipts",
        "/issues",
        "/returns",
    ] {
        let reply = app.get(Some(&browser), uri).await;
        assert_eq!(reply.status, StatusCode::OK, "{uri}");
    }

    let screen = app.get(Some(&browser), "/reports/stock").await;
    assert!(screen.body.contains("A4-80"));
    assert!(!screen.body.contains("data-autoprint"));

    let print = app.get(Some(&browser), "/reports/stock?print=1").await;
    assert!(print.body.contains("data-autoprint"));
    assert!(print.body.contains("A4-80"));

    let bad = app.get(Some(&browser), "/reports/movements?from=2026-13-01").await;
    assert_eq!(bad.status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ── JSON API ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn stock_api_reports_both_terminals() {
    let app = setup().await;
    let browser = app.admin().await;
    let (item_id, _) = app.stocked(&browser).await;

    let reply = app.get(Some(&browser), "/api/v1/stock").await;
    assert_eq!(reply.status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(body["total_jct"], 10);
    assert_eq!(body["total_uct"], 0);
    assert_eq!(body["items"][0]["code"], "A4-80");

    let reply = app.get(Some(&browser), "/api/v1/stock/low").await;
    let body: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 0);

    let reply = app
        .get(Some(&browser), &format!("/api/v1/items/{item_id}/ledger"))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(body["current_jct"], 10);

    let reply = app.get(Some(&browser), "/api/v1/items/nope/ledger").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    let body: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = setup().await;
    let browser = app.admin().await;
    let reply = app.get(Some(&browser), "/api/v1/openapi.json").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.contains("/api/v1/stock"));
}

// ── Operations ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_probes_are_public() {
    let app = setup().await;
    let live = app.get(None, "/health/liveness").await;
    assert_eq!(live.status, StatusCode::OK);
    assert_eq!(live.body, "ok");
    let ready = app.get(None, "/health/readiness").await;
    assert_eq!(ready.status, StatusCode::OK);
}

#[tokio::test]
async fn metrics_expose_inventory_gauges() {
    let app = setup().await;
    let browser = app.admin().await;
    app.stocked(&browser).await;
    let reply = app.get(None, "/metrics").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.contains("portstock_items_total 1"));
    assert!(reply.body.contains("portstock_stock_units{terminal=\"jct\"} 10"));
    assert!(reply.body.contains("portstock_http_requests_total"));
}

#[tokio::test]
async fn static_assets_are_served() {
    let app = setup().await;
    let css = app.get(None, "/assets/app.css").await;
    assert_eq!(css.status, StatusCode::OK);
    let js = app.get(None, "/assets/app.js").await;
    assert_eq!(js.status, StatusCode::OK);
    assert!(js.body.contains("data-autoprint"));
}
