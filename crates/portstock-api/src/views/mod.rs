//! # HTML Views
//!
//! Server-side rendering. Every page goes through [`Layout`], which adds the
//! navigation for the user's role, the flash banner, and the CSRF meta tag
//! read by `app.js`. Pages requested with `?print=1` get the print layout:
//! no navigation, a letterhead, and an automatic print dialog.
//!
//! Every value that came from a user or the database is passed through
//! [`escape`] before it is written into markup.

pub mod admin;
pub mod assets;
pub mod inventory;
pub mod reports;

use std::collections::HashMap;

use axum::http::StatusCode;
use axum::response::Html;
use chrono::{DateTime, Local, NaiveDate, Utc};
use portstock_core::{DepartmentId, ItemId, ItemRecord, MovementId, Role, UserId};

use crate::auth::{CurrentUser, Flash, FlashKind};
use crate::state::AppState;

/// Organisation name printed on every page.
pub const ORG_NAME: &str = "Port Authority Stores";

/// Escape text for HTML element content and quoted attribute values.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encode a query-string component.
pub fn url_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

pub fn fmt_date(d: NaiveDate) -> String {
    d.format("%d %b %Y").to_string()
}

pub fn fmt_datetime(t: DateTime<Utc>) -> String {
    t.with_timezone(&Local).format("%d %b %Y %H:%M").to_string()
}

/// Thousands-separated integer.
pub fn fmt_qty(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Short voucher number shown on issue vouchers and registers.
pub fn voucher_no(id: MovementId) -> String {
    let hex = id.to_string().replace('-', "");
    format!("ISS-{}", hex[..8].to_ascii_uppercase())
}

// ── Lookups ─────────────────────────────────────────────────────────────────

/// Display names for the identifiers that movement records carry.
#[derive(Debug, Default)]
pub struct Lookup {
    items: HashMap<ItemId, ItemRecord>,
    departments: HashMap<DepartmentId, String>,
    users: HashMap<UserId, String>,
}

impl Lookup {
    pub fn new(state: &AppState) -> Self {
        Self {
            items: state.items.list().into_iter().map(|i| (i.id, i)).collect(),
            departments: state
                .departments
                .list()
                .into_iter()
                .map(|d| (d.id, d.name))
                .collect(),
            users: state
                .users
                .list()
                .into_iter()
                .map(|u| (u.id, u.full_name))
                .collect(),
        }
    }

    pub fn item_code(&self, id: ItemId) -> String {
        self.items
            .get(&id)
            .map(|i| i.code.to_string())
            .unwrap_or_else(|| "(deleted item)".to_string())
    }

    pub fn item_name(&self, id: ItemId) -> String {
        self.items.get(&id).map(|i| i.name.clone()).unwrap_or_default()
    }

    pub fn unit(&self, id: ItemId) -> String {
        self.items.get(&id).map(|i| i.unit.clone()).unwrap_or_default()
    }

    pub fn department(&self, id: DepartmentId) -> String {
        self.departments
            .get(&id)
            .cloned()
            .unwrap_or_else(|| "(unknown department)".to_string())
    }

    pub fn user(&self, id: UserId) -> String {
        self.users
            .get(&id)
            .cloned()
            .unwrap_or_else(|| "(unknown user)".to_string())
    }
}

// ── Layout ──────────────────────────────────────────────────────────────────

/// Page chrome builder.
pub struct Layout<'a> {
    title: &'a str,
    user: Option<&'a CurrentUser>,
    flash: Option<Flash>,
    print: bool,
}

impl<'a> Layout<'a> {
    pub fn new(title: &'a str) -> Self {
        Self {
            title,
            user: None,
            flash: None,
            print: false,
        }
    }

    /// Layout for a signed-in page. Consumes the session's pending flash.
    pub fn for_user(state: &AppState, user: &'a CurrentUser, title: &'a str) -> Self {
        Self {
            title,
            flash: state.sessions.take_flash(&user.session_token),
            user: Some(user),
            print: false,
        }
    }

    pub fn print(mut self, print: bool) -> Self {
        self.print = print;
        self
    }

    pub fn render(self, body: &str) -> Html<String> {
        let title = escape(self.title);
        let csrf = self
            .user
            .map(|u| format!("<meta name=\"csrf-token\" content=\"{}\">", escape(&u.csrf_token)))
            .unwrap_or_default();

        let mut html = String::with_capacity(body.len() + 2048);
        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
        html.push_str(&format!("<title>{title} · {ORG_NAME}</title>\n{csrf}\n"));
        html.push_str("<link rel=\"stylesheet\" href=\"/assets/app.css\">\n");
        html.push_str("<script src=\"/assets/app.js\" defer></script>\n</head>\n");

        if self.print {
            html.push_str("<body class=\"print\" data-autoprint>\n<header class=\"letterhead\">");
            html.push_str(&format!(
                "<strong>{ORG_NAME}</strong><span>Printed {}</span></header>\n",
                escape(&Local::now().format("%d %b %Y %H:%M").to_string())
            ));
            html.push_str(&format!("<main>\n<h1>{title}</h1>\n{body}\n</main>\n"));
            html.push_str("<footer class=\"signatures\"><span>Prepared by</span><span>Checked by</span><span>Approved by</span></footer>\n");
            html.push_str("</body>\n</html>\n");
            return Html(html);
        }

        html.push_str("<body>\n");
        if let Some(user) = self.user {
            html.push_str(&nav(user));
        }
        html.push_str("<main>\n");
        if let Some(flash) = &self.flash {
            html.push_str(&flash_banner(flash));
        }
        html.push_str(&format!("<h1>{title}</h1>\n{body}\n</main>\n</body>\n</html>\n"));
        Html(html)
    }
}

fn nav(user: &CurrentUser) -> String {
    let mut links = vec![
        ("/", "Dashboard"),
        ("/items", "Items"),
        ("/receipts", "Receiving"),
        ("/issues", "Issuing"),
        ("/returns", "Returns"),
        ("/reports", "Reports"),
        ("/departments", "Departments"),
    ];
    if user.has_role(Role::Admin) {
        links.push(("/users", "Users"));
        links.push(("/audit", "Audit"));
    }
    let mut out = String::from("<nav class=\"topnav\">\n");
    out.push_str(&format!("<a class=\"brand\" href=\"/\">{ORG_NAME}</a>\n<ul>\n"));
    for (href, label) in links {
        out.push_str(&format!("<li><a href=\"{href}\">{label}</a></li>\n"));
    }
    out.push_str("</ul>\n<div class=\"who\">");
    out.push_str(&format!(
        "<a href=\"/account/password\" title=\"Change password\">{}</a> <span class=\"role\">{}</span>",
        escape(&user.full_name),
        user.role.label()
    ));
    out.push_str(&format!(
        "<form method=\"post\" action=\"/logout\" class=\"inline\">{}<button type=\"submit\" class=\"link\">Sign out</button></form>",
        csrf_field(&user.csrf_token)
    ));
    out.push_str("</div>\n</nav>\n");
    out
}

fn flash_banner(flash: &Flash) -> String {
    let class = match flash.kind {
        FlashKind::Success => "flash success",
        FlashKind::Error => "flash error",
    };
    format!(
        "<div class=\"{class}\" role=\"status\">{}</div>\n",
        escape(&flash.message)
    )
}

/// Standalone error page.
pub fn error_page(status: StatusCode, message: &str) -> Html<String> {
    let title = status.canonical_reason().unwrap_or("Error");
    let body = format!(
        "<p class=\"error-message\">{}</p>\n<p><a href=\"javascript:history.back()\">Go back</a> · <a href=\"/\">Dashboard</a></p>",
        escape(message)
    );
    Layout::new(title).render(&body)
}

// ── Form helpers ────────────────────────────────────────────────────────────

/// Hidden CSRF input.
pub fn csrf_field(token: &str) -> String {
    format!(
        "<input type=\"hidden\" name=\"csrf_token\" value=\"{}\">",
        escape(token)
    )
}

/// Inline error shown above a form that failed validation.
pub fn error_banner(message: Option<&str>) -> String {
    match message {
        Some(m) => format!(
            "<div class=\"flash error\" role=\"alert\">{}</div>\n",
            escape(m)
        ),
        None => String::new(),
    }
}

/// Labelled `<input>`. `attrs` is trusted markup from the caller.
pub fn input(label: &str, name: &str, kind: &str, value: &str, attrs: &str) -> String {
    format!(
        "<label>{label}<input type=\"{kind}\" name=\"{name}\" value=\"{}\" {attrs}></label>\n",
        escape(value)
    )
}

/// Labelled `<textarea>`.
pub fn textarea(label: &str, name: &str, value: &str, attrs: &str) -> String {
    format!(
        "<label>{label}<textarea name=\"{name}\" rows=\"2\" {attrs}>{}</textarea></label>\n",
        escape(value)
    )
}

/// Labelled `<select>`. Option values and labels are escaped.
pub fn select(
    label: &str,
    name: &str,
    options: &[(String, String)],
    selected: &str,
    attrs: &str,
) -> String {
    let mut out = format!("<label>{label}<select name=\"{name}\" {attrs}>\n");
    for (value, text) in options {
        let sel = if value == selected { " selected" } else { "" };
        out.push_str(&format!(
            "<option value=\"{}\"{sel}>{}</option>\n",
            escape(value),
            escape(text)
        ));
    }
    out.push_str("</select></label>\n");
    out
}

/// Checkbox that submits `value` when ticked.
pub fn checkbox(label: &str, name: &str, checked: bool) -> String {
    let c = if checked { " checked" } else { "" };
    format!("<label class=\"check\"><input type=\"checkbox\" name=\"{name}\" value=\"on\"{c}> {label}</label>\n")
}

/// One-button POST form with a confirmation prompt.
pub fn confirm_button(action: &str, csrf: &str, label: &str, prompt: &str, class: &str) -> String {
    format!(
        "<form method=\"post\" action=\"{}\" class=\"inline\" data-confirm=\"{}\">{}<button type=\"submit\" class=\"{class}\">{label}</button></form>",
        escape(action),
        escape(prompt),
        csrf_field(csrf)
    )
}

/// Toolbar with a print button and a link to the print layout.
pub fn print_toolbar(print_href: &str) -> String {
    format!(
        "<div class=\"toolbar\"><button type=\"button\" data-print>Print</button> <a href=\"{}\" target=\"_blank\">Print layout</a></div>\n",
        escape(print_href)
    )
}

/// Table with an optional client-side filter box.
///
/// `rows` is already-escaped markup.
pub fn table(id: &str, headers: &[&str], rows: &str, filterable: bool) -> String {
    let mut out = String::new();
    if filterable {
        out.push_str(&format!(
            "<input type=\"search\" class=\"table-filter\" placeholder=\"Filter…\" data-filter=\"{id}\">\n"
        ));
    }
    out.push_str(&format!("<table id=\"{id}\" class=\"grid\">\n<thead><tr>"));
    for h in headers {
        out.push_str(&format!("<th>{h}</th>"));
    }
    out.push_str("</tr></thead>\n<tbody>\n");
    if rows.is_empty() {
        out.push_str(&format!(
            "<tr class=\"empty\"><td colspan=\"{}\">Nothing to show.</td></tr>\n",
            headers.len()
        ));
    } else {
        out.push_str(rows);
    }
    out.push_str("</tbody>\n</table>\n");
    out
}

/// `<option>` list built from `(value, label)` pairs with an "any" entry.
pub fn with_any(
    any_label: &str,
    options: impl IntoIterator<Item = (String, String)>,
) -> Vec<(String, String)> {
    std::iter::once((String::new(), any_label.to_string()))
        .chain(options)
        .collect()
}
