//! Sign-in, account, department, user and audit pages.

use std::collections::HashMap;

use axum::response::Html;
use portstock_core::{DepartmentId, DepartmentRecord, Role, UserRecord};

use super::{
    checkbox, csrf_field, error_banner, escape, fmt_datetime, input, select, table, with_any,
    Layout,
};
use crate::audit::{AuditEntry, ChainIntegrity};
use crate::auth::CurrentUser;
use crate::routes::users::{NewUserForm, ProfileForm};
use crate::state::AppState;

fn role_options() -> Vec<(String, String)> {
    Role::ALL
        .iter()
        .map(|r| (r.as_str().to_string(), r.label().to_string()))
        .collect()
}

// ── Sign-in and own account ─────────────────────────────────────────────────

pub fn login_page(username: &str, next: &str, error: Option<&str>) -> Html<String> {
    let mut body = String::from("<div class=\"login\">\n");
    body.push_str(&error_banner(error));
    body.push_str("<form method=\"post\" action=\"/login\" class=\"stacked\">\n");
    body.push_str(&input(
        "Username",
        "username",
        "text",
        username,
        "required autofocus autocomplete=\"username\" maxlength=\"32\"",
    ));
    body.push_str(&input(
        "Password",
        "password",
        "password",
        "",
        "required autocomplete=\"current-password\"",
    ));
    body.push_str(&format!(
        "<input type=\"hidden\" name=\"next\" value=\"{}\">\n",
        escape(next)
    ));
    body.push_str("<button type=\"submit\">Sign in</button>\n</form>\n</div>\n");
    Layout::new("Sign in").render(&body)
}

pub fn password_page(state: &AppState, user: &CurrentUser, error: Option<&str>) -> Html<String> {
    let mut body = error_banner(error);
    body.push_str(&format!(
        "<form method=\"post\" action=\"/account/password\" class=\"stacked\">\n{}",
        csrf_field(&user.csrf_token)
    ));
    body.push_str(&input(
        "Current password",
        "current_password",
        "password",
        "",
        "required autocomplete=\"current-password\"",
    ));
    body.push_str(&input(
        "New password",
        "new_password",
        "password",
        "",
        "required minlength=\"8\" maxlength=\"128\" autocomplete=\"new-password\"",
    ));
    body.push_str(&input(
        "Confirm new password",
        "confirm_password",
        "password",
        "",
        "required minlength=\"8\" maxlength=\"128\" autocomplete=\"new-password\"",
    ));
    body.push_str("<p class=\"hint\">Other browsers signed in as you will be signed out.</p>\n");
    body.push_str("<button type=\"submit\">Change password</button> <a href=\"/\">Cancel</a>\n</form>\n");
    Layout::for_user(state, user, "Change password").render(&body)
}

// ── Departments ─────────────────────────────────────────────────────────────

pub fn department_page(
    layout: Layout<'_>,
    user: &CurrentUser,
    departments: &[DepartmentRecord],
    issue_counts: &HashMap<DepartmentId, usize>,
    error: Option<&str>,
) -> Html<String> {
    let admin = user.has_role(Role::Admin);
    let mut body = error_banner(error);
    if admin {
        body.push_str(
            "<div class=\"toolbar\"><button type=\"button\" data-modal-open=\"dept-new\">New department</button></div>\n",
        );
        body.push_str(&format!(
            "<dialog id=\"dept-new\"><form method=\"post\" action=\"/departments\" class=\"stacked\">\n{}{}{}\
             <button type=\"submit\">Add</button> <button type=\"button\" data-modal-close>Cancel</button>\n</form></dialog>\n",
            csrf_field(&user.csrf_token),
            input(
                "Code",
                "code",
                "text",
                "",
                "required maxlength=\"12\" pattern=\"[A-Za-z0-9]{2,12}\"",
            ),
            input("Name", "name", "text", "", "required maxlength=\"120\""),
        ));
    }

    let mut rows = String::new();
    let mut dialogs = String::new();
    for d in departments {
        let status = if d.active {
            "<span class=\"badge ok\">Active</span>"
        } else {
            "<span class=\"badge\">Inactive</span>"
        };
        let action = if admin {
            format!(
                "<button type=\"button\" class=\"link\" data-modal-open=\"dept-{}\">Edit</button>",
                d.id
            )
        } else {
            String::new()
        };
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td class=\"num\">{}</td><td>{status}</td><td>{action}</td></tr>\n",
            escape(&d.code),
            escape(&d.name),
            issue_counts.get(&d.id).copied().unwrap_or(0),
        ));
        if admin {
            dialogs.push_str(&format!(
                "<dialog id=\"dept-{id}\"><form method=\"post\" action=\"/departments/{id}\" class=\"stacked\">\n{}{}{}{}\
                 <button type=\"submit\">Save</button> <button type=\"button\" data-modal-close>Cancel</button>\n</form></dialog>\n",
                csrf_field(&user.csrf_token),
                input("Code", "code", "text", &d.code, "required maxlength=\"12\""),
                input("Name", "name", "text", &d.name, "required maxlength=\"120\""),
                checkbox("Active", "active", d.active),
                id = d.id,
            ));
        }
    }
    body.push_str(&table("departments", &["Code", "Name", "Issues", "Status", ""], &rows, true));
    body.push_str(&dialogs);
    body.push_str("<p class=\"hint\">Inactive departments keep their history but cannot receive new issues.</p>\n");
    layout.render(&body)
}

// ── Users ───────────────────────────────────────────────────────────────────

pub fn user_list(layout: Layout<'_>, user: &CurrentUser, users: &[UserRecord]) -> Html<String> {
    let mut body = String::from("<div class=\"toolbar\"><a href=\"/users/new\">New user</a></div>\n");
    let mut rows = String::new();
    for u in users {
        let you = if u.id == user.id { " <span class=\"hint\">(you)</span>" } else { "" };
        let status = if u.active {
            "<span class=\"badge ok\">Active</span>"
        } else {
            "<span class=\"badge\">Inactive</span>"
        };
        rows.push_str(&format!(
            "<tr><td>{}{you}</td><td>{}</td><td>{}</td><td>{status}</td><td>{}</td><td><a href=\"/users/{}/edit\">Edit</a></td></tr>\n",
            escape(u.username.as_str()),
            escape(&u.full_name),
            u.role.label(),
            u.last_login_at.map(fmt_datetime).unwrap_or_else(|| "never".to_string()),
            u.id,
        ));
    }
    body.push_str(&table(
        "users",
        &["Username", "Name", "Role", "Status", "Last sign-in", ""],
        &rows,
        true,
    ));
    layout.render(&body)
}

pub fn new_user_form(
    layout: Layout<'_>,
    user: &CurrentUser,
    form: &NewUserForm,
    error: Option<&str>,
) -> Html<String> {
    let mut body = error_banner(error);
    body.push_str(&format!(
        "<form method=\"post\" action=\"/users\" class=\"stacked\">\n{}",
        csrf_field(&user.csrf_token)
    ));
    body.push_str(&input(
        "Username",
        "username",
        "text",
        &form.username,
        "required minlength=\"3\" maxlength=\"32\" autocomplete=\"off\"",
    ));
    body.push_str(&input(
        "Full name",
        "full_name",
        "text",
        &form.full_name,
        "required maxlength=\"120\"",
    ));
    body.push_str(&select("Role", "role", &role_options(), &form.role, "required"));
    body.push_str(&input(
        "Password",
        "password",
        "password",
        "",
        "required minlength=\"8\" maxlength=\"128\" autocomplete=\"new-password\"",
    ));
    body.push_str(&input(
        "Confirm password",
        "confirm_password",
        "password",
        "",
        "required minlength=\"8\" maxlength=\"128\" autocomplete=\"new-password\"",
    ));
    body.push_str("<button type=\"submit\">Create account</button> <a href=\"/users\">Cancel</a>\n</form>\n");
    layout.render(&body)
}

pub fn edit_user_form(
    layout: Layout<'_>,
    user: &CurrentUser,
    target: &UserRecord,
    form: &ProfileForm,
    error: Option<&str>,
) -> Html<String> {
    let mut body = error_banner(error);
    body.push_str(&format!(
        "<p>Username <strong>{}</strong></p>\n<form method=\"post\" action=\"/users/{}\" class=\"stacked\">\n{}",
        escape(target.username.as_str()),
        target.id,
        csrf_field(&user.csrf_token)
    ));
    body.push_str(&input(
        "Full name",
        "full_name",
        "text",
        &form.full_name,
        "required maxlength=\"120\"",
    ));
    body.push_str(&select("Role", "role", &role_options(), &form.role, "required"));
    body.push_str(&checkbox("Active", "active", form.active.is_some()));
    if target.id == user.id {
        body.push_str("<p class=\"hint\">You cannot deactivate or demote your own account.</p>\n");
    }
    body.push_str("<button type=\"submit\">Save</button> <a href=\"/users\">Cancel</a>\n</form>\n");

    body.push_str("<h2>Reset password</h2>\n");
    body.push_str(&format!(
        "<form method=\"post\" action=\"/users/{}/password\" class=\"stacked\" data-confirm=\"Reset this user's password and sign them out everywhere?\">\n{}",
        target.id,
        csrf_field(&user.csrf_token)
    ));
    body.push_str(&input(
        "New password",
        "password",
        "password",
        "",
        "required minlength=\"8\" maxlength=\"128\" autocomplete=\"new-password\"",
    ));
    body.push_str(&input(
        "Confirm new password",
        "confirm_password",
        "password",
        "",
        "required minlength=\"8\" maxlength=\"128\" autocomplete=\"new-password\"",
    ));
    body.push_str("<button type=\"submit\" class=\"danger\">Reset password</button>\n</form>\n");
    layout.render(&body)
}

// ── Audit ───────────────────────────────────────────────────────────────────

pub fn audit_page(
    layout: Layout<'_>,
    entries: &[AuditEntry],
    integrity: &ChainIntegrity,
    resource_type: &str,
) -> Html<String> {
    let mut body = if integrity.is_valid() {
        format!(
            "<div class=\"flash success\">Chain verified: {} event(s), no broken links.</div>\n",
            integrity.total_events
        )
    } else {
        let broken: Vec<String> = integrity.broken.iter().map(|s| s.to_string()).collect();
        format!(
            "<div class=\"flash error\" role=\"alert\">Chain verification failed at sequence {}.</div>\n",
            escape(&broken.join(", "))
        )
    };

    let types = with_any(
        "All resources",
        ["item", "receipt", "issue", "return", "department", "user"]
            .iter()
            .map(|t| (t.to_string(), t.to_string())),
    );
    body.push_str("<form method=\"get\" action=\"/audit\" class=\"filters\">");
    body.push_str(&select("Resource", "resource_type", &types, resource_type, ""));
    body.push_str("<button type=\"submit\">Apply</button></form>\n");

    let mut rows = String::new();
    for e in entries {
        let class = if integrity.broken.contains(&e.sequence) { " class=\"low\"" } else { "" };
        rows.push_str(&format!(
            "<tr{class}><td class=\"num\">{}</td><td>{}</td><td>{}</td><td>{}</td><td>{} <code>{}</code></td><td><code>{}</code></td><td><code title=\"{}\">{}</code></td></tr>\n",
            e.sequence,
            fmt_datetime(e.created_at),
            escape(&e.actor),
            escape(&e.action),
            escape(&e.resource_type),
            escape(&e.resource_id.to_string()[..8]),
            escape(&e.detail.to_string()),
            escape(&e.event_hash),
            escape(&e.event_hash[..12.min(e.event_hash.len())]),
        ));
    }
    body.push_str(&table(
        "audit",
        &["#", "When", "Who", "Action", "Resource", "Detail", "Hash"],
        &rows,
        true,
    ));
    layout.render(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use portstock_core::{UserId, Username};

    fn admin() -> CurrentUser {
        CurrentUser {
            id: UserId::new(),
            username: "admin".into(),
            full_name: "Admin".into(),
            role: Role::Admin,
            session_token: "s".into(),
            csrf_token: "tok".into(),
        }
    }

    #[test]
    fn login_page_escapes_next_and_username() {
        let Html(html) = login_page(
            "a\"b",
            "/items?x=\"><script>",
            Some("Invalid username or password."),
        );
        assert!(html.contains("value=\"a&quot;b\""));
        assert!(html.contains("&quot;&gt;&lt;script&gt;"));
        assert!(html.contains("Invalid username or password."));
        assert!(!html.contains("csrf-token"));
    }

    #[test]
    fn viewer_sees_departments_without_edit_dialogs() {
        let dept = DepartmentRecord {
            id: DepartmentId::new(),
            code: "OPS".into(),
            name: "Operations".into(),
            active: true,
            created_at: Utc::now(),
        };
        let mut viewer = admin();
        viewer.role = Role::Viewer;
        let Html(html) = department_page(
            Layout::new("Departments"),
            &viewer,
            std::slice::from_ref(&dept),
            &HashMap::new(),
            None,
        );
        assert!(html.contains("Operations"));
        assert!(!html.contains("<dialog"));

        let Html(html) = department_page(
            Layout::new("Departments"),
            &admin(),
            &[dept],
            &HashMap::new(),
            None,
        );
        assert!(html.contains("<dialog id=\"dept-new\">"));
        assert!(html.contains("data-modal-open=\"dept-"));
    }

    #[test]
    fn user_list_marks_current_user() {
        let me = admin();
        let now = Utc::now();
        let record = UserRecord {
            id: me.id,
            username: Username::new("admin").unwrap(),
            full_name: "Admin".into(),
            role: Role::Admin,
            password_hash: String::new(),
            active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        let Html(html) = user_list(Layout::new("Users"), &me, &[record]);
        assert!(html.contains("(you)"));
        assert!(html.contains("never"));
    }
}
