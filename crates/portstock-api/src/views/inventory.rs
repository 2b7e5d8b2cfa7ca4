//! Pages for the item catalog, receiving, issuing, returns and the
//! dashboard.

use axum::response::Html;
use chrono::NaiveDate;
use portstock_core::report::{ItemLedger, StockSummary};
use portstock_core::{
    Category, DepartmentRecord, IssueRecord, ItemRecord, Movement, MovementKind, ReceiptRecord,
    ReturnRecord, Role, Terminal,
};

use super::{
    checkbox, confirm_button, csrf_field, error_banner, escape, fmt_date, fmt_datetime, fmt_qty,
    input, print_toolbar, select, table, textarea, voucher_no, with_any, Layout, Lookup,
};
use crate::auth::CurrentUser;
use crate::routes::issuing::IssueForm;
use crate::routes::items::{ItemForm, ItemListQuery};
use crate::routes::receiving::ReceiptForm;
use crate::routes::returns::ReturnForm;
use crate::routes::RegisterQuery;

fn category_options() -> Vec<(String, String)> {
    Category::ALL
        .iter()
        .map(|c| (c.as_str().to_string(), c.label().to_string()))
        .collect()
}

fn terminal_options() -> Vec<(String, String)> {
    Terminal::ALL
        .iter()
        .map(|t| (t.as_str().to_string(), t.label().to_string()))
        .collect()
}

fn item_label(item: &ItemRecord) -> String {
    format!("{} · {}", item.code, item.name)
}

/// Item `<select>` whose options carry per-terminal stock for `app.js`.
fn item_select(items: &[ItemRecord], selected: &str) -> String {
    let mut out = String::from(
        "<label>Item<select name=\"item_id\" required>\n<option value=\"\">Choose an item…</option>\n",
    );
    for item in items {
        let id = item.id.to_string();
        let sel = if id == selected { " selected" } else { "" };
        out.push_str(&format!(
            "<option value=\"{id}\" data-jct=\"{}\" data-uct=\"{}\" data-unit=\"{}\"{sel}>{}</option>\n",
            item.stock.jct,
            item.stock.uct,
            escape(&item.unit),
            escape(&item_label(item)),
        ));
    }
    out.push_str("</select></label>\n");
    out
}

fn movement_badge(kind: MovementKind) -> String {
    let class = match kind {
        MovementKind::Receipt => "badge ok",
        MovementKind::Issue => "badge bad",
        MovementKind::Return => "badge",
    };
    format!("<span class=\"{class}\">{}</span>", kind.label())
}

/// Date-range filter bar for registers. `extra` is trusted markup.
pub(crate) fn range_filters(action: &str, from: NaiveDate, to: NaiveDate, extra: &str) -> String {
    format!(
        "<form method=\"get\" action=\"{action}\" class=\"filters\">\
         <label>From<input type=\"date\" name=\"from\" value=\"{from}\"></label>\
         <label>To<input type=\"date\" name=\"to\" value=\"{to}\"></label>{extra}\
         <button type=\"submit\">Apply</button></form>\n"
    )
}

/// Compact `<select>` for a filter bar.
pub(crate) fn filter_select(
    label: &str,
    name: &str,
    options: &[(String, String)],
    selected: &str,
) -> String {
    let mut out = format!("<label>{label}<select name=\"{name}\">");
    for (value, text) in options {
        let sel = if value == selected { " selected" } else { "" };
        out.push_str(&format!(
            "<option value=\"{}\"{sel}>{}</option>",
            escape(value),
            escape(text)
        ));
    }
    out.push_str("</select></label>");
    out
}

pub(crate) fn item_filter_options(items: &[ItemRecord]) -> Vec<(String, String)> {
    with_any(
        "All items",
        items.iter().map(|i| (i.id.to_string(), item_label(i))),
    )
}

pub(crate) fn terminal_filter_options() -> Vec<(String, String)> {
    with_any("Both terminals", terminal_options())
}

pub(crate) fn department_filter_options(departments: &[DepartmentRecord]) -> Vec<(String, String)> {
    with_any(
        "All departments",
        departments.iter().map(|d| (d.id.to_string(), d.name.clone())),
    )
}

// ── Dashboard ───────────────────────────────────────────────────────────────

/// Headline figures on the dashboard.
#[derive(Debug, Default)]
pub struct DashboardFigures {
    pub active_items: usize,
    pub units_jct: i64,
    pub units_uct: i64,
    pub issues_today: usize,
    pub receipts_today: usize,
}

pub fn dashboard(
    layout: Layout<'_>,
    user: &CurrentUser,
    figures: &DashboardFigures,
    low_stock: &StockSummary,
    recent: &[Movement],
    lookup: &Lookup,
) -> Html<String> {
    let mut body = String::from("<div class=\"cards\">\n");
    let cards = [
        ("Active items", fmt_qty(figures.active_items as i64)),
        ("Units at JCT", fmt_qty(figures.units_jct)),
        ("Units at UCT", fmt_qty(figures.units_uct)),
        ("Low-stock items", fmt_qty(low_stock.rows.len() as i64)),
        ("Issues today", fmt_qty(figures.issues_today as i64)),
        ("Receipts today", fmt_qty(figures.receipts_today as i64)),
    ];
    for (label, value) in cards {
        body.push_str(&format!(
            "<div class=\"card\"><div class=\"value\">{value}</div><div class=\"label\">{label}</div></div>\n"
        ));
    }
    body.push_str("</div>\n");

    if user.has_role(Role::Storekeeper) {
        body.push_str(
            "<div class=\"toolbar\"><a href=\"/receipts/new\">Receive stock</a> \
             <a href=\"/issues/new\">Issue stock</a> <a href=\"/items/new\">New item</a></div>\n",
        );
    }

    body.push_str("<h2>At or below reorder level</h2>\n");
    let mut rows = String::new();
    for r in &low_stock.rows {
        rows.push_str(&format!(
            "<tr class=\"low\"><td><a href=\"/items/{}\">{}</a></td><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>\n",
            r.item_id,
            escape(&r.code),
            escape(&r.name),
            fmt_qty(r.jct),
            fmt_qty(r.uct),
            fmt_qty(r.reorder_level),
        ));
    }
    body.push_str(&table("low-stock", &["Code", "Item", "JCT", "UCT", "Reorder at"], &rows, false));

    body.push_str("<h2>Recent movements</h2>\n");
    body.push_str(&movement_table("recent", recent, lookup));
    layout.render(&body)
}

/// Movement rows shared by the dashboard and the movement report.
pub(crate) fn movement_table(id: &str, movements: &[Movement], lookup: &Lookup) -> String {
    let mut rows = String::new();
    for m in movements {
        let party = match m.department_id {
            Some(d) if m.kind != MovementKind::Receipt => {
                format!("{} ({})", escape(&lookup.department(d)), escape(&m.party))
            }
            _ => escape(&m.party),
        };
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td><a href=\"/items/{}\">{}</a> {}</td><td>{}</td><td class=\"num\">{}</td><td>{}</td></tr>\n",
            fmt_date(m.date),
            movement_badge(m.kind),
            m.item_id,
            escape(&lookup.item_code(m.item_id)),
            escape(&lookup.item_name(m.item_id)),
            m.terminal.label(),
            fmt_qty(m.delta),
            party,
        ));
    }
    table(
        id,
        &["Date", "Type", "Item", "Terminal", "Qty", "Supplier / department"],
        &rows,
        true,
    )
}

// ── Items ───────────────────────────────────────────────────────────────────

pub fn item_list(
    layout: Layout<'_>,
    summary: &StockSummary,
    query: &ItemListQuery,
    can_edit: bool,
) -> Html<String> {
    let mut body = String::new();
    if can_edit {
        body.push_str("<div class=\"toolbar\"><a href=\"/items/new\">New item</a></div>\n");
    }

    let category = query.category.as_deref().unwrap_or("");
    let status = query.status.as_deref().unwrap_or("active");
    let statuses = [
        ("active".to_string(), "Active".to_string()),
        ("inactive".to_string(), "Inactive".to_string()),
        ("all".to_string(), "All".to_string()),
    ];
    body.push_str(&format!(
        "<form method=\"get\" action=\"/items\" class=\"filters\">\
         <label>Search<input type=\"search\" name=\"q\" value=\"{}\" placeholder=\"Code or name\"></label>{}{}\
         <label class=\"check\"><input type=\"checkbox\" name=\"low\" value=\"1\"{}> Low stock only</label>\
         <button type=\"submit\">Apply</button></form>\n",
        escape(query.q.as_deref().unwrap_or("")),
        filter_select(
            "Category",
            "category",
            &with_any("All categories", category_options()),
            category,
        ),
        filter_select("Status", "status", &statuses, status),
        if query.low.is_some() { " checked" } else { "" },
    ));

    let mut rows = String::new();
    for r in &summary.rows {
        let class = match (r.low, r.active) {
            (_, false) => " class=\"inactive\"",
            (true, true) => " class=\"low\"",
            _ => "",
        };
        let status = if !r.active {
            "<span class=\"badge\">Inactive</span>"
        } else if r.low {
            "<span class=\"badge bad\">Reorder</span>"
        } else {
            "<span class=\"badge ok\">OK</span>"
        };
        rows.push_str(&format!(
            "<tr{class}><td><a href=\"/items/{}\">{}</a></td><td>{}</td><td>{}</td><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td>{status}</td></tr>\n",
            r.item_id,
            escape(&r.code),
            escape(&r.name),
            r.category.label(),
            escape(&r.unit),
            fmt_qty(r.jct),
            fmt_qty(r.uct),
            fmt_qty(r.total),
            fmt_qty(r.reorder_level),
        ));
    }
    body.push_str(&table(
        "items",
        &["Code", "Name", "Category", "Unit", "JCT", "UCT", "Total", "Reorder at", "Status"],
        &rows,
        true,
    ));
    body.push_str(&format!(
        "<p class=\"hint\">{} item(s) · {} at JCT · {} at UCT · {} at or below reorder level</p>\n",
        summary.rows.len(),
        fmt_qty(summary.total_jct),
        fmt_qty(summary.total_uct),
        summary.low_count
    ));
    layout.render(&body)
}

/// New-item form when `existing` is `None`, edit form otherwise.
pub fn item_form(
    layout: Layout<'_>,
    user: &CurrentUser,
    form: &ItemForm,
    existing: Option<&ItemRecord>,
    error: Option<&str>,
) -> Html<String> {
    let action = match existing {
        Some(item) => format!("/items/{}", item.id),
        None => "/items".to_string(),
    };
    let mut body = error_banner(error);
    body.push_str(&format!(
        "<form method=\"post\" action=\"{action}\" class=\"stacked\">\n{}",
        csrf_field(&user.csrf_token)
    ));
    body.push_str(&input(
        "Code",
        "code",
        "text",
        &form.code,
        "required maxlength=\"32\" autofocus",
    ));
    body.push_str(&input("Name", "name", "text", &form.name, "required maxlength=\"120\""));
    body.push_str(&select("Category", "category", &category_options(), &form.category, "required"));
    body.push_str(&input(
        "Unit of issue",
        "unit",
        "text",
        &form.unit,
        "maxlength=\"24\" placeholder=\"ream, cartridge, roll…\"",
    ));
    body.push_str(&input(
        "Reorder level",
        "reorder_level",
        "number",
        &form.reorder_level,
        "min=\"0\"",
    ));
    match existing {
        None => {
            body.push_str("<fieldset><legend>Opening stock (optional)</legend>\n");
            body.push_str(&input("JCT", "opening_jct", "number", &form.opening_jct, "min=\"0\""));
            body.push_str(&input("UCT", "opening_uct", "number", &form.opening_uct, "min=\"0\""));
            body.push_str(&input("As of", "opened_on", "date", &form.opened_on, ""));
            body.push_str("<p class=\"hint\">Opening stock is recorded as a receipt so the stock card balances.</p></fieldset>\n");
            body.push_str("<button type=\"submit\">Create item</button> <a href=\"/items\">Cancel</a>\n");
        }
        Some(item) => {
            body.push_str(&checkbox(
                "Active (inactive items cannot be received or issued)",
                "active",
                form.active.is_some(),
            ));
            body.push_str(&format!(
                "<p class=\"hint\">Stock on hand: {} at JCT, {} at UCT. Stock changes only through receipts, issues and returns.</p>\n",
                fmt_qty(item.stock.jct),
                fmt_qty(item.stock.uct)
            ));
            body.push_str(&format!(
                "<button type=\"submit\">Save</button> <a href=\"/items/{}\">Cancel</a>\n",
                item.id
            ));
        }
    }
    body.push_str("</form>\n");
    layout.render(&body)
}

pub fn item_detail(
    layout: Layout<'_>,
    user: &CurrentUser,
    item: &ItemRecord,
    ledger: &ItemLedger,
    lookup: &Lookup,
    print: bool,
) -> Html<String> {
    let mut body = String::new();
    if !print {
        body.push_str("<div class=\"toolbar\">");
        if user.has_role(Role::Storekeeper) {
            body.push_str(&format!(
                "<a href=\"/items/{id}/edit\">Edit</a> <a href=\"/receipts/new?item_id={id}\">Receive</a> <a href=\"/issues/new?item_id={id}\">Issue</a> ",
                id = item.id
            ));
        }
        if user.has_role(Role::Admin) && ledger.entries.is_empty() {
            body.push_str(&confirm_button(
                &format!("/items/{}/delete", item.id),
                &user.csrf_token,
                "Delete",
                &format!("Delete item {}? This cannot be undone.", item.code),
                "link danger",
            ));
        }
        body.push_str("</div>\n");
        body.push_str(&print_toolbar(&format!("/items/{}?print=1", item.id)));
    }

    body.push_str(&format!(
        "<table class=\"grid\"><tbody>\
         <tr><th>Code</th><td>{}</td><th>Category</th><td>{}</td></tr>\
         <tr><th>Name</th><td>{}</td><th>Unit</th><td>{}</td></tr>\
         <tr><th>On hand</th><td>JCT {} · UCT {} · Total {}</td><th>Reorder level</th><td>{}{}</td></tr>\
         </tbody></table>\n",
        escape(item.code.as_str()),
        item.category.label(),
        escape(&item.name),
        escape(&item.unit),
        fmt_qty(item.stock.jct),
        fmt_qty(item.stock.uct),
        fmt_qty(item.stock.total()),
        fmt_qty(item.reorder_level),
        if item.active { "" } else { " · <span class=\"badge\">Inactive</span>" },
    ));

    body.push_str("<h2>Stock card</h2>\n");
    let mut rows = String::new();
    for e in &ledger.entries {
        let m = &e.movement;
        let (received, issued) = if m.delta >= 0 {
            (fmt_qty(m.delta), String::new())
        } else {
            (String::new(), fmt_qty(-m.delta))
        };
        let detail = match m.kind {
            MovementKind::Issue => format!(
                "<a href=\"/issues/{}\">{}</a> {} ({})",
                m.id,
                voucher_no(m.id),
                escape(&m.department_id.map(|d| lookup.department(d)).unwrap_or_default()),
                escape(&m.party)
            ),
            _ => escape(&m.party),
        };
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{detail}</td><td class=\"num\">{received}</td><td class=\"num\">{issued}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>\n",
            fmt_date(m.date),
            movement_badge(m.kind),
            m.terminal.label(),
            fmt_qty(e.balance.jct),
            fmt_qty(e.balance.uct),
        ));
    }
    body.push_str(&table(
        "stock-card",
        &["Date", "Type", "Terminal", "Reference", "In", "Out", "JCT balance", "UCT balance"],
        &rows,
        !print,
    ));
    if ledger.closing != item.stock {
        body.push_str(&format!(
            "<div class=\"flash error\">Stock card closes at JCT {} / UCT {} but the counters read JCT {} / UCT {}.</div>\n",
            ledger.closing.jct, ledger.closing.uct, item.stock.jct, item.stock.uct
        ));
    }
    layout.render(&body)
}

// ── Receipts ────────────────────────────────────────────────────────────────

pub fn receipt_list(
    layout: Layout<'_>,
    receipts: &[ReceiptRecord],
    items: &[ItemRecord],
    lookup: &Lookup,
    query: &RegisterQuery,
    range: (NaiveDate, NaiveDate),
    print_href: &str,
    can_receive: bool,
) -> Html<String> {
    let print = query.is_print();
    let mut body = String::new();
    if !print {
        if can_receive {
            body.push_str("<div class=\"toolbar\"><a href=\"/receipts/new\">Receive stock</a></div>\n");
        }
        let extra = format!(
            "{}{}",
            filter_select(
                "Item",
                "item_id",
                &item_filter_options(items),
                query.item_id.as_deref().unwrap_or(""),
            ),
            filter_select(
                "Terminal",
                "terminal",
                &terminal_filter_options(),
                query.terminal.as_deref().unwrap_or(""),
            ),
        );
        body.push_str(&range_filters("/receipts", range.0, range.1, &extra));
        body.push_str(&print_toolbar(print_href));
    } else {
        body.push_str(&format!("<p>{} to {}</p>\n", fmt_date(range.0), fmt_date(range.1)));
    }

    let mut rows = String::new();
    let mut total = 0;
    for r in receipts {
        total += r.quantity.get();
        rows.push_str(&format!(
            "<tr><td>{}</td><td><a href=\"/items/{}\">{}</a> {}</td><td>{}</td><td class=\"num\">{} {}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            fmt_date(r.received_on),
            r.item_id,
            escape(&lookup.item_code(r.item_id)),
            escape(&lookup.item_name(r.item_id)),
            r.terminal.label(),
            fmt_qty(r.quantity.get()),
            escape(&lookup.unit(r.item_id)),
            escape(&r.supplier),
            escape(r.reference.as_deref().unwrap_or("")),
            escape(&lookup.user(r.received_by)),
            escape(r.remarks.as_deref().unwrap_or("")),
        ));
    }
    body.push_str(&table(
        "receipts",
        &[
            "Date",
            "Item",
            "Terminal",
            "Quantity",
            "Supplier",
            "Reference",
            "Received by",
            "Remarks",
        ],
        &rows,
        !print,
    ));
    body.push_str(&format!(
        "<p class=\"hint\">{} receipt(s), {} unit(s).</p>\n",
        receipts.len(),
        fmt_qty(total)
    ));
    layout.render(&body)
}

pub fn receipt_form(
    layout: Layout<'_>,
    user: &CurrentUser,
    items: &[ItemRecord],
    form: &ReceiptForm,
    today: NaiveDate,
    error: Option<&str>,
) -> Html<String> {
    let mut body = error_banner(error);
    body.push_str(&format!(
        "<form method=\"post\" action=\"/receipts\" class=\"stacked\">\n{}",
        csrf_field(&user.csrf_token)
    ));
    body.push_str(&item_select(items, &form.item_id));
    body.push_str(&select("Terminal", "terminal", &terminal_options(), &form.terminal, "required"));
    body.push_str(&input("Quantity", "quantity", "number", &form.quantity, "required min=\"1\""));
    body.push_str(&input(
        "Supplier",
        "supplier",
        "text",
        &form.supplier,
        "required maxlength=\"120\"",
    ));
    body.push_str(&input(
        "Delivery note / invoice no.",
        "reference",
        "text",
        &form.reference,
        "maxlength=\"64\"",
    ));
    body.push_str(&input(
        "Date received",
        "received_on",
        "date",
        &form.received_on,
        &format!("max=\"{today}\""),
    ));
    body.push_str(&textarea("Remarks", "remarks", &form.remarks, "maxlength=\"500\""));
    body.push_str("<button type=\"submit\">Record receipt</button> <a href=\"/receipts\">Cancel</a>\n</form>\n");
    layout.render(&body)
}

// ── Issues ──────────────────────────────────────────────────────────────────

pub fn issue_list(
    layout: Layout<'_>,
    issues: &[IssueRecord],
    items: &[ItemRecord],
    departments: &[DepartmentRecord],
    lookup: &Lookup,
    query: &RegisterQuery,
    range: (NaiveDate, NaiveDate),
    print_href: &str,
    can_issue: bool,
) -> Html<String> {
    let print = query.is_print();
    let mut body = String::new();
    if !print {
        if can_issue {
            body.push_str("<div class=\"toolbar\"><a href=\"/issues/new\">Issue stock</a></div>\n");
        }
        let extra = format!(
            "{}{}{}",
            filter_select(
                "Item",
                "item_id",
                &item_filter_options(items),
                query.item_id.as_deref().unwrap_or(""),
            ),
            filter_select(
                "Terminal",
                "terminal",
                &terminal_filter_options(),
                query.terminal.as_deref().unwrap_or(""),
            ),
            filter_select(
                "Department",
                "department_id",
                &department_filter_options(departments),
                query.department_id.as_deref().unwrap_or("")
            ),
        );
        body.push_str(&range_filters("/issues", range.0, range.1, &extra));
        body.push_str(&print_toolbar(print_href));
    } else {
        body.push_str(&format!("<p>{} to {}</p>\n", fmt_date(range.0), fmt_date(range.1)));
    }

    let mut rows = String::new();
    let mut total = 0;
    for i in issues {
        total += i.quantity.get();
        let action = if can_issue && !print && i.outstanding() > 0 {
            format!("<a href=\"/issues/{}/return\">Return</a>", i.id)
        } else {
            String::new()
        };
        rows.push_str(&format!(
            "<tr><td><a href=\"/issues/{}\">{}</a></td><td>{}</td><td>{} {}</td><td>{}</td><td class=\"num\">{} {}</td><td class=\"num\">{}</td><td>{}</td><td>{}</td><td>{action}</td></tr>\n",
            i.id,
            voucher_no(i.id),
            fmt_date(i.issued_on),
            escape(&lookup.item_code(i.item_id)),
            escape(&lookup.item_name(i.item_id)),
            i.terminal.label(),
            fmt_qty(i.quantity.get()),
            escape(&lookup.unit(i.item_id)),
            fmt_qty(i.returned_quantity),
            escape(&lookup.department(i.department_id)),
            escape(&i.requested_by),
        ));
    }
    body.push_str(&table(
        "issues",
        &[
            "Voucher",
            "Date",
            "Item",
            "Terminal",
            "Quantity",
            "Returned",
            "Department",
            "Requested by",
            "",
        ],
        &rows,
        !print,
    ));
    body.push_str(&format!(
        "<p class=\"hint\">{} issue(s), {} unit(s).</p>\n",
        issues.len(),
        fmt_qty(total)
    ));
    layout.render(&body)
}

pub fn issue_form(
    layout: Layout<'_>,
    user: &CurrentUser,
    items: &[ItemRecord],
    departments: &[DepartmentRecord],
    form: &IssueForm,
    today: NaiveDate,
    error: Option<&str>,
) -> Html<String> {
    let mut body = error_banner(error);
    if departments.is_empty() {
        body.push_str("<div class=\"flash error\">No active departments. An administrator must add one before stock can be issued.</div>\n");
    }
    body.push_str(&format!(
        "<form method=\"post\" action=\"/issues\" class=\"stacked\" data-stock-hint>\n{}",
        csrf_field(&user.csrf_token)
    ));
    body.push_str(&item_select(items, &form.item_id));
    body.push_str(&select("Terminal", "terminal", &terminal_options(), &form.terminal, "required"));
    body.push_str(&input("Quantity", "quantity", "number", &form.quantity, "required min=\"1\""));
    body.push_str("<p class=\"stock-hint\" aria-live=\"polite\"></p>\n");
    let mut dept_options = vec![(String::new(), "Choose a department…".to_string())];
    dept_options.extend(departments.iter().map(|d| (d.id.to_string(), d.name.clone())));
    body.push_str(&select(
        "Department",
        "department_id",
        &dept_options,
        &form.department_id,
        "required",
    ));
    body.push_str(&input(
        "Requested by",
        "requested_by",
        "text",
        &form.requested_by,
        "required maxlength=\"120\"",
    ));
    body.push_str(&input(
        "Date issued",
        "issued_on",
        "date",
        &form.issued_on,
        &format!("max=\"{today}\""),
    ));
    body.push_str(&textarea("Remarks", "remarks", &form.remarks, "maxlength=\"500\""));
    body.push_str("<button type=\"submit\">Issue</button> <a href=\"/issues\">Cancel</a>\n</form>\n");
    layout.render(&body)
}

/// Printable issue voucher.
pub fn issue_voucher(
    layout: Layout<'_>,
    issue: &IssueRecord,
    returns: &[ReturnRecord],
    lookup: &Lookup,
    can_return: bool,
    print: bool,
) -> Html<String> {
    let mut body = String::new();
    if !print {
        body.push_str("<div class=\"toolbar\">");
        if can_return && issue.outstanding() > 0 {
            body.push_str(&format!("<a href=\"/issues/{}/return\">Record return</a>", issue.id));
        }
        body.push_str("</div>\n");
        body.push_str(&print_toolbar(&format!("/issues/{}?print=1", issue.id)));
    }
    body.push_str(&format!(
        "<table class=\"grid voucher\"><tbody>\
         <tr><th>Voucher</th><td>{}</td><th>Date</th><td>{}</td></tr>\
         <tr><th>Item</th><td>{} · {}</td><th>Terminal</th><td>{}</td></tr>\
         <tr><th>Quantity</th><td>{} {}</td><th>Returned</th><td>{}</td></tr>\
         <tr><th>Department</th><td>{}</td><th>Requested by</th><td>{}</td></tr>\
         <tr><th>Issued by</th><td>{}</td><th>Recorded</th><td>{}</td></tr>\
         <tr><th>Remarks</th><td colspan=\"3\">{}</td></tr>\
         </tbody></table>\n",
        voucher_no(issue.id),
        fmt_date(issue.issued_on),
        escape(&lookup.item_code(issue.item_id)),
        escape(&lookup.item_name(issue.item_id)),
        issue.terminal.label(),
        fmt_qty(issue.quantity.get()),
        escape(&lookup.unit(issue.item_id)),
        fmt_qty(issue.returned_quantity),
        escape(&lookup.department(issue.department_id)),
        escape(&issue.requested_by),
        escape(&lookup.user(issue.issued_by)),
        fmt_datetime(issue.created_at),
        escape(issue.remarks.as_deref().unwrap_or("")),
    ));

    if !returns.is_empty() {
        body.push_str("<h2>Returns against this voucher</h2>\n");
        let mut rows = String::new();
        for r in returns {
            rows.push_str(&format!(
                "<tr><td>{}</td><td class=\"num\">{}</td><td>{}</td><td>{}</td></tr>\n",
                fmt_date(r.returned_on),
                fmt_qty(r.quantity.get()),
                escape(&r.reason),
                escape(&lookup.user(r.recorded_by)),
            ));
        }
        body.push_str(&table(
            "voucher-returns",
            &["Date", "Quantity", "Reason", "Recorded by"],
            &rows,
            false,
        ));
    }
    if print {
        body.push_str("<p class=\"hint\">Received the above in good condition.</p>\n");
    }
    layout.render(&body)
}

// ── Returns ─────────────────────────────────────────────────────────────────

pub fn return_form(
    layout: Layout<'_>,
    user: &CurrentUser,
    issue: &IssueRecord,
    lookup: &Lookup,
    form: &ReturnForm,
    today: NaiveDate,
    error: Option<&str>,
) -> Html<String> {
    let mut body = error_banner(error);
    body.push_str(&format!(
        "<p>Voucher <a href=\"/issues/{}\">{}</a>: {} {} of {} {} issued from {} to {} on {}. \
         <strong>{} outstanding.</strong></p>\n",
        issue.id,
        voucher_no(issue.id),
        fmt_qty(issue.quantity.get()),
        escape(&lookup.unit(issue.item_id)),
        escape(&lookup.item_code(issue.item_id)),
        escape(&lookup.item_name(issue.item_id)),
        issue.terminal.label(),
        escape(&lookup.department(issue.department_id)),
        fmt_date(issue.issued_on),
        fmt_qty(issue.outstanding()),
    ));
    body.push_str(&format!(
        "<form method=\"post\" action=\"/issues/{}/return\" class=\"stacked\">\n{}",
        issue.id,
        csrf_field(&user.csrf_token)
    ));
    body.push_str(&input(
        "Quantity returned",
        "quantity",
        "number",
        &form.quantity,
        &format!("required min=\"1\" max=\"{}\"", issue.outstanding()),
    ));
    body.push_str(&input("Reason", "reason", "text", &form.reason, "required maxlength=\"200\""));
    body.push_str(&input(
        "Date returned",
        "returned_on",
        "date",
        &form.returned_on,
        &format!("min=\"{}\" max=\"{today}\"", issue.issued_on),
    ));
    body.push_str(&format!(
        "<button type=\"submit\">Record return</button> <a href=\"/issues/{}\">Cancel</a>\n</form>\n",
        issue.id
    ));
    layout.render(&body)
}

pub fn return_list(
    layout: Layout<'_>,
    returns: &[ReturnRecord],
    items: &[ItemRecord],
    lookup: &Lookup,
    query: &RegisterQuery,
    range: (NaiveDate, NaiveDate),
    print_href: &str,
) -> Html<String> {
    let print = query.is_print();
    let mut body = String::new();
    if !print {
        let extra = format!(
            "{}{}",
            filter_select(
                "Item",
                "item_id",
                &item_filter_options(items),
                query.item_id.as_deref().unwrap_or(""),
            ),
            filter_select(
                "Terminal",
                "terminal",
                &terminal_filter_options(),
                query.terminal.as_deref().unwrap_or(""),
            ),
        );
        body.push_str(&range_filters("/returns", range.0, range.1, &extra));
        body.push_str(&print_toolbar(print_href));
        body.push_str("<p class=\"hint\">Returns are recorded from the issue voucher they belong to.</p>\n");
    } else {
        body.push_str(&format!("<p>{} to {}</p>\n", fmt_date(range.0), fmt_date(range.1)));
    }

    let mut rows = String::new();
    let mut total = 0;
    for r in returns {
        total += r.quantity.get();
        rows.push_str(&format!(
            "<tr><td>{}</td><td><a href=\"/issues/{}\">{}</a></td><td>{} {}</td><td>{}</td><td class=\"num\">{}</td><td>{}</td><td>{}</td></tr>\n",
            fmt_date(r.returned_on),
            r.issue_id,
            voucher_no(r.issue_id),
            escape(&lookup.item_code(r.item_id)),
            escape(&lookup.item_name(r.item_id)),
            r.terminal.label(),
            fmt_qty(r.quantity.get()),
            escape(&r.reason),
            escape(&lookup.user(r.recorded_by)),
        ));
    }
    body.push_str(&table(
        "returns",
        &["Date", "Voucher", "Item", "Terminal", "Quantity", "Reason", "Recorded by"],
        &rows,
        !print,
    ));
    body.push_str(&format!(
        "<p class=\"hint\">{} return(s), {} unit(s).</p>\n",
        returns.len(),
        fmt_qty(total)
    ));
    layout.render(&body)
}
