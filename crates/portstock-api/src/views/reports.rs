//! Report pages. Each one renders the same table in screen and print layouts.

use axum::response::Html;
use portstock_core::report::{ConsumptionRow, DateRange, MovementRegister, StockSummary};
use portstock_core::{Category, DepartmentRecord, ItemRecord, MovementKind};

use super::inventory::{
    department_filter_options, filter_select, item_filter_options, movement_table, range_filters,
    terminal_filter_options,
};
use super::{escape, fmt_date, fmt_qty, print_toolbar, table, with_any, Layout, Lookup};
use crate::extractors::checked;
use crate::routes::reports::StockReportQuery;
use crate::routes::RegisterQuery;

fn period(range: &DateRange) -> String {
    format!(
        "<p class=\"period\">Period: {} to {}</p>\n",
        fmt_date(range.from),
        fmt_date(range.to)
    )
}

pub fn index(layout: Layout<'_>) -> Html<String> {
    let reports = [
        (
            "/reports/stock",
            "Stock position",
            "Units on hand at JCT and UCT for every item, with reorder flags.",
        ),
        (
            "/reports/stock?low=on",
            "Reorder list",
            "Items at or below their reorder level.",
        ),
        (
            "/reports/movements",
            "Movement register",
            "Every receipt, issue and return in a date range.",
        ),
        (
            "/reports/consumption",
            "Departmental consumption",
            "Units issued less units returned, per department and item.",
        ),
    ];
    let mut body = String::from("<ul class=\"report-index\">\n");
    for (href, title, blurb) in reports {
        body.push_str(&format!(
            "<li><a href=\"{href}\">{title}</a><br><span class=\"hint\">{blurb}</span></li>\n"
        ));
    }
    body.push_str("</ul>\n");
    layout.render(&body)
}

pub fn stock(
    layout: Layout<'_>,
    summary: &StockSummary,
    query: &StockReportQuery,
    print_href: &str,
) -> Html<String> {
    let print = query.is_print();
    let mut body = String::new();
    if !print {
        let categories = with_any(
            "All categories",
            Category::ALL
                .iter()
                .map(|c| (c.as_str().to_string(), c.label().to_string())),
        );
        let low = if checked(&query.low) { " checked" } else { "" };
        let inactive = if checked(&query.inactive) { " checked" } else { "" };
        body.push_str(&format!(
            "<form method=\"get\" action=\"/reports/stock\" class=\"filters\">{}\
             <label class=\"check\"><input type=\"checkbox\" name=\"low\" value=\"on\"{low}> Low stock only</label>\
             <label class=\"check\"><input type=\"checkbox\" name=\"inactive\" value=\"on\"{inactive}> Include inactive</label>\
             <button type=\"submit\">Apply</button></form>\n",
            filter_select(
                "Category",
                "category",
                &categories,
                query.category.as_deref().unwrap_or(""),
            ),
        ));
        body.push_str(&print_toolbar(print_href));
    }

    let mut rows = String::new();
    for r in &summary.rows {
        let status = match (r.active, r.low) {
            (false, _) => "<span class=\"badge\">Inactive</span>",
            (true, true) => "<span class=\"badge bad\">Reorder</span>",
            (true, false) => "<span class=\"badge ok\">OK</span>",
        };
        let class = if r.low && r.active { " class=\"low\"" } else { "" };
        rows.push_str(&format!(
            "<tr{class}><td><a href=\"/items/{}\">{}</a></td><td>{}</td><td>{}</td><td>{}</td>\
             <td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td>{status}</td></tr>\n",
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
    if !summary.rows.is_empty() {
        rows.push_str(&format!(
            "<tr class=\"total\"><th colspan=\"4\">Total</th><th class=\"num\">{}</th><th class=\"num\">{}</th><th class=\"num\">{}</th><th colspan=\"2\"></th></tr>\n",
            fmt_qty(summary.total_jct),
            fmt_qty(summary.total_uct),
            fmt_qty(summary.total_jct + summary.total_uct),
        ));
    }
    body.push_str(&table(
        "stock",
        &["Code", "Item", "Category", "Unit", "JCT", "UCT", "Total", "Reorder at", "Status"],
        &rows,
        !print,
    ));
    body.push_str(&format!(
        "<p class=\"hint\">{} item(s), {} at or below reorder level.</p>\n",
        summary.rows.len(),
        summary.low_count
    ));
    layout.render(&body)
}

pub fn movements(
    layout: Layout<'_>,
    register: &MovementRegister,
    items: &[ItemRecord],
    lookup: &Lookup,
    query: &RegisterQuery,
    range: &DateRange,
    print_href: &str,
) -> Html<String> {
    let print = query.is_print();
    let mut body = String::new();
    if !print {
        let kinds = with_any(
            "All movements",
            [MovementKind::Receipt, MovementKind::Issue, MovementKind::Return]
                .iter()
                .map(|k| (k.as_str().to_string(), k.label().to_string())),
        );
        let extra = format!(
            "{}{}{}",
            filter_select("Type", "kind", &kinds, query.kind.as_deref().unwrap_or("")),
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
        body.push_str(&range_filters("/reports/movements", range.from, range.to, &extra));
        body.push_str(&print_toolbar(print_href));
    } else {
        body.push_str(&period(range));
    }

    body.push_str(&movement_table("movements", &register.movements, lookup));
    body.push_str(&format!(
        "<table class=\"grid totals\"><tbody>\
         <tr><th>Received</th><td class=\"num\">{}</td></tr>\
         <tr><th>Issued</th><td class=\"num\">{}</td></tr>\
         <tr><th>Returned</th><td class=\"num\">{}</td></tr>\
         <tr><th>Net change</th><td class=\"num\">{}</td></tr>\
         </tbody></table>\n",
        fmt_qty(register.received),
        fmt_qty(register.issued),
        fmt_qty(register.returned),
        fmt_qty(register.net()),
    ));
    layout.render(&body)
}

pub fn consumption(
    layout: Layout<'_>,
    rows: &[ConsumptionRow],
    departments: &[DepartmentRecord],
    query: &RegisterQuery,
    range: &DateRange,
    print_href: &str,
) -> Html<String> {
    let print = query.is_print();
    let mut body = String::new();
    if !print {
        let extra = filter_select(
            "Department",
            "department_id",
            &department_filter_options(departments),
            query.department_id.as_deref().unwrap_or(""),
        );
        body.push_str(&range_filters("/reports/consumption", range.from, range.to, &extra));
        body.push_str(&print_toolbar(print_href));
    } else {
        body.push_str(&period(range));
    }

    let mut html_rows = String::new();
    let mut i = 0;
    while i < rows.len() {
        let dept = rows[i].department_id;
        let (mut issued, mut returned, mut net) = (0, 0, 0);
        while i < rows.len() && rows[i].department_id == dept {
            let r = &rows[i];
            issued += r.issued;
            returned += r.returned;
            net += r.net;
            html_rows.push_str(&format!(
                "<tr><td>{}</td><td>{} {}</td><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>\n",
                escape(&r.department_name),
                escape(&r.item_code),
                escape(&r.item_name),
                escape(&r.unit),
                fmt_qty(r.issued),
                fmt_qty(r.returned),
                fmt_qty(r.net),
            ));
            i += 1;
        }
        html_rows.push_str(&format!(
            "<tr class=\"total\"><th colspan=\"3\">Subtotal</th><th class=\"num\">{}</th><th class=\"num\">{}</th><th class=\"num\">{}</th></tr>\n",
            fmt_qty(issued),
            fmt_qty(returned),
            fmt_qty(net),
        ));
    }
    body.push_str(&table(
        "consumption",
        &["Department", "Item", "Unit", "Issued", "Returned", "Net"],
        &html_rows,
        !print,
    ));
    body.push_str("<p class=\"hint\">Department totals add units of different items and are only a rough guide.</p>\n");
    layout.render(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use portstock_core::{DepartmentId, ItemId};

    fn row(
        dept: DepartmentId,
        name: &str,
        code: &str,
        issued: i64,
        returned: i64,
    ) -> ConsumptionRow {
        ConsumptionRow {
            department_id: dept,
            department_name: name.into(),
            item_id: ItemId::new(),
            item_code: code.into(),
            item_name: "Item".into(),
            unit: "box".into(),
            issued,
            returned,
            net: issued - returned,
        }
    }

    #[test]
    fn consumption_has_one_subtotal_per_department() {
        let ops = DepartmentId::new();
        let fin = DepartmentId::new();
        let rows = vec![
            row(fin, "Finance", "PAP-A4", 10, 2),
            row(fin, "Finance", "TON-05A", 3, 0),
            row(ops, "Operations", "PAP-A4", 5, 5),
        ];
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
        )
        .unwrap();
        let Html(html) = consumption(
            Layout::new("Departmental consumption"),
            &rows,
            &[],
            &RegisterQuery::default(),
            &range,
            "/reports/consumption?print=1",
        );
        assert_eq!(html.matches("Subtotal").count(), 2);
        assert!(html
            .contains("<th class=\"num\">13</th><th class=\"num\">2</th><th class=\"num\">11</th>"));
    }

    #[test]
    fn print_layout_shows_period_instead_of_filters() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
        )
        .unwrap();
        let query = RegisterQuery {
            print: Some("1".into()),
            ..Default::default()
        };
        let Html(html) = movements(
            Layout::new("Movement register").print(true),
            &MovementRegister::default(),
            &[],
            &Lookup::default(),
            &query,
            &range,
            "",
        );
        assert!(html.contains("Period: 01 Mar 2026 to 31 Mar 2026"));
        assert!(!html.contains("class=\"filters\""));
    }
}
