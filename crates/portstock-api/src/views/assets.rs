//! Embedded stylesheet and script served under `/assets`.

use axum::http::header;
use axum::response::IntoResponse;

pub const APP_CSS: &str = r#"
:root { --ink: #1d2733; --muted: #5d6b7a; --line: #d5dbe1; --accent: #0b5394; --ok: #1e7b34; --bad: #b3261e; --low: #fff4e5; }
* { box-sizing: border-box; }
body { margin: 0; font: 14px/1.45 system-ui, -apple-system, "Segoe UI", sans-serif; color: var(--ink); background: #f6f8fa; }
main { max-width: 1180px; margin: 0 auto; padding: 16px 20px 40px; }
h1 { font-size: 22px; margin: 8px 0 16px; }
h2 { font-size: 17px; margin: 24px 0 8px; }
a { color: var(--accent); }
.topnav { display: flex; align-items: center; gap: 16px; background: var(--accent); color: #fff; padding: 8px 20px; }
.topnav a { color: #fff; text-decoration: none; }
.topnav ul { display: flex; gap: 14px; list-style: none; margin: 0; padding: 0; flex: 1; }
.topnav .brand { font-weight: 600; }
.topnav .who { display: flex; align-items: center; gap: 8px; }
.topnav .role { font-size: 12px; opacity: .8; }
.topnav button.link { color: #fff; }
button.link { background: none; border: 0; padding: 0; color: var(--accent); cursor: pointer; text-decoration: underline; }
form.inline { display: inline; }
.flash { padding: 10px 12px; border-radius: 4px; margin: 8px 0 16px; }
.flash.success { background: #e6f4ea; color: var(--ok); }
.flash.error { background: #fce8e6; color: var(--bad); }
.cards { display: grid; grid-template-columns: repeat(auto-fit, minmax(180px, 1fr)); gap: 12px; }
.card { background: #fff; border: 1px solid var(--line); border-radius: 6px; padding: 12px 14px; }
.card .value { font-size: 24px; font-weight: 600; }
.card .label { color: var(--muted); }
table.grid { width: 100%; border-collapse: collapse; background: #fff; }
table.grid th, table.grid td { border: 1px solid var(--line); padding: 6px 8px; text-align: left; vertical-align: top; }
table.grid th { background: #eef2f6; }
table.grid td.num, table.grid th.num { text-align: right; font-variant-numeric: tabular-nums; }
table.grid tr.low td { background: var(--low); }
table.grid tr.inactive td { color: var(--muted); }
table.grid tfoot td { font-weight: 600; }
.table-filter { margin: 0 0 8px; padding: 6px 8px; width: 280px; }
form.stacked { background: #fff; border: 1px solid var(--line); border-radius: 6px; padding: 16px; max-width: 560px; }
form.stacked label { display: block; margin-bottom: 10px; font-weight: 500; }
form.stacked input, form.stacked select, form.stacked textarea { display: block; width: 100%; padding: 6px 8px; margin-top: 3px; font: inherit; }
form.stacked label.check input { display: inline; width: auto; }
form.filters { display: flex; flex-wrap: wrap; gap: 10px; align-items: end; margin-bottom: 12px; }
form.filters label { display: flex; flex-direction: column; font-size: 12px; color: var(--muted); }
.hint { color: var(--muted); font-size: 12px; }
.stock-hint { color: var(--muted); }
.stock-hint.short { color: var(--bad); font-weight: 600; }
.toolbar { margin: 8px 0 12px; display: flex; gap: 12px; align-items: center; }
.danger { color: var(--bad); }
.badge { display: inline-block; padding: 0 6px; border-radius: 8px; font-size: 12px; background: #eef2f6; }
.badge.bad { background: #fce8e6; color: var(--bad); }
.badge.ok { background: #e6f4ea; color: var(--ok); }
dialog { border: 1px solid var(--line); border-radius: 6px; padding: 16px; max-width: 520px; }
dialog::backdrop { background: rgba(0,0,0,.35); }
.login { max-width: 360px; margin: 60px auto; }
.letterhead { display: flex; justify-content: space-between; border-bottom: 2px solid var(--ink); padding: 8px 0; margin: 0 20px; }
.signatures { display: flex; justify-content: space-between; margin: 60px 20px 20px; }
.signatures span { border-top: 1px solid var(--ink); padding-top: 4px; width: 28%; text-align: center; }
body.print { background: #fff; }
@media print {
  .topnav, .toolbar, .table-filter, form.filters, button, .no-print { display: none !important; }
  body { background: #fff; }
  main { max-width: none; padding: 0 20px; }
  table.grid tr.low td { background: none; }
}
"#;

pub const APP_JS: &str = r#"
(function () {
  "use strict";

  function csrfToken() {
    var meta = document.querySelector('meta[name="csrf-token"]');
    return meta ? meta.getAttribute("content") : "";
  }

  // Client-side row filter: <input data-filter="table-id">
  document.querySelectorAll("input[data-filter]").forEach(function (input) {
    var table = document.getElementById(input.getAttribute("data-filter"));
    if (!table) return;
    input.addEventListener("input", function () {
      var needle = input.value.trim().toLowerCase();
      table.querySelectorAll("tbody tr").forEach(function (row) {
        if (row.classList.contains("empty")) return;
        row.hidden = needle !== "" && row.textContent.toLowerCase().indexOf(needle) === -1;
      });
    });
  });

  // Modals: <button data-modal-open="dialog-id">, <button data-modal-close>
  document.querySelectorAll("[data-modal-open]").forEach(function (btn) {
    btn.addEventListener("click", function () {
      var dialog = document.getElementById(btn.getAttribute("data-modal-open"));
      if (dialog && dialog.showModal) dialog.showModal();
    });
  });
  document.querySelectorAll("[data-modal-close]").forEach(function (btn) {
    btn.addEventListener("click", function () {
      var dialog = btn.closest("dialog");
      if (dialog) dialog.close();
    });
  });

  // Print buttons and the print layout.
  document.querySelectorAll("[data-print]").forEach(function (btn) {
    btn.addEventListener("click", function () { window.print(); });
  });
  if (document.body.hasAttribute("data-autoprint")) {
    window.addEventListener("load", function () { window.print(); });
  }

  // Confirmation prompts: <form data-confirm="Delete this item?">
  document.querySelectorAll("form[data-confirm]").forEach(function (form) {
    form.addEventListener("submit", function (ev) {
      if (!window.confirm(form.getAttribute("data-confirm"))) ev.preventDefault();
    });
  });

  // Every POST form carries the session's CSRF token.
  document.querySelectorAll('form[method="post"]').forEach(function (form) {
    if (form.querySelector('input[name="csrf_token"]')) return;
    var token = csrfToken();
    if (!token) return;
    var input = document.createElement("input");
    input.type = "hidden";
    input.name = "csrf_token";
    input.value = token;
    form.appendChild(input);
  });

  // Issue form: show stock on hand for the chosen item and terminal.
  var issueForm = document.querySelector("form[data-stock-hint]");
  if (issueForm) {
    var item = issueForm.querySelector('select[name="item_id"]');
    var terminal = issueForm.querySelector('select[name="terminal"]');
    var qty = issueForm.querySelector('input[name="quantity"]');
    var hint = issueForm.querySelector(".stock-hint");
    var update = function () {
      if (!item || !terminal || !hint) return;
      var opt = item.options[item.selectedIndex];
      if (!opt || !opt.value) { hint.textContent = ""; return; }
      var onHand = parseInt(opt.getAttribute("data-" + terminal.value) || "0", 10);
      var wanted = qty ? parseInt(qty.value || "0", 10) : 0;
      hint.textContent = "On hand at " + terminal.value.toUpperCase() + ": " + onHand + " " + (opt.getAttribute("data-unit") || "");
      hint.classList.toggle("short", wanted > onHand);
      if (qty) qty.max = String(onHand);
    };
    [item, terminal, qty].forEach(function (el) {
      if (el) el.addEventListener("input", update);
      if (el) el.addEventListener("change", update);
    });
    update();
  }
})();
"#;

/// GET /assets/app.css
pub async fn stylesheet() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/css; charset=utf-8"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        APP_CSS,
    )
}

/// GET /assets/app.js
pub async fn script() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        APP_JS,
    )
}
