//! # Reports
//!
//! Pure report computations over record slices. The web layer collects
//! records from its stores and renders whatever these functions return,
//! so the arithmetic here is the single definition of every total shown
//! on screen or on paper.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::catalog::{Category, DepartmentRecord, ItemRecord, Terminal};
use crate::error::ValidationError;
use crate::identity::{DepartmentId, ItemId, MovementId};
use crate::movement::{IssueRecord, Movement, MovementKind, ReceiptRecord, ReturnRecord};
use crate::sanitize::parse_date;
use crate::stock::StockLevels;

// ---------------------------------------------------------------------------
// Date range
// ---------------------------------------------------------------------------

/// Inclusive range of business dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    /// First day included.
    pub from: NaiveDate,
    /// Last day included.
    pub to: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting `from > to`.
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, ValidationError> {
        if from > to {
            return Err(ValidationError::InvalidDateRange {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(Self { from, to })
    }

    /// The first of `today`'s month through `today`.
    pub fn month_to_date(today: NaiveDate) -> Self {
        let from = today.with_day(1).unwrap_or(today);
        Self { from, to: today }
    }

    /// Parse optional `from`/`to` query values. Missing or blank values
    /// default to the month-to-date range ending `today`.
    pub fn parse(
        from: Option<&str>,
        to: Option<&str>,
        today: NaiveDate,
    ) -> Result<Self, ValidationError> {
        let default = Self::month_to_date(today);
        let from = match from.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => parse_date("from", s)?,
            None => default.from,
        };
        let to = match to.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => parse_date("to", s)?,
            None => default.to,
        };
        Self::new(from, to)
    }

    /// Whether `date` falls inside the range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

// ---------------------------------------------------------------------------
// Stock summary
// ---------------------------------------------------------------------------

/// Filter for [`stock_summary`].
#[derive(Debug, Clone, Default)]
pub struct StockFilter {
    /// Only items of this category.
    pub category: Option<Category>,
    /// Only items at or below their reorder level.
    pub low_only: bool,
    /// Include deactivated items.
    pub include_inactive: bool,
    /// Case-insensitive substring match on code or name.
    pub search: Option<String>,
}

/// One line of the stock summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockRow {
    /// Item identifier.
    pub item_id: ItemId,
    /// Item code.
    pub code: String,
    /// Item name.
    pub name: String,
    /// Category.
    pub category: Category,
    /// Unit of issue.
    pub unit: String,
    /// Units at JCT.
    pub jct: i64,
    /// Units at UCT.
    pub uct: i64,
    /// Units across both terminals.
    pub total: i64,
    /// Reorder level.
    pub reorder_level: i64,
    /// At or below reorder level.
    pub low: bool,
    /// Item is active.
    pub active: bool,
}

/// Stock on hand, per item and in total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StockSummary {
    /// Rows sorted by category, then code.
    pub rows: Vec<StockRow>,
    /// Sum of JCT counters over the rows.
    pub total_jct: i64,
    /// Sum of UCT counters over the rows.
    pub total_uct: i64,
    /// Rows flagged low.
    pub low_count: usize,
}

/// Build the stock-on-hand summary.
pub fn stock_summary(items: &[ItemRecord], filter: &StockFilter) -> StockSummary {
    let needle = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut rows: Vec<StockRow> = items
        .iter()
        .filter(|i| filter.include_inactive || i.active)
        .filter(|i| filter.category.map_or(true, |c| i.category == c))
        .filter(|i| !filter.low_only || i.is_low_stock())
        .filter(|i| {
            needle.as_deref().map_or(true, |n| {
                i.code.as_str().to_lowercase().contains(n) || i.name.to_lowercase().contains(n)
            })
        })
        .map(|i| StockRow {
            item_id: i.id,
            code: i.code.to_string(),
            name: i.name.clone(),
            category: i.category,
            unit: i.unit.clone(),
            jct: i.stock.jct,
            uct: i.stock.uct,
            total: i.stock.total(),
            reorder_level: i.reorder_level,
            low: i.is_low_stock(),
            active: i.active,
        })
        .collect();
    rows.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.code.cmp(&b.code)));

    let mut summary = StockSummary::default();
    for row in &rows {
        summary.total_jct += row.jct;
        summary.total_uct += row.uct;
        if row.low {
            summary.low_count += 1;
        }
    }
    summary.rows = rows;
    summary
}

// ---------------------------------------------------------------------------
// Movement register
// ---------------------------------------------------------------------------

/// Filter for [`movement_register`].
#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    /// Only this kind.
    pub kind: Option<MovementKind>,
    /// Only this terminal.
    pub terminal: Option<Terminal>,
    /// Only this item.
    pub item_id: Option<ItemId>,
    /// Only issues and returns for this department.
    pub department_id: Option<DepartmentId>,
}

impl MovementFilter {
    fn matches(&self, m: &Movement) -> bool {
        self.kind.map_or(true, |k| m.kind == k)
            && self.terminal.map_or(true, |t| m.terminal == t)
            && self.item_id.map_or(true, |id| m.item_id == id)
            && self.department_id.map_or(true, |d| m.department_id == Some(d))
    }
}

/// Movements inside a date range, with totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MovementRegister {
    /// Movements ordered by business date, then record time.
    pub movements: Vec<Movement>,
    /// Units received.
    pub received: i64,
    /// Units issued.
    pub issued: i64,
    /// Units returned.
    pub returned: i64,
}

impl MovementRegister {
    /// Net change over the register: received plus returned minus issued.
    pub fn net(&self) -> i64 {
        self.received + self.returned - self.issued
    }
}

/// Collect every movement as a unified [`Movement`], unordered.
pub fn all_movements(
    receipts: &[ReceiptRecord],
    issues: &[IssueRecord],
    returns: &[ReturnRecord],
) -> Vec<Movement> {
    let issue_departments: HashMap<MovementId, DepartmentId> =
        issues.iter().map(|i| (i.id, i.department_id)).collect();

    receipts
        .iter()
        .map(Movement::from)
        .chain(issues.iter().map(Movement::from))
        .chain(
            returns
                .iter()
                .map(|r| Movement::from_return(r, issue_departments.get(&r.issue_id).copied())),
        )
        .collect()
}

/// Build the movement register for `range`.
pub fn movement_register(
    receipts: &[ReceiptRecord],
    issues: &[IssueRecord],
    returns: &[ReturnRecord],
    range: &DateRange,
    filter: &MovementFilter,
) -> MovementRegister {
    let mut movements: Vec<Movement> = all_movements(receipts, issues, returns)
        .into_iter()
        .filter(|m| range.contains(m.date) && filter.matches(m))
        .collect();
    movements.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.created_at.cmp(&b.created_at)));

    let mut register = MovementRegister::default();
    for m in &movements {
        match m.kind {
            MovementKind::Receipt => register.received += m.quantity(),
            MovementKind::Issue => register.issued += m.quantity(),
            MovementKind::Return => register.returned += m.quantity(),
        }
    }
    register.movements = movements;
    register
}

// ---------------------------------------------------------------------------
// Departmental consumption
// ---------------------------------------------------------------------------

/// Net consumption of one item by one department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumptionRow {
    /// Department.
    pub department_id: DepartmentId,
    /// Department name (or the identifier if the department is unknown).
    pub department_name: String,
    /// Item.
    pub item_id: ItemId,
    /// Item code.
    pub item_code: String,
    /// Item name.
    pub item_name: String,
    /// Unit of issue.
    pub unit: String,
    /// Units issued in range.
    pub issued: i64,
    /// Units returned in range.
    pub returned: i64,
    /// `issued - returned`.
    pub net: i64,
}

/// Issued-minus-returned per department and item over `range`.
///
/// Issues count on their issue date and returns on their return date, so
/// a return in range against an issue outside it reduces the net. Rows
/// are sorted by department name, then item code.
pub fn department_consumption(
    items: &[ItemRecord],
    departments: &[DepartmentRecord],
    issues: &[IssueRecord],
    returns: &[ReturnRecord],
    range: &DateRange,
) -> Vec<ConsumptionRow> {
    let issue_index: HashMap<MovementId, &IssueRecord> = issues.iter().map(|i| (i.id, i)).collect();
    let mut totals: BTreeMap<(DepartmentId, ItemId), (i64, i64)> = BTreeMap::new();

    for issue in issues.iter().filter(|i| range.contains(i.issued_on)) {
        totals
            .entry((issue.department_id, issue.item_id))
            .or_default()
            .0 += issue.quantity.get();
    }
    for ret in returns.iter().filter(|r| range.contains(r.returned_on)) {
        if let Some(issue) = issue_index.get(&ret.issue_id) {
            totals
                .entry((issue.department_id, ret.item_id))
                .or_default()
                .1 += ret.quantity.get();
        }
    }

    let item_index: HashMap<ItemId, &ItemRecord> = items.iter().map(|i| (i.id, i)).collect();
    let dept_index: HashMap<DepartmentId, &DepartmentRecord> =
        departments.iter().map(|d| (d.id, d)).collect();

    let mut rows: Vec<ConsumptionRow> = totals
        .into_iter()
        .map(|((department_id, item_id), (issued, returned))| {
            let item = item_index.get(&item_id);
            ConsumptionRow {
                department_id,
                department_name: dept_index
                    .get(&department_id)
                    .map(|d| d.name.clone())
                    .unwrap_or_else(|| department_id.to_string()),
                item_id,
                item_code: item.map(|i| i.code.to_string()).unwrap_or_default(),
                item_name: item
                    .map(|i| i.name.clone())
                    .unwrap_or_else(|| item_id.to_string()),
                unit: item.map(|i| i.unit.clone()).unwrap_or_default(),
                issued,
                returned,
                net: issued - returned,
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        a.department_name
            .cmp(&b.department_name)
            .then_with(|| a.item_code.cmp(&b.item_code))
    });
    rows
}

// ---------------------------------------------------------------------------
// Item ledger (stock card)
// ---------------------------------------------------------------------------

/// One line of a stock card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    /// The movement.
    pub movement: Movement,
    /// Balance at both terminals after the movement.
    pub balance: StockLevels,
}

/// Chronological stock card for one item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ItemLedger {
    /// Entries in business-date order.
    pub entries: Vec<LedgerEntry>,
    /// Balance after the last entry.
    pub closing: StockLevels,
}

impl ItemLedger {
    /// Units that a withdrawal dated `date` may take from `terminal` without
    /// any balance on the card going negative.
    ///
    /// The withdrawal sorts after every movement already on `date`, so it
    /// lowers the balance at the end of that day and every later balance.
    pub fn available_on(&self, terminal: Terminal, date: NaiveDate) -> i64 {
        let mut at_date = 0;
        let mut later_floor: Option<i64> = None;
        for entry in &self.entries {
            let balance = entry.balance.get(terminal);
            if entry.movement.date <= date {
                at_date = balance;
            } else {
                later_floor = Some(later_floor.map_or(balance, |f| f.min(balance)));
            }
        }
        later_floor.map_or(at_date, |f| f.min(at_date))
    }
}

/// Build the stock card of `item_id` from zero, replaying every movement.
///
/// Because all stock enters through receipts (opening balances included),
/// the closing balance equals the item's current [`StockLevels`].
pub fn item_ledger(
    item_id: ItemId,
    receipts: &[ReceiptRecord],
    issues: &[IssueRecord],
    returns: &[ReturnRecord],
) -> ItemLedger {
    let mut movements: Vec<Movement> = all_movements(receipts, issues, returns)
        .into_iter()
        .filter(|m| m.item_id == item_id)
        .collect();
    movements.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.created_at.cmp(&b.created_at)));

    let mut balance = StockLevels::default();
    let entries = movements
        .into_iter()
        .map(|movement| {
            match movement.terminal {
                Terminal::Jct => balance.jct += movement.delta,
                Terminal::Uct => balance.uct += movement.delta,
            }
            LedgerEntry { movement, balance }
        })
        .collect();

    ItemLedger {
        entries,
        closing: balance,
    }
}
