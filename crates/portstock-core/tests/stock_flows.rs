//! # Stock Flow Reconciliation
//!
//! Replays receive/issue/return sequences against [`StockLevels`] and checks
//! that the stock card, the movement register and the live counters agree.

use chrono::{NaiveDate, Utc};
use portstock_core::report::{item_ledger, movement_register, MovementFilter};
use portstock_core::{
    DateRange, DepartmentId, IssueRecord, ItemId, MovementId, Quantity, ReceiptRecord,
    ReturnRecord, StockError, StockLevels, Terminal, UserId,
};

struct Ledger {
    item: ItemId,
    stock: StockLevels,
    receipts: Vec<ReceiptRecord>,
    issues: Vec<IssueRecord>,
    returns: Vec<ReturnRecord>,
}

impl Ledger {
    fn new() -> Self {
        Self {
            item: ItemId::new(),
            stock: StockLevels::default(),
            receipts: Vec::new(),
            issues: Vec::new(),
            returns: Vec::new(),
        }
    }

    fn receive(&mut self, terminal: Terminal, qty: i64, on: NaiveDate) {
        let quantity = Quantity::new(qty).unwrap();
        self.stock.deposit(terminal, quantity).unwrap();
        self.receipts.push(ReceiptRecord {
            id: MovementId::new(),
            item_id: self.item,
            terminal,
            quantity,
            supplier: "Supplier".into(),
            reference: Some("DN-1".into()),
            received_on: on,
            received_by: UserId::new(),
            remarks: None,
            created_at: Utc::now(),
        });
    }

    fn issue(
        &mut self,
        terminal: Terminal,
        qty: i64,
        on: NaiveDate,
    ) -> Result<MovementId, StockError> {
        let quantity = Quantity::new(qty).unwrap();
        self.stock.withdraw(terminal, quantity)?;
        let id = MovementId::new();
        self.issues.push(IssueRecord {
            id,
            item_id: self.item,
            terminal,
            quantity,
            department_id: DepartmentId::new(),
            requested_by: "Clerk".into(),
            issued_on: on,
            issued_by: UserId::new(),
            returned_quantity: 0,
            remarks: None,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    fn give_back(
        &mut self,
        issue_id: MovementId,
        qty: i64,
        on: NaiveDate,
    ) -> Result<(), StockError> {
        let quantity = Quantity::new(qty).unwrap();
        let issue = self
            .issues
            .iter_mut()
            .find(|i| i.id == issue_id)
            .expect("issue exists");
        issue.register_return(quantity)?;
        let terminal = issue.terminal;
        self.stock.deposit(terminal, quantity)?;
        self.returns.push(ReturnRecord {
            id: MovementId::new(),
            issue_id,
            item_id: self.item,
            terminal,
            quantity,
            reason: "Surplus".into(),
            returned_on: on,
            recorded_by: UserId::new(),
            created_at: Utc::now(),
        });
        Ok(())
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 4, d).unwrap()
}

#[test]
fn stock_card_closes_at_live_counters() {
    let mut l = Ledger::new();
    l.receive(Terminal::Jct, 100, day(1));
    l.receive(Terminal::Uct, 40, day(1));
    let a = l.issue(Terminal::Jct, 30, day(2)).unwrap();
    let _b = l.issue(Terminal::Uct, 40, day(3)).unwrap();
    l.give_back(a, 10, day(4)).unwrap();

    let card = item_ledger(l.item, &l.receipts, &l.issues, &l.returns);
    assert_eq!(card.closing, l.stock);
    assert_eq!(l.stock, StockLevels { jct: 80, uct: 0 });
}

#[test]
fn failed_operations_leave_no_trace() {
    let mut l = Ledger::new();
    l.receive(Terminal::Uct, 5, day(1));
    assert!(matches!(
        l.issue(Terminal::Jct, 1, day(2)),
        Err(StockError::InsufficientStock { .. })
    ));
    let id = l.issue(Terminal::Uct, 5, day(2)).unwrap();
    assert!(matches!(
        l.give_back(id, 6, day(3)),
        Err(StockError::ReturnExceedsIssued { .. })
    ));

    assert_eq!(l.issues.len(), 1);
    assert!(l.returns.is_empty());
    assert_eq!(l.stock, StockLevels { jct: 0, uct: 0 });
}

#[test]
fn register_net_equals_counter_change() {
    let mut l = Ledger::new();
    l.receive(Terminal::Jct, 20, day(1));
    let before = l.stock.total();
    l.receive(Terminal::Jct, 12, day(5));
    let i = l.issue(Terminal::Jct, 9, day(6)).unwrap();
    l.give_back(i, 4, day(7)).unwrap();

    let range = DateRange::new(day(5), day(30)).unwrap();
    let reg = movement_register(
        &l.receipts,
        &l.issues,
        &l.returns,
        &range,
        &MovementFilter::default(),
    );
    assert_eq!(before + reg.net(), l.stock.total());
}
