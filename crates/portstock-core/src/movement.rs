//! # Stock Movements
//!
//! Three kinds of movement change stock: receipts (supplier deliveries),
//! issues (to a department) and returns (against an earlier issue). Each is
//! stored in its own table; [`Movement`] is the unified, signed view the
//! reports work with.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Terminal;
use crate::error::StockError;
use crate::identity::{DepartmentId, ItemId, MovementId, UserId};
use crate::stock::Quantity;

/// Goods received into a terminal store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    /// Identifier.
    pub id: MovementId,
    /// Item received.
    pub item_id: ItemId,
    /// Receiving terminal.
    pub terminal: Terminal,
    /// Units received.
    pub quantity: Quantity,
    /// Supplier name.
    pub supplier: String,
    /// Delivery note, invoice or purchase order number.
    pub reference: Option<String>,
    /// Business date of receipt.
    pub received_on: NaiveDate,
    /// User who recorded the receipt.
    pub received_by: UserId,
    /// Free-text remarks.
    pub remarks: Option<String>,
    /// Time the record was written.
    pub created_at: DateTime<Utc>,
}

/// Goods issued from a terminal store to a department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    /// Identifier; also the issue voucher number.
    pub id: MovementId,
    /// Item issued.
    pub item_id: ItemId,
    /// Issuing terminal.
    pub terminal: Terminal,
    /// Units issued.
    pub quantity: Quantity,
    /// Receiving department.
    pub department_id: DepartmentId,
    /// Person who requested or collected the goods.
    pub requested_by: String,
    /// Business date of issue.
    pub issued_on: NaiveDate,
    /// User who recorded the issue.
    pub issued_by: UserId,
    /// Units returned so far against this issue.
    pub returned_quantity: i64,
    /// Free-text remarks.
    pub remarks: Option<String>,
    /// Time the record was written.
    pub created_at: DateTime<Utc>,
}

impl IssueRecord {
    /// Units issued and not yet returned.
    pub fn outstanding(&self) -> i64 {
        self.quantity.get() - self.returned_quantity
    }

    /// Count `qty` units as returned.
    ///
    /// Fails without modifying anything if `qty` exceeds
    /// [`IssueRecord::outstanding`].
    pub fn register_return(&mut self, qty: Quantity) -> Result<i64, StockError> {
        let outstanding = self.outstanding();
        if qty.get() > outstanding {
            return Err(StockError::ReturnExceedsIssued {
                outstanding,
                requested: qty.get(),
            });
        }
        self.returned_quantity += qty.get();
        Ok(self.outstanding())
    }

    /// Roll back a previously registered return (used when persisting it fails).
    pub fn unregister_return(&mut self, qty: Quantity) {
        self.returned_quantity = (self.returned_quantity - qty.get()).max(0);
    }
}

/// Goods returned to the store against an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRecord {
    /// Identifier.
    pub id: MovementId,
    /// The issue being returned against.
    pub issue_id: MovementId,
    /// Item returned (copied from the issue).
    pub item_id: ItemId,
    /// Terminal the goods go back to (the issuing terminal).
    pub terminal: Terminal,
    /// Units returned.
    pub quantity: Quantity,
    /// Why the goods came back.
    pub reason: String,
    /// Business date of return.
    pub returned_on: NaiveDate,
    /// User who recorded the return.
    pub recorded_by: UserId,
    /// Time the record was written.
    pub created_at: DateTime<Utc>,
}

/// Kind of stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Supplier delivery.
    Receipt,
    /// Issue to a department.
    Issue,
    /// Return against an issue.
    Return,
}

impl MovementKind {
    /// All kinds, in display order.
    pub const ALL: [MovementKind; 3] = [Self::Receipt, Self::Issue, Self::Return];

    /// Storage and query-string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receipt => "receipt",
            Self::Issue => "issue",
            Self::Return => "return",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Receipt => "Receipt",
            Self::Issue => "Issue",
            Self::Return => "Return",
        }
    }
}

impl std::str::FromStr for MovementKind {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "receipt" => Ok(Self::Receipt),
            "issue" => Ok(Self::Issue),
            "return" => Ok(Self::Return),
            _ => Err(crate::error::ValidationError::UnknownMovementKind(s.to_string())),
        }
    }
}

/// Unified view of a movement for reports and stock cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Movement {
    /// Source record identifier.
    pub id: MovementId,
    /// Movement kind.
    pub kind: MovementKind,
    /// Item moved.
    pub item_id: ItemId,
    /// Terminal whose counter changed.
    pub terminal: Terminal,
    /// Signed change to the counter: positive for receipts and returns,
    /// negative for issues.
    pub delta: i64,
    /// Business date.
    pub date: NaiveDate,
    /// Supplier (receipts), requester (issues) or reason (returns).
    pub party: String,
    /// Department for issues and returns.
    pub department_id: Option<DepartmentId>,
    /// Time the record was written, used to order same-day movements.
    pub created_at: DateTime<Utc>,
}

impl From<&ReceiptRecord> for Movement {
    fn from(r: &ReceiptRecord) -> Self {
        Self {
            id: r.id,
            kind: MovementKind::Receipt,
            item_id: r.item_id,
            terminal: r.terminal,
            delta: r.quantity.get(),
            date: r.received_on,
            party: r.supplier.clone(),
            department_id: None,
            created_at: r.created_at,
        }
    }
}

impl From<&IssueRecord> for Movement {
    fn from(i: &IssueRecord) -> Self {
        Self {
            id: i.id,
            kind: MovementKind::Issue,
            item_id: i.item_id,
            terminal: i.terminal,
            delta: -i.quantity.get(),
            date: i.issued_on,
            party: i.requested_by.clone(),
            department_id: Some(i.department_id),
            created_at: i.created_at,
        }
    }
}

impl Movement {
    /// Build the view of a return. The department is taken from the issue
    /// when it is known.
    pub fn from_return(r: &ReturnRecord, department_id: Option<DepartmentId>) -> Self {
        Self {
            id: r.id,
            kind: MovementKind::Return,
            item_id: r.item_id,
            terminal: r.terminal,
            delta: r.quantity.get(),
            date: r.returned_on,
            party: r.reason.clone(),
            department_id,
            created_at: r.created_at,
        }
    }

    /// Absolute quantity moved.
    pub fn quantity(&self) -> i64 {
        self.delta.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(qty: i64) -> IssueRecord {
        IssueRecord {
            id: MovementId::new(),
            item_id: ItemId::new(),
            terminal: Terminal::Jct,
            quantity: Quantity::new(qty).unwrap(),
            department_id: DepartmentId::new(),
            requested_by: "A. Perera".into(),
            issued_on: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            issued_by: UserId::new(),
            returned_quantity: 0,
            remarks: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn partial_returns_reduce_outstanding() {
        let mut i = issue(10);
        assert_eq!(i.register_return(Quantity::new(4).unwrap()).unwrap(), 6);
        assert_eq!(i.register_return(Quantity::new(6).unwrap()).unwrap(), 0);
        assert_eq!(i.outstanding(), 0);
    }

    #[test]
    fn over_return_is_rejected_without_change() {
        let mut i = issue(3);
        i.register_return(Quantity::new(2).unwrap()).unwrap();
        let err = i.register_return(Quantity::new(2).unwrap()).unwrap_err();
        assert_eq!(
            err,
            StockError::ReturnExceedsIssued {
                outstanding: 1,
                requested: 2
            }
        );
        assert_eq!(i.returned_quantity, 2);
    }

    #[test]
    fn unregister_return_restores_outstanding() {
        let mut i = issue(5);
        let q = Quantity::new(5).unwrap();
        i.register_return(q).unwrap();
        i.unregister_return(q);
        assert_eq!(i.outstanding(), 5);
    }

    #[test]
    fn issue_movement_is_negative() {
        let i = issue(7);
        let m = Movement::from(&i);
        assert_eq!(m.delta, -7);
        assert_eq!(m.quantity(), 7);
        assert_eq!(m.kind, MovementKind::Issue);
        assert_eq!(m.department_id, Some(i.department_id));
    }

    #[test]
    fn movement_kind_parses() {
        assert_eq!("Issue".parse::<MovementKind>().unwrap(), MovementKind::Issue);
        assert!("transfer".parse::<MovementKind>().is_err());
    }
}
