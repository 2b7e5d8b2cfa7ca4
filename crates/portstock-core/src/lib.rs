#![deny(missing_docs)]

//! # portstock-core — Domain Types for the Consumables Inventory
//!
//! Foundational types shared by the web application and the operator CLI.
//! No I/O happens here: every function is a pure transformation over
//! records, which keeps the stock rules and report arithmetic testable
//! without a database.
//!
//! ## Design Principles
//!
//! 1. **Newtype identifiers.** [`ItemId`], [`UserId`], [`DepartmentId`] and
//!    [`MovementId`] are distinct types over UUIDs.
//!
//! 2. **Validated at construction.** [`ItemCode`], [`Username`] and
//!    [`Quantity`] cannot hold an invalid value. Free text goes through
//!    [`sanitize::clean_text`] before it reaches a record.
//!
//! 3. **Stock never goes negative.** [`StockLevels::withdraw`] is the only
//!    way to take units out of a terminal and it refuses to overdraw.
//!
//! 4. **Reports are pure.** [`report`] computes stock summaries, movement
//!    registers, departmental consumption and stock cards from slices of
//!    records.

pub mod catalog;
pub mod error;
pub mod identity;
pub mod movement;
pub mod report;
pub mod sanitize;
pub mod stock;
pub mod user;

pub use catalog::{Category, DepartmentRecord, ItemCode, ItemRecord, Terminal};
pub use error::{StockError, ValidationError};
pub use identity::{DepartmentId, ItemId, MovementId, UserId};
pub use movement::{IssueRecord, Movement, MovementKind, ReceiptRecord, ReturnRecord};
pub use report::DateRange;
pub use stock::{Quantity, StockLevels};
pub use user::{validate_password, Role, UserRecord, Username};
