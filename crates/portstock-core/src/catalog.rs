//! # Catalog
//!
//! Items held in the stores, the terminals that hold them, and the
//! departments they are issued to.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::{DepartmentId, ItemId};
use crate::stock::StockLevels;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Consumable category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Copier and printer paper, forms, rolls.
    Paper,
    /// Toner and ink cartridges, drums.
    Toner,
    /// Printer ribbons (dot-matrix, label, card printers).
    Ribbon,
    /// Anything else kept in the consumables store.
    Other,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Category; 4] = [Self::Paper, Self::Toner, Self::Ribbon, Self::Other];

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paper => "paper",
            Self::Toner => "toner",
            Self::Ribbon => "ribbon",
            Self::Other => "other",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Paper => "Paper",
            Self::Toner => "Toner",
            Self::Ribbon => "Ribbon",
            Self::Other => "Other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paper" => Ok(Self::Paper),
            "toner" => Ok(Self::Toner),
            "ribbon" => Ok(Self::Ribbon),
            "other" => Ok(Self::Other),
            _ => Err(ValidationError::UnknownCategory(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Terminal
// ---------------------------------------------------------------------------

/// Port terminal holding a separate stock counter for every item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminal {
    /// JCT store, counter column `jct_stock`.
    Jct,
    /// UCT store, counter column `uct_stock`.
    Uct,
}

impl Terminal {
    /// Both terminals, in display order.
    pub const ALL: [Terminal; 2] = [Self::Jct, Self::Uct];

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jct => "jct",
            Self::Uct => "uct",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Jct => "JCT",
            Self::Uct => "UCT",
        }
    }

    /// Name of the stock counter column on the `items` table.
    ///
    /// SQL builders must use this fixed mapping and never interpolate
    /// request input into a column name.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Jct => "jct_stock",
            Self::Uct => "uct_stock",
        }
    }
}

impl std::fmt::Display for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Terminal {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jct" => Ok(Self::Jct),
            "uct" => Ok(Self::Uct),
            _ => Err(ValidationError::UnknownTerminal(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ItemCode
// ---------------------------------------------------------------------------

/// Store code of an item, e.g. `TN-85A` or `PPR/A4/80`.
///
/// Normalized to uppercase; 1-32 characters from `[A-Z0-9-_/.]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemCode(String);

impl ItemCode {
    /// Maximum code length.
    pub const MAX_LEN: usize = 32;

    /// Validate and normalize an item code.
    pub fn new(input: &str) -> Result<Self, ValidationError> {
        let code = input.trim().to_ascii_uppercase();
        let valid = !code.is_empty()
            && code.len() <= Self::MAX_LEN
            && code
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/' | '.'));
        if valid {
            Ok(Self(code))
        } else {
            Err(ValidationError::InvalidItemCode(input.to_string()))
        }
    }

    /// The normalized code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ItemCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<ItemCode> for String {
    fn from(code: ItemCode) -> Self {
        code.0
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A catalog item and its current stock at both terminals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Identifier.
    pub id: ItemId,
    /// Unique store code.
    pub code: ItemCode,
    /// Description, e.g. "A4 copier paper 80gsm".
    pub name: String,
    /// Category.
    pub category: Category,
    /// Unit of issue, e.g. "ream", "cartridge", "box".
    pub unit: String,
    /// Total quantity at or below which the item is flagged for reorder.
    pub reorder_level: i64,
    /// Units on hand per terminal.
    pub stock: StockLevels,
    /// Inactive items stay in reports but cannot be received or issued.
    pub active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time (catalog edit or stock movement).
    pub updated_at: DateTime<Utc>,
}

impl ItemRecord {
    /// Whether the combined stock has fallen to the reorder level.
    pub fn is_low_stock(&self) -> bool {
        self.stock.total() <= self.reorder_level
    }
}

/// A department that receives issued consumables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentRecord {
    /// Identifier.
    pub id: DepartmentId,
    /// Short unique code, e.g. "OPS".
    pub code: String,
    /// Full name, e.g. "Marine Operations".
    pub name: String,
    /// Inactive departments cannot receive new issues.
    pub active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl DepartmentRecord {
    /// Validate and uppercase a department code: 2-12 ASCII letters or digits.
    pub fn normalize_code(input: &str) -> Result<String, ValidationError> {
        let code = input.trim().to_ascii_uppercase();
        if (2..=12).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphanumeric()) {
            Ok(code)
        } else {
            Err(ValidationError::InvalidDepartmentCode(input.to_string()))
        }
    }
}
