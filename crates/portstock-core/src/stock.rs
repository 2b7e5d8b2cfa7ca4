//! # Stock Arithmetic
//!
//! [`StockLevels`] holds the per-terminal counters of one item. The
//! counters only change through [`StockLevels::withdraw`] and
//! [`StockLevels::deposit`], which refuse to go below zero or overflow.
//! Callers apply them under a single write lock so that the availability
//! check and the decrement are one step.

use serde::{Deserialize, Serialize};

use crate::catalog::Terminal;
use crate::error::{StockError, ValidationError};

/// A positive movement quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(i64);

impl Quantity {
    /// Smallest quantity a movement may carry.
    pub const MIN: i64 = 1;
    /// Largest quantity a single movement may carry.
    pub const MAX: i64 = 1_000_000;

    /// Validate an integer quantity.
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        Self::check("quantity", value, &value.to_string())
    }

    /// Parse a quantity from a form field.
    pub fn parse(field: &'static str, input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let value = trimmed
            .parse::<i64>()
            .map_err(|_| ValidationError::InvalidQuantity {
                field,
                value: input.to_string(),
                min: Self::MIN,
                max: Self::MAX,
            })?;
        Self::check(field, value, trimmed)
    }

    fn check(field: &'static str, value: i64, raw: &str) -> Result<Self, ValidationError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::InvalidQuantity {
                field,
                value: raw.to_string(),
                min: Self::MIN,
                max: Self::MAX,
            })
        }
    }

    /// The raw value.
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Quantity {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i64 {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Units on hand at each terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevels {
    /// Units at JCT (`jct_stock`).
    pub jct: i64,
    /// Units at UCT (`uct_stock`).
    pub uct: i64,
}

impl StockLevels {
    /// Units on hand at one terminal.
    pub fn get(&self, terminal: Terminal) -> i64 {
        match terminal {
            Terminal::Jct => self.jct,
            Terminal::Uct => self.uct,
        }
    }

    fn slot(&mut self, terminal: Terminal) -> &mut i64 {
        match terminal {
            Terminal::Jct => &mut self.jct,
            Terminal::Uct => &mut self.uct,
        }
    }

    /// Units on hand across both terminals.
    pub fn total(&self) -> i64 {
        self.jct.saturating_add(self.uct)
    }

    /// Take `qty` units out of `terminal`.
    ///
    /// Fails without modifying anything when fewer than `qty` units are on
    /// hand. Returns the remaining balance at that terminal.
    pub fn withdraw(&mut self, terminal: Terminal, qty: Quantity) -> Result<i64, StockError> {
        let slot = self.slot(terminal);
        if *slot < qty.get() {
            return Err(StockError::InsufficientStock {
                terminal,
                available: *slot,
                requested: qty.get(),
            });
        }
        *slot -= qty.get();
        Ok(*slot)
    }

    /// Put `qty` units into `terminal`. Returns the new balance.
    pub fn deposit(&mut self, terminal: Terminal, qty: Quantity) -> Result<i64, StockError> {
        let slot = self.slot(terminal);
        let next = slot
            .checked_add(qty.get())
            .ok_or(StockError::Overflow { terminal })?;
        *slot = next;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn qty(n: i64) -> Quantity {
        Quantity::new(n).unwrap()
    }

    #[test]
    fn quantity_bounds() {
        assert!(Quantity::new(0).is_err());
        assert!(Quantity::new(-3).is_err());
        assert!(Quantity::new(1).is_ok());
        assert!(Quantity::new(Quantity::MAX).is_ok());
        assert!(Quantity::new(Quantity::MAX + 1).is_err());
    }

    #[test]
    fn quantity_parse_from_form_input() {
        assert_eq!(Quantity::parse("quantity", " 12 ").unwrap().get(), 12);
        assert!(Quantity::parse("quantity", "1.5").is_err());
        assert!(Quantity::parse("quantity", "ten").is_err());
        assert!(Quantity::parse("quantity", "").is_err());
    }

    #[test]
    fn withdraw_decrements_only_the_chosen_terminal() {
        let mut s = StockLevels { jct: 10, uct: 4 };
        assert_eq!(s.withdraw(Terminal::Jct, qty(3)).unwrap(), 7);
        assert_eq!(s, StockLevels { jct: 7, uct: 4 });
    }

    #[test]
    fn withdraw_exact_balance_reaches_zero() {
        let mut s = StockLevels { jct: 0, uct: 4 };
        assert_eq!(s.withdraw(Terminal::Uct, qty(4)).unwrap(), 0);
        assert_eq!(s.uct, 0);
    }

    #[test]
    fn withdraw_more_than_available_leaves_stock_untouched() {
        let mut s = StockLevels { jct: 2, uct: 50 };
        let err = s.withdraw(Terminal::Jct, qty(3)).unwrap_err();
        assert_eq!(
            err,
            StockError::InsufficientStock {
                terminal: Terminal::Jct,
                available: 2,
                requested: 3
            }
        );
        assert_eq!(s, StockLevels { jct: 2, uct: 50 });
    }

    #[test]
    fn other_terminal_stock_does_not_cover_a_shortfall() {
        let mut s = StockLevels { jct: 1, uct: 100 };
        assert!(s.withdraw(Terminal::Jct, qty(2)).is_err());
    }

    #[test]
    fn deposit_overflow_is_rejected() {
        let mut s = StockLevels {
            jct: i64::MAX,
            uct: 0,
        };
        assert_eq!(
            s.deposit(Terminal::Jct, qty(1)).unwrap_err(),
            StockError::Overflow {
                terminal: Terminal::Jct
            }
        );
        assert_eq!(s.jct, i64::MAX);
    }

    proptest! {
        #[test]
        fn counters_never_go_negative(
            start_jct in 0i64..500,
            start_uct in 0i64..500,
            ops in proptest::collection::vec((any::<bool>(), any::<bool>(), 1i64..100), 0..64),
        ) {
            let mut s = StockLevels { jct: start_jct, uct: start_uct };
            for (is_withdraw, at_jct, n) in ops {
                let terminal = if at_jct { Terminal::Jct } else { Terminal::Uct };
                let before = s;
                let result = if is_withdraw {
                    s.withdraw(terminal, qty(n))
                } else {
                    s.deposit(terminal, qty(n))
                };
                if result.is_err() {
                    prop_assert_eq!(s, before);
                }
                prop_assert!(s.jct >= 0 && s.uct >= 0);
            }
        }

        #[test]
        fn withdraw_then_deposit_restores_levels(
            jct in 0i64..1000,
            uct in 0i64..1000,
            n in 1i64..1000,
        ) {
            let original = StockLevels { jct, uct };
            let mut s = original;
            if s.withdraw(Terminal::Uct, qty(n)).is_ok() {
                s.deposit(Terminal::Uct, qty(n)).unwrap();
            }
            prop_assert_eq!(s, original);
        }
    }
}
