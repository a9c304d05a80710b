//! # Money
//!
//! Prices and totals are whole cents in an `i64`. Order arithmetic never
//! touches floating point, and the JSON form is the bare integer.
//!
//! ```text
//! Drug.price_cents ──snapshot──► OrderLine.unit_price_cents
//!                                       │ × quantity (checked)
//!                                       ▼
//!                               OrderLine.line_total_cents ──Σ (checked)──► Order.total_cents
//! ```
//!
//! The unchecked operators are for amounts already known to fit, such as
//! values read back from the ledger. Anything derived from caller input goes
//! through [`Money::checked_line_total`] and [`Money::checked_add`].
//!
//! ```rust
//! use pharmacy_core::money::Money;
//!
//! let line = Money::from_cents(1099).checked_line_total(3).unwrap();
//! assert_eq!(line.to_string(), "32.97");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Sub};

use crate::error::{CoreError, CoreResult};

/// An amount in cents. Negative values are representable but never priced.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// `self × quantity`, or [`CoreError::AmountOverflow`].
    ///
    /// ```rust
    /// use pharmacy_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(500).checked_line_total(4).unwrap().cents(), 2000);
    /// assert!(Money::from_cents(i64::MAX).checked_line_total(2).is_err());
    /// ```
    pub fn checked_line_total(&self, quantity: i64) -> CoreResult<Money> {
        self.0
            .checked_mul(quantity)
            .map(Money)
            .ok_or_else(|| overflow("line total"))
    }

    /// `self + other`, or [`CoreError::AmountOverflow`].
    pub fn checked_add(&self, other: Money) -> CoreResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| overflow("order total"))
    }
}

fn overflow(context: &str) -> CoreError {
    CoreError::AmountOverflow {
        context: context.to_string(),
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.unsigned_abs();
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Mul<i64> for Money {
    type Output = Money;

    fn mul(self, quantity: i64) -> Money {
        Money(self.0 * quantity)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), Add::add)
    }
}
