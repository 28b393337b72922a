//! Type-safe price representation using decimal arithmetic.
//!
//! The shop trades in South African rand only, so a price is just an amount.
//! The remote API exchanges prices as JSON numbers; they are parsed into
//! [`Decimal`] so that subtotals never pick up binary floating-point error.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A rand amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Price {
    /// Currency symbol used when formatting.
    pub const SYMBOL: &'static str = "R";

    /// Zero rand.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from an amount in cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Whether the amount is below zero.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Price of `quantity` units, or `None` if it does not fit.
    #[must_use]
    pub fn checked_times(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(Decimal::from(quantity)).map(Self)
    }

    /// `self + rhs`, or `None` if it does not fit.
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Amount rounded to two decimals without the currency symbol (e.g. `119.99`).
    #[must_use]
    pub fn to_fixed(&self) -> String {
        format!("{:.2}", self.0)
    }
}

impl fmt::Display for Price {
    /// Formats as `R119.99`, honouring width and alignment.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("{}{:.2}", Self::SYMBOL, self.0))
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}
