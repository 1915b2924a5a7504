//! Money in integer cents and line/sale discounts.

use core::iter::Sum;
use core::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Monetary amount in cents (two decimal places, single currency).
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Saturating; for figures already checked with [`Money::checked_times`].
    pub fn times(self, quantity: i64) -> Self {
        Self(self.0.saturating_mul(quantity))
    }

    pub fn checked_times(self, quantity: i64) -> Option<Self> {
        self.0.checked_mul(quantity).map(Self)
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Sum that fails instead of saturating.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Self> {
        amounts.into_iter().try_fold(Money::zero(), Money::checked_add)
    }

    /// `self * bps / 10_000`, rounded half away from zero.
    pub fn percent_bps(self, bps: u32) -> Self {
        let raw = self.0 as i128 * bps as i128;
        let rounded = if raw >= 0 {
            (raw + 5_000) / 10_000
        } else {
            (raw - 5_000) / 10_000
        };
        Self(rounded as i64)
    }

    pub fn min(self, other: Self) -> Self {
        if self <= other { self } else { other }
    }

    /// Whole units and the two-digit cents remainder, for display.
    pub fn split(self) -> (i64, i64) {
        (self.0 / 100, (self.0 % 100).abs())
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Percentage (basis points) plus a fixed amount, applied to a gross figure.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    #[serde(default)]
    pub percent_bps: u32,
    #[serde(default)]
    pub amount: Money,
}

impl Discount {
    pub const NONE: Discount = Discount {
        percent_bps: 0,
        amount: Money::zero(),
    };

    pub fn percent(bps: u32) -> Self {
        Self {
            percent_bps: bps,
            amount: Money::zero(),
        }
    }

    pub fn fixed(amount: Money) -> Self {
        Self {
            percent_bps: 0,
            amount,
        }
    }

    pub fn is_none(&self) -> bool {
        self.percent_bps == 0 && self.amount == Money::zero()
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.percent_bps > 10_000 {
            return Err(DomainError::validation("discount percentage cannot exceed 100%"));
        }
        if self.amount.is_negative() {
            return Err(DomainError::validation("discount amount cannot be negative"));
        }
        Ok(())
    }

    /// Discount value for `gross`, never more than `gross` itself.
    pub fn applied_to(&self, gross: Money) -> Money {
        if gross <= Money::zero() {
            return Money::zero();
        }
        (gross.percent_bps(self.percent_bps) + self.amount).min(gross)
    }
}
