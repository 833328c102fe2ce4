//! Monetary values and percentage rates.
//!
//! All prices are carried as **integer minor units** (cents). Rounding to the
//! cent happens exactly once per derived amount, using round-half-up, so
//! layered discount math never accumulates binary floating point drift.

use core::fmt;
use core::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use serde::{Deserialize, Serialize};

/// A monetary amount in the smallest currency unit (cents).
///
/// Signed so refunds and deltas are representable; catalog prices are
/// validated non-negative where they enter the system.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Line total for `qty` units at this unit price.
    #[inline]
    pub const fn times(&self, qty: u32) -> Self {
        Money(self.0 * qty as i64)
    }

    /// Price after applying a percentage discount, rounded half-up at the cent.
    ///
    /// The discount amount is computed in one multiplication from this value,
    /// so a 10% discount on 100.00 is exactly 90.00, not 89.99.
    pub fn apply_discount(&self, rate: Rate) -> Money {
        let discount = Self::mul_bps_rounded(self.0, rate.bps());
        Money(self.0 - discount)
    }

    /// Tax amount for this value at the given rate, rounded half-up at the cent.
    pub fn tax(&self, rate: Rate) -> Money {
        Money(Self::mul_bps_rounded(self.0, rate.bps()))
    }

    /// `value * bps / 10_000`, rounded half-up, widened to avoid overflow.
    fn mul_bps_rounded(cents: i64, bps: u32) -> i64 {
        let scaled = cents as i128 * bps as i128;
        ((scaled + 5_000) / 10_000) as i64
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

/// A percentage expressed in basis points (1 bps = 0.01%).
///
/// Used for VAT rates and discount percents; integer basis points keep
/// fractional percentages (e.g. 8.25%) exact.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Rate(u32);

impl Rate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Whole-percent convenience constructor: `from_percent(20)` is 20%.
    #[inline]
    pub const fn from_percent(percent: u32) -> Self {
        Rate(percent * 100)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 100 == 0 {
            write!(f, "{}%", self.0 / 100)
        } else {
            write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
        }
    }
}
