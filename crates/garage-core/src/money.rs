//! # Money Module
//!
//! Fixed-point quantities used by the pricing engine: [`Money`] (pence),
//! [`Percent`] (basis points) and [`Hours`] (hundredths of an hour).
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CASCADING ROUNDING                                                     │
//! │                                                                         │
//! │  Every stage of an invoice is rounded to 2 decimals before the next    │
//! │  stage reads it:                                                       │
//! │                                                                         │
//! │    labour ──round──┐                                                    │
//! │                    ├──► subtotal ──► VAT ──round──► grand total        │
//! │    parts ──round───┘                               │                    │
//! │                                                    ▼                    │
//! │                                      discount ──round──► final          │
//! │                                                                         │
//! │  Holding every stage as integer pence makes "round at each stage"     │
//! │  the only possible behaviour instead of something to remember.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use garage_core::money::{Hours, Money, Percent};
//!
//! let price = Money::from_pence(10_000); // £100.00
//! assert_eq!(price.marked_up(Percent::from_bps(1_000)).pence(), 11_000);
//!
//! let labour = Hours::from_seconds(9_000).times_rate(Money::from_pence(4_000));
//! assert_eq!(labour.pence(), 10_000); // 2.5h at £40.00/h
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

/// Divides with rounding half away from zero.
///
/// `d` must be positive.
pub(crate) fn div_round(n: i128, d: i128) -> i128 {
    if n >= 0 {
        (n + d / 2) / d
    } else {
        -((-n + d / 2) / d)
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in pence (the smallest unit of sterling).
///
/// ## Where Money Flows
/// ```text
/// Part.price ──► marked_up() ──► order line ──┐
///                                             ├──► subtotal ──► VAT ──► grand total
/// Mechanic.hourly_pay ──► Hours::times_rate ──┘                             │
///                                                                          ▼
///                                              DiscountPlan ──► final total, discount value
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from pence.
    ///
    /// ## Example
    /// ```rust
    /// use garage_core::money::Money;
    ///
    /// let price = Money::from_pence(1099); // £10.99
    /// assert_eq!(price.pence(), 1099);
    /// ```
    #[inline]
    pub const fn from_pence(pence: i64) -> Self {
        Money(pence)
    }

    /// Creates a Money value from pounds and pence.
    ///
    /// For negative amounts only the pounds should be negative:
    /// `from_pounds_pence(-5, 50)` is -£5.50.
    #[inline]
    pub const fn from_pounds_pence(pounds: i64, pence: i64) -> Self {
        if pounds < 0 {
            Money(pounds * 100 - pence)
        } else {
            Money(pounds * 100 + pence)
        }
    }

    /// Returns the value in pence.
    #[inline]
    pub const fn pence(&self) -> i64 {
        self.0
    }

    /// Returns the whole-pound portion.
    #[inline]
    pub const fn pounds(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the pence portion (always 0-99).
    #[inline]
    pub const fn pence_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the value as a float, for display and export only.
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Returns `rate` percent of this amount, rounded to the penny.
    ///
    /// ## Example
    /// ```rust
    /// use garage_core::money::{Money, Percent};
    ///
    /// // VAT at 20% on £130.00
    /// let vat = Money::from_pence(13_000).percentage(Percent::from_bps(2_000));
    /// assert_eq!(vat.pence(), 2_600);
    /// ```
    pub fn percentage(&self, rate: Percent) -> Money {
        Money(div_round(self.0 as i128 * rate.bps() as i128, 10_000) as i64)
    }

    /// Returns this amount inflated by `markup` percent.
    ///
    /// `round(price * (1 + markup/100), 2)`. Because the price is already
    /// whole pence, this is the price plus the rounded markup.
    pub fn marked_up(&self, markup: Percent) -> Money {
        *self + self.percentage(markup)
    }

    /// Returns this amount reduced by `rate` percent.
    ///
    /// ## Example
    /// ```rust
    /// use garage_core::money::{Money, Percent};
    ///
    /// let grand_total = Money::from_pence(15_600);
    /// let discounted = grand_total.apply_percentage_discount(Percent::from_bps(1_000));
    /// assert_eq!(discounted.pence(), 14_040);
    /// ```
    pub fn apply_percentage_discount(&self, rate: Percent) -> Money {
        *self - self.percentage(rate)
    }

    /// Multiplies by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Averages a total over `count` items, rounded to the penny.
    ///
    /// Returns `None` when `count` is zero.
    pub fn checked_average(total: Money, count: usize) -> Option<Money> {
        if count == 0 {
            return None;
        }
        Some(Money(div_round(total.0 as i128, count as i128) as i64))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}£{}.{:02}", sign, self.pounds().abs(), self.pence_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Percent
// =============================================================================

/// A percentage held in basis points (1 bps = 0.01%).
///
/// VAT, markup and every discount rate are stored with two decimal places,
/// so `20.00%` is `2000` bps and nothing is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct Percent(u32);

impl Percent {
    /// The largest rate a price control or discount may hold (100.00%).
    pub const MAX: Percent = Percent(10_000);

    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percent(bps)
    }

    /// Creates a rate from a percentage, rounded to two decimals.
    pub fn from_percentage(pct: f64) -> Self {
        Percent((pct * 100.0).round().max(0.0) as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (display only).
    #[inline]
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Percent(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Computes `100 * part / whole` as a rate, rounded to two decimals.
    ///
    /// Returns `None` when `whole` is zero.
    pub fn ratio(part: u64, whole: u64) -> Option<Percent> {
        if whole == 0 {
            return None;
        }
        let bps = div_round(part as i128 * 10_000, whole as i128);
        Some(Percent(bps as u32))
    }
}

impl Default for Percent {
    fn default() -> Self {
        Percent::zero()
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Hours
// =============================================================================

/// A duration in hundredths of an hour, the unit labour is billed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hours(i64);

impl Hours {
    /// Converts seconds to hours, rounded to two decimals.
    ///
    /// ## Example
    /// ```rust
    /// use garage_core::money::Hours;
    ///
    /// assert_eq!(Hours::from_seconds(9_000).hundredths(), 250); // 2.50h
    /// assert_eq!(Hours::from_seconds(1_000).hundredths(), 28);  // 0.2777..h
    /// ```
    pub fn from_seconds(seconds: i64) -> Self {
        Hours(div_round(seconds as i128 * 100, 3_600) as i64)
    }

    #[inline]
    pub const fn from_hundredths(hundredths: i64) -> Self {
        Hours(hundredths)
    }

    #[inline]
    pub const fn hundredths(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Hours(0)
    }

    /// Returns the value in hours (display and export only).
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Bills this many hours at an hourly rate, rounded to the penny.
    pub fn times_rate(&self, hourly: Money) -> Money {
        Money::from_pence(div_round(self.0 as i128 * hourly.pence() as i128, 100) as i64)
    }

    /// Averages a total over `count` items, rounded to two decimals.
    ///
    /// Returns `None` when `count` is zero.
    pub fn checked_average(total: Hours, count: usize) -> Option<Hours> {
        if count == 0 {
            return None;
        }
        Some(Hours(div_round(total.0 as i128, count as i128) as i64))
    }
}

impl Default for Hours {
    fn default() -> Self {
        Hours::zero()
    }
}

impl Add for Hours {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Hours(self.0 + other.0)
    }
}

impl Sum for Hours {
    fn sum<I: Iterator<Item = Hours>>(iter: I) -> Self {
        iter.fold(Hours::zero(), Add::add)
    }
}

impl fmt::Display for Hours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}h", self.0 / 100, (self.0 % 100).abs())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pence() {
        let money = Money::from_pence(1099);
        assert_eq!(money.pence(), 1099);
        assert_eq!(money.pounds(), 10);
        assert_eq!(money.pence_part(), 99);
    }

    #[test]
    fn test_from_pounds_pence() {
        assert_eq!(Money::from_pounds_pence(10, 99).pence(), 1099);
        assert_eq!(Money::from_pounds_pence(-5, 50).pence(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_pence(1099)), "£10.99");
        assert_eq!(format!("{}", Money::from_pence(-550)), "-£5.50");
        assert_eq!(format!("{}", Money::zero()), "£0.00");
        assert_eq!(format!("{}", Percent::from_bps(2000)), "20.00%");
        assert_eq!(format!("{}", Hours::from_hundredths(250)), "2.50h");
    }

    #[test]
    fn test_markup_of_round_price() {
        let part_price = Money::from_pence(10_000);
        assert_eq!(part_price.marked_up(Percent::from_bps(1_000)).pence(), 11_000);
    }

    #[test]
    fn test_markup_rounds_half_up() {
        // £0.05 at 10% = £0.055 -> £0.06
        let price = Money::from_pence(5);
        assert_eq!(price.marked_up(Percent::from_bps(1_000)).pence(), 6);
    }

    #[test]
    fn test_percentage_discount() {
        let total = Money::from_pence(20_000);
        assert_eq!(
            total.apply_percentage_discount(Percent::from_bps(500)).pence(),
            19_000
        );
    }

    #[test]
    fn test_negative_rounding_is_symmetric() {
        assert_eq!(div_round(-5, 10), -1);
        assert_eq!(div_round(5, 10), 1);
        assert_eq!(div_round(-4, 10), 0);
    }

    #[test]
    fn test_hours_from_seconds() {
        assert_eq!(Hours::from_seconds(0).hundredths(), 0);
        assert_eq!(Hours::from_seconds(3_600).hundredths(), 100);
        assert_eq!(Hours::from_seconds(5_400).hundredths(), 150);
    }

    #[test]
    fn test_labour_at_hourly_rate() {
        let labour = Hours::from_hundredths(250).times_rate(Money::from_pence(4_000));
        assert_eq!(labour.pence(), 10_000);

        // 0.33h at £25.50/h = £8.415 -> £8.42
        let labour = Hours::from_hundredths(33).times_rate(Money::from_pence(2_550));
        assert_eq!(labour.pence(), 842);
    }

    #[test]
    fn test_checked_averages() {
        assert_eq!(Money::checked_average(Money::from_pence(1000), 3), Some(Money::from_pence(333)));
        assert_eq!(Money::checked_average(Money::from_pence(1000), 0), None);
        assert_eq!(Hours::checked_average(Hours::from_hundredths(5), 2), Some(Hours::from_hundredths(3)));
    }

    #[test]
    fn test_ratio() {
        assert_eq!(Percent::ratio(20, 50), Some(Percent::from_bps(4_000)));
        assert_eq!(Percent::ratio(1, 3), Some(Percent::from_bps(3_333)));
        assert_eq!(Percent::ratio(5, 0), None);
    }

    #[test]
    fn test_sum() {
        let total: Money = [100, 250, 5].iter().map(|p| Money::from_pence(*p)).sum();
        assert_eq!(total.pence(), 355);
    }
}
