//! # Money Module
//!
//! Fixed-point monetary values and the currencies they are denominated in.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004                                      │
//! │                                                                         │
//! │  Summed over dozens of cart lines the drift becomes a visible cent.    │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                      │
//! │    USD 10.99 is stored as 1099, JPY 500 is stored as 500               │
//! │    Intermediate results are kept exact (i128 rationals) and rounded    │
//! │    half-up exactly once, when a total is produced.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::{Currency, Money};
//!
//! let price = Money::from_minor(1099); // USD 10.99
//! let line = price.multiply_quantity(3);
//! assert_eq!(line.minor(), 3297);
//! assert_eq!(Currency::USD.format(line), "USD 32.97");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use crate::error::ValidationError;
use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary amount in the smallest unit of its currency.
///
/// The currency itself is carried by the aggregate that owns the amount
/// (cart, sale, product): every amount inside one aggregate shares it.
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.unit_price ──► LineItem.unit_price ──► line total             │
/// │                                                   │                    │
/// │                    cart discount (allocated) ◄────┤                    │
/// │                    line tax (on net amount)  ◄────┘                    │
/// │                                                                         │
/// │  Totals { subtotal, discount_total, tax_total, grand_total } ──► Sale  │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units (cents for USD).
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Creates a Money value from major and minor parts for a two-decimal currency.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(10, 99).minor(), 1099);
    /// assert_eq!(Money::from_major_minor(-5, 50).minor(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the amount in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
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
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit price by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Tax owed on this amount at `rate`, rounded half-up to the minor unit.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    /// use tally_core::types::TaxRate;
    ///
    /// // 10.00 × 8.25% = 0.825 → 0.83
    /// let tax = Money::from_minor(1000).calculate_tax(TaxRate::from_bps(825));
    /// assert_eq!(tax.minor(), 83);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        self.fraction_bps(rate.bps())
    }

    /// The `bps` basis-point share of this amount, rounded half-up.
    ///
    /// Used for percentage discounts: 10% of 25.00 is `fraction_bps(1000)`.
    pub fn fraction_bps(&self, bps: u32) -> Money {
        let share = div_round_half_up(i128::from(self.0) * i128::from(bps), 10_000);
        Money(share as i64)
    }
}

/// Integer division rounding ties away from zero (half-up for the
/// non-negative amounts a sale produces).
///
/// `den` must be positive.
pub(crate) fn div_round_half_up(num: i128, den: i128) -> i128 {
    debug_assert!(den > 0, "rounding denominator must be positive");
    if num >= 0 {
        (2 * num + den) / (2 * den)
    } else {
        -((2 * -num + den) / (2 * den))
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

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Currency
// =============================================================================

/// An ISO 4217 currency: three-letter code plus the number of minor-unit digits.
///
/// `Copy` so it can be handed around freely; the code is stored inline.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CurrencyRepr", into = "CurrencyRepr")]
pub struct Currency {
    code: [u8; 3],
    exponent: u8,
}

impl Currency {
    pub const USD: Currency = Currency { code: *b"USD", exponent: 2 };
    pub const EUR: Currency = Currency { code: *b"EUR", exponent: 2 };
    pub const GBP: Currency = Currency { code: *b"GBP", exponent: 2 };
    pub const JPY: Currency = Currency { code: *b"JPY", exponent: 0 };

    /// Largest supported minor-unit exponent.
    pub const MAX_EXPONENT: u8 = 4;

    /// Creates a currency from its code and minor-unit exponent.
    ///
    /// ## Rules
    /// - Code is exactly three ASCII letters (normalised to upper case)
    /// - Exponent is at most [`Currency::MAX_EXPONENT`]
    pub fn new(code: &str, exponent: u8) -> Result<Self, ValidationError> {
        let code = code.trim();
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(ValidationError::InvalidFormat {
                field: "currency".to_string(),
                reason: "must be a three-letter ISO 4217 code".to_string(),
            });
        }
        if exponent > Self::MAX_EXPONENT {
            return Err(ValidationError::OutOfRange {
                field: "currency exponent".to_string(),
                min: 0,
                max: i64::from(Self::MAX_EXPONENT),
            });
        }

        let mut upper = [0u8; 3];
        for (dst, src) in upper.iter_mut().zip(bytes) {
            *dst = src.to_ascii_uppercase();
        }
        Ok(Currency {
            code: upper,
            exponent,
        })
    }

    /// The three-letter code, e.g. `"USD"`.
    pub fn code(&self) -> &str {
        // Constructed only from ASCII letters.
        std::str::from_utf8(&self.code).unwrap_or("???")
    }

    /// Number of digits after the decimal point.
    pub const fn exponent(&self) -> u8 {
        self.exponent
    }

    /// Formats an amount for operator display: `"USD 27.00"`, `"JPY 500"`.
    pub fn format(&self, amount: Money) -> String {
        let sign = if amount.is_negative() { "-" } else { "" };
        let abs = amount.minor().unsigned_abs();
        if self.exponent == 0 {
            return format!("{} {}{}", self.code(), sign, abs);
        }
        let divisor = 10_u64.pow(u32::from(self.exponent));
        format!(
            "{} {}{}.{:0width$}",
            self.code(),
            sign,
            abs / divisor,
            abs % divisor,
            width = usize::from(self.exponent)
        )
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::USD
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency({}, {})", self.code(), self.exponent)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Serialize, Deserialize)]
struct CurrencyRepr {
    code: String,
    exponent: u8,
}

impl TryFrom<CurrencyRepr> for Currency {
    type Error = ValidationError;

    fn try_from(repr: CurrencyRepr) -> Result<Self, Self::Error> {
        Currency::new(&repr.code, repr.exponent)
    }
}

impl From<Currency> for CurrencyRepr {
    fn from(currency: Currency) -> Self {
        CurrencyRepr {
            code: currency.code().to_string(),
            exponent: currency.exponent,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor_and_major_minor() {
        assert_eq!(Money::from_minor(1099).minor(), 1099);
        assert_eq!(Money::from_major_minor(10, 99).minor(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).minor(), -550);
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(500);

        assert_eq!((a + b).minor(), 1500);
        assert_eq!((a - b).minor(), 500);
        assert_eq!(a.multiply_quantity(3).minor(), 3000);

        let total: Money = [a, b, b].into_iter().sum();
        assert_eq!(total.minor(), 2000);
    }

    #[test]
    fn test_tax_rounds_half_up() {
        // 10.00 at 10% = 1.00
        assert_eq!(Money::from_minor(1000).calculate_tax(TaxRate::from_bps(1000)).minor(), 100);
        // 10.00 at 8.25% = 0.825 → 0.83
        assert_eq!(Money::from_minor(1000).calculate_tax(TaxRate::from_bps(825)).minor(), 83);
        // 0.10 at 5% = 0.005 → 0.01
        assert_eq!(Money::from_minor(10).calculate_tax(TaxRate::from_bps(500)).minor(), 1);
        // 0.10 at 4% = 0.004 → 0.00
        assert_eq!(Money::from_minor(10).calculate_tax(TaxRate::from_bps(400)).minor(), 0);
    }

    #[test]
    fn test_fraction_bps() {
        assert_eq!(Money::from_minor(2500).fraction_bps(1000).minor(), 250);
        assert_eq!(Money::from_minor(999).fraction_bps(5000).minor(), 500);
        assert_eq!(Money::from_minor(999).fraction_bps(10_000).minor(), 999);
    }

    #[test]
    fn test_div_round_half_up() {
        assert_eq!(div_round_half_up(5, 10), 1);
        assert_eq!(div_round_half_up(4, 10), 0);
        assert_eq!(div_round_half_up(15, 10), 2);
        assert_eq!(div_round_half_up(25, 10), 3);
        assert_eq!(div_round_half_up(-5, 10), -1);
        assert_eq!(div_round_half_up(0, 7), 0);
    }

    #[test]
    fn test_zero_and_sign_checks() {
        assert!(Money::zero().is_zero());
        assert!(Money::from_minor(1).is_positive());
        assert!(Money::from_minor(-1).is_negative());
    }

    #[test]
    fn test_currency_new_normalises_code() {
        let currency = Currency::new("eur", 2).unwrap();
        assert_eq!(currency, Currency::EUR);
        assert_eq!(currency.code(), "EUR");

        assert!(Currency::new("EURO", 2).is_err());
        assert!(Currency::new("E1R", 2).is_err());
        assert!(Currency::new("USD", 9).is_err());
    }

    #[test]
    fn test_currency_format() {
        assert_eq!(Currency::USD.format(Money::from_minor(2700)), "USD 27.00");
        assert_eq!(Currency::USD.format(Money::from_minor(5)), "USD 0.05");
        assert_eq!(Currency::USD.format(Money::from_minor(-550)), "USD -5.50");
        assert_eq!(Currency::JPY.format(Money::from_minor(500)), "JPY 500");
        let bhd = Currency::new("BHD", 3).unwrap();
        assert_eq!(bhd.format(Money::from_minor(1234)), "BHD 1.234");
    }

    #[test]
    fn test_currency_serde_round_trip() {
        let json = serde_json::to_string(&Currency::JPY).unwrap();
        assert_eq!(json, r#"{"code":"JPY","exponent":0}"#);
        let back: Currency = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Currency::JPY);

        let bad = serde_json::from_str::<Currency>(r#"{"code":"JP","exponent":0}"#);
        assert!(bad.is_err());
    }
}
