//! # Money Module
//!
//! Provides the `Money` type for handling rupee amounts safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  The storefront API sends prices as strings ("120.50") or numbers       │
//! │  (120.5). Summing those as f64:                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Paise                                            │
//! │    "120.50" ──► rust_decimal ──► 12050 paise                           │
//! │    Cart totals saturate, profile spend skips amounts that overflow    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use peelo_core::money::Money;
//!
//! let price = Money::from_paise(12050); // ₹120.50
//! let line = price * 3;                 // ₹361.50
//! assert_eq!(line.paise(), 36150);
//!
//! let parsed = Money::parse("120.50").unwrap();
//! assert_eq!(parsed, price);
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};
use std::str::FromStr;

/// Paise per rupee.
const MINOR_PER_MAJOR: i64 = 100;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in paise (1/100 of a rupee).
///
/// ## Design Decisions
/// - **i64 (signed)**: arithmetic stays closed under subtraction
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Wire format**: see [`wire`] for the lenient string-or-number decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from paise (the smallest currency unit).
    #[inline]
    pub const fn from_paise(paise: i64) -> Self {
        Money(paise)
    }

    /// Creates a Money value from whole rupees.
    #[inline]
    pub const fn from_rupees(rupees: i64) -> Self {
        Money(rupees.saturating_mul(MINOR_PER_MAJOR))
    }

    /// Returns the value in paise.
    #[inline]
    pub const fn paise(&self) -> i64 {
        self.0
    }

    /// Returns the whole-rupee portion.
    #[inline]
    pub const fn rupees(&self) -> i64 {
        self.0 / MINOR_PER_MAJOR
    }

    /// Returns the paise portion (always 0-99).
    #[inline]
    pub const fn paise_part(&self) -> i64 {
        (self.0 % MINOR_PER_MAJOR).abs()
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

    /// Multiplies money by a quantity, saturating at the i64 bounds.
    ///
    /// ## User Workflow
    /// ```text
    /// Product: Carrot Juice ₹120.50
    /// Quantity: 3
    ///      │
    ///      ▼
    /// multiply_quantity(3) ← THIS FUNCTION
    ///      │
    ///      ▼
    /// Line Total: ₹361.50
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: u32) -> Self {
        Money(self.0.saturating_mul(qty as i64))
    }

    /// Adds two amounts, returning `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(paise) => Some(Money(paise)),
            None => None,
        }
    }

    /// Multiplies by a quantity, returning `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: u32) -> Option<Self> {
        match self.0.checked_mul(qty as i64) {
            Some(paise) => Some(Money(paise)),
            None => None,
        }
    }

    /// Converts a decimal amount in rupees to paise.
    ///
    /// Rounds to two places with round-half-to-even, the only rounding
    /// performed anywhere on the client. Returns `None` when the value does
    /// not fit in an i64.
    pub fn from_decimal(amount: Decimal) -> Option<Self> {
        let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
        rounded
            .checked_mul(Decimal::from(MINOR_PER_MAJOR))
            .and_then(|paise| paise.to_i64())
            .map(Money)
    }

    /// Returns the amount in rupees as an exact decimal.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Parses a rupee amount such as `"120.50"`, `"99"` or `" 7.5 "`.
    ///
    /// Returns `None` for anything that is not a plain decimal number.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .ok()
            .and_then(Self::from_decimal)
    }

    /// Converts a loosely typed JSON amount (string or number) to Money.
    ///
    /// ```rust
    /// use peelo_core::money::Money;
    /// use serde_json::json;
    ///
    /// assert_eq!(Money::from_json(&json!("45.00")), Some(Money::from_paise(4500)));
    /// assert_eq!(Money::from_json(&json!(45)), Some(Money::from_paise(4500)));
    /// assert_eq!(Money::from_json(&json!(null)), None);
    /// ```
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Self::parse(s),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::from_decimal(Decimal::from(i))
                } else {
                    n.as_f64()
                        .and_then(|f| Decimal::try_from(f).ok())
                        .and_then(Self::from_decimal)
                }
            }
            _ => None,
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================
//
// Operators saturate at the i64 bounds; `checked_*` report overflow instead.

/// Displays as `₹120.50`. Presentation layers wanting a different symbol or
/// precision go through the client's currency settings instead.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}₹{}.{:02}", sign, self.rupees().abs(), self.paise_part())
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
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl Mul<u32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: u32) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Wire Format
// =============================================================================

/// Serde adapter for prices as the storefront API sends them.
///
/// ## Accepted Shapes
/// ```text
/// "120.50"  ──► 12050 paise
/// 120.5     ──► 12050 paise
/// 120       ──► 12000 paise
/// ```
/// Serializes back as a two-decimal string so persisted snapshots round-trip
/// through the same decoder.
///
/// ```rust,ignore
/// #[derive(Deserialize)]
/// struct Product {
///     #[serde(with = "peelo_core::money::wire")]
///     price: Money,
/// }
/// ```
pub mod wire {
    use super::Money;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(money: &Money, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&money.to_decimal().to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Money, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Money::from_json(&value)
            .ok_or_else(|| D::Error::custom(format!("invalid monetary amount: {value}")))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
