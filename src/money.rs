//! Money Module
//!
//! Every balance and transfer amount in the ledger is a [`Money`]: an exact
//! decimal with two fractional digits, backed by `rust_decimal::Decimal`.
//! All conversions from client input or storage MUST go through this module.
//!
//! ## Design Principles
//! 1. Fixed scale: values are always rescaled to [`SCALE`] digits
//! 2. Explicit Error Handling: no silent truncation or rounding
//! 3. Bounded range: the store column is `NUMERIC(15, 2)`, so anything above
//!    [`Money::max_value`] is an overflow, never a wrap
//!
//! ## Usage
//! ```rust
//! use bank_ledger::money::Money;
//!
//! let amount = Money::parse("30").unwrap();
//! assert_eq!(amount.to_string(), "30.00");
//! ```

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of fractional digits carried by every monetary value.
pub const SCALE: u32 = 2;

// ============================================================================
// Error Types
// ============================================================================

/// Money conversion and arithmetic errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount cannot be negative")]
    Negative,

    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

// ============================================================================
// Money
// ============================================================================

/// Non-negative fixed-point amount with two fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Largest representable value (`NUMERIC(15, 2)`).
    pub fn max_value() -> Decimal {
        Decimal::from_i128_with_scale(999_999_999_999_999, SCALE)
    }

    /// Validate a decimal and pin it to [`SCALE`].
    ///
    /// Trailing zeros beyond the scale are accepted (`1.500` is `1.50`);
    /// significant digits beyond it are rejected.
    pub fn from_decimal(value: Decimal) -> Result<Self, MoneyError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MoneyError::Negative);
        }

        let normalized = value.normalize();
        if normalized.scale() > SCALE {
            return Err(MoneyError::PrecisionOverflow {
                provided: normalized.scale(),
                max: SCALE,
            });
        }

        if normalized > Self::max_value() {
            return Err(MoneyError::Overflow);
        }

        let mut scaled = normalized.abs();
        scaled.rescale(SCALE);
        Ok(Self(scaled))
    }

    /// Validate a transfer amount: same rules as [`Money::from_decimal`],
    /// plus zero is rejected.
    pub fn positive(value: Decimal) -> Result<Self, MoneyError> {
        let money = Self::from_decimal(value)?;
        if money.is_zero() {
            return Err(MoneyError::InvalidAmount);
        }
        Ok(money)
    }

    /// Parse a client string strictly.
    ///
    /// Rejects `.5`, `5.`, signs, exponents and anything `Decimal` refuses.
    pub fn parse(input: &str) -> Result<Self, MoneyError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(MoneyError::InvalidFormat("empty string".into()));
        }
        if s.starts_with('-') {
            return Err(MoneyError::Negative);
        }
        if s.starts_with('+') {
            return Err(MoneyError::InvalidFormat("explicit sign not allowed".into()));
        }
        if s.starts_with('.') {
            return Err(MoneyError::InvalidFormat(
                "missing leading zero (e.g., use 0.5 instead of .5)".into(),
            ));
        }
        if s.ends_with('.') {
            return Err(MoneyError::InvalidFormat(
                "missing fractional part (e.g., use 5.0 instead of 5.)".into(),
            ));
        }
        if s.contains(['e', 'E']) {
            return Err(MoneyError::InvalidFormat(
                "scientific notation not allowed".into(),
            ));
        }

        let value = Decimal::from_str(s)
            .map_err(|e| MoneyError::InvalidFormat(format!("invalid decimal: {}", e)))?;
        Self::from_decimal(value)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Sum, failing when the result leaves the storable range.
    pub fn checked_add(self, other: Money) -> Result<Money, MoneyError> {
        let sum = self.0.checked_add(other.0).ok_or(MoneyError::Overflow)?;
        if sum > Self::max_value() {
            return Err(MoneyError::Overflow);
        }
        Ok(Money(sum))
    }

    /// Difference, failing when it would go below zero.
    pub fn checked_sub(self, other: Money) -> Result<Money, MoneyError> {
        if other.0 > self.0 {
            return Err(MoneyError::Negative);
        }
        Ok(Money(self.0 - other.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.prec$}", self.0, prec = SCALE as usize)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::from_decimal(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // String keeps the two fractional digits intact for JSON clients
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        // Support both JSON number and JSON string
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum DecimalOrString {
            String(String),
            Number(Decimal),
        }

        match DecimalOrString::deserialize(deserializer)? {
            DecimalOrString::String(s) => Money::parse(&s).map_err(D::Error::custom),
            DecimalOrString::Number(d) => Money::from_decimal(d).map_err(D::Error::custom),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_pins_scale() {
        assert_eq!(Money::parse("30").unwrap().to_string(), "30.00");
        assert_eq!(Money::parse("30.5").unwrap().to_string(), "30.50");
        assert_eq!(Money::parse("0.01").unwrap().to_string(), "0.01");
        assert_eq!(Money::parse("1.500").unwrap().to_string(), "1.50");
    }

    #[test]
    fn test_parse_invalid_formats() {
        let cases = ["", "1,000.00", "1.2.3", "+1.23", "1e2", ".5", "5.", "abc"];
        for case in cases {
            assert!(Money::parse(case).is_err(), "Should reject: {:?}", case);
        }
        assert_eq!(Money::parse("-1"), Err(MoneyError::Negative));
    }

    #[test]
    fn test_precision_overflow() {
        assert_eq!(
            Money::parse("1.234"),
            Err(MoneyError::PrecisionOverflow {
                provided: 3,
                max: 2
            })
        );
    }

    #[test]
    fn test_positive_rejects_zero() {
        assert_eq!(Money::positive(dec("0")), Err(MoneyError::InvalidAmount));
        assert_eq!(Money::positive(dec("0.00")), Err(MoneyError::InvalidAmount));
        assert!(Money::positive(dec("0.01")).is_ok());
    }

    #[test]
    fn test_range_limits() {
        assert!(Money::parse("9999999999999.99").is_ok());
        assert_eq!(Money::parse("10000000000000.00"), Err(MoneyError::Overflow));

        let max = Money::from_decimal(Money::max_value()).unwrap();
        assert_eq!(
            max.checked_add(Money::parse("0.01").unwrap()),
            Err(MoneyError::Overflow)
        );
    }

    #[test]
    fn test_checked_sub_never_goes_negative() {
        let a = Money::parse("100.00").unwrap();
        let b = Money::parse("100.01").unwrap();
        assert_eq!(a.checked_sub(b), Err(MoneyError::Negative));
        assert_eq!(a.checked_sub(a).unwrap(), Money::ZERO);
    }

    #[test]
    fn test_repeated_cents_do_not_drift() {
        // 0.1 + 0.2 style drift is impossible with decimal arithmetic
        let cent = Money::parse("0.10").unwrap();
        let mut total = Money::ZERO;
        for _ in 0..1000 {
            total = total.checked_add(cent).unwrap();
        }
        assert_eq!(total.to_string(), "100.00");
    }

    #[test]
    fn test_serde_accepts_string_and_number() {
        let from_str: Money = serde_json::from_str("\"30.00\"").unwrap();
        let from_num: Money = serde_json::from_str("30").unwrap();
        assert_eq!(from_str, from_num);
        assert_eq!(serde_json::to_string(&from_str).unwrap(), "\"30.00\"");

        assert!(serde_json::from_str::<Money>("\"-5\"").is_err());
        assert!(serde_json::from_str::<Money>("\"1.001\"").is_err());
    }
}
