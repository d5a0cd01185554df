//! Value objects shared by the order and payment models.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Money amount represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

/// Error returned when a decimal money string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid money amount: {0}")]
pub struct ParseMoneyError(pub String);

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new Money amount from a dollar value.
    pub fn from_dollars(dollars: i64) -> Self {
        Self {
            cents: dollars * 100,
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the dollar portion (whole number).
    pub fn dollars(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents * quantity as i64,
        }
    }

    /// Renders the amount as a plain decimal string (e.g. `"12.34"`).
    ///
    /// This is the representation used on the wire, without a currency symbol.
    pub fn to_decimal_string(&self) -> String {
        if self.cents < 0 {
            format!("-{}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            format!("{}.{:02}", self.dollars(), self.cents_part())
        }
    }
}

impl FromStr for Money {
    type Err = ParseMoneyError;

    /// Parses a decimal string such as `"12.34"`, `"12"` or `"-0.05"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (dollars_str, cents_str) = match unsigned.split_once('.') {
            Some((d, c)) => (d, c),
            None => (unsigned, ""),
        };

        if dollars_str.is_empty() && cents_str.is_empty() {
            return Err(ParseMoneyError(s.to_string()));
        }
        if cents_str.len() > 2 || !cents_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(ParseMoneyError(s.to_string()));
        }

        let dollars: i64 = if dollars_str.is_empty() {
            0
        } else {
            dollars_str
                .parse()
                .map_err(|_| ParseMoneyError(s.to_string()))?
        };

        let cents: i64 = if cents_str.is_empty() {
            0
        } else {
            let padded = format!("{cents_str:0<2}");
            padded.parse().map_err(|_| ParseMoneyError(s.to_string()))?
        };

        let total = dollars * 100 + cents;
        Ok(Money {
            cents: if negative { -total } else { total },
        })
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.dollars(), self.cents_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents - rhs.cents,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents += rhs.cents;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// ISO 4217 currency code (3 uppercase letters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Creates a currency from a 3-letter code, normalizing to uppercase.
    ///
    /// Returns `None` if the code is not exactly 3 ASCII letters.
    pub fn new(code: impl Into<String>) -> Option<Self> {
        let code: String = code.into();
        let code = code.trim().to_ascii_uppercase();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
            Some(Self(code))
        } else {
            None
        }
    }

    /// The default currency.
    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::usd()
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Product identifier (SKU).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_from_cents() {
        let money = Money::from_cents(1234);
        assert_eq!(money.cents(), 1234);
        assert_eq!(money.dollars(), 12);
        assert_eq!(money.cents_part(), 34);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(1234).to_string(), "$12.34");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-$12.34");
    }

    #[test]
    fn test_money_decimal_string() {
        assert_eq!(Money::from_cents(2000).to_decimal_string(), "20.00");
        assert_eq!(Money::from_cents(999).to_decimal_string(), "9.99");
        assert_eq!(Money::from_cents(5).to_decimal_string(), "0.05");
        assert_eq!(Money::from_cents(-150).to_decimal_string(), "-1.50");
    }

    #[test]
    fn test_money_parse_decimal_string() {
        assert_eq!("20.00".parse::<Money>().unwrap(), Money::from_cents(2000));
        assert_eq!("9.99".parse::<Money>().unwrap(), Money::from_cents(999));
        assert_eq!("12".parse::<Money>().unwrap(), Money::from_cents(1200));
        assert_eq!("12.3".parse::<Money>().unwrap(), Money::from_cents(1230));
        assert_eq!("-1.50".parse::<Money>().unwrap(), Money::from_cents(-150));
    }

    #[test]
    fn test_money_parse_rejects_garbage() {
        assert!("".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
        assert!("1.234".parse::<Money>().is_err());
        assert!("1.x".parse::<Money>().is_err());
    }

    #[test]
    fn test_money_roundtrip_through_decimal_string() {
        for cents in [0, 5, 99, 100, 1234, 100_000] {
            let money = Money::from_cents(cents);
            let parsed: Money = money.to_decimal_string().parse().unwrap();
            assert_eq!(money, parsed);
        }
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!(a.multiply(3).cents(), 3000);
    }

    #[test]
    fn test_money_sum() {
        let total: Money = [100, 200, 300]
            .into_iter()
            .map(Money::from_cents)
            .sum();
        assert_eq!(total.cents(), 600);
    }

    #[test]
    fn test_currency_normalizes_to_uppercase() {
        let currency = Currency::new("usd").unwrap();
        assert_eq!(currency.as_str(), "USD");
    }

    #[test]
    fn test_currency_rejects_invalid_codes() {
        assert!(Currency::new("US").is_none());
        assert!(Currency::new("DOLLARS").is_none());
        assert!(Currency::new("U5D").is_none());
    }

    #[test]
    fn test_currency_default_is_usd() {
        assert_eq!(Currency::default().as_str(), "USD");
    }

    #[test]
    fn test_product_id_string_conversion() {
        let id = ProductId::new("SKU-001");
        assert_eq!(id.as_str(), "SKU-001");

        let id2: ProductId = "SKU-002".into();
        assert_eq!(id2.as_str(), "SKU-002");
    }
}
