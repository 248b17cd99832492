use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const MINOR_UNITS: i64 = 100;

/// Fixed-point monetary amount held in minor units (cents).
///
/// Amounts parse from decimal strings or JSON numbers with at most two fractional
/// digits and always render with exactly two, so balances never pass through
/// floating-point arithmetic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
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

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }
}

/// Parsing failures for decimal amounts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("amount '{0}' is not a decimal number")]
    Malformed(String),
    #[error("amount '{0}' has more than two decimal places")]
    Precision(String),
    #[error("amount '{0}' is out of range")]
    Overflow(String),
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        let well_formed = !(whole.is_empty() && fraction.is_empty())
            && whole.chars().all(|c| c.is_ascii_digit())
            && fraction.chars().all(|c| c.is_ascii_digit());
        if !well_formed {
            return Err(MoneyError::Malformed(raw.to_string()));
        }

        let fraction = fraction.trim_end_matches('0');
        if fraction.len() > 2 {
            return Err(MoneyError::Precision(raw.to_string()));
        }

        let overflow = || MoneyError::Overflow(raw.to_string());
        let whole_value: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let fraction_value: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| overflow())? * 10,
            _ => fraction.parse().map_err(|_| overflow())?,
        };

        let cents = whole_value
            .checked_mul(MINOR_UNITS)
            .and_then(|value| value.checked_add(fraction_value))
            .ok_or_else(overflow)?;

        Ok(Money(if negative { -cents } else { cents }))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        let units = MINOR_UNITS as u64;
        write!(f, "{sign}{}.{:02}", magnitude / units, magnitude % units)
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

struct MoneyVisitor;

impl<'de> Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal amount with at most two fractional digits")
    }

    fn visit_str<E>(self, value: &str) -> Result<Money, E>
    where
        E: de::Error,
    {
        value.parse().map_err(E::custom)
    }

    fn visit_i64<E>(self, value: i64) -> Result<Money, E>
    where
        E: de::Error,
    {
        value
            .checked_mul(MINOR_UNITS)
            .map(Money)
            .ok_or_else(|| E::custom(MoneyError::Overflow(value.to_string())))
    }

    fn visit_u64<E>(self, value: u64) -> Result<Money, E>
    where
        E: de::Error,
    {
        let signed = i64::try_from(value)
            .map_err(|_| E::custom(MoneyError::Overflow(value.to_string())))?;
        self.visit_i64(signed)
    }

    fn visit_f64<E>(self, value: f64) -> Result<Money, E>
    where
        E: de::Error,
    {
        if !value.is_finite() {
            return Err(E::custom(MoneyError::Malformed(value.to_string())));
        }
        // f64 Display yields the shortest round-trip representation without exponents.
        value.to_string().parse().map_err(E::custom)
    }
}
