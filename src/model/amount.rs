//! Amount type for handling monetary values read from spreadsheet cells.
//!
//! Cells in the bill sheets are typed by hand and formatted by the sheet, so an amount can show up
//! as `35000`, `35,000 đ` or `$1,234.50`. `Amount` wraps `Decimal` and knows how to get a number
//! out of those. A `.` is always the decimal point: a total displayed with dots between the
//! thousands (`150.000 ₫`) must be read unformatted, see `Load::Values`.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

/// Represents a sum of money.
///
/// Unlike a plain `Decimal`, an `Amount` can be parsed from formatted text. Everything that is not
/// a digit, a decimal point or a minus sign is thrown away before parsing.
///
/// # Examples
///
/// ```
/// # use lunch_ledger::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("1,234.50 đ").unwrap();
/// assert_eq!(amount.to_string(), "1,234.50");
/// ```
///
/// Text without any digits in it is not an amount:
/// ```
/// # use lunch_ledger::model::Amount;
/// assert!(Amount::parse_lenient("n/a").is_none());
/// assert!(Amount::parse_lenient("").is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount {
    value: Decimal,
}

impl Amount {
    pub const ZERO: Amount = Amount::new(Decimal::ZERO);

    pub const fn new(value: Decimal) -> Self {
        Self { value }
    }

    /// Converts a float coming from a numeric cell. Non-finite values are not amounts.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        Decimal::from_f64(value).map(|d| Self::new(d.normalize()))
    }

    /// Parses formatted text, returning `None` instead of an error when there is no number in it.
    /// This is what the aggregation paths use: an unparseable cell contributes nothing.
    pub fn parse_lenient(s: &str) -> Option<Self> {
        Amount::from_str(s).ok()
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }
}

/// An error that can occur when parsing strings into `Amount` values.
pub enum AmountError {
    /// Nothing numeric was left after stripping formatting characters.
    Empty(String),
    /// The stripped text was still not a valid decimal, e.g. `1.2.3`.
    Decimal(rust_decimal::Error),
}

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::Empty(s) => write!(f, "Empty({s:?})"),
            AmountError::Decimal(e) => Debug::fmt(e, f),
        }
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::Empty(s) => write!(f, "No numeric value found in '{s}'"),
            AmountError::Decimal(e) => Display::fmt(e, f),
        }
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AmountError::Empty(_) => None,
            AmountError::Decimal(e) => Some(e),
        }
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Keep digits, the decimal point and the sign; drop currency symbols, separators, spaces.
        let stripped: String = s
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
            .collect();

        if !stripped.chars().any(|c| c.is_ascii_digit()) {
            return Err(AmountError::Empty(s.to_string()));
        }

        let value = Decimal::from_str(&stripped).map_err(AmountError::Decimal)?;
        Ok(Amount::new(value))
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (sign, num) = if self.value.is_sign_negative() && !self.value.is_zero() {
            ("-", self.value.abs())
        } else {
            ("", self.value.abs())
        };
        write!(
            f,
            "{sign}{}",
            format_num::format_num!(",.2", num.to_f64().unwrap_or_default())
        )
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        Amount::new(self.value + rhs.value)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.value += rhs.value;
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Whole amounts go out as JSON integers (`150000`, not `150000.0`).
        let normalized = self.value.normalize();
        if normalized.scale() == 0 {
            if let Some(i) = normalized.to_i64() {
                return serializer.serialize_i64(i);
            }
        }
        serializer.serialize_f64(normalized.to_f64().unwrap_or_default())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(i) => Ok(Amount::new(Decimal::from(i))),
            Raw::Float(f) => Amount::from_f64(f)
                .ok_or_else(|| serde::de::Error::custom(format!("'{f}' is not an amount"))),
            Raw::Text(s) => Amount::from_str(&s).map_err(serde::de::Error::custom),
        }
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}
