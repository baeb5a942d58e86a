// 💰 Amount - exact money values
//
// Held as an integer count of hundredths so sums never drift. Parsed from
// decimal text only: JSON numbers are read through their literal text, never
// through a float.

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

/// Hundredths per unit
pub const SCALE: i64 = 100;
const FRACTION_DIGITS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountError {
    Invalid,
    TooPrecise,
    TooLarge,
}

impl AmountError {
    pub fn message(&self) -> &'static str {
        match self {
            AmountError::Invalid => "is not a number",
            AmountError::TooPrecise => "must have at most 2 decimal places",
            AmountError::TooLarge => "is too large",
        }
    }
}

impl fmt::Display for AmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for AmountError {}

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_cents(cents: i64) -> Self {
        Amount(cents)
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }
}

fn accumulate(value: i64, digit: u8) -> Result<i64, AmountError> {
    value
        .checked_mul(10)
        .and_then(|v| v.checked_add(i64::from(digit - b'0')))
        .ok_or(AmountError::TooLarge)
}

impl FromStr for Amount {
    type Err = AmountError;

    /// `"12"`, `"12.5"`, `"-0.01"`, `".75"`. Trailing zeros beyond the second
    /// decimal are fine; any other extra precision is rejected.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        let (negative, digits) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));

        let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
            return Err(AmountError::Invalid);
        }

        let fraction = fraction.trim_end_matches('0');
        if fraction.len() > FRACTION_DIGITS {
            return Err(AmountError::TooPrecise);
        }

        let mut hundredths = whole.bytes().try_fold(0i64, accumulate)?;
        let mut padded = fraction.bytes().chain(std::iter::repeat(b'0'));
        for _ in 0..FRACTION_DIGITS {
            hundredths = accumulate(hundredths, padded.next().unwrap_or(b'0'))?;
        }

        Ok(Amount(if negative { -hundredths } else { hundredths }))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = SCALE.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / scale, abs % scale)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, Add::add)
    }
}

// Serialized as a decimal string ("42.50") so clients never see a float
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => s.parse().map_err(de::Error::custom),
            serde_json::Value::Number(n) => n.to_string().parse().map_err(de::Error::custom),
            other => Err(de::Error::custom(format!("expected an amount, got {}", other))),
        }
    }
}

impl ToSql for Amount {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for Amount {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Amount)
    }
}
