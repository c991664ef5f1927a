//! Fixed-precision decimal used for every number that reaches the record store.
//!
//! Numbers are parsed from their JSON source text and keep their scale, so
//! `3.10` is stored and returned as `3.10`. Nothing here goes through `f64`.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

use crate::{Error, Result};

/// An exact decimal number with the scale it was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExactDecimal(Decimal);

impl ExactDecimal {
    /// Wrap an existing decimal.
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// The underlying decimal.
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl FromStr for ExactDecimal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        let parsed = if text.contains(['e', 'E']) {
            Decimal::from_scientific(text)
        } else {
            Decimal::from_str_exact(text)
        };

        parsed
            .map(Self)
            .map_err(|e| Error::validation(format!("invalid number '{}': {}", text, e)))
    }
}

impl fmt::Display for ExactDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for ExactDecimal {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

impl Serialize for ExactDecimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        // Emitted as raw number text so serde_json writes the digits untouched.
        let raw = RawValue::from_string(self.0.to_string())
            .map_err(<S::Error as serde::ser::Error>::custom)?;
        raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ExactDecimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        raw.get().parse().map_err(<D::Error as serde::de::Error>::custom)
    }
}
