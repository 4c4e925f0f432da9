//! Typed index values
//!
//! An index column holds one of five scalar kinds (plus NULL). Values carry
//! their own type so the flat `ObjectIndex[]` query path can bind them without
//! consulting metadata.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Fixed-width UTC timestamp format used for storage and display.
///
/// Fixed width keeps lexicographic order equal to chronological order.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Most digits a decimal index column can declare
pub const MAX_DECIMAL_PRECISION: u32 = 28;

/// Stored form of a decimal in a column with `scale` fractional digits:
/// rounded half-to-even, then padded to exactly `scale` digits. Negative
/// zero becomes zero.
pub fn fit_decimal(value: Decimal, scale: u32) -> Decimal {
    let mut fitted = value.round_dp(scale);
    if fitted.is_zero() {
        fitted.set_sign_positive(true);
    }
    fitted.rescale(scale);
    fitted
}

/// Declared data type of an index column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectIndexType {
    Integer,
    String,
    Binary,
    DateTime,
    Decimal,
    Unknown,
}

impl ObjectIndexType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectIndexType::Integer => "integer",
            ObjectIndexType::String => "string",
            ObjectIndexType::Binary => "binary",
            ObjectIndexType::DateTime => "datetime",
            ObjectIndexType::Decimal => "decimal",
            ObjectIndexType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ObjectIndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single index value
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    Null,
    Integer(i64),
    String(String),
    Binary(Vec<u8>),
    DateTime(DateTime<Utc>),
    Decimal(Decimal),
}

impl IndexValue {
    /// Type implied by the value; NULL carries no type.
    pub fn data_type(&self) -> ObjectIndexType {
        match self {
            IndexValue::Null => ObjectIndexType::Unknown,
            IndexValue::Integer(_) => ObjectIndexType::Integer,
            IndexValue::String(_) => ObjectIndexType::String,
            IndexValue::Binary(_) => ObjectIndexType::Binary,
            IndexValue::DateTime(_) => ObjectIndexType::DateTime,
            IndexValue::Decimal(_) => ObjectIndexType::Decimal,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, IndexValue::Null)
    }

    /// Compare two values of compatible types.
    ///
    /// Integers and decimals compare numerically with each other; any other
    /// mix (and NULL) is incomparable.
    pub fn compare(&self, other: &IndexValue) -> Option<Ordering> {
        use IndexValue::*;

        match (self, other) {
            (Integer(a), Integer(b)) => Some(a.cmp(b)),
            (Integer(a), Decimal(b)) => Some(rust_decimal::Decimal::from(*a).cmp(b)),
            (Decimal(a), Integer(b)) => Some(a.cmp(&rust_decimal::Decimal::from(*b))),
            (Decimal(a), Decimal(b)) => Some(a.cmp(b)),
            (String(a), String(b)) => Some(a.cmp(b)),
            (Binary(a), Binary(b)) => Some(a.cmp(b)),
            (DateTime(a), DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Text form used by LIKE matching. NULL never matches.
    pub fn as_like_text(&self) -> Option<String> {
        match self {
            IndexValue::Null => None,
            IndexValue::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Parse the timestamp spellings accepted in constraints.
    ///
    /// RFC 3339 first, then naive `YYYY-MM-DD[ T]HH:MM:SS[.f]` and bare dates,
    /// both interpreted as UTC.
    pub fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(dt.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
                return Some(naive.and_utc());
            }
        }
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexValue::Null => f.write_str("NULL"),
            IndexValue::Integer(v) => write!(f, "{}", v),
            IndexValue::String(v) => f.write_str(v),
            IndexValue::Binary(v) => f.write_str(&hex::encode_upper(v)),
            IndexValue::DateTime(v) => write!(f, "{}", v.format(DATETIME_FORMAT)),
            IndexValue::Decimal(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for IndexValue {
    fn from(v: i64) -> Self {
        IndexValue::Integer(v)
    }
}

impl From<i32> for IndexValue {
    fn from(v: i32) -> Self {
        IndexValue::Integer(i64::from(v))
    }
}

impl From<&str> for IndexValue {
    fn from(v: &str) -> Self {
        IndexValue::String(v.to_string())
    }
}

impl From<String> for IndexValue {
    fn from(v: String) -> Self {
        IndexValue::String(v)
    }
}

impl From<Vec<u8>> for IndexValue {
    fn from(v: Vec<u8>) -> Self {
        IndexValue::Binary(v)
    }
}

impl From<DateTime<Utc>> for IndexValue {
    fn from(v: DateTime<Utc>) -> Self {
        IndexValue::DateTime(v)
    }
}

impl From<Decimal> for IndexValue {
    fn from(v: Decimal) -> Self {
        IndexValue::Decimal(v)
    }
}

impl<T: Into<IndexValue>> From<Option<T>> for IndexValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(IndexValue::Null, Into::into)
    }
}
