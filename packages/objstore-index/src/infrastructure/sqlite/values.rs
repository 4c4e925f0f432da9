//! IndexValue <-> SQLite value conversion
//!
//! Decimals are stored as text: a fixed-width key whose byte order is the
//! numeric order, `:`, then the display form at the column scale. Equality
//! and range predicates compare exactly; LIKE reads the display part.

use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use crate::domain::{fit_decimal, IndexValue, ObjectIndexType, DATETIME_FORMAT};
use crate::error::{IndexError, Result};

const DECIMAL_INT_DIGITS: usize = 29;
const DECIMAL_FRAC_DIGITS: usize = 28;

/// Sign marker plus integer and fractional digits of a stored decimal key
pub const DECIMAL_KEY_WIDTH: usize = 1 + DECIMAL_INT_DIGITS + DECIMAL_FRAC_DIGITS;

/// Stored text of a decimal.
///
/// `P` (or `N`) then 29 integer and 28 fractional digits; negative digits are
/// nine's complemented so that larger magnitudes sort first.
pub fn encode_decimal(value: &Decimal) -> String {
    let mut display = *value;
    if display.is_zero() {
        display.set_sign_positive(true);
    }
    let negative = display.is_sign_negative();

    let scale = display.scale();
    let mantissa = display.mantissa().unsigned_abs();
    let divisor = 10u128.pow(scale);
    let mut digits = format!("{:0width$}", mantissa / divisor, width = DECIMAL_INT_DIGITS);
    if scale > 0 {
        digits.push_str(&format!("{:0width$}", mantissa % divisor, width = scale as usize));
    }
    while digits.len() < DECIMAL_INT_DIGITS + DECIMAL_FRAC_DIGITS {
        digits.push('0');
    }

    let key: String = if negative {
        std::iter::once('N')
            .chain(digits.bytes().map(|d| char::from(b'9' - (d - b'0'))))
            .collect()
    } else {
        format!("P{}", digits)
    };
    format!("{}:{}", key, display)
}

/// Decimal from its stored text; plain decimal text is accepted too
pub fn decode_decimal(text: &str) -> Option<Decimal> {
    match text.split_once(':') {
        Some((key, display)) if key.len() == DECIMAL_KEY_WIDTH => Decimal::from_str(display).ok(),
        _ => Decimal::from_str(text).ok(),
    }
}

impl ToSql for IndexValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            IndexValue::Null => ToSqlOutput::Owned(Value::Null),
            IndexValue::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            IndexValue::String(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            IndexValue::Binary(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
            IndexValue::DateTime(v) => {
                ToSqlOutput::Owned(Value::Text(v.format(DATETIME_FORMAT).to_string()))
            }
            IndexValue::Decimal(v) => ToSqlOutput::Owned(Value::Text(encode_decimal(v))),
        })
    }
}

/// Scale of a `DECIMAL(p,s)` declared column type
fn declared_scale(declared: &str) -> Option<u32> {
    let upper = declared.trim().to_ascii_uppercase();
    let args = upper.strip_prefix("DECIMAL(")?.strip_suffix(')')?;
    let (_, scale) = args.split_once(',')?;
    scale.trim().parse().ok()
}

/// Columns of a provisioned table, as reported by `pragma_table_info`
#[derive(Debug, Default)]
pub struct TableColumns {
    names: HashSet<String>,
    decimal_scales: HashMap<String, u32>,
}

impl TableColumns {
    /// From `(name, declared type)` pairs
    pub fn new(columns: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut table = Self::default();
        for (name, declared) in columns {
            if let Some(scale) = declared_scale(&declared) {
                table.decimal_scales.insert(name.clone(), scale);
            }
            table.names.insert(name);
        }
        table
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn decimal_scale(&self, name: &str) -> Option<u32> {
        self.decimal_scales.get(name).copied()
    }

    /// Value as written to `column`: numbers in a decimal column are fitted
    /// to its scale
    pub fn stored(&self, column: &str, value: &IndexValue) -> IndexValue {
        match (self.decimal_scale(column), value) {
            (Some(scale), IndexValue::Decimal(d)) => IndexValue::Decimal(fit_decimal(*d, scale)),
            (Some(scale), IndexValue::Integer(i)) => {
                IndexValue::Decimal(fit_decimal(Decimal::from(*i), scale))
            }
            _ => value.clone(),
        }
    }

    /// Value as compared against `column`.
    ///
    /// Never rounded: an operand finer than the column scale cannot equal a
    /// stored value. Exact operands take the column scale so the display part
    /// of the stored text matches too.
    pub fn operand(&self, column: &str, value: &IndexValue) -> IndexValue {
        let decimal = match (self.decimal_scale(column), value) {
            (Some(scale), IndexValue::Decimal(d)) => Some((scale, *d)),
            (Some(scale), IndexValue::Integer(i)) => Some((scale, Decimal::from(*i))),
            _ => None,
        };
        match decimal {
            Some((scale, d)) => {
                let fitted = fit_decimal(d, scale);
                IndexValue::Decimal(if fitted == d { fitted } else { d })
            }
            None => value.clone(),
        }
    }
}

/// Column of a result row: declared type and decimal scale
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: ObjectIndexType,
    pub scale: u32,
}

fn mismatch(column: &ColumnSpec, raw: ValueRef<'_>) -> IndexError {
    IndexError::backing_store(format!(
        "Column '{}' holds {:?}, expected {}",
        column.name,
        raw.data_type(),
        column.data_type
    ))
}

fn text<'a>(column: &ColumnSpec, bytes: &'a [u8]) -> Result<&'a str> {
    std::str::from_utf8(bytes).map_err(|e| {
        IndexError::backing_store(format!("Column '{}' holds invalid UTF-8", column.name)).with_source(e)
    })
}

/// Convert a stored value back to its declared type
pub fn read_value(column: &ColumnSpec, raw: ValueRef<'_>) -> Result<IndexValue> {
    if let ValueRef::Null = raw {
        return Ok(IndexValue::Null);
    }

    match column.data_type {
        ObjectIndexType::Integer => match raw {
            ValueRef::Integer(v) => Ok(IndexValue::Integer(v)),
            ValueRef::Real(v) => Ok(IndexValue::Integer(v as i64)),
            _ => Err(mismatch(column, raw)),
        },
        ObjectIndexType::String => match raw {
            ValueRef::Text(bytes) => Ok(IndexValue::String(text(column, bytes)?.to_string())),
            ValueRef::Integer(v) => Ok(IndexValue::String(v.to_string())),
            ValueRef::Real(v) => Ok(IndexValue::String(v.to_string())),
            _ => Err(mismatch(column, raw)),
        },
        ObjectIndexType::Binary => match raw {
            ValueRef::Blob(bytes) | ValueRef::Text(bytes) => Ok(IndexValue::Binary(bytes.to_vec())),
            _ => Err(mismatch(column, raw)),
        },
        ObjectIndexType::DateTime => match raw {
            ValueRef::Text(bytes) => IndexValue::parse_datetime(text(column, bytes)?)
                .map(IndexValue::DateTime)
                .ok_or_else(|| mismatch(column, raw)),
            _ => Err(mismatch(column, raw)),
        },
        ObjectIndexType::Decimal => {
            let decimal = match raw {
                ValueRef::Text(bytes) => decode_decimal(text(column, bytes)?),
                ValueRef::Integer(v) => Some(Decimal::from(v)),
                ValueRef::Real(v) => Decimal::from_f64(v),
                _ => None,
            };
            decimal
                .map(|d| IndexValue::Decimal(fit_decimal(d, column.scale)))
                .ok_or_else(|| mismatch(column, raw))
        }
        ObjectIndexType::Unknown => Err(mismatch(column, raw)),
    }
}
