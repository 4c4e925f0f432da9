//! Type-checks parsed constraints against declared index metadata

use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::str::FromStr;

use super::ast::{Clause, CompareOp, ConstraintNode, ConstraintValue, Operand, Predicate};
use super::parser;
use crate::domain::{IndexValue, ObjectIndexMetadata, ObjectIndexType, OrderOptions, ID_COLUMN};
use crate::error::{IndexError, Result};

/// Parse and compile a JSON constraint
pub fn compile_json(json: &str, metadata: &[ObjectIndexMetadata]) -> Result<Predicate> {
    let node = parser::parse(json)?;
    compile(&node, metadata)
}

/// Resolve fields and coerce values of a parsed constraint
pub fn compile(node: &ConstraintNode, metadata: &[ObjectIndexMetadata]) -> Result<Predicate> {
    let clause = compile_clause(node, metadata)?;
    let next = match &node.next {
        Some((combinator, nested)) => Some((*combinator, Box::new(compile(nested, metadata)?))),
        None => None,
    };
    Ok(Predicate { clause, next })
}

/// Declared type of a constraint or order field
pub fn field_type(field: &str, metadata: &[ObjectIndexMetadata]) -> Result<ObjectIndexType> {
    if field == ID_COLUMN {
        return Ok(ObjectIndexType::Integer);
    }
    let index = metadata
        .iter()
        .find(|m| m.name == field)
        .ok_or_else(|| IndexError::validation(format!("Unknown constraint field '{}'", field)))?;
    if index.data_type == ObjectIndexType::Unknown {
        return Err(IndexError::validation(format!(
            "Index '{}' has an unknown data type",
            field
        )));
    }
    Ok(index.data_type)
}

/// Reject order fields that are neither declared nor the identity column
pub fn check_order(order: Option<&OrderOptions>, metadata: &[ObjectIndexMetadata]) -> Result<()> {
    if let Some(order) = order {
        for field in &order.fields {
            field_type(field, metadata)?;
        }
    }
    Ok(())
}

fn compile_clause(node: &ConstraintNode, metadata: &[ObjectIndexMetadata]) -> Result<Clause> {
    let data_type = field_type(&node.field, metadata)?;
    let operand = match &node.value {
        ConstraintValue::Null => Operand::None,
        ConstraintValue::Scalar(value) => Operand::Value(coerce(&node.field, value, data_type, node.operator)?),
        ConstraintValue::List(values) => Operand::List(
            values
                .iter()
                .map(|value| coerce(&node.field, value, data_type, node.operator))
                .collect::<Result<Vec<_>>>()?,
        ),
    };
    Ok(Clause::new(node.field.clone(), node.operator, operand))
}

/// Whole number inside the `i64` range; `i64::MAX as f64` rounds up to 2^63
fn is_whole_i64(f: f64) -> bool {
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

/// Convert a JSON scalar to the field's declared type.
///
/// LIKE patterns stay text whatever the column type.
fn coerce(field: &str, value: &JsonValue, data_type: ObjectIndexType, op: CompareOp) -> Result<IndexValue> {
    let mismatch = || {
        IndexError::validation(format!(
            "Value {} is not a valid {} for '{}'",
            value, data_type, field
        ))
    };

    if op.is_like() {
        return match value {
            JsonValue::String(s) => Ok(IndexValue::String(s.clone())),
            JsonValue::Number(n) => Ok(IndexValue::String(n.to_string())),
            _ => Err(mismatch()),
        };
    }

    match data_type {
        ObjectIndexType::Integer => match value {
            JsonValue::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| is_whole_i64(*f)).map(|f| f as i64))
                .map(IndexValue::Integer)
                .ok_or_else(mismatch),
            JsonValue::String(s) => s.trim().parse::<i64>().map(IndexValue::Integer).map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        ObjectIndexType::String => match value {
            JsonValue::String(s) => Ok(IndexValue::String(s.clone())),
            JsonValue::Number(n) => Ok(IndexValue::String(n.to_string())),
            _ => Err(mismatch()),
        },
        ObjectIndexType::Binary => match value {
            JsonValue::String(s) => hex::decode(s.trim())
                .map(IndexValue::Binary)
                .map_err(|e| mismatch().with_source(e)),
            _ => Err(mismatch()),
        },
        ObjectIndexType::DateTime => match value {
            JsonValue::String(s) => IndexValue::parse_datetime(s.trim())
                .map(IndexValue::DateTime)
                .ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        ObjectIndexType::Decimal => {
            let text = match value {
                JsonValue::Number(n) => n.to_string(),
                JsonValue::String(s) => s.trim().to_string(),
                _ => return Err(mismatch()),
            };
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map(IndexValue::Decimal)
                .map_err(|_| mismatch())
        }
        ObjectIndexType::Unknown => Err(mismatch()),
    }
}
