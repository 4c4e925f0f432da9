//! JSON constraint grammar
//!
//! ```text
//! constraint := { <field>: scalar | null | [scalar, ..],
//!                 "Op": "=" | "<>" | "<" | "<=" | ">" | ">=" | "LIKE" | "NOT LIKE" | "IN" | "NOT IN",
//!                 [ "AND": constraint | "OR": constraint ] }
//! ```
//!
//! Exactly one field key per object. Arrays go with `IN`/`NOT IN` only and
//! those operators require one. `null` is legal with `=` (IS NULL) and `<>`
//! (IS NOT NULL). The reserved keys match case-insensitively.

use serde_json::{Map, Value as JsonValue};

use super::ast::{Combinator, CompareOp, ConstraintNode, ConstraintValue};
use crate::error::{IndexError, Result};

const OP_KEY: &str = "Op";

/// Parse a JSON constraint into its clause chain
pub fn parse(json: &str) -> Result<ConstraintNode> {
    let root: JsonValue = serde_json::from_str(json).map_err(|e| {
        IndexError::validation(format!("Malformed constraint JSON: {}", e)).with_source(e)
    })?;
    parse_node(&root)
}

fn parse_node(value: &JsonValue) -> Result<ConstraintNode> {
    let object = value
        .as_object()
        .ok_or_else(|| IndexError::validation(format!("Constraint must be an object, got {}", value)))?;
    let parts = split_keys(object)?;

    let (field, raw) = parts
        .field
        .ok_or_else(|| IndexError::validation("Constraint has no field"))?;
    let op_token = parts
        .op
        .ok_or_else(|| IndexError::validation(format!("Constraint on '{}' has no \"Op\"", field)))?;
    let op_text = op_token
        .as_str()
        .ok_or_else(|| IndexError::validation(format!("\"Op\" must be a string, got {}", op_token)))?;
    let op = CompareOp::from_token(op_text)
        .ok_or_else(|| IndexError::validation(format!("Unknown operator '{}'", op_text)))?;

    let (operator, value) = parse_operand(field, op, raw)?;

    let next = match parts.chain {
        Some((combinator, nested)) => Some((combinator, Box::new(parse_node(nested)?))),
        None => None,
    };

    Ok(ConstraintNode {
        field: field.clone(),
        operator,
        value,
        next,
    })
}

struct Keys<'a> {
    field: Option<(&'a String, &'a JsonValue)>,
    op: Option<&'a JsonValue>,
    chain: Option<(Combinator, &'a JsonValue)>,
}

fn split_keys(object: &Map<String, JsonValue>) -> Result<Keys<'_>> {
    let mut keys = Keys {
        field: None,
        op: None,
        chain: None,
    };

    for (key, value) in object {
        let combinator = if key.eq_ignore_ascii_case("AND") {
            Some(Combinator::And)
        } else if key.eq_ignore_ascii_case("OR") {
            Some(Combinator::Or)
        } else {
            None
        };

        if let Some(combinator) = combinator {
            if keys.chain.is_some() {
                return Err(IndexError::validation(
                    "Constraint may hold only one of \"AND\" / \"OR\"",
                ));
            }
            keys.chain = Some((combinator, value));
        } else if key.eq_ignore_ascii_case(OP_KEY) {
            if keys.op.is_some() {
                return Err(IndexError::validation("Constraint has more than one \"Op\""));
            }
            keys.op = Some(value);
        } else {
            if let Some((existing, _)) = keys.field {
                return Err(IndexError::validation(format!(
                    "Constraint must name exactly one field, found '{}' and '{}'",
                    existing, key
                )));
            }
            keys.field = Some((key, value));
        }
    }
    Ok(keys)
}

fn parse_operand(field: &str, op: CompareOp, raw: &JsonValue) -> Result<(CompareOp, ConstraintValue)> {
    match raw {
        JsonValue::Null => match op {
            CompareOp::Eq => Ok((CompareOp::IsNull, ConstraintValue::Null)),
            CompareOp::Ne => Ok((CompareOp::IsNotNull, ConstraintValue::Null)),
            _ => Err(IndexError::validation(format!(
                "null value for '{}' requires \"=\" or \"<>\", got {}",
                field,
                op.as_sql()
            ))),
        },
        JsonValue::Array(items) => {
            if !op.takes_list() {
                return Err(IndexError::validation(format!(
                    "Array value for '{}' requires IN or NOT IN, got {}",
                    field,
                    op.as_sql()
                )));
            }
            if items.is_empty() {
                return Err(IndexError::validation(format!("Empty {} list for '{}'", op.as_sql(), field)));
            }
            if let Some(bad) = items.iter().find(|item| !is_scalar(item)) {
                return Err(IndexError::validation(format!(
                    "{} list for '{}' holds a non-scalar value {}",
                    op.as_sql(),
                    field,
                    bad
                )));
            }
            Ok((op, ConstraintValue::List(items.clone())))
        }
        JsonValue::Object(_) => Err(IndexError::validation(format!(
            "Value for '{}' must be a scalar, null or array",
            field
        ))),
        scalar => {
            if op.takes_list() {
                return Err(IndexError::validation(format!(
                    "{} on '{}' requires an array value",
                    op.as_sql(),
                    field
                )));
            }
            Ok((op, ConstraintValue::Scalar(scalar.clone())))
        }
    }
}

fn is_scalar(value: &JsonValue) -> bool {
    matches!(value, JsonValue::Bool(_) | JsonValue::Number(_) | JsonValue::String(_))
}
