//! SQL text for the SQLite index provider
//!
//! Identifiers are always double-quoted; values are always bound.

use super::values::{TableColumns, DECIMAL_KEY_WIDTH};
use crate::domain::{IndexValue, ObjectIndexMetadata, ObjectIndexType, OrderOptions, ID_COLUMN};
use crate::query::{like_pattern, Operand, Predicate};

/// `"name"` with embedded quotes doubled
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column type for a declared index
pub fn column_type(index: &ObjectIndexMetadata) -> String {
    match index.data_type {
        ObjectIndexType::Integer => "INTEGER".to_string(),
        ObjectIndexType::String => format!("VARCHAR({})", index.precision),
        ObjectIndexType::Binary => "BLOB".to_string(),
        ObjectIndexType::DateTime => "TEXT".to_string(),
        ObjectIndexType::Decimal => format!("DECIMAL({},{})", index.precision, index.scale),
        ObjectIndexType::Unknown => "BLOB".to_string(),
    }
}

pub fn column_def(index: &ObjectIndexMetadata) -> String {
    format!(
        "{} {}{}",
        quote_ident(&index.name),
        column_type(index),
        if index.nullable { "" } else { " NOT NULL" }
    )
}

pub fn create_table(table: &str, indexes: &[ObjectIndexMetadata]) -> String {
    let mut columns = vec![format!("{} INTEGER PRIMARY KEY", quote_ident(ID_COLUMN))];
    columns.extend(indexes.iter().map(column_def));
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(table),
        columns.join(", ")
    )
}

pub fn create_index(table: &str, column: &str) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
        quote_ident(&format!("IDX_{}_{}", table, column)),
        quote_ident(table),
        quote_ident(column)
    )
}

/// Single-row merge keyed by the identity column
pub fn upsert(table: &str, columns: &[&str]) -> String {
    let mut names = vec![quote_ident(ID_COLUMN)];
    names.extend(columns.iter().map(|c| quote_ident(c)));
    let placeholders = vec!["?"; names.len()].join(", ");

    let action = if columns.is_empty() {
        "NOTHING".to_string()
    } else {
        let sets: Vec<String> = columns
            .iter()
            .map(|c| {
                let col = quote_ident(c);
                format!("{} = excluded.{}", col, col)
            })
            .collect();
        format!("UPDATE SET {}", sets.join(", "))
    };

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO {}",
        quote_ident(table),
        names.join(", "),
        placeholders,
        quote_ident(ID_COLUMN),
        action
    )
}

pub fn delete_ids(table: &str, count: usize) -> String {
    format!(
        "DELETE FROM {} WHERE {} IN ({})",
        quote_ident(table),
        quote_ident(ID_COLUMN),
        vec!["?"; count].join(", ")
    )
}

/// `WHERE` body for a predicate, pushing bound values onto `params`.
///
/// Each combinator wraps the rest of the chain in parentheses, keeping
/// left-to-right grouping. LIKE on a decimal column matches the display
/// part of the stored text.
pub fn where_clause(predicate: &Predicate, columns: &TableColumns, params: &mut Vec<IndexValue>) -> String {
    let clause = &predicate.clause;
    let column = quote_ident(&clause.field);
    let mut sql = match &clause.operand {
        Operand::None => format!("{} {}", column, clause.op.as_sql()),
        Operand::Value(value) if clause.op.is_like() => {
            let text = value.as_like_text().unwrap_or_default();
            params.push(IndexValue::String(like_pattern(&text).into_owned()));
            let target = if columns.decimal_scale(&clause.field).is_some() {
                format!("substr({}, {})", column, DECIMAL_KEY_WIDTH + 2)
            } else {
                column
            };
            format!("{} {} ?", target, clause.op.as_sql())
        }
        Operand::Value(value) => {
            params.push(columns.operand(&clause.field, value));
            format!("{} {} ?", column, clause.op.as_sql())
        }
        Operand::List(values) => {
            params.extend(values.iter().map(|v| columns.operand(&clause.field, v)));
            format!(
                "{} {} ({})",
                column,
                clause.op.as_sql(),
                vec!["?"; values.len()].join(", ")
            )
        }
    };

    if let Some((combinator, rest)) = &predicate.next {
        sql = format!("{} {} ({})", sql, combinator.as_sql(), where_clause(rest, columns, params));
    }
    sql
}

/// `ORDER BY` body; identity column when no order is given
pub fn order_by(order: Option<&OrderOptions>) -> String {
    match order {
        Some(order) if !order.fields.is_empty() => {
            let direction = if order.descending { "DESC" } else { "ASC" };
            order
                .fields
                .iter()
                .map(|f| format!("{} {}", quote_ident(f), direction))
                .collect::<Vec<_>>()
                .join(", ")
        }
        _ => format!("{} ASC", quote_ident(ID_COLUMN)),
    }
}

/// `SELECT <columns> FROM <table> [WHERE ..] ORDER BY ..`
pub fn select(
    table: &str,
    table_columns: &TableColumns,
    fields: &[String],
    predicate: Option<&Predicate>,
    order: Option<&OrderOptions>,
    params: &mut Vec<IndexValue>,
) -> String {
    let fields: Vec<String> = fields.iter().map(|c| quote_ident(c)).collect();
    let mut sql = format!("SELECT {} FROM {}", fields.join(", "), quote_ident(table));
    if let Some(predicate) = predicate {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clause(predicate, table_columns, params));
    }
    sql.push_str(" ORDER BY ");
    sql.push_str(&order_by(order));
    sql
}

pub fn count(
    table: &str,
    table_columns: &TableColumns,
    predicate: Option<&Predicate>,
    params: &mut Vec<IndexValue>,
) -> String {
    let mut sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
    if let Some(predicate) = predicate {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clause(predicate, table_columns, params));
    }
    sql
}
