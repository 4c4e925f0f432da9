//! Row-level predicate evaluation
//!
//! Follows SQL three-valued logic: a comparison involving NULL is unknown,
//! and a row matches only when the whole predicate is true.

use regex::{Regex, RegexBuilder};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;

use super::ast::{Clause, Combinator, CompareOp, Operand, Predicate};
use crate::domain::IndexValue;
use crate::error::{IndexError, Result};

static NULL: IndexValue = IndexValue::Null;

/// LIKE pattern as executed: a pattern without `%` matches anywhere in the
/// value.
pub fn like_pattern(pattern: &str) -> Cow<'_, str> {
    if pattern.contains('%') {
        Cow::Borrowed(pattern)
    } else {
        Cow::Owned(format!("%{}%", pattern))
    }
}

/// Regex equivalent of a LIKE pattern; case folds for ASCII letters only
pub fn like_regex(pattern: &str) -> Result<Regex> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    for ch in like_pattern(pattern).chars() {
        match ch {
            '%' => source.push_str(".*"),
            '_' => source.push('.'),
            letter if letter.is_ascii_alphabetic() => {
                source.push('[');
                source.push(letter.to_ascii_lowercase());
                source.push(letter.to_ascii_uppercase());
                source.push(']');
            }
            other => source.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    source.push('$');

    RegexBuilder::new(&source)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| IndexError::validation(format!("Invalid LIKE pattern '{}': {}", pattern, e)))
}

/// A predicate prepared for repeated evaluation
pub struct RowFilter<'p> {
    predicate: &'p Predicate,
    patterns: HashMap<String, Regex>,
}

impl<'p> RowFilter<'p> {
    pub fn new(predicate: &'p Predicate) -> Result<Self> {
        let mut patterns = HashMap::new();
        for clause in predicate.clauses().filter(|c| c.op.is_like()) {
            if let Operand::Value(value) = &clause.operand {
                if let Some(text) = value.as_like_text() {
                    if !patterns.contains_key(&text) {
                        let regex = like_regex(&text)?;
                        patterns.insert(text, regex);
                    }
                }
            }
        }
        Ok(Self { predicate, patterns })
    }

    /// Whether the row selected by `column` satisfies the predicate
    pub fn matches<'r>(&self, column: impl Fn(&str) -> Option<&'r IndexValue>) -> bool {
        self.eval(self.predicate, &column) == Some(true)
    }

    fn eval<'r>(&self, predicate: &Predicate, column: &dyn Fn(&str) -> Option<&'r IndexValue>) -> Option<bool> {
        let left = self.clause(&predicate.clause, column);
        match &predicate.next {
            None => left,
            Some((Combinator::And, rest)) => {
                if left == Some(false) {
                    return Some(false);
                }
                match (left, self.eval(rest, column)) {
                    (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                }
            }
            Some((Combinator::Or, rest)) => {
                if left == Some(true) {
                    return Some(true);
                }
                match (left, self.eval(rest, column)) {
                    (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                }
            }
        }
    }

    fn clause<'r>(&self, clause: &Clause, column: &dyn Fn(&str) -> Option<&'r IndexValue>) -> Option<bool> {
        let stored = column(&clause.field).unwrap_or(&NULL);

        match clause.op {
            CompareOp::IsNull => return Some(stored.is_null()),
            CompareOp::IsNotNull => return Some(!stored.is_null()),
            _ => {}
        }
        if stored.is_null() {
            return None;
        }

        match (&clause.op, &clause.operand) {
            (CompareOp::Like | CompareOp::NotLike, Operand::Value(pattern)) => {
                let regex = self.patterns.get(&pattern.as_like_text()?)?;
                let hit = regex.is_match(&stored.as_like_text()?);
                Some(if clause.op == CompareOp::Like { hit } else { !hit })
            }
            (CompareOp::In | CompareOp::NotIn, Operand::List(values)) => {
                let mut unknown = false;
                let mut found = false;
                for value in values {
                    match stored.compare(value) {
                        Some(Ordering::Equal) => {
                            found = true;
                            break;
                        }
                        Some(_) => {}
                        None => unknown = true,
                    }
                }
                match (found, unknown, clause.op == CompareOp::In) {
                    (true, _, is_in) => Some(is_in),
                    (false, true, _) => None,
                    (false, false, is_in) => Some(!is_in),
                }
            }
            (op, Operand::Value(value)) => {
                let ordering = stored.compare(value)?;
                Some(match op {
                    CompareOp::Eq => ordering == Ordering::Equal,
                    CompareOp::Ne => ordering != Ordering::Equal,
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::Lte => ordering != Ordering::Greater,
                    CompareOp::Gt => ordering == Ordering::Greater,
                    CompareOp::Gte => ordering != Ordering::Less,
                    _ => return None,
                })
            }
            _ => None,
        }
    }
}
