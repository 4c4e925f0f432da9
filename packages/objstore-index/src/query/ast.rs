use serde_json::Value as JsonValue;
use std::fmt;

use crate::domain::{FindLogic, FindOperator, FindOptions, IndexValue, ObjectIndex};
use crate::error::{IndexError, Result};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl CompareOp {
    /// Operator token of the JSON grammar (`"Op"` key)
    pub fn from_token(token: &str) -> Option<Self> {
        let normalized = token
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        match normalized.as_str() {
            "=" => Some(Self::Eq),
            "<>" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Lte),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Gte),
            "LIKE" => Some(Self::Like),
            "NOT LIKE" => Some(Self::NotLike),
            "IN" => Some(Self::In),
            "NOT IN" => Some(Self::NotIn),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }

    pub fn takes_list(&self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    pub fn is_like(&self) -> bool {
        matches!(self, Self::Like | Self::NotLike)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl From<FindLogic> for Combinator {
    fn from(logic: FindLogic) -> Self {
        match logic {
            FindLogic::And => Self::And,
            FindLogic::Or => Self::Or,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Parsed constraint (untyped)
// ═══════════════════════════════════════════════════════════════════════════

/// Right-hand side of a parsed clause, still in JSON form
#[derive(Clone, Debug, PartialEq)]
pub enum ConstraintValue {
    Null,
    Scalar(JsonValue),
    List(Vec<JsonValue>),
}

/// One clause of the JSON grammar, optionally chained to a nested clause.
///
/// The combinator sits on the boundary between this node and its nested
/// child: `a AND (b OR (c))`.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintNode {
    pub field: String,
    pub operator: CompareOp,
    pub value: ConstraintValue,
    pub next: Option<(Combinator, Box<ConstraintNode>)>,
}

impl ConstraintNode {
    pub fn depth(&self) -> usize {
        1 + self.next.as_ref().map_or(0, |(_, node)| node.depth())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Compiled predicate (typed)
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    None,
    Value(IndexValue),
    List(Vec<IndexValue>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Clause {
    pub field: String,
    pub op: CompareOp,
    pub operand: Operand,
}

impl Clause {
    pub fn new(field: impl Into<String>, op: CompareOp, operand: Operand) -> Self {
        Self {
            field: field.into(),
            op,
            operand,
        }
    }

    /// Clause of the flat overload: `operator` applied to one `(name, value)`
    fn from_index(operator: FindOperator, index: &ObjectIndex) -> Result<Self> {
        let value = index.value.clone();
        let (op, operand) = match operator {
            FindOperator::IsNull => (CompareOp::IsNull, Operand::None),
            FindOperator::Equals if value.is_null() => (CompareOp::IsNull, Operand::None),
            FindOperator::NotEquals if value.is_null() => (CompareOp::IsNotNull, Operand::None),
            _ if value.is_null() => {
                return Err(IndexError::validation(format!(
                    "NULL value for '{}' cannot be used with {:?}",
                    index.name, operator
                )))
            }
            FindOperator::Equals => (CompareOp::Eq, Operand::Value(value)),
            FindOperator::NotEquals => (CompareOp::Ne, Operand::Value(value)),
            FindOperator::Like => (CompareOp::Like, Operand::Value(value)),
            FindOperator::NotLike => (CompareOp::NotLike, Operand::Value(value)),
            FindOperator::In => (CompareOp::In, Operand::List(vec![value])),
            FindOperator::NotIn => (CompareOp::NotIn, Operand::List(vec![value])),
            FindOperator::LessThan => (CompareOp::Lt, Operand::Value(value)),
            FindOperator::LessOrEqual => (CompareOp::Lte, Operand::Value(value)),
            FindOperator::GreaterThan => (CompareOp::Gt, Operand::Value(value)),
            FindOperator::GreaterOrEqual => (CompareOp::Gte, Operand::Value(value)),
        };
        Ok(Self::new(index.name.clone(), op, operand))
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Operand::None => write!(f, "{} {}", self.field, self.op.as_sql()),
            Operand::Value(v) => write!(f, "{} {} {}", self.field, self.op.as_sql(), v),
            Operand::List(values) => {
                let items: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "{} {} ({})", self.field, self.op.as_sql(), items.join(", "))
            }
        }
    }
}

/// Typed predicate: a clause optionally combined with a nested predicate
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    pub clause: Clause,
    pub next: Option<(Combinator, Box<Predicate>)>,
}

impl Predicate {
    pub fn single(clause: Clause) -> Self {
        Self { clause, next: None }
    }

    pub fn chain(clause: Clause, combinator: Combinator, rest: Predicate) -> Self {
        Self {
            clause,
            next: Some((combinator, Box::new(rest))),
        }
    }

    /// Flat uniform-operator predicate; `None` when there are no constraints
    pub fn from_indexes(options: &FindOptions, indexes: &[ObjectIndex]) -> Result<Option<Self>> {
        let combinator = Combinator::from(options.logic);
        let mut predicate: Option<Self> = None;
        for index in indexes.iter().rev() {
            let clause = Clause::from_index(options.operator, index)?;
            predicate = Some(match predicate {
                Some(rest) => Self::chain(clause, combinator, rest),
                None => Self::single(clause),
            });
        }
        Ok(predicate)
    }

    /// Clauses in left-to-right order
    pub fn clauses(&self) -> impl Iterator<Item = &Clause> {
        let mut current = Some(self);
        std::iter::from_fn(move || {
            let predicate = current?;
            current = predicate.next.as_ref().map(|(_, rest)| rest.as_ref());
            Some(&predicate.clause)
        })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clause)?;
        if let Some((combinator, rest)) = &self.next {
            write!(f, " {} ({})", combinator.as_sql(), rest)?;
        }
        Ok(())
    }
}
