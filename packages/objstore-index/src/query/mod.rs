//! Constraint language
//!
//! ```text
//! JSON ──parse──▶ ConstraintNode ──compile(metadata)──▶ Predicate ──▶ provider
//! ObjectIndex[] + FindOptions ──Predicate::from_indexes──▶ Predicate
//! ```

pub mod ast;
pub mod compiler;
pub mod eval;
pub mod parser;

pub use ast::{Clause, Combinator, CompareOp, ConstraintNode, ConstraintValue, Operand, Predicate};
pub use compiler::{check_order, compile, compile_json, field_type};
pub use eval::{like_pattern, like_regex, RowFilter};
pub use parser::parse;
