//! Branch conditions.
//!
//! References are first rewritten into synthetic identifiers by
//! [`sanitize_condition`], the result is parsed by a recursive-descent parser
//! into an [`Expr`], and [`eval_condition`] evaluates it against the values
//! bound to those identifiers.

mod ast;
mod eval;
mod lexer;
mod parser;
mod sanitize;

use std::collections::HashMap;

use serde_json::Value;

use crate::bindings::Bindings;
use crate::error::ExpressionError;

pub use ast::{BinaryOp, Expr, Literal, UnaryOp};
pub use eval::{eval_condition, truthy};
pub use parser::parse_condition;
pub use sanitize::sanitize_condition;

/// Sanitize, parse and evaluate `condition`, then reduce the result to a
/// boolean by truthiness.
///
/// References to unknown components bind to `null`.
pub fn evaluate_condition<B: Bindings + ?Sized>(
  condition: &str,
  bindings: &B,
) -> Result<bool, ExpressionError> {
  let (sanitized, mapping) = sanitize_condition(condition)?;
  let expr = parse_condition(&sanitized)?;

  let bound: HashMap<String, Value> = mapping
    .into_iter()
    .map(|(ident, id)| {
      let value = bindings
        .binding(&id)
        .map(|v| v.into_owned())
        .unwrap_or(Value::Null);
      (ident, value)
    })
    .collect();

  Ok(truthy(&eval_condition(&expr, &bound)?))
}
