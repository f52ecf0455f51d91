use std::collections::HashMap;

use serde_json::{Number, Value};

use crate::error::ExpressionError;

use super::ast::{BinaryOp, Expr, Literal, UnaryOp};

/// Numeric view of a JSON number.
#[derive(Debug, Clone, Copy)]
enum Num {
  Int(i64),
  Float(f64),
}

impl Num {
  fn of(value: &Value) -> Option<Self> {
    let Value::Number(n) = value else {
      return None;
    };
    match n.as_i64() {
      Some(i) => Some(Num::Int(i)),
      None => n.as_f64().map(Num::Float),
    }
  }

  fn as_f64(self) -> f64 {
    match self {
      Num::Int(i) => i as f64,
      Num::Float(f) => f,
    }
  }
}

fn float(value: f64) -> Result<Value, ExpressionError> {
  Number::from_f64(value)
    .map(Value::Number)
    .ok_or(ExpressionError::Condition)
}

/// Truthiness: booleans as-is, numbers when non-zero, strings, arrays and
/// objects when non-empty, `null` is false.
pub fn truthy(value: &Value) -> bool {
  match value {
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    Value::String(s) => !s.is_empty(),
    Value::Array(items) => !items.is_empty(),
    Value::Object(map) => !map.is_empty(),
    Value::Null => false,
  }
}

/// Evaluate `expr` with identifiers looked up in `bound`.
///
/// `true`, `false`, `null` and `nil` are reserved; any other unbound
/// identifier evaluates to `null`.
pub fn eval_condition(expr: &Expr, bound: &HashMap<String, Value>) -> Result<Value, ExpressionError> {
  match expr {
    Expr::Literal(Literal::Int(i)) => Ok(Value::from(*i)),
    Expr::Literal(Literal::Float(f)) => float(*f),
    Expr::Literal(Literal::Str(s)) => Ok(Value::String(s.clone())),
    Expr::Ident(name) => Ok(match name.as_str() {
      "true" => Value::Bool(true),
      "false" => Value::Bool(false),
      "null" | "nil" => Value::Null,
      _ => bound.get(name).cloned().unwrap_or(Value::Null),
    }),
    Expr::Paren(inner) => eval_condition(inner, bound),
    Expr::Unary { op, expr } => eval_unary(*op, eval_condition(expr, bound)?),
    Expr::Binary { op, lhs, rhs } => {
      let lhs = eval_condition(lhs, bound)?;
      match op {
        BinaryOp::And if !truthy(&lhs) => Ok(Value::Bool(false)),
        BinaryOp::Or if truthy(&lhs) => Ok(Value::Bool(true)),
        BinaryOp::And | BinaryOp::Or => Ok(Value::Bool(truthy(&eval_condition(rhs, bound)?))),
        _ => eval_binary(*op, lhs, eval_condition(rhs, bound)?),
      }
    }
    Expr::Selector { expr, field } => Ok(match eval_condition(expr, bound)? {
      Value::Object(mut map) => map.remove(field).unwrap_or(Value::Null),
      _ => Value::Null,
    }),
    Expr::Index { expr, index } => {
      let base = eval_condition(expr, bound)?;
      let index = eval_condition(index, bound)?;
      match (base, index) {
        (Value::Array(mut items), Value::Number(n)) => {
          let at = n
            .as_u64()
            .and_then(|i| usize::try_from(i).ok())
            .ok_or(ExpressionError::Condition)?;
          if at >= items.len() {
            return Err(ExpressionError::Condition);
          }
          Ok(items.swap_remove(at))
        }
        (Value::Object(mut map), Value::String(key)) => Ok(map.remove(&key).unwrap_or(Value::Null)),
        _ => Err(ExpressionError::Condition),
      }
    }
  }
}

fn eval_unary(op: UnaryOp, value: Value) -> Result<Value, ExpressionError> {
  match (op, &value) {
    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
    (UnaryOp::Neg, _) => match Num::of(&value) {
      Some(Num::Int(i)) => i.checked_neg().map(Value::from).ok_or(ExpressionError::Condition),
      Some(Num::Float(f)) => float(-f),
      None => Err(ExpressionError::Condition),
    },
    _ => Err(ExpressionError::Condition),
  }
}

fn eval_binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, ExpressionError> {
  if let (Some(a), Some(b)) = (Num::of(&lhs), Num::of(&rhs)) {
    return eval_numeric(op, a, b);
  }

  match (op, lhs, rhs) {
    (BinaryOp::Eq, lhs, rhs) => Ok(Value::Bool(lhs == rhs)),
    (BinaryOp::Ne, lhs, rhs) => Ok(Value::Bool(lhs != rhs)),
    (BinaryOp::Add, Value::String(mut a), Value::String(b)) => {
      a.push_str(&b);
      Ok(Value::String(a))
    }
    _ => Err(ExpressionError::Condition),
  }
}

fn eval_numeric(op: BinaryOp, a: Num, b: Num) -> Result<Value, ExpressionError> {
  if let (Num::Int(x), Num::Int(y)) = (a, b) {
    let checked = match op {
      BinaryOp::Add => x.checked_add(y),
      BinaryOp::Sub => x.checked_sub(y),
      BinaryOp::Mul => x.checked_mul(y),
      BinaryOp::Div if y == 0 => return Err(ExpressionError::DivisionByZero),
      BinaryOp::Div => x.checked_div(y),
      BinaryOp::Rem if y == 0 => return Err(ExpressionError::ModuloByZero),
      BinaryOp::Rem => x.checked_rem(y),
      _ => return Ok(Value::Bool(compare(op, x.cmp(&y)))),
    };
    return checked.map(Value::from).ok_or(ExpressionError::Condition);
  }

  let (x, y) = (a.as_f64(), b.as_f64());
  match op {
    BinaryOp::Add => float(x + y),
    BinaryOp::Sub => float(x - y),
    BinaryOp::Mul => float(x * y),
    BinaryOp::Div if y == 0.0 => Err(ExpressionError::DivisionByZero),
    BinaryOp::Div => float(x / y),
    BinaryOp::Rem if y == 0.0 => Err(ExpressionError::ModuloByZero),
    BinaryOp::Rem => float(x % y),
    _ => x
      .partial_cmp(&y)
      .map(|ordering| Value::Bool(compare(op, ordering)))
      .ok_or(ExpressionError::Condition),
  }
}

fn compare(op: BinaryOp, ordering: std::cmp::Ordering) -> bool {
  use std::cmp::Ordering::*;
  match op {
    BinaryOp::Eq => ordering == Equal,
    BinaryOp::Ne => ordering != Equal,
    BinaryOp::Lt => ordering == Less,
    BinaryOp::Gt => ordering == Greater,
    BinaryOp::Le => ordering != Greater,
    BinaryOp::Ge => ordering != Less,
    _ => false,
  }
}
