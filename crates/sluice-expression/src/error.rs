use thiserror::Error;

/// Errors raised while rendering templates or evaluating conditions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
  /// A `${` without a closing `}`.
  #[error("malformed template: unclosed reference in '{template}'")]
  MalformedTemplate { template: String },

  /// The reference could not be resolved and is not a JSON literal.
  #[error("reference not correct: '{path}'")]
  ReferenceNotCorrect { path: String },

  /// The reference text is not a valid path.
  #[error("invalid reference path '{path}': {message}")]
  InvalidPath { path: String, message: String },

  /// The condition text could not be tokenized or parsed.
  #[error("condition syntax error at offset {offset}: {message}")]
  Syntax { offset: usize, message: String },

  /// Unsupported node/operator/operand combination.
  #[error("condition error")]
  Condition,

  #[error("division by zero")]
  DivisionByZero,

  #[error("modulo by zero")]
  ModuloByZero,
}

impl ExpressionError {
  pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
    Self::Syntax {
      offset,
      message: message.into(),
    }
  }
}
