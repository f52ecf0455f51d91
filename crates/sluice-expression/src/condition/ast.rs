use std::fmt;

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
  Int(i64),
  Float(f64),
  Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  Not,
  Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Or,
  And,
  Eq,
  Ne,
  Lt,
  Gt,
  Le,
  Ge,
  Add,
  Sub,
  Mul,
  Div,
  Rem,
}

impl BinaryOp {
  /// Binding power; higher binds tighter.
  pub(crate) fn precedence(self) -> u8 {
    match self {
      BinaryOp::Or => 1,
      BinaryOp::And => 2,
      BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => 3,
      BinaryOp::Add | BinaryOp::Sub => 4,
      BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 5,
    }
  }
}

impl fmt::Display for BinaryOp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let symbol = match self {
      BinaryOp::Or => "||",
      BinaryOp::And => "&&",
      BinaryOp::Eq => "==",
      BinaryOp::Ne => "!=",
      BinaryOp::Lt => "<",
      BinaryOp::Gt => ">",
      BinaryOp::Le => "<=",
      BinaryOp::Ge => ">=",
      BinaryOp::Add => "+",
      BinaryOp::Sub => "-",
      BinaryOp::Mul => "*",
      BinaryOp::Div => "/",
      BinaryOp::Rem => "%",
    };
    f.write_str(symbol)
  }
}

/// Condition syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Unary {
    op: UnaryOp,
    expr: Box<Expr>,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  Paren(Box<Expr>),
  /// `expr.field`
  Selector {
    expr: Box<Expr>,
    field: String,
  },
  /// `expr[index]`
  Index {
    expr: Box<Expr>,
    index: Box<Expr>,
  },
  Literal(Literal),
  Ident(String),
}
