use crate::error::ExpressionError;

use super::ast::{BinaryOp, Expr, Literal, UnaryOp};
use super::lexer::{Spanned, Token, tokenize};

/// Parse a sanitized condition into an expression tree.
pub fn parse_condition(source: &str) -> Result<Expr, ExpressionError> {
  let tokens = tokenize(source)?;
  if tokens.is_empty() {
    return Err(ExpressionError::syntax(0, "empty condition"));
  }

  let mut parser = Parser {
    tokens,
    pos: 0,
    end: source.len(),
  };
  let expr = parser.parse_binary(1)?;
  if let Some((token, at)) = parser.tokens.get(parser.pos) {
    return Err(ExpressionError::syntax(
      *at,
      format!("unexpected token {:?}", token),
    ));
  }
  Ok(expr)
}

struct Parser {
  tokens: Vec<Spanned>,
  pos: usize,
  end: usize,
}

impl Parser {
  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos).map(|(token, _)| token)
  }

  fn offset(&self) -> usize {
    self.tokens.get(self.pos).map_or(self.end, |(_, at)| *at)
  }

  fn next(&mut self) -> Option<Token> {
    let token = self.tokens.get(self.pos).map(|(token, _)| token.clone());
    self.pos += 1;
    token
  }

  fn expect(&mut self, expected: Token, what: &str) -> Result<(), ExpressionError> {
    let at = self.offset();
    match self.next() {
      Some(token) if token == expected => Ok(()),
      _ => Err(ExpressionError::syntax(at, format!("expected {}", what))),
    }
  }

  fn binary_op(&self) -> Option<BinaryOp> {
    let op = match self.peek()? {
      Token::OrOr => BinaryOp::Or,
      Token::AndAnd => BinaryOp::And,
      Token::EqEq => BinaryOp::Eq,
      Token::NotEq => BinaryOp::Ne,
      Token::Lt => BinaryOp::Lt,
      Token::Gt => BinaryOp::Gt,
      Token::Le => BinaryOp::Le,
      Token::Ge => BinaryOp::Ge,
      Token::Plus => BinaryOp::Add,
      Token::Minus => BinaryOp::Sub,
      Token::Star => BinaryOp::Mul,
      Token::Slash => BinaryOp::Div,
      Token::Percent => BinaryOp::Rem,
      _ => return None,
    };
    Some(op)
  }

  /// Precedence climbing; all binary operators are left-associative.
  fn parse_binary(&mut self, min_precedence: u8) -> Result<Expr, ExpressionError> {
    let mut lhs = self.parse_unary()?;
    while let Some(op) = self.binary_op() {
      if op.precedence() < min_precedence {
        break;
      }
      self.pos += 1;
      let rhs = self.parse_binary(op.precedence() + 1)?;
      lhs = Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
      };
    }
    Ok(lhs)
  }

  fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
    let op = match self.peek() {
      Some(Token::Not) => UnaryOp::Not,
      Some(Token::Minus) => UnaryOp::Neg,
      _ => return self.parse_postfix(),
    };
    self.pos += 1;
    Ok(Expr::Unary {
      op,
      expr: Box::new(self.parse_unary()?),
    })
  }

  fn parse_postfix(&mut self) -> Result<Expr, ExpressionError> {
    let mut expr = self.parse_primary()?;
    loop {
      match self.peek() {
        Some(Token::Dot) => {
          self.pos += 1;
          let at = self.offset();
          let Some(Token::Ident(field)) = self.next() else {
            return Err(ExpressionError::syntax(at, "expected field name after '.'"));
          };
          expr = Expr::Selector {
            expr: Box::new(expr),
            field,
          };
        }
        Some(Token::LBracket) => {
          self.pos += 1;
          let index = self.parse_binary(1)?;
          self.expect(Token::RBracket, "']'")?;
          expr = Expr::Index {
            expr: Box::new(expr),
            index: Box::new(index),
          };
        }
        _ => return Ok(expr),
      }
    }
  }

  fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
    let at = self.offset();
    match self.next() {
      Some(Token::Int(value)) => Ok(Expr::Literal(Literal::Int(value))),
      Some(Token::Float(value)) => Ok(Expr::Literal(Literal::Float(value))),
      Some(Token::Str(value)) => Ok(Expr::Literal(Literal::Str(value))),
      Some(Token::Ident(name)) => Ok(Expr::Ident(name)),
      Some(Token::LParen) => {
        let inner = self.parse_binary(1)?;
        self.expect(Token::RParen, "')'")?;
        Ok(Expr::Paren(Box::new(inner)))
      }
      Some(token) => Err(ExpressionError::syntax(
        at,
        format!("unexpected token {:?}", token),
      )),
      None => Err(ExpressionError::syntax(at, "unexpected end of condition")),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ident(name: &str) -> Box<Expr> {
    Box::new(Expr::Ident(name.to_string()))
  }

  fn int(value: i64) -> Box<Expr> {
    Box::new(Expr::Literal(Literal::Int(value)))
  }

  #[test]
  fn test_precedence() {
    let expr = parse_condition("a || b && c == 1 + 2 * 3").unwrap();
    let expected = Expr::Binary {
      op: BinaryOp::Or,
      lhs: ident("a"),
      rhs: Box::new(Expr::Binary {
        op: BinaryOp::And,
        lhs: ident("b"),
        rhs: Box::new(Expr::Binary {
          op: BinaryOp::Eq,
          lhs: ident("c"),
          rhs: Box::new(Expr::Binary {
            op: BinaryOp::Add,
            lhs: int(1),
            rhs: Box::new(Expr::Binary {
              op: BinaryOp::Mul,
              lhs: int(2),
              rhs: int(3),
            }),
          }),
        }),
      }),
    };
    assert_eq!(expr, expected);
  }

  #[test]
  fn test_left_associative() {
    let expr = parse_condition("10 - 4 - 3").unwrap();
    assert_eq!(
      expr,
      Expr::Binary {
        op: BinaryOp::Sub,
        lhs: Box::new(Expr::Binary {
          op: BinaryOp::Sub,
          lhs: int(10),
          rhs: int(4),
        }),
        rhs: int(3),
      }
    );
  }

  #[test]
  fn test_postfix_and_unary() {
    let expr = parse_condition(r#"!var0.items[0]["k"]"#).unwrap();
    assert_eq!(
      expr,
      Expr::Unary {
        op: UnaryOp::Not,
        expr: Box::new(Expr::Index {
          expr: Box::new(Expr::Index {
            expr: Box::new(Expr::Selector {
              expr: ident("var0"),
              field: "items".to_string(),
            }),
            index: int(0),
          }),
          index: Box::new(Expr::Literal(Literal::Str("k".to_string()))),
        }),
      }
    );
  }

  #[test]
  fn test_parens() {
    let expr = parse_condition("-(a + 1)").unwrap();
    assert_eq!(
      expr,
      Expr::Unary {
        op: UnaryOp::Neg,
        expr: Box::new(Expr::Paren(Box::new(Expr::Binary {
          op: BinaryOp::Add,
          lhs: ident("a"),
          rhs: int(1),
        }))),
      }
    );
  }

  #[test]
  fn test_syntax_errors() {
    assert!(matches!(parse_condition(""), Err(ExpressionError::Syntax { .. })));
    assert!(matches!(parse_condition("a >"), Err(ExpressionError::Syntax { offset: 3, .. })));
    assert!(matches!(parse_condition("(a"), Err(ExpressionError::Syntax { .. })));
    assert!(matches!(parse_condition("a b"), Err(ExpressionError::Syntax { offset: 2, .. })));
    assert!(matches!(parse_condition("a.1"), Err(ExpressionError::Syntax { .. })));
  }
}
