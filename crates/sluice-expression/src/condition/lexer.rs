use std::str::CharIndices;

use crate::error::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
  Ident(String),
  Int(i64),
  Float(f64),
  Str(String),
  Not,
  Plus,
  Minus,
  Star,
  Slash,
  Percent,
  AndAnd,
  OrOr,
  EqEq,
  NotEq,
  Lt,
  Gt,
  Le,
  Ge,
  Dot,
  LBracket,
  RBracket,
  LParen,
  RParen,
}

/// A token and the byte offset it starts at.
pub(crate) type Spanned = (Token, usize);

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, ExpressionError> {
  let bytes = source.as_bytes();
  let mut tokens = Vec::new();
  let mut pos = 0;

  while pos < bytes.len() {
    let c = bytes[pos];
    let start = pos;

    if c.is_ascii_whitespace() {
      pos += 1;
      continue;
    }

    if c.is_ascii_alphabetic() || c == b'_' {
      while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
        pos += 1;
      }
      tokens.push((Token::Ident(source[start..pos].to_string()), start));
      continue;
    }

    if c.is_ascii_digit() {
      let (token, end) = lex_number(source, start)?;
      tokens.push((token, start));
      pos = end;
      continue;
    }

    if c == b'"' || c == b'\'' {
      let (value, end) = lex_string(source, start)?;
      tokens.push((Token::Str(value), start));
      pos = end;
      continue;
    }

    let next = bytes.get(pos + 1).copied();
    let (token, width) = match (c, next) {
      (b'&', Some(b'&')) => (Token::AndAnd, 2),
      (b'|', Some(b'|')) => (Token::OrOr, 2),
      (b'=', Some(b'=')) => (Token::EqEq, 2),
      (b'!', Some(b'=')) => (Token::NotEq, 2),
      (b'<', Some(b'=')) => (Token::Le, 2),
      (b'>', Some(b'=')) => (Token::Ge, 2),
      (b'!', _) => (Token::Not, 1),
      (b'<', _) => (Token::Lt, 1),
      (b'>', _) => (Token::Gt, 1),
      (b'+', _) => (Token::Plus, 1),
      (b'-', _) => (Token::Minus, 1),
      (b'*', _) => (Token::Star, 1),
      (b'/', _) => (Token::Slash, 1),
      (b'%', _) => (Token::Percent, 1),
      (b'.', _) => (Token::Dot, 1),
      (b'[', _) => (Token::LBracket, 1),
      (b']', _) => (Token::RBracket, 1),
      (b'(', _) => (Token::LParen, 1),
      (b')', _) => (Token::RParen, 1),
      _ => {
        let ch = source[start..].chars().next().unwrap_or('?');
        return Err(ExpressionError::syntax(start, format!("unexpected character '{}'", ch)));
      }
    };
    tokens.push((token, start));
    pos += width;
  }

  Ok(tokens)
}

fn lex_number(source: &str, start: usize) -> Result<(Token, usize), ExpressionError> {
  let bytes = source.as_bytes();
  let mut pos = start;
  let mut is_float = false;

  while pos < bytes.len() && bytes[pos].is_ascii_digit() {
    pos += 1;
  }
  if pos + 1 < bytes.len() && bytes[pos] == b'.' && bytes[pos + 1].is_ascii_digit() {
    is_float = true;
    pos += 1;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
      pos += 1;
    }
  }
  if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
    let mut exp = pos + 1;
    if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
      exp += 1;
    }
    if exp < bytes.len() && bytes[exp].is_ascii_digit() {
      is_float = true;
      pos = exp;
      while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
      }
    }
  }

  let text = &source[start..pos];
  let token = if is_float {
    Token::Float(
      text
        .parse()
        .map_err(|_| ExpressionError::syntax(start, format!("invalid float '{}'", text)))?,
    )
  } else {
    Token::Int(
      text
        .parse()
        .map_err(|_| ExpressionError::syntax(start, format!("integer out of range '{}'", text)))?,
    )
  };
  Ok((token, pos))
}

fn lex_string(source: &str, start: usize) -> Result<(String, usize), ExpressionError> {
  let mut chars = source[start..].char_indices();
  let quote = match chars.next() {
    Some((_, q)) => q,
    None => return Err(ExpressionError::syntax(start, "unterminated string")),
  };

  let mut value = String::new();
  while let Some((offset, ch)) = chars.next() {
    match ch {
      c if c == quote => return Ok((value, start + offset + c.len_utf8())),
      '\\' => match chars.next() {
        Some((_, 'n')) => value.push('\n'),
        Some((_, 't')) => value.push('\t'),
        Some((_, 'r')) => value.push('\r'),
        Some((_, 'b')) => value.push('\u{8}'),
        Some((_, 'f')) => value.push('\u{c}'),
        Some((_, escaped @ ('\\' | '"' | '\'' | '/'))) => value.push(escaped),
        Some((at, 'u')) => value.push(unicode_escape(&mut chars, start + at)?),
        Some((at, other)) => {
          return Err(ExpressionError::syntax(
            start + at,
            format!("unknown escape '\\{}'", other),
          ));
        }
        None => break,
      },
      c => value.push(c),
    }
  }
  Err(ExpressionError::syntax(start, "unterminated string"))
}

/// Decode the digits after `\u`. A high surrogate must be followed by an
/// escaped low surrogate.
fn unicode_escape(chars: &mut CharIndices<'_>, at: usize) -> Result<char, ExpressionError> {
  let invalid = || ExpressionError::syntax(at, "invalid unicode escape");
  let code_unit = |chars: &mut CharIndices<'_>| -> Result<u32, ExpressionError> {
    let mut unit = 0;
    for _ in 0..4 {
      let digit = chars.next().and_then(|(_, c)| c.to_digit(16)).ok_or_else(invalid)?;
      unit = unit * 16 + digit;
    }
    Ok(unit)
  };

  let high = code_unit(chars)?;
  let code = match high {
    0xD800..=0xDBFF => {
      if !matches!((chars.next(), chars.next()), (Some((_, '\\')), Some((_, 'u')))) {
        return Err(invalid());
      }
      let low = code_unit(chars)?;
      if !(0xDC00..=0xDFFF).contains(&low) {
        return Err(invalid());
      }
      0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
    }
    _ => high,
  };
  char::from_u32(code).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(source: &str) -> Vec<Token> {
    tokenize(source).unwrap().into_iter().map(|(t, _)| t).collect()
  }

  #[test]
  fn test_operators() {
    assert_eq!(
      kinds("!a && b || c != d <= e"),
      vec![
        Token::Not,
        Token::Ident("a".into()),
        Token::AndAnd,
        Token::Ident("b".into()),
        Token::OrOr,
        Token::Ident("c".into()),
        Token::NotEq,
        Token::Ident("d".into()),
        Token::Le,
        Token::Ident("e".into()),
      ]
    );
  }

  #[test]
  fn test_numbers() {
    assert_eq!(kinds("42 3.5 1e3"), vec![Token::Int(42), Token::Float(3.5), Token::Float(1000.0)]);
    assert!(tokenize("99999999999999999999").is_err());
  }

  #[test]
  fn test_strings_and_selectors() {
    assert_eq!(
      kinds(r#"var0["a\"b"].c == 'x'"#),
      vec![
        Token::Ident("var0".into()),
        Token::LBracket,
        Token::Str("a\"b".into()),
        Token::RBracket,
        Token::Dot,
        Token::Ident("c".into()),
        Token::EqEq,
        Token::Str("x".into()),
      ]
    );
  }

  #[test]
  fn test_json_escapes() {
    assert_eq!(
      kinds(r#""\u00e9\u0001\/\b\f" '\ud83d\ude00'"#),
      vec![Token::Str("\u{e9}\u{1}/\u{8}\u{c}".into()), Token::Str("\u{1f600}".into())]
    );
    for bad in [r#""\u12""#, r#""\u12zz""#, r#""\ud83d""#, r#""\ud83d\u0041""#, r#""\ude00""#] {
      let err = tokenize(bad).unwrap_err();
      assert!(err.to_string().contains("invalid unicode escape"), "{}", bad);
    }
  }

  #[test]
  fn test_errors_carry_offsets() {
    assert_eq!(
      tokenize("a # b"),
      Err(ExpressionError::Syntax {
        offset: 2,
        message: "unexpected character '#'".to_string()
      })
    );
    assert!(matches!(tokenize("\"open"), Err(ExpressionError::Syntax { offset: 0, .. })));
  }
}
