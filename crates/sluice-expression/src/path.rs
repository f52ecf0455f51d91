//! Reference paths: `root(.key | [int] | ["key"])*`.
//!
//! The root is a component ID or scope name and may contain characters that
//! are not identifiers (hyphens are common), so paths are parsed directly
//! instead of through the condition grammar.

use std::fmt;

use serde_json::Value;

use crate::error::ExpressionError;

/// One step of a path after its root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  Key(String),
  Index(usize),
}

/// A parsed reference path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
  pub root: String,
  pub segments: Vec<Segment>,
}

impl Path {
  /// Parse the text between `${` and `}`.
  pub fn parse(text: &str) -> Result<Self, ExpressionError> {
    let text = text.trim();
    let invalid = |message: &str| ExpressionError::InvalidPath {
      path: text.to_string(),
      message: message.to_string(),
    };

    let root_end = text.find(['.', '[']).unwrap_or(text.len());
    let root = text[..root_end].trim();
    if root.is_empty() {
      return Err(invalid("empty root"));
    }

    let mut segments = Vec::new();
    let mut rest = &text[root_end..];
    while !rest.is_empty() {
      if let Some(after_dot) = rest.strip_prefix('.') {
        let end = after_dot.find(['.', '[']).unwrap_or(after_dot.len());
        let key = after_dot[..end].trim();
        if key.is_empty() {
          return Err(invalid("empty key after '.'"));
        }
        segments.push(Segment::Key(key.to_string()));
        rest = &after_dot[end..];
      } else if let Some(after_bracket) = rest.strip_prefix('[') {
        let (segment, consumed) = parse_bracket(after_bracket).ok_or_else(|| invalid("bad index"))?;
        segments.push(segment);
        rest = &after_bracket[consumed..];
      } else {
        return Err(invalid("expected '.' or '['"));
      }
    }

    Ok(Self {
      root: root.to_string(),
      segments,
    })
  }

  /// Walk the segments starting from the root's value.
  pub fn lookup<'v>(&self, root: &'v Value) -> Option<&'v Value> {
    self
      .segments
      .iter()
      .try_fold(root, |value, segment| match (segment, value) {
        (Segment::Key(key), Value::Object(map)) => map.get(key),
        (Segment::Index(index), Value::Array(items)) => items.get(*index),
        _ => None,
      })
  }

  /// Render the path in condition syntax with `ident` in place of the root.
  ///
  /// Keys that are not valid identifiers are written as `["key"]`.
  pub fn to_expression(&self, ident: &str) -> String {
    let mut out = ident.to_string();
    for segment in &self.segments {
      match segment {
        Segment::Key(key) if is_identifier(key) => {
          out.push('.');
          out.push_str(key);
        }
        Segment::Key(key) => {
          out.push('[');
          out.push_str(&Value::String(key.clone()).to_string());
          out.push(']');
        }
        Segment::Index(index) => {
          out.push_str(&format!("[{}]", index));
        }
      }
    }
    out
  }
}

impl fmt::Display for Path {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_expression(&self.root))
  }
}

/// Parse `int]` or `"key"]`, returning the segment and the bytes consumed.
fn parse_bracket(text: &str) -> Option<(Segment, usize)> {
  let close = text.find(']')?;
  let inner = text[..close].trim();
  let segment = if let Some(quoted) = inner
    .strip_prefix('"')
    .and_then(|s| s.strip_suffix('"'))
    .or_else(|| inner.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
  {
    Segment::Key(quoted.to_string())
  } else {
    Segment::Index(inner.parse().ok()?)
  };
  Some((segment, close + 1))
}

pub(crate) fn is_identifier(text: &str) -> bool {
  let mut chars = text.chars();
  matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
