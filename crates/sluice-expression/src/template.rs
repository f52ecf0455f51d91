//! Template rendering.
//!
//! A string leaf that is exactly one `${...}` reference resolves to the native
//! value it points at. Any other string containing references is rendered by
//! splicing: string values are inlined raw, everything else as compact JSON.
//!
//! # Examples
//!
//! With `a = {"b": 5}`:
//! - `"${a.b}"` → `5`
//! - `"x=${a.b}"` → `"x=5"`
//! - `"${[a.b, 7]}"` → `[5, 7]`

use serde_json::Value;

use crate::bindings::Bindings;
use crate::error::ExpressionError;
use crate::path::Path;

/// A piece of a template string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Piece<'a> {
  Literal(&'a str),
  Reference(&'a str),
}

/// Split a template into literal text and reference bodies.
pub(crate) fn split_template(template: &str) -> Result<Vec<Piece<'_>>, ExpressionError> {
  let mut pieces = Vec::new();
  let mut rest = template;
  while let Some(start) = rest.find("${") {
    if start > 0 {
      pieces.push(Piece::Literal(&rest[..start]));
    }
    let body = &rest[start + 2..];
    let end = body
      .find('}')
      .ok_or_else(|| ExpressionError::MalformedTemplate {
        template: template.to_string(),
      })?;
    pieces.push(Piece::Reference(&body[..end]));
    rest = &body[end + 1..];
  }
  if !rest.is_empty() {
    pieces.push(Piece::Literal(rest));
  }
  Ok(pieces)
}

/// Body of `${[a, b]}` list shorthand, split into members.
pub(crate) fn list_members(body: &str) -> Option<Vec<&str>> {
  let inner = body.trim().strip_prefix('[')?.strip_suffix(']')?;
  if inner.trim().is_empty() {
    return Some(Vec::new());
  }
  Some(inner.split(',').map(str::trim).collect())
}

/// Render a value tree against `bindings`.
///
/// Fails on the first reference that cannot be resolved.
pub fn render_input<B: Bindings + ?Sized>(
  value: &Value,
  bindings: &B,
) -> Result<Value, ExpressionError> {
  render(value, bindings, false)
}

/// Like [`render_input`], but unresolved references become `null`.
///
/// Malformed templates still fail.
pub fn render_input_lenient<B: Bindings + ?Sized>(
  value: &Value,
  bindings: &B,
) -> Result<Value, ExpressionError> {
  render(value, bindings, true)
}

fn render<B: Bindings + ?Sized>(
  value: &Value,
  bindings: &B,
  lenient: bool,
) -> Result<Value, ExpressionError> {
  match value {
    Value::String(s) => render_string(s, bindings, lenient),
    Value::Array(items) => items
      .iter()
      .map(|item| render(item, bindings, lenient))
      .collect::<Result<Vec<_>, _>>()
      .map(Value::Array),
    Value::Object(map) => map
      .iter()
      .map(|(key, item)| Ok((key.clone(), render(item, bindings, lenient)?)))
      .collect::<Result<serde_json::Map<_, _>, _>>()
      .map(Value::Object),
    other => Ok(other.clone()),
  }
}

fn render_string<B: Bindings + ?Sized>(
  template: &str,
  bindings: &B,
  lenient: bool,
) -> Result<Value, ExpressionError> {
  // A lone reference keeps the native type of what it points at.
  let trimmed = template.trim();
  if trimmed.starts_with("${") && trimmed.ends_with('}') {
    let whole = split_template(trimmed)?;
    if let [Piece::Reference(body)] = whole.as_slice() {
      return resolve(body, bindings, lenient);
    }
  }

  let pieces = split_template(template)?;
  if !pieces.iter().any(|p| matches!(p, Piece::Reference(_))) {
    return Ok(Value::String(template.to_string()));
  }

  let mut out = String::with_capacity(template.len());
  for piece in pieces {
    match piece {
      Piece::Literal(text) => out.push_str(text),
      Piece::Reference(body) => match resolve(body, bindings, lenient)? {
        Value::String(s) => out.push_str(&s),
        other => out.push_str(&other.to_string()),
      },
    }
  }
  Ok(Value::String(out))
}

/// Resolve a reference body, including the list shorthand.
fn resolve<B: Bindings + ?Sized>(
  body: &str,
  bindings: &B,
  lenient: bool,
) -> Result<Value, ExpressionError> {
  if let Some(members) = list_members(body) {
    return members
      .into_iter()
      .map(|member| resolve_one(member, bindings, lenient))
      .collect::<Result<Vec<_>, _>>()
      .map(Value::Array);
  }
  resolve_one(body, bindings, lenient)
}

fn resolve_one<B: Bindings + ?Sized>(
  body: &str,
  bindings: &B,
  lenient: bool,
) -> Result<Value, ExpressionError> {
  let body = body.trim();
  if let Ok(path) = Path::parse(body)
    && let Some(root) = bindings.binding(&path.root)
    && let Some(found) = path.lookup(&root)
  {
    return Ok(found.clone());
  }
  if let Ok(literal) = serde_json::from_str::<Value>(body) {
    return Ok(literal);
  }
  if lenient {
    return Ok(Value::Null);
  }
  Err(ExpressionError::ReferenceNotCorrect {
    path: body.to_string(),
  })
}
