//! Extraction of the component IDs a template or condition refers to.

use serde_json::Value;

use crate::condition::{Expr, parse_condition, sanitize_condition};
use crate::error::ExpressionError;
use crate::path::Path;
use crate::template::{Piece, list_members, split_template};

/// IDs referenced by `${...}` tokens in `text`, in first-seen order.
///
/// Bodies that parse as JSON literals (`${5}`, `${"x"}`) are not references.
/// An unclosed `${` ends the scan.
pub fn find_reference_parents(text: &str) -> Vec<String> {
  let mut parents = Vec::new();
  collect_text(text, &mut parents);
  parents
}

/// IDs referenced anywhere in a value tree, in first-seen order.
pub fn find_value_references(value: &Value) -> Vec<String> {
  let mut parents = Vec::new();
  collect_value(value, &mut parents);
  parents
}

/// IDs referenced by a condition, found by walking its parsed identifiers.
pub fn find_condition_references(condition: &str) -> Result<Vec<String>, ExpressionError> {
  let (sanitized, mapping) = sanitize_condition(condition)?;
  let expr = parse_condition(&sanitized)?;

  let mut idents = Vec::new();
  collect_idents(&expr, &mut idents);

  let mut parents = Vec::new();
  for ident in idents {
    if let Some(id) = mapping.get(ident) {
      push_unique(&mut parents, id);
    }
  }
  Ok(parents)
}

fn collect_value(value: &Value, parents: &mut Vec<String>) {
  match value {
    Value::String(s) => collect_text(s, parents),
    Value::Array(items) => items.iter().for_each(|item| collect_value(item, parents)),
    Value::Object(map) => map.values().for_each(|item| collect_value(item, parents)),
    _ => {}
  }
}

fn collect_text(text: &str, parents: &mut Vec<String>) {
  let pieces = match split_template(text) {
    Ok(pieces) => pieces,
    Err(_) => {
      // Keep what precedes the unclosed token.
      let end = text.rfind("${").unwrap_or(0);
      match split_template(&text[..end]) {
        Ok(pieces) => pieces,
        Err(_) => return,
      }
    }
  };

  for piece in pieces {
    let Piece::Reference(body) = piece else {
      continue;
    };
    let members = list_members(body).unwrap_or_else(|| vec![body]);
    for member in members {
      if serde_json::from_str::<Value>(member.trim()).is_ok() {
        continue;
      }
      if let Ok(path) = Path::parse(member) {
        push_unique(parents, &path.root);
      }
    }
  }
}

fn collect_idents<'e>(expr: &'e Expr, out: &mut Vec<&'e str>) {
  match expr {
    Expr::Ident(name) => out.push(name),
    Expr::Unary { expr, .. } | Expr::Paren(expr) | Expr::Selector { expr, .. } => {
      collect_idents(expr, out)
    }
    Expr::Index { expr, index } => {
      collect_idents(expr, out);
      collect_idents(index, out);
    }
    Expr::Binary { lhs, rhs, .. } => {
      collect_idents(lhs, out);
      collect_idents(rhs, out);
    }
    Expr::Literal(_) => {}
  }
}

fn push_unique(parents: &mut Vec<String>, id: &str) {
  if !parents.iter().any(|p| p == id) {
    parents.push(id.to_string());
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_text_references() {
    assert_eq!(
      find_reference_parents("${a.x} and ${comp-2.output[0]} and ${a.y}"),
      vec!["a", "comp-2"]
    );
    assert!(find_reference_parents("plain text").is_empty());
  }

  #[test]
  fn test_text_skips_literals_and_expands_lists() {
    assert_eq!(find_reference_parents("${5} ${\"s\"} ${true}"), Vec::<String>::new());
    assert_eq!(find_reference_parents("${[a.x, 3, b.y]}"), vec!["a", "b"]);
  }

  #[test]
  fn test_unclosed_token_keeps_earlier_references() {
    assert_eq!(find_reference_parents("${a.x} then ${b.y"), vec!["a"]);
  }

  #[test]
  fn test_value_references_recurse() {
    let input = json!({
      "prompt": "${variable.prompt}",
      "images": ["${fetch.output.image}", { "alt": "img of ${variable.subject}" }],
      "n": 3
    });
    let mut parents = find_value_references(&input);
    parents.sort();
    assert_eq!(parents, vec!["fetch", "variable"]);
  }

  #[test]
  fn test_condition_references() {
    let parents =
      find_condition_references("${a.x} > 3 && ${b.status.completed} || ${a.y} == \"ok\"").unwrap();
    assert_eq!(parents, vec!["a", "b"]);
  }

  #[test]
  fn test_condition_references_reject_bad_syntax() {
    assert!(find_condition_references("${a.x} >").is_err());
  }
}
