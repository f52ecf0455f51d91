use std::collections::HashMap;

use serde_json::Value;

use crate::error::ExpressionError;
use crate::path::Path;
use crate::template::{Piece, split_template};

/// Rewrite `${...}` references into synthetic identifiers.
///
/// Returns the rewritten condition and a map from identifier to the
/// referenced root ID. The same root always maps to the same identifier, so
/// `${a.x} > ${a.y}` becomes `var0.x > var0.y`. JSON literal bodies are
/// inlined as literals.
pub fn sanitize_condition(
  condition: &str,
) -> Result<(String, HashMap<String, String>), ExpressionError> {
  let mut out = String::with_capacity(condition.len());
  let mut idents: Vec<(String, String)> = Vec::new();

  for piece in split_template(condition)? {
    match piece {
      Piece::Literal(text) => out.push_str(text),
      Piece::Reference(body) => {
        let body = body.trim();
        if let Ok(literal) = serde_json::from_str::<Value>(body)
          && !literal.is_array()
          && !literal.is_object()
        {
          out.push_str(&literal.to_string());
          continue;
        }

        let path = Path::parse(body)?;
        let ident = match idents.iter().find(|(_, root)| *root == path.root) {
          Some((ident, _)) => ident.clone(),
          None => {
            let ident = format!("var{}", idents.len());
            idents.push((ident.clone(), path.root.clone()));
            ident
          }
        };
        out.push_str(&path.to_expression(&ident));
      }
    }
  }

  Ok((out, idents.into_iter().collect()))
}
