//! Upstream IDs of a component.

use std::collections::HashSet;

use serde_json::Value;
use sluice_expression::{find_condition_references, find_value_references};

use crate::component::{Component, ComponentKind};
use crate::error::WorkflowError;

/// The IDs a component depends on, split by where they were found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parents {
  pub condition: Vec<String>,
  /// References from the input tree, iterator range and bubbled-up nested
  /// references.
  pub input: Vec<String>,
}

/// Compute the parents of a component.
///
/// For iterators, references made by nested children or output elements to
/// anything outside the nested scope are attributed to the iterator itself.
/// References among the children, to the iterator's own ID or to its range
/// index stay inside.
pub fn component_parents(component: &Component) -> Result<Parents, WorkflowError> {
  let condition = match &component.condition {
    Some(condition) => {
      find_condition_references(condition).map_err(|source| WorkflowError::InvalidCondition {
        component_id: component.id.clone(),
        source,
      })?
    }
    None => Vec::new(),
  };

  let mut input = find_value_references(&component.input);

  if let ComponentKind::Iterator(spec) = &component.kind {
    if let Some(range) = &spec.range {
      for bound in range.bounds.values() {
        extend_unique(&mut input, find_value_references(bound));
      }
    }

    let mut local: HashSet<&str> = spec.components.iter().map(|c| c.id.as_str()).collect();
    local.insert(component.id.as_str());
    if let Some(range) = &spec.range {
      local.insert(range.index.as_str());
    }

    for child in &spec.components {
      let nested = component_parents(child)?;
      let outer = nested
        .condition
        .into_iter()
        .chain(nested.input)
        .filter(|id| !local.contains(id.as_str()));
      extend_unique(&mut input, outer);
    }

    // Output elements render against the element scopes, so outer IDs they
    // name must be upstream of the iterator like any child reference.
    for template in spec.output_elements.values() {
      let outer = find_value_references(&Value::String(template.clone()))
        .into_iter()
        .filter(|id| !local.contains(id.as_str()));
      extend_unique(&mut input, outer);
    }
  }

  Ok(Parents { condition, input })
}

fn extend_unique(target: &mut Vec<String>, ids: impl IntoIterator<Item = String>) {
  for id in ids {
    if !target.contains(&id) {
      target.push(id);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::component::{IteratorSpec, RangeSpec, TaskSpec};
  use serde_json::json;
  use sluice_config::RangeDef;

  fn task(id: &str, input: Value, condition: Option<&str>) -> Component {
    Component {
      id: id.to_string(),
      kind: ComponentKind::Operator(TaskSpec {
        definition: "echo".to_string(),
        task: String::new(),
        setup: Value::Null,
      }),
      input,
      condition: condition.map(str::to_string),
    }
  }

  #[test]
  fn test_input_and_condition_parents() {
    let component = task(
      "c",
      json!({ "x": "${a.output}", "y": ["${b.output.items[0]}"] }),
      Some("${d.output.ok} && ${a.output.n} > 1"),
    );
    let parents = component_parents(&component).unwrap();
    assert_eq!(parents.condition, vec!["d", "a"]);
    let mut input = parents.input.clone();
    input.sort();
    assert_eq!(input, vec!["a", "b"]);
  }

  #[test]
  fn test_bad_condition_is_structural() {
    let component = task("c", Value::Null, Some("${a.x} &&"));
    assert!(matches!(
      component_parents(&component),
      Err(WorkflowError::InvalidCondition { .. })
    ));
  }

  #[test]
  fn test_iterator_bubbles_outer_references() {
    let iterator = Component {
      id: "loop".to_string(),
      kind: ComponentKind::Iterator(IteratorSpec {
        range: Some(RangeSpec {
          bounds: RangeDef::Bounds(vec![json!(0), json!("${variable.n}")]),
          index: "idx".to_string(),
        }),
        components: vec![
          task("first", json!("${idx} ${loop.element} ${lookup.output}"), None),
          task("second", json!("${first.output}"), Some("${flags.output.on}")),
        ],
        output_elements: [
          ("firsts".to_string(), "${first.output}".to_string()),
          ("tagged".to_string(), "${second.output} ${tags.output}".to_string()),
        ]
        .into_iter()
        .collect(),
      }),
      input: Value::Null,
      condition: None,
    };

    let parents = component_parents(&iterator).unwrap();
    assert!(parents.condition.is_empty());
    assert_eq!(parents.input, vec!["variable", "lookup", "flags", "tags"]);
  }
}
