use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Components keyed by ID, in declaration order.
pub type ComponentMap = IndexMap<String, ComponentDef>;

/// A component entry as written in a recipe.
///
/// Iterator components (`type: iterator`) additionally carry a nested
/// `component` map, `outputElements`, and optionally a `range`/`index`
/// pair in place of an array `input`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDef {
  /// Definition ID of the capability, or `iterator`.
  #[serde(rename = "type")]
  pub component_type: String,

  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub task: String,

  /// Input tree. String leaves may embed `${...}` references.
  #[serde(default, skip_serializing_if = "Value::is_null")]
  pub input: Value,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub condition: Option<String>,

  #[serde(default, skip_serializing_if = "Value::is_null")]
  pub setup: Value,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub metadata: Option<Value>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub range: Option<RangeDef>,

  /// Name of the binding that carries the current range value.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub index: Option<String>,

  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub component: ComponentMap,

  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub output_elements: IndexMap<String, String>,
}

/// Range setup of an iterator. Every bound may be a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RangeDef {
  /// `[start, stop]` or `[start, stop, step]`.
  Bounds(Vec<Value>),
  /// `{start, stop, step}`.
  Named {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stop: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    step: Option<Value>,
  },
}

impl RangeDef {
  /// All bound values, for reference extraction.
  pub fn values(&self) -> Vec<&Value> {
    match self {
      RangeDef::Bounds(values) => values.iter().collect(),
      RangeDef::Named { start, stop, step } => {
        [start, stop, step].into_iter().flatten().collect()
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_parse_task_component() {
    let def: ComponentDef = serde_json::from_value(json!({
      "type": "openai",
      "task": "TASK_TEXT_GENERATION",
      "input": { "prompt": "${variable.prompt}" },
      "condition": "${variable.enabled} == true",
      "setup": { "api-key": "${secret.key}" }
    }))
    .unwrap();

    assert_eq!(def.component_type, "openai");
    assert_eq!(def.task, "TASK_TEXT_GENERATION");
    assert_eq!(def.input["prompt"], "${variable.prompt}");
    assert_eq!(def.condition.as_deref(), Some("${variable.enabled} == true"));
    assert!(def.component.is_empty());
  }

  #[test]
  fn test_parse_iterator_keeps_nested_order() {
    let def: ComponentDef = serde_json::from_value(json!({
      "type": "iterator",
      "input": "${split.output.items}",
      "component": {
        "zeta": { "type": "echo", "input": "${iter.element}" },
        "alpha": { "type": "echo", "input": "${zeta.output}" }
      },
      "outputElements": { "result": "${alpha.output}" }
    }))
    .unwrap();

    let ids: Vec<&str> = def.component.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["zeta", "alpha"]);
    assert_eq!(def.output_elements["result"], "${alpha.output}");
  }

  #[test]
  fn test_parse_range_forms() {
    let bounds: RangeDef = serde_json::from_value(json!([0, "${variable.n}", 2])).unwrap();
    assert!(matches!(&bounds, RangeDef::Bounds(v) if v.len() == 3));

    let named: RangeDef = serde_json::from_value(json!({ "start": 1, "stop": 4 })).unwrap();
    match &named {
      RangeDef::Named { start, stop, step } => {
        assert_eq!(start, &Some(json!(1)));
        assert_eq!(stop, &Some(json!(4)));
        assert!(step.is_none());
      }
      other => panic!("expected named range, got {:?}", other),
    }
    assert_eq!(named.values().len(), 2);
  }
}
