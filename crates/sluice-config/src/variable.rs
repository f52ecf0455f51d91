use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A trigger-time input field declared in the recipe's `variable` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,

  /// Declared data format, e.g. "string" or "array:string".
  #[serde(
    default,
    rename = "type",
    alias = "instillFormat",
    skip_serializing_if = "Option::is_none"
  )]
  pub format: Option<String>,

  /// Applied when the trigger payload omits this field.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default: Option<Value>,

  #[serde(default)]
  pub required: bool,
}

/// A response field declared in the recipe's `output` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputDef {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,

  /// Template rendered against the finished trigger.
  pub value: String,
}
