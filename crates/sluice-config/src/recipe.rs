use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::component::ComponentMap;
use crate::variable::{OutputDef, VariableDef};

/// A pipeline recipe as stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub version: String,

  #[serde(default)]
  pub component: ComponentMap,

  /// Request schema. Present (even when empty) means the pipeline has a
  /// start component.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub variable: Option<IndexMap<String, VariableDef>>,

  /// Recipe-level secrets, overlaid by the secrets passed with a trigger.
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub secret: IndexMap<String, String>,

  /// Response schema. Present means the pipeline has an end component.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output: Option<IndexMap<String, OutputDef>>,
}

impl Recipe {
  /// Parse a recipe from a JSON document.
  pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(content)
  }
}
