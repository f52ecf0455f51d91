use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::Status;

/// A batch of trigger payloads plus per-trigger secrets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerRequest {
  pub items: Vec<Value>,
  /// Overlaid on the recipe's own `secret` section.
  #[serde(default)]
  pub secrets: HashMap<String, String>,
}

impl TriggerRequest {
  pub fn new(items: Vec<Value>) -> Self {
    Self {
      items,
      secrets: HashMap::new(),
    }
  }

  pub fn single(payload: Value) -> Self {
    Self::new(vec![payload])
  }

  pub fn with_secret(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.secrets.insert(key.into(), value.into());
    self
  }
}

/// How a trigger ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
  /// Every group ran and no cell errored.
  Completed,
  /// Every group ran but at least one (component, item) cell errored.
  Failed,
  DeadlineExceeded,
  Cancelled,
}

/// One component's records across the batch, indexed by item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentTrace {
  pub statuses: Vec<Status>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub inputs: Option<Vec<Value>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub outputs: Option<Vec<Value>>,
  pub errors: Vec<Option<String>>,
}

/// Component ID to its trace, in graph order.
pub type Trace = IndexMap<String, ComponentTrace>;

/// Result of one trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResult {
  pub trigger_id: String,
  pub status: TriggerStatus,
  /// The end component's output per item, or `null` without an `output` section.
  pub outputs: Vec<Value>,
  pub trace: Trace,
}

impl TriggerResult {
  /// Status of `component_id` for every item.
  pub fn statuses(&self, component_id: &str) -> Option<&[Status]> {
    self.trace.get(component_id).map(|t| t.statuses.as_slice())
  }

  /// Items where any component errored.
  pub fn failed_items(&self) -> Vec<usize> {
    let size = self.outputs.len();
    (0..size)
      .filter(|&item| {
        self
          .trace
          .values()
          .any(|t| t.statuses.get(item) == Some(&Status::Errored))
      })
      .collect()
  }
}
