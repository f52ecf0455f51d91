//! The resolved component model.

use indexmap::IndexMap;
use serde_json::Value;
use sluice_config::{RangeDef, VariableDef};

/// ID of the synthetic start component built from a recipe's `variable` section.
pub const START_ID: &str = "variable";
/// ID of the synthetic end component built from a recipe's `output` section.
pub const END_ID: &str = "output";
/// Binding scope holding the trigger's secrets.
pub const SECRET_SCOPE: &str = "secret";
/// Scopes that references may target without being graph nodes.
pub const RESERVED_SCOPES: &[&str] = &[SECRET_SCOPE];
/// The `type` that marks an iterator component.
pub const ITERATOR_TYPE: &str = "iterator";
/// Range index binding used when an iterator does not name one.
pub const DEFAULT_INDEX: &str = "i";

/// Whether a capability talks to an external system or transforms data locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
  Connector,
  Operator,
}

/// Answers which capability kind a definition ID refers to.
pub trait DefinitionLookup {
  fn definition_kind(&self, definition: &str) -> Option<CapabilityKind>;
}

impl DefinitionLookup for std::collections::HashMap<String, CapabilityKind> {
  fn definition_kind(&self, definition: &str) -> Option<CapabilityKind> {
    self.get(definition).copied()
  }
}

/// One node of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
  pub id: String,
  pub kind: ComponentKind,
  /// Input tree; for iterators, the array reference.
  pub input: Value,
  pub condition: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComponentKind {
  Start(StartSpec),
  End,
  Connector(TaskSpec),
  Operator(TaskSpec),
  Iterator(IteratorSpec),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StartSpec {
  pub variables: IndexMap<String, VariableDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
  /// Registry key of the capability.
  pub definition: String,
  pub task: String,
  pub setup: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IteratorSpec {
  /// When set, the iterator walks a numeric range instead of its input array.
  pub range: Option<RangeSpec>,
  pub components: Vec<Component>,
  /// Output name → template rendered once per element.
  pub output_elements: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeSpec {
  pub bounds: RangeDef,
  /// Binding name carrying the current range value.
  pub index: String,
}

impl Component {
  pub fn is_start(&self) -> bool {
    matches!(self.kind, ComponentKind::Start(_))
  }

  pub fn task(&self) -> Option<&TaskSpec> {
    match &self.kind {
      ComponentKind::Connector(task) | ComponentKind::Operator(task) => Some(task),
      _ => None,
    }
  }

  /// Short variant name, for logs.
  pub fn variant(&self) -> &'static str {
    match self.kind {
      ComponentKind::Start(_) => "start",
      ComponentKind::End => "end",
      ComponentKind::Connector(_) => "connector",
      ComponentKind::Operator(_) => "operator",
      ComponentKind::Iterator(_) => "iterator",
    }
  }
}
