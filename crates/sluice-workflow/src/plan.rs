use std::collections::{HashMap, HashSet};

use crate::component::{Component, ComponentKind, RESERVED_SCOPES};
use crate::dag::{Dag, generate_dag, generate_nested_dag};
use crate::error::WorkflowError;
use crate::schedule::{Schedule, topological_sort};

/// A validated graph, its schedule, and the plans of its iterator bodies.
#[derive(Debug, Clone)]
pub struct Plan {
  dag: Dag,
  schedule: Schedule,
  nested: HashMap<usize, Plan>,
}

impl Plan {
  /// Build and validate the plan of a top-level pipeline.
  pub fn build(components: Vec<Component>) -> Result<Self, WorkflowError> {
    let dag = generate_dag(components)?;
    let outer: HashSet<String> = RESERVED_SCOPES.iter().map(|s| s.to_string()).collect();
    Self::from_dag(dag, &outer)
  }

  fn from_dag(dag: Dag, outer: &HashSet<String>) -> Result<Self, WorkflowError> {
    let schedule = topological_sort(&dag)?;

    let mut visible = outer.clone();
    visible.extend(dag.components().iter().map(|c| c.id.clone()));

    let mut nested = HashMap::new();
    for (slot, component) in dag.components().iter().enumerate() {
      let ComponentKind::Iterator(spec) = &component.kind else {
        continue;
      };
      let mut scope = visible.clone();
      if let Some(range) = &spec.range {
        scope.insert(range.index.clone());
      }
      let body = generate_nested_dag(spec.components.clone(), &scope)?;
      nested.insert(slot, Self::from_dag(body, &scope)?);
    }

    Ok(Self {
      dag,
      schedule,
      nested,
    })
  }

  pub fn dag(&self) -> &Dag {
    &self.dag
  }

  pub fn schedule(&self) -> &Schedule {
    &self.schedule
  }

  /// Plan of the iterator body at `slot`.
  pub fn nested(&self, slot: usize) -> Option<&Plan> {
    self.nested.get(&slot)
  }
}
