use std::collections::HashSet;

use serde_json::Value;
use sluice_config::{ComponentDef, ComponentMap, Recipe};

use crate::component::{
  CapabilityKind, Component, ComponentKind, DEFAULT_INDEX, DefinitionLookup, END_ID,
  ITERATOR_TYPE, IteratorSpec, RangeSpec, SECRET_SCOPE, START_ID, StartSpec, TaskSpec,
};
use crate::error::WorkflowError;
use crate::pipeline::Pipeline;

const RESERVED_IDS: &[&str] = &[START_ID, END_ID, SECRET_SCOPE];

/// Resolves a recipe into a [`Pipeline`] against a definition lookup.
///
/// This process:
/// 1. Rejects reserved and shadowing component IDs
/// 2. Classifies every component type as connector, operator or iterator
/// 3. Synthesizes the start and end components from the `variable` and
///    `output` sections
pub struct Resolver<'a, L: DefinitionLookup + ?Sized> {
  lookup: &'a L,
}

impl<'a, L: DefinitionLookup + ?Sized> Resolver<'a, L> {
  pub fn new(lookup: &'a L) -> Self {
    Self { lookup }
  }

  pub fn resolve(&self, recipe: Recipe) -> Result<Pipeline, WorkflowError> {
    let mut components = Vec::with_capacity(recipe.component.len() + 2);

    if let Some(variables) = recipe.variable {
      components.push(Component {
        id: START_ID.to_string(),
        kind: ComponentKind::Start(StartSpec { variables }),
        input: Value::Null,
        condition: None,
      });
    }

    components.extend(self.resolve_scope(recipe.component, &HashSet::new())?);

    if let Some(outputs) = recipe.output {
      let input = outputs
        .into_iter()
        .map(|(name, def)| (name, Value::String(def.value)))
        .collect();
      components.push(Component {
        id: END_ID.to_string(),
        kind: ComponentKind::End,
        input: Value::Object(input),
        condition: None,
      });
    }

    Ok(Pipeline {
      version: recipe.version,
      components,
      secrets: recipe.secret,
    })
  }

  /// Resolve one scope of components. `enclosing` holds the IDs of all
  /// enclosing scopes, which nested IDs must not shadow.
  fn resolve_scope(
    &self,
    defs: ComponentMap,
    enclosing: &HashSet<String>,
  ) -> Result<Vec<Component>, WorkflowError> {
    let mut visible = enclosing.clone();
    for id in defs.keys() {
      if RESERVED_IDS.contains(&id.as_str()) {
        return Err(WorkflowError::ReservedComponentId {
          component_id: id.clone(),
        });
      }
      if !visible.insert(id.clone()) {
        return Err(WorkflowError::DuplicateComponentId {
          component_id: id.clone(),
        });
      }
    }

    defs
      .into_iter()
      .map(|(id, def)| self.resolve_component(id, def, &visible))
      .collect()
  }

  fn resolve_component(
    &self,
    id: String,
    def: ComponentDef,
    visible: &HashSet<String>,
  ) -> Result<Component, WorkflowError> {
    if def.component_type == ITERATOR_TYPE {
      return self.resolve_iterator(id, def, visible);
    }

    let task = TaskSpec {
      definition: def.component_type.clone(),
      task: def.task,
      setup: def.setup,
    };
    let kind = match self.lookup.definition_kind(&def.component_type) {
      Some(CapabilityKind::Connector) => ComponentKind::Connector(task),
      Some(CapabilityKind::Operator) => ComponentKind::Operator(task),
      None => {
        return Err(WorkflowError::UnknownDefinition {
          component_id: id,
          definition: def.component_type,
        });
      }
    };

    Ok(Component {
      id,
      kind,
      input: def.input,
      condition: non_blank(def.condition),
    })
  }

  fn resolve_iterator(
    &self,
    id: String,
    def: ComponentDef,
    visible: &HashSet<String>,
  ) -> Result<Component, WorkflowError> {
    let invalid = |message: &str| WorkflowError::InvalidIterator {
      component_id: id.clone(),
      message: message.to_string(),
    };

    match (def.input.is_null(), &def.range) {
      (true, None) => return Err(invalid("needs an `input` or a `range`")),
      (false, Some(_)) => return Err(invalid("takes either `input` or `range`, not both")),
      _ => {}
    }
    if def.component.is_empty() {
      return Err(invalid("has no components"));
    }

    let range = def.range.map(|bounds| RangeSpec {
      bounds,
      index: non_blank(def.index).unwrap_or_else(|| DEFAULT_INDEX.to_string()),
    });
    let spec = IteratorSpec {
      range,
      components: self.resolve_scope(def.component, visible)?,
      output_elements: def.output_elements,
    };

    Ok(Component {
      id,
      kind: ComponentKind::Iterator(spec),
      input: def.input,
      condition: non_blank(def.condition),
    })
  }
}

fn non_blank(value: Option<String>) -> Option<String> {
  value.filter(|v| !v.trim().is_empty())
}
