use sluice_expression::ExpressionError;
use thiserror::Error;

/// Structural errors. Any of these aborts a trigger before execution.
#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("no components")]
  NoComponents,

  /// A cycle kept some components from ever becoming ready.
  #[error("not a valid dag")]
  NotAValidDag,

  /// The graph has more than one weakly-connected component.
  #[error("more than a dag")]
  MoreThanADag,

  #[error("no upstream component '{reference}' (referenced by '{component_id}')")]
  NoUpstreamComponent {
    component_id: String,
    reference: String,
  },

  #[error("no condition upstream component '{reference}' (referenced by '{component_id}')")]
  NoConditionUpstreamComponent {
    component_id: String,
    reference: String,
  },

  #[error("component '{component_id}' references itself")]
  SelfReference { component_id: String },

  #[error("duplicate component id: {component_id}")]
  DuplicateComponentId { component_id: String },

  #[error("reserved component id: {component_id}")]
  ReservedComponentId { component_id: String },

  #[error("unknown component definition '{definition}' for component '{component_id}'")]
  UnknownDefinition {
    component_id: String,
    definition: String,
  },

  #[error("invalid condition on '{component_id}': {source}")]
  InvalidCondition {
    component_id: String,
    #[source]
    source: ExpressionError,
  },

  #[error("invalid iterator '{component_id}': {message}")]
  InvalidIterator {
    component_id: String,
    message: String,
  },
}
