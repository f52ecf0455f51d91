//! Runtime error types.

use sluice_workflow::WorkflowError;

use crate::memory::Status;

/// Errors that prevent a trigger from being scheduled at all.
///
/// Failures inside a trigger are recorded per (component, item) in memory
/// and reported through the trace instead.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
  /// The recipe is structurally invalid.
  #[error(transparent)]
  Workflow(#[from] WorkflowError),

  #[error("trigger has no batch items")]
  EmptyBatch,

  #[error("invalid runtime config: {message}")]
  Config { message: String },

  #[error("pipeline runner channel closed")]
  ChannelClosed,
}

/// Rejected memory writes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MemoryError {
  #[error("component '{component_id}' (item {item}) cannot move from {from} to {to}")]
  InvalidTransition {
    item: usize,
    component_id: String,
    from: Status,
    to: Status,
  },

  #[error("component '{component_id}' (item {item}) is already {status}")]
  TerminalStatus {
    item: usize,
    component_id: String,
    status: Status,
  },
}

/// Failures reported by capability executors.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
  #[error("invalid input: {message}")]
  InvalidInput { message: String },

  #[error("{message}")]
  Failed { message: String, retryable: bool },

  #[error(transparent)]
  Memory(#[from] MemoryError),
}

impl CapabilityError {
  /// A failure that retrying will not fix.
  pub fn permanent(message: impl Into<String>) -> Self {
    Self::Failed {
      message: message.into(),
      retryable: false,
    }
  }

  /// A failure worth another attempt, e.g. a dropped connection.
  pub fn transient(message: impl Into<String>) -> Self {
    Self::Failed {
      message: message.into(),
      retryable: true,
    }
  }

  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::Failed { retryable: true, .. })
  }
}
