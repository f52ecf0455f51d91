//! Capability executors and the registry the engine dispatches through.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sluice_workflow::{CapabilityKind, DefinitionLookup};

use crate::error::CapabilityError;
use crate::job::Job;

/// What a capability is asked to do for one cell.
#[derive(Debug, Clone)]
pub struct CapabilityCall<'a> {
  pub component_id: &'a str,
  pub definition: &'a str,
  pub task: &'a str,
  /// Rendered `setup`.
  pub setup: &'a Value,
  /// 1-based; greater than 1 on retries.
  pub attempt: u32,
}

/// A connector or operator implementation.
///
/// `execute` reads the job's input and writes its output. Return a
/// retryable [`CapabilityError`] for failures worth another attempt, or
/// call [`Job::error`] to fail only this item.
#[async_trait]
pub trait Capability: Send + Sync {
  fn kind(&self) -> CapabilityKind;

  async fn execute(&self, call: &CapabilityCall<'_>, job: &Job<'_>) -> Result<(), CapabilityError>;
}

/// Definition ID to capability.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
  capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(
    &mut self,
    definition: impl Into<String>,
    capability: impl Capability + 'static,
  ) -> &mut Self {
    self
      .capabilities
      .insert(definition.into(), Arc::new(capability));
    self
  }

  pub fn with(mut self, definition: impl Into<String>, capability: impl Capability + 'static) -> Self {
    self.register(definition, capability);
    self
  }

  pub fn get(&self, definition: &str) -> Option<Arc<dyn Capability>> {
    self.capabilities.get(definition).cloned()
  }

  pub fn definitions(&self) -> impl Iterator<Item = &str> {
    self.capabilities.keys().map(String::as_str)
  }
}

impl DefinitionLookup for CapabilityRegistry {
  fn definition_kind(&self, definition: &str) -> Option<CapabilityKind> {
    self.capabilities.get(definition).map(|c| c.kind())
  }
}

impl fmt::Debug for CapabilityRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut definitions: Vec<&str> = self.definitions().collect();
    definitions.sort_unstable();
    f.debug_struct("CapabilityRegistry")
      .field("definitions", &definitions)
      .finish()
  }
}
