//! The handle a capability gets for one (component, item) cell.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::CapabilityError;
use crate::memory::Memory;

/// Rendered input in, output and errors out, for one cell.
///
/// Writes go straight to memory; the scheduler marks the cell Completed
/// once the capability returns without reporting an error.
pub struct Job<'m> {
  memory: &'m Memory,
  item: usize,
  slot: usize,
  input: Value,
  error: Mutex<Option<String>>,
}

impl<'m> Job<'m> {
  pub(crate) fn new(memory: &'m Memory, item: usize, slot: usize, input: Value) -> Self {
    Self {
      memory,
      item,
      slot,
      input,
      error: Mutex::new(None),
    }
  }

  pub fn trigger_id(&self) -> &str {
    self.memory.trigger_id()
  }

  pub fn component_id(&self) -> &str {
    self.memory.component_id(self.slot)
  }

  /// Position of this job's item in the batch.
  pub fn item(&self) -> usize {
    self.item
  }

  pub fn read(&self) -> &Value {
    &self.input
  }

  pub fn read_data<T: DeserializeOwned>(&self) -> Result<T, CapabilityError> {
    serde_json::from_value(self.input.clone()).map_err(|e| CapabilityError::InvalidInput {
      message: e.to_string(),
    })
  }

  pub fn write(&self, output: Value) -> Result<(), CapabilityError> {
    Ok(self.memory.set_output(self.item, self.slot, output)?)
  }

  pub fn write_data<T: Serialize>(&self, data: &T) -> Result<(), CapabilityError> {
    let output = serde_json::to_value(data).map_err(|e| CapabilityError::permanent(e.to_string()))?;
    self.write(output)
  }

  /// Report a per-item failure. The cell ends Errored even if `execute`
  /// returns `Ok`.
  pub fn error(&self, message: impl Into<String>) {
    *self.error.lock().unwrap_or_else(PoisonError::into_inner) = Some(message.into());
  }

  pub fn reported_error(&self) -> Option<String> {
    self.error.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }
}
