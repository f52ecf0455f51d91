//! Per-trigger execution memory.
//!
//! Memory holds one record per (component, batch item) plus a scope of
//! non-component bindings (`variable`, `secret`, iterator elements). Each
//! item sits behind its own lock so cells of one schedule group can write
//! concurrently. Every write is forwarded to the notifier.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sluice_expression::Bindings;
use sluice_workflow::Dag;

use crate::error::MemoryError;
use crate::events::{ExecutionEvent, ExecutionNotifier};
use crate::result::{ComponentTrace, Trace};

/// Lifecycle of one component for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
  #[default]
  Pending,
  Started,
  Completed,
  Skipped,
  Errored,
}

impl Status {
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Completed | Self::Skipped | Self::Errored)
  }

  /// Pending may start, skip or fail; Started may complete or fail.
  pub fn can_transition_to(self, next: Status) -> bool {
    matches!(
      (self, next),
      (Self::Pending, Self::Started | Self::Skipped | Self::Errored)
        | (Self::Started, Self::Completed | Self::Errored)
    )
  }
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Pending => "pending",
      Self::Started => "started",
      Self::Completed => "completed",
      Self::Skipped => "skipped",
      Self::Errored => "errored",
    };
    f.write_str(name)
  }
}

/// What one component recorded for one item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentMemory {
  pub input: Option<Value>,
  pub output: Option<Value>,
  pub status: Status,
  pub error: Option<String>,
}

impl ComponentMemory {
  /// The value `${component...}` references resolve against.
  pub fn to_binding(&self) -> Value {
    json!({
      "input": self.input.clone().unwrap_or(Value::Null),
      "output": self.output.clone().unwrap_or(Value::Null),
      "status": {
        "started": matches!(self.status, Status::Started | Status::Completed)
          || (self.status == Status::Errored && self.input.is_some()),
        "completed": self.status == Status::Completed,
        "skipped": self.status == Status::Skipped,
        "errored": self.status == Status::Errored,
      },
      "error": { "message": self.error.clone().map_or(Value::Null, Value::String) },
    })
  }
}

#[derive(Debug, Clone, Default)]
struct ItemMemory {
  components: Vec<ComponentMemory>,
  scope: HashMap<String, Value>,
}

/// Point-in-time copy of one item's memory, used for rendering.
#[derive(Debug, Clone)]
pub struct ItemSnapshot {
  index: Arc<HashMap<String, usize>>,
  item: ItemMemory,
}

impl ItemSnapshot {
  pub fn component(&self, slot: usize) -> &ComponentMemory {
    &self.item.components[slot]
  }

  pub fn scope(&self) -> &HashMap<String, Value> {
    &self.item.scope
  }
}

impl Bindings for ItemSnapshot {
  fn binding(&self, id: &str) -> Option<Cow<'_, Value>> {
    if let Some(value) = self.item.scope.get(id) {
      return Some(Cow::Borrowed(value));
    }
    let slot = *self.index.get(id)?;
    Some(Cow::Owned(self.item.components[slot].to_binding()))
  }
}

/// A component error found in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedError {
  pub item: usize,
  pub component_id: String,
  pub message: String,
}

/// Memory of one trigger (or one iterator body) across its batch.
pub struct Memory {
  trigger_id: String,
  ids: Vec<String>,
  index: Arc<HashMap<String, usize>>,
  items: Vec<Mutex<ItemMemory>>,
  notifier: Arc<dyn ExecutionNotifier>,
}

impl Memory {
  pub fn new(
    trigger_id: impl Into<String>,
    dag: &Dag,
    batch_size: usize,
    notifier: Arc<dyn ExecutionNotifier>,
  ) -> Self {
    let ids: Vec<String> = dag.components().iter().map(|c| c.id.clone()).collect();
    let items = (0..batch_size)
      .map(|_| {
        Mutex::new(ItemMemory {
          components: vec![ComponentMemory::default(); ids.len()],
          scope: HashMap::new(),
        })
      })
      .collect();

    Self {
      trigger_id: trigger_id.into(),
      index: Arc::new(dag.index().clone()),
      ids,
      items,
      notifier,
    }
  }

  pub fn trigger_id(&self) -> &str {
    &self.trigger_id
  }

  pub fn batch_size(&self) -> usize {
    self.items.len()
  }

  pub fn component_id(&self, slot: usize) -> &str {
    &self.ids[slot]
  }

  pub fn notifier(&self) -> Arc<dyn ExecutionNotifier> {
    self.notifier.clone()
  }

  fn item(&self, item: usize) -> MutexGuard<'_, ItemMemory> {
    self.items[item].lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Bind a non-component name (e.g. `variable`, `secret`) for one item.
  pub fn set_scope(&self, item: usize, key: impl Into<String>, value: Value) {
    self.item(item).scope.insert(key.into(), value);
  }

  pub fn scope(&self, item: usize, key: &str) -> Option<Value> {
    self.item(item).scope.get(key).cloned()
  }

  pub fn snapshot(&self, item: usize) -> ItemSnapshot {
    ItemSnapshot {
      index: self.index.clone(),
      item: self.item(item).clone(),
    }
  }

  pub fn component(&self, item: usize, slot: usize) -> ComponentMemory {
    self.item(item).components[slot].clone()
  }

  pub fn status(&self, item: usize, slot: usize) -> Status {
    self.item(item).components[slot].status
  }

  pub fn set_status(&self, item: usize, slot: usize, status: Status) -> Result<(), MemoryError> {
    {
      let mut memory = self.item(item);
      let current = memory.components[slot].status;
      if !current.can_transition_to(status) {
        return Err(MemoryError::InvalidTransition {
          item,
          component_id: self.ids[slot].clone(),
          from: current,
          to: status,
        });
      }
      memory.components[slot].status = status;
    }

    self.notifier.notify(ExecutionEvent::ComponentStatusUpdated {
      trigger_id: self.trigger_id.clone(),
      item,
      component_id: self.ids[slot].clone(),
      status,
    });
    Ok(())
  }

  pub fn set_input(&self, item: usize, slot: usize, input: Value) -> Result<(), MemoryError> {
    self.write(item, slot, |c| c.input = Some(input.clone()))?;
    self.notifier.notify(ExecutionEvent::ComponentInputUpdated {
      trigger_id: self.trigger_id.clone(),
      item,
      component_id: self.ids[slot].clone(),
      input,
    });
    Ok(())
  }

  pub fn set_output(&self, item: usize, slot: usize, output: Value) -> Result<(), MemoryError> {
    self.write(item, slot, |c| c.output = Some(output.clone()))?;
    self.notifier.notify(ExecutionEvent::ComponentOutputUpdated {
      trigger_id: self.trigger_id.clone(),
      item,
      component_id: self.ids[slot].clone(),
      output,
    });
    Ok(())
  }

  /// Record `message` and move the cell to Errored.
  pub fn fail(&self, item: usize, slot: usize, message: impl Into<String>) -> Result<(), MemoryError> {
    let message = message.into();
    self.write(item, slot, |c| c.error = Some(message.clone()))?;
    self.notifier.notify(ExecutionEvent::ComponentErrorUpdated {
      trigger_id: self.trigger_id.clone(),
      item,
      component_id: self.ids[slot].clone(),
      message,
    });
    self.set_status(item, slot, Status::Errored)
  }

  /// Fail every cell that has not reached a terminal status. Returns how
  /// many cells were failed.
  pub fn fail_pending(&self, message: &str) -> usize {
    let mut failed = 0;
    for item in 0..self.items.len() {
      for slot in 0..self.ids.len() {
        if !self.status(item, slot).is_terminal() && self.fail(item, slot, message).is_ok() {
          failed += 1;
        }
      }
    }
    failed
  }

  /// The first errored cell in (item, slot) order.
  pub fn first_error(&self) -> Option<RecordedError> {
    (0..self.items.len()).find_map(|item| {
      let memory = self.item(item);
      memory
        .components
        .iter()
        .enumerate()
        .find(|(_, c)| c.status == Status::Errored)
        .map(|(slot, c)| RecordedError {
          item,
          component_id: self.ids[slot].clone(),
          message: c.error.clone().unwrap_or_default(),
        })
    })
  }

  /// Per-component view across the batch. Inputs and outputs are only
  /// included when `full` is set.
  pub fn trace(&self, full: bool) -> Trace {
    let items: Vec<ItemMemory> = (0..self.items.len()).map(|i| self.item(i).clone()).collect();
    let mut trace = IndexMap::with_capacity(self.ids.len());
    for (slot, id) in self.ids.iter().enumerate() {
      let cells = || items.iter().map(move |i| &i.components[slot]);
      trace.insert(
        id.clone(),
        ComponentTrace {
          statuses: cells().map(|c| c.status).collect(),
          inputs: full.then(|| cells().map(|c| c.input.clone().unwrap_or(Value::Null)).collect()),
          outputs: full.then(|| cells().map(|c| c.output.clone().unwrap_or(Value::Null)).collect()),
          errors: cells().map(|c| c.error.clone()).collect(),
        },
      );
    }
    trace
  }

  fn write(
    &self,
    item: usize,
    slot: usize,
    update: impl FnOnce(&mut ComponentMemory),
  ) -> Result<(), MemoryError> {
    let mut memory = self.item(item);
    let cell = &mut memory.components[slot];
    if cell.status.is_terminal() {
      return Err(MemoryError::TerminalStatus {
        item,
        component_id: self.ids[slot].clone(),
        status: cell.status,
      });
    }
    update(cell);
    Ok(())
  }
}
