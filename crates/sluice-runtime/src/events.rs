//! Execution events and notifiers for observability.
//!
//! Every memory write emits an event, so a consumer sees each component's
//! status, input, output and error as they change, per batch item.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::memory::Status;
use crate::result::TriggerStatus;

/// Events emitted during trigger execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// A trigger has been scheduled.
  TriggerStarted { trigger_id: String, batch_size: usize },

  /// A component changed status for one item.
  ComponentStatusUpdated {
    trigger_id: String,
    item: usize,
    component_id: String,
    status: Status,
  },

  /// A component's rendered input was recorded.
  ComponentInputUpdated {
    trigger_id: String,
    item: usize,
    component_id: String,
    input: serde_json::Value,
  },

  /// A component wrote its output.
  ComponentOutputUpdated {
    trigger_id: String,
    item: usize,
    component_id: String,
    output: serde_json::Value,
  },

  /// A component recorded an error message.
  ComponentErrorUpdated {
    trigger_id: String,
    item: usize,
    component_id: String,
    message: String,
  },

  /// Every schedule group has run, or the trigger was cut short.
  TriggerCompleted {
    trigger_id: String,
    status: TriggerStatus,
  },

  /// The trigger could not run at all.
  TriggerFailed { trigger_id: String, error: String },
}

/// Receives execution events.
///
/// Implementations decide what to do with them (persist, broadcast, log,
/// ignore). `notify` is called from inside the scheduler and must not block.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// Sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls the scheduler.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
