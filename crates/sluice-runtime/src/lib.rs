//! Sluice Runtime
//!
//! Executes prepared pipelines over batches of trigger payloads.
//!
//! ```text
//!            TriggerRequest { items: [p0, p1, p2], secrets }
//!                              │
//!   PipelineEngine::execute ───┤  Memory: one record per (component, item)
//!                              ▼
//!   group 0:  [variable×3]                       join_all
//!   group 1:  [fetch×3, rank×3]                  join_all
//!   group 2:  [loop×3] ──▶ nested plan over each item's elements
//!   group 3:  [output×3]
//!                              │
//!                              ▼
//!            TriggerResult { outputs, trace, status }
//! ```
//!
//! A cell whose upstream skipped or errored is skipped; a cell whose
//! condition is false is skipped; anything else calls its [`Capability`]
//! through the [`CapabilityRegistry`]. Failures stay local to their item.

mod capability;
mod config;
mod driver;
mod engine;
mod error;
mod events;
mod iterator;
mod job;
mod memory;
mod result;
mod runner;

pub use capability::{Capability, CapabilityCall, CapabilityRegistry};
pub use config::RuntimeConfig;
pub use engine::{PipelineEngine, PreparedPipeline};
pub use error::{CapabilityError, MemoryError, RuntimeError};
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use iterator::{RangeBounds, range_indexes, render_range};
pub use job::Job;
pub use memory::{ComponentMemory, ItemSnapshot, Memory, RecordedError, Status};
pub use result::{ComponentTrace, Trace, TriggerRequest, TriggerResult, TriggerStatus};
pub use runner::{PipelineRunner, TriggerEnvelope, TriggerReply};
pub use sluice_workflow::CapabilityKind;
