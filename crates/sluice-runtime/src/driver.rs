//! Group-by-group scheduling of (component, item) cells.

use std::future::Future;
use std::pin::Pin;

use futures::future::join_all;
use serde_json::{Map, Value};
use sluice_expression::{ExpressionError, evaluate_condition, render_input, render_input_lenient};
use sluice_workflow::{Component, ComponentKind, Plan, START_ID, StartSpec, TaskSpec};
use tracing::{Instrument, debug, debug_span, instrument, warn};

use crate::capability::CapabilityCall;
use crate::engine::PipelineEngine;
use crate::error::{CapabilityError, MemoryError};
use crate::job::Job;
use crate::memory::{Memory, Status};

/// Why a cell ended Errored. The message is what gets recorded.
#[derive(Debug)]
pub(crate) struct CellFailure(pub(crate) String);

impl From<ExpressionError> for CellFailure {
  fn from(e: ExpressionError) -> Self {
    Self(e.to_string())
  }
}

impl From<MemoryError> for CellFailure {
  fn from(e: MemoryError) -> Self {
    Self(e.to_string())
  }
}

impl From<CapabilityError> for CellFailure {
  fn from(e: CapabilityError) -> Self {
    Self(e.to_string())
  }
}

impl PipelineEngine {
  /// Run every group of `plan` in order. Cells within a group run
  /// concurrently across components and batch items.
  pub(crate) fn run_plan<'a>(
    &'a self,
    plan: &'a Plan,
    memory: &'a Memory,
  ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
      for (number, group) in plan.schedule().groups().iter().enumerate() {
        debug!(
          trigger_id = %memory.trigger_id(),
          group = number,
          components = group.len(),
          "group_started"
        );
        let cells = group
          .iter()
          .flat_map(|&slot| (0..memory.batch_size()).map(move |item| (slot, item)))
          .map(|(slot, item)| self.run_cell(plan, memory, slot, item));
        join_all(cells)
          .instrument(debug_span!("group", trigger_id = %memory.trigger_id(), group = number))
          .await;
      }
    })
  }

  #[instrument(
    name = "component",
    skip_all,
    fields(
      trigger_id = %memory.trigger_id(),
      component_id = %plan.dag().component(slot).id,
      item = item
    )
  )]
  async fn run_cell(&self, plan: &Plan, memory: &Memory, slot: usize, item: usize) {
    let component = plan.dag().component(slot);

    // The end component reports whatever upstream produced, so it is never skipped.
    if !matches!(component.kind, ComponentKind::End)
      && let Some(upstream) = plan
        .dag()
        .ancestors(slot)
        .find(|&a| matches!(memory.status(item, a), Status::Skipped | Status::Errored))
    {
      debug!(upstream = %plan.dag().component(upstream).id, "component_skipped");
      if let Err(e) = memory.set_status(item, slot, Status::Skipped) {
        warn!(error = %e, "component_status_rejected");
      }
      return;
    }

    let result = match &component.kind {
      ComponentKind::Start(spec) => run_start(spec, memory, slot, item),
      ComponentKind::End => run_end(component, memory, slot, item),
      _ => self.run_gated(plan, component, memory, slot, item).await,
    };

    if let Err(CellFailure(message)) = result {
      warn!(error = %message, "component_errored");
      if let Err(e) = memory.fail(item, slot, message) {
        warn!(error = %e, "component_error_rejected");
      }
    }
  }

  /// Evaluate the condition, then run the task or iterator body.
  async fn run_gated(
    &self,
    plan: &Plan,
    component: &Component,
    memory: &Memory,
    slot: usize,
    item: usize,
  ) -> Result<(), CellFailure> {
    let snapshot = memory.snapshot(item);
    if let Some(condition) = &component.condition
      && !evaluate_condition(condition, &snapshot)?
    {
      debug!("component_condition_false");
      memory.set_status(item, slot, Status::Skipped)?;
      return Ok(());
    }

    match &component.kind {
      ComponentKind::Connector(task) | ComponentKind::Operator(task) => {
        let input = render_input(&component.input, &snapshot)?;
        let setup = render_input(&task.setup, &snapshot)?;
        self.run_task(component, task, memory, slot, item, input, setup).await
      }
      ComponentKind::Iterator(spec) => {
        self
          .run_iterator(plan, component, spec, memory, &snapshot, slot, item)
          .await
      }
      ComponentKind::Start(_) | ComponentKind::End => Ok(()),
    }
  }

  /// Call the capability with a per-attempt timeout, retrying timeouts and
  /// retryable failures up to `max_call_attempts`.
  #[allow(clippy::too_many_arguments)]
  async fn run_task(
    &self,
    component: &Component,
    task: &TaskSpec,
    memory: &Memory,
    slot: usize,
    item: usize,
    input: Value,
    setup: Value,
  ) -> Result<(), CellFailure> {
    memory.set_input(item, slot, input.clone())?;
    memory.set_status(item, slot, Status::Started)?;

    let capability = self.registry().get(&task.definition).ok_or_else(|| {
      CellFailure(format!("no capability registered for '{}'", task.definition))
    })?;
    let _permit = self
      .limiter
      .acquire()
      .await
      .map_err(|_| CellFailure("capability limiter closed".to_string()))?;

    let config = self.config();
    let attempts = config.max_call_attempts.max(1);
    let mut last_failure = String::new();
    for attempt in 1..=attempts {
      let call = CapabilityCall {
        component_id: &component.id,
        definition: &task.definition,
        task: &task.task,
        setup: &setup,
        attempt,
      };
      let job = Job::new(memory, item, slot, input.clone());

      let outcome = tokio::time::timeout(config.call_timeout(), capability.execute(&call, &job)).await;
      // An error reported on the job is final, whatever the call returned.
      if let Some(message) = job.reported_error() {
        return Err(CellFailure(message));
      }

      match outcome {
        Ok(Ok(())) => {
          memory.set_status(item, slot, Status::Completed)?;
          debug!(attempt, "component_completed");
          return Ok(());
        }
        Ok(Err(e)) if e.is_retryable() => {
          warn!(attempt, error = %e, "capability_call_failed");
          last_failure = e.to_string();
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
          warn!(attempt, timeout_ms = config.call_timeout_ms, "capability_call_timed_out");
          last_failure = format!("capability call timed out after {}ms", config.call_timeout_ms);
        }
      }
    }

    Err(CellFailure(last_failure))
  }
}

/// Apply variable defaults to the item's payload and enforce required ones.
fn run_start(spec: &StartSpec, memory: &Memory, slot: usize, item: usize) -> Result<(), CellFailure> {
  let payload = memory
    .scope(item, START_ID)
    .unwrap_or_else(|| Value::Object(Map::new()));
  memory.set_input(item, slot, payload.clone())?;
  memory.set_status(item, slot, Status::Started)?;

  let Value::Object(mut variables) = payload else {
    return Err(CellFailure("trigger payload must be a JSON object".to_string()));
  };
  for (name, def) in &spec.variables {
    if variables.contains_key(name) {
      continue;
    }
    match &def.default {
      Some(default) => {
        variables.insert(name.clone(), default.clone());
      }
      None if def.required => {
        return Err(CellFailure(format!("missing required variable '{}'", name)));
      }
      None => {}
    }
  }

  let variables = Value::Object(variables);
  memory.set_scope(item, START_ID, variables.clone());
  memory.set_output(item, slot, variables)?;
  memory.set_status(item, slot, Status::Completed)?;
  Ok(())
}

/// Render the `output` section. Unresolvable references become `null`.
fn run_end(component: &Component, memory: &Memory, slot: usize, item: usize) -> Result<(), CellFailure> {
  let output = render_input_lenient(&component.input, &memory.snapshot(item))?;
  memory.set_input(item, slot, output.clone())?;
  memory.set_status(item, slot, Status::Started)?;
  memory.set_output(item, slot, output)?;
  memory.set_status(item, slot, Status::Completed)?;
  Ok(())
}
