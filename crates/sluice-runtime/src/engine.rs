//! Pipeline engine: prepares recipes and runs triggers.

use std::sync::Arc;

use serde_json::{Map, Value};
use sluice_config::Recipe;
use sluice_workflow::{END_ID, Pipeline, Plan, Resolver, SECRET_SCOPE, START_ID};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::capability::CapabilityRegistry;
use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::memory::Memory;
use crate::result::{TriggerRequest, TriggerResult, TriggerStatus};

/// A resolved pipeline together with its validated plan.
///
/// Preparing once and executing many times skips graph validation on every
/// trigger.
#[derive(Debug, Clone)]
pub struct PreparedPipeline {
  pipeline: Pipeline,
  plan: Plan,
}

impl PreparedPipeline {
  pub fn pipeline(&self) -> &Pipeline {
    &self.pipeline
  }

  pub fn plan(&self) -> &Plan {
    &self.plan
  }
}

/// Runs pipelines against a capability registry.
pub struct PipelineEngine {
  registry: Arc<CapabilityRegistry>,
  config: RuntimeConfig,
  notifier: Arc<dyn ExecutionNotifier>,
  /// Bounds concurrent capability calls across every trigger on this engine.
  pub(crate) limiter: Arc<Semaphore>,
}

impl PipelineEngine {
  pub fn new(registry: CapabilityRegistry, config: RuntimeConfig) -> Self {
    Self::with_notifier(registry, config, NoopNotifier)
  }

  pub fn with_notifier(
    registry: CapabilityRegistry,
    config: RuntimeConfig,
    notifier: impl ExecutionNotifier + 'static,
  ) -> Self {
    let limiter = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
    Self {
      registry: Arc::new(registry),
      config,
      notifier: Arc::new(notifier),
      limiter,
    }
  }

  pub fn registry(&self) -> &CapabilityRegistry {
    &self.registry
  }

  pub fn config(&self) -> &RuntimeConfig {
    &self.config
  }

  /// Resolve a recipe and validate its graph, including iterator bodies.
  #[instrument(name = "prepare", skip_all, fields(version = %recipe.version))]
  pub fn prepare(&self, recipe: Recipe) -> Result<PreparedPipeline, RuntimeError> {
    let pipeline = Resolver::new(self.registry.as_ref()).resolve(recipe)?;
    let plan = Plan::build(pipeline.components.clone())?;
    info!(
      components = plan.dag().len(),
      groups = plan.schedule().len(),
      "pipeline_prepared"
    );
    Ok(PreparedPipeline { pipeline, plan })
  }

  /// Prepare and execute in one go.
  pub async fn trigger(
    &self,
    recipe: Recipe,
    request: TriggerRequest,
    cancel: CancellationToken,
  ) -> Result<TriggerResult, RuntimeError> {
    let prepared = self.prepare(recipe)?;
    self.execute(&prepared, request, cancel).await
  }

  /// Run one trigger over a batch of payloads.
  ///
  /// Per-item failures are recorded in the trace; the call only fails when
  /// the trigger cannot be scheduled. On deadline or cancellation every
  /// unfinished cell is marked errored and the partial result is returned.
  #[instrument(
    name = "trigger",
    skip_all,
    fields(trigger_id = tracing::field::Empty, batch_size = request.items.len())
  )]
  pub async fn execute(
    &self,
    prepared: &PreparedPipeline,
    request: TriggerRequest,
    cancel: CancellationToken,
  ) -> Result<TriggerResult, RuntimeError> {
    let trigger_id = uuid::Uuid::new_v4().to_string();
    tracing::Span::current().record("trigger_id", trigger_id.as_str());

    if request.items.is_empty() {
      self.notifier.notify(ExecutionEvent::TriggerFailed {
        trigger_id,
        error: RuntimeError::EmptyBatch.to_string(),
      });
      return Err(RuntimeError::EmptyBatch);
    }

    let plan = &prepared.plan;
    let memory = Memory::new(
      trigger_id.clone(),
      plan.dag(),
      request.items.len(),
      self.notifier.clone(),
    );

    let mut secrets: Map<String, Value> = prepared
      .pipeline
      .secrets
      .iter()
      .map(|(k, v)| (k.clone(), Value::String(v.clone())))
      .collect();
    secrets.extend(
      request
        .secrets
        .into_iter()
        .map(|(k, v)| (k, Value::String(v))),
    );
    let secrets = Value::Object(secrets);
    for (item, payload) in request.items.into_iter().enumerate() {
      memory.set_scope(item, SECRET_SCOPE, secrets.clone());
      memory.set_scope(item, START_ID, payload);
    }

    self.notifier.notify(ExecutionEvent::TriggerStarted {
      trigger_id: trigger_id.clone(),
      batch_size: memory.batch_size(),
    });
    info!(groups = plan.schedule().len(), "trigger_started");

    let interrupted = tokio::select! {
      _ = self.run_plan(plan, &memory) => None,
      _ = cancel.cancelled() => Some(TriggerStatus::Cancelled),
      _ = tokio::time::sleep(self.config.trigger_timeout()) => Some(TriggerStatus::DeadlineExceeded),
    };

    let status = match interrupted {
      None => match memory.first_error() {
        Some(failure) => {
          warn!(
            item = failure.item,
            component_id = %failure.component_id,
            error = %failure.message,
            "trigger_completed_with_errors"
          );
          TriggerStatus::Failed
        }
        None => {
          info!("trigger_completed");
          TriggerStatus::Completed
        }
      },
      Some(TriggerStatus::Cancelled) => {
        let failed = memory.fail_pending("trigger cancelled");
        warn!(unfinished = failed, "trigger_cancelled");
        TriggerStatus::Cancelled
      }
      Some(status) => {
        let failed = memory.fail_pending("trigger deadline exceeded");
        warn!(
          unfinished = failed,
          timeout_ms = self.config.trigger_timeout_ms,
          "trigger_deadline_exceeded"
        );
        status
      }
    };

    let outputs = match plan.dag().slot(END_ID) {
      Some(slot) => (0..memory.batch_size())
        .map(|item| memory.component(item, slot).output.unwrap_or(Value::Null))
        .collect(),
      None => vec![Value::Null; memory.batch_size()],
    };

    self.notifier.notify(ExecutionEvent::TriggerCompleted {
      trigger_id: trigger_id.clone(),
      status,
    });

    Ok(TriggerResult {
      trigger_id,
      status,
      outputs,
      trace: memory.trace(self.config.full_trace),
    })
  }
}
