//! End-to-end trigger execution against mock capabilities.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use sluice_config::Recipe;
use sluice_runtime::{
  Capability, CapabilityCall, CapabilityError, CapabilityKind, CapabilityRegistry, ChannelNotifier,
  ExecutionEvent, Job, PipelineEngine, PipelineRunner, RuntimeConfig, RuntimeError, Status,
  TriggerRequest, TriggerStatus,
};
use tokio_util::sync::CancellationToken;

/// Writes its input back as output.
struct Echo;

#[async_trait]
impl Capability for Echo {
  fn kind(&self) -> CapabilityKind {
    CapabilityKind::Operator
  }

  async fn execute(&self, _call: &CapabilityCall<'_>, job: &Job<'_>) -> Result<(), CapabilityError> {
    job.write(job.read().clone())
  }
}

/// Writes its rendered setup as output.
struct Setup;

#[async_trait]
impl Capability for Setup {
  fn kind(&self) -> CapabilityKind {
    CapabilityKind::Connector
  }

  async fn execute(&self, call: &CapabilityCall<'_>, job: &Job<'_>) -> Result<(), CapabilityError> {
    job.write(call.setup.clone())
  }
}

/// Fails the item when its input is `"bad"`.
struct Picky;

#[async_trait]
impl Capability for Picky {
  fn kind(&self) -> CapabilityKind {
    CapabilityKind::Operator
  }

  async fn execute(&self, _call: &CapabilityCall<'_>, job: &Job<'_>) -> Result<(), CapabilityError> {
    if job.read() == "bad" {
      job.error("bad input");
      return Ok(());
    }
    job.write(json!({ "ok": job.read() }))
  }
}

/// Fails with a retryable error until `succeed_on` attempts have been made.
struct Flaky {
  calls: Arc<AtomicU32>,
  succeed_on: u32,
}

#[async_trait]
impl Capability for Flaky {
  fn kind(&self) -> CapabilityKind {
    CapabilityKind::Connector
  }

  async fn execute(&self, call: &CapabilityCall<'_>, job: &Job<'_>) -> Result<(), CapabilityError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if call.attempt < self.succeed_on {
      return Err(CapabilityError::transient("connection reset"));
    }
    job.write(json!(call.attempt))
  }
}

/// Reports an item error and asks for a retry on the first attempt.
struct RejectsThenRecovers {
  calls: Arc<AtomicU32>,
}

#[async_trait]
impl Capability for RejectsThenRecovers {
  fn kind(&self) -> CapabilityKind {
    CapabilityKind::Connector
  }

  async fn execute(&self, call: &CapabilityCall<'_>, job: &Job<'_>) -> Result<(), CapabilityError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if call.attempt == 1 {
      job.error("item is invalid");
      return Err(CapabilityError::transient("connection reset"));
    }
    job.write(json!("recovered"))
  }
}

struct Slow;

#[async_trait]
impl Capability for Slow {
  fn kind(&self) -> CapabilityKind {
    CapabilityKind::Connector
  }

  async fn execute(&self, _call: &CapabilityCall<'_>, job: &Job<'_>) -> Result<(), CapabilityError> {
    tokio::time::sleep(Duration::from_secs(30)).await;
    job.write(Value::Null)
  }
}

fn registry() -> CapabilityRegistry {
  CapabilityRegistry::new()
    .with("echo", Echo)
    .with("setup", Setup)
    .with("picky", Picky)
    .with("slow", Slow)
}

fn engine(config: RuntimeConfig) -> PipelineEngine {
  PipelineEngine::new(registry(), config)
}

fn recipe(value: Value) -> Recipe {
  serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_linear_pipeline_outputs() {
  let engine = engine(RuntimeConfig::default());
  let recipe = recipe(json!({
    "variable": { "name": { "required": true }, "greeting": { "default": "hello" } },
    "component": {
      "greet": { "type": "echo", "input": "${variable.greeting}, ${variable.name}" },
      "wrap": { "type": "echo", "input": { "text": "${greet.output}", "done": "${greet.status.completed}" } }
    },
    "output": { "message": { "value": "${wrap.output.text}" }, "done": { "value": "${wrap.output.done}" } }
  }));

  let result = engine
    .trigger(recipe, TriggerRequest::single(json!({ "name": "ada" })), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(result.status, TriggerStatus::Completed);
  assert_eq!(result.outputs, vec![json!({ "message": "hello, ada", "done": true })]);
  assert_eq!(result.statuses("wrap").unwrap(), &[Status::Completed]);
  let trace = &result.trace["greet"];
  assert_eq!(trace.inputs.as_ref().unwrap()[0], json!("hello, ada"));

  // The end component records what it rendered, not its templates.
  let end = &result.trace["output"];
  assert_eq!(
    end.inputs.as_ref().unwrap()[0],
    json!({ "message": "hello, ada", "done": true })
  );
}

#[tokio::test]
async fn test_item_failure_stays_local() {
  let engine = engine(RuntimeConfig::default());
  let recipe = recipe(json!({
    "variable": { "value": {} },
    "component": {
      "check": { "type": "picky", "input": "${variable.value}" },
      "after": { "type": "echo", "input": "${check.output.ok}" }
    },
    "output": { "result": { "value": "${after.output}" } }
  }));

  let request = TriggerRequest::new(vec![
    json!({ "value": "a" }),
    json!({ "value": "bad" }),
    json!({ "value": "c" }),
  ]);
  let result = engine
    .trigger(recipe, request, CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(
    result.statuses("check").unwrap(),
    &[Status::Completed, Status::Errored, Status::Completed]
  );
  assert_eq!(
    result.statuses("after").unwrap(),
    &[Status::Completed, Status::Skipped, Status::Completed]
  );
  assert_eq!(result.trace["check"].errors[1].as_deref(), Some("bad input"));
  assert_eq!(result.failed_items(), vec![1]);
  assert_eq!(result.status, TriggerStatus::Failed);

  // The end component still reports, with nulls for what never ran.
  assert_eq!(
    result.outputs,
    vec![json!({ "result": "a" }), json!({ "result": null }), json!({ "result": "c" })]
  );
}

#[tokio::test]
async fn test_condition_skips_downstream() {
  let engine = engine(RuntimeConfig::default());
  let recipe = recipe(json!({
    "variable": { "n": {} },
    "component": {
      "big": { "type": "echo", "input": "${variable.n}", "condition": "${variable.n} > 10" },
      "after": { "type": "echo", "input": "${big.output}" },
      "always": { "type": "echo", "input": "${variable.n}" }
    }
  }));

  let request = TriggerRequest::new(vec![json!({ "n": 3 }), json!({ "n": 30 })]);
  let result = engine
    .trigger(recipe, request, CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(result.statuses("big").unwrap(), &[Status::Skipped, Status::Completed]);
  assert_eq!(result.statuses("after").unwrap(), &[Status::Skipped, Status::Completed]);
  assert_eq!(result.statuses("always").unwrap(), &[Status::Completed, Status::Completed]);
  assert_eq!(result.outputs, vec![Value::Null, Value::Null]);
}

#[tokio::test]
async fn test_missing_required_variable() {
  let engine = engine(RuntimeConfig::default());
  let recipe = recipe(json!({
    "variable": { "name": { "required": true } },
    "component": { "greet": { "type": "echo", "input": "${variable.name}" } }
  }));

  let result = engine
    .trigger(recipe, TriggerRequest::single(json!({})), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(result.statuses("variable").unwrap(), &[Status::Errored]);
  assert_eq!(result.statuses("greet").unwrap(), &[Status::Skipped]);
  assert!(result.trace["variable"].errors[0].as_deref().unwrap().contains("'name'"));
}

#[tokio::test]
async fn test_iterator_over_array() {
  let engine = engine(RuntimeConfig::default());
  let recipe = recipe(json!({
    "variable": { "words": {}, "suffix": { "default": "!" } },
    "component": {
      "each": {
        "type": "iterator",
        "input": "${variable.words}",
        "component": {
          "shout": { "type": "echo", "input": "${each.element}${variable.suffix}" }
        },
        "outputElements": { "shouted": "${shout.output}" }
      }
    },
    "output": { "result": { "value": "${each.output.shouted}" } }
  }));

  let request = TriggerRequest::new(vec![json!({ "words": ["a", "b"] }), json!({ "words": [] })]);
  let result = engine
    .trigger(recipe, request, CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(
    result.outputs,
    vec![json!({ "result": ["a!", "b!"] }), json!({ "result": [] })]
  );
}

#[tokio::test]
async fn test_iterator_over_range() {
  let engine = engine(RuntimeConfig::default());
  let recipe = recipe(json!({
    "variable": { "n": {} },
    "component": {
      "loop": {
        "type": "iterator",
        "range": { "start": 0, "stop": "${variable.n}", "step": 2 },
        "index": "k",
        "component": {
          "square": { "type": "echo", "input": { "k": "${k}" } }
        },
        "outputElements": { "ks": "${square.output.k}" }
      }
    }
  }));

  let result = engine
    .trigger(recipe, TriggerRequest::single(json!({ "n": 5 })), CancellationToken::new())
    .await
    .unwrap();

  let outputs = result.trace["loop"].outputs.as_ref().unwrap();
  assert_eq!(outputs[0], json!({ "ks": [0, 2, 4] }));
}

#[tokio::test]
async fn test_oversized_range_fails_only_its_item() {
  let engine = engine(RuntimeConfig::default());
  let recipe = recipe(json!({
    "variable": { "n": {} },
    "component": {
      "loop": {
        "type": "iterator",
        "range": [0, "${variable.n}"],
        "component": { "copy": { "type": "echo", "input": "${i}" } },
        "outputElements": { "copies": "${copy.output}" }
      }
    },
    "output": { "copies": { "value": "${loop.output.copies}" } }
  }));

  let request = TriggerRequest::new(vec![json!({ "n": i64::MAX }), json!({ "n": 2 })]);
  let result = engine
    .trigger(recipe, request, CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(result.status, TriggerStatus::Failed);
  assert_eq!(result.statuses("loop").unwrap(), &[Status::Errored, Status::Completed]);
  let message = result.trace["loop"].errors[0].clone().unwrap();
  assert!(message.contains("more than the limit of 10000"));
  assert_eq!(
    result.outputs,
    vec![json!({ "copies": null }), json!({ "copies": [0, 1] })]
  );
}

#[tokio::test]
async fn test_iterator_child_error_fails_iterator() {
  let engine = engine(RuntimeConfig::default());
  let recipe = recipe(json!({
    "component": {
      "each": {
        "type": "iterator",
        "input": ["x", "bad"],
        "component": { "check": { "type": "picky", "input": "${each.element}" } },
        "outputElements": { "checked": "${check.output}" }
      },
      "after": { "type": "echo", "input": "${each.output}" }
    }
  }));

  let result = engine
    .trigger(recipe, TriggerRequest::single(json!({})), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(result.statuses("each").unwrap(), &[Status::Errored]);
  assert_eq!(result.statuses("after").unwrap(), &[Status::Skipped]);
  let message = result.trace["each"].errors[0].clone().unwrap();
  assert!(message.contains("bad input"));
}

#[tokio::test]
async fn test_secrets_overlay() {
  let engine = engine(RuntimeConfig::default());
  let recipe = recipe(json!({
    "secret": { "token": "recipe", "region": "eu" },
    "component": {
      "call": {
        "type": "setup",
        "setup": { "token": "${secret.token}", "region": "${secret.region}" }
      }
    }
  }));

  let request = TriggerRequest::single(json!({})).with_secret("token", "trigger");
  let result = engine
    .trigger(recipe, request, CancellationToken::new())
    .await
    .unwrap();

  let outputs = result.trace["call"].outputs.as_ref().unwrap();
  assert_eq!(outputs[0], json!({ "token": "trigger", "region": "eu" }));
}

#[tokio::test]
async fn test_retryable_failures_are_retried() {
  let calls = Arc::new(AtomicU32::new(0));
  let registry = registry().with(
    "flaky",
    Flaky {
      calls: calls.clone(),
      succeed_on: 3,
    },
  );
  let engine = PipelineEngine::new(registry, RuntimeConfig::default());
  let recipe = recipe(json!({ "component": { "call": { "type": "flaky" } } }));

  let result = engine
    .trigger(recipe, TriggerRequest::single(json!({})), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(calls.load(Ordering::SeqCst), 3);
  assert_eq!(result.statuses("call").unwrap(), &[Status::Completed]);
  assert_eq!(result.trace["call"].outputs.as_ref().unwrap()[0], json!(3));
}

#[tokio::test]
async fn test_retries_exhausted() {
  let calls = Arc::new(AtomicU32::new(0));
  let registry = registry().with(
    "flaky",
    Flaky {
      calls: calls.clone(),
      succeed_on: 5,
    },
  );
  let config = RuntimeConfig {
    max_call_attempts: 2,
    ..Default::default()
  };
  let engine = PipelineEngine::new(registry, config);
  let recipe = recipe(json!({ "component": { "call": { "type": "flaky" } } }));

  let result = engine
    .trigger(recipe, TriggerRequest::single(json!({})), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(calls.load(Ordering::SeqCst), 2);
  assert_eq!(result.statuses("call").unwrap(), &[Status::Errored]);
  assert_eq!(result.trace["call"].errors[0].as_deref(), Some("connection reset"));
}

#[tokio::test]
async fn test_reported_error_is_not_retried() {
  let calls = Arc::new(AtomicU32::new(0));
  let registry = registry().with(
    "rejects",
    RejectsThenRecovers {
      calls: calls.clone(),
    },
  );
  let engine = PipelineEngine::new(registry, RuntimeConfig::default());
  let recipe = recipe(json!({ "component": { "call": { "type": "rejects" } } }));

  let result = engine
    .trigger(recipe, TriggerRequest::single(json!({})), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(calls.load(Ordering::SeqCst), 1);
  assert_eq!(result.statuses("call").unwrap(), &[Status::Errored]);
  assert_eq!(result.trace["call"].errors[0].as_deref(), Some("item is invalid"));
}

#[tokio::test]
async fn test_call_timeout() {
  let config = RuntimeConfig {
    call_timeout_ms: 20,
    max_call_attempts: 1,
    ..Default::default()
  };
  let engine = engine(config);
  let recipe = recipe(json!({ "component": { "wait": { "type": "slow" } } }));

  let result = engine
    .trigger(recipe, TriggerRequest::single(json!({})), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(result.status, TriggerStatus::Failed);
  assert_eq!(result.statuses("wait").unwrap(), &[Status::Errored]);
  assert!(result.trace["wait"].errors[0].as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_deadline_exceeded() {
  let config = RuntimeConfig {
    trigger_timeout_ms: 50,
    ..Default::default()
  };
  let engine = engine(config);
  let recipe = recipe(json!({
    "component": {
      "wait": { "type": "slow" },
      "after": { "type": "echo", "input": "${wait.output}" }
    }
  }));

  let result = engine
    .trigger(recipe, TriggerRequest::single(json!({})), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(result.status, TriggerStatus::DeadlineExceeded);
  assert_eq!(result.statuses("wait").unwrap(), &[Status::Errored]);
  assert_eq!(result.statuses("after").unwrap(), &[Status::Errored]);
  assert_eq!(result.trace["wait"].errors[0].as_deref(), Some("trigger deadline exceeded"));
}

#[tokio::test]
async fn test_cancelled_trigger() {
  let engine = engine(RuntimeConfig::default());
  let recipe = recipe(json!({ "component": { "wait": { "type": "slow" } } }));
  let cancel = CancellationToken::new();
  cancel.cancel();

  let result = engine
    .trigger(recipe, TriggerRequest::single(json!({})), cancel)
    .await
    .unwrap();

  assert_eq!(result.status, TriggerStatus::Cancelled);
  assert_eq!(result.statuses("wait").unwrap(), &[Status::Errored]);
}

#[tokio::test]
async fn test_structural_errors_reject_trigger() {
  let engine = engine(RuntimeConfig::default());

  let unknown = recipe(json!({ "component": { "a": { "type": "echo", "input": "${nope.output}" } } }));
  let result = engine
    .trigger(unknown, TriggerRequest::single(json!({})), CancellationToken::new())
    .await;
  assert!(matches!(result, Err(RuntimeError::Workflow(_))));

  let fine = recipe(json!({ "component": { "a": { "type": "echo" } } }));
  let result = engine
    .trigger(fine, TriggerRequest::new(vec![]), CancellationToken::new())
    .await;
  assert!(matches!(result, Err(RuntimeError::EmptyBatch)));
}

#[tokio::test]
async fn test_events_are_streamed() {
  let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
  let engine = PipelineEngine::with_notifier(
    registry(),
    RuntimeConfig::default(),
    ChannelNotifier::new(sender),
  );
  let recipe = recipe(json!({ "component": { "a": { "type": "echo", "input": 1 } } }));

  engine
    .trigger(recipe, TriggerRequest::single(json!({})), CancellationToken::new())
    .await
    .unwrap();
  drop(engine);

  let mut events = Vec::new();
  while let Some(event) = receiver.recv().await {
    events.push(event);
  }

  assert!(matches!(events.first(), Some(ExecutionEvent::TriggerStarted { batch_size: 1, .. })));
  assert!(matches!(
    events.last(),
    Some(ExecutionEvent::TriggerCompleted { status: TriggerStatus::Completed, .. })
  ));
  assert!(events.iter().any(|e| matches!(
    e,
    ExecutionEvent::ComponentOutputUpdated { component_id, output, .. }
      if component_id == "a" && output == &json!(1)
  )));
}

#[tokio::test]
async fn test_runner_replies() {
  let engine = Arc::new(engine(RuntimeConfig::default()));
  let prepared = engine
    .prepare(recipe(json!({
      "variable": { "x": {} },
      "component": { "a": { "type": "echo", "input": "${variable.x}" } },
      "output": { "x": { "value": "${a.output}" } }
    })))
    .unwrap();
  let runner = PipelineRunner::new(engine, Arc::new(prepared));

  let reply = runner
    .run(TriggerRequest::single(json!({ "x": 7 })))
    .await
    .unwrap();

  let cancel = CancellationToken::new();
  let handle = tokio::spawn(runner.start(cancel.clone()));

  let result = reply.await.unwrap().unwrap();
  assert_eq!(result.outputs, vec![json!({ "x": 7 })]);

  cancel.cancel();
  assert!(handle.await.unwrap().is_ok());
}
