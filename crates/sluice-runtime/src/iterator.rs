//! Iterator components: expand an array or integer range into a nested
//! batch, run the body plan over it and collect per-element outputs.

use std::collections::HashMap;

use serde_json::{Map, Value, json};
use sluice_config::RangeDef;
use sluice_expression::{Bindings, render_input, render_input_lenient};
use sluice_workflow::{Component, IteratorSpec, Plan};
use tracing::debug;

use crate::driver::CellFailure;
use crate::engine::PipelineEngine;
use crate::memory::{ItemSnapshot, Memory, Status};

/// Rendered range bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeBounds {
  pub start: i64,
  pub stop: i64,
  pub step: Option<i64>,
}

/// Indexes produced by a range. Without a step the range counts up by one
/// and `stop` may not be smaller than `start`; with a step the sign must
/// match the direction. `stop` is exclusive. Ranges longer than `limit` are
/// rejected before anything is allocated.
pub fn range_indexes(bounds: RangeBounds, limit: usize) -> Result<Vec<i64>, String> {
  let RangeBounds { start, stop, step } = bounds;
  let step = match step {
    None if start > stop => {
      return Err("iterator range error, the `stop` should be larger then `start`".to_string());
    }
    None => 1,
    Some(0) => return Err("iterator range error, the `step` should not be zero".to_string()),
    Some(step) if start > stop && step > 0 => {
      return Err("iterator range error, the `step` should be negative".to_string());
    }
    Some(step) if start < stop && step < 0 => {
      return Err("iterator range error, the `step` should be positive".to_string());
    }
    Some(step) => step,
  };

  // i128 holds any i64 difference.
  let span = (i128::from(stop) - i128::from(start)).unsigned_abs();
  let stride = i128::from(step).unsigned_abs();
  let count = span.div_ceil(stride);
  if count > limit as u128 {
    return Err(format!(
      "iterator range error, the range has {} elements, more than the limit of {}",
      count, limit
    ));
  }

  Ok(
    (0..count as i128)
      .map(|k| (i128::from(start) + k * i128::from(step)) as i64)
      .collect(),
  )
}

/// Render every bound of a range and read them as integers.
pub fn render_range<B: Bindings + ?Sized>(
  range: &RangeDef,
  bindings: &B,
) -> Result<(Value, RangeBounds), String> {
  match range {
    RangeDef::Bounds(values) => {
      if !(2..=3).contains(&values.len()) {
        return Err("iterator range error, must be in the form [start, stop[, step]]".to_string());
      }
      let rendered = render_input(&Value::Array(values.clone()), bindings).map_err(|e| e.to_string())?;
      let Value::Array(bounds) = &rendered else {
        return Err("iterator range error".to_string());
      };
      let bounds = RangeBounds {
        start: integer(&bounds[0], "start")?,
        stop: integer(&bounds[1], "stop")?,
        step: bounds.get(2).map(|s| integer(s, "step")).transpose()?,
      };
      Ok((rendered, bounds))
    }
    RangeDef::Named { start, stop, step } => {
      let mut rendered = Map::new();
      let mut bound = |name: &str, value: &Option<Value>| -> Result<Option<i64>, String> {
        let Some(value) = value else {
          return Ok(None);
        };
        let value = render_input(value, bindings).map_err(|e| e.to_string())?;
        let number = integer(&value, name)?;
        rendered.insert(name.to_string(), value);
        Ok(Some(number))
      };
      let start = bound("start", start)?
        .ok_or_else(|| "iterator range error, `start` is missing".to_string())?;
      let stop = bound("stop", stop)?
        .ok_or_else(|| "iterator range error, `stop` is missing".to_string())?;
      let step = bound("step", step)?;
      Ok((Value::Object(rendered), RangeBounds { start, stop, step }))
    }
  }
}

fn integer(value: &Value, name: &str) -> Result<i64, String> {
  value
    .as_i64()
    .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
    .ok_or_else(|| format!("iterator range error, `{}` must be an integer, got {}", name, value))
}

impl PipelineEngine {
  #[allow(clippy::too_many_arguments)]
  pub(crate) async fn run_iterator(
    &self,
    plan: &Plan,
    component: &Component,
    spec: &IteratorSpec,
    memory: &Memory,
    snapshot: &ItemSnapshot,
    slot: usize,
    item: usize,
  ) -> Result<(), CellFailure> {
    let body = plan
      .nested(slot)
      .ok_or_else(|| CellFailure(format!("iterator '{}' has no body", component.id)))?;

    let (input, elements) = match &spec.range {
      Some(range) => {
        let (rendered, bounds) = render_range(&range.bounds, snapshot).map_err(CellFailure)?;
        let indexes = range_indexes(bounds, self.config().max_iterations).map_err(CellFailure)?;
        (rendered, indexes.into_iter().map(Value::from).collect::<Vec<_>>())
      }
      None => match render_input(&component.input, snapshot)? {
        Value::Array(elements) if elements.len() > self.config().max_iterations => {
          return Err(CellFailure(format!(
            "iterator input has {} elements, more than the limit of {}",
            elements.len(),
            self.config().max_iterations
          )));
        }
        Value::Array(elements) => (Value::Array(elements.clone()), elements),
        other => {
          return Err(CellFailure(format!(
            "iterator input must resolve to an array, got {}",
            other
          )));
        }
      },
    };
    memory.set_input(item, slot, input)?;
    memory.set_status(item, slot, Status::Started)?;

    // Outer bindings the body may reference: upstream components plus scope.
    let mut inherited: HashMap<String, Value> = plan
      .dag()
      .ancestors(slot)
      .map(|a| (plan.dag().component(a).id.clone(), snapshot.component(a).to_binding()))
      .collect();
    inherited.extend(snapshot.scope().iter().map(|(k, v)| (k.clone(), v.clone())));

    let child = Memory::new(
      format!("{}:{}:{}", memory.trigger_id(), item, component.id),
      body.dag(),
      elements.len(),
      memory.notifier(),
    );
    for (e, element) in elements.iter().enumerate() {
      for (key, value) in &inherited {
        child.set_scope(e, key.clone(), value.clone());
      }
      child.set_scope(e, component.id.clone(), json!({ "element": element }));
      if let Some(range) = &spec.range {
        child.set_scope(e, range.index.clone(), element.clone());
      }
    }

    debug!(elements = elements.len(), "iterator_started");
    self.run_plan(body, &child).await;

    if let Some(failure) = child.first_error() {
      return Err(CellFailure(format!(
        "{}[{}] '{}': {}",
        component.id, failure.item, failure.component_id, failure.message
      )));
    }

    let mut output = Map::new();
    for (name, template) in &spec.output_elements {
      let template = Value::String(template.clone());
      let values = (0..elements.len())
        .map(|e| render_input_lenient(&template, &child.snapshot(e)))
        .collect::<Result<Vec<_>, _>>()?;
      output.insert(name.clone(), Value::Array(values));
    }
    memory.set_output(item, slot, Value::Object(output))?;
    memory.set_status(item, slot, Status::Completed)?;
    Ok(())
  }
}
