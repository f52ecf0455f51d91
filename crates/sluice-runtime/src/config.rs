//! Runtime configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

/// Limits applied to every trigger. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
  /// Deadline for a whole trigger.
  pub trigger_timeout_ms: u64,
  /// Timeout of a single capability call.
  pub call_timeout_ms: u64,
  /// Attempts for calls that time out or fail with a retryable error.
  pub max_call_attempts: u32,
  /// Capability calls allowed in flight at once.
  pub max_concurrency: usize,
  /// Include rendered inputs and outputs in traces.
  pub full_trace: bool,
  /// Most elements a single iterator may expand to, per item.
  pub max_iterations: usize,
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      trigger_timeout_ms: 300_000,
      call_timeout_ms: 60_000,
      max_call_attempts: 3,
      max_concurrency: 16,
      full_trace: true,
      max_iterations: 10_000,
    }
  }
}

impl RuntimeConfig {
  pub fn from_json(content: &str) -> Result<Self, RuntimeError> {
    serde_json::from_str(content).map_err(|e| RuntimeError::Config {
      message: e.to_string(),
    })
  }

  /// Load a JSON config file.
  pub async fn load(path: &Path) -> Result<Self, RuntimeError> {
    let content = tokio::fs::read_to_string(path)
      .await
      .map_err(|e| RuntimeError::Config {
        message: format!("failed to read {}: {}", path.display(), e),
      })?;
    Self::from_json(&content)
  }

  pub fn trigger_timeout(&self) -> Duration {
    Duration::from_millis(self.trigger_timeout_ms)
  }

  pub fn call_timeout(&self) -> Duration {
    Duration::from_millis(self.call_timeout_ms)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_partial_config_keeps_defaults() {
    let config = RuntimeConfig::from_json(r#"{ "max_call_attempts": 5 }"#).unwrap();
    assert_eq!(config.max_call_attempts, 5);
    assert_eq!(config.trigger_timeout_ms, 300_000);
    assert_eq!(config.max_iterations, 10_000);
    assert!(config.full_trace);
  }

  #[test]
  fn test_invalid_config() {
    let result = RuntimeConfig::from_json(r#"{ "max_concurrency": "many" }"#);
    assert!(matches!(result, Err(RuntimeError::Config { .. })));
  }

  #[tokio::test]
  async fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    tokio::fs::write(&path, r#"{ "call_timeout_ms": 250, "full_trace": false }"#)
      .await
      .unwrap();

    let config = RuntimeConfig::load(&path).await.unwrap();
    assert_eq!(config.call_timeout(), Duration::from_millis(250));
    assert!(!config.full_trace);

    let missing = RuntimeConfig::load(&dir.path().join("nope.json")).await;
    assert!(matches!(missing, Err(RuntimeError::Config { .. })));
  }
}
