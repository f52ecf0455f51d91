//! Capabilities shipped with the binary.

use async_trait::async_trait;
use sluice_runtime::{
  Capability, CapabilityCall, CapabilityError, CapabilityKind, CapabilityRegistry, Job,
};

/// Operator that writes its rendered input back as output.
pub struct Echo;

#[async_trait]
impl Capability for Echo {
  fn kind(&self) -> CapabilityKind {
    CapabilityKind::Operator
  }

  async fn execute(&self, _call: &CapabilityCall<'_>, job: &Job<'_>) -> Result<(), CapabilityError> {
    job.write(job.read().clone())
  }
}

pub fn registry() -> CapabilityRegistry {
  CapabilityRegistry::new().with("echo", Echo)
}
