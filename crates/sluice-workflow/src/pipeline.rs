use indexmap::IndexMap;

use crate::component::Component;

/// A resolved recipe: typed components in declaration order.
///
/// The start component, when present, comes first and the end component last.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
  pub version: String,
  pub components: Vec<Component>,
  /// Recipe-level secrets.
  pub secrets: IndexMap<String, String>,
}

impl Pipeline {
  /// Get a top-level component by ID.
  pub fn component(&self, id: &str) -> Option<&Component> {
    self.components.iter().find(|c| c.id == id)
  }

  pub fn start(&self) -> Option<&Component> {
    self.components.iter().find(|c| c.is_start())
  }
}
