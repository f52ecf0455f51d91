use std::borrow::Cow;
use std::collections::HashMap;

use serde_json::Value;

/// Source of the values that references resolve against.
///
/// `binding` returns the data for the leading segment of a reference (a
/// component ID or a scope name such as `variable`); the rest of the path is
/// walked by the caller.
pub trait Bindings {
  fn binding(&self, id: &str) -> Option<Cow<'_, Value>>;
}

impl Bindings for HashMap<String, Value> {
  fn binding(&self, id: &str) -> Option<Cow<'_, Value>> {
    self.get(id).map(Cow::Borrowed)
  }
}

impl Bindings for serde_json::Map<String, Value> {
  fn binding(&self, id: &str) -> Option<Cow<'_, Value>> {
    self.get(id).map(Cow::Borrowed)
  }
}

impl<B: Bindings + ?Sized> Bindings for &B {
  fn binding(&self, id: &str) -> Option<Cow<'_, Value>> {
    (**self).binding(id)
  }
}
