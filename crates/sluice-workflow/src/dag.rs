//! Dependency graph over an arena of components.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::component::{Component, RESERVED_SCOPES};
use crate::error::WorkflowError;
use crate::references::component_parents;
use crate::union_find::UnionFind;

/// Components addressed by dense slot, with prerequisite → dependent edges.
///
/// Alongside the adjacency lists the graph keeps a union-find over slots for
/// the single-connectivity check and each slot's transitive ancestors, both
/// updated on every edge insertion.
#[derive(Debug, Clone)]
pub struct Dag {
  components: Vec<Component>,
  index: HashMap<String, usize>,
  dependents: Vec<Vec<usize>>,
  prerequisites: Vec<Vec<usize>>,
  ancestors: Vec<BTreeSet<usize>>,
  sets: UnionFind,
  rooted: bool,
}

impl Dag {
  /// Create an edgeless graph. IDs must be unique.
  pub fn new(components: Vec<Component>) -> Result<Self, WorkflowError> {
    Self::with_rooting(components, true)
  }

  fn with_rooting(components: Vec<Component>, rooted: bool) -> Result<Self, WorkflowError> {
    let mut index = HashMap::with_capacity(components.len());
    for (slot, component) in components.iter().enumerate() {
      if index.insert(component.id.clone(), slot).is_some() {
        return Err(WorkflowError::DuplicateComponentId {
          component_id: component.id.clone(),
        });
      }
    }

    let len = components.len();
    Ok(Self {
      components,
      index,
      dependents: vec![Vec::new(); len],
      prerequisites: vec![Vec::new(); len],
      ancestors: vec![BTreeSet::new(); len],
      sets: UnionFind::new(len),
      rooted,
    })
  }

  /// Add an edge. Returns false if it already existed.
  ///
  /// # Panics
  ///
  /// Panics if either slot is out of range.
  pub fn add_edge(&mut self, from: usize, to: usize) -> bool {
    if self.dependents[from].contains(&to) {
      return false;
    }
    self.dependents[from].push(to);
    self.prerequisites[to].push(from);
    self.sets.union(from, to);

    // `to` and everything below it inherit `from` and its ancestors.
    let mut inherited = self.ancestors[from].clone();
    inherited.insert(from);
    let mut queue = VecDeque::from([to]);
    while let Some(slot) = queue.pop_front() {
      let before = self.ancestors[slot].len();
      self.ancestors[slot].extend(inherited.iter().copied());
      if self.ancestors[slot].len() > before {
        queue.extend(self.dependents[slot].iter().copied());
      }
    }
    true
  }

  pub fn len(&self) -> usize {
    self.components.len()
  }

  pub fn is_empty(&self) -> bool {
    self.components.is_empty()
  }

  pub fn slot(&self, id: &str) -> Option<usize> {
    self.index.get(id).copied()
  }

  pub fn component(&self, slot: usize) -> &Component {
    &self.components[slot]
  }

  pub fn components(&self) -> &[Component] {
    &self.components
  }

  /// Slot index by component ID.
  pub fn index(&self) -> &HashMap<String, usize> {
    &self.index
  }

  pub fn dependents(&self, slot: usize) -> &[usize] {
    &self.dependents[slot]
  }

  pub fn prerequisites(&self, slot: usize) -> &[usize] {
    &self.prerequisites[slot]
  }

  /// Transitive ancestors of a slot, in slot order.
  pub fn ancestors(&self, slot: usize) -> impl Iterator<Item = usize> + '_ {
    self.ancestors[slot].iter().copied()
  }

  /// IDs of every transitive ancestor of `id`.
  pub fn ancestor_ids(&self, id: &str) -> Vec<&str> {
    match self.slot(id) {
      Some(slot) => self
        .ancestors(slot)
        .map(|a| self.components[a].id.as_str())
        .collect(),
      None => Vec::new(),
    }
  }

  /// Number of weakly-connected components.
  pub fn connected_sets(&self) -> usize {
    self.sets.count()
  }

  /// Whether the graph must form a single connected component.
  pub fn requires_connectivity(&self) -> bool {
    self.rooted
  }
}

/// Build the graph of a top-level pipeline.
///
/// A start component gets an edge to every other component. References to
/// IDs that are neither components nor reserved scopes are errors.
pub fn generate_dag(components: Vec<Component>) -> Result<Dag, WorkflowError> {
  let external: HashSet<String> = RESERVED_SCOPES.iter().map(|s| s.to_string()).collect();
  build(components, &external, true)
}

/// Build the graph of an iterator body.
///
/// `outer` lists the IDs visible from enclosing scopes; references to them
/// produce no edge. Nested graphs are rooted at the iterator element, so they
/// need not be connected.
pub fn generate_nested_dag(
  components: Vec<Component>,
  outer: &HashSet<String>,
) -> Result<Dag, WorkflowError> {
  build(components, outer, false)
}

fn build(
  components: Vec<Component>,
  external: &HashSet<String>,
  rooted: bool,
) -> Result<Dag, WorkflowError> {
  let mut dag = Dag::with_rooting(components, rooted)?;

  let starts: Vec<usize> = (0..dag.len())
    .filter(|&slot| dag.components[slot].is_start())
    .collect();
  for &start in &starts {
    for slot in 0..dag.len() {
      if !starts.contains(&slot) {
        dag.add_edge(start, slot);
      }
    }
  }

  for slot in 0..dag.len() {
    let component = &dag.components[slot];
    let parents = component_parents(component)?;
    let id = component.id.clone();

    let mut edges = Vec::new();
    for (reference, in_condition) in parents
      .condition
      .into_iter()
      .map(|r| (r, true))
      .chain(parents.input.into_iter().map(|r| (r, false)))
    {
      if reference == id {
        return Err(WorkflowError::SelfReference { component_id: id });
      }
      match dag.slot(&reference) {
        Some(parent) => edges.push(parent),
        None if external.contains(&reference) => {}
        None if in_condition => {
          return Err(WorkflowError::NoConditionUpstreamComponent {
            component_id: id,
            reference,
          });
        }
        None => {
          return Err(WorkflowError::NoUpstreamComponent {
            component_id: id,
            reference,
          });
        }
      }
    }

    for parent in edges {
      dag.add_edge(parent, slot);
    }
  }

  Ok(dag)
}
