use std::collections::VecDeque;

use crate::component::Component;
use crate::dag::Dag;
use crate::error::WorkflowError;

/// Execution groups. Group `i` depends only on groups before it, and no two
/// slots in one group depend on each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
  groups: Vec<Vec<usize>>,
}

impl Schedule {
  pub fn groups(&self) -> &[Vec<usize>] {
    &self.groups
  }

  pub fn len(&self) -> usize {
    self.groups.len()
  }

  pub fn is_empty(&self) -> bool {
    self.groups.is_empty()
  }

  /// Groups as component references.
  pub fn components<'d>(&self, dag: &'d Dag) -> Vec<Vec<&'d Component>> {
    self
      .groups
      .iter()
      .map(|group| group.iter().map(|&slot| dag.component(slot)).collect())
      .collect()
  }

  /// Groups as component IDs.
  pub fn ids<'d>(&self, dag: &'d Dag) -> Vec<Vec<&'d str>> {
    self
      .groups
      .iter()
      .map(|group| group.iter().map(|&slot| dag.component(slot).id.as_str()).collect())
      .collect()
  }
}

/// Kahn's algorithm with group labels.
///
/// Sources start in group 0; every other slot lands one past the highest
/// group among its prerequisites. Slots within a group keep arena order.
pub fn topological_sort(dag: &Dag) -> Result<Schedule, WorkflowError> {
  if dag.is_empty() {
    return Err(WorkflowError::NoComponents);
  }

  let len = dag.len();
  let mut in_degree: Vec<usize> = (0..len).map(|slot| dag.prerequisites(slot).len()).collect();
  let mut group = vec![0usize; len];
  let mut queue: VecDeque<usize> = (0..len).filter(|&slot| in_degree[slot] == 0).collect();

  let mut visited = 0;
  while let Some(slot) = queue.pop_front() {
    visited += 1;
    for &dependent in dag.dependents(slot) {
      group[dependent] = group[dependent].max(group[slot] + 1);
      in_degree[dependent] -= 1;
      if in_degree[dependent] == 0 {
        queue.push_back(dependent);
      }
    }
  }

  if visited < len {
    return Err(WorkflowError::NotAValidDag);
  }
  if dag.requires_connectivity() && dag.connected_sets() != 1 {
    return Err(WorkflowError::MoreThanADag);
  }

  let depth = group.iter().copied().max().unwrap_or(0) + 1;
  let mut groups = vec![Vec::new(); depth];
  for (slot, &g) in group.iter().enumerate() {
    groups[g].push(slot);
  }

  Ok(Schedule { groups })
}
