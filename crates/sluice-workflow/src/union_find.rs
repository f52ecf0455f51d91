/// Disjoint sets over dense slots, tracking the number of sets.
#[derive(Debug, Clone)]
pub(crate) struct UnionFind {
  parent: Vec<usize>,
  rank: Vec<u8>,
  count: usize,
}

impl UnionFind {
  pub(crate) fn new(len: usize) -> Self {
    Self {
      parent: (0..len).collect(),
      rank: vec![0; len],
      count: len,
    }
  }

  pub(crate) fn find(&mut self, mut x: usize) -> usize {
    while self.parent[x] != x {
      // Path halving.
      self.parent[x] = self.parent[self.parent[x]];
      x = self.parent[x];
    }
    x
  }

  /// Merge the sets of `a` and `b`. Returns false if they were already merged.
  pub(crate) fn union(&mut self, a: usize, b: usize) -> bool {
    let (root_a, root_b) = (self.find(a), self.find(b));
    if root_a == root_b {
      return false;
    }
    match self.rank[root_a].cmp(&self.rank[root_b]) {
      std::cmp::Ordering::Less => self.parent[root_a] = root_b,
      std::cmp::Ordering::Greater => self.parent[root_b] = root_a,
      std::cmp::Ordering::Equal => {
        self.parent[root_b] = root_a;
        self.rank[root_a] += 1;
      }
    }
    self.count -= 1;
    true
  }

  /// Number of disjoint sets.
  pub(crate) fn count(&self) -> usize {
    self.count
  }
}
