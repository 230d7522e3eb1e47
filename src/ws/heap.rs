use std::collections::{BTreeMap, HashMap};

/// What retrieving a never written address yields
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum HeapPolicy {
    /// Reading an unwritten address is an error
    #[default]
    Strict,
    /// Unwritten addresses read as zero
    ZeroFill,
}

/// Sparse address to value storage, allocated on first store
#[derive(Debug, Clone, Default)]
pub struct Heap {
    policy: HeapPolicy,
    cells: HashMap<i64, i64>,
}

impl Heap {
    pub fn new(policy: HeapPolicy) -> Heap {
        Heap {
            policy,
            cells: HashMap::new(),
        }
    }

    pub fn policy(&self) -> HeapPolicy {
        self.policy
    }

    pub fn store(&mut self, addr: i64, val: i64) {
        self.cells.insert(addr, val);
    }

    /// Returns the value at `addr`, or `None` if it was never written and the policy is strict
    pub fn retrieve(&self, addr: i64) -> Option<i64> {
        match (self.cells.get(&addr), self.policy) {
            (Some(val), _) => Some(*val),
            (None, HeapPolicy::ZeroFill) => Some(0),
            (None, HeapPolicy::Strict) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Ordered copy of every written cell, used for heap dumps
    pub fn snapshot(&self) -> BTreeMap<i64, i64> {
        self.cells.iter().map(|(addr, val)| (*addr, *val)).collect()
    }
}
