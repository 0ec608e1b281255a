//! Bounded set of already observed event ids

use std::collections::{HashSet, VecDeque};

/// Insertion-ordered set that evicts the oldest id once `capacity` is hit.
/// A capacity of zero means unbounded.
#[derive(Debug, Clone, Default)]
pub struct SeenSet {
    order: VecDeque<String>,
    ids: HashSet<String>,
    capacity: usize,
}

impl SeenSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            ids: HashSet::new(),
            capacity,
        }
    }

    /// Rebuild from persisted ids (oldest first), keeping only the newest
    pub fn from_ids(ids: impl IntoIterator<Item = String>, capacity: usize) -> Self {
        let mut set = Self::new(capacity);
        for id in ids {
            set.insert(id);
        }
        set
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns true if `id` was not already present
    pub fn insert(&mut self, id: String) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        if self.capacity > 0 && self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.ids.insert(id.clone());
        self.order.push_back(id);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Ids oldest first
    pub fn to_vec(&self) -> Vec<String> {
        self.order.iter().cloned().collect()
    }
}
