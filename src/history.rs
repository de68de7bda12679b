// Packwatch - Battery pack telemetry monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Bounded FIFO of recent readings

use std::collections::vec_deque::{self, VecDeque};

/// Capacity for raw telemetry history
pub const RAW_HISTORY_CAPACITY: usize = 1000;

/// Capacity for extended readings kept by the prediction engine
pub const EXTENDED_HISTORY_CAPACITY: usize = 100;

/// Fixed-capacity history, oldest entries evicted first
#[derive(Debug, Clone)]
pub struct History<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> History<T> {
    /// Create an empty history holding at most `capacity` entries
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest one when full
    pub fn push(&mut self, entry: T) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Entries oldest first
    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.entries.iter()
    }

    /// The `k` most recent entries, oldest first
    ///
    /// Returns fewer when the history is shorter than `k`.
    pub fn last_n(&self, k: usize) -> impl DoubleEndedIterator<Item = &T> + '_ {
        let skip = self.entries.len().saturating_sub(k);
        self.entries.iter().skip(skip)
    }

    /// Most recent entry
    pub fn latest(&self) -> Option<&T> {
        self.entries.back()
    }

    /// Number of entries held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T: Clone> History<T> {
    /// Copy of the current contents, oldest first
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

impl<'a, T> IntoIterator for &'a History<T> {
    type Item = &'a T;
    type IntoIter = vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_snapshot() {
        let mut history = History::new(5);
        for i in 0..3 {
            history.push(i);
        }
        assert_eq!(history.snapshot(), vec![0, 1, 2]);
        assert_eq!(history.latest(), Some(&2));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_eviction_order() {
        let mut history = History::new(1000);
        for i in 0..1001 {
            history.push(i);
        }
        assert_eq!(history.len(), 1000);
        assert_eq!(history.iter().next(), Some(&1));
        assert_eq!(history.latest(), Some(&1000));
    }

    #[test]
    fn test_last_n() {
        let mut history = History::new(10);
        for i in 0..6 {
            history.push(i);
        }
        let last: Vec<_> = history.last_n(3).copied().collect();
        assert_eq!(last, vec![3, 4, 5]);

        let all: Vec<_> = history.last_n(50).copied().collect();
        assert_eq!(all, vec![0, 1, 2, 3, 4, 5]);

        assert_eq!(history.last_n(0).count(), 0);
    }

    #[test]
    fn test_zero_capacity() {
        let mut history = History::new(0);
        history.push("a");
        history.push("b");
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.snapshot(), vec!["b"]);
    }

    #[test]
    fn test_clear() {
        let mut history = History::new(3);
        history.push(1);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.latest(), None);
    }
}
