//! Ordered set with O(1) access to the element at a fixed rank
//!
//! Used by the preemptive policy: with rank `k = R - 1` the pointed element
//! is the worst request that still fits on the `R` resources, i.e. the one a
//! newcomer has to beat.
//!
//! # Maintenance
//!
//! - insert better than pointed: pointed moves one step towards the best end
//! - remove at or better than pointed: pointed moves one step towards the
//!   worst end (or becomes unset)
//!
//! Each update is a single `BTreeSet` range lookup.

use std::collections::btree_set::{self, BTreeSet};
use std::ops::Bound::{Excluded, Unbounded};

/// Ordered set tracking its `rank`-th best element (0-indexed)
///
/// # Example
/// ```
/// use admission_simulator_core_rs::structures::PointedQueue;
///
/// let mut queue = PointedQueue::new(1);
/// queue.add(30);
/// assert_eq!(queue.pointed(), None);
/// queue.add(10);
/// assert_eq!(queue.pointed(), Some(&30));
/// queue.add(20);
/// assert_eq!(queue.pointed(), Some(&20));
/// queue.remove(&10);
/// assert_eq!(queue.pointed(), Some(&30));
/// ```
#[derive(Debug, Clone)]
pub struct PointedQueue<T: Ord + Clone> {
    items: BTreeSet<T>,
    rank: usize,
    pointed: Option<T>,
}

impl<T: Ord + Clone> PointedQueue<T> {
    pub fn new(rank: usize) -> Self {
        Self {
            items: BTreeSet::new(),
            rank,
            pointed: None,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Element at the tracked rank, if the queue holds more than `rank` items
    pub fn pointed(&self) -> Option<&T> {
        self.pointed.as_ref()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    /// Best-first iteration
    pub fn iter(&self) -> btree_set::Iter<'_, T> {
        self.items.iter()
    }

    /// Insert `item`; no-op if already present
    pub fn add(&mut self, item: T) -> bool {
        if !self.items.insert(item.clone()) {
            return false;
        }
        match &self.pointed {
            None => {
                if self.items.len() == self.rank + 1 {
                    self.pointed = self.items.last().cloned();
                }
            }
            Some(pointed) => {
                if item < *pointed {
                    self.pointed = self.items.range(..pointed.clone()).next_back().cloned();
                }
            }
        }
        true
    }

    /// Remove `item`; returns false if it was not present
    pub fn remove(&mut self, item: &T) -> bool {
        if !self.items.remove(item) {
            return false;
        }
        if let Some(pointed) = &self.pointed {
            if item <= pointed {
                self.pointed = self
                    .items
                    .range((Excluded(pointed.clone()), Unbounded))
                    .next()
                    .cloned();
            }
        }
        true
    }
}
