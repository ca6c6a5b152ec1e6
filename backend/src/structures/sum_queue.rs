//! Ordered set maintaining the sum of a value function over its members

use std::collections::btree_set::{self, BTreeSet};

/// Ordered set with a running `sum(value_of(x))`
///
/// # Example
/// ```
/// use admission_simulator_core_rs::structures::SumQueue;
///
/// let mut queue = SumQueue::new(|x: &u32| *x as f64);
/// queue.add(3);
/// queue.add(5);
/// queue.add(5);
/// assert_eq!(queue.sum(), 8.0);
/// assert_eq!(queue.pop_last(), Some(5));
/// assert_eq!(queue.sum(), 3.0);
/// ```
#[derive(Debug, Clone)]
pub struct SumQueue<T: Ord, F: Fn(&T) -> f64> {
    items: BTreeSet<T>,
    value_of: F,
    sum: f64,
}

impl<T: Ord, F: Fn(&T) -> f64> SumQueue<T, F> {
    pub fn new(value_of: F) -> Self {
        Self {
            items: BTreeSet::new(),
            value_of,
            sum: 0.0,
        }
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, T> {
        self.items.iter()
    }

    /// Insert; duplicates are ignored
    pub fn add(&mut self, item: T) -> bool {
        let value = (self.value_of)(&item);
        if self.items.insert(item) {
            self.sum += value;
            true
        } else {
            false
        }
    }

    /// Remove and return the lowest-ordered element
    pub fn pop_first(&mut self) -> Option<T> {
        let item = self.items.pop_first()?;
        self.sum -= (self.value_of)(&item);
        Some(item)
    }

    /// Remove and return the highest-ordered element
    pub fn pop_last(&mut self) -> Option<T> {
        let item = self.items.pop_last()?;
        self.sum -= (self.value_of)(&item);
        Some(item)
    }

    /// Remove every element, returning them lowest first
    pub fn drain(&mut self) -> Vec<T> {
        self.sum = 0.0;
        std::mem::take(&mut self.items).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_from_empty() {
        let mut queue = SumQueue::new(|x: &i32| *x as f64);
        assert_eq!(queue.pop_first(), None);
        assert_eq!(queue.pop_last(), None);
        assert_eq!(queue.sum(), 0.0);
    }

    #[test]
    fn test_drain_resets_sum() {
        let mut queue = SumQueue::new(|x: &i32| *x as f64);
        queue.add(2);
        queue.add(1);
        assert_eq!(queue.drain(), vec![1, 2]);
        assert_eq!(queue.sum(), 0.0);
        assert!(queue.is_empty());
    }
}
