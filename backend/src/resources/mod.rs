//! Resource provisioning with activation delay
//!
//! Resources are requested from a bounded pool. A freshly allocated resource
//! is *pending* for `activation_delay` ticks and then becomes *ready*; only
//! ready resources can process requests (and only they are charged
//! maintenance). With a zero delay resources are ready immediately.
//!
//! Deallocation releases the most recently requested pending resources
//! first (they have the least sunk cost), then ready ones.

use std::collections::VecDeque;
use thiserror::Error;

/// Resource pool contract violations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResourceError {
    #[error("Allocating {requested} would exceed capacity {max} (ready {ready}, pending {pending})")]
    CapacityExceeded {
        requested: usize,
        max: usize,
        ready: usize,
        pending: usize,
    },

    #[error("Cannot release {requested} resources, only {available} allocated")]
    NotEnoughAllocated { requested: usize, available: usize },
}

/// Bounded pool of delayed-activation resources
///
/// # Example
/// ```
/// use admission_simulator_core_rs::ResourceManager;
///
/// let mut resources = ResourceManager::new(4, 2);
/// resources.allocate(3).unwrap();
/// assert_eq!((resources.num_ready(), resources.num_pending()), (0, 3));
///
/// resources.tick();
/// resources.tick();
/// assert_eq!((resources.num_ready(), resources.num_pending()), (3, 0));
///
/// assert_eq!(resources.request_capacity(1).unwrap(), -2);
/// assert_eq!(resources.num_ready(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ResourceManager {
    max_capacity: usize,
    activation_delay: usize,
    num_ready: usize,
    /// Countdown per pending resource, oldest request first
    pending: VecDeque<usize>,
}

impl ResourceManager {
    pub fn new(max_capacity: usize, activation_delay: usize) -> Self {
        Self {
            max_capacity,
            activation_delay,
            num_ready: 0,
            pending: VecDeque::new(),
        }
    }

    pub fn num_ready(&self) -> usize {
        self.num_ready
    }

    pub fn num_pending(&self) -> usize {
        self.pending.len()
    }

    /// Ready + pending
    pub fn num_allocated(&self) -> usize {
        self.num_ready + self.pending.len()
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Advance every pending countdown by one and promote finished ones
    pub fn tick(&mut self) {
        for countdown in self.pending.iter_mut() {
            *countdown = countdown.saturating_sub(1);
        }
        self.promote_ready();
    }

    /// Allocate or release so that ready + pending equals `desired`
    ///
    /// Returns the signed change; only positive changes are charged.
    pub fn request_capacity(&mut self, desired: usize) -> Result<i64, ResourceError> {
        let current = self.num_allocated();
        if desired >= current {
            self.allocate(desired - current)?;
        } else {
            self.deallocate(current - desired)?;
        }
        Ok(desired as i64 - current as i64)
    }

    /// Start activating `count` new resources
    pub fn allocate(&mut self, count: usize) -> Result<(), ResourceError> {
        if self.num_allocated() + count > self.max_capacity {
            return Err(ResourceError::CapacityExceeded {
                requested: count,
                max: self.max_capacity,
                ready: self.num_ready,
                pending: self.pending.len(),
            });
        }
        self.pending
            .extend(std::iter::repeat(self.activation_delay).take(count));
        self.promote_ready();
        Ok(())
    }

    /// Release `count` resources, newest pending first, then ready ones
    pub fn deallocate(&mut self, count: usize) -> Result<(), ResourceError> {
        if count > self.num_allocated() {
            return Err(ResourceError::NotEnoughAllocated {
                requested: count,
                available: self.num_allocated(),
            });
        }
        let from_pending = count.min(self.pending.len());
        self.pending.truncate(self.pending.len() - from_pending);
        self.num_ready -= count - from_pending;
        Ok(())
    }

    fn promote_ready(&mut self) {
        while self.pending.front() == Some(&0) {
            self.pending.pop_front();
            self.num_ready += 1;
        }
    }
}
