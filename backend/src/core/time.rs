//! Time management for the simulation
//!
//! The simulation operates in discrete time slots ("ticks"). Every slot is
//! processed completely before the clock advances.

use serde::{Deserialize, Serialize};

/// Manages simulation time in discrete ticks
///
/// # Example
/// ```
/// use admission_simulator_core_rs::TimeManager;
///
/// let mut time = TimeManager::new();
/// assert_eq!(time.current_tick(), 0);
///
/// time.advance_tick();
/// assert_eq!(time.current_tick(), 1);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeManager {
    /// Total ticks elapsed since simulation start
    current_tick: usize,
}

impl TimeManager {
    /// Create a clock positioned at tick 0
    pub fn new() -> Self {
        Self { current_tick: 0 }
    }

    /// Advance time by one tick
    pub fn advance_tick(&mut self) {
        self.current_tick += 1;
    }

    /// Get the current tick (total ticks since start)
    pub fn current_tick(&self) -> usize {
        self.current_tick
    }

    /// Ticks elapsed since `release_tick`
    ///
    /// Requests are never released in the future, so this saturates at zero
    /// rather than wrapping.
    ///
    /// # Example
    /// ```
    /// use admission_simulator_core_rs::TimeManager;
    ///
    /// let mut time = TimeManager::new();
    /// for _ in 0..7 {
    ///     time.advance_tick();
    /// }
    /// assert_eq!(time.ticks_since(3), 4);
    /// ```
    pub fn ticks_since(&self, release_tick: usize) -> usize {
        self.current_tick.saturating_sub(release_tick)
    }
}
