//! Time-bucketed deadline registry with re-derived expiration times
//!
//! An element's expiration tick is computed by a function of the element and
//! an external source (for requests: the request store, since a request's
//! deadline slack moves as it gets processed). The function is re-evaluated
//! when the element's bucket comes due, and the element fires only if the
//! recomputed tick is still "now". Otherwise it is filed again.
//!
//! # Timeline
//!
//! ```text
//! watch(e)   : t(e) = None  -> ignored
//!              t(e) < now   -> fires at the next poll
//!              otherwise    -> bucket[t(e)]
//! tick()     : re-evaluate bucket[now]; fire or re-file; now += 1
//! poll()     : drain everything fired so far
//! ```

use std::collections::HashMap;

/// Deadline registry keyed by expiration tick
///
/// # Example
/// ```
/// use admission_simulator_core_rs::structures::ExpirationTracker;
/// use std::collections::HashMap;
///
/// let mut deadlines: HashMap<u32, i64> = HashMap::new();
/// deadlines.insert(7, 1);
///
/// let mut tracker = ExpirationTracker::new(
///     |e: &u32, source: &HashMap<u32, i64>| source.get(e).copied(),
/// );
/// tracker.watch_for_expiration(7, &deadlines);
///
/// tracker.tick(&deadlines); // tick 0 elapses
/// assert!(tracker.poll_expired().is_empty());
/// tracker.tick(&deadlines); // tick 1 elapses
/// assert_eq!(tracker.poll_expired(), vec![7]);
/// ```
#[derive(Debug, Clone)]
pub struct ExpirationTracker<T, F> {
    expiration_time: F,
    expired: Vec<T>,
    waiting: HashMap<i64, Vec<T>>,
    current_time: i64,
}

impl<T, F> ExpirationTracker<T, F> {
    pub fn new(expiration_time: F) -> Self {
        Self {
            expiration_time,
            expired: Vec::new(),
            waiting: HashMap::new(),
            current_time: 0,
        }
    }

    pub fn current_time(&self) -> i64 {
        self.current_time
    }

    /// Number of elements still waiting in buckets
    pub fn num_waiting(&self) -> usize {
        self.waiting.values().map(Vec::len).sum()
    }

    /// Register `element`, computing its expiration tick from `source`
    pub fn watch_for_expiration<S: ?Sized>(&mut self, element: T, source: &S)
    where
        F: Fn(&T, &S) -> Option<i64>,
    {
        let Some(expiration_time) = (self.expiration_time)(&element, source) else {
            return;
        };
        self.file(element, expiration_time);
    }

    /// Let the current tick elapse
    ///
    /// Elements bucketed at the elapsing tick are re-evaluated; those whose
    /// expiration moved are re-filed instead of fired.
    pub fn tick<S: ?Sized>(&mut self, source: &S)
    where
        F: Fn(&T, &S) -> Option<i64>,
    {
        if let Some(due) = self.waiting.remove(&self.current_time) {
            for element in due {
                match (self.expiration_time)(&element, source) {
                    Some(t) if t == self.current_time => self.expired.push(element),
                    Some(t) => self.file(element, t),
                    None => {}
                }
            }
        }
        self.current_time += 1;
    }

    /// Take every element that fired since the last poll
    pub fn poll_expired(&mut self) -> Vec<T> {
        std::mem::take(&mut self.expired)
    }

    fn file(&mut self, element: T, expiration_time: i64) {
        if expiration_time < self.current_time {
            self.expired.push(element);
        } else {
            self.waiting.entry(expiration_time).or_default().push(element);
        }
    }
}
