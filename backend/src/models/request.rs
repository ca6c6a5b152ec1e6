//! Request model
//!
//! A request arrives in a time slot, asks for a number of resource-ticks of
//! processing and pays its value only when fully completed. It may carry a
//! deadline expressed as slack (in slots) allowed on top of its minimum
//! processing time.
//!
//! Two layers:
//! - [`Request`]: the immutable description coming from the workload
//! - [`SimRequest`]: a request bound to a running simulation, tracking the
//!   processing still owed

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::parameters::ModelParameters;

/// Request identifier. Unique within a run; also the tie-breaker of every
/// ordering used by policies.
pub type RequestId = u64;

/// Immutable request description
///
/// # Example
/// ```
/// use admission_simulator_core_rs::Request;
///
/// let request = Request::new(7, 3, 10.0, 2).with_deadline(4);
/// assert_eq!(request.absolute_deadline(), Some(7)); // release 3 + slack 4
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Unique identifier
    pub id: RequestId,

    /// Slot in which the request arrives
    pub release_tick: usize,

    /// Slack beyond release, in slots (None = no deadline)
    #[serde(default)]
    pub deadline: Option<usize>,

    /// Reward paid on full completion
    pub value: f64,

    /// Resource-ticks required (must be > 0)
    pub processing_time: usize,
}

impl Request {
    /// Create a request without a deadline
    pub fn new(id: RequestId, release_tick: usize, value: f64, processing_time: usize) -> Self {
        Self {
            id,
            release_tick,
            deadline: None,
            value,
            processing_time,
        }
    }

    /// Attach a deadline (slack in slots counted from release)
    pub fn with_deadline(mut self, deadline: usize) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Tick by which the request must be done, if it has a deadline
    pub fn absolute_deadline(&self) -> Option<usize> {
        self.deadline.map(|d| self.release_tick + d)
    }

    /// Per-tick return while running: `value / w - maintenance`
    pub fn hot_unit_value(&self, params: &ModelParameters) -> f64 {
        self.value / self.processing_time as f64 - params.maintenance_cost
    }

    /// Per-tick return net of the one-time allocation cost:
    /// `(value - allocation) / w - maintenance`
    pub fn cold_unit_value(&self, params: &ModelParameters) -> f64 {
        (self.value - params.allocation_cost) / self.processing_time as f64
            - params.maintenance_cost
    }
}

/// Request bound to a running simulation
///
/// Owned by the orchestrator's [`RequestStore`] for the whole run. Policies
/// only ever hold its [`RequestId`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimRequest {
    request: Request,
    remaining_processing_time: usize,
}

impl SimRequest {
    pub fn new(request: Request) -> Self {
        Self {
            remaining_processing_time: request.processing_time,
            request,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn id(&self) -> RequestId {
        self.request.id
    }

    pub fn value(&self) -> f64 {
        self.request.value
    }

    pub fn release_tick(&self) -> usize {
        self.request.release_tick
    }

    pub fn initial_processing_time(&self) -> usize {
        self.request.processing_time
    }

    pub fn remaining_processing_time(&self) -> usize {
        self.remaining_processing_time
    }

    pub fn is_complete(&self) -> bool {
        self.remaining_processing_time == 0
    }

    /// Slots left until the deadline as seen at tick `now`
    ///
    /// `release + deadline - now`; negative once the deadline has passed.
    pub fn current_deadline(&self, now: usize) -> Option<i64> {
        self.request
            .absolute_deadline()
            .map(|deadline| deadline as i64 - now as i64)
    }

    /// Latest tick at which processing can still finish in time, given the
    /// work left: `release + deadline - remaining`
    pub fn latest_finish_tick(&self) -> Option<i64> {
        self.request
            .absolute_deadline()
            .map(|deadline| deadline as i64 - self.remaining_processing_time as i64)
    }

    /// Advance processing by one resource-tick
    ///
    /// Returns false (and changes nothing) if no work is left.
    pub fn process(&mut self) -> bool {
        if self.remaining_processing_time == 0 {
            return false;
        }
        self.remaining_processing_time -= 1;
        true
    }
}

/// Arena of every request seen during a run, keyed by id
///
/// Requests are never removed: a request that completed or was dropped is
/// still resolvable (deadline watchers may look it up after it left the
/// buffer).
#[derive(Debug, Clone, Default)]
pub struct RequestStore {
    requests: BTreeMap<RequestId, SimRequest>,
}

impl RequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new request; returns false if the id is already taken
    pub fn insert(&mut self, request: Request) -> bool {
        if self.requests.contains_key(&request.id) {
            return false;
        }
        self.requests.insert(request.id, SimRequest::new(request));
        true
    }

    pub fn get(&self, id: RequestId) -> Option<&SimRequest> {
        self.requests.get(&id)
    }

    pub fn get_mut(&mut self, id: RequestId) -> Option<&mut SimRequest> {
        self.requests.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(allocation_cost: f64, maintenance_cost: f64) -> ModelParameters {
        ModelParameters {
            allocation_cost,
            maintenance_cost,
            ..ModelParameters::default()
        }
    }

    #[test]
    fn test_unit_values() {
        let request = Request::new(1, 0, 10.0, 4);
        let p = params(2.0, 0.5);
        assert_eq!(request.hot_unit_value(&p), 2.0);
        assert_eq!(request.cold_unit_value(&p), 1.5);
    }

    #[test]
    fn test_process_stops_at_zero() {
        let mut request = SimRequest::new(Request::new(1, 0, 1.0, 1));
        assert!(request.process());
        assert!(request.is_complete());
        assert!(!request.process());
        assert_eq!(request.remaining_processing_time(), 0);
    }

    #[test]
    fn test_current_deadline_goes_negative() {
        let request = SimRequest::new(Request::new(1, 2, 1.0, 1).with_deadline(3));
        assert_eq!(request.current_deadline(2), Some(3));
        assert_eq!(request.current_deadline(6), Some(-1));
        assert_eq!(request.latest_finish_tick(), Some(4));
    }

    #[test]
    fn test_store_rejects_duplicate_ids() {
        let mut store = RequestStore::new();
        assert!(store.insert(Request::new(1, 0, 1.0, 1)));
        assert!(!store.insert(Request::new(1, 3, 2.0, 2)));
        assert_eq!(store.get(1).map(|r| r.release_tick()), Some(0));
    }
}
