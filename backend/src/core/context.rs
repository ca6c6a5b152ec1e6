//! Read-only view of the running simulation
//!
//! Policies never reach into the orchestrator. Every policy callback receives
//! a [`SimulationView`] describing the state at the moment of the call:
//! current tick, ready resources, the buffered set and a lookup into the
//! request store.

use std::collections::BTreeSet;

use crate::models::{ModelParameters, RequestId, RequestStore, SimRequest};

/// Snapshot handle passed to policy callbacks
#[derive(Debug, Clone, Copy)]
pub struct SimulationView<'a> {
    params: &'a ModelParameters,
    current_tick: usize,
    ready_resources: usize,
    allocated_resources: usize,
    buffered: &'a BTreeSet<RequestId>,
    requests: &'a RequestStore,
}

impl<'a> SimulationView<'a> {
    pub fn new(
        params: &'a ModelParameters,
        current_tick: usize,
        ready_resources: usize,
        buffered: &'a BTreeSet<RequestId>,
        requests: &'a RequestStore,
    ) -> Self {
        Self {
            params,
            current_tick,
            ready_resources,
            allocated_resources: ready_resources,
            buffered,
            requests,
        }
    }

    /// Also count `allocated` resources (ready plus still activating)
    pub fn with_allocated(mut self, allocated: usize) -> Self {
        self.allocated_resources = allocated.max(self.ready_resources);
        self
    }

    pub fn params(&self) -> &'a ModelParameters {
        self.params
    }

    pub fn current_tick(&self) -> usize {
        self.current_tick
    }

    /// Resources able to process a request this tick
    pub fn ready_resources(&self) -> usize {
        self.ready_resources
    }

    /// Ready resources plus those still activating
    pub fn allocated_resources(&self) -> usize {
        self.allocated_resources
    }

    pub fn buffered_count(&self) -> usize {
        self.buffered.len()
    }

    /// Admitted requests not yet completed or dropped, ascending id
    ///
    /// Requests arriving in the current admission round are not part of the
    /// buffer until the round is over.
    pub fn buffered(&self) -> impl Iterator<Item = RequestId> + 'a {
        self.buffered.iter().copied()
    }

    pub fn is_buffered(&self, id: RequestId) -> bool {
        self.buffered.contains(&id)
    }

    pub fn request(&self, id: RequestId) -> Option<&'a SimRequest> {
        self.requests.get(id)
    }

    pub fn requests(&self) -> &'a RequestStore {
        self.requests
    }

    /// Slots left until `id`'s deadline at the current tick
    pub fn current_deadline(&self, id: RequestId) -> Option<i64> {
        self.request(id)
            .and_then(|request| request.current_deadline(self.current_tick))
    }
}
