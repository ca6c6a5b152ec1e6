//! Pessimistic-preemptive deadline-aware queue
//!
//! Accepted requests start as *candidates*, ranked by cold unit value. A
//! candidate is promoted into the *active* queue (ranked by hot unit value,
//! one slot per resource) when
//!
//! - **preemption**: the active queue still has a free slot, or the
//!   candidate's cold value is non-negative and at least `y` times the cold
//!   value of the worst request still holding a slot; and
//! - **pessimism**: its deadline slack is at least
//!   `(1 + b) × w + activation_delay` (or it has no deadline).
//!
//! A candidate that wins preemption but fails pessimism is never promoted. It
//! stays buffered until served opportunistically (work-conserving mode) or
//! until its deadline passes.
//!
//! A second deadline watch fires when a request could no longer finish even
//! if a resource were allocated right now; such requests are dropped at the
//! next admission.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use super::{AdmissionPolicy, LeaveReason};
use crate::core::context::SimulationView;
use crate::models::{ModelParameters, RequestId, RequestStore};
use crate::orchestrator::ConfigError;
use crate::structures::{ExpirationTracker, PointedQueue, RankKey};

/// Pessimism factor `b` and preemption factor `y`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreemptionParameters {
    pub pessimism: f64,
    pub preemption: f64,
}

impl PreemptionParameters {
    pub fn new(pessimism: f64, preemption: f64) -> Self {
        Self {
            pessimism,
            preemption,
        }
    }
}

impl Default for PreemptionParameters {
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}

type DeadlineFn = Box<dyn Fn(&RequestId, &RequestStore) -> Option<i64> + Send>;

#[derive(Debug, Clone, Copy)]
struct Keys {
    hot: RankKey,
    cold: RankKey,
}

/// Preemptive policy
pub struct PreemptivePolicy {
    parameters: PreemptionParameters,
    activation_delay: usize,
    max_resources: usize,
    work_conserving: bool,

    /// Promoted requests by hot value; pointed = worst one holding a slot
    active: PointedQueue<RankKey>,
    /// Accepted, not promoted, by hot value
    unpromoted: BTreeSet<RankKey>,
    /// Still eligible for promotion, by cold value
    candidates: BTreeSet<RankKey>,
    keys: HashMap<RequestId, Keys>,
    /// Fires at `latest finish - activation_delay`
    promotion_deadlines: ExpirationTracker<RequestId, DeadlineFn>,
}

impl PreemptivePolicy {
    pub fn new(
        params: &ModelParameters,
        parameters: PreemptionParameters,
        work_conserving: bool,
    ) -> Self {
        let activation_delay = params.activation_delay;
        let deadline_fn: DeadlineFn = Box::new(move |id: &RequestId, store: &RequestStore| {
            store
                .get(*id)
                .and_then(|request| request.latest_finish_tick())
                .map(|t| t - activation_delay as i64)
        });
        Self {
            parameters,
            activation_delay,
            max_resources: params.max_resources,
            work_conserving,
            active: PointedQueue::new(params.max_resources.saturating_sub(1)),
            unpromoted: BTreeSet::new(),
            candidates: BTreeSet::new(),
            keys: HashMap::new(),
            promotion_deadlines: ExpirationTracker::new(deadline_fn),
        }
    }

    pub fn parameters(&self) -> PreemptionParameters {
        self.parameters
    }

    pub fn num_active(&self) -> usize {
        self.active.len()
    }

    pub fn num_candidates(&self) -> usize {
        self.candidates.len()
    }

    fn forget(&mut self, id: RequestId) {
        if let Some(keys) = self.keys.remove(&id) {
            if !self.active.remove(&keys.hot) {
                self.unpromoted.remove(&keys.hot);
                self.candidates.remove(&keys.cold);
            }
        }
    }

    fn wins_preemption(&self, candidate: &RankKey) -> bool {
        let Some(pointed) = self.active.pointed() else {
            return true;
        };
        let cold = candidate.magnitude();
        let pointed_cold = self
            .keys
            .get(&pointed.id())
            .map_or(f64::NEG_INFINITY, |k| k.cold.magnitude());
        cold >= 0.0 && cold >= self.parameters.preemption * pointed_cold
    }

    fn passes_pessimism(&self, id: RequestId, view: &SimulationView<'_>) -> bool {
        let Some(request) = view.request(id) else {
            return false;
        };
        match request.current_deadline(view.current_tick()) {
            None => true,
            Some(slack) => {
                slack as f64
                    >= (1.0 + self.parameters.pessimism) * request.initial_processing_time() as f64
                        + self.activation_delay as f64
            }
        }
    }

    fn promote(&mut self, view: &SimulationView<'_>) {
        while let Some(best) = self.candidates.first().copied() {
            if !self.wins_preemption(&best) {
                break;
            }
            self.candidates.pop_first();
            if !self.passes_pessimism(best.id(), view) {
                continue;
            }
            if let Some(keys) = self.keys.get(&best.id()).copied() {
                self.unpromoted.remove(&keys.hot);
                self.active.add(keys.hot);
            }
        }
    }

    /// Evict until the buffer fits: worst unpromoted first, then worst active
    fn drop_to_fit(&mut self, cap: Option<usize>) -> Vec<RequestId> {
        let Some(cap) = cap else {
            return Vec::new();
        };
        let mut dropped = Vec::new();
        while self.keys.len() > cap {
            let victim = match self.unpromoted.last() {
                Some(key) => key.id(),
                None => match self.active.iter().next_back() {
                    Some(key) => key.id(),
                    None => break,
                },
            };
            self.forget(victim);
            dropped.push(victim);
        }
        dropped
    }
}

impl AdmissionPolicy for PreemptivePolicy {
    fn select_for_drop(
        &mut self,
        arriving: &[RequestId],
        view: &SimulationView<'_>,
    ) -> Vec<RequestId> {
        let params = view.params();
        let mut dropped = Vec::new();

        for &id in arriving {
            let Some(request) = view.request(id) else {
                dropped.push(id);
                continue;
            };
            let hot = request.request().hot_unit_value(params);
            if hot <= 0.0 {
                dropped.push(id);
                continue;
            }
            let keys = Keys {
                hot: RankKey::descending(hot, id),
                cold: RankKey::descending(request.request().cold_unit_value(params), id),
            };
            self.keys.insert(id, keys);
            self.candidates.insert(keys.cold);
            self.unpromoted.insert(keys.hot);
            self.promotion_deadlines
                .watch_for_expiration(id, view.requests());
        }

        // Requests of the current round are not buffered yet.
        for id in self.promotion_deadlines.poll_expired() {
            if view.is_buffered(id) && self.keys.contains_key(&id) {
                self.forget(id);
                dropped.push(id);
            }
        }

        self.promote(view);
        dropped.extend(self.drop_to_fit(params.buffer_cap));
        dropped
    }

    fn select_for_processing(&mut self, view: &SimulationView<'_>) -> Vec<RequestId> {
        let ready = view.ready_resources();
        let mut selected: Vec<RequestId> = self.active.iter().take(ready).map(|k| k.id()).collect();
        if self.work_conserving {
            let remaining = ready - selected.len();
            selected.extend(self.unpromoted.iter().take(remaining).map(|k| k.id()));
        }
        selected
    }

    fn handle_processing_finished(&mut self, view: &SimulationView<'_>) {
        self.promotion_deadlines.tick(view.requests());
    }

    fn predict_processing_capacity(&mut self, view: &SimulationView<'_>) -> usize {
        let ready = view.ready_resources();
        let committed = self.active.len().min(self.max_resources);
        if committed < ready && self.work_conserving {
            (committed + self.unpromoted.len()).min(ready)
        } else {
            committed
        }
    }

    fn handle_buffer_leave(
        &mut self,
        leaving: &[RequestId],
        _reason: LeaveReason,
        _view: &SimulationView<'_>,
    ) -> Result<(), ConfigError> {
        for &id in leaving {
            self.forget(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Request;

    fn params() -> ModelParameters {
        ModelParameters {
            max_resources: 1,
            allocation_cost: 2.0,
            ..ModelParameters::default()
        }
    }

    #[test]
    fn test_first_candidate_fills_free_slot() {
        let params = params();
        let mut store = RequestStore::new();
        store.insert(Request::new(1, 0, 4.0, 1));
        let buffered = BTreeSet::new();
        let view = SimulationView::new(&params, 0, 1, &buffered, &store);

        let mut policy = PreemptivePolicy::new(&params, PreemptionParameters::default(), false);
        assert!(policy.select_for_drop(&[1], &view).is_empty());
        assert_eq!(policy.num_active(), 1);
        assert_eq!(policy.num_candidates(), 0);
    }

    #[test]
    fn test_preemption_factor_guards_slot() {
        let params = params();
        let mut store = RequestStore::new();
        store.insert(Request::new(1, 0, 4.0, 1)); // cold 2
        store.insert(Request::new(2, 0, 5.0, 1)); // cold 3
        store.insert(Request::new(3, 0, 9.0, 1)); // cold 7
        let buffered = BTreeSet::new();
        let view = SimulationView::new(&params, 0, 1, &buffered, &store);

        let mut policy = PreemptivePolicy::new(&params, PreemptionParameters::new(0.0, 2.0), false);
        policy.select_for_drop(&[1], &view);
        policy.select_for_drop(&[2], &view);
        // 3 < 2 × 2: stays a candidate
        assert_eq!(policy.num_active(), 1);
        assert_eq!(policy.num_candidates(), 1);

        policy.select_for_drop(&[3], &view);
        assert_eq!(policy.num_active(), 2);
        assert_eq!(policy.select_for_processing(&view), vec![3]);
    }

    #[test]
    fn test_pessimism_blocks_tight_deadlines() {
        let params = params();
        let mut store = RequestStore::new();
        store.insert(Request::new(1, 0, 4.0, 2).with_deadline(3));
        let buffered = BTreeSet::new();
        let view = SimulationView::new(&params, 0, 1, &buffered, &store);

        // needs slack >= (1 + 1) × 2 = 4
        let mut policy = PreemptivePolicy::new(&params, PreemptionParameters::new(1.0, 1.0), true);
        policy.select_for_drop(&[1], &view);
        assert_eq!(policy.num_active(), 0);
        assert_eq!(policy.num_candidates(), 0);
        // still served opportunistically
        assert_eq!(policy.select_for_processing(&view), vec![1]);
        assert_eq!(policy.predict_processing_capacity(&view), 1);
    }

    #[test]
    fn test_buffer_cap_evicts_unpromoted_first() {
        let params = ModelParameters {
            buffer_cap: Some(1),
            ..params()
        };
        let mut store = RequestStore::new();
        store.insert(Request::new(1, 0, 9.0, 1));
        store.insert(Request::new(2, 0, 5.0, 1));
        let buffered = BTreeSet::new();
        let view = SimulationView::new(&params, 0, 1, &buffered, &store);

        let mut policy = PreemptivePolicy::new(&params, PreemptionParameters::new(0.0, 2.0), false);
        assert_eq!(policy.select_for_drop(&[1, 2], &view), vec![2]);
        assert_eq!(policy.num_active(), 1);
    }

    #[test]
    fn test_promotion_deadline_drops_buffered_request() {
        let params = ModelParameters {
            max_resources: 1,
            activation_delay: 1,
            ..ModelParameters::default()
        };
        let mut store = RequestStore::new();
        store.insert(Request::new(1, 0, 4.0, 1).with_deadline(2)); // fires at 0 + 2 - 1 - 1 = 0
        let mut buffered = BTreeSet::new();

        let mut policy = PreemptivePolicy::new(&params, PreemptionParameters::default(), false);
        let view = SimulationView::new(&params, 0, 0, &buffered, &store);
        assert!(policy.select_for_drop(&[1], &view).is_empty());
        buffered.insert(1);

        let view = SimulationView::new(&params, 0, 0, &buffered, &store);
        policy.handle_processing_finished(&view);
        let view = SimulationView::new(&params, 1, 0, &buffered, &store);
        assert_eq!(policy.select_for_drop(&[], &view), vec![1]);
        assert_eq!(policy.num_active(), 0);
    }
}
