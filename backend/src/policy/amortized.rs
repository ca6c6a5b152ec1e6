//! Amortized batch allocation
//!
//! Allocates a new resource only once enough waiting value has piled up to
//! amortize its allocation cost:
//!
//! ```text
//! threshold = rho × allocation / (1 - maintenance / min_value)
//! ```
//!
//! Requests are either *assigned* (bound to a resource, processed highest
//! value first) or *waiting* (value-sum queue). Each resource requested
//! beyond the current ones is backed by a batch of waiting requests worth at
//! least `threshold`. After `ceil(threshold)` consecutive idle slots the
//! whole waiting queue is dropped.
//!
//! Deadlines are not supported: a `Due` departure is a configuration error.

use std::collections::BTreeSet;

use super::{AdmissionPolicy, LeaveReason};
use crate::core::context::SimulationView;
use crate::models::{ModelParameters, RequestId};
use crate::orchestrator::ConfigError;
use crate::structures::{RankKey, SumQueue};

type WaitingQueue = SumQueue<RankKey, fn(&RankKey) -> f64>;

/// Amortized batch policy
pub struct AmortizedBatchPolicy {
    threshold: f64,
    /// Keyed by value, highest first; sums values
    waiting: WaitingQueue,
    assigned: BTreeSet<RankKey>,
    /// Taken out of `assigned` for the current tick
    in_service: Vec<RankKey>,
    inactive_slots: usize,
}

impl AmortizedBatchPolicy {
    pub fn new(
        params: &ModelParameters,
        min_value: f64,
        amortization_factor: f64,
    ) -> Result<Self, ConfigError> {
        if !(amortization_factor > 1.0) {
            return Err(ConfigError::AmortizationFactorTooSmall(amortization_factor));
        }
        if min_value <= params.maintenance_cost {
            return Err(ConfigError::MinimalValueTooSmall {
                min_value,
                maintenance_cost: params.maintenance_cost,
            });
        }
        let threshold = amortization_factor * params.allocation_cost
            / (1.0 - params.maintenance_cost / min_value);
        Ok(Self {
            threshold,
            waiting: SumQueue::new(RankKey::magnitude as fn(&RankKey) -> f64),
            assigned: BTreeSet::new(),
            in_service: Vec::new(),
            inactive_slots: 0,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn num_waiting(&self) -> usize {
        self.waiting.len()
    }

    pub fn num_assigned(&self) -> usize {
        self.assigned.len()
    }

    fn fill_unassigned(&mut self, ready: usize) {
        while self.assigned.len() < ready {
            let Some(best) = self.waiting.pop_first() else {
                break;
            };
            self.assigned.insert(best);
        }
    }

    fn drop_to_fit(&mut self, cap: Option<usize>) -> Vec<RequestId> {
        let Some(cap) = cap else {
            return Vec::new();
        };
        let mut dropped = Vec::new();
        while self.assigned.len() + self.in_service.len() + self.waiting.len() > cap {
            let Some(worst) = self.waiting.pop_last() else {
                break;
            };
            dropped.push(worst.id());
        }
        dropped
    }

    fn drop_if_inactive(&mut self) -> Vec<RequestId> {
        self.inactive_slots += 1;
        if self.inactive_slots == self.threshold.ceil() as usize {
            tracing::debug!(
                waiting = self.waiting.len(),
                "dropping waiting requests after idle slots"
            );
            return self.waiting.drain().into_iter().map(|k| k.id()).collect();
        }
        Vec::new()
    }
}

impl AdmissionPolicy for AmortizedBatchPolicy {
    fn select_for_drop(
        &mut self,
        arriving: &[RequestId],
        view: &SimulationView<'_>,
    ) -> Vec<RequestId> {
        for &id in arriving {
            let Some(request) = view.request(id) else {
                continue;
            };
            let key = RankKey::descending(request.value(), id);
            match self.assigned.last().copied() {
                Some(worst) if key < worst => {
                    self.assigned.remove(&worst);
                    self.assigned.insert(key);
                    self.waiting.add(worst);
                }
                _ => {
                    self.waiting.add(key);
                }
            }
        }

        let mut dropped = self.drop_to_fit(view.params().buffer_cap);
        self.fill_unassigned(view.ready_resources());

        if self.assigned.is_empty() && arriving.is_empty() {
            dropped.extend(self.drop_if_inactive());
        } else {
            self.inactive_slots = 0;
        }
        dropped
    }

    fn select_for_processing(&mut self, view: &SimulationView<'_>) -> Vec<RequestId> {
        for _ in 0..view.ready_resources() {
            let Some(best) = self.assigned.pop_first() else {
                break;
            };
            self.in_service.push(best);
        }
        self.in_service.iter().map(|k| k.id()).collect()
    }

    fn handle_processing_finished(&mut self, view: &SimulationView<'_>) {
        for key in std::mem::take(&mut self.in_service) {
            if view.request(key.id()).is_some_and(|r| !r.is_complete()) {
                self.assigned.insert(key);
            }
        }
    }

    fn predict_processing_capacity(&mut self, view: &SimulationView<'_>) -> usize {
        self.fill_unassigned(view.ready_resources());

        // Activating resources already back a batch in `assigned`.
        let mut capacity = view.allocated_resources().min(self.assigned.len());
        while capacity < view.params().max_resources
            && ((self.threshold == 0.0 && !self.waiting.is_empty())
                || self.waiting.sum() > self.threshold)
        {
            let mut batch_value = 0.0;
            while batch_value < self.threshold {
                let Some(next) = self.waiting.pop_first() else {
                    break;
                };
                batch_value += next.magnitude();
                self.assigned.insert(next);
            }
            capacity += 1;
        }
        capacity
    }

    fn handle_buffer_leave(
        &mut self,
        _leaving: &[RequestId],
        reason: LeaveReason,
        _view: &SimulationView<'_>,
    ) -> Result<(), ConfigError> {
        if reason == LeaveReason::Due {
            return Err(ConfigError::DeadlinesUnsupported("batch".to_string()));
        }
        // Completed requests were not put back after processing.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Request, RequestStore};

    fn params() -> ModelParameters {
        ModelParameters {
            max_resources: 3,
            allocation_cost: 4.0,
            maintenance_cost: 0.5,
            ..ModelParameters::default()
        }
    }

    #[test]
    fn test_construction_validates_parameters() {
        assert!(matches!(
            AmortizedBatchPolicy::new(&params(), 2.0, 1.0),
            Err(ConfigError::AmortizationFactorTooSmall(_))
        ));
        assert!(matches!(
            AmortizedBatchPolicy::new(&params(), 0.5, 2.0),
            Err(ConfigError::MinimalValueTooSmall { .. })
        ));
        let policy = AmortizedBatchPolicy::new(&params(), 1.0, 2.0).unwrap();
        assert_eq!(policy.threshold(), 16.0);
    }

    #[test]
    fn test_batches_drive_capacity() {
        let params = params();
        let mut store = RequestStore::new();
        for id in 0..5 {
            store.insert(Request::new(id, 0, 10.0, 1));
        }
        let buffered = BTreeSet::new();
        let view = SimulationView::new(&params, 0, 0, &buffered, &store);

        let mut policy = AmortizedBatchPolicy::new(&params, 1.0, 2.0).unwrap();
        assert!(policy.select_for_drop(&[0, 1, 2, 3, 4], &view).is_empty());
        assert_eq!(policy.num_waiting(), 5);

        // 50 waiting > 16: two batches of 20, the last 10 does not qualify.
        assert_eq!(policy.predict_processing_capacity(&view), 2);
        assert_eq!(policy.num_assigned(), 4);
        assert_eq!(policy.num_waiting(), 1);
    }

    #[test]
    fn test_activating_resources_keep_their_batch() {
        let params = ModelParameters {
            activation_delay: 2,
            max_resources: 1,
            allocation_cost: 1.0,
            ..ModelParameters::default()
        };
        let mut store = RequestStore::new();
        store.insert(Request::new(0, 0, 10.0, 1));
        let buffered = BTreeSet::new();

        let mut policy = AmortizedBatchPolicy::new(&params, 1.0, 2.0).unwrap();
        let view = SimulationView::new(&params, 0, 0, &buffered, &store);
        assert!(policy.select_for_drop(&[0], &view).is_empty());
        assert_eq!(policy.predict_processing_capacity(&view), 1);

        // Next slot: the resource is still activating.
        let view = SimulationView::new(&params, 1, 0, &buffered, &store).with_allocated(1);
        assert!(policy.select_for_drop(&[], &view).is_empty());
        assert_eq!(policy.predict_processing_capacity(&view), 1);
        assert_eq!(policy.num_assigned(), 1);
    }

    #[test]
    fn test_due_departure_is_rejected() {
        let params = params();
        let store = RequestStore::new();
        let buffered = BTreeSet::new();
        let view = SimulationView::new(&params, 0, 0, &buffered, &store);
        let mut policy = AmortizedBatchPolicy::new(&params, 1.0, 2.0).unwrap();
        assert!(matches!(
            policy.handle_buffer_leave(&[1], LeaveReason::Due, &view),
            Err(ConfigError::DeadlinesUnsupported(_))
        ));
    }

    #[test]
    fn test_idle_slots_flush_waiting_queue() {
        let params = ModelParameters {
            allocation_cost: 1.0,
            ..ModelParameters::default()
        };
        let mut store = RequestStore::new();
        store.insert(Request::new(1, 0, 0.5, 1));
        let buffered = BTreeSet::new();
        let view = SimulationView::new(&params, 0, 0, &buffered, &store);

        // threshold = 1.5: two idle slots flush the queue
        let mut policy = AmortizedBatchPolicy::new(&params, 1.0, 1.5).unwrap();
        assert!(policy.select_for_drop(&[1], &view).is_empty());
        assert!(policy.select_for_drop(&[], &view).is_empty());
        assert_eq!(policy.select_for_drop(&[], &view), vec![1]);
        assert_eq!(policy.num_waiting(), 0);
    }
}
