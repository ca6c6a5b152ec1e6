//! Baseline threshold admission
//!
//! Admits every arriving request with positive hot unit value, in arrival
//! order, while the buffer has room. Processes buffered requests in
//! ascending id order (oldest first, since workloads number requests in
//! release order). Asks for as many resources as there is buffered work.

use super::{AdmissionPolicy, LeaveReason};
use crate::core::context::SimulationView;
use crate::models::RequestId;
use crate::orchestrator::ConfigError;

/// Stateless baseline policy
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdPolicy;

impl ThresholdPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl AdmissionPolicy for ThresholdPolicy {
    fn select_for_drop(
        &mut self,
        arriving: &[RequestId],
        view: &SimulationView<'_>,
    ) -> Vec<RequestId> {
        let params = view.params();
        let (accepted, mut dropped): (Vec<RequestId>, Vec<RequestId>) =
            arriving.iter().copied().partition(|id| {
                view.request(*id)
                    .is_some_and(|r| r.request().hot_unit_value(params) > 0.0)
            });

        if let Some(cap) = params.buffer_cap {
            let room = cap.saturating_sub(view.buffered_count());
            dropped.extend(accepted.into_iter().skip(room));
        }
        dropped
    }

    fn select_for_processing(&mut self, view: &SimulationView<'_>) -> Vec<RequestId> {
        view.buffered().take(view.ready_resources()).collect()
    }

    fn handle_processing_finished(&mut self, _view: &SimulationView<'_>) {}

    fn predict_processing_capacity(&mut self, view: &SimulationView<'_>) -> usize {
        view.buffered_count().min(view.params().max_resources)
    }

    fn handle_buffer_leave(
        &mut self,
        _leaving: &[RequestId],
        _reason: LeaveReason,
        _view: &SimulationView<'_>,
    ) -> Result<(), ConfigError> {
        Ok(())
    }
}
