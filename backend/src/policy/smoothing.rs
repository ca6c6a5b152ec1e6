//! Capacity-smoothing adaptor
//!
//! Wraps a [`PriorityQueuePolicy`] and only changes its capacity prediction:
//! the raw predictions of the last `window` ticks are summarized by a
//! [`SmoothingStatistic`], but the result never drops below the demand
//! currently being served (`min(ready, buffered)`).

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use super::{AdmissionPolicy, LeaveReason, PriorityQueuePolicy};
use crate::core::context::SimulationView;
use crate::models::RequestId;
use crate::orchestrator::ConfigError;

/// Summary of the prediction window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingStatistic {
    /// Arithmetic mean, truncated
    Mean,
    /// Element at index `n / 2` of the sorted window
    Median,
}

impl SmoothingStatistic {
    pub fn apply(&self, window: &VecDeque<usize>) -> usize {
        if window.is_empty() {
            return 0;
        }
        match self {
            SmoothingStatistic::Mean => window.iter().sum::<usize>() / window.len(),
            SmoothingStatistic::Median => {
                let mut sorted: Vec<usize> = window.iter().copied().collect();
                sorted.sort_unstable();
                sorted[sorted.len() / 2]
            }
        }
    }
}

impl fmt::Display for SmoothingStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmoothingStatistic::Mean => write!(f, "mean"),
            SmoothingStatistic::Median => write!(f, "median"),
        }
    }
}

impl FromStr for SmoothingStatistic {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" | "average" => Ok(SmoothingStatistic::Mean),
            "median" => Ok(SmoothingStatistic::Median),
            _ => Err(ConfigError::UnknownPolicy(format!("smoothing statistic {}", s))),
        }
    }
}

/// Priority queue with windowed capacity predictions
#[derive(Debug, Clone)]
pub struct SmoothingPolicy {
    inner: PriorityQueuePolicy,
    statistic: SmoothingStatistic,
    window: usize,
    history: VecDeque<usize>,
}

impl SmoothingPolicy {
    pub fn new(inner: PriorityQueuePolicy, statistic: SmoothingStatistic, window: usize) -> Self {
        Self {
            inner,
            statistic,
            window: window.max(1),
            history: VecDeque::with_capacity(window.max(1)),
        }
    }

    pub fn history(&self) -> &VecDeque<usize> {
        &self.history
    }
}

impl AdmissionPolicy for SmoothingPolicy {
    fn select_for_drop(
        &mut self,
        arriving: &[RequestId],
        view: &SimulationView<'_>,
    ) -> Vec<RequestId> {
        self.inner.select_for_drop(arriving, view)
    }

    fn select_for_processing(&mut self, view: &SimulationView<'_>) -> Vec<RequestId> {
        self.inner.select_for_processing(view)
    }

    fn handle_processing_finished(&mut self, view: &SimulationView<'_>) {
        self.inner.handle_processing_finished(view)
    }

    fn predict_processing_capacity(&mut self, view: &SimulationView<'_>) -> usize {
        self.history
            .push_back(self.inner.predict_processing_capacity(view));
        if self.history.len() > self.window {
            self.history.pop_front();
        }
        let floor = view.ready_resources().min(view.buffered_count());
        self.statistic.apply(&self.history).max(floor)
    }

    fn handle_buffer_leave(
        &mut self,
        leaving: &[RequestId],
        reason: LeaveReason,
        view: &SimulationView<'_>,
    ) -> Result<(), ConfigError> {
        self.inner.handle_buffer_leave(leaving, reason, view)
    }
}
