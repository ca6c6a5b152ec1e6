//! Single-order priority queue
//!
//! Admits positive-density requests into one queue ordered by a
//! [`PriorityOrder`] and trims the worst of them when the buffer overflows.
//! Each tick the best `ready` requests are taken out for processing; the
//! unfinished ones go back in afterwards with a freshly computed key, since
//! orders such as `v/w` depend on the remaining processing time.
//!
//! Keys are computed when a request enters the queue and stay fixed while it
//! waits.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use super::{AdmissionPolicy, LeaveReason};
use crate::core::context::SimulationView;
use crate::models::{RequestId, SimRequest};
use crate::orchestrator::ConfigError;
use crate::structures::RankKey;

/// Queue orders; all break ties by ascending request id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriorityOrder {
    /// `v/w`: value per remaining tick, highest first
    ValueByRemaining,
    /// `v/d`: value per slot of deadline slack left, highest first
    ValueByDeadline,
    /// `v/wi`: value per initial tick, highest first
    ValueByInitial,
    /// `-d`: earliest deadline first
    EarliestDeadline,
    /// `v`: highest value first
    Value,
    /// `-w`: least remaining work first
    ShortestRemaining,
}

impl PriorityOrder {
    pub const ALL: [PriorityOrder; 6] = [
        PriorityOrder::ValueByRemaining,
        PriorityOrder::ValueByDeadline,
        PriorityOrder::ValueByInitial,
        PriorityOrder::EarliestDeadline,
        PriorityOrder::Value,
        PriorityOrder::ShortestRemaining,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PriorityOrder::ValueByRemaining => "v/w",
            PriorityOrder::ValueByDeadline => "v/d",
            PriorityOrder::ValueByInitial => "v/wi",
            PriorityOrder::EarliestDeadline => "-d",
            PriorityOrder::Value => "v",
            PriorityOrder::ShortestRemaining => "-w",
        }
    }

    /// Rank key of `request` at tick `now`
    ///
    /// A request without deadline ranks as if its deadline were infinitely
    /// far away.
    pub fn key(&self, request: &SimRequest, now: usize) -> RankKey {
        let id = request.id();
        let value = request.value();
        match self {
            PriorityOrder::ValueByRemaining => {
                RankKey::descending(value / request.remaining_processing_time() as f64, id)
            }
            PriorityOrder::ValueByDeadline => {
                let slack = request
                    .current_deadline(now)
                    .map_or(f64::INFINITY, |d| d as f64);
                RankKey::descending(value / (slack + 1.0), id)
            }
            PriorityOrder::ValueByInitial => {
                RankKey::descending(value / request.initial_processing_time() as f64, id)
            }
            // The absolute deadline orders like the current slack at any
            // common tick.
            PriorityOrder::EarliestDeadline => RankKey::ascending(
                request
                    .request()
                    .absolute_deadline()
                    .map_or(f64::INFINITY, |d| d as f64),
                id,
            ),
            PriorityOrder::Value => RankKey::descending(value, id),
            PriorityOrder::ShortestRemaining => {
                RankKey::ascending(request.remaining_processing_time() as f64, id)
            }
        }
    }
}

impl fmt::Display for PriorityOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PriorityOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PriorityOrder::ALL
            .into_iter()
            .find(|order| order.name() == s.trim())
            .ok_or_else(|| ConfigError::UnknownPolicy(format!("pq({})", s)))
    }
}

/// Priority queue policy
#[derive(Debug, Clone)]
pub struct PriorityQueuePolicy {
    order: PriorityOrder,
    queue: BTreeSet<RankKey>,
    /// Keys of the requests currently in `queue`
    keys: HashMap<RequestId, RankKey>,
    in_service: Vec<RequestId>,
}

impl PriorityQueuePolicy {
    pub fn new(order: PriorityOrder) -> Self {
        Self {
            order,
            queue: BTreeSet::new(),
            keys: HashMap::new(),
            in_service: Vec::new(),
        }
    }

    pub fn order(&self) -> PriorityOrder {
        self.order
    }

    /// Requests waiting in the queue (excludes those in service)
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn enqueue(&mut self, request: &SimRequest, now: usize) {
        let key = self.order.key(request, now);
        if self.queue.insert(key) {
            self.keys.insert(request.id(), key);
        }
    }

    fn dequeue(&mut self, id: RequestId) -> bool {
        match self.keys.remove(&id) {
            Some(key) => self.queue.remove(&key),
            None => false,
        }
    }

    fn drop_to_fit(&mut self, cap: Option<usize>) -> Vec<RequestId> {
        let Some(cap) = cap else {
            return Vec::new();
        };
        let excess = self.queue.len().saturating_sub(cap);
        let mut dropped = Vec::with_capacity(excess);
        for _ in 0..excess {
            let Some(worst) = self.queue.pop_last() else {
                break;
            };
            self.keys.remove(&worst.id());
            dropped.push(worst.id());
        }
        dropped
    }
}

impl AdmissionPolicy for PriorityQueuePolicy {
    fn select_for_drop(
        &mut self,
        arriving: &[RequestId],
        view: &SimulationView<'_>,
    ) -> Vec<RequestId> {
        let params = view.params();
        let mut dropped = Vec::new();
        for &id in arriving {
            match view.request(id) {
                Some(request) if request.request().hot_unit_value(params) > 0.0 => {
                    self.enqueue(request, view.current_tick());
                }
                _ => dropped.push(id),
            }
        }
        dropped.extend(self.drop_to_fit(params.buffer_cap));
        dropped
    }

    fn select_for_processing(&mut self, view: &SimulationView<'_>) -> Vec<RequestId> {
        for _ in 0..view.ready_resources() {
            let Some(best) = self.queue.pop_first() else {
                break;
            };
            self.keys.remove(&best.id());
            self.in_service.push(best.id());
        }
        self.in_service.clone()
    }

    fn handle_processing_finished(&mut self, view: &SimulationView<'_>) {
        for id in std::mem::take(&mut self.in_service) {
            if let Some(request) = view.request(id) {
                if !request.is_complete() {
                    self.enqueue(request, view.current_tick());
                }
            }
        }
    }

    fn predict_processing_capacity(&mut self, view: &SimulationView<'_>) -> usize {
        view.buffered_count().min(view.params().max_resources)
    }

    fn handle_buffer_leave(
        &mut self,
        leaving: &[RequestId],
        _reason: LeaveReason,
        _view: &SimulationView<'_>,
    ) -> Result<(), ConfigError> {
        for &id in leaving {
            self.dequeue(id);
        }
        Ok(())
    }
}
