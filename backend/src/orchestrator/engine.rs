//! Orchestrator engine
//!
//! Drives one simulation run over a finite sequence of time slots.
//!
//! # Tick pipeline
//!
//! ```text
//! For each slot t:
//! 1. Admission      arrivals -> accounting, deadline watch, policy drops
//! 2. Allocation     (activation delay == 0 only) so capacity is usable now
//! 3. Processing     maintenance, policy selection, one tick of work,
//!                   completions
//! 4. Expiration     requests past their latest finish tick are dropped
//! 5. Allocation     (activation delay > 0 only) after seeing this slot's demand
//! 6. Advance        resources tick, clock advances
//! ```
//!
//! After the input is exhausted the estimator is finalized and empty slots
//! are processed until the buffer is drained.
//!
//! # Contracts
//!
//! Policy answers are validated on every tick. Any breach aborts the run with
//! [`SimulationError::ContractViolation`]:
//! - drops must come from the buffer or the current arrivals
//! - the buffer must fit its cap after admission
//! - at most `ready` distinct buffered requests may be selected
//! - a selected request must still owe processing
//! - predicted capacity must not exceed `max_resources`
//!
//! # Example
//!
//! ```
//! use admission_simulator_core_rs::orchestrator::{Orchestrator, OrchestratorConfig};
//! use admission_simulator_core_rs::policy::PolicyConfig;
//! use admission_simulator_core_rs::{ModelParameters, Request};
//!
//! let config = OrchestratorConfig::new(ModelParameters::default(), PolicyConfig::Threshold);
//! let mut orchestrator = Orchestrator::new(config).unwrap();
//!
//! let slots: Vec<Vec<Request>> = (0..5).map(|t| vec![Request::new(t as u64, t, 10.0, 1)]).collect();
//! let snapshot = orchestrator.run(&slots).unwrap();
//! assert_eq!(snapshot.objective, 50.0);
//! assert_eq!(snapshot.num_completed, 5);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::accounting::{Accounting, AccountingSnapshot, EstimatorKind};
use crate::core::context::SimulationView;
use crate::core::time::TimeManager;
use crate::models::{ModelParameters, Request, RequestId, RequestStore};
use crate::orchestrator::error::{ConfigError, SimulationError};
use crate::policy::{AdmissionPolicy, AuxiliaryPolicyParameters, LeaveReason, PolicyConfig};
use crate::resources::ResourceManager;
use crate::structures::ExpirationTracker;

// ============================================================================
// Configuration Types
// ============================================================================

/// Everything needed to set up one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub params: ModelParameters,

    pub policy: PolicyConfig,

    #[serde(default)]
    pub aux: AuxiliaryPolicyParameters,

    #[serde(default)]
    pub estimator: EstimatorKind,

    /// Whether every request of the workload needs exactly one tick
    /// (selects the capacity-aware bound for `smart`)
    #[serde(default)]
    pub unit_processing: bool,

    /// Abort the drain phase after this many empty slots (None = unbounded)
    #[serde(default)]
    pub max_drain_ticks: Option<usize>,
}

impl OrchestratorConfig {
    pub fn new(params: ModelParameters, policy: PolicyConfig) -> Self {
        Self {
            params,
            policy,
            aux: AuxiliaryPolicyParameters::default(),
            estimator: EstimatorKind::default(),
            unit_processing: false,
            max_drain_ticks: None,
        }
    }
}

/// Summary of one processed slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickResult {
    pub tick: usize,
    pub num_arrivals: usize,
    /// Requests dropped during admission (arrivals or buffered)
    pub num_rejected: usize,
    pub num_completed: usize,
    /// Requests dropped because their deadline passed
    pub num_expired: usize,
    /// Ready resources during processing
    pub ready_resources: usize,
    /// Buffer size at the end of the slot
    pub buffered: usize,
}

type DeadlineFn = fn(&RequestId, &RequestStore) -> Option<i64>;

/// Latest tick at which a request can still finish with the work it has left
fn latest_finish_tick(id: &RequestId, requests: &RequestStore) -> Option<i64> {
    requests.get(*id).and_then(|r| r.latest_finish_tick())
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Owns all state of one run
///
/// Runs are independent: nothing in here is shared with other orchestrators.
pub struct Orchestrator {
    params: ModelParameters,
    policy_name: String,
    supports_deadlines: bool,
    max_drain_ticks: Option<usize>,

    time_manager: TimeManager,
    resources: ResourceManager,
    accounting: Accounting,
    policy: Box<dyn AdmissionPolicy>,

    /// Every request seen so far
    requests: RequestStore,
    /// Admitted, not completed, not dropped
    buffered: BTreeSet<RequestId>,
    deadlines: ExpirationTracker<RequestId, DeadlineFn>,
}

impl Orchestrator {
    /// Validate the configuration and build a fresh run
    pub fn new(config: OrchestratorConfig) -> Result<Self, SimulationError> {
        config.params.validate()?;
        let policy = config.policy.create(&config.params, &config.aux)?;
        let estimator = config
            .estimator
            .build(&config.params, config.unit_processing);

        Ok(Self {
            resources: ResourceManager::new(
                config.params.max_resources,
                config.params.activation_delay,
            ),
            accounting: Accounting::new(config.params.clone(), estimator),
            policy_name: config.policy.to_string(),
            supports_deadlines: config.policy.supports_deadlines(),
            max_drain_ticks: config.max_drain_ticks,
            params: config.params,
            time_manager: TimeManager::new(),
            policy,
            requests: RequestStore::new(),
            buffered: BTreeSet::new(),
            deadlines: ExpirationTracker::new(latest_finish_tick as DeadlineFn),
        })
    }

    pub fn current_tick(&self) -> usize {
        self.time_manager.current_tick()
    }

    pub fn params(&self) -> &ModelParameters {
        &self.params
    }

    pub fn policy_name(&self) -> &str {
        &self.policy_name
    }

    pub fn accounting(&self) -> &Accounting {
        &self.accounting
    }

    pub fn snapshot(&self) -> AccountingSnapshot {
        self.accounting.snapshot()
    }

    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    pub fn requests(&self) -> &RequestStore {
        &self.requests
    }

    pub fn buffered(&self) -> &BTreeSet<RequestId> {
        &self.buffered
    }

    /// Process every slot, finalize the bound, then drain the buffer
    pub fn run(&mut self, slots: &[Vec<Request>]) -> Result<AccountingSnapshot, SimulationError> {
        tracing::info!(
            policy = %self.policy_name,
            params = %self.params,
            slots = slots.len(),
            "starting run"
        );
        for slot in slots {
            self.process_time_slot(slot)?;
        }
        self.finish_input();
        self.drain()?;

        let snapshot = self.snapshot();
        tracing::info!(
            policy = %self.policy_name,
            ticks = self.current_tick(),
            objective = snapshot.objective,
            completed = snapshot.num_completed,
            dropped = snapshot.num_dropped,
            "run finished"
        );
        Ok(snapshot)
    }

    /// Signal that no more input slots follow
    pub fn finish_input(&mut self) {
        self.accounting.finish();
    }

    /// Process empty slots until the buffer is empty
    pub fn drain(&mut self) -> Result<usize, SimulationError> {
        let mut ticks = 0;
        while !self.buffered.is_empty() {
            if self.max_drain_ticks.is_some_and(|max| ticks >= max) {
                return Err(SimulationError::DrainStalled {
                    ticks,
                    buffered: self.buffered.len(),
                });
            }
            self.process_time_slot(&[])?;
            ticks += 1;
        }
        tracing::debug!(ticks, "buffer drained");
        Ok(ticks)
    }

    /// Run the full tick pipeline for one slot of arrivals
    pub fn process_time_slot(&mut self, arrivals: &[Request]) -> Result<TickResult, SimulationError> {
        let tick = self.current_tick();

        let num_rejected = self.admit(arrivals)?;
        if self.params.activation_delay == 0 {
            self.predict_and_allocate()?;
        }
        let ready_resources = self.resources.num_ready();
        let num_completed = self.process()?;
        let num_expired = self.drop_due()?;
        if self.params.activation_delay > 0 {
            self.predict_and_allocate()?;
        }
        self.resources.tick();
        self.time_manager.advance_tick();

        Ok(TickResult {
            tick,
            num_arrivals: arrivals.len(),
            num_rejected,
            num_completed,
            num_expired,
            ready_resources,
            buffered: self.buffered.len(),
        })
    }

    // ------------------------------------------------------------------------
    // Pipeline stages
    // ------------------------------------------------------------------------

    fn admit(&mut self, arrivals: &[Request]) -> Result<usize, SimulationError> {
        let tick = self.current_tick();

        for request in arrivals {
            if request.processing_time == 0 {
                return Err(SimulationError::InvalidRequest {
                    id: request.id,
                    message: "processing time must be positive".to_string(),
                });
            }
            if request.deadline.is_some() && !self.supports_deadlines {
                return Err(ConfigError::DeadlinesUnsupported(self.policy_name.clone()).into());
            }
            if !self.requests.insert(*request) {
                return Err(SimulationError::InvalidRequest {
                    id: request.id,
                    message: "duplicate request id".to_string(),
                });
            }
        }
        self.accounting.note_arrived(arrivals);

        let arrived: Vec<RequestId> = arrivals.iter().map(|r| r.id).collect();
        for &id in &arrived {
            self.deadlines.watch_for_expiration(id, &self.requests);
        }

        let view = SimulationView::new(
            &self.params,
            tick,
            self.resources.num_ready(),
            &self.buffered,
            &self.requests,
        );
        let dropped = self.policy.select_for_drop(&arrived, &view);

        let arrived_set: HashSet<RequestId> = arrived.iter().copied().collect();
        let mut seen = HashSet::with_capacity(dropped.len());
        for &id in &dropped {
            if !seen.insert(id) {
                return Err(SimulationError::contract(
                    tick,
                    format!("request {} dropped twice", id),
                ));
            }
            if !arrived_set.contains(&id) && !self.buffered.contains(&id) {
                return Err(SimulationError::contract(
                    tick,
                    format!("dropped request {} is neither buffered nor arriving", id),
                ));
            }
        }
        let dropped_buffered = dropped.iter().filter(|id| self.buffered.contains(id)).count();
        let next_size = self.buffered.len() - dropped_buffered + (arrived.len() - (dropped.len() - dropped_buffered));
        if let Some(cap) = self.params.buffer_cap {
            if next_size > cap {
                return Err(SimulationError::contract(
                    tick,
                    format!("buffer would hold {} requests, cap is {}", next_size, cap),
                ));
            }
        }

        self.accounting
            .note_dropped(dropped.iter().filter_map(|id| self.requests.get(*id)), &self.time_manager);
        self.buffered.extend(arrived);
        for id in &dropped {
            self.buffered.remove(id);
        }
        if !dropped.is_empty() {
            tracing::debug!(tick, dropped = dropped.len(), "rejected at admission");
        }
        Ok(dropped.len())
    }

    fn process(&mut self) -> Result<usize, SimulationError> {
        let tick = self.current_tick();
        let ready = self.resources.num_ready();
        self.accounting.charge_maintenance(ready);

        let view = SimulationView::new(&self.params, tick, ready, &self.buffered, &self.requests);
        let selected = self.policy.select_for_processing(&view);

        if selected.len() > ready {
            return Err(SimulationError::contract(
                tick,
                format!("selected {} requests with {} ready resources", selected.len(), ready),
            ));
        }
        let mut seen = HashSet::with_capacity(selected.len());
        for &id in &selected {
            if !self.buffered.contains(&id) {
                return Err(SimulationError::contract(
                    tick,
                    format!("selected request {} is not buffered", id),
                ));
            }
            if !seen.insert(id) {
                return Err(SimulationError::contract(
                    tick,
                    format!("request {} selected twice", id),
                ));
            }
        }

        for &id in &selected {
            let advanced = self
                .requests
                .get_mut(id)
                .map(|request| request.process())
                .unwrap_or(false);
            if !advanced {
                return Err(SimulationError::contract(
                    tick,
                    format!("request {} has no processing left", id),
                ));
            }
        }

        let view = SimulationView::new(&self.params, tick, ready, &self.buffered, &self.requests);
        self.policy.handle_processing_finished(&view);

        let completed: Vec<RequestId> = selected
            .into_iter()
            .filter(|id| self.requests.get(*id).is_some_and(|r| r.is_complete()))
            .collect();
        self.accounting
            .account_completed(
                completed.iter().filter_map(|id| self.requests.get(*id)),
                &self.time_manager,
            );
        for id in &completed {
            self.buffered.remove(id);
        }

        let view = SimulationView::new(&self.params, tick, ready, &self.buffered, &self.requests);
        self.policy
            .handle_buffer_leave(&completed, LeaveReason::Completed, &view)?;
        Ok(completed.len())
    }

    fn drop_due(&mut self) -> Result<usize, SimulationError> {
        let tick = self.current_tick();
        self.deadlines.tick(&self.requests);
        let due: Vec<RequestId> = self
            .deadlines
            .poll_expired()
            .into_iter()
            .filter(|id| self.buffered.contains(id))
            .collect();
        if due.is_empty() {
            return Ok(0);
        }

        self.accounting
            .note_dropped(due.iter().filter_map(|id| self.requests.get(*id)), &self.time_manager);
        for id in &due {
            self.buffered.remove(id);
        }
        tracing::debug!(tick, expired = due.len(), "deadline passed");

        let view = SimulationView::new(
            &self.params,
            tick,
            self.resources.num_ready(),
            &self.buffered,
            &self.requests,
        );
        self.policy.handle_buffer_leave(&due, LeaveReason::Due, &view)?;
        Ok(due.len())
    }

    fn predict_and_allocate(&mut self) -> Result<(), SimulationError> {
        let tick = self.current_tick();
        let view = SimulationView::new(
            &self.params,
            tick,
            self.resources.num_ready(),
            &self.buffered,
            &self.requests,
        )
        .with_allocated(self.resources.num_allocated());
        let target = self.policy.predict_processing_capacity(&view);
        if target > self.params.max_resources {
            return Err(SimulationError::contract(
                tick,
                format!(
                    "predicted capacity {} exceeds maximum {}",
                    target, self.params.max_resources
                ),
            ));
        }

        let delta = self
            .resources
            .request_capacity(target)
            .map_err(|e| SimulationError::contract(tick, e.to_string()))?;
        if delta > 0 {
            self.accounting.charge_allocation(delta as usize);
        }
        if delta != 0 {
            tracing::debug!(tick, target, delta, "capacity changed");
        }
        Ok(())
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("policy", &self.policy_name)
            .field("params", &self.params)
            .field("current_tick", &self.current_tick())
            .field("buffered", &self.buffered.len())
            .field("ready", &self.resources.num_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PriorityOrder;

    #[test]
    fn test_invalid_model_is_config_error() {
        let params = ModelParameters {
            max_resources: 0,
            ..ModelParameters::default()
        };
        let err = Orchestrator::new(OrchestratorConfig::new(params, PolicyConfig::Threshold))
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_zero_processing_time_rejected() {
        let config = OrchestratorConfig::new(ModelParameters::default(), PolicyConfig::Threshold);
        let mut orchestrator = Orchestrator::new(config).unwrap();
        let err = orchestrator
            .process_time_slot(&[Request::new(1, 0, 1.0, 0)])
            .unwrap_err();
        assert!(matches!(err, SimulationError::InvalidRequest { id: 1, .. }));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let config = OrchestratorConfig::new(ModelParameters::default(), PolicyConfig::Threshold);
        let mut orchestrator = Orchestrator::new(config).unwrap();
        orchestrator.process_time_slot(&[Request::new(1, 0, 1.0, 1)]).unwrap();
        let err = orchestrator
            .process_time_slot(&[Request::new(1, 1, 1.0, 1)])
            .unwrap_err();
        assert!(matches!(err, SimulationError::InvalidRequest { .. }));
    }

    #[test]
    fn test_batch_policy_refuses_deadlines() {
        let mut config = OrchestratorConfig::new(
            ModelParameters::default(),
            "batch(2)".parse().unwrap(),
        );
        config.aux.min_value = 1.0;
        let mut orchestrator = Orchestrator::new(config).unwrap();
        let err = orchestrator
            .process_time_slot(&[Request::new(1, 0, 1.0, 1).with_deadline(3)])
            .unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Config(ConfigError::DeadlinesUnsupported(_))
        ));
    }

    #[test]
    fn test_activation_delay_postpones_processing() {
        let params = ModelParameters {
            activation_delay: 2,
            ..ModelParameters::default()
        };
        let config = OrchestratorConfig::new(params, PolicyConfig::Threshold);
        let mut orchestrator = Orchestrator::new(config).unwrap();

        let first = orchestrator
            .process_time_slot(&[Request::new(1, 0, 5.0, 1)])
            .unwrap();
        assert_eq!(first.ready_resources, 0);
        assert_eq!(orchestrator.resources().num_pending(), 1);

        let second = orchestrator.process_time_slot(&[]).unwrap();
        assert_eq!(second.num_completed, 0);
        let third = orchestrator.process_time_slot(&[]).unwrap();
        assert_eq!(third.ready_resources, 1);
        assert_eq!(third.num_completed, 1);
        // completed at tick 2, released at 0
        assert_eq!(orchestrator.accounting().average_latency(), 2.0);
    }

    #[test]
    fn test_expired_requests_leave_buffer() {
        let params = ModelParameters {
            activation_delay: 5,
            ..ModelParameters::default()
        };
        let config = OrchestratorConfig::new(
            params,
            PolicyConfig::PriorityQueue {
                order: PriorityOrder::EarliestDeadline,
            },
        );
        let mut orchestrator = Orchestrator::new(config).unwrap();
        let result = orchestrator
            .process_time_slot(&[Request::new(1, 0, 5.0, 1).with_deadline(1)])
            .unwrap();
        // latest finish tick is 0: expires at the end of the first slot
        assert_eq!(result.num_expired, 1);
        assert_eq!(result.buffered, 0);
        assert_eq!(orchestrator.accounting().num_dropped(), 1);
    }

    #[test]
    fn test_drain_guard() {
        let params = ModelParameters {
            activation_delay: 10,
            ..ModelParameters::default()
        };
        let mut config = OrchestratorConfig::new(params, PolicyConfig::Threshold);
        config.max_drain_ticks = Some(3);
        let mut orchestrator = Orchestrator::new(config).unwrap();
        let err = orchestrator
            .run(&[vec![Request::new(1, 0, 5.0, 1)]])
            .unwrap_err();
        assert_eq!(
            err,
            SimulationError::DrainStalled {
                ticks: 3,
                buffered: 1
            }
        );
    }
}
