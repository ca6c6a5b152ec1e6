//! Admission Simulator Core - Rust Engine
//!
//! Slotted simulator for online admission control over a pool of rentable
//! resources, with deterministic execution.
//!
//! # Architecture
//!
//! - **core**: Time management and the read-only view handed to policies
//! - **models**: Domain types (Request, ModelParameters)
//! - **structures**: Rank keys and the ordered containers policies build on
//! - **resources**: Resource pool with activation delay
//! - **accounting**: Costs, revenue and upper-bound estimators
//! - **policy**: Admission policies and their name grammar
//! - **orchestrator**: Main simulation loop
//! - **arrivals**: Workloads and deadline derivation
//! - **rng**: Deterministic random number generation
//! - **batch**: Parallel execution of independent runs
//!
//! # Critical Invariants
//!
//! 1. Every phase of a slot completes before the clock advances
//! 2. All randomness is deterministic (identity-seeded RNG)
//! 3. Policies decide, the orchestrator validates and applies

// Module declarations
pub mod accounting;
pub mod arrivals;
pub mod batch;
pub mod core;
pub mod models;
pub mod orchestrator;
pub mod policy;
pub mod resources;
pub mod rng;
pub mod structures;

// Re-exports for convenience
pub use accounting::{Accounting, AccountingSnapshot, EstimatorKind};
pub use arrivals::{ClassedRequest, DeadlineParameters, Workload};
pub use batch::{BatchRunner, CombineStrategy, ExperimentConfig, Metric, RunJob, RunOutcome};
pub use crate::core::context::SimulationView;
pub use crate::core::time::TimeManager;
pub use models::{ModelParameters, Request, RequestId, RequestStore, SimRequest};
pub use orchestrator::{ConfigError, Orchestrator, OrchestratorConfig, SimulationError, TickResult};
pub use policy::{AdmissionPolicy, AuxiliaryPolicyParameters, PolicyConfig};
pub use resources::{ResourceError, ResourceManager};
pub use rng::RngManager;
