//! Orchestrator - the per-slot simulation pipeline
//!
//! See `engine.rs` for the tick order and the policy contracts, `error.rs`
//! for the error taxonomy.

pub mod engine;
pub mod error;

pub use engine::{Orchestrator, OrchestratorConfig, TickResult};
pub use error::{ConfigError, SimulationError};
