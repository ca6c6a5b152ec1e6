//! Simulation clock and the read-only view handed to policies

pub mod context;
pub mod time;
