//! Orchestrator - scene bootstrap, policy run and reporting
//!
//! See `engine.rs` for the run sequence.

pub mod engine;
pub mod report;

// Re-export main types for convenience
pub use engine::{Orchestrator, OrchestratorConfig, OrchestratorError};
pub use report::{compute_config_hash, RunReport};
