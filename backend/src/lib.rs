//! Panda Grasp Core - Rust Engine
//!
//! Scripted grasp-and-lift for a simulated Franka Panda arm, with a bounded
//! recovery loop for failed grasps.
//!
//! # Architecture
//!
//! - **core**: Step clock
//! - **models**: Domain types (poses, joint records, contacts, attempt state, events)
//! - **kinematics**: Grasp geometry (pregrasp/grasp/lift targets)
//! - **sim**: Simulation collaborator trait, built-in kinematic world, scene bootstrap
//! - **motion**: IK moves, gripper actuation, stepping
//! - **policy**: Grasp state machine and contact verification
//! - **orchestrator**: Bootstrap, run, report
//!
//! # Critical Invariants
//!
//! 1. The policy always ends in SUCCESS or FAIL; only simulation faults are errors
//! 2. Object poses are read fresh at every decision point, never cached
//! 3. The built-in world is deterministic: same config, same trace

// Module declarations
pub mod core;
pub mod kinematics;
pub mod models;
pub mod motion;
pub mod orchestrator;
pub mod policy;
pub mod sim;

// Re-exports for convenience
pub use core::time::SimClock;
pub use models::{
    event::{Event, EventLog},
    state::{GraspAttemptState, GraspState},
};
pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorError, RunReport};
pub use policy::{
    run_fsm, verify_grasp, AttemptContext, ConfigError, GraspCheck, GraspPolicy, PolicyConfig,
    PolicyError, RunOutcome,
};
pub use sim::{KinematicWorld, SimError, Simulation};
