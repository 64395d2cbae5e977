//! Run Report - serializable summary of a grasp run
//!
//! Captures the outcome, the visited-state trace and the full event log so a
//! run can be inspected or compared after the fact.
//!
//! # Critical Invariants
//!
//! - **Determinism**: same config and same world produce identical reports
//! - **Config Matching**: `config_hash` identifies the policy tunables used

use super::engine::{OrchestratorConfig, OrchestratorError};
use crate::models::{EventLog, GraspState};
use crate::policy::RunOutcome;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

// ============================================================================
// Report Structure
// ============================================================================

/// Summary of one completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// `Success` or `Fail`
    pub outcome: GraspState,

    /// Whether the first grasp was deliberately offset
    pub recovery_demo: bool,

    /// States in processing order, terminal state last
    pub states: Vec<GraspState>,

    /// RECOVER visits
    pub retries: u32,

    /// Grasp offset in use when the run ended
    pub final_grasp_z: f64,

    /// Contact count of the last verification
    pub last_contacts: Option<usize>,

    /// Simulation steps taken from scene load to the end of the run
    pub total_steps: u64,

    /// Object position when the run ended
    pub object_position: Point3<f64>,

    /// SHA-256 of the canonical policy config
    pub config_hash: String,

    /// Full event log
    pub events: EventLog,
}

impl RunReport {
    /// Build a report from a finished run
    pub fn new(
        run: &RunOutcome,
        config: &OrchestratorConfig,
        total_steps: u64,
        object_position: Point3<f64>,
    ) -> Result<Self, OrchestratorError> {
        Ok(Self {
            outcome: run.outcome,
            recovery_demo: config.recovery_demo,
            states: run.events.visited_states(),
            retries: run.state.retries,
            final_grasp_z: run.state.grasp_z,
            last_contacts: run.state.last_contacts,
            total_steps,
            object_position,
            config_hash: compute_config_hash(&config.policy)?,
            events: run.events.clone(),
        })
    }

    /// Times RECOVER appears in the trace
    pub fn recover_visits(&self) -> usize {
        self.states
            .iter()
            .filter(|s| **s == GraspState::Recover)
            .count()
    }

    /// Pretty JSON rendering
    pub fn to_json(&self) -> Result<String, OrchestratorError> {
        serde_json::to_string_pretty(self).map_err(|e| {
            OrchestratorError::Serialization(format!("Report serialization failed: {}", e))
        })
    }
}

// ============================================================================
// Config Hashing
// ============================================================================

/// Compute deterministic SHA256 hash of config
///
/// Uses canonical JSON serialization with sorted keys so the hash does not
/// depend on field or map ordering.
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, OrchestratorError> {
    let serialization = |e: serde_json::Error| {
        OrchestratorError::Serialization(format!("Config serialization failed: {}", e))
    };

    let value = serde_json::to_value(config).map_err(serialization)?;
    let json = serde_json::to_string(&canonicalize(value)).map_err(serialization)?;

    Ok(format!("{:x}", Sha256::digest(json.as_bytes())))
}

/// Rebuild `value` with the keys of every nested object sorted
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
