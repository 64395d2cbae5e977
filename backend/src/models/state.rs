//! Grasp Attempt State
//!
//! Mutable run-time state of one policy execution. Created when the FSM
//! starts, mutated only by the FSM's own transitions, dropped when a
//! terminal state is reached.
//!
//! # Critical Invariants
//!
//! 1. **Monotone depth**: `grasp_z` never increases
//! 2. **Floor**: `grasp_z` never drops below the configured `grasp_z_min`
//! 3. **First attempt**: `first_attempt` is cleared by the first verification
//!    and never set again

use crate::kinematics::{down_orientation, GraspTargets};
use crate::policy::PolicyConfig;
use nalgebra::UnitQuaternion;
use serde::{Deserialize, Serialize};

/// States of the grasp policy
///
/// `Success` and `Fail` are terminal. Transitions are defined in
/// [`GraspPolicy::step`](crate::policy::GraspPolicy::step) with an exhaustive
/// match, so an unknown state cannot exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GraspState {
    Reset,
    Approach,
    Descend,
    Close,
    VerifyGrasp,
    Lift,
    Hold,
    Recover,
    Success,
    Fail,
}

impl GraspState {
    /// True for `Success` and `Fail`
    pub fn is_terminal(self) -> bool {
        matches!(self, GraspState::Success | GraspState::Fail)
    }

    /// Upper-case label used in logs and reports (e.g. `VERIFY_GRASP`)
    pub fn label(self) -> &'static str {
        match self {
            GraspState::Reset => "RESET",
            GraspState::Approach => "APPROACH",
            GraspState::Descend => "DESCEND",
            GraspState::Close => "CLOSE",
            GraspState::VerifyGrasp => "VERIFY_GRASP",
            GraspState::Lift => "LIFT",
            GraspState::Hold => "HOLD",
            GraspState::Recover => "RECOVER",
            GraspState::Success => "SUCCESS",
            GraspState::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for GraspState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Run-time state of a single FSM execution
///
/// # Example
///
/// ```rust
/// use panda_grasp_core::{GraspAttemptState, GraspState, PolicyConfig};
///
/// let cfg = PolicyConfig::default();
/// let mut state = GraspAttemptState::new(&cfg);
/// assert_eq!(state.current, GraspState::Reset);
/// assert_eq!(state.retries, 0);
/// assert!(state.first_attempt);
///
/// state.lower_grasp_z(cfg.grasp_z_step, cfg.grasp_z_min);
/// assert!(state.grasp_z < cfg.grasp_z_offset);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraspAttemptState {
    /// State to be processed next
    pub current: GraspState,

    /// Number of RECOVER visits so far
    pub retries: u32,

    /// Current vertical offset of the grasp point above the object center
    pub grasp_z: f64,

    /// True until the first VERIFY_GRASP has run
    pub first_attempt: bool,

    /// Downward end-effector orientation, fixed for the whole run
    pub orientation: UnitQuaternion<f64>,

    /// Targets computed by the most recent APPROACH
    pub targets: Option<GraspTargets>,

    /// Contact count from the most recent VERIFY_GRASP
    pub last_contacts: Option<usize>,
}

impl GraspAttemptState {
    /// Fresh state for a new run
    pub fn new(cfg: &PolicyConfig) -> Self {
        Self {
            current: GraspState::Reset,
            retries: 0,
            grasp_z: cfg.grasp_z_offset,
            first_attempt: true,
            orientation: down_orientation(),
            targets: None,
            last_contacts: None,
        }
    }

    /// Decrease `grasp_z` by `step`, floored at `min`. Returns the new value.
    ///
    /// Never raises `grasp_z`, even if `min` is above the current value.
    pub fn lower_grasp_z(&mut self, step: f64, min: f64) -> f64 {
        let lowered = (self.grasp_z - step).max(min);
        self.grasp_z = lowered.min(self.grasp_z);
        self.grasp_z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(GraspState::Success.is_terminal());
        assert!(GraspState::Fail.is_terminal());
        assert!(!GraspState::Recover.is_terminal());
        assert!(!GraspState::Reset.is_terminal());
    }

    #[test]
    fn test_labels_match_serde_names() {
        let json = serde_json::to_string(&GraspState::VerifyGrasp).unwrap();
        assert_eq!(json, "\"VERIFY_GRASP\"");
        assert_eq!(GraspState::VerifyGrasp.label(), "VERIFY_GRASP");
    }

    #[test]
    fn test_lower_grasp_z_clamps_at_floor() {
        let cfg = PolicyConfig {
            grasp_z_offset: 0.012,
            grasp_z_min: 0.01,
            grasp_z_step: 0.005,
            ..PolicyConfig::default()
        };
        let mut state = GraspAttemptState::new(&cfg);

        assert_eq!(state.lower_grasp_z(cfg.grasp_z_step, cfg.grasp_z_min), 0.01);
        assert_eq!(state.lower_grasp_z(cfg.grasp_z_step, cfg.grasp_z_min), 0.01);
    }

    #[test]
    fn test_lower_grasp_z_never_raises() {
        let cfg = PolicyConfig::default();
        let mut state = GraspAttemptState::new(&cfg);
        state.grasp_z = 0.005;

        // Floor above the current value must not push grasp_z back up
        assert_eq!(state.lower_grasp_z(0.005, 0.01), 0.005);
    }
}
