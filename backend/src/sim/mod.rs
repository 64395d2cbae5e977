//! Simulation collaborator interface
//!
//! The grasp policy never talks to a physics engine directly. It drives a
//! [`Simulation`], which exposes exactly the primitives the policy needs:
//! stepping, gripper and joint actuation, inverse kinematics, and
//! ground-truth pose and contact queries.
//!
//! Two implementations ship with the crate:
//! - [`KinematicWorld`]: deterministic built-in world with a Panda arm
//! - [`ScriptedSimulation`]: scripted contacts and poses for tests

pub mod kinematic;
pub mod mock;
pub mod panda;
pub mod scene;

pub use kinematic::KinematicWorld;
pub use mock::ScriptedSimulation;
pub use scene::{discover_indices, load_scene, reset_home, Scene, SceneConfig, SetupError};

use crate::models::{BodyId, ContactPoint, JointIndex, JointInfo, ObjectPose};
use nalgebra::{Point3, UnitQuaternion};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default IK iteration cap
pub const IK_MAX_ITERATIONS: u32 = 200;

/// Default IK residual threshold
pub const IK_RESIDUAL_THRESHOLD: f64 = 1e-4;

/// Bounds for an inverse-kinematics solve
///
/// Solvers stop at whichever comes first. Running out of iterations is not an
/// error: the best joint vector found so far is returned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IkParams {
    /// Maximum solver iterations
    pub max_iterations: u32,
    /// Stop once the pose residual drops below this
    pub residual_threshold: f64,
}

impl Default for IkParams {
    fn default() -> Self {
        Self {
            max_iterations: IK_MAX_ITERATIONS,
            residual_threshold: IK_RESIDUAL_THRESHOLD,
        }
    }
}

/// Errors raised by a simulation backend
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("Unknown body: {0}")]
    UnknownBody(BodyId),

    #[error("{body} has no joint {joint}")]
    UnknownJoint { body: BodyId, joint: JointIndex },

    #[error("{0} is not articulated")]
    NotArticulated(BodyId),

    #[error("Joint/target length mismatch: {joints} joints, {targets} targets")]
    TargetLengthMismatch { joints: usize, targets: usize },

    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),
}

/// Primitives a grasp run needs from the physics engine
pub trait Simulation {
    /// Advance physics by `n_steps` discrete steps
    fn advance(&mut self, n_steps: u32) -> Result<(), SimError>;

    /// Total steps advanced since the world was created
    fn step_count(&self) -> u64;

    /// Drive `finger_joints` toward `width` (per finger) with a force limit
    fn set_gripper_target(
        &mut self,
        robot: BodyId,
        finger_joints: &[JointIndex],
        width: f64,
        force: f64,
    ) -> Result<(), SimError>;

    /// Best-effort IK for `ee_link` reaching `position` / `orientation`
    ///
    /// Returns one target per movable joint of `robot`, in joint order.
    /// Non-convergence yields the closest solution found, not an error.
    fn solve_ik(
        &mut self,
        robot: BodyId,
        ee_link: JointIndex,
        position: &Point3<f64>,
        orientation: &UnitQuaternion<f64>,
        params: IkParams,
    ) -> Result<Vec<f64>, SimError>;

    /// Set position-control targets for `joints`
    fn command_joint_targets(
        &mut self,
        robot: BodyId,
        joints: &[JointIndex],
        targets: &[f64],
        force: f64,
    ) -> Result<(), SimError>;

    /// Ground-truth base pose of `body`
    fn object_pose(&self, body: BodyId) -> Result<ObjectPose, SimError>;

    /// Contact points currently detected between `body_a` and `body_b`
    fn contacts(&self, body_a: BodyId, body_b: BodyId) -> Result<Vec<ContactPoint>, SimError>;

    /// Joint descriptions of an articulated body, in index order
    fn joint_infos(&self, robot: BodyId) -> Result<Vec<JointInfo>, SimError>;

    /// Teleport a joint to `value` (setup only, bypasses actuation)
    fn reset_joint_state(
        &mut self,
        robot: BodyId,
        joint: JointIndex,
        value: f64,
    ) -> Result<(), SimError>;
}
