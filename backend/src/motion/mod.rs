//! Motion executor
//!
//! Thin actuation layer between the grasp policy and a [`Simulation`]:
//! IK-driven end-effector moves, gripper open/close, and plain stepping.
//! Every call blocks the control thread for as many simulation steps as it
//! asks for; there is no trajectory planning, one IK waypoint per move.

use crate::models::{BodyId, JointIndex};
use crate::sim::{IkParams, SimError, Simulation};
use nalgebra::{Point3, UnitQuaternion};
use tracing::debug;

/// Finger target for an open gripper (m)
pub const OPEN_WIDTH: f64 = 0.04;

/// Force used when opening (N)
pub const OPEN_FORCE: f64 = 50.0;

/// Finger target for a closed gripper (m)
pub const CLOSE_WIDTH: f64 = 0.0;

/// Force used when closing (N)
pub const CLOSE_FORCE: f64 = 100.0;

/// Motor force for arm position control (N·m)
pub const ARM_FORCE: f64 = 200.0;

/// Advance the simulation `n_steps` steps
pub fn step<S: Simulation + ?Sized>(sim: &mut S, n_steps: u32) -> Result<(), SimError> {
    sim.advance(n_steps)
}

/// Command all fingers to `width` with `force`. Does not step.
pub fn open_gripper<S: Simulation + ?Sized>(
    sim: &mut S,
    robot: BodyId,
    finger_joints: &[JointIndex],
) -> Result<(), SimError> {
    debug!(width = OPEN_WIDTH, force = OPEN_FORCE, "opening gripper");
    sim.set_gripper_target(robot, finger_joints, OPEN_WIDTH, OPEN_FORCE)
}

/// Command all fingers shut. Does not step.
pub fn close_gripper<S: Simulation + ?Sized>(
    sim: &mut S,
    robot: BodyId,
    finger_joints: &[JointIndex],
) -> Result<(), SimError> {
    debug!(width = CLOSE_WIDTH, force = CLOSE_FORCE, "closing gripper");
    sim.set_gripper_target(robot, finger_joints, CLOSE_WIDTH, CLOSE_FORCE)
}

/// Solve IK for `position`/`orientation` at `ee_link`, command the arm
/// joints, then advance `n_steps`
///
/// The solver may return more values than there are arm joints (finger
/// joints included); only the leading `arm_joints.len()` values are used.
///
/// # Errors
///
/// [`SimError::TargetLengthMismatch`] if the solver returns fewer values than
/// there are arm joints, plus anything the simulation itself reports.
///
/// # Example
///
/// ```rust
/// use panda_grasp_core::motion::move_ee_pose;
/// use panda_grasp_core::sim::{ScriptedSimulation, Simulation};
/// use panda_grasp_core::kinematics::down_orientation;
/// use panda_grasp_core::models::{BodyId, JointIndex};
/// use nalgebra::Point3;
///
/// let robot = BodyId::new(3);
/// let mut sim = ScriptedSimulation::new(robot, BodyId::new(2), Point3::origin());
/// let arm: Vec<JointIndex> = (0..7).map(JointIndex).collect();
///
/// move_ee_pose(&mut sim, robot, JointIndex(11), &arm,
///     &Point3::new(0.4, 0.0, 0.4), &down_orientation(), 240).unwrap();
/// assert_eq!(sim.step_count(), 240);
/// ```
pub fn move_ee_pose<S: Simulation + ?Sized>(
    sim: &mut S,
    robot: BodyId,
    ee_link: JointIndex,
    arm_joints: &[JointIndex],
    position: &Point3<f64>,
    orientation: &UnitQuaternion<f64>,
    n_steps: u32,
) -> Result<(), SimError> {
    let q = sim.solve_ik(robot, ee_link, position, orientation, IkParams::default())?;
    if q.len() < arm_joints.len() {
        return Err(SimError::TargetLengthMismatch {
            joints: arm_joints.len(),
            targets: q.len(),
        });
    }
    debug!(
        x = position.x,
        y = position.y,
        z = position.z,
        steps = n_steps,
        "moving end effector"
    );
    sim.command_joint_targets(robot, arm_joints, &q[..arm_joints.len()], ARM_FORCE)?;
    sim.advance(n_steps)
}
