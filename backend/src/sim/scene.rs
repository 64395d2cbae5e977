//! Scene bootstrap
//!
//! Builds the pick-and-lift world (floor, table, cube, Panda), discovers the
//! joint indices the policy needs from the robot's joint table, and puts the
//! arm into its home configuration.

use super::kinematic::{KinematicWorld, CUBE_HALF_SIZE};
use super::panda::FINGER_MAX_OPENING;
use super::{SimError, Simulation};
use crate::models::{BodyId, JointIndex, JointInfo, JointType, RobotIndices};
use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Name of the link used as the IK target frame
pub const EE_LINK_NAME: &str = "panda_grasptarget";

/// Prefix of revolute arm joint names
pub const ARM_JOINT_PREFIX: &str = "panda_joint";

/// Substring identifying finger joints
pub const FINGER_JOINT_MARKER: &str = "finger_joint";

/// Default home configuration of the arm
pub const DEFAULT_HOME_Q: [f64; 7] = [0.0, -0.6, 0.0, -2.2, 0.0, 2.0, 0.8];

/// Errors raised while setting up the scene
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SetupError {
    #[error("End-effector link '{0}' not found in robot model")]
    EndEffectorNotFound(String),

    #[error("Robot model has no arm joints named '{0}*'")]
    NoArmJoints(String),

    #[error("Robot model has no finger joints")]
    NoFingerJoints,

    #[error("Home configuration has {given} values for {expected} arm joints")]
    HomeLengthMismatch { expected: usize, given: usize },

    #[error("steps_per_second must be > 0")]
    ZeroStepRate,

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimError),
}

/// World layout and robot placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Table base position
    pub table_position: [f64; 3],

    /// Table top half extents in x and y
    pub table_half_extents: [f64; 2],

    /// Table top height above its base
    pub table_height: f64,

    /// Initial cube position (it falls onto whatever is below)
    pub box_position: [f64; 3],

    /// Cube half edge length
    pub box_half_size: f64,

    /// Robot base position
    pub robot_base: [f64; 3],

    /// Arm home configuration
    pub home_q: Vec<f64>,

    /// Vertical gravity
    pub gravity: f64,

    /// Physics rate (steps per simulated second)
    pub steps_per_second: u32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            table_position: [0.5, 0.0, 0.0],
            table_half_extents: [0.3, 0.4],
            table_height: 0.2,
            box_position: [0.45, 0.0, 0.3],
            box_half_size: CUBE_HALF_SIZE,
            robot_base: [0.0, 0.0, 0.0],
            home_q: DEFAULT_HOME_Q.to_vec(),
            gravity: -9.81,
            steps_per_second: crate::core::time::DEFAULT_STEPS_PER_SECOND,
        }
    }
}

/// Bodies of a loaded scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub plane: BodyId,
    pub table: BodyId,
    pub object: BodyId,
    pub robot: BodyId,
}

fn point(p: [f64; 3]) -> Point3<f64> {
    Point3::new(p[0], p[1], p[2])
}

/// Build a world from `config`
///
/// # Example
///
/// ```rust
/// use panda_grasp_core::sim::{load_scene, SceneConfig, Simulation};
///
/// let (world, scene) = load_scene(&SceneConfig::default()).unwrap();
/// assert_eq!(world.joint_infos(scene.robot).unwrap().len(), 12);
/// ```
///
/// # Errors
///
/// Returns [`SetupError::ZeroStepRate`] if `steps_per_second` is zero.
pub fn load_scene(config: &SceneConfig) -> Result<(KinematicWorld, Scene), SetupError> {
    if config.steps_per_second == 0 {
        return Err(SetupError::ZeroStepRate);
    }
    let mut world = KinematicWorld::new(config.steps_per_second);
    world.set_gravity(config.gravity);

    let plane = world.add_plane(0.0);
    let table = world.add_table(
        point(config.table_position),
        (config.table_half_extents[0], config.table_half_extents[1]),
        config.table_height,
    );
    let object = world.add_cube(point(config.box_position), config.box_half_size);
    let base = Isometry3::from_parts(
        Translation3::from(point(config.robot_base).coords),
        UnitQuaternion::identity(),
    );
    let robot = world.add_panda(base);

    info!(%plane, %table, %object, %robot, "scene loaded");
    Ok((
        world,
        Scene {
            plane,
            table,
            object,
            robot,
        },
    ))
}

/// Pick arm joints, finger joints and the end-effector link out of a joint table
///
/// A missing end-effector link is a hard error: substituting another link
/// would put IK targets on the wrong frame.
pub fn discover_indices(joints: &[JointInfo]) -> Result<RobotIndices, SetupError> {
    let mut arm_joints: Vec<JointIndex> = joints
        .iter()
        .filter(|j| j.name.starts_with(ARM_JOINT_PREFIX) && j.joint_type == JointType::Revolute)
        .map(|j| j.index)
        .collect();
    let mut finger_joints: Vec<JointIndex> = joints
        .iter()
        .filter(|j| j.name.contains(FINGER_JOINT_MARKER))
        .map(|j| j.index)
        .collect();
    let ee_link = joints
        .iter()
        .find(|j| j.link_name == EE_LINK_NAME)
        .map(|j| j.index)
        .ok_or_else(|| SetupError::EndEffectorNotFound(EE_LINK_NAME.to_string()))?;

    arm_joints.sort();
    finger_joints.sort();

    if arm_joints.is_empty() {
        return Err(SetupError::NoArmJoints(ARM_JOINT_PREFIX.to_string()));
    }
    if finger_joints.is_empty() {
        return Err(SetupError::NoFingerJoints);
    }

    Ok(RobotIndices {
        arm_joints,
        finger_joints,
        ee_link,
    })
}

/// Teleport the arm to `home_q` and open the fingers fully
pub fn reset_home<S: Simulation + ?Sized>(
    sim: &mut S,
    robot: BodyId,
    indices: &RobotIndices,
    home_q: &[f64],
) -> Result<(), SetupError> {
    if home_q.len() != indices.arm_joints.len() {
        return Err(SetupError::HomeLengthMismatch {
            expected: indices.arm_joints.len(),
            given: home_q.len(),
        });
    }
    for (&joint, &q) in indices.arm_joints.iter().zip(home_q.iter()) {
        sim.reset_joint_state(robot, joint, q)?;
    }
    for &joint in &indices.finger_joints {
        sim.reset_joint_state(robot, joint, FINGER_MAX_OPENING)?;
    }
    Ok(())
}
