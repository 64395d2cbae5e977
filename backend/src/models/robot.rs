//! Typed simulator records: joint descriptions, discovered robot indices and
//! contact points.
//!
//! Simulators tend to answer joint and contact queries with positional
//! tuples. Everything that crosses the [`Simulation`](crate::sim::Simulation)
//! boundary is a named record instead.

use super::pose::{BodyId, JointIndex};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Kind of joint in a robot model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JointType {
    /// Rotation about one axis.
    Revolute,
    /// Translation along one axis.
    Prismatic,
    /// No relative motion.
    Fixed,
}

/// Static description of one joint and the link it drives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointInfo {
    /// Index of the joint inside its body.
    pub index: JointIndex,
    /// Joint name from the robot description (e.g. `panda_joint3`).
    pub name: String,
    /// Joint kind.
    pub joint_type: JointType,
    /// Name of the child link (e.g. `panda_grasptarget`).
    pub link_name: String,
    /// Lower position limit.
    pub lower_limit: f64,
    /// Upper position limit.
    pub upper_limit: f64,
}

impl JointInfo {
    /// Clamp `value` into this joint's limits.
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.lower_limit, self.upper_limit)
    }
}

/// Joint indices the grasp policy needs, discovered once at setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotIndices {
    /// Revolute arm joints, sorted by index.
    pub arm_joints: Vec<JointIndex>,
    /// Finger joints, sorted by index.
    pub finger_joints: Vec<JointIndex>,
    /// Link used as the end-effector reference frame for IK targets.
    pub ee_link: JointIndex,
}

/// One contact point between two bodies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactPoint {
    /// First body in the query.
    pub body_a: BodyId,
    /// Second body in the query.
    pub body_b: BodyId,
    /// Link of `body_a` that touches `body_b` (`None` for the base).
    pub link_a: Option<JointIndex>,
    /// Contact location on `body_b`, world frame.
    pub position_on_b: Point3<f64>,
    /// Contact normal pointing from `body_b` towards `body_a`.
    pub normal_on_b: Vector3<f64>,
    /// Normal force magnitude (N).
    pub normal_force: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joint_info_clamp() {
        let info = JointInfo {
            index: JointIndex(3),
            name: "panda_joint4".to_string(),
            joint_type: JointType::Revolute,
            link_name: "panda_link4".to_string(),
            lower_limit: -3.0718,
            upper_limit: -0.0698,
        };

        assert_eq!(info.clamp(0.5), -0.0698);
        assert_eq!(info.clamp(-4.0), -3.0718);
        assert_eq!(info.clamp(-1.0), -1.0);
    }
}
