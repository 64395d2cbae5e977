//! Franka Panda kinematic model
//!
//! Forward kinematics use the manufacturer's modified Denavit-Hartenberg
//! parameters. Inverse kinematics is damped least squares on a numerically
//! differentiated 6-D Jacobian (position + rotation vector), seeded from the
//! current joint state and bounded by [`IkParams`].
//!
//! # Joint layout
//!
//! ```text
//! index  name                     type       link
//! 0..=6  panda_joint1..7          revolute   panda_link1..7
//! 7      panda_joint8             fixed      panda_link8 (flange)
//! 8      panda_hand_joint         fixed      panda_hand
//! 9      panda_finger_joint1      prismatic  panda_leftfinger
//! 10     panda_finger_joint2      prismatic  panda_rightfinger
//! 11     panda_grasptarget_hand   fixed      panda_grasptarget
//! ```

use super::IkParams;
use crate::models::{JointIndex, JointInfo, JointType};
use nalgebra::{Isometry3, Matrix6, Point3, SMatrix, UnitQuaternion, Vector3, Vector6};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

/// Number of revolute arm joints
pub const ARM_DOF: usize = 7;

/// Number of finger joints
pub const FINGER_DOF: usize = 2;

/// Index of the first finger joint
pub const FIRST_FINGER_JOINT: usize = 9;

/// Index of the grasp-target link
pub const GRASP_TARGET_LINK: usize = 11;

/// Maximum finger travel (m, per finger)
pub const FINGER_MAX_OPENING: f64 = 0.04;

const FLANGE_OFFSET: f64 = 0.107;
const GRASP_TARGET_OFFSET: f64 = 0.1034;
const FINGER_BASE_OFFSET: f64 = 0.0584;

/// Modified DH rows: (a_{i-1}, d_i, alpha_{i-1})
const DH: [(f64, f64, f64); ARM_DOF] = [
    (0.0, 0.333, 0.0),
    (0.0, 0.0, -FRAC_PI_2),
    (0.0, 0.316, FRAC_PI_2),
    (0.0825, 0.0, FRAC_PI_2),
    (-0.0825, 0.384, -FRAC_PI_2),
    (0.0, 0.0, FRAC_PI_2),
    (0.088, 0.0, FRAC_PI_2),
];

const ARM_LIMITS: [(f64, f64); ARM_DOF] = [
    (-2.8973, 2.8973),
    (-1.7628, 1.7628),
    (-2.8973, 2.8973),
    (-3.0718, -0.0698),
    (-2.8973, 2.8973),
    (-0.0175, 3.7525),
    (-2.8973, 2.8973),
];

const DAMPING: f64 = 0.05;
const MAX_JOINT_STEP: f64 = 0.3;
const JACOBIAN_EPS: f64 = 1e-6;

/// Result of an IK solve
#[derive(Debug, Clone, PartialEq)]
pub struct IkSolution {
    /// Arm joint positions
    pub q: [f64; ARM_DOF],
    /// Final pose residual
    pub residual: f64,
    /// Iterations used
    pub iterations: u32,
    /// Whether the residual threshold was reached
    pub converged: bool,
}

/// Kinematic chain of a Panda mounted at `base`
#[derive(Debug, Clone, PartialEq)]
pub struct PandaModel {
    base: Isometry3<f64>,
}

impl PandaModel {
    /// Panda with its base at `base`
    pub fn new(base: Isometry3<f64>) -> Self {
        Self { base }
    }

    /// Base pose
    pub fn base(&self) -> &Isometry3<f64> {
        &self.base
    }

    /// Joint table for this model, matching the URDF layout
    pub fn joint_infos() -> Vec<JointInfo> {
        let mut infos = Vec::with_capacity(12);
        for (i, (lower, upper)) in ARM_LIMITS.iter().enumerate() {
            infos.push(JointInfo {
                index: JointIndex(i),
                name: format!("panda_joint{}", i + 1),
                joint_type: JointType::Revolute,
                link_name: format!("panda_link{}", i + 1),
                lower_limit: *lower,
                upper_limit: *upper,
            });
        }
        let fixed = |index: usize, name: &str, link: &str| JointInfo {
            index: JointIndex(index),
            name: name.to_string(),
            joint_type: JointType::Fixed,
            link_name: link.to_string(),
            lower_limit: 0.0,
            upper_limit: 0.0,
        };
        let finger = |index: usize, name: &str, link: &str| JointInfo {
            index: JointIndex(index),
            name: name.to_string(),
            joint_type: JointType::Prismatic,
            link_name: link.to_string(),
            lower_limit: 0.0,
            upper_limit: FINGER_MAX_OPENING,
        };
        infos.push(fixed(7, "panda_joint8", "panda_link8"));
        infos.push(fixed(8, "panda_hand_joint", "panda_hand"));
        infos.push(finger(9, "panda_finger_joint1", "panda_leftfinger"));
        infos.push(finger(10, "panda_finger_joint2", "panda_rightfinger"));
        infos.push(fixed(11, "panda_grasptarget_hand", "panda_grasptarget"));
        infos
    }

    /// Clamp a joint vector into the arm limits
    pub fn clamp_to_limits(q: &mut [f64; ARM_DOF]) {
        for (value, (lower, upper)) in q.iter_mut().zip(ARM_LIMITS.iter()) {
            *value = value.clamp(*lower, *upper);
        }
    }

    /// World pose of `link` for arm configuration `q` and finger openings
    ///
    /// Returns `None` for indices outside the joint table.
    pub fn link_frame(
        &self,
        q: &[f64; ARM_DOF],
        fingers: &[f64; FINGER_DOF],
        link: JointIndex,
    ) -> Option<Isometry3<f64>> {
        let idx = link.0;
        if idx < ARM_DOF {
            return Some(self.chain(q, idx + 1));
        }
        let flange = self.chain(q, ARM_DOF) * Isometry3::translation(0.0, 0.0, FLANGE_OFFSET);
        let hand = flange * Isometry3::rotation(Vector3::z() * -FRAC_PI_4);
        match idx {
            7 => Some(flange),
            8 => Some(hand),
            9 => Some(hand * Isometry3::translation(0.0, fingers[0], FINGER_BASE_OFFSET)),
            10 => Some(hand * Isometry3::translation(0.0, -fingers[1], FINGER_BASE_OFFSET)),
            GRASP_TARGET_LINK => {
                Some(hand * Isometry3::translation(0.0, 0.0, GRASP_TARGET_OFFSET))
            }
            _ => None,
        }
    }

    /// World pose of the grasp-target frame
    pub fn grasp_frame(&self, q: &[f64; ARM_DOF]) -> Isometry3<f64> {
        let flange = self.chain(q, ARM_DOF) * Isometry3::translation(0.0, 0.0, FLANGE_OFFSET);
        flange
            * Isometry3::rotation(Vector3::z() * -FRAC_PI_4)
            * Isometry3::translation(0.0, 0.0, GRASP_TARGET_OFFSET)
    }

    /// Product of the first `n` DH transforms, starting from the base
    fn chain(&self, q: &[f64; ARM_DOF], n: usize) -> Isometry3<f64> {
        DH.iter()
            .zip(q.iter())
            .take(n)
            .fold(self.base, |acc, (&(a, d, alpha), &theta)| {
                acc * Isometry3::rotation(Vector3::x() * alpha)
                    * Isometry3::translation(a, 0.0, 0.0)
                    * Isometry3::rotation(Vector3::z() * theta)
                    * Isometry3::translation(0.0, 0.0, d)
            })
    }

    /// Pose error of `current` relative to `target`: (position, rotation vector)
    fn pose_error(target: &Isometry3<f64>, current: &Isometry3<f64>) -> Vector6<f64> {
        let dp = target.translation.vector - current.translation.vector;
        let dr = (target.rotation * current.rotation.inverse()).scaled_axis();
        Vector6::new(dp.x, dp.y, dp.z, dr.x, dr.y, dr.z)
    }

    fn jacobian(
        &self,
        q: &[f64; ARM_DOF],
        fingers: &[f64; FINGER_DOF],
        link: JointIndex,
    ) -> SMatrix<f64, 6, ARM_DOF> {
        let mut jac = SMatrix::<f64, 6, ARM_DOF>::zeros();
        for j in 0..ARM_DOF {
            let mut plus = *q;
            let mut minus = *q;
            plus[j] += JACOBIAN_EPS;
            minus[j] -= JACOBIAN_EPS;
            let (Some(fp), Some(fm)) = (
                self.link_frame(&plus, fingers, link),
                self.link_frame(&minus, fingers, link),
            ) else {
                continue;
            };
            let col = Self::pose_error(&fp, &fm) / (2.0 * JACOBIAN_EPS);
            jac.set_column(j, &col);
        }
        jac
    }

    /// Damped-least-squares IK for `link` reaching `position` / `orientation`
    ///
    /// Starts from `seed`, keeps every iterate inside the joint limits, and
    /// returns the best configuration seen when the iteration cap is hit.
    pub fn solve_ik(
        &self,
        seed: &[f64; ARM_DOF],
        fingers: &[f64; FINGER_DOF],
        link: JointIndex,
        position: &Point3<f64>,
        orientation: &UnitQuaternion<f64>,
        params: IkParams,
    ) -> IkSolution {
        let target = Isometry3::from_parts(position.coords.into(), *orientation);
        let mut q = *seed;
        Self::clamp_to_limits(&mut q);

        let residual_of = |q: &[f64; ARM_DOF]| {
            self.link_frame(q, fingers, link)
                .map(|frame| Self::pose_error(&target, &frame).norm())
                .unwrap_or(f64::INFINITY)
        };

        let mut best = IkSolution {
            q,
            residual: residual_of(&q),
            iterations: 0,
            converged: false,
        };

        for iteration in 1..=params.max_iterations {
            if best.residual < params.residual_threshold {
                best.converged = true;
                return best;
            }
            let Some(frame) = self.link_frame(&q, fingers, link) else {
                return best;
            };
            let err = Self::pose_error(&target, &frame);
            let jac = self.jacobian(&q, fingers, link);
            let jjt = jac * jac.transpose() + Matrix6::identity() * (DAMPING * DAMPING);
            let Some(inv) = jjt.try_inverse() else {
                return best;
            };
            let dq = jac.transpose() * (inv * err);

            let largest = dq.amax();
            let scale = if largest > MAX_JOINT_STEP {
                MAX_JOINT_STEP / largest
            } else {
                1.0
            };
            for (value, delta) in q.iter_mut().zip(dq.iter()) {
                *value += delta * scale;
            }
            Self::clamp_to_limits(&mut q);

            let residual = residual_of(&q);
            if residual < best.residual {
                best = IkSolution {
                    q,
                    residual,
                    iterations: iteration,
                    converged: false,
                };
            } else {
                best.iterations = iteration;
            }
        }

        best.converged = best.residual < params.residual_threshold;
        best
    }
}

impl Default for PandaModel {
    fn default() -> Self {
        Self::new(Isometry3::identity())
    }
}
