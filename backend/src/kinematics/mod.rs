//! Grasp geometry
//!
//! Pure helpers that turn the object's current position into the named
//! end-effector targets used by the policy. Nothing here is cached: the
//! object can be nudged by contact or gravity between two policy states, so
//! callers recompute from a fresh pose every time.

use nalgebra::{Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Height of the pregrasp point above the object center (m)
pub const PREGRASP_HEIGHT: f64 = 0.20;

/// Height of the lift point above the object center (m)
pub const LIFT_HEIGHT: f64 = 0.30;

/// Height of the safe back-off point used while recovering (m)
pub const SAFE_HEIGHT: f64 = 0.25;

/// Pregrasp, grasp and lift points for one attempt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraspTargets {
    /// Hover point above the object
    pub pregrasp: Point3<f64>,
    /// Closing point, `grasp_z` above the object center
    pub grasp: Point3<f64>,
    /// Point the object is carried to
    pub lift: Point3<f64>,
}

/// End-effector orientation pointing straight down (180° about X)
///
/// # Example
///
/// ```rust
/// use panda_grasp_core::kinematics::down_orientation;
/// use nalgebra::Vector3;
///
/// let q = down_orientation();
/// let z = q * Vector3::z();
/// assert!((z.z + 1.0).abs() < 1e-12);
/// ```
pub fn down_orientation() -> UnitQuaternion<f64> {
    UnitQuaternion::from_euler_angles(PI, 0.0, 0.0)
}

/// Point `height` above `object`
pub fn point_above(object: &Point3<f64>, height: f64) -> Point3<f64> {
    object + Vector3::z() * height
}

/// Compute the target triple for an object at `object` and grasp offset `grasp_z`
///
/// # Example
///
/// ```rust
/// use panda_grasp_core::kinematics::grasp_targets;
/// use nalgebra::Point3;
///
/// let t = grasp_targets(&Point3::new(0.5, 0.0, 0.325), 0.03);
/// assert!((t.pregrasp.z - 0.525).abs() < 1e-12);
/// assert!((t.grasp.z - 0.355).abs() < 1e-12);
/// assert!((t.lift.z - 0.625).abs() < 1e-12);
/// ```
pub fn grasp_targets(object: &Point3<f64>, grasp_z: f64) -> GraspTargets {
    GraspTargets {
        pregrasp: point_above(object, PREGRASP_HEIGHT),
        grasp: point_above(object, grasp_z),
        lift: point_above(object, LIFT_HEIGHT),
    }
}
