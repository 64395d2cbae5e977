//! Body identifiers and pose snapshots.

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

/// Identifier of a body loaded into the simulation (plane, table, cube, robot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub u32);

impl BodyId {
    /// Create a new body ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body({})", self.0)
    }
}

/// Index of a joint inside a multi-body.
///
/// Each joint owns the child link that follows it, so the same index also
/// addresses that link (e.g. the end-effector link).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JointIndex(pub usize);

impl std::fmt::Display for JointIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Joint({})", self.0)
    }
}

/// Ground-truth pose of a body at the moment it was queried.
///
/// Never cache one of these across policy states: contact and gravity can
/// move the object between queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectPose {
    /// Base position in world coordinates.
    pub position: Point3<f64>,
    /// Base orientation.
    pub orientation: UnitQuaternion<f64>,
}

impl ObjectPose {
    /// Pose at `position` with identity orientation.
    #[must_use]
    pub fn from_position(position: Point3<f64>) -> Self {
        Self {
            position,
            orientation: UnitQuaternion::identity(),
        }
    }

    /// Convert to an isometry (world-from-body transform).
    #[must_use]
    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.position.coords), self.orientation)
    }
}

impl Default for ObjectPose {
    fn default() -> Self {
        Self::from_position(Point3::origin())
    }
}
