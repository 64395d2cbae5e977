//! Grasp verification
//!
//! A grasp counts as held when the simulator reports at least
//! `min_contacts` contact points between the robot and the object. The
//! contact set is queried live on every call.

use crate::models::BodyId;
use crate::sim::{SimError, Simulation};
use serde::{Deserialize, Serialize};

/// Result of one contact check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraspCheck {
    /// `contacts >= min_contacts`
    pub ok: bool,
    /// Contact points between the two bodies right now
    pub contacts: usize,
}

/// Count contacts between `body_a` and `body_b` and compare against `min_contacts`
///
/// # Example
///
/// ```rust
/// use panda_grasp_core::policy::verify_grasp;
/// use panda_grasp_core::sim::ScriptedSimulation;
/// use panda_grasp_core::models::BodyId;
/// use nalgebra::Point3;
///
/// let (robot, cube) = (BodyId::new(3), BodyId::new(2));
/// let sim = ScriptedSimulation::new(robot, cube, Point3::origin())
///     .with_contact_script(vec![4]);
///
/// let check = verify_grasp(&sim, robot, cube, 1).unwrap();
/// assert!(check.ok);
/// assert_eq!(check.contacts, 4);
/// ```
pub fn verify_grasp<S: Simulation + ?Sized>(
    sim: &S,
    body_a: BodyId,
    body_b: BodyId,
    min_contacts: usize,
) -> Result<GraspCheck, SimError> {
    let contacts = sim.contacts(body_a, body_b)?.len();
    Ok(GraspCheck {
        ok: contacts >= min_contacts,
        contacts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ScriptedSimulation;
    use nalgebra::Point3;

    fn bodies() -> (BodyId, BodyId) {
        (BodyId::new(3), BodyId::new(2))
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let (robot, cube) = bodies();
        let sim = ScriptedSimulation::new(robot, cube, Point3::origin())
            .with_contact_script(vec![2]);

        assert_eq!(
            verify_grasp(&sim, robot, cube, 2).unwrap(),
            GraspCheck {
                ok: true,
                contacts: 2
            }
        );
    }

    #[test]
    fn test_zero_contacts_fail() {
        let (robot, cube) = bodies();
        let sim = ScriptedSimulation::new(robot, cube, Point3::origin())
            .with_contact_script(vec![0]);

        let check = verify_grasp(&sim, robot, cube, 1).unwrap();
        assert!(!check.ok);
        assert_eq!(check.contacts, 0);
    }

    #[test]
    fn test_queries_are_live() {
        let (robot, cube) = bodies();
        let sim = ScriptedSimulation::new(robot, cube, Point3::origin())
            .with_contact_script(vec![0, 3]);

        assert!(!verify_grasp(&sim, robot, cube, 1).unwrap().ok);
        assert!(verify_grasp(&sim, robot, cube, 1).unwrap().ok);
    }

    #[test]
    fn test_unknown_body_propagates() {
        let (robot, cube) = bodies();
        let sim = ScriptedSimulation::new(robot, cube, Point3::origin());

        assert_eq!(
            verify_grasp(&sim, robot, BodyId::new(9), 1),
            Err(SimError::UnknownBody(BodyId::new(9)))
        );
    }
}
