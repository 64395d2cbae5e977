//! Scripted simulation for exercising the policy without physics
//!
//! Object poses and contact counts come from scripts instead of dynamics, and
//! every call is recorded so tests can assert on the exact command sequence.
//!
//! NOTE: Available in all builds so integration tests under `tests/` can use
//! it, but it is only meant for test code.

use super::panda::{PandaModel, ARM_DOF, FINGER_DOF};
use super::{IkParams, SimError, Simulation};
use crate::models::{BodyId, ContactPoint, JointIndex, JointInfo, ObjectPose};
use nalgebra::{Point3, UnitQuaternion, Vector3};

/// How contact counts are produced
#[derive(Debug, Clone, PartialEq)]
pub enum ContactModel {
    /// Successive `contacts` calls return these counts; the last one repeats
    Scripted(Vec<usize>),

    /// `count` contacts when the last IK target before the query lies within
    /// `tolerance` of the object horizontally and the gripper is closed,
    /// otherwise none
    Aligned { tolerance: f64, count: usize },
}

/// Recorded collaborator call
#[derive(Debug, Clone, PartialEq)]
pub enum SimCall {
    Advance(u32),
    Gripper { width: f64, force: f64 },
    SolveIk { position: Point3<f64> },
    JointTargets { joints: usize, force: f64 },
    ObjectPose,
    Contacts,
    ResetJoint { joint: JointIndex, value: f64 },
}

/// Test collaborator with scripted poses and contacts
///
/// # Example
///
/// ```rust
/// use panda_grasp_core::sim::{ScriptedSimulation, Simulation};
/// use panda_grasp_core::models::BodyId;
/// use nalgebra::Point3;
///
/// let robot = BodyId::new(3);
/// let object = BodyId::new(2);
/// let sim = ScriptedSimulation::new(robot, object, Point3::new(0.3, 0.0, 0.025))
///     .with_contact_script(vec![0, 3]);
///
/// assert_eq!(sim.contacts(robot, object).unwrap().len(), 0);
/// assert_eq!(sim.contacts(robot, object).unwrap().len(), 3);
/// assert_eq!(sim.contacts(robot, object).unwrap().len(), 3);
/// ```
#[derive(Debug)]
pub struct ScriptedSimulation {
    robot: BodyId,
    object: BodyId,
    poses: Vec<Point3<f64>>,
    pose_cursor: std::cell::Cell<usize>,
    contacts: ContactModel,
    contact_cursor: std::cell::Cell<usize>,
    steps: u64,
    last_ik_target: Option<Point3<f64>>,
    gripper_width: f64,
    fail_pose_after: Option<usize>,
    calls: std::cell::RefCell<Vec<SimCall>>,
}

impl ScriptedSimulation {
    /// Object resting at `object_position`, one contact always reported
    pub fn new(robot: BodyId, object: BodyId, object_position: Point3<f64>) -> Self {
        Self {
            robot,
            object,
            poses: vec![object_position],
            pose_cursor: std::cell::Cell::new(0),
            contacts: ContactModel::Scripted(vec![1]),
            contact_cursor: std::cell::Cell::new(0),
            steps: 0,
            last_ik_target: None,
            gripper_width: 0.04,
            fail_pose_after: None,
            calls: std::cell::RefCell::new(Vec::new()),
        }
    }

    /// Successive object pose queries walk through `positions`, holding the last
    pub fn with_pose_trajectory(mut self, positions: Vec<Point3<f64>>) -> Self {
        assert!(!positions.is_empty(), "pose trajectory must not be empty");
        self.poses = positions;
        self
    }

    /// Successive contact queries return `counts`, holding the last
    pub fn with_contact_script(mut self, counts: Vec<usize>) -> Self {
        assert!(!counts.is_empty(), "contact script must not be empty");
        self.contacts = ContactModel::Scripted(counts);
        self
    }

    /// Contacts depend on how well the last IK target lines up with the object
    pub fn with_aligned_contacts(mut self, tolerance: f64, count: usize) -> Self {
        self.contacts = ContactModel::Aligned { tolerance, count };
        self
    }

    /// Object pose queries fail once `n` of them have succeeded
    pub fn fail_object_pose_after(mut self, n: usize) -> Self {
        self.fail_pose_after = Some(n);
        self
    }

    /// All calls made so far
    pub fn calls(&self) -> Vec<SimCall> {
        self.calls.borrow().clone()
    }

    /// IK targets requested so far, in order
    pub fn ik_targets(&self) -> Vec<Point3<f64>> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                SimCall::SolveIk { position } => Some(*position),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: SimCall) {
        self.calls.borrow_mut().push(call);
    }

    fn check_body(&self, body: BodyId) -> Result<(), SimError> {
        if body == self.robot || body == self.object {
            Ok(())
        } else {
            Err(SimError::UnknownBody(body))
        }
    }

    fn next_scripted<T: Copy>(script: &[T], cursor: &std::cell::Cell<usize>) -> T {
        let i = cursor.get();
        cursor.set(i + 1);
        script[i.min(script.len() - 1)]
    }

    fn current_object_position(&self) -> Point3<f64> {
        let i = self.pose_cursor.get().saturating_sub(1);
        self.poses[i.min(self.poses.len() - 1)]
    }
}

impl Simulation for ScriptedSimulation {
    fn advance(&mut self, n_steps: u32) -> Result<(), SimError> {
        self.steps += u64::from(n_steps);
        self.record(SimCall::Advance(n_steps));
        Ok(())
    }

    fn step_count(&self) -> u64 {
        self.steps
    }

    fn set_gripper_target(
        &mut self,
        robot: BodyId,
        _finger_joints: &[JointIndex],
        width: f64,
        force: f64,
    ) -> Result<(), SimError> {
        self.check_body(robot)?;
        self.gripper_width = width;
        self.record(SimCall::Gripper { width, force });
        Ok(())
    }

    fn solve_ik(
        &mut self,
        robot: BodyId,
        _ee_link: JointIndex,
        position: &Point3<f64>,
        _orientation: &UnitQuaternion<f64>,
        _params: IkParams,
    ) -> Result<Vec<f64>, SimError> {
        self.check_body(robot)?;
        self.last_ik_target = Some(*position);
        self.record(SimCall::SolveIk {
            position: *position,
        });
        Ok(vec![0.0; ARM_DOF + FINGER_DOF])
    }

    fn command_joint_targets(
        &mut self,
        robot: BodyId,
        joints: &[JointIndex],
        targets: &[f64],
        force: f64,
    ) -> Result<(), SimError> {
        self.check_body(robot)?;
        if joints.len() != targets.len() {
            return Err(SimError::TargetLengthMismatch {
                joints: joints.len(),
                targets: targets.len(),
            });
        }
        self.record(SimCall::JointTargets {
            joints: joints.len(),
            force,
        });
        Ok(())
    }

    fn object_pose(&self, body: BodyId) -> Result<ObjectPose, SimError> {
        self.check_body(body)?;
        if let Some(limit) = self.fail_pose_after {
            if self.pose_cursor.get() >= limit {
                return Err(SimError::UnknownBody(body));
            }
        }
        self.record(SimCall::ObjectPose);
        let position = Self::next_scripted(&self.poses, &self.pose_cursor);
        Ok(ObjectPose::from_position(position))
    }

    fn contacts(&self, body_a: BodyId, body_b: BodyId) -> Result<Vec<ContactPoint>, SimError> {
        self.check_body(body_a)?;
        self.check_body(body_b)?;
        self.record(SimCall::Contacts);

        let count = match &self.contacts {
            ContactModel::Scripted(script) => Self::next_scripted(script, &self.contact_cursor),
            ContactModel::Aligned { tolerance, count } => {
                let object = self.current_object_position();
                match self.last_ik_target {
                    Some(target)
                        if self.gripper_width <= 0.0
                            && (target.xy() - object.xy()).norm() <= *tolerance =>
                    {
                        *count
                    }
                    _ => 0,
                }
            }
        };

        let object = self.current_object_position();
        Ok((0..count)
            .map(|_| ContactPoint {
                body_a,
                body_b,
                link_a: None,
                position_on_b: object,
                normal_on_b: Vector3::z(),
                normal_force: 1.0,
            })
            .collect())
    }

    fn joint_infos(&self, robot: BodyId) -> Result<Vec<JointInfo>, SimError> {
        if robot != self.robot {
            return Err(SimError::NotArticulated(robot));
        }
        Ok(PandaModel::joint_infos())
    }

    fn reset_joint_state(
        &mut self,
        robot: BodyId,
        joint: JointIndex,
        value: f64,
    ) -> Result<(), SimError> {
        self.check_body(robot)?;
        self.record(SimCall::ResetJoint { joint, value });
        Ok(())
    }
}
