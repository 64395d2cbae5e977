//! Kinematic World
//!
//! Deterministic stand-in for a rigid-body engine, just rich enough to run a
//! pick-and-lift:
//!
//! - a floor plane and an axis-aligned table top
//! - small cubes that fall onto the highest support below them
//! - a Panda arm under position control with per-joint velocity caps
//! - two fingers that stop at cube faces and report contacts
//! - a cube pinched by both fingers follows the grasp-target frame
//!
//! # Step Order
//!
//! ```text
//! For each step:
//! 1. Move arm joints toward their targets
//! 2. Carry gripped cubes with the grasp frame
//! 3. Move fingers toward their targets, stopping at cube faces
//! 4. Update grips (both fingers on the same cube)
//! 5. Let free cubes fall onto their support
//! 6. Advance the clock
//! ```
//!
//! There is no rotation dynamics and no arm/environment collision. Contact
//! counts are what the grasp verifier needs: two points per finger pressing
//! on a cube, four points for a cube resting on a support.

use super::panda::{PandaModel, ARM_DOF, FINGER_DOF, FINGER_MAX_OPENING, FIRST_FINGER_JOINT};
use super::{IkParams, SimError, Simulation};
use crate::core::time::SimClock;
use crate::models::{BodyId, ContactPoint, JointIndex, JointInfo, JointType, ObjectPose};
use nalgebra::{Isometry3, Point3, UnitQuaternion, Vector3};
use std::time::Duration;
use tracing::{debug, warn};

/// Arm joint velocity cap under position control (rad/s)
pub const ARM_MAX_VELOCITY: f64 = 2.5;

/// Finger velocity cap (m/s)
pub const FINGER_MAX_VELOCITY: f64 = 0.2;

/// Default cube half edge length (m)
pub const CUBE_HALF_SIZE: f64 = 0.025;

/// Half height of a finger pad, along the approach axis (m)
pub const PAD_HALF_HEIGHT: f64 = 0.009;

/// Half width of a finger pad, across the closing axis (m)
pub const PAD_HALF_WIDTH: f64 = 0.01;

/// Standard gravity (m/s^2)
pub const DEFAULT_GRAVITY: f64 = -9.81;

const CONTACT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone)]
struct Table {
    position: Point3<f64>,
    half_extents: (f64, f64),
    top: f64,
}

impl Table {
    fn supports(&self, p: &Point3<f64>) -> bool {
        (p.x - self.position.x).abs() <= self.half_extents.0
            && (p.y - self.position.y).abs() <= self.half_extents.1
    }
}

#[derive(Debug, Clone)]
struct Grip {
    robot: BodyId,
    /// Cube center in the grasp frame at the moment the grip formed
    local: Point3<f64>,
}

#[derive(Debug, Clone)]
struct Cube {
    position: Point3<f64>,
    orientation: UnitQuaternion<f64>,
    half_size: f64,
    velocity_z: f64,
    grip: Option<Grip>,
    /// Support body the cube currently rests on
    resting_on: Option<BodyId>,
}

#[derive(Debug, Clone)]
struct Robot {
    model: PandaModel,
    joints: Vec<JointInfo>,
    q: [f64; ARM_DOF],
    q_target: [f64; ARM_DOF],
    arm_force: [f64; ARM_DOF],
    fingers: [f64; FINGER_DOF],
    finger_target: [f64; FINGER_DOF],
    finger_force: [f64; FINGER_DOF],
    /// Cube each finger is pressing on
    finger_contact: [Option<BodyId>; FINGER_DOF],
}

impl Robot {
    fn grasp_frame(&self) -> Isometry3<f64> {
        self.model.grasp_frame(&self.q)
    }

    fn joint(&self, body: BodyId, joint: JointIndex) -> Result<&JointInfo, SimError> {
        self.joints
            .get(joint.0)
            .ok_or(SimError::UnknownJoint { body, joint })
    }
}

#[derive(Debug, Clone)]
enum BodyKind {
    Plane { height: f64 },
    Table(Table),
    Cube(Cube),
    Robot(Box<Robot>),
}

#[derive(Debug, Clone)]
struct Body {
    name: String,
    kind: BodyKind,
}

/// Snapshot of a cube used while moving fingers
#[derive(Debug, Clone, Copy)]
struct CubeView {
    id: BodyId,
    position: Point3<f64>,
    half_size: f64,
}

/// Deterministic world implementing [`Simulation`]
///
/// # Example
///
/// ```rust
/// use panda_grasp_core::sim::{KinematicWorld, Simulation};
/// use nalgebra::Point3;
///
/// let mut world = KinematicWorld::default();
/// let plane = world.add_plane(0.0);
/// let cube = world.add_cube(Point3::new(0.3, 0.0, 0.5), 0.025);
///
/// world.advance(240).unwrap();
/// let pose = world.object_pose(cube).unwrap();
/// assert!((pose.position.z - 0.025).abs() < 1e-9);
/// assert_eq!(world.contacts(cube, plane).unwrap().len(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct KinematicWorld {
    clock: SimClock,
    gravity: f64,
    bodies: Vec<Body>,
    realtime: bool,
}

impl KinematicWorld {
    /// Empty world stepping at `steps_per_second`
    ///
    /// # Panics
    ///
    /// Panics if `steps_per_second` is zero; use
    /// [`load_scene`](super::load_scene) to get an error instead.
    pub fn new(steps_per_second: u32) -> Self {
        Self {
            clock: SimClock::new(steps_per_second),
            gravity: DEFAULT_GRAVITY,
            bodies: Vec::new(),
            realtime: false,
        }
    }

    /// Set vertical gravity (negative is down)
    pub fn set_gravity(&mut self, gravity: f64) {
        self.gravity = gravity;
    }

    /// Sleep one time step per simulated step, for watching a run live
    pub fn set_realtime(&mut self, realtime: bool) {
        self.realtime = realtime;
    }

    /// Simulation clock
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    fn push(&mut self, name: &str, kind: BodyKind) -> BodyId {
        let id = BodyId::new(self.bodies.len() as u32);
        self.bodies.push(Body {
            name: name.to_string(),
            kind,
        });
        id
    }

    /// Add an infinite floor at `height`
    pub fn add_plane(&mut self, height: f64) -> BodyId {
        self.push("plane", BodyKind::Plane { height })
    }

    /// Add a table whose base sits at `position` with its top `top_height` above it
    pub fn add_table(
        &mut self,
        position: Point3<f64>,
        half_extents: (f64, f64),
        top_height: f64,
    ) -> BodyId {
        self.push(
            "table",
            BodyKind::Table(Table {
                position,
                half_extents,
                top: position.z + top_height,
            }),
        )
    }

    /// Add a free cube centered at `position`
    pub fn add_cube(&mut self, position: Point3<f64>, half_size: f64) -> BodyId {
        self.push(
            "cube",
            BodyKind::Cube(Cube {
                position,
                orientation: UnitQuaternion::identity(),
                half_size,
                velocity_z: 0.0,
                grip: None,
                resting_on: None,
            }),
        )
    }

    /// Add a Panda with its base at `base`, all joints at zero and fingers open
    pub fn add_panda(&mut self, base: Isometry3<f64>) -> BodyId {
        self.push(
            "panda",
            BodyKind::Robot(Box::new(Robot {
                model: PandaModel::new(base),
                joints: PandaModel::joint_infos(),
                q: [0.0; ARM_DOF],
                q_target: [0.0; ARM_DOF],
                arm_force: [0.0; ARM_DOF],
                fingers: [FINGER_MAX_OPENING; FINGER_DOF],
                finger_target: [FINGER_MAX_OPENING; FINGER_DOF],
                finger_force: [0.0; FINGER_DOF],
                finger_contact: [None; FINGER_DOF],
            })),
        )
    }

    /// Name a body was registered with
    pub fn body_name(&self, body: BodyId) -> Result<&str, SimError> {
        Ok(&self.body(body)?.name)
    }

    /// World pose of a robot's grasp-target frame
    pub fn grasp_frame(&self, robot: BodyId) -> Result<Isometry3<f64>, SimError> {
        Ok(self.robot(robot)?.grasp_frame())
    }

    /// Current arm joint positions
    pub fn arm_positions(&self, robot: BodyId) -> Result<[f64; ARM_DOF], SimError> {
        Ok(self.robot(robot)?.q)
    }

    /// Current finger openings
    pub fn finger_positions(&self, robot: BodyId) -> Result<[f64; FINGER_DOF], SimError> {
        Ok(self.robot(robot)?.fingers)
    }

    /// Whether `cube` is currently pinched by a gripper
    pub fn is_gripped(&self, cube: BodyId) -> Result<bool, SimError> {
        match &self.body(cube)?.kind {
            BodyKind::Cube(c) => Ok(c.grip.is_some()),
            _ => Ok(false),
        }
    }

    fn body(&self, id: BodyId) -> Result<&Body, SimError> {
        self.bodies
            .get(id.0 as usize)
            .ok_or(SimError::UnknownBody(id))
    }

    fn robot(&self, id: BodyId) -> Result<&Robot, SimError> {
        match &self.body(id)?.kind {
            BodyKind::Robot(robot) => Ok(robot),
            _ => Err(SimError::NotArticulated(id)),
        }
    }

    fn robot_mut(&mut self, id: BodyId) -> Result<&mut Robot, SimError> {
        match self.bodies.get_mut(id.0 as usize) {
            Some(Body {
                kind: BodyKind::Robot(robot),
                ..
            }) => Ok(robot),
            Some(_) => Err(SimError::NotArticulated(id)),
            None => Err(SimError::UnknownBody(id)),
        }
    }

    /// Highest support surface at or below `bottom` under `p`
    fn support_below(&self, p: &Point3<f64>, bottom: f64) -> Option<(BodyId, f64)> {
        let mut best: Option<(BodyId, f64)> = None;
        for (i, body) in self.bodies.iter().enumerate() {
            let height = match &body.kind {
                BodyKind::Plane { height } => *height,
                BodyKind::Table(table) if table.supports(p) => table.top,
                _ => continue,
            };
            if height > bottom + CONTACT_TOLERANCE {
                continue;
            }
            if best.map_or(true, |(_, h)| height > h) {
                best = Some((BodyId::new(i as u32), height));
            }
        }
        best
    }

    fn cube_views(&self) -> Vec<CubeView> {
        self.bodies
            .iter()
            .enumerate()
            .filter_map(|(i, body)| match &body.kind {
                BodyKind::Cube(cube) => Some(CubeView {
                    id: BodyId::new(i as u32),
                    position: cube.position,
                    half_size: cube.half_size,
                }),
                _ => None,
            })
            .collect()
    }

    fn step_once(&mut self) {
        let dt = self.clock.time_step();

        // 1. Arm joints
        for body in &mut self.bodies {
            if let BodyKind::Robot(robot) = &mut body.kind {
                let max_delta = ARM_MAX_VELOCITY * dt;
                for i in 0..ARM_DOF {
                    if robot.arm_force[i] <= 0.0 {
                        continue;
                    }
                    let err = robot.q_target[i] - robot.q[i];
                    robot.q[i] += err.clamp(-max_delta, max_delta);
                }
            }
        }

        // 2. Carry gripped cubes
        let frames: Vec<Option<Isometry3<f64>>> = self
            .bodies
            .iter()
            .map(|body| match &body.kind {
                BodyKind::Robot(robot) => Some(robot.grasp_frame()),
                _ => None,
            })
            .collect();
        for body in &mut self.bodies {
            if let BodyKind::Cube(cube) = &mut body.kind {
                if let Some(grip) = &cube.grip {
                    if let Some(Some(frame)) = frames.get(grip.robot.0 as usize) {
                        cube.position = frame.transform_point(&grip.local);
                        cube.velocity_z = 0.0;
                        cube.resting_on = None;
                    }
                }
            }
        }

        // 3. Fingers, blocked by cube faces
        let cubes = self.cube_views();
        let mut grips: Vec<(BodyId, BodyId, Point3<f64>)> = Vec::new();
        for (i, body) in self.bodies.iter_mut().enumerate() {
            let BodyKind::Robot(robot) = &mut body.kind else {
                continue;
            };
            let robot_id = BodyId::new(i as u32);
            let frame = robot.grasp_frame();
            let max_delta = FINGER_MAX_VELOCITY * dt;

            for f in 0..FINGER_DOF {
                let current = robot.fingers[f];
                let target = robot.finger_target[f];
                let mut next = if robot.finger_force[f] > 0.0 {
                    current + (target - current).clamp(-max_delta, max_delta)
                } else {
                    current
                };
                let mut contact = None;

                for cube in &cubes {
                    let local = frame.inverse_transform_point(&cube.position);
                    if local.x.abs() >= cube.half_size + PAD_HALF_WIDTH
                        || local.z.abs() >= cube.half_size + PAD_HALF_HEIGHT
                    {
                        continue;
                    }
                    // Finger 0 sits at +y, finger 1 at -y in the grasp frame
                    let face = if f == 0 {
                        local.y + cube.half_size
                    } else {
                        cube.half_size - local.y
                    };
                    let outside = current >= face - CONTACT_TOLERANCE;
                    let pressing = robot.finger_force[f] > 0.0 && target < face;
                    if outside && pressing && next <= face {
                        next = face;
                        contact = Some(cube.id);
                    }
                }

                robot.fingers[f] = next.clamp(0.0, FINGER_MAX_OPENING);
                robot.finger_contact[f] = contact;
            }

            // 4. Grip when both fingers press on the same cube
            if let [Some(a), Some(b)] = robot.finger_contact {
                if a == b {
                    if let Some(cube) = cubes.iter().find(|c| c.id == a) {
                        grips.push((a, robot_id, frame.inverse_transform_point(&cube.position)));
                    }
                }
            }
        }

        // 5. Update grips and drop free cubes
        let gripped: Vec<BodyId> = grips.iter().map(|(cube, _, _)| *cube).collect();
        let supports: Vec<Option<(BodyId, f64)>> = self
            .bodies
            .iter()
            .map(|body| match &body.kind {
                BodyKind::Cube(cube) => {
                    self.support_below(&cube.position, cube.position.z - cube.half_size)
                }
                _ => None,
            })
            .collect();

        let gravity = self.gravity;
        for (i, body) in self.bodies.iter_mut().enumerate() {
            let BodyKind::Cube(cube) = &mut body.kind else {
                continue;
            };
            let id = BodyId::new(i as u32);

            if gripped.contains(&id) {
                if cube.grip.is_none() {
                    if let Some((_, robot, local)) = grips.iter().find(|(c, _, _)| *c == id) {
                        debug!(cube = %id, robot = %robot, "cube gripped");
                        cube.grip = Some(Grip {
                            robot: *robot,
                            local: *local,
                        });
                    }
                }
                continue;
            }
            if cube.grip.take().is_some() {
                debug!(cube = %id, "cube released");
            }

            match supports[i] {
                Some((support, height)) => {
                    let rest = height + cube.half_size;
                    if cube.position.z > rest + CONTACT_TOLERANCE {
                        cube.velocity_z += gravity * dt;
                        cube.position.z += cube.velocity_z * dt;
                        cube.resting_on = None;
                    }
                    if cube.position.z <= rest + CONTACT_TOLERANCE {
                        cube.position.z = rest;
                        cube.velocity_z = 0.0;
                        cube.resting_on = Some(support);
                    }
                }
                None => {
                    cube.velocity_z += gravity * dt;
                    cube.position.z += cube.velocity_z * dt;
                    cube.resting_on = None;
                }
            }
        }

        self.clock.tick();
    }

    fn finger_contacts(
        &self,
        robot_id: BodyId,
        robot: &Robot,
        cube_id: BodyId,
        cube: &Cube,
        robot_first: bool,
    ) -> Vec<ContactPoint> {
        let frame = robot.grasp_frame();
        let local = frame.inverse_transform_point(&cube.position);
        let mut points = Vec::new();

        for f in 0..FINGER_DOF {
            if robot.finger_contact[f] != Some(cube_id) {
                continue;
            }
            let (face_y, normal_y) = if f == 0 {
                (local.y + cube.half_size, 1.0)
            } else {
                (local.y - cube.half_size, -1.0)
            };
            let link = JointIndex(FIRST_FINGER_JOINT + f);
            let normal_world = frame.rotation * Vector3::new(0.0, normal_y, 0.0);

            for dz in [-PAD_HALF_HEIGHT, PAD_HALF_HEIGHT] {
                let z = (local.z + dz).clamp(
                    local.z - cube.half_size,
                    local.z + cube.half_size,
                );
                let on_cube = frame.transform_point(&Point3::new(local.x, face_y, z));
                let point = if robot_first {
                    ContactPoint {
                        body_a: robot_id,
                        body_b: cube_id,
                        link_a: Some(link),
                        position_on_b: on_cube,
                        normal_on_b: normal_world,
                        normal_force: robot.finger_force[f],
                    }
                } else {
                    ContactPoint {
                        body_a: cube_id,
                        body_b: robot_id,
                        link_a: None,
                        position_on_b: on_cube,
                        normal_on_b: -normal_world,
                        normal_force: robot.finger_force[f],
                    }
                };
                points.push(point);
            }
        }
        points
    }

    fn resting_contacts(
        &self,
        cube_id: BodyId,
        cube: &Cube,
        support: BodyId,
        cube_first: bool,
    ) -> Vec<ContactPoint> {
        if cube.resting_on != Some(support) {
            return Vec::new();
        }
        let weight = (-self.gravity).max(0.0) * 0.25;
        let h = cube.half_size;
        let bottom = cube.position.z - h;
        [(-h, -h), (h, -h), (h, h), (-h, h)]
            .iter()
            .map(|&(dx, dy)| {
                let corner = Point3::new(cube.position.x + dx, cube.position.y + dy, bottom);
                if cube_first {
                    ContactPoint {
                        body_a: cube_id,
                        body_b: support,
                        link_a: None,
                        position_on_b: corner,
                        normal_on_b: Vector3::z(),
                        normal_force: weight,
                    }
                } else {
                    ContactPoint {
                        body_a: support,
                        body_b: cube_id,
                        link_a: None,
                        position_on_b: corner,
                        normal_on_b: -Vector3::z(),
                        normal_force: weight,
                    }
                }
            })
            .collect()
    }
}

impl Default for KinematicWorld {
    fn default() -> Self {
        Self::new(crate::core::time::DEFAULT_STEPS_PER_SECOND)
    }
}

fn check_finite(value: f64, what: &'static str) -> Result<(), SimError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimError::NonFinite(what))
    }
}

impl Simulation for KinematicWorld {
    fn advance(&mut self, n_steps: u32) -> Result<(), SimError> {
        let pause = Duration::from_secs_f64(self.clock.time_step());
        for _ in 0..n_steps {
            self.step_once();
            if self.realtime {
                std::thread::sleep(pause);
            }
        }
        Ok(())
    }

    fn step_count(&self) -> u64 {
        self.clock.current_step()
    }

    fn set_gripper_target(
        &mut self,
        robot: BodyId,
        finger_joints: &[JointIndex],
        width: f64,
        force: f64,
    ) -> Result<(), SimError> {
        check_finite(width, "gripper width")?;
        check_finite(force, "gripper force")?;
        let r = self.robot_mut(robot)?;
        for &joint in finger_joints {
            let info = r.joint(robot, joint)?;
            if info.joint_type != JointType::Prismatic {
                return Err(SimError::UnknownJoint { body: robot, joint });
            }
            let f = joint.0 - FIRST_FINGER_JOINT;
            r.finger_target[f] = width.clamp(0.0, FINGER_MAX_OPENING);
            r.finger_force[f] = force;
        }
        Ok(())
    }

    fn solve_ik(
        &mut self,
        robot: BodyId,
        ee_link: JointIndex,
        position: &Point3<f64>,
        orientation: &UnitQuaternion<f64>,
        params: IkParams,
    ) -> Result<Vec<f64>, SimError> {
        if !position.coords.iter().all(|v| v.is_finite()) {
            return Err(SimError::NonFinite("IK target position"));
        }
        let r = self.robot(robot)?;
        r.joint(robot, ee_link)?;

        let solution = r
            .model
            .solve_ik(&r.q, &r.fingers, ee_link, position, orientation, params);
        if solution.converged {
            debug!(
                iterations = solution.iterations,
                residual = solution.residual,
                "IK converged"
            );
        } else {
            warn!(
                iterations = solution.iterations,
                residual = solution.residual,
                "IK did not converge; using best solution"
            );
        }

        let mut out: Vec<f64> = solution.q.to_vec();
        out.extend_from_slice(&r.fingers);
        Ok(out)
    }

    fn command_joint_targets(
        &mut self,
        robot: BodyId,
        joints: &[JointIndex],
        targets: &[f64],
        force: f64,
    ) -> Result<(), SimError> {
        if joints.len() != targets.len() {
            return Err(SimError::TargetLengthMismatch {
                joints: joints.len(),
                targets: targets.len(),
            });
        }
        check_finite(force, "joint force")?;
        let r = self.robot_mut(robot)?;

        // Check every entry before touching any target
        let mut commands = Vec::with_capacity(joints.len());
        for (&joint, &target) in joints.iter().zip(targets.iter()) {
            check_finite(target, "joint target")?;
            let info = r.joint(robot, joint)?;
            commands.push((joint, info.joint_type, info.clamp(target)));
        }

        for (joint, joint_type, target) in commands {
            match joint_type {
                JointType::Revolute => {
                    r.q_target[joint.0] = target;
                    r.arm_force[joint.0] = force;
                }
                JointType::Prismatic => {
                    let f = joint.0 - FIRST_FINGER_JOINT;
                    r.finger_target[f] = target;
                    r.finger_force[f] = force;
                }
                JointType::Fixed => {}
            }
        }
        Ok(())
    }

    fn object_pose(&self, body: BodyId) -> Result<ObjectPose, SimError> {
        match &self.body(body)?.kind {
            BodyKind::Plane { height } => Ok(ObjectPose::from_position(Point3::new(0.0, 0.0, *height))),
            BodyKind::Table(table) => Ok(ObjectPose::from_position(table.position)),
            BodyKind::Cube(cube) => Ok(ObjectPose {
                position: cube.position,
                orientation: cube.orientation,
            }),
            BodyKind::Robot(robot) => Ok(ObjectPose {
                position: Point3::from(robot.model.base().translation.vector),
                orientation: robot.model.base().rotation,
            }),
        }
    }

    fn contacts(&self, body_a: BodyId, body_b: BodyId) -> Result<Vec<ContactPoint>, SimError> {
        let a = self.body(body_a)?;
        let b = self.body(body_b)?;
        let points = match (&a.kind, &b.kind) {
            (BodyKind::Robot(robot), BodyKind::Cube(cube)) => {
                self.finger_contacts(body_a, robot, body_b, cube, true)
            }
            (BodyKind::Cube(cube), BodyKind::Robot(robot)) => {
                self.finger_contacts(body_b, robot, body_a, cube, false)
            }
            (BodyKind::Cube(cube), BodyKind::Plane { .. } | BodyKind::Table(_)) => {
                self.resting_contacts(body_a, cube, body_b, true)
            }
            (BodyKind::Plane { .. } | BodyKind::Table(_), BodyKind::Cube(cube)) => {
                self.resting_contacts(body_b, cube, body_a, false)
            }
            _ => Vec::new(),
        };
        Ok(points)
    }

    fn joint_infos(&self, robot: BodyId) -> Result<Vec<JointInfo>, SimError> {
        Ok(self.robot(robot)?.joints.clone())
    }

    fn reset_joint_state(
        &mut self,
        robot: BodyId,
        joint: JointIndex,
        value: f64,
    ) -> Result<(), SimError> {
        check_finite(value, "joint state")?;
        let r = self.robot_mut(robot)?;
        let info = r.joint(robot, joint)?.clone();
        match info.joint_type {
            JointType::Revolute => {
                r.q[joint.0] = info.clamp(value);
                r.q_target[joint.0] = r.q[joint.0];
            }
            JointType::Prismatic => {
                let f = joint.0 - FIRST_FINGER_JOINT;
                r.fingers[f] = info.clamp(value);
                r.finger_target[f] = r.fingers[f];
                r.finger_contact[f] = None;
            }
            JointType::Fixed => {}
        }
        Ok(())
    }
}
