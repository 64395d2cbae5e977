//! Grasp Policy Module
//!
//! Finite-state machine that drives one pick-and-lift run with a bounded
//! recovery loop.
//!
//! # Overview
//!
//! ```text
//! RESET → APPROACH → DESCEND → CLOSE → VERIFY_GRASP ─ok→ LIFT → HOLD → SUCCESS
//!            ↑                               │
//!            └──────── RECOVER ←──── not ok ─┘
//!                         │
//!                         └─ retries > max_retries → FAIL
//! ```
//!
//! Each state performs its actions through the [motion executor](crate::motion)
//! and then names the next state. The object pose is fetched fresh at every
//! decision point; nothing geometric is cached between states.
//!
//! # Critical Invariants
//!
//! 1. **Termination**: every run ends in `Success` or `Fail` after at most
//!    `8 + 5 * max_retries` visited states (terminal state included)
//! 2. **Bounded recovery**: RECOVER is entered at most `max_retries + 1` times
//! 3. **Monotone depth**: `grasp_z` never increases and never drops below
//!    `grasp_z_min`
//! 4. **Determinism**: the same configuration against the same object pose
//!    and contact sequence produces the same state trace
//!
//! # Example
//!
//! ```rust
//! use panda_grasp_core::policy::{run_fsm, AttemptContext};
//! use panda_grasp_core::sim::ScriptedSimulation;
//! use panda_grasp_core::models::{BodyId, JointIndex, RobotIndices};
//! use panda_grasp_core::{GraspState, PolicyConfig};
//! use nalgebra::Point3;
//!
//! let (robot, cube) = (BodyId::new(3), BodyId::new(2));
//! let mut sim = ScriptedSimulation::new(robot, cube, Point3::new(0.45, 0.0, 0.225));
//! let ctx = AttemptContext {
//!     robot,
//!     object: cube,
//!     indices: RobotIndices {
//!         arm_joints: (0..7).map(JointIndex).collect(),
//!         finger_joints: vec![JointIndex(9), JointIndex(10)],
//!         ee_link: JointIndex(11),
//!     },
//! };
//!
//! let run = run_fsm(&mut sim, &ctx, &PolicyConfig::default(), false).unwrap();
//! assert_eq!(run.outcome, GraspState::Success);
//! assert_eq!(run.state.retries, 0);
//! ```

pub mod config;
pub mod verify;

pub use config::{ConfigError, PolicyConfig};
pub use verify::{verify_grasp, GraspCheck};

pub use crate::models::{GraspAttemptState, GraspState};

use crate::kinematics::{grasp_targets, point_above, LIFT_HEIGHT, SAFE_HEIGHT};
use crate::models::{BodyId, Event, EventLog, RobotIndices};
use crate::motion;
use crate::sim::{SimError, Simulation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Steps RESET waits after opening the gripper
pub const RESET_SETTLE_STEPS: u32 = 240;

/// Steps RECOVER waits after opening the gripper
pub const RECOVER_RELEASE_STEPS: u32 = 120;

/// Steps RECOVER spends backing off to the safe height
pub const RECOVER_BACKOFF_STEPS: u32 = 240;

/// Lateral x offset added to the first grasp in recovery-demo mode (m)
pub const DEMO_OFFSET_X: f64 = 0.06;

/// Lateral y offset added to the first grasp in recovery-demo mode (m)
pub const DEMO_OFFSET_Y: f64 = 0.02;

/// Errors that abort a policy run
///
/// A failed grasp is not an error; it ends in [`GraspState::Fail`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PolicyError {
    #[error("Simulation error: {0}")]
    Simulation(#[from] SimError),

    #[error("Invalid policy config: {0}")]
    Config(#[from] ConfigError),
}

/// Bodies and joint indices every transition needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptContext {
    /// Robot body
    pub robot: BodyId,
    /// Object to pick up
    pub object: BodyId,
    /// Arm joints, finger joints and end-effector link
    pub indices: RobotIndices,
}

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// `Success` or `Fail`
    pub outcome: GraspState,
    /// Final attempt state
    pub state: GraspAttemptState,
    /// Everything that happened, in order
    pub events: EventLog,
}

/// Steppable grasp state machine
#[derive(Debug, Clone)]
pub struct GraspPolicy {
    cfg: PolicyConfig,
    recovery_demo: bool,
    state: GraspAttemptState,
    events: EventLog,
}

impl GraspPolicy {
    /// New policy in `Reset`
    ///
    /// With `recovery_demo` set, the first grasp is deliberately shifted
    /// sideways so the recovery path runs at least once.
    pub fn new(cfg: PolicyConfig, recovery_demo: bool) -> Result<Self, PolicyError> {
        cfg.validate()?;
        let state = GraspAttemptState::new(&cfg);
        Ok(Self {
            cfg,
            recovery_demo,
            state,
            events: EventLog::new(),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &PolicyConfig {
        &self.cfg
    }

    /// Current attempt state
    pub fn state(&self) -> &GraspAttemptState {
        &self.state
    }

    /// Events logged so far
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// True once `Success` or `Fail` is reached
    pub fn is_finished(&self) -> bool {
        self.state.current.is_terminal()
    }

    /// Process the current state and move to the next one. Returns the new
    /// current state. Does nothing once the run is finished.
    pub fn step<S: Simulation + ?Sized>(
        &mut self,
        sim: &mut S,
        ctx: &AttemptContext,
    ) -> Result<GraspState, PolicyError> {
        let current = self.state.current;
        if current.is_terminal() {
            return Ok(current);
        }

        self.events.log(Event::StateEntered {
            step: sim.step_count(),
            state: current,
        });
        debug!(state = %current, retries = self.state.retries, "entering state");

        let next = match current {
            GraspState::Reset => {
                motion::open_gripper(sim, ctx.robot, &ctx.indices.finger_joints)?;
                motion::step(sim, RESET_SETTLE_STEPS)?;
                GraspState::Approach
            }

            GraspState::Approach => {
                let object = sim.object_pose(ctx.object)?.position;
                let targets = grasp_targets(&object, self.state.grasp_z);
                self.events.log(Event::TargetsComputed {
                    step: sim.step_count(),
                    grasp_z: self.state.grasp_z,
                    pregrasp: targets.pregrasp,
                    grasp: targets.grasp,
                    lift: targets.lift,
                });
                self.state.targets = Some(targets);
                self.move_to(sim, ctx, &targets.pregrasp, self.cfg.pregrasp_steps)?;
                GraspState::Descend
            }

            GraspState::Descend => {
                let object = sim.object_pose(ctx.object)?.position;
                let targets = grasp_targets(&object, self.state.grasp_z);
                self.state.targets = Some(targets);

                let mut grasp = targets.grasp;
                if self.recovery_demo && self.state.first_attempt {
                    grasp.x += DEMO_OFFSET_X;
                    grasp.y += DEMO_OFFSET_Y;
                    info!(
                        dx = DEMO_OFFSET_X,
                        dy = DEMO_OFFSET_Y,
                        "recovery demo: offsetting first grasp"
                    );
                    self.events.log(Event::GraspOffsetInjected {
                        step: sim.step_count(),
                        dx: DEMO_OFFSET_X,
                        dy: DEMO_OFFSET_Y,
                    });
                }
                self.move_to(sim, ctx, &grasp, self.cfg.descend_steps)?;
                GraspState::Close
            }

            GraspState::Close => {
                motion::close_gripper(sim, ctx.robot, &ctx.indices.finger_joints)?;
                motion::step(sim, self.cfg.close_steps)?;
                GraspState::VerifyGrasp
            }

            GraspState::VerifyGrasp => {
                let check = verify_grasp(&*sim, ctx.robot, ctx.object, self.cfg.min_contacts)?;
                info!(contacts = check.contacts, ok = check.ok, "grasp verified");
                self.events.log(Event::GraspVerified {
                    step: sim.step_count(),
                    contacts: check.contacts,
                    ok: check.ok,
                });
                self.state.last_contacts = Some(check.contacts);
                self.state.first_attempt = false;
                if check.ok {
                    GraspState::Lift
                } else {
                    GraspState::Recover
                }
            }

            GraspState::Lift => {
                let object = sim.object_pose(ctx.object)?.position;
                let lift = point_above(&object, LIFT_HEIGHT);
                self.move_to(sim, ctx, &lift, self.cfg.lift_steps)?;
                GraspState::Hold
            }

            GraspState::Hold => {
                motion::step(sim, self.cfg.hold_steps)?;
                GraspState::Success
            }

            GraspState::Recover => self.recover(sim, ctx)?,

            GraspState::Success | GraspState::Fail => current,
        };

        self.state.current = next;
        if next.is_terminal() {
            info!(outcome = %next, retries = self.state.retries, "grasp run finished");
            self.events.log(Event::Finished {
                step: sim.step_count(),
                outcome: next,
            });
        }
        Ok(next)
    }

    /// Step until a terminal state is reached
    pub fn run<S: Simulation + ?Sized>(
        mut self,
        sim: &mut S,
        ctx: &AttemptContext,
    ) -> Result<RunOutcome, PolicyError> {
        while !self.is_finished() {
            self.step(sim, ctx)?;
        }
        Ok(RunOutcome {
            outcome: self.state.current,
            state: self.state,
            events: self.events,
        })
    }

    fn recover<S: Simulation + ?Sized>(
        &mut self,
        sim: &mut S,
        ctx: &AttemptContext,
    ) -> Result<GraspState, PolicyError> {
        if self.state.retries >= self.cfg.max_retries {
            self.state.retries = self.state.retries.saturating_add(1);
            warn!(
                retries = self.state.retries,
                max_retries = self.cfg.max_retries,
                "retries exhausted"
            );
            self.events.log(Event::RetriesExhausted {
                step: sim.step_count(),
                retries: self.state.retries,
            });
            return Ok(GraspState::Fail);
        }
        self.state.retries += 1;

        info!(
            retry = self.state.retries,
            "opening, backing off and adjusting grasp_z"
        );
        motion::open_gripper(sim, ctx.robot, &ctx.indices.finger_joints)?;
        motion::step(sim, RECOVER_RELEASE_STEPS)?;

        let object = sim.object_pose(ctx.object)?.position;
        let safe = point_above(&object, SAFE_HEIGHT);
        self.move_to(sim, ctx, &safe, RECOVER_BACKOFF_STEPS)?;

        let old_grasp_z = self.state.grasp_z;
        let new_grasp_z = self
            .state
            .lower_grasp_z(self.cfg.grasp_z_step, self.cfg.grasp_z_min);
        info!(grasp_z = new_grasp_z, "new grasp offset");
        self.events.log(Event::GraspAdjusted {
            step: sim.step_count(),
            retry: self.state.retries,
            old_grasp_z,
            new_grasp_z,
        });
        Ok(GraspState::Approach)
    }

    fn move_to<S: Simulation + ?Sized>(
        &self,
        sim: &mut S,
        ctx: &AttemptContext,
        target: &nalgebra::Point3<f64>,
        n_steps: u32,
    ) -> Result<(), SimError> {
        motion::move_ee_pose(
            sim,
            ctx.robot,
            ctx.indices.ee_link,
            &ctx.indices.arm_joints,
            target,
            &self.state.orientation,
            n_steps,
        )
    }
}

/// Run the grasp policy from `Reset` to a terminal state
///
/// Returns `Ok` with `Success` or `Fail` for every run that the simulation
/// completes; `Err` only when the configuration is invalid or the
/// simulation reports a fault.
pub fn run_fsm<S: Simulation + ?Sized>(
    sim: &mut S,
    ctx: &AttemptContext,
    cfg: &PolicyConfig,
    recovery_demo: bool,
) -> Result<RunOutcome, PolicyError> {
    info!(
        max_retries = cfg.max_retries,
        recovery_demo, "starting grasp policy"
    );
    GraspPolicy::new(cfg.clone(), recovery_demo)?.run(sim, ctx)
}
