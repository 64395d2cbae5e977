//! Orchestrator Engine
//!
//! Owns the built-in world and sequences one complete grasp run:
//!
//! ```text
//! 1. Validate configuration
//! 2. Load scene (floor, table, cube, Panda)
//! 3. Discover arm/finger joints and the end-effector link
//! 4. Reset the arm to its home configuration
//! 5. Run the grasp policy to SUCCESS or FAIL
//! 6. Build the run report
//! 7. Idle-step the world on request, paced at the physics rate
//! ```
//!
//! # Example
//!
//! ```rust
//! use panda_grasp_core::orchestrator::{Orchestrator, OrchestratorConfig};
//!
//! let mut orchestrator = Orchestrator::new(OrchestratorConfig::default()).unwrap();
//! let report = orchestrator.run().unwrap();
//! assert!(report.outcome.is_terminal());
//! ```

use super::report::RunReport;
use crate::policy::{run_fsm, AttemptContext, ConfigError, PolicyConfig, PolicyError};
use crate::sim::{
    discover_indices, load_scene, reset_home, KinematicWorld, Scene, SceneConfig, SetupError,
    SimError, Simulation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

// ============================================================================
// Configuration Types
// ============================================================================

/// Complete run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Grasp policy tunables
    pub policy: PolicyConfig,

    /// World layout
    pub scene: SceneConfig,

    /// Offset the first grasp so the recovery path is exercised
    pub recovery_demo: bool,

    /// Pace stepping against wall-clock time
    pub realtime: bool,
}

impl OrchestratorConfig {
    /// Check every nested section
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        self.policy.validate()?;
        if self.scene.steps_per_second == 0 {
            return Err(SetupError::ZeroStepRate.into());
        }
        Ok(())
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while orchestrating a run
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OrchestratorError {
    #[error("Invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("Scene setup failed: {0}")]
    Setup(#[from] SetupError),

    #[error("Policy run failed: {0}")]
    Policy(#[from] PolicyError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Scene bootstrap plus one policy run on the built-in world
pub struct Orchestrator {
    config: OrchestratorConfig,
    world: KinematicWorld,
    scene: Scene,
    context: AttemptContext,
    report: Option<RunReport>,
}

impl Orchestrator {
    /// Validate `config`, build the world and put the arm at home
    ///
    /// # Errors
    ///
    /// - [`OrchestratorError::Config`] for invalid tunables
    /// - [`OrchestratorError::Setup`] for a zero physics rate, if the robot model lacks the
    ///   end-effector link or arm/finger joints, or the home configuration
    ///   has the wrong length
    pub fn new(config: OrchestratorConfig) -> Result<Self, OrchestratorError> {
        config.validate()?;

        let (mut world, scene) = load_scene(&config.scene)?;
        let joints = world.joint_infos(scene.robot)?;
        let indices = discover_indices(&joints)?;
        info!(
            arm_joints = indices.arm_joints.len(),
            finger_joints = indices.finger_joints.len(),
            ee_link = %indices.ee_link,
            "robot indices discovered"
        );
        reset_home(&mut world, scene.robot, &indices, &config.scene.home_q)?;
        world.set_realtime(config.realtime);

        let context = AttemptContext {
            robot: scene.robot,
            object: scene.object,
            indices,
        };

        Ok(Self {
            config,
            world,
            scene,
            context,
            report: None,
        })
    }

    /// Run the grasp policy to a terminal state and build the report
    ///
    /// Only the first call runs the policy; later calls return the same report.
    pub fn run(&mut self) -> Result<&RunReport, OrchestratorError> {
        let report = match self.report.take() {
            Some(report) => report,
            None => self.execute()?,
        };
        Ok(self.report.insert(report))
    }

    fn execute(&mut self) -> Result<RunReport, OrchestratorError> {
        let outcome = run_fsm(
            &mut self.world,
            &self.context,
            &self.config.policy,
            self.config.recovery_demo,
        )?;
        let object = self.world.object_pose(self.scene.object)?.position;
        let report = RunReport::new(&outcome, &self.config, self.world.step_count(), object)?;
        info!(
            outcome = %report.outcome,
            retries = report.retries,
            steps = report.total_steps,
            "run complete"
        );
        Ok(report)
    }

    /// Keep stepping the world after the run
    ///
    /// Idling is always paced against wall-clock time, one time step per
    /// simulated step, whatever the `realtime` setting of the run was.
    pub fn idle(&mut self, n_steps: u32) -> Result<(), OrchestratorError> {
        self.world.set_realtime(true);
        self.world.advance(n_steps)?;
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Configuration in use
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Built-in world
    pub fn world(&self) -> &KinematicWorld {
        &self.world
    }

    /// Bodies of the loaded scene
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Context handed to the policy
    pub fn context(&self) -> &AttemptContext {
        &self.context
    }

    /// Report of the completed run, if any
    pub fn report(&self) -> Option<&RunReport> {
        self.report.as_ref()
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("scene", &self.scene)
            .field("step", &self.world.step_count())
            .field("finished", &self.report.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JointIndex;
    use std::time::{Duration, Instant};

    #[test]
    fn test_new_discovers_indices_and_homes_arm() {
        let orchestrator = Orchestrator::new(OrchestratorConfig::default()).unwrap();
        let ctx = orchestrator.context();

        assert_eq!(ctx.indices.arm_joints.len(), 7);
        assert_eq!(ctx.indices.ee_link, JointIndex(11));
        assert_eq!(
            orchestrator
                .world()
                .arm_positions(orchestrator.scene().robot)
                .unwrap()
                .to_vec(),
            orchestrator.config().scene.home_q
        );
        assert_eq!(orchestrator.world().step_count(), 0);
    }

    #[test]
    fn test_invalid_policy_config_rejected() {
        let config = OrchestratorConfig {
            policy: PolicyConfig {
                min_contacts: 0,
                ..PolicyConfig::default()
            },
            ..OrchestratorConfig::default()
        };

        assert_eq!(
            Orchestrator::new(config).err(),
            Some(OrchestratorError::Config(ConfigError::ZeroMinContacts))
        );
    }

    #[test]
    fn test_zero_rate_rejected() {
        let mut config = OrchestratorConfig::default();
        config.scene.steps_per_second = 0;

        assert_eq!(
            Orchestrator::new(config).err(),
            Some(OrchestratorError::Setup(SetupError::ZeroStepRate))
        );
    }

    #[test]
    fn test_bad_home_length_is_setup_error() {
        let mut config = OrchestratorConfig::default();
        config.scene.home_q = vec![0.0; 6];

        assert!(matches!(
            Orchestrator::new(config),
            Err(OrchestratorError::Setup(SetupError::HomeLengthMismatch { .. }))
        ));
    }

    #[test]
    fn test_idle_advances_world() {
        let mut orchestrator = Orchestrator::new(OrchestratorConfig::default()).unwrap();
        orchestrator.idle(10).unwrap();
        assert_eq!(orchestrator.world().step_count(), 10);
    }

    #[test]
    fn test_idle_is_paced_without_realtime() {
        let mut orchestrator = Orchestrator::new(OrchestratorConfig::default()).unwrap();
        assert!(!orchestrator.config().realtime);

        let started = Instant::now();
        orchestrator.idle(24).unwrap();

        // 24 steps at 240 Hz is 0.1 s
        assert!(started.elapsed() >= Duration::from_millis(95));
        assert_eq!(orchestrator.world().step_count(), 24);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: OrchestratorConfig =
            serde_json::from_str(r#"{ "recovery_demo": true, "policy": { "max_retries": 1 } }"#)
                .unwrap();

        assert!(config.recovery_demo);
        assert_eq!(config.policy.max_retries, 1);
        assert_eq!(config.policy.min_contacts, 1);
        assert_eq!(config.scene, SceneConfig::default());
    }
}
