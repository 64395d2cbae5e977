//! Property-based tests for the grasp policy.
//!
//! These tests use proptest to generate random configurations and contact
//! scripts and verify the termination and grasp-depth invariants.

use nalgebra::Point3;
use panda_grasp_core::{
    models::{BodyId, JointIndex, RobotIndices},
    policy::{run_fsm, AttemptContext, PolicyConfig},
    sim::ScriptedSimulation,
    GraspState,
};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn context() -> AttemptContext {
    AttemptContext {
        robot: BodyId::new(3),
        object: BodyId::new(2),
        indices: RobotIndices {
            arm_joints: (0..7).map(JointIndex).collect(),
            finger_joints: vec![JointIndex(9), JointIndex(10)],
            ee_link: JointIndex(11),
        },
    }
}

/// Valid policy configurations with short motion phases
fn arb_config() -> impl Strategy<Value = PolicyConfig> {
    (
        0u32..6,
        0.0..0.05f64,
        0.0..0.05f64,
        0.0..0.02f64,
        1usize..5,
    )
        .prop_map(|(max_retries, a, b, grasp_z_step, min_contacts)| PolicyConfig {
            max_retries,
            grasp_z_offset: a.max(b),
            grasp_z_min: a.min(b),
            grasp_z_step,
            pregrasp_steps: 1,
            descend_steps: 1,
            close_steps: 1,
            lift_steps: 1,
            hold_steps: 1,
            min_contacts,
        })
}

/// Contact counts reported by successive verifications
fn arb_contacts() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..6, 1..12)
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_run_terminates_within_bound(cfg in arb_config(), contacts in arb_contacts()) {
        let ctx = context();
        let mut sim = ScriptedSimulation::new(ctx.robot, ctx.object, Point3::new(0.45, 0.0, 0.225))
            .with_contact_script(contacts);

        let run = run_fsm(&mut sim, &ctx, &cfg, false).unwrap();
        let states = run.events.visited_states();

        prop_assert!(run.outcome.is_terminal());
        prop_assert_eq!(states.last().copied(), Some(run.outcome));
        prop_assert!(states.len() <= 8 + 5 * cfg.max_retries as usize);

        let recovers = states.iter().filter(|s| **s == GraspState::Recover).count();
        prop_assert!(recovers <= cfg.max_retries as usize + 1);
        if run.outcome == GraspState::Fail {
            prop_assert_eq!(recovers, cfg.max_retries as usize + 1);
        }
    }

    #[test]
    fn prop_grasp_z_non_increasing_and_floored(cfg in arb_config(), contacts in arb_contacts()) {
        let ctx = context();
        let mut sim = ScriptedSimulation::new(ctx.robot, ctx.object, Point3::new(0.45, 0.0, 0.225))
            .with_contact_script(contacts);

        let run = run_fsm(&mut sim, &ctx, &cfg, false).unwrap();

        let mut previous = cfg.grasp_z_offset;
        for z in run.events.grasp_z_history() {
            prop_assert!(z <= previous);
            prop_assert!(z >= cfg.grasp_z_min);
            previous = z;
        }
        prop_assert!(run.state.grasp_z >= cfg.grasp_z_min);
    }

    #[test]
    fn prop_identical_inputs_identical_runs(cfg in arb_config(), contacts in arb_contacts(), demo in any::<bool>()) {
        let ctx = context();
        let object = Point3::new(0.45, 0.0, 0.225);
        let mut a = ScriptedSimulation::new(ctx.robot, ctx.object, object)
            .with_contact_script(contacts.clone());
        let mut b = ScriptedSimulation::new(ctx.robot, ctx.object, object)
            .with_contact_script(contacts);

        let first = run_fsm(&mut a, &ctx, &cfg, demo).unwrap();
        let second = run_fsm(&mut b, &ctx, &cfg, demo).unwrap();

        prop_assert_eq!(first, second);
    }
}
