//! Grasp Policy Scenario Tests
//!
//! Drives the state machine against a scripted simulation: contact counts
//! and object poses are fixed in advance, so each scenario pins down the
//! exact state trace the policy must produce.

use approx::assert_relative_eq;
use nalgebra::Point3;
use panda_grasp_core::{
    models::{BodyId, JointIndex, RobotIndices},
    policy::{run_fsm, AttemptContext, GraspPolicy, PolicyConfig},
    sim::{mock::SimCall, ScriptedSimulation, Simulation},
    GraspState,
};

use GraspState::*;

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

fn resting_cube() -> Point3<f64> {
    Point3::new(0.45, 0.0, 0.225)
}

fn scripted(contacts: Vec<usize>) -> ScriptedSimulation {
    let ctx = context();
    ScriptedSimulation::new(ctx.robot, ctx.object, resting_cube()).with_contact_script(contacts)
}

#[test]
fn test_happy_path() {
    // Scenario: object at rest, enough contact on the first close
    let ctx = context();
    let mut sim = scripted(vec![1]);

    let run = run_fsm(&mut sim, &ctx, &PolicyConfig::default(), false).unwrap();

    assert_eq!(run.outcome, Success);
    assert_eq!(
        run.events.visited_states(),
        vec![Reset, Approach, Descend, Close, VerifyGrasp, Lift, Hold, Success]
    );
    assert_eq!(run.state.retries, 0);
    assert_relative_eq!(run.state.grasp_z, 0.03);
}

#[test]
fn test_recovery_then_success() {
    // Scenario: recovery demo misses the first grasp, second attempt holds
    let ctx = context();
    let mut sim = ScriptedSimulation::new(ctx.robot, ctx.object, resting_cube())
        .with_aligned_contacts(0.02, 4);

    let run = run_fsm(&mut sim, &ctx, &PolicyConfig::default(), true).unwrap();

    assert_eq!(run.outcome, Success);
    assert_eq!(
        run.events.visited_states(),
        vec![
            Reset,
            Approach,
            Descend,
            Close,
            VerifyGrasp,
            Recover,
            Approach,
            Descend,
            Close,
            VerifyGrasp,
            Lift,
            Hold,
            Success,
        ]
    );
    assert_eq!(run.state.retries, 1);

    let history = run.events.grasp_z_history();
    assert_eq!(history.len(), 1);
    assert_relative_eq!(history[0], 0.025, epsilon = 1e-12);
    assert_eq!(run.state.last_contacts, Some(4));
}

#[test]
fn test_recovery_demo_without_contact_model_still_offsets() {
    // Scripted contacts ignore geometry; the offset is still logged once
    let ctx = context();
    let mut sim = scripted(vec![0, 2]);

    let run = run_fsm(&mut sim, &ctx, &PolicyConfig::default(), true).unwrap();

    assert_eq!(run.outcome, Success);
    assert_eq!(run.events.events_of_type("GraspOffsetInjected").len(), 1);
}

#[test]
fn test_exhausted_retries() {
    // Scenario: contact never achieved, max_retries = 3
    let ctx = context();
    let mut sim = scripted(vec![0]);
    let cfg = PolicyConfig {
        max_retries: 3,
        ..PolicyConfig::default()
    };

    let run = run_fsm(&mut sim, &ctx, &cfg, false).unwrap();

    assert_eq!(run.outcome, Fail);
    assert_eq!(run.state.retries, 4);

    let states = run.events.visited_states();
    assert_eq!(states.iter().filter(|s| **s == Recover).count(), 4);
    assert_eq!(states.last(), Some(&Fail));
    assert_eq!(states[states.len() - 2], Recover);
    assert_eq!(states.len(), 7 + 5 * 3);

    // The final RECOVER gives up without moving
    assert_eq!(run.events.grasp_z_history().len(), 3);
    assert_eq!(run.events.events_of_type("RetriesExhausted").len(), 1);
}

#[test]
fn test_floor_clamp() {
    // Scenario: 0.012 → 0.01, then stays at 0.01
    let ctx = context();
    let mut sim = scripted(vec![0]);
    let cfg = PolicyConfig {
        grasp_z_offset: 0.012,
        grasp_z_min: 0.01,
        grasp_z_step: 0.005,
        ..PolicyConfig::default()
    };

    let run = run_fsm(&mut sim, &ctx, &cfg, false).unwrap();

    assert_eq!(run.outcome, Fail);
    let history = run.events.grasp_z_history();
    assert_eq!(history.len(), 3);
    for z in history {
        assert_relative_eq!(z, 0.01);
    }

    // Grasp targets follow the clamped offset
    let grasps: Vec<f64> = sim
        .ik_targets()
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 3 == 1)
        .map(|(_, p)| p.z - resting_cube().z)
        .collect();
    assert_relative_eq!(grasps[0], 0.012, epsilon = 1e-12);
    assert_relative_eq!(grasps[1], 0.01, epsilon = 1e-12);
}

#[test]
fn test_zero_retries_fails_on_first_miss() {
    let ctx = context();
    let mut sim = scripted(vec![0]);
    let cfg = PolicyConfig {
        max_retries: 0,
        ..PolicyConfig::default()
    };

    let run = run_fsm(&mut sim, &ctx, &cfg, false).unwrap();

    assert_eq!(run.outcome, Fail);
    assert_eq!(
        run.events.visited_states(),
        vec![Reset, Approach, Descend, Close, VerifyGrasp, Recover, Fail]
    );
}

#[test]
fn test_min_contacts_threshold() {
    // Three contacts are not enough when four are required
    let ctx = context();
    let mut sim = scripted(vec![3, 4]);
    let cfg = PolicyConfig {
        min_contacts: 4,
        ..PolicyConfig::default()
    };

    let run = run_fsm(&mut sim, &ctx, &cfg, false).unwrap();

    assert_eq!(run.outcome, Success);
    assert_eq!(run.state.retries, 1);
}

#[test]
fn test_targets_follow_moving_object() {
    // Every pose query returns the next position: the policy never reuses one
    let ctx = context();
    let trajectory: Vec<Point3<f64>> = (0..10)
        .map(|i| Point3::new(0.45 + 0.001 * i as f64, 0.0, 0.225))
        .collect();
    let mut sim = ScriptedSimulation::new(ctx.robot, ctx.object, resting_cube())
        .with_pose_trajectory(trajectory.clone())
        .with_contact_script(vec![1]);

    run_fsm(&mut sim, &ctx, &PolicyConfig::default(), false).unwrap();

    // APPROACH, DESCEND and LIFT each query the pose once
    let targets = sim.ik_targets();
    assert_eq!(targets.len(), 3);
    for (target, object) in targets.iter().zip(trajectory.iter()) {
        assert_relative_eq!(target.x, object.x, epsilon = 1e-12);
    }
}

#[test]
fn test_policy_steps_are_observable() {
    let ctx = context();
    let mut sim = scripted(vec![0, 1]);
    let mut policy = GraspPolicy::new(PolicyConfig::default(), false).unwrap();

    while policy.state().current != Recover {
        policy.step(&mut sim, &ctx).unwrap();
    }
    assert!(!policy.state().first_attempt);
    assert_eq!(policy.state().retries, 0);

    policy.step(&mut sim, &ctx).unwrap();
    assert_eq!(policy.state().current, Approach);
    assert_eq!(policy.state().retries, 1);
    assert_relative_eq!(policy.state().grasp_z, 0.025, epsilon = 1e-12);
}

#[test]
fn test_recover_reopens_before_backing_off() {
    let ctx = context();
    let mut sim = scripted(vec![0, 1]);

    run_fsm(&mut sim, &ctx, &PolicyConfig::default(), false).unwrap();

    // close, then the recovery open with its 120-step release
    let calls = sim.calls();
    let close = calls
        .iter()
        .position(|c| matches!(c, SimCall::Gripper { width, .. } if *width == 0.0))
        .unwrap();
    let reopen = calls[close..]
        .iter()
        .position(|c| matches!(c, SimCall::Gripper { width, .. } if *width > 0.0))
        .unwrap()
        + close;
    assert_eq!(calls[reopen + 1], SimCall::Advance(120));
}

#[test]
fn test_same_inputs_same_trace() {
    let ctx = context();
    let cfg = PolicyConfig::default();

    let mut first = scripted(vec![0, 0, 2]);
    let mut second = scripted(vec![0, 0, 2]);
    let a = run_fsm(&mut first, &ctx, &cfg, true).unwrap();
    let b = run_fsm(&mut second, &ctx, &cfg, true).unwrap();

    assert_eq!(a, b);
    assert_eq!(first.calls(), second.calls());
    assert_eq!(first.step_count(), second.step_count());
}
