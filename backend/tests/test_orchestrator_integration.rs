//! Integration tests for the Orchestrator
//!
//! These tests validate the complete run cycle from configuration through
//! scene bootstrap, the policy run and the report.

use panda_grasp_core::{
    orchestrator::compute_config_hash, GraspState, Orchestrator, OrchestratorConfig,
    OrchestratorError, PolicyConfig, RunReport,
};

/// Helper function to create a recovery-demo configuration
fn recovery_demo_config() -> OrchestratorConfig {
    OrchestratorConfig {
        recovery_demo: true,
        ..OrchestratorConfig::default()
    }
}

#[test]
fn test_default_run_succeeds() {
    let mut orchestrator = Orchestrator::new(OrchestratorConfig::default()).unwrap();
    let report = orchestrator.run().unwrap().clone();

    assert_eq!(report.outcome, GraspState::Success);
    assert_eq!(report.recover_visits(), 0);
    assert_eq!(report.states.first(), Some(&GraspState::Reset));
    assert_eq!(report.states.last(), Some(&GraspState::Success));
    assert_eq!(report.total_steps, orchestrator.world().clock().current_step());
    assert!(report.object_position.z > 0.425);
}

#[test]
fn test_recovery_demo_report() {
    let mut orchestrator = Orchestrator::new(recovery_demo_config()).unwrap();
    let report = orchestrator.run().unwrap();

    assert_eq!(report.outcome, GraspState::Success);
    assert!(report.recovery_demo);
    assert_eq!(report.recover_visits(), 1);
    assert_eq!(report.retries, 1);
    assert!((report.final_grasp_z - 0.025).abs() < 1e-12);
    assert_eq!(report.events.events_of_type("GraspVerified").len(), 2);
}

#[test]
fn test_run_is_idempotent() {
    let mut orchestrator = Orchestrator::new(OrchestratorConfig::default()).unwrap();
    let first = orchestrator.run().unwrap().clone();
    let steps = orchestrator.world().clock().current_step();

    let second = orchestrator.run().unwrap().clone();

    assert_eq!(first, second);
    assert_eq!(orchestrator.world().clock().current_step(), steps);
}

#[test]
fn test_idle_after_run_keeps_cube_held() {
    let mut orchestrator = Orchestrator::new(OrchestratorConfig::default()).unwrap();
    orchestrator.run().unwrap();
    let object = orchestrator.scene().object;

    orchestrator.idle(120).unwrap();

    assert!(orchestrator.world().is_gripped(object).unwrap());
}

#[test]
fn test_report_hash_matches_policy_config() {
    let config = OrchestratorConfig::default();
    let mut orchestrator = Orchestrator::new(config.clone()).unwrap();
    let report = orchestrator.run().unwrap();

    assert_eq!(
        report.config_hash,
        compute_config_hash(&config.policy).unwrap()
    );
}

#[test]
fn test_report_round_trips_through_json() {
    let mut orchestrator = Orchestrator::new(recovery_demo_config()).unwrap();
    let report = orchestrator.run().unwrap();

    let parsed: RunReport = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(parsed.outcome, report.outcome);
    assert_eq!(parsed.states, report.states);
}

#[test]
fn test_invalid_config_rejected_before_setup() {
    let config = OrchestratorConfig {
        policy: PolicyConfig {
            grasp_z_offset: 0.005,
            grasp_z_min: 0.01,
            ..PolicyConfig::default()
        },
        ..OrchestratorConfig::default()
    };

    assert!(matches!(
        Orchestrator::new(config),
        Err(OrchestratorError::Config(_))
    ));
}
