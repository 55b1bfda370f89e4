//! 收敛移动集成测试

mod common;

use common::{assert_vec_near, service_config, setup, setup_with};
use handeye_core::sim::{BlockedRegion, SimConfig};
use handeye_core::{CancelToken, ErrorKind, MotionError, ServiceError, Vec3};
use serde_json::json;

#[test]
fn test_unobstructed_move_takes_ceil_steps() {
    let (sim, tester) = setup(SimConfig::default());
    // 夹爪初始在 (300, 0, 400)，距离 100，步长 30
    let result = tester
        .move_to(Vec3::new(300.0, 0.0, 300.0), Some(30.0), &CancelToken::new())
        .unwrap();

    assert!(result.success);
    assert_eq!(result.steps, 4);
    assert_eq!(result.target, Vec3::new(300.0, 0.0, 300.0));
    assert_vec_near(result.final_position, result.target, 1.0);
    assert_eq!(sim.planned_moves(), 4);
}

#[test]
fn test_default_step_size() {
    let (_, tester) = setup(SimConfig::default());
    let result = tester
        .move_to(Vec3::new(300.0, 0.0, 340.0), None, &CancelToken::new())
        .unwrap();
    // 60mm / 20mm
    assert_eq!(result.steps, 3);
}

#[test]
fn test_already_at_target() {
    let (sim, tester) = setup(SimConfig::default());
    let result = tester
        .move_to(Vec3::new(300.0, 0.0, 400.5), Some(10.0), &CancelToken::new())
        .unwrap();
    assert!(result.success);
    assert_eq!(result.steps, 0);
    assert_eq!(sim.planned_moves(), 0);
}

#[test]
fn test_obstructed_motion_exhausts_steps() {
    let sim = SimConfig {
        max_travel_per_move_mm: 0.5,
        ..Default::default()
    };
    let mut config = service_config();
    config.motion.max_steps = 5;
    let (sim, tester) = setup_with(sim, config);

    let err = tester
        .move_to(Vec3::new(300.0, 0.0, 300.0), Some(20.0), &CancelToken::new())
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Motion(MotionError::Exhausted { max_steps: 5 })
    ));
    assert_eq!(err.kind(), ErrorKind::Exhausted);
    assert!(err.requires_intervention());
    assert_eq!(sim.planned_moves(), 5);
    assert_vec_near(sim.gripper_pose().point, Vec3::new(300.0, 0.0, 397.5), 1e-6);
}

#[test]
fn test_blocked_waypoint_is_no_path() {
    let sim = SimConfig {
        blocked: vec![BlockedRegion {
            min_mm: [290.0, -10.0, 350.0],
            max_mm: [310.0, 10.0, 370.0],
        }],
        ..Default::default()
    };
    let (sim, tester) = setup(sim);

    let err = tester
        .move_to(Vec3::new(300.0, 0.0, 300.0), Some(20.0), &CancelToken::new())
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Motion(MotionError::NoPath { step: 1 })
    ));
    assert_eq!(err.kind(), ErrorKind::Planning);
    assert_eq!(sim.planned_moves(), 1);
}

#[test]
fn test_invalid_step_size() {
    let (sim, tester) = setup(SimConfig::default());
    for step in [0.0, -5.0, f64::NAN] {
        let err = tester
            .move_to(Vec3::new(0.0, 0.0, 100.0), Some(step), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Motion(MotionError::InvalidStepSize(_))
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidCommand);
    }
    assert_eq!(sim.planned_moves(), 0);
}

#[test]
fn test_move_to_command() {
    let (_, tester) = setup(SimConfig::default());
    let value = tester
        .do_command(
            json!({"command": "move_to", "x": 300.0, "y": 50.0, "z": 400.0, "step_size": 25.0}),
            &CancelToken::new(),
        )
        .unwrap();

    assert_eq!(value["success"], true);
    assert_eq!(value["steps"], 2);
    assert_eq!(value["target"], json!({"x_mm": 300.0, "y_mm": 50.0, "z_mm": 400.0}));
    let y = value["final_position"]["y_mm"].as_f64().unwrap();
    assert!((y - 50.0).abs() <= 1.0);
}

#[test]
fn test_reaching_target_on_final_allowed_step() {
    // 80mm / 20mm：第 4 段恰好落在目标上
    let mut config = service_config();
    config.motion.max_steps = 4;
    let (sim, tester) = setup_with(SimConfig::default(), config);

    let result = tester
        .move_to(Vec3::new(300.0, 0.0, 320.0), Some(20.0), &CancelToken::new())
        .unwrap();
    assert!(result.success);
    assert_eq!(result.steps, 4);
    assert_eq!(sim.planned_moves(), 4);
}
