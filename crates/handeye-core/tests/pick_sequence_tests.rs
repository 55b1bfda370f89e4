//! 九步抓取序列集成测试（仿真测试台）

mod common;

use common::{assert_vec_near, service_config, setup, setup_with};
use handeye_core::sim::{SimConfig, SimFaults, SimObject, SimPose};
use handeye_core::{
    CancelToken, ErrorKind, GraspMotion, PickError, PickStep, ServiceError, StepPolicy,
    StepPolicyTable, Vec3,
};

fn without(step: PickStep) -> Vec<PickStep> {
    PickStep::ALL.into_iter().filter(|s| *s != step).collect()
}

#[test]
fn test_perfect_calibration_completes_all_steps() {
    let (sim, tester) = setup(SimConfig::default());
    let result = tester.pick(0, &CancelToken::new()).unwrap();

    assert_eq!(result.steps_completed, PickStep::ALL.to_vec());
    assert!(result.success);
    assert!(result.is_holding);
    assert!(result.grab_reported);
    assert_eq!(result.detection_frame, "camera");
    assert_vec_near(result.detected_position, Vec3::new(0.0, 0.0, 780.0), 1e-6);

    let approach = result.approach_offset.unwrap();
    assert!(approach.total < 1e-6);
    let offset = result.world_frame_offset.unwrap();
    assert!(offset.total < 1e-6);
    assert_vec_near(result.object_position_world_frame.unwrap(), Vec3::new(0.0, 0.0, 20.0), 1e-6);
    assert_vec_near(result.gripper_position_world_frame.unwrap(), Vec3::new(0.0, 0.0, 20.0), 1e-6);

    // 抬升 50mm，物体随夹爪移动
    assert_vec_near(sim.gripper_pose().point, Vec3::new(0.0, 0.0, 70.0), 1e-6);
    assert_vec_near(sim.object_position(0).unwrap(), Vec3::new(0.0, 0.0, 70.0), 1e-6);
    assert_eq!(sim.holding(), Some(0));
    // 接近用规划器，抓取和抬升直接移动
    assert_eq!(sim.planned_moves(), 1);
    assert_eq!(sim.arm_moves(), 2);
    // pick 自身的检测 + 接近后的重新检测
    assert_eq!(sim.captures(), 2);

    assert_eq!(tester.status().last_result, Some(result));
}

#[test]
fn test_small_calibration_error_is_measured() {
    let sim = SimConfig {
        calibrated_camera_pose: Some(SimPose::facing_down([3.0, 0.0, 800.0])),
        ..Default::default()
    };
    let (_, tester) = setup(sim);
    let result = tester.pick(0, &CancelToken::new()).unwrap();

    // 3mm 误差在夹爪容差之内，但预测的世界位置偏离真值 3mm
    assert!(result.success);
    let predicted = result.object_position_world_frame.unwrap();
    assert_vec_near(predicted, Vec3::new(3.0, 0.0, 20.0), 1e-6);
}

#[test]
fn test_large_calibration_error_misses_object() {
    let sim = SimConfig {
        calibrated_camera_pose: Some(SimPose::facing_down([15.0, 0.0, 800.0])),
        ..Default::default()
    };
    let (sim, tester) = setup(sim);
    let result = tester.pick(0, &CancelToken::new()).unwrap();

    // 所有步骤都执行了，但没有夹到
    assert_eq!(result.steps_completed, PickStep::ALL.to_vec());
    assert!(!result.success);
    assert!(!result.grab_reported);
    assert!(!result.is_holding);
    assert_vec_near(sim.gripper_pose().point, Vec3::new(15.0, 0.0, 70.0), 1e-6);
    assert_vec_near(sim.object_position(0).unwrap(), Vec3::new(0.0, 0.0, 20.0), 1e-6);
    assert_eq!(tester.status().last_result.map(|r| r.success), Some(false));
}

#[test]
fn test_obstacle_perturbed_approach_shows_world_offset() {
    let sim = SimConfig {
        max_travel_per_move_mm: 300.0,
        ..Default::default()
    };
    let (_, tester) = setup(sim);
    let result = tester.pick(0, &CancelToken::new()).unwrap();

    // 从 (300,0,400) 到接近点 (0,0,120)，只走了 300mm
    let full = Vec3::new(300.0, 0.0, 400.0).distance(&Vec3::new(0.0, 0.0, 120.0));
    let offset = result.world_frame_offset.unwrap();
    assert!((offset.total - (full - 300.0)).abs() < 1e-6);
    assert!(!result.success);
    assert_eq!(result.steps_completed, PickStep::ALL.to_vec());
}

#[test]
fn test_planned_grasp_no_path_aborts() {
    let sim = SimConfig {
        faults: SimFaults {
            no_path_after_moves: Some(1),
            ..Default::default()
        },
        ..Default::default()
    };
    let mut config = service_config();
    config.grasp_motion = GraspMotion::Planned;
    let (_, tester) = setup_with(sim, config);

    let err = tester.pick(0, &CancelToken::new()).unwrap_err();
    match &err {
        ServiceError::Pick(PickError::Aborted { step, completed, .. }) => {
            assert_eq!(*step, PickStep::GraspPosition);
            assert_eq!(
                completed,
                &vec![
                    PickStep::OpenGripper,
                    PickStep::ComputeApproach,
                    PickStep::Approach,
                    PickStep::ReDetect,
                ]
            );
        },
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.kind(), ErrorKind::Planning);
    assert!(err.to_string().contains("grasp_position"));

    let status = tester.status();
    assert_eq!(status.last_result, None);
    assert_eq!(status.detected_objects, Some(1));
}

#[test]
fn test_approach_unreachable_is_fatal() {
    let sim = SimConfig {
        faults: SimFaults {
            planner_no_path: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let (sim, tester) = setup(sim);
    let err = tester.pick(0, &CancelToken::new()).unwrap_err();
    let ServiceError::Pick(pick) = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(
        pick.completed_steps(),
        &[PickStep::OpenGripper, PickStep::ComputeApproach]
    );
    assert_eq!(sim.arm_moves(), 0);
}

#[test]
fn test_open_failure_aborts_with_no_steps() {
    let sim = SimConfig {
        faults: SimFaults {
            open_fails: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let (_, tester) = setup(sim);
    let err = tester.pick(0, &CancelToken::new()).unwrap_err();
    match err {
        ServiceError::Pick(PickError::Aborted { step, completed, .. }) => {
            assert_eq!(step, PickStep::OpenGripper);
            assert!(completed.is_empty());
        },
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_empty_re_detection_is_advisory() {
    let sim = SimConfig {
        faults: SimFaults {
            capture_empty_after: Some(1),
            ..Default::default()
        },
        ..Default::default()
    };
    let (_, tester) = setup(sim);
    let result = tester.pick(0, &CancelToken::new()).unwrap();

    assert_eq!(result.steps_completed, without(PickStep::ReDetect));
    assert_eq!(result.approach_offset, None);
    assert!(result.success);
}

#[test]
fn test_camera_pose_failure_leaves_world_values_unset() {
    let sim = SimConfig {
        faults: SimFaults {
            camera_pose_query_fails: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut config = service_config();
    config.grasp_motion = GraspMotion::Planned;
    let (_, tester) = setup_with(sim, config);
    let result = tester.pick(0, &CancelToken::new()).unwrap();

    assert_eq!(result.steps_completed, without(PickStep::WorldFrameCompare));
    assert_eq!(result.object_position_world_frame, None);
    assert_eq!(result.world_frame_offset, None);
    // 夹爪位置照常获取
    assert_vec_near(result.gripper_position_world_frame.unwrap(), Vec3::new(0.0, 0.0, 20.0), 1e-6);
    assert!(result.success);

    let json = serde_json::to_value(handeye_core::command::PickResponse::from(&result)).unwrap();
    assert!(json.get("object_position_world_frame").is_none());
    assert!(json.get("gripper_position_world_frame").is_some());
}

#[test]
fn test_object_at_world_origin_is_reported() {
    let sim = SimConfig {
        objects: vec![SimObject {
            center_mm: [0.0, 0.0, 0.0],
            point_count: 342,
        }],
        ..Default::default()
    };
    let (_, tester) = setup(sim);
    let result = tester.pick(0, &CancelToken::new()).unwrap();

    let world = result.object_position_world_frame.expect("origin is a real value");
    assert!(world.norm() < 1e-6);

    let json = serde_json::to_value(handeye_core::command::PickResponse::from(&result)).unwrap();
    let reported = &json["object_position_world_frame"];
    assert!(reported.is_object());
    assert!(reported["x_mm"].as_f64().unwrap().abs() < 1e-6);
}

#[test]
fn test_holding_query_failure_means_not_successful() {
    let sim = SimConfig {
        faults: SimFaults {
            holding_query_fails: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let (sim, tester) = setup(sim);
    let result = tester.pick(0, &CancelToken::new()).unwrap();

    assert_eq!(result.steps_completed, without(PickStep::Verify));
    assert!(result.grab_reported);
    assert!(!result.is_holding);
    assert!(!result.success);
    // 实际上夹住了，只是验证不了
    assert_eq!(sim.holding(), Some(0));
}

#[test]
fn test_strict_policy_turns_advisory_into_abort() {
    let sim = SimConfig {
        faults: SimFaults {
            holding_query_fails: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let rig = handeye_core::sim::SimRig::for_service(sim, &service_config());
    let tester = handeye_core::CalibrationTester::new(rig.rig(), service_config())
        .unwrap()
        .with_policy(StepPolicyTable::uniform(StepPolicy::Fatal));

    let err = tester.pick(0, &CancelToken::new()).unwrap_err();
    let ServiceError::Pick(pick) = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(pick.completed_steps().len(), 8);
    assert_eq!(err.kind(), ErrorKind::Query);
}

#[test]
fn test_pick_detected_skips_initial_capture() {
    let (sim, tester) = setup(SimConfig::default());
    tester.detect(&CancelToken::new()).unwrap();
    assert_eq!(sim.captures(), 1);

    let result = tester.pick_detected(0, &CancelToken::new()).unwrap();
    assert!(result.success);
    // 只多了一次重新检测
    assert_eq!(sim.captures(), 2);
}

#[test]
fn test_cancelled_pick_reports_completed_steps() {
    let token = CancelToken::new();
    token.cancel();
    let (sim, tester) = setup(SimConfig::default());
    tester.detect(&CancelToken::new()).unwrap();

    let err = tester.pick_detected(0, &token).unwrap_err();
    match err {
        ServiceError::Pick(PickError::Cancelled { completed }) => assert!(completed.is_empty()),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(sim.planned_moves(), 0);
    assert_eq!(tester.status().last_result, None);
}

#[test]
fn test_world_frame_detection_picks_object() {
    let mut config = service_config();
    config.detection_frame = "world".into();
    let (sim, tester) = setup_with(SimConfig::default(), config);
    let result = tester.pick(0, &CancelToken::new()).unwrap();

    assert_eq!(result.steps_completed, PickStep::ALL.to_vec());
    assert!(result.success);
    assert_eq!(result.detection_frame, "world");
    assert_vec_near(result.detected_position, Vec3::new(0.0, 0.0, 20.0), 1e-6);
    assert!(result.approach_offset.unwrap().total < 1e-6);
    assert!(result.world_frame_offset.unwrap().total < 1e-6);
    assert_vec_near(sim.gripper_pose().point, Vec3::new(0.0, 0.0, 70.0), 1e-6);
    assert_eq!(sim.holding(), Some(0));
}

#[test]
fn test_direct_lift_failure_is_advisory() {
    // 抓取那次直接移动成功，抬升那次失败
    let sim = SimConfig {
        faults: SimFaults {
            arm_move_fails_after: Some(1),
            ..Default::default()
        },
        ..Default::default()
    };
    let (sim, tester) = setup(sim);
    let result = tester.pick(0, &CancelToken::new()).unwrap();

    assert_eq!(result.steps_completed, without(PickStep::Lift));
    assert!(result.is_holding);
    assert_eq!(result.success, result.is_holding);
    assert_eq!(sim.arm_moves(), 1);
    assert_vec_near(sim.gripper_pose().point, Vec3::new(0.0, 0.0, 20.0), 1e-6);
}

#[test]
fn test_planned_lift_without_path_is_advisory() {
    // 接近和抓取各规划一次，抬升时无路径
    let sim = SimConfig {
        faults: SimFaults {
            no_path_after_moves: Some(2),
            ..Default::default()
        },
        ..Default::default()
    };
    let mut config = service_config();
    config.grasp_motion = GraspMotion::Planned;
    let (sim, tester) = setup_with(sim, config);
    let result = tester.pick(0, &CancelToken::new()).unwrap();

    assert_eq!(result.steps_completed, without(PickStep::Lift));
    assert!(result.is_holding);
    assert_eq!(result.success, result.is_holding);
    assert_eq!(sim.planned_moves(), 2);
    assert_eq!(sim.arm_moves(), 0);
    assert_vec_near(sim.object_position(0).unwrap(), Vec3::new(0.0, 0.0, 20.0), 1e-6);
}

#[test]
fn test_direct_grasp_arm_fault_is_fatal() {
    let sim = SimConfig {
        faults: SimFaults {
            arm_move_fails_after: Some(0),
            ..Default::default()
        },
        ..Default::default()
    };
    let (sim, tester) = setup(sim);
    let err = tester.pick(0, &CancelToken::new()).unwrap_err();
    match &err {
        ServiceError::Pick(PickError::Aborted { step, completed, .. }) => {
            assert_eq!(*step, PickStep::GraspPosition);
            assert_eq!(completed.len(), 4);
        },
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.kind(), ErrorKind::Actuation);
    assert_eq!(sim.arm_moves(), 0);
}

#[test]
fn test_arm_position_query_failure_aborts_direct_grasp() {
    let sim = SimConfig {
        faults: SimFaults {
            arm_query_fails: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let (sim, tester) = setup(sim);
    let err = tester.pick(0, &CancelToken::new()).unwrap_err();
    match &err {
        ServiceError::Pick(PickError::Aborted { step, completed, .. }) => {
            assert_eq!(*step, PickStep::GraspPosition);
            assert_eq!(completed.last(), Some(&PickStep::ReDetect));
        },
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.kind(), ErrorKind::Query);
    // 接近已经完成
    assert_vec_near(sim.gripper_pose().point, Vec3::new(0.0, 0.0, 120.0), 1e-6);
}

#[test]
fn test_planner_error_aborts_approach() {
    let sim = SimConfig {
        faults: SimFaults {
            plan_fails: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let (sim, tester) = setup(sim);
    let err = tester.pick(0, &CancelToken::new()).unwrap_err();
    match &err {
        ServiceError::Pick(PickError::Aborted { step, .. }) => {
            assert_eq!(*step, PickStep::Approach);
        },
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.kind(), ErrorKind::Planning);
    assert_eq!(sim.planned_moves(), 0);
    assert_vec_near(sim.gripper_pose().point, Vec3::new(300.0, 0.0, 400.0), 1e-6);
}
