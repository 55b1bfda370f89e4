//! 集成测试公共工具
#![allow(dead_code)]

use handeye_core::sim::{SimConfig, SimRig};
use handeye_core::{CalibrationTester, ServiceConfig, Vec3};
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

static TRACING: Once = Once::new();

/// 初始化日志（`RUST_LOG=handeye_core=debug cargo test` 查看详细输出）
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// 默认组件名称的服务配置
pub fn service_config() -> ServiceConfig {
    ServiceConfig::new("arm", "camera", "gripper")
}

/// 用给定场景和配置搭建服务
pub fn setup_with(sim: SimConfig, config: ServiceConfig) -> (Arc<SimRig>, Arc<CalibrationTester>) {
    init_tracing();
    let rig = SimRig::for_service(sim, &config);
    let tester = CalibrationTester::new(rig.rig(), config).expect("valid test config");
    (rig, Arc::new(tester))
}

pub fn setup(sim: SimConfig) -> (Arc<SimRig>, Arc<CalibrationTester>) {
    setup_with(sim, service_config())
}

pub fn assert_vec_near(actual: Vec3, expected: Vec3, tol: f64) {
    assert!(
        actual.distance(&expected) <= tol,
        "expected {expected} within {tol}mm, got {actual}"
    );
}

/// 轮询直到条件成立或超时
pub fn wait_for_condition<F>(mut condition: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    false
}
