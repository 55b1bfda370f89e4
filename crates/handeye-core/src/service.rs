//! 标定测试服务
//!
//! [`CalibrationTester`] 把检测、抓取和收敛移动组合成命令，并维护会话状态：
//! 当前活动（idle/detecting/picking/moving）、最近一次检测结果和最近一次抓取结果。
//!
//! # 并发
//!
//! 服务是 `Send + Sync` 的，可以通过 `Arc` 在多个线程间共享。
//! 状态锁只在状态切换和记录结果时持有，采集、规划和运动都在锁外进行，
//! 因此 `status()` 在长时间运动期间也能随时返回。
//!
//! 状态只用于观测，不作为运动互斥锁：服务不会拒绝并发的命令。
//!
//! # 取消
//!
//! 每个命令都使用调用方令牌与服务关闭令牌的链接令牌；
//! [`CalibrationTester::close`] 之后，所有进行中的调用都会观察到取消。

use crate::cancel::CancelToken;
use crate::capability::Rig;
use crate::command::{Command, DetectResponse, MoveResponse, PickResponse, Response, StatusResponse};
use crate::config::ServiceConfig;
use crate::convergence::ConvergenceController;
use crate::detection::Detector;
use crate::error::{ConfigError, ServiceError};
use crate::pick::{PickOrchestrator, StepPolicyTable};
use handeye_types::{Activity, DetectedObject, MoveResult, PickResult, Vec3};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

/// 会话状态
#[derive(Debug, Clone, Default)]
struct SessionState {
    status: Activity,
    last_detection: Option<Vec<DetectedObject>>,
    last_result: Option<PickResult>,
}

/// 状态快照
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub status: Activity,
    pub last_result: Option<PickResult>,
    /// 最近一次检测到的物体数量（从未检测过时为 `None`）
    pub detected_objects: Option<usize>,
}

/// 活动守卫：创建时设置活动，析构时恢复为 `Idle`
///
/// 覆盖 `?` 提前返回和 panic 展开在内的所有退出路径。
struct ActivityGuard<'a> {
    state: &'a Mutex<SessionState>,
}

impl<'a> ActivityGuard<'a> {
    fn enter(state: &'a Mutex<SessionState>, activity: Activity) -> Self {
        state.lock().status = activity;
        ActivityGuard { state }
    }

    fn transition(&self, activity: Activity) {
        self.state.lock().status = activity;
    }
}

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().status = Activity::Idle;
    }
}

/// 手眼标定测试服务
pub struct CalibrationTester {
    config: Arc<ServiceConfig>,
    detector: Arc<Detector>,
    orchestrator: PickOrchestrator,
    controller: ConvergenceController,
    shutdown: CancelToken,
    state: Mutex<SessionState>,
}

impl CalibrationTester {
    /// 创建服务（会先校验配置并补全默认值）
    pub fn new(rig: Rig, mut config: ServiceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let config = Arc::new(config);

        let detector = Arc::new(Detector::new(
            rig.sensor.clone(),
            rig.segmenter.clone(),
            config.segmentation.clone(),
        ));
        let controller = ConvergenceController::new(
            rig.planner.clone(),
            config.gripper.clone(),
            config.motion.clone(),
        );
        let orchestrator = PickOrchestrator::new(rig, detector.clone(), config.clone());

        info!(
            arm = %config.arm,
            camera = %config.camera,
            gripper = %config.gripper,
            detection_frame = config.detection_frame(),
            "Calibration tester created"
        );

        Ok(CalibrationTester {
            config,
            detector,
            orchestrator,
            controller,
            shutdown: CancelToken::new(),
            state: Mutex::new(SessionState::default()),
        })
    }

    /// 替换抓取步骤策略表
    pub fn with_policy(mut self, policy: StepPolicyTable) -> Self {
        // 实现了 Drop，字段不能移出
        self.orchestrator.set_policy(policy);
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn link(&self, cancel: &CancelToken) -> CancelToken {
        cancel.link(&self.shutdown)
    }

    /// 检测物体并记录为最近一次检测结果
    ///
    /// 失败时保留之前的检测结果。
    pub fn detect(&self, cancel: &CancelToken) -> Result<Vec<DetectedObject>, ServiceError> {
        let cancel = self.link(cancel);
        let _guard = ActivityGuard::enter(&self.state, Activity::Detecting);

        let objects = self.detector.detect(&cancel)?;
        self.state.lock().last_detection = Some(objects.clone());
        Ok(objects)
    }

    /// 重新检测后抓取第 `index` 个物体
    pub fn pick(&self, index: usize, cancel: &CancelToken) -> Result<PickResult, ServiceError> {
        let cancel = self.link(cancel);
        let guard = ActivityGuard::enter(&self.state, Activity::Detecting);

        let objects = self.detector.detect(&cancel)?;
        self.state.lock().last_detection = Some(objects.clone());
        let object = select(&objects, index)?;

        guard.transition(Activity::Picking);
        self.run_pick(&object, &cancel)
    }

    /// 抓取最近一次检测结果中的第 `index` 个物体
    pub fn pick_detected(
        &self,
        index: usize,
        cancel: &CancelToken,
    ) -> Result<PickResult, ServiceError> {
        let cancel = self.link(cancel);
        let objects = self
            .state
            .lock()
            .last_detection
            .clone()
            .ok_or(ServiceError::NoDetection)?;
        let object = select(&objects, index)?;

        let _guard = ActivityGuard::enter(&self.state, Activity::Picking);
        self.run_pick(&object, &cancel)
    }

    fn run_pick(
        &self,
        object: &DetectedObject,
        cancel: &CancelToken,
    ) -> Result<PickResult, ServiceError> {
        match self.orchestrator.pick(object, cancel) {
            Ok(result) => {
                self.state.lock().last_result = Some(result.clone());
                Ok(result)
            },
            Err(e) => {
                warn!(
                    error = %e,
                    completed = e.completed_steps().len(),
                    "Pick did not complete; last result unchanged"
                );
                Err(e.into())
            },
        }
    }

    /// 逐段移动夹爪到世界坐标系中的 `target`
    ///
    /// `step_size` 为 `None` 时使用配置的默认步长。
    pub fn move_to(
        &self,
        target: Vec3,
        step_size: Option<f64>,
        cancel: &CancelToken,
    ) -> Result<MoveResult, ServiceError> {
        let cancel = self.link(cancel);
        let step_size = step_size.unwrap_or(self.config.motion.default_step_size_mm);
        let _guard = ActivityGuard::enter(&self.state, Activity::Moving);

        info!(target = %target, step_size_mm = step_size, "Moving to target");
        Ok(self.controller.move_to(target, step_size, &cancel)?)
    }

    /// 当前状态快照
    pub fn status(&self) -> StatusSnapshot {
        let state = self.state.lock();
        StatusSnapshot {
            status: state.status,
            last_result: state.last_result.clone(),
            detected_objects: state.last_detection.as_ref().map(Vec::len),
        }
    }

    /// 关闭服务，取消所有进行中的操作
    pub fn close(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Closing calibration tester");
        }
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// 执行一条类型化命令
    pub fn dispatch(&self, command: Command, cancel: &CancelToken) -> Result<Response, ServiceError> {
        info!(command = command.name(), "Dispatching command");
        let response = match command {
            Command::Detect => Response::Detect(DetectResponse::new(&self.detect(cancel)?)),
            Command::Pick { object_index } => {
                Response::Pick(PickResponse::from(&self.pick(object_index, cancel)?))
            },
            Command::PickDetected { object_index } => {
                Response::Pick(PickResponse::from(&self.pick_detected(object_index, cancel)?))
            },
            Command::MoveTo { x, y, z, step_size } => Response::MoveTo(MoveResponse::from(
                &self.move_to(Vec3::new(x, y, z), step_size, cancel)?,
            )),
            Command::Status => {
                let snapshot = self.status();
                Response::Status(StatusResponse {
                    status: snapshot.status,
                    last_result: snapshot.last_result.as_ref().map(PickResponse::from),
                    detected_objects: snapshot.detected_objects,
                })
            },
        };
        Ok(response)
    }

    /// 执行一条 JSON 命令，返回 JSON 响应
    pub fn do_command(
        &self,
        command: serde_json::Value,
        cancel: &CancelToken,
    ) -> Result<serde_json::Value, ServiceError> {
        let command = Command::from_value(command)?;
        self.dispatch(command, cancel)?.to_value()
    }
}

impl Drop for CalibrationTester {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn select(objects: &[DetectedObject], index: usize) -> Result<DetectedObject, ServiceError> {
    objects
        .get(index)
        .copied()
        .ok_or(ServiceError::IndexOutOfRange {
            index,
            count: objects.len(),
        })
}
