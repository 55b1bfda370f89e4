//! # Hand-eye Core - 手眼标定验证编排
//!
//! 用"检测 -> 接近 -> 抓取 -> 验证"的完整流程检验机器人手眼标定：
//! 深度相机定位物体，机械臂按标定结果去抓，测量实际与预测之间的偏差。
//!
//! ## 模块
//!
//! - [`capability`] - 外部能力接口（相机、分割、夹爪、机械臂、运动规划）
//! - [`detection`] - 点云 -> 候选物体
//! - [`pick`] - 九步抓取序列（致命/建议步骤策略表）
//! - [`convergence`] - 分段重规划的收敛移动
//! - [`service`] - 会话状态与命令分发
//! - [`command`] - JSON 命令与响应
//! - [`sim`] - 仿真测试台（feature `sim`）
//!
//! ## 示例
//!
//! ```rust,no_run
//! use handeye_core::{CalibrationTester, CancelToken, Rig, ServiceConfig};
//!
//! # fn rig() -> Rig { unimplemented!() }
//! let config = ServiceConfig::from_toml_str(r#"
//!     arm = "arm"
//!     camera = "wrist-cam"
//!     gripper = "gripper"
//! "#)?;
//! let tester = CalibrationTester::new(rig(), config)?;
//!
//! let result = tester.pick(0, &CancelToken::new())?;
//! println!("success: {}, offset: {:?}", result.success, result.world_frame_offset);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cancel;
pub mod capability;
pub mod command;
pub mod config;
pub mod convergence;
pub mod detection;
pub mod error;
pub mod pick;
pub mod service;
#[cfg(feature = "sim")]
pub mod sim;

pub use cancel::{CancelToken, Cancelled};
pub use capability::{Arm, Gripper, MotionPlanner, Rig, Segmenter, Sensor};
pub use command::{Command, Response};
pub use config::{GraspMotion, MotionConfig, SegmentationConfig, ServiceConfig};
pub use convergence::ConvergenceController;
pub use detection::Detector;
pub use error::{
    CapabilityError, ConfigError, DetectionError, ErrorKind, MotionError, PickError,
    ServiceError, StepFailure,
};
pub use pick::{PickOrchestrator, StepPolicy, StepPolicyTable};
pub use service::{CalibrationTester, StatusSnapshot};

// 重新导出数据类型
pub use handeye_types::{
    Activity, DetectedObject, MoveResult, Offset, Orientation, PickResult, PickStep, PointCloud,
    Pose, PoseInFrame, Vec3, WORLD_FRAME,
};
