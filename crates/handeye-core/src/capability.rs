//! 外部能力接口
//!
//! 核心只通过这些 trait 与相机、分割服务、夹爪、机械臂和运动规划服务交互，
//! 不关心具体的设备协议或算法实现。
//!
//! 所有方法都是同步调用并接收 [`CancelToken`]：实现方应在阻塞等待时观察令牌，
//! 令牌触发后尽快返回 [`CapabilityError::Cancelled`]。

use crate::cancel::CancelToken;
use crate::config::SegmentationConfig;
use crate::error::CapabilityError;
use handeye_types::{PointCloud, Pose, PoseInFrame};
use std::sync::Arc;

/// 深度传感器
pub trait Sensor: Send + Sync {
    /// 采集一帧点云（传感器坐标系，毫米）
    fn capture_cloud(&self, cancel: &CancelToken) -> Result<PointCloud, CapabilityError>;
}

/// 点云分割服务（平面分割 + 半径聚类）
pub trait Segmenter: Send + Sync {
    /// 检查分割参数是否自洽
    ///
    /// 默认使用 [`SegmentationConfig::check_valid`]，实现方可以追加自己的约束。
    fn validate(&self, config: &SegmentationConfig) -> Result<(), CapabilityError> {
        config
            .check_valid()
            .map_err(|e| CapabilityError::Config(e.to_string()))
    }

    /// 去除支撑平面后按半径聚类，返回每个簇的点云（与输入同一坐标系）
    fn segment(
        &self,
        cloud: &PointCloud,
        config: &SegmentationConfig,
        cancel: &CancelToken,
    ) -> Result<Vec<PointCloud>, CapabilityError>;
}

/// 夹爪
pub trait Gripper: Send + Sync {
    fn open(&self, cancel: &CancelToken) -> Result<(), CapabilityError>;

    /// 闭合夹爪，返回设备报告的抓取信号
    fn grab(&self, cancel: &CancelToken) -> Result<bool, CapabilityError>;

    /// 当前是否夹持着物体
    fn is_holding_something(&self, cancel: &CancelToken) -> Result<bool, CapabilityError>;
}

/// 机械臂（直接笛卡尔运动，不经过规划器）
pub trait Arm: Send + Sync {
    /// 末端位姿（机械臂基坐标系）
    fn end_position(&self, cancel: &CancelToken) -> Result<Pose, CapabilityError>;

    /// 直接移动到目标位姿（机械臂基坐标系）
    fn move_to_position(&self, pose: Pose, cancel: &CancelToken) -> Result<(), CapabilityError>;
}

/// 运动规划服务（带避障，跨坐标系）
pub trait MotionPlanner: Send + Sync {
    /// 把组件移动到目标位姿
    ///
    /// `Ok(false)` 表示规划器找不到可行路径。
    fn move_component(
        &self,
        component: &str,
        destination: &PoseInFrame,
        cancel: &CancelToken,
    ) -> Result<bool, CapabilityError>;

    /// 查询 `component` 在 `reference_frame` 中的位姿
    fn get_pose(
        &self,
        component: &str,
        reference_frame: &str,
        cancel: &CancelToken,
    ) -> Result<Pose, CapabilityError>;
}

/// 一组外部能力句柄
#[derive(Clone)]
pub struct Rig {
    pub sensor: Arc<dyn Sensor>,
    pub segmenter: Arc<dyn Segmenter>,
    pub gripper: Arc<dyn Gripper>,
    pub arm: Arc<dyn Arm>,
    pub planner: Arc<dyn MotionPlanner>,
}

impl Rig {
    pub fn new(
        sensor: Arc<dyn Sensor>,
        segmenter: Arc<dyn Segmenter>,
        gripper: Arc<dyn Gripper>,
        arm: Arc<dyn Arm>,
        planner: Arc<dyn MotionPlanner>,
    ) -> Self {
        Rig {
            sensor,
            segmenter,
            gripper,
            arm,
            planner,
        }
    }
}

impl std::fmt::Debug for Rig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rig").finish_non_exhaustive()
    }
}
