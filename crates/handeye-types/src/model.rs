//! 检测、抓取与移动结果的数据模型

use crate::geometry::Vec3;
use std::fmt;

/// 检测到的候选物体（点云聚类）
///
/// 每次检测都会完整替换候选集合，物体之间没有跨检测的身份。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetectedObject {
    /// 聚类质心（毫米，检测坐标系）
    pub center: Vec3,
    /// 聚类点数（≥ 1）
    pub point_count: usize,
}

impl DetectedObject {
    pub fn new(center: Vec3, point_count: usize) -> Self {
        DetectedObject {
            center,
            point_count,
        }
    }
}

/// 偏移测量：逐轴差值 + 欧氏范数
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Offset {
    /// 逐轴差值（毫米）
    pub vector: Vec3,
    /// `sqrt(x² + y² + z²)`
    pub total: f64,
}

impl Offset {
    /// `measured - reference`
    pub fn between(measured: Vec3, reference: Vec3) -> Self {
        let vector = measured - reference;
        Offset {
            vector,
            total: vector.norm(),
        }
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.1}, {:.1}, {:.1})mm, total: {:.1}mm",
            self.vector.x, self.vector.y, self.vector.z, self.total
        )
    }
}

/// 抓取序列的步骤（固定顺序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PickStep {
    /// 打开夹爪
    OpenGripper,
    /// 计算接近位姿
    ComputeApproach,
    /// 移动到接近位姿
    Approach,
    /// 在接近位姿重新检测（测量接近偏移）
    ReDetect,
    /// 移动到抓取位置
    GraspPosition,
    /// 世界坐标系对比（测量世界坐标偏移）
    WorldFrameCompare,
    /// 闭合夹爪
    Grab,
    /// 抬起
    Lift,
    /// 验证是否夹持
    Verify,
}

impl PickStep {
    /// 全部步骤，按执行顺序
    pub const ALL: [PickStep; 9] = [
        PickStep::OpenGripper,
        PickStep::ComputeApproach,
        PickStep::Approach,
        PickStep::ReDetect,
        PickStep::GraspPosition,
        PickStep::WorldFrameCompare,
        PickStep::Grab,
        PickStep::Lift,
        PickStep::Verify,
    ];

    /// 稳定的步骤名称（用于 `steps_completed`）
    pub const fn name(self) -> &'static str {
        match self {
            PickStep::OpenGripper => "open_gripper",
            PickStep::ComputeApproach => "compute_approach",
            PickStep::Approach => "approach",
            PickStep::ReDetect => "re_detect",
            PickStep::GraspPosition => "grasp_position",
            PickStep::WorldFrameCompare => "world_frame_compare",
            PickStep::Grab => "grab",
            PickStep::Lift => "lift",
            PickStep::Verify => "verify",
        }
    }

    /// 在 `ALL` 中的序号
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for PickStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 一次抓取尝试的结果
///
/// 世界坐标系下的值用 `Option` 表示是否真正获取到；
/// 位于原点的物体（`Some(ZERO)`）和查询失败（`None`）是两种不同的情况。
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PickResult {
    /// 最终是否成功（仅由 `is_holding` 决定）
    pub success: bool,
    /// 夹爪是否夹持着物体
    pub is_holding: bool,
    /// 夹爪 grab 命令返回的信号（仅记录）
    pub grab_reported: bool,
    /// 首次检测到的位置（检测坐标系）
    pub detected_position: Vec3,
    /// 检测坐标系名称
    pub detection_frame: String,
    /// 物体在世界坐标系中的位置
    pub object_position_world_frame: Option<Vec3>,
    /// 抓取时夹爪在世界坐标系中的位置
    pub gripper_position_world_frame: Option<Vec3>,
    /// 接近偏移：重新检测的中心 - 原始中心
    pub approach_offset: Option<Offset>,
    /// 世界坐标偏移：夹爪位置 - 物体位置
    pub world_frame_offset: Option<Offset>,
    /// 已完成的步骤（只追加）
    pub steps_completed: Vec<PickStep>,
}

impl PickResult {
    /// 针对某个检测结果创建一个空的进行中结果
    pub fn started(object: &DetectedObject, detection_frame: impl Into<String>) -> Self {
        PickResult {
            success: false,
            is_holding: false,
            grab_reported: false,
            detected_position: object.center,
            detection_frame: detection_frame.into(),
            object_position_world_frame: None,
            gripper_position_world_frame: None,
            approach_offset: None,
            world_frame_offset: None,
            steps_completed: Vec::with_capacity(PickStep::ALL.len()),
        }
    }

    /// 已完成步骤的名称
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps_completed.iter().map(|s| s.name()).collect()
    }
}

/// 收敛移动的结果
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MoveResult {
    pub success: bool,
    /// 实际执行的移动次数
    pub steps: usize,
    /// 最后观测到的夹爪位置（世界坐标系）
    pub final_position: Vec3,
    /// 目标位置（世界坐标系）
    pub target: Vec3,
}

/// 服务当前活动
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Activity {
    #[default]
    Idle,
    Detecting,
    Picking,
    Moving,
}

impl Activity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Activity::Idle => "idle",
            Activity::Detecting => "detecting",
            Activity::Picking => "picking",
            Activity::Moving => "moving",
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
