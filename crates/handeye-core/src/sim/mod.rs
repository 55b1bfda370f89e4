//! 仿真测试台
//!
//! 一个固定安装（eye-to-hand）相机的场景，实现全部外部能力，用于空跑和测试：
//!
//! - 相机有**真实**位姿和**标定**位姿：传感器按真实位姿成像，
//!   规划器按标定位姿解析坐标系，两者之差就是要测量的标定误差
//! - 物体渲染为以中心对称的点簇（质心即物体中心）
//! - 分割器做朴素的欧氏聚类（测试替身，不是产品的分割算法）
//! - 规划器可以截断每次移动的行程（模拟被障碍推开），拒绝进入 `blocked` 区域
//! - 夹爪在真实位置距离物体中心不超过 `grasp_tolerance_mm` 时判定夹住
//! - [`SimFaults`] 可以让指定调用失败
//!
//! # 示例
//!
//! ```rust
//! use handeye_core::sim::{SimConfig, SimRig};
//! use handeye_core::{CalibrationTester, CancelToken, ServiceConfig};
//!
//! let config = ServiceConfig::new("arm", "camera", "gripper");
//! let sim = SimRig::for_service(SimConfig::default(), &config);
//! let tester = CalibrationTester::new(sim.rig(), config).unwrap();
//!
//! let objects = tester.detect(&CancelToken::new()).unwrap();
//! assert_eq!(objects.len(), 1);
//! assert_eq!(objects[0].point_count, 342);
//! ```

mod devices;
mod scene;

pub use scene::{cluster_points, render_cluster};

use crate::capability::Rig;
use crate::config::ServiceConfig;
use crate::error::ConfigError;
use handeye_types::{Orientation, Pose, Vec3};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 以位置 + RPY 描述的位姿
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimPose {
    pub position_mm: [f64; 3],
    /// 欧拉角（度）
    pub rpy_deg: [f64; 3],
}

impl SimPose {
    pub fn new(position_mm: [f64; 3], rpy_deg: [f64; 3]) -> Self {
        SimPose {
            position_mm,
            rpy_deg,
        }
    }

    /// 朝下（绕 X 轴翻转 180°）
    pub fn facing_down(position_mm: [f64; 3]) -> Self {
        SimPose::new(position_mm, [180.0, 0.0, 0.0])
    }

    pub fn to_pose(&self) -> Pose {
        let [r, p, y] = self.rpy_deg.map(f64::to_radians);
        Pose::new(Vec3::from(self.position_mm), Orientation::from_euler(r, p, y))
    }
}

/// 场景中的物体
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimObject {
    /// 世界坐标系中的中心
    pub center_mm: [f64; 3],
    /// 渲染的点数
    pub point_count: usize,
}

/// 规划器拒绝进入的轴对齐区域（世界坐标系）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockedRegion {
    pub min_mm: [f64; 3],
    pub max_mm: [f64; 3],
}

impl BlockedRegion {
    pub fn contains(&self, p: Vec3) -> bool {
        let [x0, y0, z0] = self.min_mm;
        let [x1, y1, z1] = self.max_mm;
        (x0..=x1).contains(&p.x) && (y0..=y1).contains(&p.y) && (z0..=z1).contains(&p.z)
    }
}

/// 故障注入
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimFaults {
    /// 采集点云失败
    pub capture_fails: bool,
    /// 第 N 次之后的采集返回空点云
    pub capture_empty_after: Option<usize>,
    /// 分割失败
    pub segment_fails: bool,
    pub open_fails: bool,
    pub grab_fails: bool,
    /// `is_holding_something` 查询失败
    pub holding_query_fails: bool,
    /// `end_position` 查询失败
    pub arm_query_fails: bool,
    /// 成功直接移动 N 次之后的笛卡尔移动失败（`Some(0)` 表示每次都失败）
    pub arm_move_fails_after: Option<usize>,
    /// 所有 `get_pose` 查询失败
    pub pose_query_fails: bool,
    /// 涉及相机坐标系的 `get_pose` 查询失败
    pub camera_pose_query_fails: bool,
    /// 规划器报错
    pub plan_fails: bool,
    /// 规划器总是返回无路径
    pub planner_no_path: bool,
    /// 成功规划 N 次之后返回无路径
    pub no_path_after_moves: Option<usize>,
}

/// 仿真场景配置（TOML 中的 `[sim]` 表）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// 相机真实位姿（世界坐标系）
    pub camera_pose: SimPose,
    /// 标定得到的相机位姿；`None` 表示标定完全准确
    pub calibrated_camera_pose: Option<SimPose>,
    /// 机械臂基座位姿（世界坐标系）
    pub arm_base: SimPose,
    /// 夹爪初始位姿（世界坐标系）
    pub gripper_start: SimPose,
    pub objects: Vec<SimObject>,
    /// 渲染点间距（毫米），应小于分割的聚类半径
    pub point_spacing_mm: f64,
    pub grasp_tolerance_mm: f64,
    /// 每次规划移动的最大行程（毫米，0 = 不限制）
    pub max_travel_per_move_mm: f64,
    pub blocked: Vec<BlockedRegion>,
    /// 每次移动耗时（毫秒），期间可被取消
    pub move_duration_ms: u64,
    pub faults: SimFaults,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            camera_pose: SimPose::facing_down([0.0, 0.0, 800.0]),
            calibrated_camera_pose: None,
            arm_base: SimPose::default(),
            gripper_start: SimPose::facing_down([300.0, 0.0, 400.0]),
            objects: vec![SimObject {
                center_mm: [0.0, 0.0, 20.0],
                point_count: 342,
            }],
            point_spacing_mm: 2.5,
            grasp_tolerance_mm: 10.0,
            max_travel_per_move_mm: 0.0,
            blocked: Vec::new(),
            move_duration_ms: 0,
            faults: SimFaults::default(),
        }
    }
}

impl SimConfig {
    /// 从完整配置文件中读取 `[sim]` 表（缺省时使用默认场景）
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        struct Document {
            #[serde(default)]
            sim: SimConfig,
        }
        let doc: Document = toml::from_str(s)?;
        doc.sim.check_valid()?;
        Ok(doc.sim)
    }

    pub fn check_valid(&self) -> Result<(), ConfigError> {
        if !(self.point_spacing_mm > 0.0 && self.point_spacing_mm.is_finite()) {
            return Err(ConfigError::invalid("sim.point_spacing_mm", "must be positive"));
        }
        if self.grasp_tolerance_mm < 0.0 || self.grasp_tolerance_mm.is_nan() {
            return Err(ConfigError::invalid("sim.grasp_tolerance_mm", "must not be negative"));
        }
        if self.max_travel_per_move_mm < 0.0 || self.max_travel_per_move_mm.is_nan() {
            return Err(ConfigError::invalid(
                "sim.max_travel_per_move_mm",
                "must not be negative",
            ));
        }
        if self.objects.iter().any(|o| o.point_count == 0) {
            return Err(ConfigError::invalid("sim.objects", "point_count must be at least 1"));
        }
        Ok(())
    }
}

/// 组件/坐标系名称
#[derive(Debug, Clone)]
struct FrameNames {
    arm: String,
    camera: String,
    gripper: String,
}

#[derive(Debug)]
struct SimState {
    gripper: Pose,
    /// 物体真实中心（世界坐标系）
    objects: Vec<Vec3>,
    holding: Option<usize>,
    faults: SimFaults,
    captures: usize,
    planned_moves: usize,
    arm_moves: usize,
}

/// 仿真测试台
#[derive(Debug)]
pub struct SimRig {
    names: FrameNames,
    camera_true: Pose,
    camera_calibrated: Pose,
    arm_base: Pose,
    point_spacing_mm: f64,
    point_counts: Vec<usize>,
    grasp_tolerance_mm: f64,
    max_travel_per_move_mm: f64,
    blocked: Vec<BlockedRegion>,
    move_duration_ms: u64,
    /// 传感器输出已配准到世界坐标系的点云
    points_in_world: bool,
    state: Mutex<SimState>,
}

impl SimRig {
    pub fn new(
        config: SimConfig,
        arm: impl Into<String>,
        camera: impl Into<String>,
        gripper: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(SimRig::build(
            config,
            FrameNames {
                arm: arm.into(),
                camera: camera.into(),
                gripper: gripper.into(),
            },
            false,
        ))
    }

    /// 使用服务配置中的组件名称；`detection_frame = "world"` 时传感器输出世界坐标
    pub fn for_service(config: SimConfig, service: &ServiceConfig) -> Arc<Self> {
        let names = FrameNames {
            arm: service.arm.clone(),
            camera: service.camera.clone(),
            gripper: service.gripper.clone(),
        };
        Arc::new(SimRig::build(config, names, service.detects_in_world()))
    }

    fn build(config: SimConfig, names: FrameNames, points_in_world: bool) -> Self {
        let camera_true = config.camera_pose.to_pose();
        let camera_calibrated = config
            .calibrated_camera_pose
            .map_or(camera_true, |p| p.to_pose());
        SimRig {
            names,
            camera_true,
            camera_calibrated,
            arm_base: config.arm_base.to_pose(),
            point_spacing_mm: config.point_spacing_mm,
            point_counts: config.objects.iter().map(|o| o.point_count).collect(),
            grasp_tolerance_mm: config.grasp_tolerance_mm,
            max_travel_per_move_mm: config.max_travel_per_move_mm,
            blocked: config.blocked,
            move_duration_ms: config.move_duration_ms,
            points_in_world,
            state: Mutex::new(SimState {
                gripper: config.gripper_start.to_pose(),
                objects: config
                    .objects
                    .iter()
                    .map(|o| Vec3::from(o.center_mm))
                    .collect(),
                holding: None,
                faults: config.faults,
                captures: 0,
                planned_moves: 0,
                arm_moves: 0,
            }),
        }
    }

    /// 所有能力都由同一个仿真实例提供
    pub fn rig(self: &Arc<Self>) -> Rig {
        Rig::new(
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
        )
    }

    pub fn set_faults(&self, faults: SimFaults) {
        self.state.lock().faults = faults;
    }

    pub fn faults(&self) -> SimFaults {
        self.state.lock().faults.clone()
    }

    /// 夹爪真实位姿（世界坐标系）
    pub fn gripper_pose(&self) -> Pose {
        self.state.lock().gripper
    }

    /// 物体真实中心（世界坐标系）
    pub fn object_position(&self, index: usize) -> Option<Vec3> {
        self.state.lock().objects.get(index).copied()
    }

    pub fn holding(&self) -> Option<usize> {
        self.state.lock().holding
    }

    /// 规划器执行过的移动次数
    pub fn planned_moves(&self) -> usize {
        self.state.lock().planned_moves
    }

    /// 直接笛卡尔移动次数
    pub fn arm_moves(&self) -> usize {
        self.state.lock().arm_moves
    }

    pub fn captures(&self) -> usize {
        self.state.lock().captures
    }

    /// 规划器解析坐标系使用的位姿（相机取标定位姿）
    fn frame_in_world(&self, state: &SimState, frame: &str) -> Option<Pose> {
        if frame == handeye_types::WORLD_FRAME {
            Some(Pose::default())
        } else if frame == self.names.gripper {
            Some(state.gripper)
        } else if frame == self.names.camera {
            Some(self.camera_calibrated)
        } else if frame == self.names.arm {
            Some(self.arm_base)
        } else {
            None
        }
    }
}
