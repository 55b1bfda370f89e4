//! 服务配置
//!
//! 配置以 TOML 描述，所有字段都有默认值（组件名称除外）：
//!
//! ```toml
//! arm = "arm"
//! camera = "wrist-cam"
//! gripper = "gripper"
//! approach_offset_mm = 80.0
//!
//! [segmentation]
//! min_pts_in_segment = 200
//! max_depth_mm = 600.0
//!
//! [motion]
//! max_steps = 100
//! ```
//!
//! [`ServiceConfig::validate`] 会把取值为 0 的数值字段替换为默认值，
//! 因此省略字段与显式写 0 的效果相同。

use crate::error::ConfigError;
use handeye_types::{Vec3, WORLD_FRAME};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 默认接近距离（毫米）
pub const DEFAULT_APPROACH_OFFSET_MM: f64 = 100.0;
/// 默认抬起高度（毫米）
pub const DEFAULT_LIFT_HEIGHT_MM: f64 = 50.0;

/// 抓取/抬起阶段的移动方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraspMotion {
    /// 把检测坐标系中的位移换算到机械臂坐标系后直接笛卡尔移动（不避障）
    #[default]
    Direct,
    /// 交给运动规划服务
    Planned,
}

/// 服务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// 机械臂组件名称（必填）
    pub arm: String,
    /// 相机组件名称（必填）
    pub camera: String,
    /// 夹爪组件名称（必填）
    pub gripper: String,
    /// 检测结果所在坐标系，空字符串表示相机坐标系
    ///
    /// 经过裁剪/配准、直接输出世界坐标的传感器使用 `"world"`。
    pub detection_frame: String,
    /// 接近位姿与物体之间的距离（毫米）
    pub approach_offset_mm: f64,
    /// 抓取深度调整（毫米，正值更深）
    pub grasp_depth_offset_mm: f64,
    /// 抓取后抬起的高度（毫米）
    pub lift_height_mm: f64,
    /// 检测坐标系中"远离支撑面"的方向；`None` 时根据检测坐标系推断
    pub approach_axis: Option<[f64; 3]>,
    /// 抓取/抬起的移动方式
    pub grasp_motion: GraspMotion,
    pub segmentation: SegmentationConfig,
    pub motion: MotionConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            arm: String::new(),
            camera: String::new(),
            gripper: String::new(),
            detection_frame: String::new(),
            approach_offset_mm: DEFAULT_APPROACH_OFFSET_MM,
            grasp_depth_offset_mm: 0.0,
            lift_height_mm: DEFAULT_LIFT_HEIGHT_MM,
            approach_axis: None,
            grasp_motion: GraspMotion::default(),
            segmentation: SegmentationConfig::default(),
            motion: MotionConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// 指定组件名称，其余取默认值
    pub fn new(arm: impl Into<String>, camera: impl Into<String>, gripper: impl Into<String>) -> Self {
        ServiceConfig {
            arm: arm.into(),
            camera: camera.into(),
            gripper: gripper.into(),
            ..Default::default()
        }
    }

    /// 解析 TOML 并校验
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let mut cfg: ServiceConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// 从文件加载
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// 校验必填字段并补全默认值
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.arm.is_empty() {
            return Err(ConfigError::MissingField("arm"));
        }
        if self.camera.is_empty() {
            return Err(ConfigError::MissingField("camera"));
        }
        if self.gripper.is_empty() {
            return Err(ConfigError::MissingField("gripper"));
        }

        if self.approach_offset_mm == 0.0 {
            self.approach_offset_mm = DEFAULT_APPROACH_OFFSET_MM;
        }
        if self.lift_height_mm == 0.0 {
            self.lift_height_mm = DEFAULT_LIFT_HEIGHT_MM;
        }
        for (field, value) in [
            ("approach_offset_mm", self.approach_offset_mm),
            ("grasp_depth_offset_mm", self.grasp_depth_offset_mm),
            ("lift_height_mm", self.lift_height_mm),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::invalid(field, "must be finite"));
            }
        }

        if let Some(axis) = self.approach_axis {
            let v = Vec3::from(axis);
            if !v.is_finite() || v.norm() < 1e-9 {
                return Err(ConfigError::invalid(
                    "approach_axis",
                    "must be a finite non-zero vector",
                ));
            }
        }

        self.segmentation.fill_defaults();
        self.segmentation.check_valid()?;
        self.motion.validate()?;
        Ok(())
    }

    /// 检测结果所在坐标系名称
    pub fn detection_frame(&self) -> &str {
        if self.detection_frame.is_empty() {
            &self.camera
        } else {
            &self.detection_frame
        }
    }

    /// 检测坐标系是否就是世界坐标系
    pub fn detects_in_world(&self) -> bool {
        self.detection_frame() == WORLD_FRAME
    }

    /// 检测坐标系中远离支撑面的单位向量
    ///
    /// 未配置时：相机坐标系取 `(0, 0, -1)`（朝向相机），世界坐标系取 `(0, 0, 1)`（向上）。
    pub fn approach_axis(&self) -> Vec3 {
        match self.approach_axis {
            Some(axis) => Vec3::from(axis).normalize(),
            None if self.detects_in_world() => Vec3::new(0.0, 0.0, 1.0),
            None => Vec3::new(0.0, 0.0, -1.0),
        }
    }
}

/// 平面分割与聚类参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// 识别支撑平面所需的最少点数
    pub min_pts_in_plane: usize,
    /// 属于平面的最大距离（毫米）
    pub max_dist_from_plane_mm: f64,
    /// 支撑平面法向量
    pub ground_normal: [f64; 3],
    /// 法向量匹配的角度容差（度）
    pub angle_tolerance_deg: f64,
    /// 每个物体簇的最少点数
    pub min_pts_in_segment: usize,
    /// 聚类半径（毫米）
    pub clustering_radius_mm: f64,
    /// 噪声滤波的 mean-k
    pub mean_k_filtering: usize,
    /// 最大深度（毫米，0 = 不限制）
    pub max_depth_mm: f64,
    /// 每个簇的最大点数（0 = 不限制）
    pub max_point_count: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        SegmentationConfig {
            min_pts_in_plane: 1500,
            max_dist_from_plane_mm: 5.0,
            ground_normal: [0.0, 0.0, 1.0],
            angle_tolerance_deg: 20.0,
            min_pts_in_segment: 100,
            clustering_radius_mm: 5.0,
            mean_k_filtering: 50,
            max_depth_mm: 0.0,
            max_point_count: 0,
        }
    }
}

impl SegmentationConfig {
    fn fill_defaults(&mut self) {
        let d = SegmentationConfig::default();
        if self.min_pts_in_plane == 0 {
            self.min_pts_in_plane = d.min_pts_in_plane;
        }
        if self.max_dist_from_plane_mm == 0.0 {
            self.max_dist_from_plane_mm = d.max_dist_from_plane_mm;
        }
        if self.ground_normal == [0.0; 3] {
            self.ground_normal = d.ground_normal;
        }
        if self.angle_tolerance_deg == 0.0 {
            self.angle_tolerance_deg = d.angle_tolerance_deg;
        }
        if self.min_pts_in_segment == 0 {
            self.min_pts_in_segment = d.min_pts_in_segment;
        }
        if self.clustering_radius_mm == 0.0 {
            self.clustering_radius_mm = d.clustering_radius_mm;
        }
        if self.mean_k_filtering == 0 {
            self.mean_k_filtering = d.mean_k_filtering;
        }
    }

    /// 参数一致性检查（不补默认值）
    pub fn check_valid(&self) -> Result<(), ConfigError> {
        if self.min_pts_in_plane < 1 {
            return Err(ConfigError::invalid("min_pts_in_plane", "must be at least 1"));
        }
        if self.min_pts_in_segment < 1 {
            return Err(ConfigError::invalid("min_pts_in_segment", "must be at least 1"));
        }
        if !(self.max_dist_from_plane_mm > 0.0 && self.max_dist_from_plane_mm.is_finite()) {
            return Err(ConfigError::invalid(
                "max_dist_from_plane_mm",
                format!("must be positive, got {}", self.max_dist_from_plane_mm),
            ));
        }
        if !(self.clustering_radius_mm > 0.0 && self.clustering_radius_mm.is_finite()) {
            return Err(ConfigError::invalid(
                "clustering_radius_mm",
                format!("must be positive, got {}", self.clustering_radius_mm),
            ));
        }
        let normal = self.ground_normal();
        if !normal.is_finite() || normal.norm() < 1e-9 {
            return Err(ConfigError::invalid("ground_normal", "must be a non-zero vector"));
        }
        if !(self.angle_tolerance_deg > 0.0 && self.angle_tolerance_deg <= 180.0) {
            return Err(ConfigError::invalid(
                "angle_tolerance_deg",
                format!("must be in (0, 180], got {}", self.angle_tolerance_deg),
            ));
        }
        if self.max_depth_mm < 0.0 || self.max_depth_mm.is_nan() {
            return Err(ConfigError::invalid("max_depth_mm", "must not be negative"));
        }
        Ok(())
    }

    pub fn ground_normal(&self) -> Vec3 {
        Vec3::from(self.ground_normal)
    }
}

/// 收敛移动参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// 最大移动次数
    pub max_steps: usize,
    /// 到达判定距离（毫米）
    pub tolerance_mm: f64,
    /// `move_to` 未指定步长时使用的步长（毫米）
    pub default_step_size_mm: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        MotionConfig {
            max_steps: 200,
            tolerance_mm: 1.0,
            default_step_size_mm: 20.0,
        }
    }
}

impl MotionConfig {
    fn validate(&mut self) -> Result<(), ConfigError> {
        let d = MotionConfig::default();
        if self.max_steps == 0 {
            self.max_steps = d.max_steps;
        }
        if self.tolerance_mm == 0.0 {
            self.tolerance_mm = d.tolerance_mm;
        }
        if self.default_step_size_mm == 0.0 {
            self.default_step_size_mm = d.default_step_size_mm;
        }
        if !(self.tolerance_mm > 0.0 && self.tolerance_mm.is_finite()) {
            return Err(ConfigError::invalid("tolerance_mm", "must be positive"));
        }
        if !(self.default_step_size_mm > 0.0 && self.default_step_size_mm.is_finite()) {
            return Err(ConfigError::invalid("default_step_size_mm", "must be positive"));
        }
        Ok(())
    }
}
