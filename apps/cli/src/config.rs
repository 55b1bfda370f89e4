//! 配置加载
//!
//! 一个 TOML 文件同时描述服务配置（顶层字段）和仿真场景（`[sim]` 表），
//! 命令行参数覆盖文件中的值。

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use handeye_core::sim::SimConfig;
use handeye_core::{GraspMotion, ServiceConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 默认配置文件路径：`<config_dir>/handeye/config.toml`
pub fn default_config_file() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("handeye");
    path.push("config.toml");
    Ok(path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MotionArg {
    Direct,
    Planned,
}

impl From<MotionArg> for GraspMotion {
    fn from(m: MotionArg) -> Self {
        match m {
            MotionArg::Direct => GraspMotion::Direct,
            MotionArg::Planned => GraspMotion::Planned,
        }
    }
}

/// 配置相关的全局参数
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// 配置文件路径（缺省为 <config_dir>/handeye/config.toml，不存在时使用默认值）
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// 机械臂组件名称
    #[arg(long, global = true)]
    pub arm: Option<String>,

    /// 相机组件名称
    #[arg(long, global = true)]
    pub camera: Option<String>,

    /// 夹爪组件名称
    #[arg(long, global = true)]
    pub gripper: Option<String>,

    /// 检测坐标系（"world" 或相机名称）
    #[arg(long, global = true)]
    pub detection_frame: Option<String>,

    /// 接近距离（毫米）
    #[arg(long, global = true)]
    pub approach_offset: Option<f64>,

    /// 抓取深度调整（毫米）
    #[arg(long, global = true)]
    pub grasp_offset: Option<f64>,

    /// 抬起高度（毫米）
    #[arg(long, global = true)]
    pub lift_height: Option<f64>,

    /// 抓取/抬起的移动方式
    #[arg(long, value_enum, global = true)]
    pub grasp_motion: Option<MotionArg>,

    /// 每个物体的最少点数
    #[arg(long, global = true)]
    pub min_pts: Option<usize>,

    /// 每个物体的最多点数（0 = 不限制）
    #[arg(long, global = true)]
    pub max_pts: Option<usize>,

    /// 最大深度（毫米，0 = 不限制）
    #[arg(long, global = true)]
    pub max_depth: Option<f64>,

    /// 聚类半径（毫米）
    #[arg(long, global = true)]
    pub clustering_radius: Option<f64>,
}

/// 加载后的完整配置
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub service: ServiceConfig,
    pub sim: SimConfig,
    /// 实际读取的文件（使用默认值时为 `None`）
    pub source: Option<PathBuf>,
}

impl ConfigArgs {
    /// 读取配置文件并应用命令行覆盖
    ///
    /// 显式指定的文件必须存在；默认路径下没有文件时使用内置默认场景。
    pub fn load(&self) -> Result<LoadedConfig> {
        let path = match &self.config {
            Some(path) => Some(path.clone()),
            None => Some(default_config_file()?).filter(|p| p.exists()),
        };

        let mut loaded = match path {
            Some(path) => {
                let (service, sim) = parse_file(&path)?;
                LoadedConfig {
                    service,
                    sim,
                    source: Some(path),
                }
            },
            None => LoadedConfig {
                service: ServiceConfig::new("arm", "camera", "gripper"),
                sim: SimConfig::default(),
                source: None,
            },
        };
        self.apply(&mut loaded.service);
        debug!(source = ?loaded.source, "Configuration loaded");
        Ok(loaded)
    }

    fn apply(&self, config: &mut ServiceConfig) {
        if let Some(arm) = &self.arm {
            config.arm = arm.clone();
        }
        if let Some(camera) = &self.camera {
            config.camera = camera.clone();
        }
        if let Some(gripper) = &self.gripper {
            config.gripper = gripper.clone();
        }
        if let Some(frame) = &self.detection_frame {
            config.detection_frame = frame.clone();
        }
        if let Some(v) = self.approach_offset {
            config.approach_offset_mm = v;
        }
        if let Some(v) = self.grasp_offset {
            config.grasp_depth_offset_mm = v;
        }
        if let Some(v) = self.lift_height {
            config.lift_height_mm = v;
        }
        if let Some(m) = self.grasp_motion {
            config.grasp_motion = m.into();
        }

        let seg = &mut config.segmentation;
        if let Some(v) = self.min_pts {
            seg.min_pts_in_segment = v;
        }
        if let Some(v) = self.max_pts {
            seg.max_point_count = v;
        }
        if let Some(v) = self.max_depth {
            seg.max_depth_mm = v;
        }
        if let Some(v) = self.clustering_radius {
            seg.clustering_radius_mm = v;
        }
    }
}

/// 解析配置文件（校验留给服务创建时进行，以便先应用命令行覆盖）
fn parse_file(path: &Path) -> Result<(ServiceConfig, SimConfig)> {
    let content =
        fs::read_to_string(path).with_context(|| format!("读取配置文件失败: {}", path.display()))?;
    let service: ServiceConfig =
        toml::from_str(&content).with_context(|| format!("解析配置文件失败: {}", path.display()))?;
    let sim = SimConfig::from_toml_str(&content)
        .with_context(|| format!("解析 [sim] 场景失败: {}", path.display()))?;
    Ok((service, sim))
}
