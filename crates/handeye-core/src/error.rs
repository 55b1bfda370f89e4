//! 错误类型体系
//!
//! 按来源分层：
//! - [`CapabilityError`]: 外部能力（相机、分割、夹爪、机械臂、运动规划）返回的错误
//! - [`DetectionError`] / [`PickError`] / [`MotionError`]: 各流程的错误
//! - [`ServiceError`]: 服务层（命令分发）错误，汇总以上所有错误
//!
//! 核心内**不做任何自动重试**：物理运动失败通常意味着未知障碍或硬件问题，
//! 需要操作员介入。

use crate::cancel::Cancelled;
use handeye_types::PickStep;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 配置无效（调用方必须修正配置）
    Config,
    /// 传感器采集失败
    Io,
    /// 位姿/状态查询失败
    Query,
    /// 夹爪或机械臂执行失败
    Actuation,
    /// 规划失败（无路径）
    Planning,
    /// 物体索引超出检测数量
    Range,
    /// 状态不满足（如尚未检测）
    State,
    /// 迭代次数用尽
    Exhausted,
    /// 已取消
    Cancelled,
    /// 命令格式错误
    InvalidCommand,
}

impl ErrorKind {
    /// 稳定的分类名称（用于结构化输出）
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
            ErrorKind::Query => "query",
            ErrorKind::Actuation => "actuation",
            ErrorKind::Planning => "planning",
            ErrorKind::Range => "range",
            ErrorKind::State => "state",
            ErrorKind::Exhausted => "exhausted",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::InvalidCommand => "invalid_command",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 外部能力错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapabilityError {
    /// 传感器 I/O 错误
    #[error("I/O error: {0}")]
    Io(String),

    /// 查询失败
    #[error("Query failed: {0}")]
    Query(String),

    /// 执行失败
    #[error("Actuation failed: {0}")]
    Actuation(String),

    /// 规划器内部错误
    #[error("Planning failed: {0}")]
    Planning(String),

    /// 能力配置无效
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// 数据处理失败
    #[error("Processing failed: {0}")]
    Processing(String),

    /// 调用被取消
    #[error("Operation cancelled")]
    Cancelled,
}

impl CapabilityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::Processing(_) => ErrorKind::Io,
            Self::Query(_) => ErrorKind::Query,
            Self::Actuation(_) => ErrorKind::Actuation,
            Self::Planning(_) => ErrorKind::Planning,
            Self::Config(_) => ErrorKind::Config,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<Cancelled> for CapabilityError {
    fn from(_: Cancelled) -> Self {
        CapabilityError::Cancelled
    }
}

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 缺少必填字段
    #[error("{0} is required")]
    MissingField(&'static str),

    /// 字段取值无效
    #[error("Invalid parameter '{field}': {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },

    /// TOML 解析失败
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// 读取配置文件失败
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// 检测流程错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    /// 分割参数自相矛盾
    #[error("invalid segmentation config: {0}")]
    InvalidConfig(String),

    /// 点云采集失败
    #[error("point cloud acquisition failed: {0}")]
    Acquisition(#[source] CapabilityError),

    /// 分割失败
    #[error("segmentation failed: {0}")]
    Segmentation(#[source] CapabilityError),

    /// 已取消
    #[error("detection cancelled")]
    Cancelled,
}

impl DetectionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) => ErrorKind::Config,
            Self::Acquisition(e) | Self::Segmentation(e) => match e.kind() {
                ErrorKind::Cancelled => ErrorKind::Cancelled,
                ErrorKind::Config => ErrorKind::Config,
                _ => ErrorKind::Io,
            },
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<Cancelled> for DetectionError {
    fn from(_: Cancelled) -> Self {
        DetectionError::Cancelled
    }
}

/// 单个抓取步骤失败的原因
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepFailure {
    /// 外部能力报错
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// 规划器报告无可行路径
    #[error("motion planner could not find a path")]
    NoPath,

    /// 重新检测失败
    #[error(transparent)]
    Detection(#[from] DetectionError),

    /// 重新检测没有发现物体
    #[error("no objects detected")]
    NoObjects,

    /// 缺少测量值（依赖的位姿未获取到）
    #[error("{0} unavailable")]
    Missing(&'static str),
}

impl StepFailure {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Capability(e) => e.kind(),
            Self::NoPath => ErrorKind::Planning,
            Self::Detection(e) => e.kind(),
            Self::NoObjects => ErrorKind::Io,
            Self::Missing(_) => ErrorKind::Query,
        }
    }

    /// 是否由取消引起
    pub fn is_cancellation(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}

/// 抓取流程错误
///
/// 致命步骤失败时不产生 `PickResult`，但已完成的步骤会随错误返回。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PickError {
    /// 致命步骤失败，序列中止
    #[error("pick aborted at step '{step}': {source}")]
    Aborted {
        /// 失败的步骤
        step: PickStep,
        /// 失败前已完成的步骤
        completed: Vec<PickStep>,
        #[source]
        source: StepFailure,
    },

    /// 序列被取消
    #[error("pick cancelled after {} completed steps", completed.len())]
    Cancelled { completed: Vec<PickStep> },
}

impl PickError {
    /// 中止前已完成的步骤
    pub fn completed_steps(&self) -> &[PickStep] {
        match self {
            Self::Aborted { completed, .. } | Self::Cancelled { completed } => completed,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Aborted { source, .. } => source.kind(),
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }
}

/// 收敛移动错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    /// 步长无效
    #[error("step size must be a positive finite number, got {0}")]
    InvalidStepSize(f64),

    /// 查询夹爪位姿失败
    #[error("step {step}: failed to get gripper pose: {source}")]
    PoseQuery {
        step: usize,
        #[source]
        source: CapabilityError,
    },

    /// 移动命令失败
    #[error("step {step}: move failed: {source}")]
    Move {
        step: usize,
        #[source]
        source: CapabilityError,
    },

    /// 规划器找不到路径
    #[error("step {step}: motion planner could not find path")]
    NoPath { step: usize },

    /// 迭代次数用尽仍未到达
    #[error("did not reach target after {max_steps} steps")]
    Exhausted { max_steps: usize },

    /// 已取消
    #[error("move cancelled at step {step}")]
    Cancelled { step: usize },
}

impl MotionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidStepSize(_) => ErrorKind::InvalidCommand,
            Self::PoseQuery { source, .. } | Self::Move { source, .. } => source.kind(),
            Self::NoPath { .. } => ErrorKind::Planning,
            Self::Exhausted { .. } => ErrorKind::Exhausted,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }
}

/// 服务层错误
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("detection failed: {0}")]
    Detection(#[from] DetectionError),

    #[error(transparent)]
    Pick(#[from] PickError),

    #[error(transparent)]
    Motion(#[from] MotionError),

    /// 物体索引越界
    #[error("object_index {index} out of range (detected {count} objects)")]
    IndexOutOfRange { index: usize, count: usize },

    /// 尚未执行过检测
    #[error("no previous detection; run 'detect' first")]
    NoDetection,

    /// 命令无效
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// 响应编码失败
    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Detection(e) => e.kind(),
            Self::Pick(e) => e.kind(),
            Self::Motion(e) => e.kind(),
            Self::IndexOutOfRange { .. } => ErrorKind::Range,
            Self::NoDetection => ErrorKind::State,
            Self::InvalidCommand(_) => ErrorKind::InvalidCommand,
            Self::Encode(_) => ErrorKind::Io,
        }
    }

    /// 是否为真正的失败（取消是调用方主动停止，不算）
    pub fn is_fatal(&self) -> bool {
        self.kind() != ErrorKind::Cancelled
    }

    /// 调用方输入问题（修正参数后可重新发起）
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Config | ErrorKind::Range | ErrorKind::State | ErrorKind::InvalidCommand
        )
    }

    /// 需要操作员介入（执行/规划失败，不应机械重试）
    pub fn requires_intervention(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Actuation | ErrorKind::Planning | ErrorKind::Exhausted
        )
    }

    /// 核心从不自动重试
    pub fn is_retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_display() {
        let err = ServiceError::IndexOutOfRange { index: 3, count: 1 };
        assert_eq!(
            err.to_string(),
            "object_index 3 out of range (detected 1 objects)"
        );

        let err = ServiceError::NoDetection;
        assert_eq!(err.to_string(), "no previous detection; run 'detect' first");

        let err: ServiceError =
            DetectionError::Acquisition(CapabilityError::Io("camera offline".into())).into();
        let msg = err.to_string();
        assert!(msg.contains("detection failed") && msg.contains("camera offline"));
    }

    #[test]
    fn test_pick_error_display_and_steps() {
        let err = PickError::Aborted {
            step: PickStep::GraspPosition,
            completed: vec![
                PickStep::OpenGripper,
                PickStep::ComputeApproach,
                PickStep::Approach,
                PickStep::ReDetect,
            ],
            source: StepFailure::NoPath,
        };
        assert_eq!(
            err.to_string(),
            "pick aborted at step 'grasp_position': motion planner could not find a path"
        );
        assert_eq!(err.completed_steps().len(), 4);
        assert_eq!(err.kind(), ErrorKind::Planning);
    }

    #[test]
    fn test_motion_error_display() {
        assert_eq!(
            MotionError::Exhausted { max_steps: 200 }.to_string(),
            "did not reach target after 200 steps"
        );
        assert_eq!(
            MotionError::NoPath { step: 4 }.to_string(),
            "step 4: motion planner could not find path"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ServiceError::IndexOutOfRange { index: 0, count: 0 }.kind(),
            ErrorKind::Range
        );
        assert_eq!(ServiceError::NoDetection.kind(), ErrorKind::State);
        assert_eq!(
            ServiceError::from(DetectionError::InvalidConfig("x".into())).kind(),
            ErrorKind::Config
        );
        assert_eq!(
            ServiceError::from(MotionError::Move {
                step: 0,
                source: CapabilityError::Actuation("stall".into()),
            })
            .kind(),
            ErrorKind::Actuation
        );
        assert_eq!(
            DetectionError::Acquisition(CapabilityError::Cancelled).kind(),
            ErrorKind::Cancelled
        );
    }

    #[test]
    fn test_classification_helpers() {
        assert!(ServiceError::NoDetection.is_caller_error());
        assert!(!ServiceError::NoDetection.requires_intervention());

        let err = ServiceError::from(MotionError::NoPath { step: 0 });
        assert!(err.requires_intervention());
        assert!(!err.is_caller_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_from_cancelled() {
        let e: CapabilityError = Cancelled.into();
        assert_eq!(e, CapabilityError::Cancelled);
        let e: DetectionError = Cancelled.into();
        assert_eq!(e, DetectionError::Cancelled);
    }

    #[test]
    fn test_error_kind_names() {
        assert_eq!(ErrorKind::InvalidCommand.to_string(), "invalid_command");
        assert_eq!(
            ServiceError::IndexOutOfRange { index: 1, count: 0 }.kind().as_str(),
            "range"
        );
    }
}
