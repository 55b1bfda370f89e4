//! 命令与响应
//!
//! 命令是以 `command` 字段区分的 JSON 对象：
//!
//! ```json
//! {"command": "detect"}
//! {"command": "pick", "object_index": 1}
//! {"command": "pick_detected"}
//! {"command": "move_to", "x": 413.0, "y": 731.0, "z": 45.0, "step_size": 5.0}
//! {"command": "status"}
//! ```
//!
//! `object_index` 同时接受整数和整数值的浮点数（如 `1.0`），
//! 负数或带小数部分的值会被拒绝。

use crate::error::ServiceError;
use handeye_types::{Activity, DetectedObject, MoveResult, Offset, PickResult, PickStep, Vec3, WORLD_FRAME};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 服务命令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// 检测物体
    Detect,
    /// 重新检测后抓取第 `object_index` 个物体
    Pick {
        #[serde(default, deserialize_with = "deserialize_index")]
        object_index: usize,
    },
    /// 抓取上一次检测结果中的第 `object_index` 个物体
    PickDetected {
        #[serde(default, deserialize_with = "deserialize_index")]
        object_index: usize,
    },
    /// 查询状态
    Status,
    /// 逐段移动夹爪到世界坐标系中的目标点
    MoveTo {
        x: f64,
        y: f64,
        z: f64,
        /// 未指定时使用配置中的默认步长
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step_size: Option<f64>,
    },
}

impl Command {
    /// 从 JSON 解析命令
    pub fn from_value(value: serde_json::Value) -> Result<Self, ServiceError> {
        serde_json::from_value(value).map_err(|e| ServiceError::InvalidCommand(e.to_string()))
    }

    /// 命令名称
    pub fn name(&self) -> &'static str {
        match self {
            Command::Detect => "detect",
            Command::Pick { .. } => "pick",
            Command::PickDetected { .. } => "pick_detected",
            Command::Status => "status",
            Command::MoveTo { .. } => "move_to",
        }
    }
}

fn deserialize_index<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    struct IndexVisitor;

    impl<'de> Visitor<'de> for IndexVisitor {
        type Value = usize;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative integer object index")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<usize, E> {
            usize::try_from(v).map_err(|_| E::custom(format!("object_index {v} is too large")))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<usize, E> {
            if v < 0 {
                return Err(E::custom(format!("object_index must not be negative, got {v}")));
            }
            self.visit_u64(v as u64)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<usize, E> {
            if !v.is_finite() || v.fract() != 0.0 {
                return Err(E::custom(format!("object_index must be an integer, got {v}")));
            }
            if v < 0.0 {
                return Err(E::custom(format!("object_index must not be negative, got {v}")));
            }
            if v > usize::MAX as f64 {
                return Err(E::custom(format!("object_index {v} is too large")));
            }
            Ok(v as usize)
        }

        // 显式 null 与缺省相同
        fn visit_unit<E: de::Error>(self) -> Result<usize, E> {
            Ok(0)
        }

        fn visit_none<E: de::Error>(self) -> Result<usize, E> {
            Ok(0)
        }
    }

    deserializer.deserialize_any(IndexVisitor)
}

/// 位置（毫米）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x_mm: f64,
    pub y_mm: f64,
    pub z_mm: f64,
}

impl From<Vec3> for Position {
    fn from(v: Vec3) -> Self {
        Position {
            x_mm: v.x,
            y_mm: v.y,
            z_mm: v.z,
        }
    }
}

/// 带坐标系名称的位置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramedPosition {
    pub x_mm: f64,
    pub y_mm: f64,
    pub z_mm: f64,
    pub frame: String,
}

impl FramedPosition {
    fn new(v: Vec3, frame: impl Into<String>) -> Self {
        FramedPosition {
            x_mm: v.x,
            y_mm: v.y,
            z_mm: v.z,
            frame: frame.into(),
        }
    }
}

/// 偏移（毫米）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OffsetBody {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub total: f64,
}

impl From<Offset> for OffsetBody {
    fn from(o: Offset) -> Self {
        OffsetBody {
            x: o.vector.x,
            y: o.vector.y,
            z: o.vector.z,
            total: o.total,
        }
    }
}

/// `detect` 响应中的单个物体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub index: usize,
    pub point_count: usize,
    pub center_x_mm: f64,
    pub center_y_mm: f64,
    pub center_z_mm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectResponse {
    pub objects: Vec<ObjectEntry>,
    pub count: usize,
}

impl DetectResponse {
    pub fn new(objects: &[DetectedObject]) -> Self {
        DetectResponse {
            objects: objects
                .iter()
                .enumerate()
                .map(|(index, o)| ObjectEntry {
                    index,
                    point_count: o.point_count,
                    center_x_mm: o.center.x,
                    center_y_mm: o.center.y,
                    center_z_mm: o.center.z,
                })
                .collect(),
            count: objects.len(),
        }
    }
}

/// `pick` / `pick_detected` 响应
///
/// 没有测量到的世界坐标和偏移字段会被省略。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickResponse {
    pub success: bool,
    pub is_holding: bool,
    pub grab_reported: bool,
    pub detected_position: FramedPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_position_world_frame: Option<FramedPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gripper_position_world_frame: Option<FramedPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approach_offset_mm: Option<OffsetBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_frame_offset_mm: Option<OffsetBody>,
    pub steps_completed: Vec<PickStep>,
}

impl From<&PickResult> for PickResponse {
    fn from(r: &PickResult) -> Self {
        PickResponse {
            success: r.success,
            is_holding: r.is_holding,
            grab_reported: r.grab_reported,
            detected_position: FramedPosition::new(r.detected_position, r.detection_frame.as_str()),
            object_position_world_frame: r
                .object_position_world_frame
                .map(|p| FramedPosition::new(p, WORLD_FRAME)),
            gripper_position_world_frame: r
                .gripper_position_world_frame
                .map(|p| FramedPosition::new(p, WORLD_FRAME)),
            approach_offset_mm: r.approach_offset.map(OffsetBody::from),
            world_frame_offset_mm: r.world_frame_offset.map(OffsetBody::from),
            steps_completed: r.steps_completed.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveResponse {
    pub success: bool,
    pub steps: usize,
    pub final_position: Position,
    pub target: Position,
}

impl From<&MoveResult> for MoveResponse {
    fn from(r: &MoveResult) -> Self {
        MoveResponse {
            success: r.success,
            steps: r.steps,
            final_position: r.final_position.into(),
            target: r.target.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: Activity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<PickResponse>,
    /// 上一次检测到的物体数量
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_objects: Option<usize>,
}

/// 命令响应
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Detect(DetectResponse),
    Pick(PickResponse),
    MoveTo(MoveResponse),
    Status(StatusResponse),
}

impl Response {
    /// 转换为 JSON
    pub fn to_value(&self) -> Result<serde_json::Value, ServiceError> {
        serde_json::to_value(self).map_err(ServiceError::Encode)
    }
}
