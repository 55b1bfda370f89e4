//! # Hand-eye Types - 几何与结果类型
//!
//! **依赖原则**: 纯数据与纯函数，不依赖任何设备或服务。
//!
//! ## 包含模块
//!
//! - `geometry` - 向量、姿态、位姿与坐标系组合
//! - `cloud` - 点云与质心
//! - `model` - 检测物体、抓取结果、移动结果、服务状态
//!
//! ## Feature Flags
//!
//! - `serde` - 为所有公开类型派生 `Serialize` / `Deserialize`

pub mod cloud;
pub mod geometry;
pub mod model;

pub use cloud::PointCloud;
pub use geometry::{Orientation, Pose, PoseInFrame, Vec3, WORLD_FRAME};
pub use model::{Activity, DetectedObject, MoveResult, Offset, PickResult, PickStep};
