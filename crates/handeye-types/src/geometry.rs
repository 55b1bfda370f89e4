//! 几何类型
//!
//! 三维向量、姿态与位姿，以及坐标系组合（frame composition）。
//!
//! # 单位
//!
//! 所有长度单位均为**毫米**，与深度相机和运动规划服务的约定一致。
//!
//! # 示例
//!
//! ```rust
//! use handeye_types::{Orientation, Pose, Vec3};
//!
//! // 相机在世界坐标系中的位姿
//! let camera_in_world = Pose::new(Vec3::new(100.0, 0.0, 500.0), Orientation::IDENTITY);
//!
//! // 相机坐标系下检测到的物体中心 -> 世界坐标系
//! let object_in_world = camera_in_world.transform_point(Vec3::new(10.0, -5.0, 300.0));
//! assert_eq!(object_in_world, Vec3::new(110.0, -5.0, 800.0));
//! ```

use nalgebra::{Quaternion as NaQuaternion, Unit, UnitQuaternion, Vector3};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// 四元数归一化阈值（避免除零）
const QUATERNION_NORM_THRESHOLD: f64 = 1e-10;

/// 世界坐标系名称
pub const WORLD_FRAME: &str = "world";

/// 三维向量（毫米）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vec3 {
    /// X 坐标（毫米）
    pub x: f64,
    /// Y 坐标（毫米）
    pub y: f64,
    /// Z 坐标（毫米）
    pub z: f64,
}

impl Vec3 {
    /// 创建新的三维向量
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3 { x, y, z }
    }

    /// 零向量
    pub const ZERO: Self = Vec3::new(0.0, 0.0, 0.0);

    /// 欧氏范数 `sqrt(x² + y² + z²)`
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// 归一化（单位向量）
    ///
    /// 长度接近 0 时返回零向量，而不是 NaN。
    pub fn normalize(&self) -> Self {
        let n = self.norm();
        if n < 1e-10 {
            return Vec3::ZERO;
        }
        *self * (1.0 / n)
    }

    /// 到另一点的距离
    pub fn distance(&self, other: &Vec3) -> f64 {
        (*other - *self).norm()
    }

    /// 点积
    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// 所有分量都是有限值
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    fn to_na(self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    fn from_na(v: Vector3<f64>) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;

    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(v: [f64; 3]) -> Self {
        Vec3::new(v[0], v[1], v[2])
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})mm", self.x, self.y, self.z)
    }
}

/// 姿态（单位四元数）
///
/// 数值运算委托给 `nalgebra::UnitQuaternion`，这里只保存分量，便于序列化。
/// `IDENTITY` 等价于方向向量 `(0, 0, 1)`、转角 0。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Orientation {
    /// 实部
    pub w: f64,
    /// 虚部 i
    pub x: f64,
    /// 虚部 j
    pub y: f64,
    /// 虚部 k
    pub z: f64,
}

impl Default for Orientation {
    fn default() -> Self {
        Orientation::IDENTITY
    }
}

impl Orientation {
    /// 单位四元数（无旋转）
    pub const IDENTITY: Self = Orientation {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// 绕轴旋转（弧度）
    ///
    /// 轴长度接近 0 时返回 `IDENTITY`。
    pub fn from_axis_angle(axis: Vec3, angle: f64) -> Self {
        match Unit::try_new(axis.to_na(), QUATERNION_NORM_THRESHOLD) {
            Some(axis) => Self::from_unit(UnitQuaternion::from_axis_angle(&axis, angle)),
            None => Orientation::IDENTITY,
        }
    }

    /// 从 RPY 欧拉角创建（弧度）
    pub fn from_euler(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self::from_unit(UnitQuaternion::from_euler_angles(roll, pitch, yaw))
    }

    fn from_unit(q: UnitQuaternion<f64>) -> Self {
        let imag = q.imag();
        Orientation {
            w: q.scalar(),
            x: imag.x,
            y: imag.y,
            z: imag.z,
        }
    }

    fn to_unit(self) -> UnitQuaternion<f64> {
        let norm_sq = self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z;
        if norm_sq < QUATERNION_NORM_THRESHOLD {
            tracing::warn!(
                "Normalizing near-zero quaternion (norm²={:.2e}), using identity",
                norm_sq
            );
            return UnitQuaternion::identity();
        }
        UnitQuaternion::from_quaternion(NaQuaternion::new(self.w, self.x, self.y, self.z))
    }

    /// 用该姿态旋转一个向量
    pub fn rotate(&self, v: Vec3) -> Vec3 {
        Vec3::from_na(self.to_unit().transform_vector(&v.to_na()))
    }

    /// 组合旋转（先 `other` 后 `self`）
    pub fn compose(&self, other: &Orientation) -> Orientation {
        Self::from_unit(self.to_unit() * other.to_unit())
    }

    /// 逆旋转
    pub fn inverse(&self) -> Orientation {
        Self::from_unit(self.to_unit().inverse())
    }

    /// 两个姿态之间的夹角（弧度）
    pub fn angle_to(&self, other: &Orientation) -> f64 {
        self.to_unit().angle_to(&other.to_unit())
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Q({:.3}, {:.3}, {:.3}, {:.3})",
            self.w, self.x, self.y, self.z
        )
    }
}

/// 位姿（位置 + 姿态）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pose {
    /// 位置（毫米）
    pub point: Vec3,
    /// 姿态
    pub orientation: Orientation,
}

impl Pose {
    /// 从位置和姿态创建
    pub const fn new(point: Vec3, orientation: Orientation) -> Self {
        Pose { point, orientation }
    }

    /// 纯平移位姿
    pub const fn from_point(point: Vec3) -> Self {
        Pose {
            point,
            orientation: Orientation::IDENTITY,
        }
    }

    /// 组合位姿：`other` 表达在 `self` 的坐标系中，返回它在 `self` 父坐标系下的位姿
    ///
    /// `point = self.point + self.R · other.point`，`R = self.R · other.R`
    pub fn compose(&self, other: &Pose) -> Pose {
        Pose {
            point: self.transform_point(other.point),
            orientation: self.orientation.compose(&other.orientation),
        }
    }

    /// 把 `self` 坐标系下的点变换到父坐标系
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.point + self.orientation.rotate(p)
    }

    /// 逆位姿
    pub fn inverse(&self) -> Pose {
        let inv = self.orientation.inverse();
        Pose {
            point: -inv.rotate(self.point),
            orientation: inv,
        }
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pose(pos: {}, quat: {})", self.point, self.orientation)
    }
}

/// 带坐标系名称的位姿（运动规划目标）
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoseInFrame {
    /// 参考坐标系名称
    pub frame: String,
    /// 该坐标系下的位姿
    pub pose: Pose,
}

impl PoseInFrame {
    pub fn new(frame: impl Into<String>, pose: Pose) -> Self {
        PoseInFrame {
            frame: frame.into(),
            pose,
        }
    }

    /// 世界坐标系下的位姿
    pub fn world(pose: Pose) -> Self {
        Self::new(WORLD_FRAME, pose)
    }
}

impl fmt::Display for PoseInFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.pose, self.frame)
    }
}
