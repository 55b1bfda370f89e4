//! 点云类型

use crate::geometry::Vec3;

/// 点云（有序点集，毫米）
///
/// 点所在的坐标系由产生它的传感器决定（通常是相机坐标系）。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    points: Vec<Vec3>,
}

impl PointCloud {
    pub fn new(points: Vec<Vec3>) -> Self {
        PointCloud { points }
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn push(&mut self, p: Vec3) {
        self.points.push(p);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 质心：所有点坐标的算术平均
    ///
    /// 空点云返回 `None`。
    pub fn centroid(&self) -> Option<Vec3> {
        if self.points.is_empty() {
            return None;
        }
        let sum = self.points.iter().fold(Vec3::ZERO, |acc, p| acc + *p);
        Some(sum * (1.0 / self.points.len() as f64))
    }

    pub fn into_points(self) -> Vec<Vec3> {
        self.points
    }
}

impl From<Vec<Vec3>> for PointCloud {
    fn from(points: Vec<Vec3>) -> Self {
        PointCloud::new(points)
    }
}

impl FromIterator<Vec3> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Vec3>>(iter: I) -> Self {
        PointCloud::new(iter.into_iter().collect())
    }
}

impl Extend<Vec3> for PointCloud {
    fn extend<I: IntoIterator<Item = Vec3>>(&mut self, iter: I) {
        self.points.extend(iter);
    }
}
