//! 点簇渲染与朴素欧氏聚类

use handeye_types::{PointCloud, Vec3};
use std::collections::VecDeque;
use std::f64::consts::PI;

/// 在 `center` 周围渲染 `count` 个点（Fibonacci 球面）
///
/// 球半径由点数和点间距决定，偏移量去均值后质心与 `center` 一致。
pub fn render_cluster(center: Vec3, count: usize, spacing_mm: f64) -> Vec<Vec3> {
    match count {
        0 => return Vec::new(),
        1 => return vec![center],
        _ => {},
    }
    let n = count as f64;
    let radius = spacing_mm * (n / (4.0 * PI)).sqrt();
    let golden_angle = PI * (3.0 - 5f64.sqrt());

    let offsets: Vec<Vec3> = (0..count)
        .map(|i| {
            let z = 1.0 - 2.0 * (i as f64 + 0.5) / n;
            let r = (1.0 - z * z).sqrt();
            let theta = golden_angle * i as f64;
            Vec3::new(r * theta.cos(), r * theta.sin(), z) * radius
        })
        .collect();
    let mean = offsets.iter().fold(Vec3::ZERO, |acc, o| acc + *o) * (1.0 / n);
    offsets.into_iter().map(|o| center + (o - mean)).collect()
}

/// 半径连通聚类
///
/// 距离不超过 `radius` 的点属于同一簇；少于 `min_points` 的簇被丢弃。
/// 簇按其第一个点在输入中的位置排序。
pub fn cluster_points(cloud: &PointCloud, radius: f64, min_points: usize) -> Vec<PointCloud> {
    let points = cloud.points();
    let r2 = radius * radius;
    let mut assigned = vec![false; points.len()];
    let mut clusters = Vec::new();
    let mut queue = VecDeque::new();

    for seed in 0..points.len() {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;
        queue.push_back(seed);
        let mut members = Vec::new();

        while let Some(i) = queue.pop_front() {
            members.push(points[i]);
            for (j, taken) in assigned.iter_mut().enumerate() {
                if *taken {
                    continue;
                }
                let d = points[j] - points[i];
                if d.dot(&d) <= r2 {
                    *taken = true;
                    queue.push_back(j);
                }
            }
        }

        if members.len() >= min_points {
            clusters.push(PointCloud::new(members));
        }
    }
    clusters
}
