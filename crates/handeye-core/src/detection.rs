//! 物体检测流水线
//!
//! 采集点云 -> 分割 -> 计算质心 -> 按深度/点数过滤。
//!
//! 结果顺序与分割服务返回的顺序一致，不做排序；
//! 调用方约定以索引 0 作为默认目标。

use crate::cancel::CancelToken;
use crate::capability::{Segmenter, Sensor};
use crate::config::SegmentationConfig;
use crate::error::{CapabilityError, DetectionError};
use handeye_types::DetectedObject;
use std::sync::Arc;
use tracing::{debug, info};

/// 检测器
pub struct Detector {
    sensor: Arc<dyn Sensor>,
    segmenter: Arc<dyn Segmenter>,
    config: SegmentationConfig,
}

impl Detector {
    pub fn new(
        sensor: Arc<dyn Sensor>,
        segmenter: Arc<dyn Segmenter>,
        config: SegmentationConfig,
    ) -> Self {
        Detector {
            sensor,
            segmenter,
            config,
        }
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// 执行一次检测
    ///
    /// 没有物体通过过滤时返回空列表（不是错误）。
    pub fn detect(&self, cancel: &CancelToken) -> Result<Vec<DetectedObject>, DetectionError> {
        cancel.check()?;

        self.segmenter
            .validate(&self.config)
            .map_err(|e| match e {
                CapabilityError::Cancelled => DetectionError::Cancelled,
                other => DetectionError::InvalidConfig(other.to_string()),
            })?;

        let cloud = self
            .sensor
            .capture_cloud(cancel)
            .map_err(|e| match e {
                CapabilityError::Cancelled => DetectionError::Cancelled,
                other => DetectionError::Acquisition(other),
            })?;
        debug!(points = cloud.len(), "Captured point cloud");

        let clusters = self
            .segmenter
            .segment(&cloud, &self.config, cancel)
            .map_err(|e| match e {
                CapabilityError::Cancelled => DetectionError::Cancelled,
                CapabilityError::Config(msg) => DetectionError::InvalidConfig(msg),
                other => DetectionError::Segmentation(other),
            })?;

        let max_depth = self.config.max_depth_mm;
        let max_points = self.config.max_point_count;
        let mut detected = Vec::with_capacity(clusters.len());

        for (i, cluster) in clusters.iter().enumerate() {
            let Some(center) = cluster.centroid() else {
                debug!(cluster = i, "Skipping empty cluster");
                continue;
            };
            if max_depth > 0.0 && center.z > max_depth {
                debug!(
                    cluster = i,
                    depth_mm = center.z,
                    max_depth_mm = max_depth,
                    "Rejecting cluster beyond max depth"
                );
                continue;
            }
            if max_points > 0 && cluster.len() > max_points {
                debug!(
                    cluster = i,
                    points = cluster.len(),
                    max_points,
                    "Rejecting oversized cluster"
                );
                continue;
            }
            debug!(cluster = i, points = cluster.len(), center = %center, "Accepted cluster");
            detected.push(DetectedObject::new(center, cluster.len()));
        }

        info!(
            clusters = clusters.len(),
            objects = detected.len(),
            "Detection complete"
        );
        Ok(detected)
    }
}
