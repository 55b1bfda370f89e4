//! 收敛移动控制
//!
//! 把一次远距离移动拆成多段短距离的规划移动：每一段都重新查询夹爪的世界坐标，
//! 朝目标前进至多 `step_size`，直到距离不超过容差。
//!
//! 规划器每段都可能因为避障而偏离直线，所以每次迭代都以**实测**位置为起点重新规划。
//! 迭代次数上限为 `max_steps`，控制器因此总能自行结束。

use crate::cancel::CancelToken;
use crate::capability::MotionPlanner;
use crate::config::MotionConfig;
use crate::error::{CapabilityError, MotionError};
use handeye_types::{MoveResult, Pose, PoseInFrame, Vec3, WORLD_FRAME};
use std::sync::Arc;
use tracing::{debug, info};

/// 收敛控制器
pub struct ConvergenceController {
    planner: Arc<dyn MotionPlanner>,
    component: String,
    config: MotionConfig,
}

impl ConvergenceController {
    pub fn new(
        planner: Arc<dyn MotionPlanner>,
        component: impl Into<String>,
        config: MotionConfig,
    ) -> Self {
        ConvergenceController {
            planner,
            component: component.into(),
            config,
        }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// 逐段移动到世界坐标系中的 `target`
    ///
    /// 成功时 `steps` 为执行的移动次数，`final_position` 为最后一次测得的位置。
    /// 任何一段移动失败或无路径都会立即中止，不做重试。
    pub fn move_to(
        &self,
        target: Vec3,
        step_size: f64,
        cancel: &CancelToken,
    ) -> Result<MoveResult, MotionError> {
        if !(step_size.is_finite() && step_size > 0.0) {
            return Err(MotionError::InvalidStepSize(step_size));
        }
        let max_steps = self.config.max_steps;
        let tolerance = self.config.tolerance_mm;

        for step in 0..max_steps {
            if cancel.is_cancelled() {
                return Err(MotionError::Cancelled { step });
            }

            let current = self.current_pose(step, cancel)?;
            let remaining = target - current.point;
            let distance = remaining.norm();
            debug!(
                step,
                current = %current.point,
                distance_mm = distance,
                "Convergence step"
            );

            if distance <= tolerance {
                info!(steps = step, tolerance_mm = tolerance, "Reached target");
                return Ok(MoveResult {
                    success: true,
                    steps: step,
                    final_position: current.point,
                    target,
                });
            }

            let next = if distance <= step_size {
                target
            } else {
                current.point + remaining.normalize() * step_size
            };
            let destination = PoseInFrame::world(Pose::new(next, current.orientation));
            debug!(step, waypoint = %next, "Moving to waypoint");

            let moved = self
                .planner
                .move_component(&self.component, &destination, cancel)
                .map_err(|source| match source {
                    CapabilityError::Cancelled => MotionError::Cancelled { step },
                    source => MotionError::Move { step, source },
                })?;
            if !moved {
                return Err(MotionError::NoPath { step });
            }
        }

        // 最后一段移动可能恰好到达
        let current = self.current_pose(max_steps, cancel)?;
        if current.point.distance(&target) <= tolerance {
            info!(steps = max_steps, tolerance_mm = tolerance, "Reached target");
            return Ok(MoveResult {
                success: true,
                steps: max_steps,
                final_position: current.point,
                target,
            });
        }

        Err(MotionError::Exhausted { max_steps })
    }

    fn current_pose(&self, step: usize, cancel: &CancelToken) -> Result<Pose, MotionError> {
        self.planner
            .get_pose(&self.component, WORLD_FRAME, cancel)
            .map_err(|source| match source {
                CapabilityError::Cancelled => MotionError::Cancelled { step },
                source => MotionError::PoseQuery { step, source },
            })
    }
}
