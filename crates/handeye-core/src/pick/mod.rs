//! 抓取编排
//!
//! 固定顺序的九步抓取序列，用于测量手眼标定误差：
//!
//! 1. `open_gripper` - 打开夹爪
//! 2. `compute_approach` - 计算接近位姿（物体沿远离支撑面方向偏移 `approach_offset_mm`）
//! 3. `approach` - 经运动规划移动到接近位姿
//! 4. `re_detect` - 在接近位姿重新检测，得到接近偏移
//! 5. `grasp_position` - 移动到抓取位置
//! 6. `world_frame_compare` - 对比夹爪与物体在世界坐标系中的位置，得到世界坐标偏移
//! 7. `grab` - 闭合夹爪
//! 8. `lift` - 抬起
//! 9. `verify` - 检查是否夹持
//!
//! 每一步失败后的处理由 [`StepPolicyTable`] 决定：致命步骤中止序列，
//! 建议步骤记录警告后继续。步骤只有在成功时才会追加到 `steps_completed`。
//! 取消总是中止序列，与策略无关。

mod policy;
mod steps;

pub use policy::{StepPolicy, StepPolicyTable};

use crate::cancel::CancelToken;
use crate::capability::Rig;
use crate::config::ServiceConfig;
use crate::detection::Detector;
use crate::error::PickError;
use handeye_types::{DetectedObject, Offset, PickResult, PickStep};
use std::sync::Arc;
use steps::PickContext;
use tracing::{error, info, warn};

/// 抓取编排器
pub struct PickOrchestrator {
    rig: Rig,
    detector: Arc<Detector>,
    config: Arc<ServiceConfig>,
    policy: StepPolicyTable,
}

impl PickOrchestrator {
    pub fn new(rig: Rig, detector: Arc<Detector>, config: Arc<ServiceConfig>) -> Self {
        PickOrchestrator {
            rig,
            detector,
            config,
            policy: StepPolicyTable::default(),
        }
    }

    /// 替换步骤策略表
    pub fn with_policy(mut self, policy: StepPolicyTable) -> Self {
        self.set_policy(policy);
        self
    }

    pub fn set_policy(&mut self, policy: StepPolicyTable) {
        self.policy = policy;
    }

    pub fn policy(&self) -> &StepPolicyTable {
        &self.policy
    }

    /// 对一个检测结果执行完整抓取序列
    ///
    /// 致命步骤失败时返回 [`PickError::Aborted`]，其中带有已完成的步骤；
    /// 只要序列走完（即使夹爪没有夹住），都返回 `Ok(PickResult)`，
    /// 是否成功看 `PickResult::success`。
    pub fn pick(
        &self,
        object: &DetectedObject,
        cancel: &CancelToken,
    ) -> Result<PickResult, PickError> {
        let frame = self.config.detection_frame();
        info!(
            position = %object.center,
            frame,
            "Starting pick sequence"
        );

        let mut ctx = PickContext::new(object, frame, self.config.approach_axis());

        for step in PickStep::ALL {
            if cancel.is_cancelled() {
                return Err(PickError::Cancelled {
                    completed: ctx.result.steps_completed,
                });
            }

            match self.run_step(step, &mut ctx, cancel) {
                Ok(()) => ctx.result.steps_completed.push(step),
                Err(failure) if failure.is_cancellation() => {
                    warn!(step = %step, "Pick sequence cancelled");
                    return Err(PickError::Cancelled {
                        completed: ctx.result.steps_completed,
                    });
                },
                Err(failure) if self.policy.is_fatal(step) => {
                    error!(step = %step, error = %failure, "Pick sequence aborted");
                    return Err(PickError::Aborted {
                        step,
                        completed: ctx.result.steps_completed,
                        source: failure,
                    });
                },
                Err(failure) => {
                    warn!(step = %step, error = %failure, "Step failed (non-fatal)");
                },
            }
        }

        let mut result = ctx.result;
        result.success = result.is_holding;

        let fmt_offset = |o: Option<Offset>| o.map_or_else(|| "n/a".to_string(), |o| o.to_string());
        if result.success {
            info!(
                approach_offset = %fmt_offset(result.approach_offset),
                world_frame_offset = %fmt_offset(result.world_frame_offset),
                "RESULT: PASS - calibration validated, object picked successfully"
            );
        } else {
            info!(
                approach_offset = %fmt_offset(result.approach_offset),
                world_frame_offset = %fmt_offset(result.world_frame_offset),
                "RESULT: FAIL - gripper did not hold object"
            );
        }
        Ok(result)
    }
}
