//! 各抓取步骤的实现

use super::PickOrchestrator;
use crate::cancel::CancelToken;
use crate::config::GraspMotion;
use crate::error::{ErrorKind, StepFailure};
use handeye_types::{
    DetectedObject, Offset, Orientation, PickResult, PickStep, Pose, PoseInFrame, Vec3,
    WORLD_FRAME,
};
use tracing::{debug, info, warn};

/// 序列执行过程中的中间状态
pub(super) struct PickContext {
    pub(super) result: PickResult,
    frame: String,
    center: Vec3,
    /// 远离支撑面的单位向量（检测坐标系）
    axis: Vec3,
    /// 接近位姿（检测坐标系）
    approach: Option<Pose>,
    /// 抓取位姿（检测坐标系）
    grasp: Option<Pose>,
}

impl PickContext {
    pub(super) fn new(object: &DetectedObject, frame: &str, axis: Vec3) -> Self {
        PickContext {
            result: PickResult::started(object, frame),
            frame: frame.to_string(),
            center: object.center,
            axis,
            approach: None,
            grasp: None,
        }
    }
}

impl PickOrchestrator {
    pub(super) fn run_step(
        &self,
        step: PickStep,
        ctx: &mut PickContext,
        cancel: &CancelToken,
    ) -> Result<(), StepFailure> {
        match step {
            PickStep::OpenGripper => {
                info!("Opening gripper...");
                self.rig.gripper.open(cancel)?;
                Ok(())
            },
            PickStep::ComputeApproach => self.compute_approach(ctx, cancel),
            PickStep::Approach => {
                let approach = ctx.approach.ok_or(StepFailure::Missing("approach pose"))?;
                info!(
                    offset_mm = self.config.approach_offset_mm,
                    "Moving to approach position..."
                );
                self.planned_move(PoseInFrame::new(ctx.frame.clone(), approach), cancel)
            },
            PickStep::ReDetect => self.re_detect(ctx, cancel),
            PickStep::GraspPosition => self.grasp_position(ctx, cancel),
            PickStep::WorldFrameCompare => self.world_frame_compare(ctx, cancel),
            PickStep::Grab => {
                info!("Closing gripper...");
                let grabbed = self.rig.gripper.grab(cancel)?;
                info!(grabbed, "Grab reported");
                ctx.result.grab_reported = grabbed;
                Ok(())
            },
            PickStep::Lift => self.lift(ctx, cancel),
            PickStep::Verify => {
                info!("Verifying hold...");
                ctx.result.is_holding = self.rig.gripper.is_holding_something(cancel)?;
                Ok(())
            },
        }
    }

    fn compute_approach(&self, ctx: &mut PickContext, cancel: &CancelToken) -> Result<(), StepFailure> {
        let point = ctx.center + ctx.axis * self.config.approach_offset_mm;
        let orientation = if ctx.frame == WORLD_FRAME {
            match self
                .rig
                .planner
                .get_pose(&self.config.gripper, WORLD_FRAME, cancel)
            {
                Ok(pose) => pose.orientation,
                Err(e) if e.kind() == ErrorKind::Cancelled => return Err(e.into()),
                Err(e) => {
                    warn!(error = %e, "Could not get gripper world orientation, using default");
                    Orientation::IDENTITY
                },
            }
        } else {
            Orientation::IDENTITY
        };
        let approach = Pose::new(point, orientation);
        debug!(approach = %approach, frame = %ctx.frame, "Computed approach pose");
        ctx.approach = Some(approach);
        Ok(())
    }

    fn re_detect(&self, ctx: &mut PickContext, cancel: &CancelToken) -> Result<(), StepFailure> {
        info!("Re-detecting object from approach position...");
        let objects = self.detector.detect(cancel)?;
        let first = objects.first().ok_or(StepFailure::NoObjects)?;
        let offset = Offset::between(first.center, ctx.center);
        info!(approach_offset = %offset, "Approach offset");
        ctx.result.approach_offset = Some(offset);
        Ok(())
    }

    fn grasp_position(&self, ctx: &mut PickContext, cancel: &CancelToken) -> Result<(), StepFailure> {
        let approach = ctx.approach.ok_or(StepFailure::Missing("approach pose"))?;
        let grasp = Pose::new(
            ctx.center - ctx.axis * self.config.grasp_depth_offset_mm,
            approach.orientation,
        );
        info!(grasp = %grasp.point, "Moving to grasp position...");
        match self.config.grasp_motion {
            GraspMotion::Direct => {
                self.direct_move(&ctx.frame, grasp.point - approach.point, cancel)?
            },
            GraspMotion::Planned => {
                self.planned_move(PoseInFrame::new(ctx.frame.clone(), grasp), cancel)?
            },
        }
        ctx.grasp = Some(grasp);
        Ok(())
    }

    fn world_frame_compare(
        &self,
        ctx: &mut PickContext,
        cancel: &CancelToken,
    ) -> Result<(), StepFailure> {
        let planner = &self.rig.planner;
        let gripper_world = planner
            .get_pose(&self.config.gripper, WORLD_FRAME, cancel)
            .map(|p| p.point);
        let object_world = if ctx.frame == WORLD_FRAME {
            Ok(ctx.center)
        } else {
            planner
                .get_pose(&ctx.frame, WORLD_FRAME, cancel)
                .map(|frame_in_world| frame_in_world.transform_point(ctx.center))
        };

        ctx.result.gripper_position_world_frame = gripper_world.as_ref().ok().copied();
        ctx.result.object_position_world_frame = object_world.as_ref().ok().copied();

        let gripper_world = gripper_world?;
        let object_world = object_world?;
        let offset = Offset::between(gripper_world, object_world);
        info!(
            gripper = %gripper_world,
            object = %object_world,
            world_frame_offset = %offset,
            "World-frame offset"
        );
        ctx.result.world_frame_offset = Some(offset);
        Ok(())
    }

    fn lift(&self, ctx: &mut PickContext, cancel: &CancelToken) -> Result<(), StepFailure> {
        let grasp = ctx.grasp.ok_or(StepFailure::Missing("grasp pose"))?;
        let displacement = ctx.axis * self.config.lift_height_mm;
        info!(height_mm = self.config.lift_height_mm, "Lifting...");
        match self.config.grasp_motion {
            GraspMotion::Direct => self.direct_move(&ctx.frame, displacement, cancel),
            GraspMotion::Planned => {
                let lifted = Pose::new(grasp.point + displacement, grasp.orientation);
                self.planned_move(PoseInFrame::new(ctx.frame.clone(), lifted), cancel)
            },
        }
    }

    /// 经运动规划服务移动夹爪，`false` 视为无路径
    fn planned_move(&self, destination: PoseInFrame, cancel: &CancelToken) -> Result<(), StepFailure> {
        debug!(destination = %destination, "Planned move");
        if self
            .rig
            .planner
            .move_component(&self.config.gripper, &destination, cancel)?
        {
            Ok(())
        } else {
            Err(StepFailure::NoPath)
        }
    }

    /// 把检测坐标系中的位移换算到机械臂坐标系后直接移动，保持当前姿态
    fn direct_move(
        &self,
        frame: &str,
        displacement: Vec3,
        cancel: &CancelToken,
    ) -> Result<(), StepFailure> {
        let frame_in_arm = self.rig.planner.get_pose(frame, &self.config.arm, cancel)?;
        let delta = frame_in_arm.orientation.rotate(displacement);
        let current = self.rig.arm.end_position(cancel)?;
        let target = Pose::new(current.point + delta, current.orientation);
        debug!(from = %current.point, to = %target.point, "Direct arm move");
        self.rig.arm.move_to_position(target, cancel)?;
        Ok(())
    }
}
