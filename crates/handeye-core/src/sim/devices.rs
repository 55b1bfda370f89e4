//! 仿真设备：各能力 trait 的实现

use super::scene::{cluster_points, render_cluster};
use super::{SimRig, SimState};
use crate::cancel::CancelToken;
use crate::capability::{Arm, Gripper, MotionPlanner, Segmenter, Sensor};
use crate::config::SegmentationConfig;
use crate::error::CapabilityError;
use handeye_types::{PointCloud, Pose, PoseInFrame};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// 取消检查间隔
const CANCEL_POLL: Duration = Duration::from_millis(2);

impl SimRig {
    /// 模拟运动耗时，期间观察取消
    fn travel(&self, cancel: &CancelToken) -> Result<(), CapabilityError> {
        cancel.check()?;
        if self.move_duration_ms == 0 {
            return Ok(());
        }
        let deadline = Instant::now() + Duration::from_millis(self.move_duration_ms);
        while Instant::now() < deadline {
            cancel.check()?;
            thread::sleep(CANCEL_POLL);
        }
        cancel.check()?;
        Ok(())
    }

    /// 移动夹爪；夹持的物体随之平移
    fn place_gripper(state: &mut SimState, pose: Pose) {
        let delta = pose.point - state.gripper.point;
        if let Some(object) = state.holding.and_then(|i| state.objects.get_mut(i)) {
            *object = *object + delta;
        }
        state.gripper = pose;
    }
}

impl Sensor for SimRig {
    fn capture_cloud(&self, cancel: &CancelToken) -> Result<PointCloud, CapabilityError> {
        cancel.check()?;
        let mut state = self.state.lock();
        if state.faults.capture_fails {
            return Err(CapabilityError::Io("simulated camera offline".into()));
        }
        state.captures += 1;
        if state
            .faults
            .capture_empty_after
            .is_some_and(|n| state.captures > n)
        {
            return Ok(PointCloud::default());
        }

        // 相机只看得到前方的点；配准时使用标定位姿
        let world_to_camera = self.camera_true.inverse();
        let registration = self.camera_calibrated;
        let cloud: PointCloud = state
            .objects
            .iter()
            .zip(&self.point_counts)
            .flat_map(|(center, &count)| render_cluster(*center, count, self.point_spacing_mm))
            .map(|p| world_to_camera.transform_point(p))
            .filter(|p| p.z > 0.0)
            .map(|p| {
                if self.points_in_world {
                    registration.transform_point(p)
                } else {
                    p
                }
            })
            .collect();
        debug!(points = cloud.len(), "Simulated capture");
        Ok(cloud)
    }
}

impl Segmenter for SimRig {
    fn segment(
        &self,
        cloud: &PointCloud,
        config: &SegmentationConfig,
        cancel: &CancelToken,
    ) -> Result<Vec<PointCloud>, CapabilityError> {
        cancel.check()?;
        if self.state.lock().faults.segment_fails {
            return Err(CapabilityError::Processing("simulated segmentation failure".into()));
        }
        Ok(cluster_points(
            cloud,
            config.clustering_radius_mm,
            config.min_pts_in_segment,
        ))
    }
}

impl Gripper for SimRig {
    fn open(&self, cancel: &CancelToken) -> Result<(), CapabilityError> {
        cancel.check()?;
        let mut state = self.state.lock();
        if state.faults.open_fails {
            return Err(CapabilityError::Actuation("simulated gripper fault".into()));
        }
        state.holding = None;
        Ok(())
    }

    fn grab(&self, cancel: &CancelToken) -> Result<bool, CapabilityError> {
        cancel.check()?;
        let mut state = self.state.lock();
        if state.faults.grab_fails {
            return Err(CapabilityError::Actuation("simulated gripper fault".into()));
        }
        let tip = state.gripper.point;
        let nearest = state
            .objects
            .iter()
            .enumerate()
            .map(|(i, c)| (i, c.distance(&tip)))
            .filter(|(_, d)| *d <= self.grasp_tolerance_mm)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        state.holding = nearest.map(|(i, _)| i);
        debug!(holding = ?state.holding, "Simulated grab");
        Ok(state.holding.is_some())
    }

    fn is_holding_something(&self, cancel: &CancelToken) -> Result<bool, CapabilityError> {
        cancel.check()?;
        let state = self.state.lock();
        if state.faults.holding_query_fails {
            return Err(CapabilityError::Query("simulated gripper query failure".into()));
        }
        Ok(state.holding.is_some())
    }
}

impl Arm for SimRig {
    fn end_position(&self, cancel: &CancelToken) -> Result<Pose, CapabilityError> {
        cancel.check()?;
        let state = self.state.lock();
        if state.faults.arm_query_fails {
            return Err(CapabilityError::Query("simulated arm query failure".into()));
        }
        Ok(self.arm_base.inverse().compose(&state.gripper))
    }

    fn move_to_position(&self, pose: Pose, cancel: &CancelToken) -> Result<(), CapabilityError> {
        {
            let state = self.state.lock();
            if state
                .faults
                .arm_move_fails_after
                .is_some_and(|n| state.arm_moves >= n)
            {
                return Err(CapabilityError::Actuation("simulated arm fault".into()));
            }
        }
        self.travel(cancel)?;
        let target = self.arm_base.compose(&pose);
        let mut state = self.state.lock();
        state.arm_moves += 1;
        trace!(target = %target, "Simulated direct move");
        SimRig::place_gripper(&mut state, target);
        Ok(())
    }
}

impl MotionPlanner for SimRig {
    fn move_component(
        &self,
        component: &str,
        destination: &PoseInFrame,
        cancel: &CancelToken,
    ) -> Result<bool, CapabilityError> {
        cancel.check()?;
        if component != self.names.gripper {
            return Err(CapabilityError::Planning(format!(
                "unknown component '{component}'"
            )));
        }
        let target = {
            let state = self.state.lock();
            let faults = &state.faults;
            if faults.plan_fails {
                return Err(CapabilityError::Planning("simulated planner failure".into()));
            }
            if faults.planner_no_path
                || faults
                    .no_path_after_moves
                    .is_some_and(|n| state.planned_moves >= n)
            {
                return Ok(false);
            }
            let frame = self.frame_in_world(&state, &destination.frame).ok_or_else(|| {
                CapabilityError::Planning(format!("unknown frame '{}'", destination.frame))
            })?;
            frame.compose(&destination.pose)
        };

        if self.blocked.iter().any(|r| r.contains(target.point)) {
            debug!(target = %target.point, "Destination inside blocked region");
            return Ok(false);
        }

        self.travel(cancel)?;

        let mut state = self.state.lock();
        let from = state.gripper.point;
        let travel = target.point - from;
        let reached = if self.max_travel_per_move_mm > 0.0 && travel.norm() > self.max_travel_per_move_mm
        {
            Pose::new(
                from + travel.normalize() * self.max_travel_per_move_mm,
                target.orientation,
            )
        } else {
            target
        };
        state.planned_moves += 1;
        trace!(target = %target.point, reached = %reached.point, "Simulated planned move");
        SimRig::place_gripper(&mut state, reached);
        Ok(true)
    }

    fn get_pose(
        &self,
        component: &str,
        reference_frame: &str,
        cancel: &CancelToken,
    ) -> Result<Pose, CapabilityError> {
        cancel.check()?;
        let state = self.state.lock();
        let faults = &state.faults;
        if faults.pose_query_fails
            || (faults.camera_pose_query_fails
                && (component == self.names.camera || reference_frame == self.names.camera))
        {
            return Err(CapabilityError::Query(format!(
                "simulated pose query failure for '{component}'"
            )));
        }
        let unknown = |name: &str| CapabilityError::Query(format!("unknown frame '{name}'"));
        let component_pose = self
            .frame_in_world(&state, component)
            .ok_or_else(|| unknown(component))?;
        let reference_pose = self
            .frame_in_world(&state, reference_frame)
            .ok_or_else(|| unknown(reference_frame))?;
        Ok(reference_pose.inverse().compose(&component_pose))
    }
}
