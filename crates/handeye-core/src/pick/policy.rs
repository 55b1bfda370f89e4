//! 步骤失败策略

use handeye_types::PickStep;

/// 步骤失败后的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    /// 中止整个序列
    Fatal,
    /// 记录警告后继续
    Advisory,
}

/// `PickStep -> StepPolicy` 映射表
///
/// 默认表：
///
/// | 步骤 | 策略 |
/// |---|---|
/// | open_gripper, compute_approach, approach, grasp_position, grab | Fatal |
/// | re_detect, world_frame_compare, lift, verify | Advisory |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPolicyTable {
    policies: [StepPolicy; PickStep::ALL.len()],
}

impl Default for StepPolicyTable {
    fn default() -> Self {
        let mut policies = [StepPolicy::Fatal; PickStep::ALL.len()];
        for step in [
            PickStep::ReDetect,
            PickStep::WorldFrameCompare,
            PickStep::Lift,
            PickStep::Verify,
        ] {
            policies[step.index()] = StepPolicy::Advisory;
        }
        StepPolicyTable { policies }
    }
}

impl StepPolicyTable {
    /// 所有步骤使用同一策略
    pub fn uniform(policy: StepPolicy) -> Self {
        StepPolicyTable {
            policies: [policy; PickStep::ALL.len()],
        }
    }

    pub fn get(&self, step: PickStep) -> StepPolicy {
        self.policies[step.index()]
    }

    pub fn set(&mut self, step: PickStep, policy: StepPolicy) {
        self.policies[step.index()] = policy;
    }

    /// 链式修改
    pub fn with(mut self, step: PickStep, policy: StepPolicy) -> Self {
        self.set(step, policy);
        self
    }

    pub fn is_fatal(&self, step: PickStep) -> bool {
        self.get(step) == StepPolicy::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let table = StepPolicyTable::default();
        let fatal: Vec<_> = PickStep::ALL
            .iter()
            .copied()
            .filter(|s| table.is_fatal(*s))
            .map(PickStep::name)
            .collect();
        assert_eq!(
            fatal,
            vec![
                "open_gripper",
                "compute_approach",
                "approach",
                "grasp_position",
                "grab"
            ]
        );
    }

    #[test]
    fn test_with_overrides_single_step() {
        let table = StepPolicyTable::default().with(PickStep::Lift, StepPolicy::Fatal);
        assert!(table.is_fatal(PickStep::Lift));
        assert!(!table.is_fatal(PickStep::Verify));

        let all_advisory = StepPolicyTable::uniform(StepPolicy::Advisory);
        assert!(PickStep::ALL.iter().all(|s| !all_advisory.is_fatal(*s)));
    }
}
