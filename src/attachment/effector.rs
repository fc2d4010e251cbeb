//! Effector - 骨骼的目标位置/朝向

use bitflags::bitflags;
use glam::{Quat, Vec3};

bitflags! {
    /// Effector 特性标志位
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct EffectorFeatures: u16 {
        /// weight < 1 时对混合目标做 nlerp（钉在链基座上），过渡更自然
        const WEIGHT_NLERP = 1 << 0;
        /// 求解后保持 Effector 骨骼原有朝向
        const KEEP_ORIENTATION = 1 << 1;
    }
}

/// Effector 附件
///
/// 附着在链末端骨骼上，描述求解器要到达的目标。`chain_length` 限制该
/// Effector 向根方向影响的骨骼数，0 表示一直延伸到树根。
#[derive(Clone, Debug)]
pub struct Effector {
    /// 目标位置（全局空间）
    pub target_position: Vec3,
    /// 目标朝向（全局空间，配合 TARGET_ROTATIONS 特性使用）
    pub target_rotation: Quat,
    /// 权重 [0, 1]，当前位置与目标位置之间的混合系数
    pub weight: f32,
    /// 链长限制，0 = 不限制（延伸到根）
    pub chain_length: u16,
    /// 朝向权重 [0, 1]，TARGET_ROTATIONS 下目标方向的参与程度
    pub rotation_weight: f32,
    /// 朝向权重沿链向基座方向的衰减系数
    pub rotation_decay: f32,
    /// 特性标志
    pub features: EffectorFeatures,

    /// 本次求解实际使用的目标（按 weight 混合后），每次 solve 前刷新
    pub(crate) actual_target: Vec3,
}

impl Default for Effector {
    fn default() -> Self {
        Self {
            target_position: Vec3::ZERO,
            target_rotation: Quat::IDENTITY,
            weight: 1.0,
            chain_length: 0,
            rotation_weight: 1.0,
            rotation_decay: 0.25,
            features: EffectorFeatures::empty(),
            actual_target: Vec3::ZERO,
        }
    }
}

impl Effector {
    /// 创建指向给定位置的 Effector
    pub fn new(target_position: Vec3) -> Self {
        Self {
            target_position,
            ..Self::default()
        }
    }

    /// 刷新 `actual_target`
    ///
    /// `tip_position` / `base_position` 为链末端与基座的全局位置。
    /// weight 线性混合当前位置与目标；开启 WEIGHT_NLERP 且 weight < 1 时，
    /// 将混合结果重新钉到以基座为圆心的球面上（基座到目标与基座到末端
    /// 距离的线性插值），避免直线混合把目标拉进链内侧。
    pub(crate) fn update_actual_target(&mut self, tip_position: Vec3, base_position: Vec3) {
        self.actual_target = tip_position + (self.target_position - tip_position) * self.weight;

        if self.features.contains(EffectorFeatures::WEIGHT_NLERP) && self.weight < 1.0 {
            let base_to_tip = tip_position - base_position;
            let base_to_target = self.target_position - base_position;
            let distance = base_to_target.length() * self.weight
                + base_to_tip.length() * (1.0 - self.weight);

            let direction = (self.actual_target - base_position)
                .try_normalize()
                .unwrap_or(Vec3::Y);
            self.actual_target = base_position + direction * distance;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_weight_uses_target_directly() {
        let mut eff = Effector::new(Vec3::new(3.0, 0.0, 0.0));
        eff.update_actual_target(Vec3::new(0.0, 2.0, 0.0), Vec3::ZERO);
        assert!((eff.actual_target - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_half_weight_lerps_from_tip() {
        let mut eff = Effector::new(Vec3::new(2.0, 0.0, 0.0));
        eff.weight = 0.5;
        eff.update_actual_target(Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, -1.0, 0.0));
        assert!((eff.actual_target - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_nlerp_pins_distance_to_base() {
        let mut eff = Effector::new(Vec3::new(4.0, 0.0, 0.0));
        eff.weight = 0.5;
        eff.features = EffectorFeatures::WEIGHT_NLERP;
        let base = Vec3::ZERO;
        let tip = Vec3::new(0.0, 2.0, 0.0);
        eff.update_actual_target(tip, base);

        // 基座到实际目标的距离应是两距离的插值: 4*0.5 + 2*0.5 = 3
        let d = (eff.actual_target - base).length();
        assert!((d - 3.0).abs() < 1e-5);
    }
}
