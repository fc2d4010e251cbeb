//! Algorithm - 求解器区域的算法指定
//!
//! 附着在骨骼上，表示以该骨骼为根的区域使用哪种求解算法。算法按名字在
//! `SolverRegistry` 中查找工厂。

use bitflags::bitflags;

/// FABRIK 算法名
pub const FABRIK: &str = "fabrik";
/// 单骨解析解算法名（注册表预留）
pub const ONE_BONE: &str = "one bone";
/// 双骨解析解算法名（注册表预留）
pub const TWO_BONE: &str = "two bone";
/// 质量-弹簧算法名（注册表预留）
pub const MSS: &str = "mss";

bitflags! {
    /// 求解器特性开关
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct SolverFeatures: u16 {
        /// 前向传递时调用骨骼上的约束
        const CONSTRAINTS = 1 << 0;
        /// 求解后按极向量调整链的滚转
        const POLES = 1 << 1;
        /// 反向传递时混入 Effector 的目标朝向
        const TARGET_ROTATIONS = 1 << 2;
        /// 位置收敛后从骨段方向推导各骨骼旋转
        const JOINT_ROTATIONS = 1 << 3;
    }
}

/// 算法附件
#[derive(Clone, Debug)]
pub struct Algorithm {
    /// 注册表中的算法名
    pub name: String,
    /// 收敛容差（Effector 到目标的距离）
    pub tolerance: f32,
    /// 最大迭代次数
    pub max_iterations: u16,
    /// 特性开关
    pub features: SolverFeatures,
}

impl Algorithm {
    /// 以典型默认参数创建算法附件
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tolerance: 1e-3,
            max_iterations: 20,
            features: SolverFeatures::empty(),
        }
    }

    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u16) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_features(mut self, features: SolverFeatures) -> Self {
        self.features = features;
        self
    }
}
