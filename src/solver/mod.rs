//! IK 求解器 - 区域划分与求解入口
//!
//! `IkSolver::build` 扫描骨骼树上的 Effector 与算法附件，把树划分成
//! 若干求解器区域并为每个区域实例化算法；`IkSolver::solve` 把树转入
//! 全局空间、依次求解各区域、再转回本地空间。
//!
//! 拓扑或附件变更后已构建的求解器失效，需要重新 build。

mod build;
mod chain;
mod fabrik;
mod group;
mod subtree;

pub use build::{SolverFactory, SolverRegistry};
pub use chain::Chain;
pub use fabrik::FabrikSolver;
pub use group::SolverGroup;
pub use subtree::Subtree;

use crate::attachment::Algorithm;
use crate::error::IkError;
use crate::tree::{tree_global_to_local, tree_local_to_global, BoneTree, TransformMode};

/// 区域求解器接口
///
/// 一个实现负责一个区域（或一组区域）。`solve` 在全局空间下工作，
/// 由外层负责空间转换。
pub trait RegionSolver {
    /// 本区域使用的算法（组返回 None）
    fn algorithm(&self) -> Option<&Algorithm>;

    /// 求解一次，返回迭代次数
    fn solve(&mut self, tree: &mut BoneTree) -> u32;

    /// 遍历区域内的骨骼句柄
    fn visit_bones(&self, visit: &mut dyn FnMut(usize));

    /// 遍历区域内带 Effector 的末端骨骼句柄
    fn visit_effector_bones(&self, visit: &mut dyn FnMut(usize));
}

/// IK 求解入口
///
/// 持有构建根与区域求解器。骨骼树本身不在这里，每次 solve 传入。
pub struct IkSolver {
    root: usize,
    region: Box<dyn RegionSolver>,
}

impl IkSolver {
    /// 以内建算法注册表构建求解器
    pub fn build(tree: &mut BoneTree, root: usize) -> Result<Self, IkError> {
        Self::build_with(tree, root, build::default_registry())
    }

    /// 以自定义算法注册表构建求解器
    pub fn build_with(
        tree: &mut BoneTree,
        root: usize,
        registry: &SolverRegistry,
    ) -> Result<Self, IkError> {
        if root >= tree.bone_count() {
            return Err(IkError::InvalidHandle(root));
        }
        tree.update_distances();

        let mut solvers = build::build_region_solvers(tree, root, registry)?;
        let region: Box<dyn RegionSolver> = if solvers.len() == 1 {
            solvers.remove(0)
        } else {
            Box::new(SolverGroup::new(solvers))
        };
        Ok(Self { root, region })
    }

    /// 求解一帧，返回所有区域的迭代次数总和
    ///
    /// 树以本地空间进出；Effector 目标始终是全局空间坐标。
    pub fn solve(&mut self, tree: &mut BoneTree) -> u32 {
        tree_local_to_global(tree, self.root, TransformMode::BOTH);
        let iterations = self.region.solve(tree);
        tree_global_to_local(tree, self.root, TransformMode::BOTH);
        iterations
    }

    /// 构建根句柄
    #[inline]
    pub fn root(&self) -> usize {
        self.root
    }

    /// 单区域时返回其算法，多区域返回 None
    pub fn algorithm(&self) -> Option<&Algorithm> {
        self.region.algorithm()
    }

    /// 遍历所有受求解影响的骨骼句柄
    pub fn visit_bones<F: FnMut(usize)>(&self, mut visit: F) {
        self.region.visit_bones(&mut visit);
    }

    /// 遍历所有带 Effector 的末端骨骼句柄
    pub fn visit_effector_bones<F: FnMut(usize)>(&self, mut visit: F) {
        self.region.visit_effector_bones(&mut visit);
    }
}
