//! 多区域求解器组
//!
//! 骨骼树被划分出多个区域时，用组把各区域求解器串起来，对外表现为
//! 单个区域求解器。组内顺序即求解顺序（深处区域在前）。

use crate::attachment::Algorithm;
use crate::tree::BoneTree;

use super::RegionSolver;

/// 区域求解器组
pub struct SolverGroup {
    solvers: Vec<Box<dyn RegionSolver>>,
}

impl SolverGroup {
    pub(crate) fn new(solvers: Vec<Box<dyn RegionSolver>>) -> Self {
        Self { solvers }
    }

    /// 组内求解器数量
    #[inline]
    pub fn len(&self) -> usize {
        self.solvers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.solvers.is_empty()
    }
}

impl RegionSolver for SolverGroup {
    /// 组没有单一算法，各成员各自持有
    fn algorithm(&self) -> Option<&Algorithm> {
        None
    }

    /// 依次求解各区域，返回迭代次数总和
    fn solve(&mut self, tree: &mut BoneTree) -> u32 {
        self.solvers.iter_mut().map(|s| s.solve(tree)).sum()
    }

    fn visit_bones(&self, visit: &mut dyn FnMut(usize)) {
        for solver in &self.solvers {
            solver.visit_bones(visit);
        }
    }

    fn visit_effector_bones(&self, visit: &mut dyn FnMut(usize)) {
        for solver in &self.solvers {
            solver.visit_effector_bones(visit);
        }
    }
}
