//! ik_engine - 骨骼树 FABRIK 逆向运动学求解库
//!
//! 核心流程：
//! 1. 用 `BoneTree` 搭建骨骼层次（本地空间变换）
//! 2. 在末端骨骼上附加 `Effector`（目标），在区域根附加 `Algorithm`
//! 3. `IkSolver::build` 划分求解器区域并实例化算法
//! 4. 每帧更新 Effector 目标后调用 `IkSolver::solve`
//!
//! ```no_run
//! use glam::Vec3;
//! use ik_engine::{Algorithm, BoneTree, Effector, IkSolver, FABRIK};
//!
//! # fn main() -> Result<(), ik_engine::IkError> {
//! let mut tree = BoneTree::new();
//! let root = tree.create_bone("root");
//! let mid = tree.create_child("mid", root, Vec3::Y)?;
//! let tip = tree.create_child("tip", mid, Vec3::Y)?;
//!
//! tree.attach_algorithm(root, Algorithm::new(FABRIK))?;
//! tree.attach_effector(tip, Effector::new(Vec3::new(1.0, 1.0, 0.0)))?;
//!
//! let mut solver = IkSolver::build(&mut tree, root)?;
//! solver.solve(&mut tree);
//! # Ok(())
//! # }
//! ```

pub mod attachment;
pub mod error;
pub mod solver;
pub mod tree;

pub use attachment::{
    Algorithm, Constraint, ConstraintKind, Effector, EffectorFeatures, Pole, SolverFeatures,
    FABRIK, MSS, ONE_BONE, TWO_BONE,
};
pub use error::IkError;
pub use solver::{
    Chain, FabrikSolver, IkSolver, RegionSolver, SolverFactory, SolverGroup, SolverRegistry,
    Subtree,
};
pub use tree::{
    bone_global_to_local, bone_local_to_global, tree_global_to_local, tree_local_to_global, Bone,
    BoneTree, TransformMode,
};
