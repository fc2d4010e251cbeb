//! 骨骼附件 - Effector / Constraint / Pole / Algorithm
//!
//! 每根骨骼最多持有每类附件各一个，由 `BoneTree` 的 attach/detach 接口管理。

mod algorithm;
mod constraint;
mod effector;
mod pole;

pub use algorithm::{Algorithm, SolverFeatures, FABRIK, MSS, ONE_BONE, TWO_BONE};
pub use constraint::{Constraint, ConstraintKind};
pub use effector::{Effector, EffectorFeatures};
pub use pole::Pole;
