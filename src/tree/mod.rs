//! 骨骼树与空间变换

mod bone;
mod bone_tree;
pub mod transform;

pub use bone::Bone;
pub use bone_tree::BoneTree;
pub use transform::{
    bone_global_to_local, bone_local_to_global, tree_global_to_local, tree_local_to_global,
    TransformMode,
};
