//! 变换工具 - 本地空间与全局空间互转
//!
//! FABRIK 在单一的全局空间中做几何运算，求解前后需要整树转换。
//! 全局→本地必须自顶向下逐层剥离父变换，这里用递归实现；
//! 本地→全局同样自顶向下累积，两个方向共用一套递归骨架。
//!
//! 变换关系：
//! - global_pos = parent_global_pos + parent_global_rot * local_pos
//! - global_rot = parent_global_rot * local_rot

use bitflags::bitflags;
use glam::{Quat, Vec3};

use super::bone_tree::BoneTree;

bitflags! {
    /// 转换哪些分量
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TransformMode: u8 {
        const TRANSLATIONS = 1 << 0;
        const ROTATIONS = 1 << 1;
    }
}

impl TransformMode {
    /// 位置 + 旋转
    pub const BOTH: Self = Self::from_bits_truncate(
        Self::TRANSLATIONS.bits() | Self::ROTATIONS.bits(),
    );
}

/// 将以 `root` 为根的子树从本地空间转为全局空间
///
/// `root` 自身的坐标保持不变（以它的父空间作为全局参照系）。
/// 无论 mode 只选了哪个分量，累积时都使用完整变换，保证层级关系正确。
pub fn tree_local_to_global(tree: &mut BoneTree, root: usize, mode: TransformMode) {
    local_to_global_recursive(tree, root, Vec3::ZERO, Quat::IDENTITY, mode);
}

/// 将以 `root` 为根的子树从全局空间转回本地空间
///
/// 与 `tree_local_to_global` 以相同 mode 调用时互为逆操作（浮点误差内）。
pub fn tree_global_to_local(tree: &mut BoneTree, root: usize, mode: TransformMode) {
    global_to_local_recursive(tree, root, Vec3::ZERO, Quat::IDENTITY, mode);
}

fn local_to_global_recursive(
    tree: &mut BoneTree,
    idx: usize,
    acc_pos: Vec3,
    acc_rot: Quat,
    mode: TransformMode,
) {
    let local_pos = tree.position(idx);
    let local_rot = tree.rotation(idx);

    let global_pos = acc_pos + acc_rot * local_pos;
    let global_rot = acc_rot * local_rot;

    if mode.contains(TransformMode::TRANSLATIONS) {
        tree.set_position(idx, global_pos);
    }
    if mode.contains(TransformMode::ROTATIONS) {
        tree.set_rotation(idx, global_rot);
    }

    for i in 0..tree.children(idx).len() {
        let child = tree.children(idx)[i];
        local_to_global_recursive(tree, child, global_pos, global_rot, mode);
    }
}

fn global_to_local_recursive(
    tree: &mut BoneTree,
    idx: usize,
    acc_pos: Vec3,
    acc_rot: Quat,
    mode: TransformMode,
) {
    let cur_pos = tree.position(idx);
    let cur_rot = tree.rotation(idx);

    // 未参与转换的分量仍处于本地空间，累积时需要现场补算全局值
    let global_pos = if mode.contains(TransformMode::TRANSLATIONS) {
        cur_pos
    } else {
        acc_pos + acc_rot * cur_pos
    };
    let global_rot = if mode.contains(TransformMode::ROTATIONS) {
        cur_rot
    } else {
        acc_rot * cur_rot
    };

    let inv_rot = acc_rot.inverse();
    if mode.contains(TransformMode::TRANSLATIONS) {
        tree.set_position(idx, inv_rot * (global_pos - acc_pos));
    }
    if mode.contains(TransformMode::ROTATIONS) {
        tree.set_rotation(idx, inv_rot * global_rot);
    }

    for i in 0..tree.children(idx).len() {
        let child = tree.children(idx)[i];
        global_to_local_recursive(tree, child, global_pos, global_rot, mode);
    }
}

// ============================================================================
// 单骨骼版本
// ============================================================================

/// 计算 `idx` 的父空间相对 `stop_at` 空间的累积变换
///
/// `stop_at` 为 None 时一直走到树根。祖先链上的骨骼要求处于本地空间。
fn parent_space_transform(tree: &BoneTree, idx: usize, stop_at: Option<usize>) -> (Vec3, Quat) {
    // 自底向上收集祖先，再自顶向下折叠（本地→全局按根到叶的顺序应用）
    let mut ancestors = Vec::new();
    let mut cur = tree.bone(idx).parent_id();
    while let Some(a) = cur {
        if Some(a) == stop_at {
            break;
        }
        ancestors.push(a);
        cur = tree.bone(a).parent_id();
    }

    let mut acc_pos = Vec3::ZERO;
    let mut acc_rot = Quat::IDENTITY;
    for &a in ancestors.iter().rev() {
        acc_pos += acc_rot * tree.position(a);
        acc_rot *= tree.rotation(a);
    }
    (acc_pos, acc_rot)
}

/// 把单根骨骼的本地变换改写为全局变换（其余骨骼保持本地空间）
pub fn bone_local_to_global(tree: &mut BoneTree, idx: usize, stop_at: Option<usize>) {
    let (acc_pos, acc_rot) = parent_space_transform(tree, idx, stop_at);
    let pos = acc_pos + acc_rot * tree.position(idx);
    let rot = acc_rot * tree.rotation(idx);
    tree.set_position(idx, pos);
    tree.set_rotation(idx, rot);
}

/// 把单根骨骼的全局变换改写为本地变换（其余骨骼保持本地空间）
pub fn bone_global_to_local(tree: &mut BoneTree, idx: usize, stop_at: Option<usize>) {
    let (acc_pos, acc_rot) = parent_space_transform(tree, idx, stop_at);
    let inv_rot = acc_rot.inverse();
    let pos = inv_rot * (tree.position(idx) - acc_pos);
    let rot = inv_rot * tree.rotation(idx);
    tree.set_position(idx, pos);
    tree.set_rotation(idx, rot);
}
