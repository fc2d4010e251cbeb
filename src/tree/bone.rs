//! 骨骼节点
//!
//! Bone 是骨骼树的基本单元。变换（position/rotation）存储在本地空间
//! （相对父骨骼）；FABRIK 求解前由变换工具转为全局空间，求解后转回。

use glam::{Quat, Vec3};

use crate::attachment::{Algorithm, Constraint, Effector, Pole};

/// 骨骼节点
///
/// 附件（effector / constraint / pole / algorithm）每类最多一个，
/// 通过 `BoneTree` 的 attach/detach 接口管理。
#[derive(Debug)]
pub struct Bone {
    /// 骨骼名称
    pub name: String,

    /// 树内索引
    pub(crate) internal_id: usize,

    /// 父骨骼索引 (-1 表示根骨骼)
    pub parent_index: i32,

    /// 位置（本地空间，相对父骨骼）
    pub position: Vec3,

    /// 旋转（本地空间，相对父骨骼）
    pub rotation: Quat,

    /// 到父骨骼的距离（骨段长度缓存，由 update_distances 刷新）
    ///
    /// 单次求解期间视为不可变；拓扑或静止位置变更后必须重算。
    pub dist_to_parent: f32,

    /// Effector 附件
    pub effector: Option<Effector>,

    /// 约束附件
    pub constraint: Option<Constraint>,

    /// 极向量附件
    pub pole: Option<Pole>,

    /// 算法附件（标记求解器区域的根）
    pub algorithm: Option<Algorithm>,
}

impl Bone {
    /// 创建新骨骼
    pub fn new(name: String) -> Self {
        Self {
            name,
            internal_id: 0,
            parent_index: -1,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            dist_to_parent: 0.0,
            effector: None,
            constraint: None,
            pole: None,
            algorithm: None,
        }
    }

    /// 骨骼索引
    #[inline]
    pub fn link_id(&self) -> usize {
        self.internal_id
    }

    /// 父骨骼索引
    #[inline]
    pub fn parent_id(&self) -> Option<usize> {
        if self.parent_index >= 0 {
            Some(self.parent_index as usize)
        } else {
            None
        }
    }

    /// 是否为根骨骼
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent_index < 0
    }
}

impl Default for Bone {
    fn default() -> Self {
        Self::new(String::new())
    }
}
