//! 骨骼树 - 以 arena 方式管理骨骼层次
//!
//! 核心设计思想：
//! - 骨骼集中存放在 `Vec<Bone>` 中，句柄即索引
//! - 父引用是普通索引（弱引用语义），子关系由 children 缓存维护
//! - 链/子树共享骨骼时共享的是句柄，arena 存活期间骨骼不会被释放

use glam::{Quat, Vec3};

use super::bone::Bone;
use crate::attachment::{Algorithm, Constraint, Effector, Pole};
use crate::error::IkError;

/// 骨骼树
#[derive(Debug, Default)]
pub struct BoneTree {
    bones: Vec<Bone>,
    children_cache: Vec<Vec<usize>>,
}

impl BoneTree {
    pub fn new() -> Self {
        Self {
            bones: Vec::new(),
            children_cache: Vec::new(),
        }
    }

    // ========================================
    // 构建
    // ========================================

    /// 创建根骨骼，返回句柄
    pub fn create_bone(&mut self, name: &str) -> usize {
        let id = self.bones.len();
        let mut bone = Bone::new(name.to_string());
        bone.internal_id = id;
        self.bones.push(bone);
        self.children_cache.push(Vec::new());
        id
    }

    /// 创建子骨骼，`position` 为相对父骨骼的本地偏移
    pub fn create_child(
        &mut self,
        name: &str,
        parent: usize,
        position: Vec3,
    ) -> Result<usize, IkError> {
        if parent >= self.bones.len() {
            return Err(IkError::InvalidHandle(parent));
        }
        let id = self.create_bone(name);
        self.bones[id].parent_index = parent as i32;
        self.bones[id].position = position;
        self.children_cache[parent].push(id);
        Ok(id)
    }

    /// 重设父骨骼（句柄保持不变，子关系缓存同步更新）
    ///
    /// 拓扑变更后，已构建的求解器失效，必须重新 build。
    pub fn set_parent(&mut self, bone: usize, new_parent: Option<usize>) -> Result<(), IkError> {
        if bone >= self.bones.len() {
            return Err(IkError::InvalidHandle(bone));
        }
        if let Some(p) = new_parent {
            if p >= self.bones.len() {
                return Err(IkError::InvalidHandle(p));
            }
        }

        if let Some(old) = self.bones[bone].parent_id() {
            self.children_cache[old].retain(|&c| c != bone);
        }
        match new_parent {
            Some(p) => {
                self.bones[bone].parent_index = p as i32;
                self.children_cache[p].push(bone);
            }
            None => self.bones[bone].parent_index = -1,
        }
        Ok(())
    }

    // ========================================
    // 访问器
    // ========================================

    /// 骨骼数量
    #[inline]
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// 按句柄取骨骼
    #[inline]
    pub fn bone(&self, idx: usize) -> &Bone {
        &self.bones[idx]
    }

    /// 按句柄取可变骨骼
    #[inline]
    pub fn bone_mut(&mut self, idx: usize) -> &mut Bone {
        &mut self.bones[idx]
    }

    /// 子骨骼句柄列表（插入顺序）
    #[inline]
    pub fn children(&self, idx: usize) -> &[usize] {
        &self.children_cache[idx]
    }

    /// 遍历全部骨骼
    pub fn iter(&self) -> impl Iterator<Item = &Bone> {
        self.bones.iter()
    }

    #[inline]
    pub fn position(&self, idx: usize) -> Vec3 {
        self.bones[idx].position
    }

    #[inline]
    pub fn set_position(&mut self, idx: usize, position: Vec3) {
        self.bones[idx].position = position;
    }

    #[inline]
    pub fn rotation(&self, idx: usize) -> Quat {
        self.bones[idx].rotation
    }

    #[inline]
    pub fn set_rotation(&mut self, idx: usize, rotation: Quat) {
        self.bones[idx].rotation = rotation;
    }

    // ========================================
    // 附件管理
    // ========================================

    /// 附加 Effector（骨骼已有 Effector 时报 AlreadyHasAttachment）
    pub fn attach_effector(&mut self, idx: usize, effector: Effector) -> Result<(), IkError> {
        if idx >= self.bones.len() {
            return Err(IkError::InvalidHandle(idx));
        }
        if self.bones[idx].effector.is_some() {
            return Err(IkError::AlreadyHasAttachment(idx));
        }
        self.bones[idx].effector = Some(effector);
        Ok(())
    }

    pub fn detach_effector(&mut self, idx: usize) -> Option<Effector> {
        self.bones.get_mut(idx).and_then(|b| b.effector.take())
    }

    /// 附加约束
    pub fn attach_constraint(&mut self, idx: usize, constraint: Constraint) -> Result<(), IkError> {
        if idx >= self.bones.len() {
            return Err(IkError::InvalidHandle(idx));
        }
        if self.bones[idx].constraint.is_some() {
            return Err(IkError::AlreadyHasAttachment(idx));
        }
        self.bones[idx].constraint = Some(constraint);
        Ok(())
    }

    pub fn detach_constraint(&mut self, idx: usize) -> Option<Constraint> {
        self.bones.get_mut(idx).and_then(|b| b.constraint.take())
    }

    /// 附加极向量
    pub fn attach_pole(&mut self, idx: usize, pole: Pole) -> Result<(), IkError> {
        if idx >= self.bones.len() {
            return Err(IkError::InvalidHandle(idx));
        }
        if self.bones[idx].pole.is_some() {
            return Err(IkError::AlreadyHasAttachment(idx));
        }
        self.bones[idx].pole = Some(pole);
        Ok(())
    }

    pub fn detach_pole(&mut self, idx: usize) -> Option<Pole> {
        self.bones.get_mut(idx).and_then(|b| b.pole.take())
    }

    /// 附加算法（标记求解器区域根）
    pub fn attach_algorithm(&mut self, idx: usize, algorithm: Algorithm) -> Result<(), IkError> {
        if idx >= self.bones.len() {
            return Err(IkError::InvalidHandle(idx));
        }
        if self.bones[idx].algorithm.is_some() {
            return Err(IkError::AlreadyHasAttachment(idx));
        }
        self.bones[idx].algorithm = Some(algorithm);
        Ok(())
    }

    pub fn detach_algorithm(&mut self, idx: usize) -> Option<Algorithm> {
        self.bones.get_mut(idx).and_then(|b| b.algorithm.take())
    }

    // ========================================
    // 骨段长度
    // ========================================

    /// 刷新所有骨骼的骨段长度缓存
    ///
    /// 骨段长度 = 本地位置的模长（即到父骨骼的距离）。要求树处于本地空间。
    pub fn update_distances(&mut self) {
        for bone in &mut self.bones {
            bone.dist_to_parent = if bone.parent_index >= 0 {
                bone.position.length()
            } else {
                0.0
            };
        }
    }
}
