//! 链树 - 把 Subtree 分解成 FABRIK 可以直接迭代的链
//!
//! 每条链是一段无分叉的骨骼序列，按 **末端→基座** 顺序存放句柄。遇到
//! 分叉点时开出子链：分叉骨骼既是父链的末端，又作为共享基座追加到每条
//! 子链的末尾。求解时子链对共享基座各自给出提议位置，由父链取算术平均。

use crate::tree::BoneTree;

use super::subtree::Subtree;

/// 一条无分叉的骨骼链，可带子链
#[derive(Debug, Default, Clone)]
pub struct Chain {
    /// 骨骼句柄，末端在前、基座在后
    bones: Vec<usize>,
    /// 从本链末端分叉出去的子链（共享本链末端骨骼作为基座）
    children: Vec<Chain>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 Subtree 构建链树
    pub fn build(tree: &BoneTree, subtree: &Subtree) -> Self {
        let mut chain = Chain::new();
        build_recursive(&mut chain, tree, subtree, subtree.root);
        chain
    }

    // ========================================
    // 访问器
    // ========================================

    /// 链上的骨骼句柄（末端→基座）
    #[inline]
    pub fn bones(&self) -> &[usize] {
        &self.bones
    }

    /// 子链列表
    #[inline]
    pub fn children(&self) -> &[Chain] {
        &self.children
    }

    /// 链末端句柄
    #[inline]
    pub fn tip(&self) -> usize {
        self.bones[0]
    }

    /// 链基座句柄
    #[inline]
    pub fn base(&self) -> usize {
        self.bones[self.bones.len() - 1]
    }

    /// 链上骨骼数
    #[inline]
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// 对链树中的每条链（含自身）调用一次回调
    pub fn for_each_chain(&self, visit: &mut dyn FnMut(&Chain)) {
        visit(self);
        for child in &self.children {
            child.for_each_chain(visit);
        }
    }

    /// 链树中所有链的最小骨骼数
    pub fn min_bone_count(&self) -> usize {
        let mut min = usize::MAX;
        self.for_each_chain(&mut |c| min = min.min(c.bone_count()));
        min
    }
}

fn build_recursive(chain: &mut Chain, tree: &BoneTree, subtree: &Subtree, start: usize) {
    let mut collected = Vec::new();
    let mut cur = start;
    loop {
        collected.push(cur);
        match subtree.relevant_child_count(tree, cur) {
            // 叶子，链到此为止
            0 => break,
            // 继续沿唯一的相关子骨骼延伸
            1 => {
                match tree
                    .children(cur)
                    .iter()
                    .find(|&&c| subtree.contains(tree, c))
                {
                    Some(&c) => cur = c,
                    None => break,
                }
            }
            // 分叉点：每个相关子骨骼开一条子链，分叉骨骼作为共享基座
            _ => {
                for i in 0..tree.children(cur).len() {
                    let child = tree.children(cur)[i];
                    if !subtree.contains(tree, child) {
                        continue;
                    }
                    let mut sub = Chain::new();
                    build_recursive(&mut sub, tree, subtree, child);
                    sub.bones.push(cur);
                    chain.children.push(sub);
                }
                break;
            }
        }
    }
    // 收集顺序是基座→末端，倒序存放
    collected.reverse();
    chain.bones = collected;
}
