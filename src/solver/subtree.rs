//! Subtree - 求解器区域的骨骼范围
//!
//! 一个 Subtree 由区域根骨骼和若干叶骨骼（带 Effector 的骨骼）界定，
//! 覆盖所有"根→叶"路径上的骨骼。标记阶段切出的每个区域对应一个
//! Subtree，链树构建阶段再把它分解成链。

use crate::tree::BoneTree;

/// 求解器区域
#[derive(Debug, Clone)]
pub struct Subtree {
    /// 区域根骨骼句柄
    pub root: usize,
    /// 叶骨骼句柄（每个都带 Effector），按发现顺序排列
    pub leaves: Vec<usize>,
}

impl Subtree {
    pub fn new(root: usize) -> Self {
        Self {
            root,
            leaves: Vec::new(),
        }
    }

    /// 登记一个叶骨骼
    pub fn add_leaf(&mut self, bone: usize) {
        self.leaves.push(bone);
    }

    /// 是否为登记过的叶骨骼
    #[inline]
    pub fn is_leaf(&self, bone: usize) -> bool {
        self.leaves.contains(&bone)
    }

    /// 骨骼是否落在本区域内（位于某条根→叶路径上）
    ///
    /// 从每个叶向上走到区域根，途中遇到 `bone` 即视为包含。
    pub fn contains(&self, tree: &BoneTree, bone: usize) -> bool {
        for &leaf in &self.leaves {
            let mut cur = leaf;
            loop {
                if cur == bone {
                    return true;
                }
                if cur == self.root {
                    break;
                }
                match tree.bone(cur).parent_id() {
                    Some(p) => cur = p,
                    None => break,
                }
            }
        }
        false
    }

    /// `bone` 的子骨骼中有几个在本区域内
    ///
    /// 0 = 叶，1 = 链继续延伸，≥2 = 分叉点（链树构建在此开新链）。
    pub fn relevant_child_count(&self, tree: &BoneTree, bone: usize) -> usize {
        tree.children(bone)
            .iter()
            .filter(|&&c| self.contains(tree, c))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    // root -> a -> b
    //           -> c
    fn forked_tree() -> (BoneTree, usize, usize, usize, usize) {
        let mut tree = BoneTree::new();
        let root = tree.create_bone("root");
        let a = tree.create_child("a", root, Vec3::Y).unwrap();
        let b = tree.create_child("b", a, Vec3::Y).unwrap();
        let c = tree.create_child("c", a, Vec3::X).unwrap();
        (tree, root, a, b, c)
    }

    #[test]
    fn test_contains_follows_leaf_paths() {
        let (tree, root, a, b, c) = forked_tree();
        let mut st = Subtree::new(root);
        st.add_leaf(b);

        assert!(st.contains(&tree, root));
        assert!(st.contains(&tree, a));
        assert!(st.contains(&tree, b));
        assert!(!st.contains(&tree, c));
    }

    #[test]
    fn test_relevant_child_count_detects_fork() {
        let (tree, root, a, b, c) = forked_tree();
        let mut st = Subtree::new(root);
        st.add_leaf(b);
        st.add_leaf(c);

        assert_eq!(st.relevant_child_count(&tree, root), 1);
        assert_eq!(st.relevant_child_count(&tree, a), 2);
        assert_eq!(st.relevant_child_count(&tree, b), 0);
        assert!(st.is_leaf(c));
    }
}
