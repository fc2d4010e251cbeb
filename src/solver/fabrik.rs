//! FABRIK 求解器
//!
//! Forward And Backward Reaching Inverse Kinematics。每轮迭代分两趟：
//! - 反向趟（末端→基座）：把每条叶链的末端移到 Effector 目标，逐段向
//!   基座方向重定位；分叉骨骼取各子链提议位置的算术平均
//! - 正向趟（基座→末端）：基座保持固定，逐段重新固定骨段长度
//!
//! 位置收敛（或迭代耗尽）后按特性开关执行后处理：极向量调整、从骨段
//! 方向推导关节旋转。求解全程在全局空间进行，零长度骨段的方向退化为
//! +Y，保证结果确定。

use glam::{Quat, Vec3, Vec4};

use crate::attachment::{Algorithm, EffectorFeatures, SolverFeatures};
use crate::error::IkError;
use crate::tree::BoneTree;

use super::chain::Chain;
use super::subtree::Subtree;
use super::RegionSolver;

/// FABRIK 区域求解器
pub struct FabrikSolver {
    algorithm: Algorithm,
    root: usize,
    chains: Chain,
    /// 区域内全部骨骼句柄（去重）
    bones: Vec<usize>,
    /// 求解开始时的全局变换，按句柄索引（仅区域内条目有效）
    initial: Vec<(Vec3, Quat)>,
}

impl FabrikSolver {
    /// 为一个区域构建 FABRIK 求解器
    ///
    /// 每条叶链至少要有 2 根骨骼（1 段骨段），否则报 ChainTopology。
    /// 区域根正好是分叉点时根链只含分叉骨骼本身，这是合法的。
    pub fn new(algorithm: Algorithm, tree: &BoneTree, subtree: &Subtree) -> Result<Self, IkError> {
        let chains = Chain::build(tree, subtree);
        let mut too_short = false;
        chains.for_each_chain(&mut |c| {
            if c.bone_count() < 2 && c.children().is_empty() {
                too_short = true;
            }
        });
        if too_short {
            return Err(IkError::ChainTopology(format!(
                "FABRIK needs at least 2 bones per chain, region rooted at bone {} is too short",
                subtree.root
            )));
        }

        let mut bones: Vec<usize> = Vec::new();
        chains.for_each_chain(&mut |c| {
            for &b in c.bones() {
                if !bones.contains(&b) {
                    bones.push(b);
                }
            }
        });

        Ok(Self {
            algorithm,
            root: subtree.root,
            chains,
            bones,
            initial: Vec::new(),
        })
    }

    /// 刷新所有 Effector 的实际目标（按 weight 混合）
    fn update_effector_targets(&self, tree: &mut BoneTree) {
        let mut work = Vec::new();
        self.chains.for_each_chain(&mut |c| {
            if c.children().is_empty() && tree.bone(c.tip()).effector.is_some() {
                work.push((c.tip(), tree.position(c.tip()), tree.position(c.base())));
            }
        });
        for (tip, tip_pos, base_pos) in work {
            if let Some(e) = tree.bone_mut(tip).effector.as_mut() {
                e.update_actual_target(tip_pos, base_pos);
            }
        }
    }

    /// 所有 Effector 是否都已进入容差范围
    fn converged(&self, tree: &BoneTree, tolerance_squared: f32) -> bool {
        let mut ok = true;
        self.chains.for_each_chain(&mut |c| {
            if c.children().is_empty() {
                if let Some(e) = &tree.bone(c.tip()).effector {
                    let d = (tree.position(c.tip()) - e.actual_target).length_squared();
                    if d > tolerance_squared {
                        ok = false;
                    }
                }
            }
        });
        ok
    }

    /// 极向量后处理：把各链的中间骨骼摆到极向量所在的弯曲平面
    fn apply_poles(&self, tree: &mut BoneTree) {
        self.chains.for_each_chain(&mut |c| {
            apply_pole_to_chain(c, tree);
        });
    }

    /// 从骨段方向推导关节旋转
    ///
    /// 对每段骨段，求原始方向到求解后方向的旋转增量，叠加到父骨骼的
    /// 初始旋转上。分叉骨骼在多条子链中各得到一个候选，取归一化平均。
    fn update_joint_rotations(&self, tree: &mut BoneTree) {
        let mut candidates: Vec<(usize, Quat)> = Vec::new();
        self.chains.for_each_chain(&mut |c| {
            let bones = c.bones();
            for i in 0..bones.len() - 1 {
                let child = bones[i];
                let parent = bones[i + 1];
                let orig_dir = self.initial[child].0 - self.initial[parent].0;
                let new_dir = tree.position(child) - tree.position(parent);
                let (o, n) = match (orig_dir.try_normalize(), new_dir.try_normalize()) {
                    (Some(o), Some(n)) => (o, n),
                    _ => continue,
                };
                let delta = Quat::from_rotation_arc(o, n);
                candidates.push((parent, delta * self.initial[parent].1));
            }
        });

        // 四元数平均：统一半球后分量求和再归一化
        let mut accum: Vec<(Vec4, u32)> = vec![(Vec4::ZERO, 0); tree.bone_count()];
        for (bone, q) in candidates {
            let v = Vec4::from(q);
            let (sum, count) = &mut accum[bone];
            let v = if *count > 0 && sum.dot(v) < 0.0 { -v } else { v };
            *sum += v;
            *count += 1;
        }
        for (bone, (sum, count)) in accum.iter().enumerate() {
            if *count > 0 {
                tree.set_rotation(bone, Quat::from_vec4(sum.normalize()));
            }
        }

        // 末端 Effector 骨骼没有子骨段可供推导，沿用父骨骼旋转;
        // KEEP_ORIENTATION 时保持求解前的朝向
        let mut tips = Vec::new();
        self.chains.for_each_chain(&mut |c| {
            if c.children().is_empty() && c.bone_count() >= 2 {
                if let Some(e) = &tree.bone(c.tip()).effector {
                    tips.push((c.tip(), c.bones()[1], e.features));
                }
            }
        });
        for (tip, parent, features) in tips {
            if features.contains(EffectorFeatures::KEEP_ORIENTATION) {
                tree.set_rotation(tip, self.initial[tip].1);
            } else {
                tree.set_rotation(tip, tree.rotation(parent));
            }
        }
    }
}

impl RegionSolver for FabrikSolver {
    fn algorithm(&self) -> Option<&Algorithm> {
        Some(&self.algorithm)
    }

    /// 求解一个区域，返回实际迭代次数
    ///
    /// 要求树已处于全局空间。
    fn solve(&mut self, tree: &mut BoneTree) -> u32 {
        self.initial.clear();
        self.initial
            .resize(tree.bone_count(), (Vec3::ZERO, Quat::IDENTITY));
        for &b in &self.bones {
            self.initial[b] = (tree.position(b), tree.rotation(b));
        }

        self.update_effector_targets(tree);

        let tolerance_squared = self.algorithm.tolerance * self.algorithm.tolerance;
        let mut iterations = 0u32;
        while iterations < self.algorithm.max_iterations as u32 {
            backward_chain(&self.chains, tree, &self.algorithm);
            // 区域根是分叉点时反向趟会写它（作为分叉平均），这里重新固定
            tree.set_position(self.root, self.initial[self.root].0);
            forward_chain(&self.chains, tree, &self.algorithm, &self.initial);
            iterations += 1;
            if self.converged(tree, tolerance_squared) {
                break;
            }
        }
        log::trace!(
            "[IK] FABRIK region at bone {} finished after {} iterations",
            self.root,
            iterations
        );

        if self.algorithm.features.contains(SolverFeatures::POLES) {
            self.apply_poles(tree);
        }
        if self
            .algorithm
            .features
            .contains(SolverFeatures::JOINT_ROTATIONS)
        {
            self.update_joint_rotations(tree);
        }

        iterations
    }

    fn visit_bones(&self, visit: &mut dyn FnMut(usize)) {
        for &b in &self.bones {
            visit(b);
        }
    }

    fn visit_effector_bones(&self, visit: &mut dyn FnMut(usize)) {
        self.chains.for_each_chain(&mut |c| {
            if c.children().is_empty() {
                visit(c.tip());
            }
        });
    }
}

/// 反向趟（末端→基座），返回对链基座的提议位置
///
/// 基座本身不写入：子链的基座由父链平均后写入，根链的基座保持固定。
fn backward_chain(chain: &Chain, tree: &mut BoneTree, algorithm: &Algorithm) -> Vec3 {
    if chain.children().is_empty() {
        let tip = chain.tip();
        if let Some(target) = tree.bone(tip).effector.as_ref().map(|e| e.actual_target) {
            tree.set_position(tip, target);
        }
    } else {
        // 分叉骨骼 = 各子链提议位置的算术平均
        let mut average = Vec3::ZERO;
        for child in chain.children() {
            average += backward_chain(child, tree, algorithm);
        }
        average /= chain.children().len() as f32;
        tree.set_position(chain.tip(), average);
    }

    // TARGET_ROTATIONS：目标朝向给出的骨段方向沿链向基座衰减混入
    let mut carried: Option<(Vec3, f32, f32)> = None;
    if algorithm
        .features
        .contains(SolverFeatures::TARGET_ROTATIONS)
        && chain.children().is_empty()
    {
        if let Some(e) = &tree.bone(chain.tip()).effector {
            // 骨骼本地 +Y 指向子骨骼，朝基座方向取反
            let toward_base = -(e.target_rotation * Vec3::Y);
            carried = Some((toward_base, e.rotation_weight, e.rotation_decay));
        }
    }

    let bones = chain.bones();
    for i in 0..bones.len() - 1 {
        let child = bones[i];
        let parent = bones[i + 1];
        let child_pos = tree.position(child);
        let parent_pos = tree.position(parent);
        let dist = tree.bone(child).dist_to_parent;

        let mut dir = (parent_pos - child_pos).try_normalize().unwrap_or(Vec3::Y);
        if let Some((target_dir, weight, decay)) = carried.as_mut() {
            dir = (dir * (1.0 - *weight) + *target_dir * *weight)
                .try_normalize()
                .unwrap_or(dir);
            *weight *= *decay;
        }

        let proposal = child_pos + dir * dist;
        if i + 1 == bones.len() - 1 {
            return proposal;
        }
        tree.set_position(parent, proposal);
    }
    tree.position(chain.base())
}

/// 正向趟（基座→末端），基座保持当前位置，逐段重新固定骨段长度
fn forward_chain(chain: &Chain, tree: &mut BoneTree, algorithm: &Algorithm, initial: &[(Vec3, Quat)]) {
    let bones = chain.bones();
    for i in (0..bones.len() - 1).rev() {
        let child = bones[i];
        let parent = bones[i + 1];
        let child_pos = tree.position(child);
        let parent_pos = tree.position(parent);
        let dist = tree.bone(child).dist_to_parent;

        let mut dir = (child_pos - parent_pos).try_normalize().unwrap_or(Vec3::Y);

        if algorithm.features.contains(SolverFeatures::CONSTRAINTS) {
            if let Some(constraint) = &tree.bone(parent).constraint {
                // 候选方向相对静止骨段方向表示为旋转，交给约束修正
                let rest_dir = (initial[child].0 - initial[parent].0)
                    .try_normalize()
                    .unwrap_or(Vec3::Y);
                let candidate = Quat::from_rotation_arc(rest_dir, dir);
                let constrained = constraint.apply(candidate);
                dir = (constrained * rest_dir).normalize_or_zero();
                if dir == Vec3::ZERO {
                    dir = rest_dir;
                }
            }
        }

        tree.set_position(child, parent_pos + dir * dist);
    }

    for child in chain.children() {
        forward_chain(child, tree, algorithm, initial);
    }
}

/// 把一条链的中间骨骼旋转到极向量所在的弯曲平面
fn apply_pole_to_chain(chain: &Chain, tree: &mut BoneTree) {
    if chain.bone_count() < 3 {
        return;
    }
    let pole = match chain.bones().iter().find_map(|&b| tree.bone(b).pole) {
        Some(p) => p,
        None => return,
    };

    let base_pos = tree.position(chain.base());
    let tip_pos = tree.position(chain.tip());
    let axis = match (tip_pos - base_pos).try_normalize() {
        Some(a) => a,
        None => return,
    };

    // 期望的弯曲方向：极向量位置在链轴法平面上的投影
    let to_pole = pole.position - base_pos;
    let desired = match (to_pole - axis * to_pole.dot(axis)).try_normalize() {
        Some(d) => d,
        None => return,
    };
    let roll = Quat::from_axis_angle(axis, pole.angle);

    let bones = chain.bones();
    for &bone in &bones[1..bones.len() - 1] {
        let offset = tree.position(bone) - base_pos;
        let along = axis * offset.dot(axis);
        let perp = offset - along;
        let length = perp.length();
        if length < 1e-6 {
            continue;
        }
        let current = perp / length;
        let swing = Quat::from_rotation_arc(current, desired);
        tree.set_position(bone, base_pos + along + roll * (swing * perp));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::{Effector, Pole, FABRIK};
    use crate::tree::{tree_local_to_global, TransformMode};

    fn two_segment_chain(target: Vec3) -> (BoneTree, usize, usize, usize) {
        let mut tree = BoneTree::new();
        let root = tree.create_bone("root");
        let a = tree.create_child("a", root, Vec3::Y).unwrap();
        let b = tree.create_child("b", a, Vec3::Y).unwrap();
        tree.attach_effector(b, Effector::new(target)).unwrap();
        tree.update_distances();
        tree_local_to_global(&mut tree, root, TransformMode::BOTH);
        (tree, root, a, b)
    }

    fn solver_for(tree: &BoneTree, root: usize, leaves: &[usize]) -> FabrikSolver {
        let mut st = Subtree::new(root);
        for &l in leaves {
            st.add_leaf(l);
        }
        FabrikSolver::new(Algorithm::new(FABRIK), tree, &st).unwrap()
    }

    #[test]
    fn test_reachable_target_converges() {
        let target = Vec3::new(1.0, 1.0, 0.0);
        let (mut tree, root, _a, b) = two_segment_chain(target);
        let mut solver = solver_for(&tree, root, &[b]);

        let iterations = solver.solve(&mut tree);
        assert!(iterations < 20);
        assert!((tree.position(b) - target).length() < 1e-2);
    }

    #[test]
    fn test_segment_lengths_preserved() {
        let target = Vec3::new(1.0, 1.0, 0.0);
        let (mut tree, root, a, b) = two_segment_chain(target);
        let mut solver = solver_for(&tree, root, &[b]);
        solver.solve(&mut tree);

        let seg1 = (tree.position(a) - tree.position(root)).length();
        let seg2 = (tree.position(b) - tree.position(a)).length();
        assert!((seg1 - 1.0).abs() < 1e-4);
        assert!((seg2 - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_unreachable_target_straightens_chain() {
        // 链总长 2，目标在 5 处，链应指向目标拉直，末端停在 (0, 2, 0)
        let target = Vec3::new(0.0, 5.0, 0.0);
        let (mut tree, root, _a, b) = two_segment_chain(target);
        let mut solver = solver_for(&tree, root, &[b]);

        let iterations = solver.solve(&mut tree);
        assert_eq!(iterations, 20);
        assert!((tree.position(b) - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-3);
    }

    #[test]
    fn test_base_stays_fixed() {
        let target = Vec3::new(1.0, 1.0, 0.0);
        let (mut tree, root, _a, b) = two_segment_chain(target);
        let before = tree.position(root);
        let mut solver = solver_for(&tree, root, &[b]);
        solver.solve(&mut tree);
        assert_eq!(tree.position(root), before);
    }

    #[test]
    fn test_single_bone_region_is_rejected() {
        let mut tree = BoneTree::new();
        let root = tree.create_bone("root");
        tree.attach_effector(root, Effector::default()).unwrap();
        let mut st = Subtree::new(root);
        st.add_leaf(root);

        let err = FabrikSolver::new(Algorithm::new(FABRIK), &tree, &st);
        assert!(matches!(err, Err(IkError::ChainTopology(_))));
    }

    #[test]
    fn test_branched_tree_keeps_segment_lengths() {
        // root -> a -> b (effector)
        //           -> c (effector)
        let mut tree = BoneTree::new();
        let root = tree.create_bone("root");
        let a = tree.create_child("a", root, Vec3::Y).unwrap();
        let b = tree.create_child("b", a, Vec3::Y).unwrap();
        let c = tree.create_child("c", a, Vec3::X).unwrap();
        tree.attach_effector(b, Effector::new(Vec3::new(1.0, 1.5, 0.0)))
            .unwrap();
        tree.attach_effector(c, Effector::new(Vec3::new(-1.0, 1.0, 0.0)))
            .unwrap();
        tree.update_distances();
        tree_local_to_global(&mut tree, root, TransformMode::BOTH);

        let mut solver = solver_for(&tree, root, &[b, c]);
        solver.solve(&mut tree);

        assert!(((tree.position(a) - tree.position(root)).length() - 1.0).abs() < 1e-3);
        assert!(((tree.position(b) - tree.position(a)).length() - 1.0).abs() < 1e-3);
        assert!(((tree.position(c) - tree.position(a)).length() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_sub_base_is_mean_of_child_proposals() {
        // 关于 x=0 平面完全对称的分叉与目标：分叉骨骼是两个镜像提议的
        // 平均，必须正好落在对称平面上
        let mut tree = BoneTree::new();
        let root = tree.create_bone("root");
        let a = tree.create_child("a", root, Vec3::Y).unwrap();
        let b = tree.create_child("b", a, Vec3::new(1.0, 1.0, 0.0)).unwrap();
        let c = tree.create_child("c", a, Vec3::new(-1.0, 1.0, 0.0)).unwrap();
        tree.attach_effector(b, Effector::new(Vec3::new(1.5, 1.5, 0.0)))
            .unwrap();
        tree.attach_effector(c, Effector::new(Vec3::new(-1.5, 1.5, 0.0)))
            .unwrap();
        tree.update_distances();
        tree_local_to_global(&mut tree, root, TransformMode::BOTH);

        let mut solver = solver_for(&tree, root, &[b, c]);
        solver.solve(&mut tree);

        assert!(tree.position(a).x.abs() < 1e-5);
    }

    #[test]
    fn test_zero_length_segment_is_deterministic() {
        let mut tree = BoneTree::new();
        let root = tree.create_bone("root");
        let a = tree.create_child("a", root, Vec3::ZERO).unwrap();
        let b = tree.create_child("b", a, Vec3::Y).unwrap();
        tree.attach_effector(b, Effector::new(Vec3::new(0.0, 1.0, 0.0)))
            .unwrap();
        tree.update_distances();
        tree_local_to_global(&mut tree, root, TransformMode::BOTH);

        let mut solver = solver_for(&tree, root, &[b]);
        solver.solve(&mut tree);
        let first = (tree.position(a), tree.position(b));

        // 同样的输入必须得到同样的结果
        let mut tree2 = BoneTree::new();
        let root2 = tree2.create_bone("root");
        let a2 = tree2.create_child("a", root2, Vec3::ZERO).unwrap();
        let b2 = tree2.create_child("b", a2, Vec3::Y).unwrap();
        tree2
            .attach_effector(b2, Effector::new(Vec3::new(0.0, 1.0, 0.0)))
            .unwrap();
        tree2.update_distances();
        tree_local_to_global(&mut tree2, root2, TransformMode::BOTH);

        let mut solver2 = solver_for(&tree2, root2, &[b2]);
        solver2.solve(&mut tree2);
        assert_eq!(first, (tree2.position(a2), tree2.position(b2)));
    }

    #[test]
    fn test_joint_rotations_follow_segments() {
        let target = Vec3::new(2.0, 0.0, 0.0);
        let mut tree = BoneTree::new();
        let root = tree.create_bone("root");
        let a = tree.create_child("a", root, Vec3::Y).unwrap();
        let b = tree.create_child("b", a, Vec3::Y).unwrap();
        tree.attach_effector(b, Effector::new(target)).unwrap();
        tree.update_distances();
        tree_local_to_global(&mut tree, root, TransformMode::BOTH);

        let mut st = Subtree::new(root);
        st.add_leaf(b);
        let algorithm =
            Algorithm::new(FABRIK).with_features(SolverFeatures::JOINT_ROTATIONS);
        let mut solver = FabrikSolver::new(algorithm, &tree, &st).unwrap();
        solver.solve(&mut tree);

        // 根骨骼的 +Y 应指向求解后的第一段骨段方向
        let seg_dir = (tree.position(a) - tree.position(root)).normalize();
        let bone_dir = tree.rotation(root) * Vec3::Y;
        assert!(bone_dir.dot(seg_dir) > 0.999);
    }

    #[test]
    fn test_pole_pulls_middle_bone_into_plane() {
        // 3 段链，目标可达但留有弯曲余地，极向量指向 +Z
        let mut tree = BoneTree::new();
        let root = tree.create_bone("root");
        let a = tree.create_child("a", root, Vec3::Y).unwrap();
        let b = tree.create_child("b", a, Vec3::Y).unwrap();
        let c = tree.create_child("c", b, Vec3::Y).unwrap();
        tree.attach_effector(c, Effector::new(Vec3::new(0.0, 2.0, 0.0)))
            .unwrap();
        tree.attach_pole(a, Pole::new(Vec3::new(0.0, 1.0, 5.0)))
            .unwrap();
        tree.update_distances();
        tree_local_to_global(&mut tree, root, TransformMode::BOTH);

        let mut st = Subtree::new(root);
        st.add_leaf(c);
        let algorithm = Algorithm::new(FABRIK).with_features(SolverFeatures::POLES);
        let mut solver = FabrikSolver::new(algorithm, &tree, &st).unwrap();
        solver.solve(&mut tree);

        // 中间骨骼不应弯向 -Z 一侧
        assert!(tree.position(a).z >= -1e-4);
        assert!(tree.position(b).z >= -1e-4);
    }
}
