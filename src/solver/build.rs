//! 求解器组装 - 标记、区域划分、算法注册表
//!
//! 组装分三步：
//! 1. 标记：从每个 Effector 骨骼沿父链向上走（受 chain_length 限制），
//!    给途经骨骼打标记。重叠的链会合并成同一区域。
//! 2. 划分：自根向下扫描标记，切出若干 Subtree 区域。
//! 3. 实例化：每个区域查找最近的算法附件（自身或祖先），从注册表取
//!    对应工厂创建区域求解器。深处的区域排在前面，先求解。

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::attachment::{Algorithm, FABRIK};
use crate::error::IkError;
use crate::tree::BoneTree;

use super::fabrik::FabrikSolver;
use super::subtree::Subtree;
use super::RegionSolver;

// ============================================================================
// 标记
// ============================================================================

/// 骨骼在区域划分中的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mark {
    /// 区域内部骨骼
    Section,
    /// 区域根
    Begin,
    /// 区域叶（带 Effector）
    End,
    /// 既是下方区域的叶，又是上方区域的根（中途带 Effector 的骨骼）
    BeginAndEnd,
}

/// 收集带 Effector 的骨骼，子骨骼优先（后序遍历）
///
/// 后序保证深处的 Effector 先处理，标记合并与区域排序都依赖这个顺序。
pub(crate) fn find_effector_bones(tree: &BoneTree, root: usize) -> Vec<usize> {
    fn recurse(tree: &BoneTree, bone: usize, out: &mut Vec<usize>) {
        for i in 0..tree.children(bone).len() {
            recurse(tree, tree.children(bone)[i], out);
        }
        if tree.bone(bone).effector.is_some() {
            out.push(bone);
        }
    }
    let mut out = Vec::new();
    recurse(tree, root, &mut out);
    out
}

/// 从每个 Effector 骨骼向根方向走，给途经骨骼打标记
///
/// 走到以下任一情况停止：
/// - chain_length 耗尽（0 = 不限制）
/// - 到达构建根或树根
/// - 遇到带算法附件的中途骨骼（算法附件界定区域边界）
///
/// 标记冲突时 Section 覆盖 Begin：说明另一条更长的链穿过了这里，
/// 两个区域合并。其余冲突保留先到的标记，结果与遍历顺序无关。
pub(crate) fn mark_bones(
    tree: &BoneTree,
    root: usize,
    effector_bones: &[usize],
) -> Result<HashMap<usize, Mark>, IkError> {
    let mut marks = HashMap::new();

    for &effector_bone in effector_bones {
        let chain_length = tree
            .bone(effector_bone)
            .effector
            .as_ref()
            .map(|e| e.chain_length)
            .unwrap_or(0);

        let mut bone = effector_bone;
        let mut depth: u16 = 0;
        loop {
            let has_effector = tree.bone(bone).effector.is_some();
            let has_children = !tree.children(bone).is_empty();
            let has_algorithm = tree.bone(bone).algorithm.is_some();
            let at_root = bone == root || tree.bone(bone).parent_id().is_none();
            let is_end = at_root
                || (chain_length > 0 && depth == chain_length)
                || (has_algorithm && bone != effector_bone);

            let mark = if has_effector {
                if has_children {
                    Mark::BeginAndEnd
                } else {
                    Mark::End
                }
            } else if has_children {
                if is_end {
                    Mark::Begin
                } else {
                    Mark::Section
                }
            } else {
                return Err(IkError::MarkingInconsistency(bone));
            };

            match marks.entry(bone) {
                Entry::Vacant(v) => {
                    v.insert(mark);
                }
                Entry::Occupied(mut o) => {
                    if mark == Mark::Section {
                        o.insert(Mark::Section);
                    }
                }
            }

            if is_end {
                break;
            }
            bone = match tree.bone(bone).parent_id() {
                Some(p) => p,
                None => break,
            };
            depth += 1;
        }
    }

    Ok(marks)
}

// ============================================================================
// 划分
// ============================================================================

/// 自根向下扫描标记，切出区域
///
/// Begin / BeginAndEnd 开新区域，End / BeginAndEnd 给当前区域登记叶。
/// 未标记的骨骼不属于任何区域，但继续向下扫描，保证更深处与上方不相连
/// 的独立区域也能被发现。没有叶的区域（标记的副产物）被丢弃。
pub(crate) fn split_into_subtrees(
    tree: &BoneTree,
    root: usize,
    marks: &HashMap<usize, Mark>,
) -> Vec<Subtree> {
    fn recurse(
        tree: &BoneTree,
        bone: usize,
        marks: &HashMap<usize, Mark>,
        mut current: Option<usize>,
        out: &mut Vec<Subtree>,
    ) {
        match marks.get(&bone) {
            Some(Mark::Begin) => {
                out.push(Subtree::new(bone));
                current = Some(out.len() - 1);
            }
            Some(Mark::BeginAndEnd) => {
                if let Some(i) = current {
                    out[i].add_leaf(bone);
                }
                out.push(Subtree::new(bone));
                current = Some(out.len() - 1);
            }
            Some(Mark::End) => {
                if let Some(i) = current {
                    out[i].add_leaf(bone);
                }
                current = None;
            }
            Some(Mark::Section) => {}
            None => current = None,
        }
        for i in 0..tree.children(bone).len() {
            recurse(tree, tree.children(bone)[i], marks, current, out);
        }
    }

    let mut out = Vec::new();
    recurse(tree, root, marks, None, &mut out);
    out.retain(|s| !s.leaves.is_empty());
    out
}

/// 从区域根开始沿祖先链查找最近的算法附件（含自身）
fn find_algorithm(tree: &BoneTree, region_root: usize) -> Result<Algorithm, IkError> {
    let mut bone = region_root;
    loop {
        if let Some(a) = &tree.bone(bone).algorithm {
            return Ok(a.clone());
        }
        bone = match tree.bone(bone).parent_id() {
            Some(p) => p,
            None => {
                log::error!("[IK] no algorithm is reachable from the region rooted at bone {region_root}");
                return Err(IkError::NoAlgorithmsFound(region_root));
            }
        };
    }
}

// ============================================================================
// 注册表
// ============================================================================

/// 区域求解器工厂
pub type SolverFactory =
    fn(Algorithm, &BoneTree, &Subtree) -> Result<Box<dyn RegionSolver>, IkError>;

/// 算法名 → 求解器工厂 的注册表
#[derive(Default)]
pub struct SolverRegistry {
    factories: HashMap<String, SolverFactory>,
}

impl SolverRegistry {
    /// 空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册内建算法的注册表
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        // 注册表自己构造的默认项不会重名
        let _ = registry.register(FABRIK, fabrik_factory);
        registry
    }

    /// 登记一个算法工厂，重名报 DuplicateAlgorithm
    pub fn register(&mut self, name: &str, factory: SolverFactory) -> Result<(), IkError> {
        match self.factories.entry(name.to_string()) {
            Entry::Vacant(v) => {
                v.insert(factory);
                Ok(())
            }
            Entry::Occupied(_) => Err(IkError::DuplicateAlgorithm(name.to_string())),
        }
    }

    /// 按名字取工厂
    pub fn factory(&self, name: &str) -> Option<SolverFactory> {
        self.factories.get(name).copied()
    }
}

fn fabrik_factory(
    algorithm: Algorithm,
    tree: &BoneTree,
    subtree: &Subtree,
) -> Result<Box<dyn RegionSolver>, IkError> {
    Ok(Box::new(FabrikSolver::new(algorithm, tree, subtree)?))
}

static DEFAULT_REGISTRY: Lazy<SolverRegistry> = Lazy::new(SolverRegistry::with_defaults);

pub(crate) fn default_registry() -> &'static SolverRegistry {
    &DEFAULT_REGISTRY
}

// ============================================================================
// 组装
// ============================================================================

/// 划分区域并创建区域求解器，深处的区域排在前面
pub(crate) fn build_region_solvers(
    tree: &BoneTree,
    root: usize,
    registry: &SolverRegistry,
) -> Result<Vec<Box<dyn RegionSolver>>, IkError> {
    let effector_bones = find_effector_bones(tree, root);
    if effector_bones.is_empty() {
        log::warn!("[IK] no effectors were found in the tree under bone {root}");
        return Err(IkError::NoEffectorsFound);
    }

    let marks = mark_bones(tree, root, &effector_bones)?;
    let subtrees = split_into_subtrees(tree, root, &marks);
    if subtrees.is_empty() {
        // 有 Effector 却切不出区域：Effector 落在构建根上等退化输入
        log::error!("[IK] effectors are present but no solvable region could be formed under bone {root}");
        return Err(IkError::ChainTopology(
            "effectors are present but no solvable region could be formed".to_string(),
        ));
    }

    let mut solvers: Vec<Box<dyn RegionSolver>> = Vec::new();
    // 划分是先序输出（根侧在前），倒序创建让深处区域先求解
    for subtree in subtrees.iter().rev() {
        let algorithm = find_algorithm(tree, subtree.root)?;
        let factory = registry
            .factory(&algorithm.name)
            .ok_or_else(|| IkError::UnknownAlgorithm(algorithm.name.clone()))?;
        solvers.push(factory(algorithm, tree, subtree)?);
    }

    log::debug!(
        "[IK] built {} solver region(s) under bone {}",
        solvers.len(),
        root
    );
    Ok(solvers)
}
