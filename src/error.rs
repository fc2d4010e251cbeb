//! 错误类型定义
//!
//! 构建期错误（子树划分 / 链树构建 / 求解器组装）通过 `Result` 显式返回。
//! 求解期的数值退化情况（零长度骨段、目标不可达）由求解器内部确定性处理，
//! 不作为错误上报。

use thiserror::Error;

/// IK 库统一错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IkError {
    /// 整棵树上没有任何 Effector，无法构建求解器
    #[error("no effectors were found in the tree")]
    NoEffectorsFound,

    /// 某个区域有 Effector 但祖先链上找不到算法附件
    #[error("no algorithm is reachable from the subtree rooted at bone {0}")]
    NoAlgorithmsFound(usize),

    /// 标记阶段发现叶子骨骼既无子骨骼也无 Effector（输入不一致）
    #[error("bone {0} is a leaf without an effector, tree marking is inconsistent")]
    MarkingInconsistency(usize),

    /// 骨骼上已存在同类附件
    #[error("bone {0} already has an attachment of this kind")]
    AlreadyHasAttachment(usize),

    /// 链拓扑不满足求解器要求（如 FABRIK 要求链上至少 2 根骨骼）
    #[error("chain topology is invalid: {0}")]
    ChainTopology(String),

    /// 算法名未在注册表中登记
    #[error("algorithm `{0}` is not registered")]
    UnknownAlgorithm(String),

    /// 注册表中已存在同名算法
    #[error("algorithm `{0}` is already registered")]
    DuplicateAlgorithm(String),

    /// 无效的骨骼句柄
    #[error("bone handle {0} is out of bounds")]
    InvalidHandle(usize),
}
