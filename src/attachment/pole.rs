//! Pole - 极向量提示
//!
//! 对于 2 段以上的链，纯位置求解无法确定绕"基座→末端"轴的滚转方向
//! （典型例子：膝盖朝向）。Pole 给出一个全局空间的提示位置，求解后把
//! 链的中间骨骼摆向该位置所在的平面。

use glam::Vec3;

/// Pole 附件
#[derive(Clone, Copy, Debug)]
pub struct Pole {
    /// 提示位置（全局空间）
    pub position: Vec3,
    /// 附加滚转角（弧度），在极向量平面的基础上再绕链轴旋转
    pub angle: f32,
}

impl Pole {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            angle: 0.0,
        }
    }
}
