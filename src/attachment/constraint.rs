//! Constraint - 骨段旋转约束
//!
//! 链求解核心只把约束当作一个不透明的 `apply` 步骤调用；具体约束种类在
//! 这里实现（stiff / hinge / cone / 自定义回调）。

use std::fmt;

use glam::{Quat, Vec3};

/// 约束种类
pub enum ConstraintKind {
    /// 固定旋转：骨骼始终保持给定旋转
    Stiff(Quat),
    /// 铰链：只允许绕给定轴旋转，角度限制在 [min, max]（弧度）
    Hinge {
        axis: Vec3,
        min_angle: f32,
        max_angle: f32,
    },
    /// 锥形：旋转轴与中心方向的夹角限制在 max_angle 以内（弧度）
    Cone { center: Vec3, max_angle: f32 },
    /// 自定义回调
    Custom(Box<dyn Fn(Quat) -> Quat + Send>),
}

/// 约束附件，每根骨骼最多一个
pub struct Constraint {
    pub kind: ConstraintKind,
}

impl Constraint {
    pub fn stiff(rotation: Quat) -> Self {
        Self {
            kind: ConstraintKind::Stiff(rotation),
        }
    }

    pub fn hinge(axis: Vec3, min_angle: f32, max_angle: f32) -> Self {
        Self {
            kind: ConstraintKind::Hinge {
                axis: axis.normalize_or_zero(),
                min_angle,
                max_angle,
            },
        }
    }

    pub fn cone(center: Vec3, max_angle: f32) -> Self {
        Self {
            kind: ConstraintKind::Cone {
                center: center.normalize_or_zero(),
                max_angle,
            },
        }
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(Quat) -> Quat + Send + 'static,
    {
        Self {
            kind: ConstraintKind::Custom(Box::new(f)),
        }
    }

    /// 对候选旋转应用约束，返回修正后的旋转
    pub fn apply(&self, rotation: Quat) -> Quat {
        match &self.kind {
            ConstraintKind::Stiff(fixed) => *fixed,

            ConstraintKind::Hinge {
                axis,
                min_angle,
                max_angle,
            } => {
                // 分解出绕铰链轴的扭转分量并截断角度
                let (twist_axis, angle) = rotation.to_axis_angle();
                let signed = angle * twist_axis.dot(*axis).signum();
                let clamped = signed.clamp(*min_angle, *max_angle);
                Quat::from_axis_angle(*axis, clamped)
            }

            ConstraintKind::Cone { center, max_angle } => {
                let direction = rotation * *center;
                let angle = direction.angle_between(*center);
                if angle <= *max_angle {
                    rotation
                } else {
                    let axis = center.cross(direction).normalize_or_zero();
                    if axis == Vec3::ZERO {
                        rotation
                    } else {
                        Quat::from_axis_angle(axis, *max_angle)
                    }
                }
            }

            ConstraintKind::Custom(f) => f(rotation),
        }
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.kind {
            ConstraintKind::Stiff(_) => "stiff",
            ConstraintKind::Hinge { .. } => "hinge",
            ConstraintKind::Cone { .. } => "cone",
            ConstraintKind::Custom(_) => "custom",
        };
        f.debug_struct("Constraint").field("kind", &name).finish()
    }
}
