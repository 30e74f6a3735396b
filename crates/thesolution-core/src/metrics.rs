//! 几何度量
//!
//! 根据节点类型和尺寸计算体积与表面积，仅用于显示和校验，
//! 不参与任何结构决策。

use crate::node::Variant;
use std::f64::consts::PI;
use std::ops::{Add, AddAssign};

/// 体积与表面积
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Metrics {
    pub volume: f64,
    pub surface_area: f64,
}

impl Add for Metrics {
    type Output = Metrics;

    fn add(self, rhs: Metrics) -> Metrics {
        Metrics {
            volume: self.volume + rhs.volume,
            surface_area: self.surface_area + rhs.surface_area,
        }
    }
}

impl AddAssign for Metrics {
    fn add_assign(&mut self, rhs: Metrics) {
        *self = *self + rhs;
    }
}

/// 计算单个图元的度量，装配体为零
pub fn metrics(variant: &Variant) -> Metrics {
    match *variant {
        Variant::Box {
            width,
            height,
            depth,
        } => Metrics {
            volume: width * height * depth,
            surface_area: 2.0 * (width * height + height * depth + width * depth),
        },
        Variant::Sphere { radius } => Metrics {
            volume: 4.0 / 3.0 * PI * radius.powi(3),
            surface_area: 4.0 * PI * radius.powi(2),
        },
        Variant::Cylinder { radius, height } => Metrics {
            volume: PI * radius.powi(2) * height,
            surface_area: 2.0 * PI * radius * (radius + height),
        },
        // 圆台：r1 底面半径，r2 顶面半径（r2 = 0 时为圆锥）
        Variant::Cone {
            radius1,
            radius2,
            height,
        } => {
            let slant = ((radius1 - radius2).powi(2) + height.powi(2)).sqrt();
            Metrics {
                volume: PI * height / 3.0
                    * (radius1.powi(2) + radius1 * radius2 + radius2.powi(2)),
                surface_area: PI * (radius1 + radius2) * slant
                    + PI * radius1.powi(2)
                    + PI * radius2.powi(2),
            }
        }
        Variant::Torus {
            major_radius,
            minor_radius,
        } => Metrics {
            volume: 2.0 * PI * PI * major_radius * minor_radius.powi(2),
            surface_area: 4.0 * PI * PI * major_radius * minor_radius,
        },
        Variant::Assembly => Metrics::default(),
    }
}

/// 子树汇总度量
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SubtreeMetrics {
    pub metrics: Metrics,
    /// 质量 = Σ 体积 × 密度
    pub mass: f64,
    /// 参与汇总的图元数量（不含装配体）
    pub primitive_count: usize,
}
