//! 坐标系
//!
//! 每个节点携带一个相对于父节点的局部坐标系：
//! - `x, y, z`: 位置偏移
//! - `a, b, c`: 各轴方向系数（按轴缩放）
//!
//! 组合规则 `compose(parent, local)`：
//! - 位置 = 父位置 + 父方向 ⊙ 局部位置
//! - 方向 = 父方向 ⊙ 局部方向
//!
//! 该运算满足结合律，单位元为 `(0, 0, 0, 1, 1, 1)`。

use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};

/// 局部坐标系（六个有限标量）
///
/// 构造本身不做校验；非有限值由构造坐标的调用方拒绝。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Default for Coordinate {
    fn default() -> Self {
        Self::identity()
    }
}

impl Coordinate {
    pub fn new(x: f64, y: f64, z: f64, a: f64, b: f64, c: f64) -> Self {
        Self { x, y, z, a, b, c }
    }

    /// 单位坐标系：原点，方向系数均为 1
    pub const fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            a: 1.0,
            b: 1.0,
            c: 1.0,
        }
    }

    /// 仅指定位置，方向取单位值
    pub fn at(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            ..Self::identity()
        }
    }

    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    pub fn orientation(&self) -> Vector3<f64> {
        Vector3::new(self.a, self.b, self.c)
    }

    fn from_parts(position: Vector3<f64>, orientation: Vector3<f64>) -> Self {
        Self::new(
            position.x,
            position.y,
            position.z,
            orientation.x,
            orientation.y,
            orientation.z,
        )
    }

    /// 将局部坐标系挂到父坐标系下，得到父坐标系所在空间中的坐标系
    pub fn compose(parent: &Coordinate, local: &Coordinate) -> Coordinate {
        let scale = parent.orientation();
        let position = parent.position() + scale.component_mul(&local.position());
        let orientation = scale.component_mul(&local.orientation());
        Self::from_parts(position, orientation)
    }

    /// 逐位精确比较（不使用容差）
    pub fn equals(a: &Coordinate, b: &Coordinate) -> bool {
        a == b
    }

    /// 六个分量是否全部有限
    pub fn is_finite(&self) -> bool {
        [self.x, self.y, self.z, self.a, self.b, self.c]
            .iter()
            .all(|v| v.is_finite())
    }

    /// 平移后的坐标系
    pub fn translated(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
            ..*self
        }
    }

    /// 两个坐标系原点之间的距离
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        (self.position() - other.position()).norm()
    }

    /// 4x4 齐次变换矩阵（对角缩放 + 平移）
    pub fn to_matrix(&self) -> Matrix4<f64> {
        let mut matrix = Matrix4::from_diagonal(&self.orientation().push(1.0));
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.position());
        matrix
    }
}
