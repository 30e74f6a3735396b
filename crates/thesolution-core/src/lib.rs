//! TheSolution 对象模型
//!
//! 参数化场景图：图元与装配体按坐标层级组织，
//! 每个节点的局部坐标系相对于父节点。
//!
//! # 架构设计
//!
//! - `Coordinate`: 六分量局部坐标系及其组合运算
//! - `Node`: 带类型标签的节点（长方体、球体、圆柱、圆锥、圆环、装配体）
//! - `Tree`: 中心节点表 + 父子关系维护 + 绝对坐标解析
//!
//! # 示例
//!
//! ```rust
//! use thesolution_core::prelude::*;
//!
//! let mut tree = Tree::new();
//! let root = tree.new_node("Frame", Variant::Assembly, Coordinate::identity()).unwrap();
//! let root = tree.add_root(root).unwrap();
//!
//! let part = tree
//!     .new_node(
//!         "Plate",
//!         Variant::Box { width: 10.0, height: 1.0, depth: 10.0 },
//!         Coordinate::at(10.0, 0.0, 0.0),
//!     )
//!     .unwrap();
//! let part = tree.add_child(&root, part).unwrap();
//!
//! println!("Plate at x = {}", tree.absolute_coordinate(&part).unwrap().x);
//! ```

pub mod coordinate;
pub mod error;
pub mod metrics;
pub mod node;
pub mod tree;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::coordinate::Coordinate;
    pub use crate::error::ModelError;
    pub use crate::metrics::{metrics, Metrics, SubtreeMetrics};
    pub use crate::node::{Material, Node, NodeId, PropertyValue, Variant, VariantKind};
    pub use crate::tree::{IdAllocator, Tree, Walk};
}
