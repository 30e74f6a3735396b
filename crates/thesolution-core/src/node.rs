//! 场景节点定义
//!
//! 支持的节点类型（封闭集合）：
//! - 长方体 (Box)
//! - 球体 (Sphere)
//! - 圆柱 (Cylinder)
//! - 圆锥/圆台 (Cone)
//! - 圆环 (Torus)
//! - 装配体 (Assembly)，不带尺寸，仅用于组织子节点

use crate::coordinate::Coordinate;
use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 节点ID
///
/// 在树内唯一；由 [`IdAllocator`](crate::tree::IdAllocator) 生成的ID在同一会话中不会复用。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// 节点类型标签（白名单）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantKind {
    Box,
    Sphere,
    Cylinder,
    Cone,
    Torus,
    Assembly,
}

impl VariantKind {
    pub const ALL: [VariantKind; 6] = [
        VariantKind::Box,
        VariantKind::Sphere,
        VariantKind::Cylinder,
        VariantKind::Cone,
        VariantKind::Torus,
        VariantKind::Assembly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VariantKind::Box => "Box",
            VariantKind::Sphere => "Sphere",
            VariantKind::Cylinder => "Cylinder",
            VariantKind::Cone => "Cone",
            VariantKind::Torus => "Torus",
            VariantKind::Assembly => "Assembly",
        }
    }

    /// 精确匹配标签，未知标签返回 `None`
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }

    /// 该类型要求的尺寸字段名（线格式中的键）
    pub fn dimension_names(&self) -> &'static [&'static str] {
        match self {
            VariantKind::Box => &["width", "height", "depth"],
            VariantKind::Sphere => &["radius"],
            VariantKind::Cylinder => &["radius", "height"],
            VariantKind::Cone => &["radius1", "radius2", "height"],
            VariantKind::Torus => &["majorRadius", "minorRadius"],
            VariantKind::Assembly => &[],
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 节点类型及其尺寸
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Box { width: f64, height: f64, depth: f64 },
    Sphere { radius: f64 },
    Cylinder { radius: f64, height: f64 },
    Cone { radius1: f64, radius2: f64, height: f64 },
    Torus { major_radius: f64, minor_radius: f64 },
    Assembly,
}

impl Variant {
    pub fn kind(&self) -> VariantKind {
        match self {
            Variant::Box { .. } => VariantKind::Box,
            Variant::Sphere { .. } => VariantKind::Sphere,
            Variant::Cylinder { .. } => VariantKind::Cylinder,
            Variant::Cone { .. } => VariantKind::Cone,
            Variant::Torus { .. } => VariantKind::Torus,
            Variant::Assembly => VariantKind::Assembly,
        }
    }

    /// 尺寸值，顺序与 [`VariantKind::dimension_names`] 一致
    pub fn dimensions(&self) -> Vec<f64> {
        match *self {
            Variant::Box {
                width,
                height,
                depth,
            } => vec![width, height, depth],
            Variant::Sphere { radius } => vec![radius],
            Variant::Cylinder { radius, height } => vec![radius, height],
            Variant::Cone {
                radius1,
                radius2,
                height,
            } => vec![radius1, radius2, height],
            Variant::Torus {
                major_radius,
                minor_radius,
            } => vec![major_radius, minor_radius],
            Variant::Assembly => Vec::new(),
        }
    }

    /// 按类型和尺寸值重建（值的顺序同 `dimension_names`）
    pub fn from_dimensions(kind: VariantKind, values: &[f64]) -> Result<Self> {
        let expected = kind.dimension_names().len();
        if values.len() != expected {
            return Err(ModelError::Validation(format!(
                "{} expects {} dimensions, got {}",
                kind,
                expected,
                values.len()
            )));
        }

        let variant = match kind {
            VariantKind::Box => Variant::Box {
                width: values[0],
                height: values[1],
                depth: values[2],
            },
            VariantKind::Sphere => Variant::Sphere { radius: values[0] },
            VariantKind::Cylinder => Variant::Cylinder {
                radius: values[0],
                height: values[1],
            },
            VariantKind::Cone => Variant::Cone {
                radius1: values[0],
                radius2: values[1],
                height: values[2],
            },
            VariantKind::Torus => Variant::Torus {
                major_radius: values[0],
                minor_radius: values[1],
            },
            VariantKind::Assembly => Variant::Assembly,
        };

        variant.validate()?;
        Ok(variant)
    }

    /// 所有尺寸必须有限且非负
    pub fn validate(&self) -> Result<()> {
        let kind = self.kind();
        for (name, value) in kind.dimension_names().iter().zip(self.dimensions()) {
            if !value.is_finite() || value < 0.0 {
                return Err(ModelError::Validation(format!(
                    "{kind}.{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// 材质
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    /// 密度（> 0）
    pub density: f64,
    /// RGB 颜色
    pub color: [u8; 3],
    /// 透明度，0.0 不透明，1.0 全透明
    pub transparency: f64,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            density: 1.0,
            color: [128, 128, 128],
            transparency: 0.0,
        }
    }
}

impl Material {
    pub fn new(name: impl Into<String>, density: f64) -> Self {
        Self {
            name: name.into(),
            density,
            ..Default::default()
        }
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }

    pub fn with_transparency(mut self, transparency: f64) -> Self {
        self.transparency = transparency;
        self
    }

    pub fn is_transparent(&self) -> bool {
        self.transparency > 0.0
    }

    pub fn validate(&self) -> Result<()> {
        if !self.density.is_finite() || self.density <= 0.0 {
            return Err(ModelError::Validation(format!(
                "material density must be a finite number > 0, got {}",
                self.density
            )));
        }
        if !self.transparency.is_finite() || !(0.0..=1.0).contains(&self.transparency) {
            return Err(ModelError::Validation(format!(
                "material transparency must be within [0, 1], got {}",
                self.transparency
            )));
        }
        Ok(())
    }
}

/// 自定义属性值
///
/// 只允许少数几种标量，保证文件格式封闭。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl PropertyValue {
    pub fn validate(&self) -> Result<()> {
        match self {
            PropertyValue::Real(v) if !v.is_finite() => Err(ModelError::Validation(format!(
                "property value must be finite, got {v}"
            ))),
            _ => Ok(()),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Integer(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Real(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Text(v)
    }
}

pub(crate) fn validate_coordinate(coordinate: &Coordinate) -> Result<()> {
    if coordinate.is_finite() {
        Ok(())
    } else {
        Err(ModelError::Validation(format!(
            "coordinate values must be finite, got {coordinate:?}"
        )))
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ModelError::Validation("name must not be empty".to_string()));
    }
    Ok(())
}

/// 场景节点
///
/// 父子关系字段只由 [`Tree`](crate::tree::Tree) 维护；
/// 其余属性通过带校验的 setter 修改。
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    name: String,
    variant: Variant,
    coordinate: Coordinate,
    material: Material,
    visible: bool,
    locked: bool,
    description: String,
    tags: Vec<String>,
    properties: BTreeMap<String, PropertyValue>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    /// 创建节点（材质取默认值，无子节点）
    pub fn new(
        id: NodeId,
        name: impl Into<String>,
        variant: Variant,
        coordinate: Coordinate,
    ) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        variant.validate()?;
        validate_coordinate(&coordinate)?;

        Ok(Self {
            id,
            name,
            variant,
            coordinate,
            material: Material::default(),
            visible: true,
            locked: false,
            description: String::new(),
            tags: Vec::new(),
            properties: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
        })
    }

    pub fn with_material(mut self, material: Material) -> Result<Self> {
        self.set_material(material)?;
        Ok(self)
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variant(&self) -> &Variant {
        &self.variant
    }

    pub fn kind(&self) -> VariantKind {
        self.variant.kind()
    }

    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn parent(&self) -> Option<&NodeId> {
        self.parent.as_ref()
    }

    /// 子节点ID（按存储顺序）
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        validate_name(&name)?;
        self.name = name;
        Ok(())
    }

    pub fn set_variant(&mut self, variant: Variant) -> Result<()> {
        variant.validate()?;
        self.variant = variant;
        Ok(())
    }

    pub fn set_coordinate(&mut self, coordinate: Coordinate) -> Result<()> {
        validate_coordinate(&coordinate)?;
        self.coordinate = coordinate;
        Ok(())
    }

    /// 移动到指定位置（保留方向）
    pub fn move_to(&mut self, x: f64, y: f64, z: f64) -> Result<()> {
        self.set_coordinate(Coordinate { x, y, z, ..self.coordinate })
    }

    pub fn translate(&mut self, dx: f64, dy: f64, dz: f64) -> Result<()> {
        self.set_coordinate(self.coordinate.translated(dx, dy, dz))
    }

    pub fn set_orientation(&mut self, a: f64, b: f64, c: f64) -> Result<()> {
        self.set_coordinate(Coordinate { a, b, c, ..self.coordinate })
    }

    pub fn set_material(&mut self, material: Material) -> Result<()> {
        material.validate()?;
        self.material = material;
        Ok(())
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn set_tags(&mut self, tags: Vec<String>) {
        self.tags = tags;
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn set_property(
        &mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Result<()> {
        let key = key.into();
        if key.is_empty() {
            return Err(ModelError::Validation(
                "property key must not be empty".to_string(),
            ));
        }
        let value = value.into();
        value.validate()?;
        self.properties.insert(key, value);
        Ok(())
    }

    pub fn remove_property(&mut self, key: &str) -> Option<PropertyValue> {
        self.properties.remove(key)
    }

    /// 复制节点内容（不含父子关系），赋予新ID
    pub(crate) fn detached_copy(&self, id: NodeId) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            ..self.clone()
        }
    }
}
