//! 线格式定义（信封）
//!
//! ```text
//! {
//!   "formatTag": "TheSolutionProject",
//!   "formatVersion": "1.0",
//!   "metadata": { "name": ..., ...调用方字段... },
//!   "nodes": [ NodeRecord, ... ],
//!   "checksum": "<sha256 hex>"
//! }
//! ```
//!
//! 树被展平为节点列表，每条记录通过 `parentId` 显式引用父节点，
//! 局部损坏只影响单条记录，孤立的父引用也能被低成本发现。

use crate::error::{FileError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thesolution_core::coordinate::Coordinate;
use thesolution_core::node::{Material, PropertyValue, Variant, VariantKind};

/// 格式标签
pub const FORMAT_TAG: &str = "TheSolutionProject";

/// 当前写出的格式版本
pub const FORMAT_VERSION: &str = "1.0";

/// 本版本能够读取的格式版本
pub const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

/// 项目文件扩展名
pub const PROJECT_EXTENSION: &str = "3d_sol";

/// 元数据中由格式本身占用的键，调用方字段不能使用
pub const RESERVED_METADATA_KEYS: &[&str] =
    &["name", "description", "author", "createdAt", "nodeCount"];

/// 项目元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// 写出时的节点数
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_count: Option<usize>,

    /// 调用方自定义字段（仅限标量）
    #[serde(flatten)]
    pub extra: BTreeMap<String, PropertyValue>,
}

impl ProjectMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            author: String::new(),
            created_at: None,
            node_count: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// 调用方字段：键非空且不占用保留键，值为有限标量
    pub fn validate(&self) -> Result<()> {
        for (key, value) in &self.extra {
            if key.is_empty() {
                return Err(FileError::Validation(
                    "metadata field name must not be empty".to_string(),
                ));
            }
            if RESERVED_METADATA_KEYS.contains(&key.as_str()) {
                return Err(FileError::Validation(format!(
                    "metadata field '{key}' is reserved"
                )));
            }
            value
                .validate()
                .map_err(|e| FileError::Validation(format!("metadata field '{key}': {e}")))?;
        }
        Ok(())
    }
}

/// 单个节点记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NodeRecord {
    pub id: String,

    /// 根节点为 `null`
    pub parent_id: Option<String>,

    pub variant: VariantKind,

    pub name: String,

    pub coordinate: Coordinate,

    /// 类型相关尺寸，键名见 [`VariantKind::dimension_names`]
    #[serde(default)]
    pub dimensions: BTreeMap<String, f64>,

    pub material: Material,

    pub visible: bool,

    pub locked: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl NodeRecord {
    /// 按类型读取尺寸：必须恰好包含该类型要求的字段
    pub fn to_variant(&self) -> Result<Variant> {
        let names = self.variant.dimension_names();

        if let Some(unexpected) = self.dimensions.keys().find(|k| !names.contains(&k.as_str())) {
            return Err(FileError::Validation(format!(
                "node {}: unexpected dimension '{}' for {}",
                self.id, unexpected, self.variant
            )));
        }

        let values = names
            .iter()
            .map(|name| {
                self.dimensions.get(*name).copied().ok_or_else(|| {
                    FileError::Validation(format!(
                        "node {}: missing dimension '{}' for {}",
                        self.id, name, self.variant
                    ))
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        Variant::from_dimensions(self.variant, &values).map_err(|e| self.context(e.into()))
    }

    /// 记录级数值域检查（不涉及其它记录）
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(FileError::Validation("node id must not be empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(FileError::Validation(format!(
                "node {}: name must not be empty",
                self.id
            )));
        }
        if !self.coordinate.is_finite() {
            return Err(FileError::Validation(format!(
                "node {}: coordinate values must be finite",
                self.id
            )));
        }

        self.to_variant()?;
        self.material.validate().map_err(|e| self.context(e.into()))?;
        for value in self.properties.values() {
            value.validate().map_err(|e| self.context(e.into()))?;
        }
        Ok(())
    }

    fn context(&self, error: FileError) -> FileError {
        match error {
            FileError::Validation(msg) => {
                FileError::Validation(format!("node {}: {}", self.id, msg))
            }
            other => other,
        }
    }
}

/// 完整信封
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub format_tag: String,
    pub format_version: String,
    pub metadata: ProjectMetadata,
    pub nodes: Vec<NodeRecord>,
    pub checksum: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(variant: VariantKind, dimensions: &[(&str, f64)]) -> NodeRecord {
        NodeRecord {
            id: "n-1".to_string(),
            parent_id: None,
            variant,
            name: "Part".to_string(),
            coordinate: Coordinate::identity(),
            dimensions: dimensions.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            material: Material::default(),
            visible: true,
            locked: false,
            description: String::new(),
            tags: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    #[test]
    fn test_record_wire_names() {
        let rec = record(VariantKind::Torus, &[("majorRadius", 10.0), ("minorRadius", 2.0)]);
        let json = serde_json::to_value(&rec).unwrap();

        assert_eq!(json["parentId"], serde_json::Value::Null);
        assert_eq!(json["variant"], "Torus");
        assert_eq!(json["dimensions"]["majorRadius"], 10.0);
        assert_eq!(json["material"]["color"], serde_json::json!([128, 128, 128]));
        assert!(json.get("tags").is_none());
    }

    #[test]
    fn test_to_variant() {
        let rec = record(VariantKind::Cylinder, &[("radius", 3.0), ("height", 8.0)]);
        assert_eq!(
            rec.to_variant().unwrap(),
            Variant::Cylinder {
                radius: 3.0,
                height: 8.0
            }
        );
        assert!(rec.validate().is_ok());
    }

    #[test]
    fn test_missing_and_extra_dimensions() {
        let missing = record(VariantKind::Box, &[("width", 1.0), ("height", 1.0)]);
        assert!(matches!(missing.validate(), Err(FileError::Validation(_))));

        let extra = record(VariantKind::Sphere, &[("radius", 1.0), ("payload", 1.0)]);
        assert!(matches!(extra.validate(), Err(FileError::Validation(_))));

        let assembly = record(VariantKind::Assembly, &[]);
        assert!(assembly.validate().is_ok());
    }

    #[test]
    fn test_domain_checks() {
        let negative = record(VariantKind::Sphere, &[("radius", -1.0)]);
        assert!(matches!(negative.validate(), Err(FileError::Validation(_))));

        let mut heavy = record(VariantKind::Sphere, &[("radius", 1.0)]);
        heavy.material.density = 0.0;
        assert!(matches!(heavy.validate(), Err(FileError::Validation(_))));

        let mut unnamed = record(VariantKind::Sphere, &[("radius", 1.0)]);
        unnamed.name = String::new();
        assert!(matches!(unnamed.validate(), Err(FileError::Validation(_))));
    }

    #[test]
    fn test_unknown_record_field_rejected() {
        let mut json =
            serde_json::to_value(record(VariantKind::Sphere, &[("radius", 1.0)])).unwrap();
        json["script"] = serde_json::json!("os.system('rm -rf /')");
        assert!(serde_json::from_value::<NodeRecord>(json).is_err());
    }

    #[test]
    fn test_metadata_extra_fields() {
        let meta = ProjectMetadata::new("Demo")
            .with_author("alice")
            .with_field("revision", 3i64);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["revision"], 3);
        assert!(json.get("description").is_none());

        let back: ProjectMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);

        assert!(meta.validate().is_ok());

        // 非标量自定义字段不被接受
        let nested = serde_json::json!({ "name": "Demo", "blob": { "a": 1 } });
        assert!(serde_json::from_value::<ProjectMetadata>(nested).is_err());
    }

    #[test]
    fn test_metadata_reserved_keys() {
        for key in RESERVED_METADATA_KEYS {
            let meta = ProjectMetadata::new("Demo").with_field(*key, "many");
            assert!(
                matches!(meta.validate(), Err(FileError::Validation(_))),
                "{key} accepted"
            );
        }

        let meta = ProjectMetadata::new("Demo").with_field("ratio", f64::NAN);
        assert!(matches!(meta.validate(), Err(FileError::Validation(_))));

        let meta = ProjectMetadata::new("Demo").with_field("", true);
        assert!(matches!(meta.validate(), Err(FileError::Validation(_))));
    }
}
