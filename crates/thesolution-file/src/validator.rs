//! 信封校验器
//!
//! 在信任任何节点数据之前依次执行：
//! 1. 大小检查：原始字节超过上限时直接拒绝，不做解析
//! 2. 解析检查：必须是合法 JSON
//! 3. 信封结构检查：格式标签、版本、元数据
//! 4. 数量检查：节点数上限
//! 5. 逐节点检查：类型白名单、数值域、ID 唯一、父引用存在且无环
//! 6. 完整性检查：重新计算校验和并比较
//!
//! 廉价检查在前，昂贵检查在后；任一检查失败立即终止。

use crate::checksum;
use crate::config::StoreConfig;
use crate::error::{FileError, Result};
use crate::schema::{Envelope, NodeRecord, ProjectMetadata, FORMAT_TAG, SUPPORTED_VERSIONS};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use thesolution_core::node::VariantKind;

/// 预览信息（只执行前四项检查）
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectInfo {
    pub metadata: ProjectMetadata,
    pub format_version: String,
    pub node_count: usize,
    pub byte_size: u64,
}

/// 通过前四项检查后的信封
struct Shaped {
    root: Map<String, Value>,
    metadata: ProjectMetadata,
    format_version: String,
    checksum: String,
}

impl Shaped {
    fn nodes(&self) -> &[Value] {
        self.root
            .get("nodes")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

pub struct Validator<'a> {
    config: &'a StoreConfig,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Validator<'a> {
    pub fn new(config: &'a StoreConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// 逐节点检查之间轮询的取消标志
    pub fn with_cancel_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// 执行前四项检查，返回元数据和节点数，不构建树
    pub fn inspect(&self, payload: &[u8]) -> Result<ProjectInfo> {
        let shaped = self.shape(payload)?;
        Ok(ProjectInfo {
            node_count: shaped.nodes().len(),
            metadata: shaped.metadata,
            format_version: shaped.format_version,
            byte_size: payload.len() as u64,
        })
    }

    /// 执行全部六项检查，返回可以安全解码的信封
    pub fn validate(&self, payload: &[u8]) -> Result<Envelope> {
        let shaped = self.shape(payload)?;
        let nodes = self.check_nodes(shaped.nodes())?;
        self.check_integrity(&shaped)?;

        Ok(Envelope {
            format_tag: FORMAT_TAG.to_string(),
            format_version: shaped.format_version,
            metadata: shaped.metadata,
            nodes,
            checksum: shaped.checksum,
        })
    }

    /// 检查 1-4
    fn shape(&self, payload: &[u8]) -> Result<Shaped> {
        self.check_size(payload.len() as u64)?;

        let root = match serde_json::from_slice::<Value>(payload) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return Err(FileError::Format(
                    "top-level value must be an object".to_string(),
                ))
            }
            Err(e) => return Err(FileError::Parse(e.to_string())),
        };
        tracing::debug!("Parsed {} byte payload", payload.len());

        let (metadata, format_version, checksum) = Self::check_envelope(&root)?;

        let count = root
            .get("nodes")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or_default();
        self.check_count(count)?;

        Ok(Shaped {
            root,
            metadata,
            format_version,
            checksum,
        })
    }

    /// 检查 1：大小
    pub fn check_size(&self, size: u64) -> Result<()> {
        if size > self.config.max_file_size {
            tracing::warn!(
                "Rejecting payload of {} bytes (limit {})",
                size,
                self.config.max_file_size
            );
            return Err(FileError::ResourceLimit(format!(
                "payload is {} bytes, limit is {}",
                size, self.config.max_file_size
            )));
        }
        Ok(())
    }

    /// 检查 3：格式标签、版本、元数据、必需字段
    fn check_envelope(root: &Map<String, Value>) -> Result<(ProjectMetadata, String, String)> {
        match root.get("formatTag").and_then(Value::as_str) {
            Some(FORMAT_TAG) => {}
            Some(other) => {
                return Err(FileError::Format(format!(
                    "expected format tag '{FORMAT_TAG}', found '{other}'"
                )))
            }
            None => return Err(FileError::Format("missing formatTag".to_string())),
        }

        let version = match root.get("formatVersion") {
            Some(Value::String(v)) => v.clone(),
            Some(other) => {
                return Err(FileError::Version(format!(
                    "formatVersion must be a string, found {other}"
                )))
            }
            None => return Err(FileError::Format("missing formatVersion".to_string())),
        };
        if !SUPPORTED_VERSIONS.contains(&version.as_str()) {
            return Err(FileError::Version(format!(
                "version {} is not supported (supported: {})",
                version,
                SUPPORTED_VERSIONS.join(", ")
            )));
        }

        let metadata = match root.get("metadata") {
            Some(value) => ProjectMetadata::deserialize(value)
                .map_err(|e| FileError::Format(format!("malformed metadata: {e}")))?,
            None => return Err(FileError::Format("missing metadata".to_string())),
        };

        if !root.get("nodes").is_some_and(Value::is_array) {
            return Err(FileError::Format("nodes must be an array".to_string()));
        }

        let checksum = root
            .get("checksum")
            .and_then(Value::as_str)
            .ok_or_else(|| FileError::Format("missing checksum".to_string()))?
            .to_string();

        Ok((metadata, version, checksum))
    }

    /// 检查 4：节点数量
    fn check_count(&self, count: usize) -> Result<()> {
        if count > self.config.max_nodes {
            return Err(FileError::ResourceLimit(format!(
                "{} nodes exceeds limit of {}",
                count, self.config.max_nodes
            )));
        }
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        match self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(FileError::Cancelled),
            _ => Ok(()),
        }
    }

    /// 检查 5：逐节点
    fn check_nodes(&self, values: &[Value]) -> Result<Vec<NodeRecord>> {
        let mut records = Vec::with_capacity(values.len());
        let mut ids = HashSet::with_capacity(values.len());

        for (index, value) in values.iter().enumerate() {
            self.check_cancelled()?;

            let record = Self::check_record(index, value)?;
            if !ids.insert(record.id.clone()) {
                return Err(FileError::DuplicateId(record.id));
            }
            records.push(record);
        }

        Self::check_parents(&records)?;
        tracing::debug!("Validated {} node records", records.len());
        Ok(records)
    }

    /// 单条记录：先查类型白名单，再做结构与数值域检查
    fn check_record(index: usize, value: &Value) -> Result<NodeRecord> {
        let Some(object) = value.as_object() else {
            return Err(FileError::Validation(format!(
                "node #{index} must be an object"
            )));
        };

        match object.get("variant") {
            Some(Value::String(tag)) if VariantKind::from_tag(tag).is_some() => {}
            Some(Value::String(tag)) => {
                tracing::warn!("Rejecting node #{} with unknown type '{}'", index, tag);
                return Err(FileError::UnknownType(tag.clone()));
            }
            Some(other) => return Err(FileError::UnknownType(other.to_string())),
            None => {
                return Err(FileError::UnknownType(format!(
                    "node #{index} has no variant"
                )))
            }
        }

        let record: NodeRecord = serde_json::from_value(value.clone())
            .map_err(|e| FileError::Validation(format!("node #{index}: {e}")))?;
        record.validate()?;
        Ok(record)
    }

    /// 父引用必须存在，且沿父链不能回到自身
    fn check_parents(records: &[NodeRecord]) -> Result<()> {
        let parents: HashMap<&str, Option<&str>> = records
            .iter()
            .map(|r| (r.id.as_str(), r.parent_id.as_deref()))
            .collect();

        for record in records {
            if let Some(parent) = record.parent_id.as_deref() {
                if !parents.contains_key(parent) {
                    return Err(FileError::NotFound(format!(
                        "parent '{}' of node '{}'",
                        parent, record.id
                    )));
                }
            }
        }

        // 已确认能到达根的节点
        let mut grounded: HashSet<&str> = HashSet::with_capacity(records.len());
        for record in records {
            let mut path: Vec<&str> = Vec::new();
            let mut on_path: HashSet<&str> = HashSet::new();
            let mut current = Some(record.id.as_str());

            while let Some(id) = current {
                if grounded.contains(id) {
                    break;
                }
                if !on_path.insert(id) {
                    return Err(FileError::Cycle(format!(
                        "parent chain of node '{id}' loops back to itself"
                    )));
                }
                path.push(id);
                current = parents.get(id).copied().flatten();
            }
            grounded.extend(path);
        }
        Ok(())
    }

    /// 检查 6：校验和
    fn check_integrity(&self, shaped: &Shaped) -> Result<()> {
        let metadata = shaped.root.get("metadata").unwrap_or(&Value::Null);
        let nodes = shaped.root.get("nodes").unwrap_or(&Value::Null);
        let actual = checksum::compute(metadata, nodes);

        if actual != shaped.checksum {
            tracing::warn!("Checksum mismatch, refusing payload");
            return Err(FileError::Integrity {
                expected: shaped.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use serde_json::json;
    use thesolution_core::coordinate::Coordinate;
    use thesolution_core::node::Variant;
    use thesolution_core::tree::Tree;

    fn sample_payload() -> Vec<u8> {
        let mut tree = Tree::new();
        let root = tree.new_node("Frame", Variant::Assembly, Coordinate::identity()).unwrap();
        let root = tree.add_root(root).unwrap();
        let part = tree
            .new_node(
                "Housing",
                Variant::Box {
                    width: 10.0,
                    height: 10.0,
                    depth: 10.0,
                },
                Coordinate::at(10.0, 0.0, 0.0),
            )
            .unwrap();
        tree.add_child(&root, part).unwrap();

        let envelope = codec::encode(&tree, ProjectMetadata::new("Sample")).unwrap();
        serde_json::to_vec_pretty(&envelope).unwrap()
    }

    /// 修改 JSON 后重新计算校验和，使错误只来自被测检查
    fn resealed(mut value: Value) -> Vec<u8> {
        let sum = checksum::compute(&value["metadata"], &value["nodes"]);
        value["checksum"] = json!(sum);
        serde_json::to_vec(&value).unwrap()
    }

    fn sample_value() -> Value {
        serde_json::from_slice(&sample_payload()).unwrap()
    }

    #[test]
    fn test_valid_payload_passes() {
        let config = StoreConfig::default();
        let envelope = Validator::new(&config).validate(&sample_payload()).unwrap();
        assert_eq!(envelope.nodes.len(), 2);
        assert_eq!(envelope.metadata.name, "Sample");
    }

    #[test]
    fn test_size_guard_runs_before_parse() {
        let config = StoreConfig::default().with_max_file_size(16);
        // 不是合法 JSON，但应先因大小被拒绝
        let payload = vec![b'{'; 64];
        assert!(matches!(
            Validator::new(&config).validate(&payload),
            Err(FileError::ResourceLimit(_))
        ));
    }

    #[test]
    fn test_parse_guard() {
        let config = StoreConfig::default();
        assert!(matches!(
            Validator::new(&config).validate(b"{ not json"),
            Err(FileError::Parse(_))
        ));
        assert!(matches!(
            Validator::new(&config).validate(b"[1, 2, 3]"),
            Err(FileError::Format(_))
        ));
    }

    #[test]
    fn test_format_and_version_guard() {
        let config = StoreConfig::default();
        let validator = Validator::new(&config);

        let mut value = sample_value();
        value["formatTag"] = json!("TheSolution_JSON");
        assert!(matches!(validator.validate(&resealed(value)), Err(FileError::Format(_))));

        let mut value = sample_value();
        value["formatVersion"] = json!("2.0");
        assert!(matches!(validator.validate(&resealed(value)), Err(FileError::Version(_))));

        let mut value = sample_value();
        value.as_object_mut().unwrap().remove("checksum");
        let raw = serde_json::to_vec(&value).unwrap();
        assert!(matches!(validator.validate(&raw), Err(FileError::Format(_))));
    }

    #[test]
    fn test_count_guard() {
        let config = StoreConfig::default().with_max_nodes(1);
        assert!(matches!(
            Validator::new(&config).validate(&sample_payload()),
            Err(FileError::ResourceLimit(_))
        ));
    }

    #[test]
    fn test_unknown_variant_rejected() {
        let config = StoreConfig::default();
        let mut value = sample_value();
        value["nodes"][1]["variant"] = json!("Script");

        // 即使重新计算了校验和也会被拒绝
        assert!(matches!(
            Validator::new(&config).validate(&resealed(value.clone())),
            Err(FileError::UnknownType(tag)) if tag == "Script"
        ));
        let raw = serde_json::to_vec(&value).unwrap();
        assert!(matches!(
            Validator::new(&config).validate(&raw),
            Err(FileError::UnknownType(_))
        ));
    }

    #[test]
    fn test_domain_guard() {
        let config = StoreConfig::default();
        let mut value = sample_value();
        value["nodes"][1]["material"]["transparency"] = json!(1.5);
        assert!(matches!(
            Validator::new(&config).validate(&resealed(value)),
            Err(FileError::Validation(_))
        ));

        let mut value = sample_value();
        value["nodes"][1]["dimensions"]["width"] = json!(-10.0);
        assert!(matches!(
            Validator::new(&config).validate(&resealed(value)),
            Err(FileError::Validation(_))
        ));
    }

    #[test]
    fn test_duplicate_id_guard() {
        let config = StoreConfig::default();
        let mut value = sample_value();
        let root_id = value["nodes"][0]["id"].clone();
        value["nodes"][1]["id"] = root_id;

        assert!(matches!(
            Validator::new(&config).validate(&resealed(value)),
            Err(FileError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_orphan_parent_guard() {
        let config = StoreConfig::default();
        let mut value = sample_value();
        value["nodes"][1]["parentId"] = json!("ghost");

        assert!(matches!(
            Validator::new(&config).validate(&resealed(value)),
            Err(FileError::NotFound(_))
        ));
    }

    #[test]
    fn test_cycle_guard() {
        let config = StoreConfig::default();
        let mut value = sample_value();
        let child_id = value["nodes"][1]["id"].clone();
        value["nodes"][0]["parentId"] = child_id;

        assert!(matches!(
            Validator::new(&config).validate(&resealed(value)),
            Err(FileError::Cycle(_))
        ));

        let mut value = sample_value();
        let own_id = value["nodes"][1]["id"].clone();
        value["nodes"][1]["parentId"] = own_id;
        assert!(matches!(
            Validator::new(&config).validate(&resealed(value)),
            Err(FileError::Cycle(_))
        ));
    }

    #[test]
    fn test_tampered_content_fails_integrity() {
        let config = StoreConfig::default();
        let text = String::from_utf8(sample_payload()).unwrap();
        assert!(text.contains("Housing"));

        let tampered = text.replacen("Housing", "Hovsing", 1);
        assert!(matches!(
            Validator::new(&config).validate(tampered.as_bytes()),
            Err(FileError::Integrity { .. })
        ));

        let tampered = text.replacen("10.0", "11.0", 1);
        assert!(matches!(
            Validator::new(&config).validate(tampered.as_bytes()),
            Err(FileError::Integrity { .. })
        ));
    }

    #[test]
    fn test_inspect_skips_node_checks() {
        let config = StoreConfig::default();
        let mut value = sample_value();
        value["nodes"][1]["variant"] = json!("Script");
        let payload = serde_json::to_vec(&value).unwrap();

        let info = Validator::new(&config).inspect(&payload).unwrap();
        assert_eq!(info.node_count, 2);
        assert_eq!(info.metadata.name, "Sample");
        assert_eq!(info.format_version, "1.0");
        assert_eq!(info.byte_size, payload.len() as u64);
    }

    #[test]
    fn test_cancel_flag() {
        let config = StoreConfig::default();
        let flag = AtomicBool::new(true);
        assert!(matches!(
            Validator::new(&config)
                .with_cancel_flag(&flag)
                .validate(&sample_payload()),
            Err(FileError::Cancelled)
        ));
    }
}
