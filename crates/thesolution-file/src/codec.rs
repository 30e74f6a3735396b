//! 编解码：树 <-> 信封
//!
//! `decode` 假定输入已通过 [`Validator`](crate::validator::Validator)，
//! 不会重复执行安全检查。

use crate::checksum;
use crate::error::{FileError, Result};
use crate::schema::{Envelope, NodeRecord, ProjectMetadata, FORMAT_TAG, FORMAT_VERSION};
use std::collections::HashMap;
use thesolution_core::node::{Node, NodeId};
use thesolution_core::tree::Tree;

/// 将节点转换为线格式记录
pub fn node_to_record(node: &Node) -> NodeRecord {
    let kind = node.kind();
    let dimensions = kind
        .dimension_names()
        .iter()
        .map(|name| name.to_string())
        .zip(node.variant().dimensions())
        .collect();

    NodeRecord {
        id: node.id().to_string(),
        parent_id: node.parent().map(|p| p.to_string()),
        variant: kind,
        name: node.name().to_string(),
        coordinate: *node.coordinate(),
        dimensions,
        material: node.material().clone(),
        visible: node.is_visible(),
        locked: node.is_locked(),
        description: node.description().to_string(),
        tags: node.tags().to_vec(),
        properties: node.properties().clone(),
    }
}

/// 将记录还原为节点（不含父子关系）
pub fn record_to_node(record: &NodeRecord) -> Result<Node> {
    let variant = record.to_variant()?;
    let mut node = Node::new(
        NodeId::new(record.id.clone()),
        record.name.clone(),
        variant,
        record.coordinate,
    )?
    .with_material(record.material.clone())?;

    node.set_visible(record.visible);
    node.set_locked(record.locked);
    node.set_description(record.description.clone());
    node.set_tags(record.tags.clone());
    for (key, value) in &record.properties {
        node.set_property(key.clone(), value.clone())?;
    }
    Ok(node)
}

/// 编码：先序展平整棵树，父记录总在子记录之前
pub fn encode(tree: &Tree, mut metadata: ProjectMetadata) -> Result<Envelope> {
    let nodes: Vec<NodeRecord> = tree.walk().map(|(node, _)| node_to_record(node)).collect();
    metadata.node_count = Some(nodes.len());

    let checksum = checksum::compute(
        &serde_json::to_value(&metadata)?,
        &serde_json::to_value(&nodes)?,
    );

    Ok(Envelope {
        format_tag: FORMAT_TAG.to_string(),
        format_version: FORMAT_VERSION.to_string(),
        metadata,
        nodes,
        checksum,
    })
}

/// 解码：按父引用重建树
///
/// 兄弟节点保持列表中的相对顺序；父记录出现在子记录之后也能正确处理。
pub fn decode(envelope: &Envelope) -> Result<Tree> {
    let mut by_parent: HashMap<&str, Vec<&NodeRecord>> = HashMap::new();
    let mut roots = Vec::new();
    for record in &envelope.nodes {
        match &record.parent_id {
            Some(parent) => by_parent.entry(parent.as_str()).or_default().push(record),
            None => roots.push(record),
        }
    }

    let mut tree = Tree::new();
    let mut stack: Vec<&NodeRecord> = roots.into_iter().rev().collect();
    while let Some(record) = stack.pop() {
        let node = record_to_node(record)?;
        match &record.parent_id {
            Some(parent) => tree.add_child(&NodeId::new(parent.clone()), node)?,
            None => tree.add_root(node)?,
        };

        if let Some(children) = by_parent.remove(record.id.as_str()) {
            stack.extend(children.into_iter().rev());
        }
    }

    if tree.len() != envelope.nodes.len() {
        return Err(FileError::Validation(format!(
            "{} node records are not reachable from any root",
            envelope.nodes.len() - tree.len()
        )));
    }

    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use thesolution_core::coordinate::Coordinate;
    use thesolution_core::node::{Material, Variant};
    use thesolution_core::tree::IdAllocator;

    fn sample_tree() -> Tree {
        let mut tree = Tree::with_allocator(IdAllocator::with_prefix("s"));

        let root = tree.new_node("Frame", Variant::Assembly, Coordinate::identity()).unwrap();
        let root = tree.add_root(root).unwrap();

        let mut plate = tree
            .new_node(
                "Plate",
                Variant::Box {
                    width: 10.0,
                    height: 1.0,
                    depth: 20.0,
                },
                Coordinate::at(10.0, 0.0, 0.0),
            )
            .unwrap()
            .with_material(Material::new("Steel", 7.85).with_color([192, 192, 192]))
            .unwrap();
        plate.set_property("revision", 2i64).unwrap();
        plate.add_tag("structural");
        let plate = tree.add_child(&root, plate).unwrap();

        let ring = tree
            .new_node(
                "Ring",
                Variant::Torus {
                    major_radius: 4.0,
                    minor_radius: 0.5,
                },
                Coordinate::new(5.0, 0.0, 0.0, 1.0, 1.0, 2.0),
            )
            .unwrap();
        tree.add_child(&plate, ring).unwrap();

        let cone = tree
            .new_node(
                "Nozzle",
                Variant::Cone {
                    radius1: 2.0,
                    radius2: 1.0,
                    height: 3.0,
                },
                Coordinate::at(0.0, 5.0, 0.0),
            )
            .unwrap();
        tree.add_child(&root, cone).unwrap();

        let mut loose = tree
            .new_node(
                "Loose",
                Variant::Cylinder {
                    radius: 3.0,
                    height: 8.0,
                },
                Coordinate::identity(),
            )
            .unwrap();
        loose.set_visible(false);
        loose.set_locked(true);
        tree.add_root(loose).unwrap();

        tree
    }

    #[test]
    fn test_encode_flattens_parent_first() {
        let tree = sample_tree();
        let envelope = encode(&tree, ProjectMetadata::new("Sample")).unwrap();

        assert_eq!(envelope.format_tag, FORMAT_TAG);
        assert_eq!(envelope.format_version, FORMAT_VERSION);
        assert_eq!(envelope.nodes.len(), 5);
        assert_eq!(envelope.metadata.node_count, Some(5));

        let mut seen = std::collections::HashSet::new();
        for record in &envelope.nodes {
            if let Some(parent) = &record.parent_id {
                assert!(seen.contains(parent), "parent {parent} listed after child");
            }
            seen.insert(record.id.clone());
        }
    }

    #[test]
    fn test_roundtrip_preserves_structure() {
        let tree = sample_tree();
        let envelope = encode(&tree, ProjectMetadata::new("Sample")).unwrap();
        let decoded = decode(&envelope).unwrap();

        assert_eq!(decoded.len(), tree.len());
        assert_eq!(decoded.roots(), tree.roots());

        for (node, depth) in tree.walk() {
            let other = decoded.find(node.id()).expect("node survives roundtrip");
            assert_eq!(other.variant(), node.variant());
            assert_eq!(other.coordinate(), node.coordinate());
            assert_eq!(other.material(), node.material());
            assert_eq!(other.parent(), node.parent());
            assert_eq!(other.children(), node.children());
            assert_eq!(other.properties(), node.properties());
            assert_eq!(other.tags(), node.tags());
            assert_eq!(other.is_visible(), node.is_visible());
            assert_eq!(other.is_locked(), node.is_locked());
            assert_eq!(decoded.depth(node.id()).unwrap(), depth);
        }
    }

    #[test]
    fn test_checksum_tracks_content() {
        let tree = sample_tree();
        let a = encode(&tree, ProjectMetadata::new("Sample")).unwrap();
        let b = encode(&tree, ProjectMetadata::new("Sample")).unwrap();
        let c = encode(&tree, ProjectMetadata::new("Renamed")).unwrap();

        assert_eq!(a.checksum, b.checksum);
        assert_ne!(a.checksum, c.checksum);
    }

    #[test]
    fn test_decode_accepts_child_before_parent() {
        let tree = sample_tree();
        let mut envelope = encode(&tree, ProjectMetadata::new("Sample")).unwrap();
        envelope.nodes.reverse();

        let decoded = decode(&envelope).unwrap();
        assert_eq!(decoded.len(), tree.len());
        for (node, _) in tree.walk() {
            assert_eq!(decoded.find(node.id()).unwrap().parent(), node.parent());
        }
    }

    #[test]
    fn test_decode_detects_unreachable_records() {
        let tree = sample_tree();
        let mut envelope = encode(&tree, ProjectMetadata::new("Sample")).unwrap();
        envelope.nodes[1].parent_id = Some("ghost".to_string());

        assert!(matches!(decode(&envelope), Err(FileError::Validation(_))));
    }

    #[test]
    fn test_absolute_coordinates_survive() {
        let tree = sample_tree();
        let decoded = decode(&encode(&tree, ProjectMetadata::new("Sample")).unwrap()).unwrap();

        for (node, _) in tree.walk() {
            assert_eq!(
                decoded.absolute_coordinate(node.id()).unwrap(),
                tree.absolute_coordinate(node.id()).unwrap()
            );
        }
    }
}
