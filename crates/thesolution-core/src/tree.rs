//! 层级树
//!
//! 所有节点存放在一张以 [`NodeId`] 为键的中心表中：
//! - 父节点通过子节点ID列表"拥有"子节点（列表顺序即显示/遍历顺序）
//! - 子节点通过父节点ID回指，不持有引用，因此不存在引用环
//!
//! 结构不变量：
//! - 每个节点最多属于一个父节点
//! - 父链无环
//! - ID 在树内唯一
//! - 删除节点时整棵子树一并移除，ID 索引同步更新

use crate::coordinate::Coordinate;
use crate::error::{ModelError, Result};
use crate::metrics::{metrics, SubtreeMetrics};
use crate::node::{Node, NodeId, Variant};
use std::collections::HashMap;
use uuid::Uuid;

/// 节点ID分配器
///
/// 生成形如 `{prefix}-{n}` 的ID，计数器只增不减，已分配的ID不会再次出现。
/// 默认前缀取自随机 UUID，使同一进程中不同树生成的ID互不冲突。
#[derive(Debug, Clone)]
pub struct IdAllocator {
    prefix: String,
    next: u64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        let session = Uuid::new_v4().simple().to_string();
        Self::with_prefix(&session[..8])
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId::new(format!("{}-{}", self.prefix, self.next));
        self.next += 1;
        id
    }
}

/// 节点森林
#[derive(Debug, Clone, Default)]
pub struct Tree {
    /// ID -> 节点
    nodes: HashMap<NodeId, Node>,

    /// 根节点（按插入顺序）
    roots: Vec<NodeId>,

    /// ID 分配器，生命周期与树相同
    ids: IdAllocator,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allocator(ids: IdAllocator) -> Self {
        Self {
            nodes: HashMap::new(),
            roots: Vec::new(),
            ids,
        }
    }

    /// 分配一个树中尚未使用的新ID
    pub fn allocate_id(&mut self) -> NodeId {
        loop {
            let id = self.ids.next_id();
            if !self.nodes.contains_key(&id) {
                return id;
            }
        }
    }

    /// 用新ID创建节点（尚未挂入树）
    pub fn new_node(
        &mut self,
        name: impl Into<String>,
        variant: Variant,
        coordinate: Coordinate,
    ) -> Result<Node> {
        let id = self.allocate_id();
        Node::new(id, name, variant, coordinate)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// 查找节点，不存在时返回 `None`
    pub fn find(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// 可变查找，用于修改名称、坐标、材质等属性
    pub fn find_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    fn get(&self, id: &NodeId) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| ModelError::NotFound(id.clone()))
    }

    pub fn children(&self, id: &NodeId) -> Result<&[NodeId]> {
        Ok(self.get(id)?.children())
    }

    pub fn parent(&self, id: &NodeId) -> Result<Option<&NodeId>> {
        Ok(self.get(id)?.parent())
    }

    /// 插入根节点
    pub fn add_root(&mut self, mut node: Node) -> Result<NodeId> {
        if self.nodes.contains_key(node.id()) {
            return Err(ModelError::DuplicateId(node.id().clone()));
        }

        node.parent = None;
        node.children.clear();

        let id = node.id().clone();
        self.roots.push(id.clone());
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    /// 将新节点挂到 `parent_id` 之下（追加到子节点列表末尾）
    pub fn add_child(&mut self, parent_id: &NodeId, mut node: Node) -> Result<NodeId> {
        let id = node.id().clone();

        if &id == parent_id {
            return Err(ModelError::Cycle {
                node: id,
                parent: parent_id.clone(),
            });
        }
        if !self.nodes.contains_key(parent_id) {
            return Err(ModelError::NotFound(parent_id.clone()));
        }
        if self.nodes.contains_key(&id) {
            if self.is_ancestor(&id, parent_id) {
                return Err(ModelError::Cycle {
                    node: id,
                    parent: parent_id.clone(),
                });
            }
            return Err(ModelError::DuplicateId(id));
        }

        node.parent = Some(parent_id.clone());
        node.children.clear();

        if let Some(parent) = self.nodes.get_mut(parent_id) {
            parent.children.push(id.clone());
        }
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    /// `candidate` 是否为 `id` 本身或其祖先
    ///
    /// 沿父指针向上查找，耗时与深度成正比。
    pub fn is_ancestor(&self, candidate: &NodeId, id: &NodeId) -> bool {
        let mut current = Some(id);
        while let Some(cur) = current {
            if cur == candidate {
                return true;
            }
            current = self.nodes.get(cur).and_then(|n| n.parent());
        }
        false
    }

    /// 把已有子树移动到新父节点下（`None` 表示成为根节点）
    pub fn reparent(&mut self, id: &NodeId, new_parent: Option<&NodeId>) -> Result<()> {
        self.get(id)?;

        if let Some(parent_id) = new_parent {
            if !self.nodes.contains_key(parent_id) {
                return Err(ModelError::NotFound(parent_id.clone()));
            }
            if self.is_ancestor(id, parent_id) {
                return Err(ModelError::Cycle {
                    node: id.clone(),
                    parent: parent_id.clone(),
                });
            }
        }

        self.detach(id);

        match new_parent {
            Some(parent_id) => {
                if let Some(parent) = self.nodes.get_mut(parent_id) {
                    parent.children.push(id.clone());
                }
            }
            None => self.roots.push(id.clone()),
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = new_parent.cloned();
        }

        tracing::debug!("Moved {} under {:?}", id, new_parent);
        Ok(())
    }

    /// 从父节点（或根列表）中摘除，不删除节点本身
    fn detach(&mut self, id: &NodeId) {
        let parent = self.nodes.get(id).and_then(|n| n.parent().cloned());
        match parent {
            Some(parent_id) => {
                if let Some(parent) = self.nodes.get_mut(&parent_id) {
                    parent.children.retain(|c| c != id);
                }
            }
            None => self.roots.retain(|r| r != id),
        }
    }

    /// 删除节点及其全部后代，返回删除的节点数
    pub fn remove(&mut self, id: &NodeId) -> Result<usize> {
        let doomed = self.subtree_ids(id)?;

        self.detach(id);
        for doomed_id in &doomed {
            self.nodes.remove(doomed_id);
        }

        tracing::debug!("Removed {} ({} nodes)", id, doomed.len());
        Ok(doomed.len())
    }

    /// 绝对坐标：从根开始依次组合各级局部坐标
    pub fn absolute_coordinate(&self, id: &NodeId) -> Result<Coordinate> {
        let mut current = self.get(id)?;
        let mut chain = vec![current];
        while let Some(parent_id) = current.parent() {
            current = self.get(parent_id)?;
            chain.push(current);
        }

        Ok(chain
            .iter()
            .rev()
            .fold(Coordinate::identity(), |acc, node| {
                Coordinate::compose(&acc, node.coordinate())
            }))
    }

    /// 祖先列表（由近及远）
    pub fn ancestors(&self, id: &NodeId) -> Result<Vec<NodeId>> {
        let mut result = Vec::new();
        let mut current = self.get(id)?.parent();
        while let Some(parent_id) = current {
            result.push(parent_id.clone());
            current = self.get(parent_id)?.parent();
        }
        Ok(result)
    }

    /// 所有后代（先序，不含自身）
    pub fn descendants(&self, id: &NodeId) -> Result<Vec<NodeId>> {
        let mut ids = self.subtree_ids(id)?;
        ids.remove(0);
        Ok(ids)
    }

    /// 所在树的根节点
    pub fn root_of(&self, id: &NodeId) -> Result<NodeId> {
        Ok(self
            .ancestors(id)?
            .pop()
            .unwrap_or_else(|| id.clone()))
    }

    /// 深度（根节点为 0）
    pub fn depth(&self, id: &NodeId) -> Result<usize> {
        Ok(self.ancestors(id)?.len())
    }

    /// 子树内所有ID（先序，含自身）
    fn subtree_ids(&self, id: &NodeId) -> Result<Vec<NodeId>> {
        self.get(id)?;
        Ok(self.walk_from(id).map(|(node, _)| node.id().clone()).collect())
    }

    /// 先序遍历整片森林：父节点先于子节点，子节点按存储顺序
    ///
    /// 遍历期间借用整棵树，因此无法同时修改；需要边遍历边修改时先收集ID。
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            tree: self,
            stack: self.roots.iter().rev().map(|id| (id, 0)).collect(),
        }
    }

    /// 从指定节点开始的先序遍历（深度相对于该节点）；节点不存在时为空序列
    pub fn walk_from<'a>(&'a self, id: &'a NodeId) -> Walk<'a> {
        let stack = if self.nodes.contains_key(id) {
            vec![(id, 0)]
        } else {
            Vec::new()
        };
        Walk { tree: self, stack }
    }

    /// 深拷贝子树（全部赋予新ID），挂到 `new_parent` 下或作为根，返回副本根ID
    pub fn duplicate_subtree(
        &mut self,
        id: &NodeId,
        new_parent: Option<&NodeId>,
    ) -> Result<NodeId> {
        let source: Vec<(Node, Option<NodeId>)> = self
            .walk_from(id)
            .map(|(node, _)| (node.clone(), node.parent().cloned()))
            .collect();
        if source.is_empty() {
            return Err(ModelError::NotFound(id.clone()));
        }
        if let Some(parent_id) = new_parent {
            self.get(parent_id)?;
        }

        let mut renamed: HashMap<NodeId, NodeId> = HashMap::new();
        for (node, old_parent) in &source {
            let new_id = self.allocate_id();
            let copy = node.detached_copy(new_id.clone());

            let target_parent = if node.id() == id {
                new_parent.cloned()
            } else {
                old_parent.as_ref().and_then(|p| renamed.get(p)).cloned()
            };

            match target_parent {
                Some(parent_id) => self.add_child(&parent_id, copy)?,
                None => self.add_root(copy)?,
            };
            renamed.insert(node.id().clone(), new_id);
        }

        renamed
            .remove(id)
            .ok_or_else(|| ModelError::NotFound(id.clone()))
    }

    /// 子树汇总：体积、表面积、质量
    pub fn subtree_metrics(&self, id: &NodeId) -> Result<SubtreeMetrics> {
        self.get(id)?;

        let mut total = SubtreeMetrics::default();
        for (node, _) in self.walk_from(id) {
            if matches!(node.variant(), Variant::Assembly) {
                continue;
            }
            let m = metrics(node.variant());
            total.metrics += m;
            total.mass += m.volume * node.material().density;
            total.primitive_count += 1;
        }
        Ok(total)
    }
}

/// 先序遍历迭代器，产出 `(节点, 深度)`
pub struct Walk<'a> {
    tree: &'a Tree,
    stack: Vec<(&'a NodeId, usize)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (&'a Node, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((id, depth)) = self.stack.pop() {
            let Some(node) = self.tree.nodes.get(id) else {
                continue;
            };
            self.stack
                .extend(node.children().iter().rev().map(|c| (c, depth + 1)));
            return Some((node, depth));
        }
        None
    }
}
