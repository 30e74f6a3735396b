//! 项目存储（.3d_sol）
//!
//! 保存：Tree → 编码 → 同目录临时文件 → `sync_all` → 重命名。
//! 加载：读取字节 → 六项校验 → 解码 → Tree。
//! 任何一步失败都不返回部分结果。

use crate::codec;
use crate::config::StoreConfig;
use crate::error::{FileError, Result};
use crate::schema::{ProjectMetadata, PROJECT_EXTENSION};
use crate::validator::{ProjectInfo, Validator};
use chrono::Utc;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::NamedTempFile;
use thesolution_core::tree::Tree;

/// 项目文件读写入口
#[derive(Debug, Clone, Default)]
pub struct ProjectStore {
    config: StoreConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl ProjectStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// 设置取消标志，加载过程中逐节点检查
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn validator(&self) -> Validator<'_> {
        let validator = Validator::new(&self.config);
        match &self.cancel {
            Some(flag) => validator.with_cancel_flag(flag),
            None => validator,
        }
    }

    /// 编码为字节（不写文件）
    pub fn save_to_vec(&self, tree: &Tree, mut metadata: ProjectMetadata) -> Result<Vec<u8>> {
        if tree.is_empty() {
            return Err(FileError::EmptyTree);
        }
        if tree.len() > self.config.max_nodes {
            return Err(FileError::ResourceLimit(format!(
                "tree has {} nodes, limit is {}",
                tree.len(),
                self.config.max_nodes
            )));
        }
        metadata.validate()?;
        if metadata.created_at.is_none() {
            metadata.created_at = Some(Utc::now());
        }

        let envelope = codec::encode(tree, metadata)?;
        let bytes = if self.config.pretty {
            serde_json::to_vec_pretty(&envelope)?
        } else {
            serde_json::to_vec(&envelope)?
        };

        // 不写出自己都拒绝加载的文件
        self.validator().check_size(bytes.len() as u64)?;
        Ok(bytes)
    }

    /// 保存到文件
    pub fn save(&self, tree: &Tree, path: &Path, metadata: ProjectMetadata) -> Result<()> {
        warn_on_extension(path);
        let bytes = self.save_to_vec(tree, metadata)?;

        // 同目录临时文件，出错时随 drop 删除
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| FileError::Io(e.error))?;

        tracing::info!(
            "Saved {} nodes to {} ({} bytes)",
            tree.len(),
            path.display(),
            bytes.len()
        );
        Ok(())
    }

    /// 从文件加载
    pub fn load(&self, path: &Path) -> Result<Tree> {
        warn_on_extension(path);
        let bytes = self.read_bounded(path)?;
        let tree = self.load_slice(&bytes)?;

        tracing::info!(
            "Loaded {} nodes from {} ({} bytes)",
            tree.len(),
            path.display(),
            bytes.len()
        );
        Ok(tree)
    }

    /// 从内存中的字节加载
    pub fn load_slice(&self, bytes: &[u8]) -> Result<Tree> {
        let envelope = self.validator().validate(bytes)?;
        codec::decode(&envelope)
    }

    /// 预览文件：只执行前四项检查
    pub fn inspect(&self, path: &Path) -> Result<ProjectInfo> {
        let bytes = self.read_bounded(path)?;
        self.inspect_slice(&bytes)
    }

    pub fn inspect_slice(&self, bytes: &[u8]) -> Result<ProjectInfo> {
        self.validator().inspect(bytes)
    }

    /// 先按文件长度拒绝，再最多读取 `max_file_size + 1` 字节
    fn read_bounded(&self, path: &Path) -> Result<Vec<u8>> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        self.validator().check_size(len)?;

        let limit = self.config.max_file_size.saturating_add(1);
        let mut bytes = Vec::with_capacity(len as usize);
        file.take(limit).read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

fn warn_on_extension(path: &Path) {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if ext != PROJECT_EXTENSION && ext != "json" {
        tracing::warn!(
            "Unexpected project file extension '{}' for {}",
            ext,
            path.display()
        );
    }
}
