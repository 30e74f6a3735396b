//! 项目存储配置

use serde::{Deserialize, Serialize};

/// 默认最大文件大小：100 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// 默认最大节点数
pub const DEFAULT_MAX_NODES: usize = 10_000;

/// 存储限制与输出选项
///
/// 可嵌入宿主程序自己的配置文件，缺省字段取默认值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// 原始字节上限，超过则在解析前拒绝
    pub max_file_size: u64,

    /// 节点数量上限（加载与保存都检查）
    pub max_nodes: usize,

    /// 是否输出带缩进的 JSON
    pub pretty: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_nodes: DEFAULT_MAX_NODES,
            pretty: true,
        }
    }
}

impl StoreConfig {
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn with_max_nodes(mut self, count: usize) -> Self {
        self.max_nodes = count;
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}
