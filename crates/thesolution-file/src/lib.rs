//! TheSolution 项目文件处理
//!
//! 支持：
//! - `.3d_sol` 项目格式（带版本和校验和的 JSON 信封）
//! - 加载前的六项安全检查：大小、解析、结构、数量、逐节点、完整性
//! - 原子保存（临时文件 + 重命名）
//!
//! ```no_run
//! use std::path::Path;
//! use thesolution_file::{ProjectMetadata, ProjectStore};
//!
//! let store = ProjectStore::default();
//! let info = store.inspect(Path::new("bracket.3d_sol"))?;
//! println!("{} ({} nodes)", info.metadata.name, info.node_count);
//!
//! let tree = store.load(Path::new("bracket.3d_sol"))?;
//! store.save(&tree, Path::new("bracket-copy.3d_sol"), ProjectMetadata::new("Bracket"))?;
//! # Ok::<(), thesolution_file::FileError>(())
//! ```

pub mod checksum;
pub mod codec;
pub mod config;
pub mod error;
pub mod schema;
pub mod store;
pub mod validator;

pub use config::StoreConfig;
pub use error::{FileError, Result};
pub use schema::{
    Envelope, NodeRecord, ProjectMetadata, FORMAT_TAG, FORMAT_VERSION, PROJECT_EXTENSION,
};
pub use store::ProjectStore;
pub use validator::{ProjectInfo, Validator};
