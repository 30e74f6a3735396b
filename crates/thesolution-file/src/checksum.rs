//! 内容校验和
//!
//! 对 `{"metadata": ..., "nodes": [...]}` 的规范化 JSON 文本求 SHA-256。
//! `serde_json::Value` 的对象按键排序，序列化结果与写出时的缩进和键顺序无关。
//! 浮点数依赖 serde_json 的 `float_roundtrip` 特性逐位还原，
//! 因此当且仅当内容变化时校验和才会变化。
//!
//! 这只用于发现损坏与篡改，不是签名。

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// 计算校验和（小写十六进制）
pub fn compute(metadata: &Value, nodes: &Value) -> String {
    let canonical = json!({
        "metadata": metadata,
        "nodes": nodes,
    });

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
