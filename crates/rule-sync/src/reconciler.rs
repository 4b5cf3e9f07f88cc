//! 读取结果合并
//!
//! 规则引擎的记录始终存在，搜索索引的文档只有在副存储查询成功时才出现，
//! 不会凭空补一个空的副存储部分。列表查询不做合并，以规则引擎的列表为准。

use serde::Serialize;
use serde_json::Value;

/// 合并后的单条规则
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRule {
    /// 规则引擎中的记录
    pub primary: Value,
    /// 搜索索引中的镜像文档
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<Value>,
}

pub fn merge(primary: Value, secondary: Option<Value>) -> MergedRule {
    MergedRule { primary, secondary }
}
