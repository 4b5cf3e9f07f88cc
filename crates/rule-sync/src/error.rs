//! 规则同步错误类型
//!
//! 编排层对外只暴露四类结果：
//! - `Validation`：输入不合法，永远不会触达任何存储
//! - `RecordNotFound`：目标 id 在被查询的存储中不存在
//! - `UpstreamUnavailable`：规则引擎传输或协议故障，始终致命
//! - `SecondaryDegraded`：副存储失败但操作本身成功，不是错误，而是附着在成功结果上的信号

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::clients::SecondaryError;

/// 存储标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Store {
    /// 规则引擎
    Primary,
    /// 搜索索引
    Secondary,
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "rule-engine"),
            Self::Secondary => write!(f, "search-index"),
        }
    }
}

/// 单个字段的校验失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// 输入校验错误，按字段逐一报告而不是只报第一个
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{}", summarize(.fields))]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

fn summarize(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn new(fields: Vec<FieldError>) -> Self {
        Self { fields }
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            fields: vec![FieldError::new(field, message)],
        }
    }

    /// 出错字段名（保持报告顺序）
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.field.as_str()).collect()
    }
}

/// 规则同步错误
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("参数验证失败: {0}")]
    Validation(#[from] ValidationError),

    #[error("记录未找到: {store} id={id}")]
    RecordNotFound { store: Store, id: String },

    /// 规则引擎故障，不允许被降级吞掉
    #[error("规则引擎不可用: {0}")]
    UpstreamUnavailable(String),

    /// 仅在只访问搜索索引的路径（统计、文档更新）上出现
    #[error("搜索索引不可用: {0}")]
    SecondaryUnavailable(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    pub fn not_found(store: Store, id: impl Into<String>) -> Self {
        Self::RecordNotFound {
            store,
            id: id.into(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::RecordNotFound { .. } => "RECORD_NOT_FOUND",
            Self::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            Self::SecondaryUnavailable(_) => "SECONDARY_UNAVAILABLE",
        }
    }
}

/// 编排层操作类型，用于日志、指标和降级信号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Get,
    List,
    Update,
    Delete,
    Stats,
    Explain,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Get => "get",
            Self::List => "list",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Stats => "stats",
            Self::Explain => "explain",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 副存储失败的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedKind {
    NotFound,
    IndexMissing,
    Rejected,
    Transport,
}

impl DegradedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::IndexMissing => "index_missing",
            Self::Rejected => "rejected",
            Self::Transport => "transport",
        }
    }
}

impl From<&SecondaryError> for DegradedKind {
    fn from(err: &SecondaryError) -> Self {
        match err {
            SecondaryError::NotFound => Self::NotFound,
            SecondaryError::IndexMissing(_) => Self::IndexMissing,
            SecondaryError::Rejected { .. } => Self::Rejected,
            SecondaryError::Transport(_) => Self::Transport,
        }
    }
}

/// 副存储降级信号
///
/// 主存储操作成功而副存储镜像失败时产生，随成功结果一起返回给调用方。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecondaryDegraded {
    pub operation_id: Uuid,
    pub operation: Operation,
    pub rule_id: String,
    pub kind: DegradedKind,
    pub message: String,
}

impl SecondaryDegraded {
    pub fn new(
        operation_id: Uuid,
        operation: Operation,
        rule_id: impl Into<String>,
        err: &SecondaryError,
    ) -> Self {
        Self {
            operation_id,
            operation,
            rule_id: rule_id.into(),
            kind: err.into(),
            message: err.to_string(),
        }
    }
}
