//! 规则领域模型
//!
//! `RuleInput` 是来自调用方的不可信输入，`Rule` 是校验和标签归一化之后的规则，
//! 也是在翻译、编排、合并各环节之间流转的单元。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::error::{FieldError, ValidationError};

/// 每条规则必须携带的标签，用于在规则引擎中区分经由本服务创建的规则
pub const UQL_TAG: &str = "uql";

/// 必填字段，按报告顺序排列
const REQUIRED_FIELDS: [&str; 4] = ["name", "scope", "condition", "actions"];

/// 创建规则的原始输入
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RuleInput {
    #[serde(default, deserialize_with = "null_as_default")]
    #[validate(length(min = 1, message = "规则名称不能为空"))]
    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    #[validate(length(min = 1, message = "规则作用域不能为空"))]
    pub scope: String,

    /// 规则引擎条件语法的表达式，本层不解析，原样透传
    #[serde(default, deserialize_with = "null_as_default")]
    #[validate(length(min = 1, message = "触发条件不能为空"))]
    pub condition: String,

    #[serde(default, deserialize_with = "null_as_default")]
    #[validate(length(min = 1, message = "规则动作不能为空"))]
    pub actions: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

/// 显式的 null 与缺省字段同等对待，空值统一交给校验报告
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 经过校验的规则
///
/// 不变量：`tags` 中恰好包含一次 `"uql"`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    scope: String,
    condition: String,
    actions: Vec<String>,
    description: String,
    tags: Vec<String>,
}

impl Rule {
    /// 校验输入并归一化标签
    ///
    /// 任一必填字段为空时返回 `ValidationError`，其中列出所有为空的字段。
    pub fn from_input(input: RuleInput) -> Result<Self, ValidationError> {
        if let Err(errors) = input.validate() {
            return Err(collect_field_errors(&errors));
        }

        Ok(Self {
            id: None,
            name: input.name,
            scope: input.scope,
            condition: input.condition,
            actions: input.actions,
            description: input.description,
            tags: normalize_tags(input.tags),
        })
    }

    /// 绑定规则引擎分配的 id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn condition(&self) -> &str {
        &self.condition
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    /// 去除首尾空白后的描述
    pub fn description(&self) -> &str {
        self.description.trim()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

impl TryFrom<RuleInput> for Rule {
    type Error = ValidationError;

    fn try_from(input: RuleInput) -> Result<Self, Self::Error> {
        Self::from_input(input)
    }
}

/// 去重（保持首次出现顺序），缺少 uql 标签时追加一次
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len() + 1);
    for tag in tags {
        if !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    if !normalized.iter().any(|t| t == UQL_TAG) {
        normalized.push(UQL_TAG.to_string());
    }
    normalized
}

fn collect_field_errors(errors: &validator::ValidationErrors) -> ValidationError {
    let field_errors = errors.field_errors();
    let fields = REQUIRED_FIELDS
        .iter()
        .filter_map(|field| {
            let first = field_errors.get(*field)?.first()?;
            let message = first
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| first.code.to_string());
            Some(FieldError::new(*field, message))
        })
        .collect();
    ValidationError::new(fields)
}

/// 搜索索引中的规则镜像文档
///
/// 由编排层在规则引擎返回 id 之后构建，只有镜像写入成功后才真实存在。
#[derive(Debug, Clone)]
pub struct RuleDocument {
    pub id: String,
    pub name: String,
    pub description: String,
    pub scope: String,
    pub condition: String,
    pub actions: Vec<String>,
    pub tags: Vec<String>,
    /// 发往规则引擎的 CREATE 语句原文
    pub dql: String,
    pub synced_at: DateTime<Utc>,
}

impl RuleDocument {
    /// 以规则引擎为准的字段，副存储更新路径不允许修改
    pub const PRIMARY_OWNED_FIELDS: [&'static str; 8] = [
        "id",
        "name",
        "scope",
        "condition",
        "actions",
        "tags",
        "description",
        "dql",
    ];

    pub fn new(rule: &Rule, id: &str, dql: &str) -> Self {
        Self {
            id: id.to_string(),
            name: rule.name.clone(),
            description: rule.description().to_string(),
            scope: rule.scope.clone(),
            condition: rule.condition.clone(),
            actions: rule.actions.clone(),
            tags: rule.tags.clone(),
            dql: dql.to_string(),
            synced_at: Utc::now(),
        }
    }
}

impl From<RuleDocument> for serde_json::Value {
    fn from(doc: RuleDocument) -> Self {
        serde_json::json!({
            "id": doc.id,
            "name": doc.name,
            "description": doc.description,
            "scope": doc.scope,
            "condition": doc.condition,
            "actions": doc.actions,
            "tags": doc.tags,
            "dql": doc.dql,
            "synced_at": doc.synced_at.to_rfc3339(),
        })
    }
}
