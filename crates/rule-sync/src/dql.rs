//! DQL 语句翻译
//!
//! 把规则和操作意图渲染为规则引擎的 DQL 语句。所有带引号的值都经过 `quoted`
//! 统一转义；条件表达式、动作标识和原始过滤条件属于引擎语法，原样嵌入。

use std::fmt;

use crate::model::Rule;

/// 未提供过滤条件时的默认分页大小
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// 渲染完成的 DQL 语句
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DqlStatement(String);

impl DqlStatement {
    /// 包装调用方直接提供的语句（仅用于 explain 之类的透传场景）
    pub fn raw(statement: impl Into<String>) -> Self {
        Self(statement.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DqlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DqlStatement {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 翻译意图
#[derive(Debug, Clone, Copy)]
pub enum Intent<'a> {
    Create(&'a Rule),
    SelectById(&'a str),
    /// 过滤条件为空（或全是空白）时退化为默认分页查询
    Select(Option<&'a str>),
    DeleteById(&'a str),
}

/// 纯函数：意图 → DQL 语句
pub fn translate(intent: Intent<'_>) -> DqlStatement {
    match intent {
        Intent::Create(rule) => create(rule),
        Intent::SelectById(id) => select_by_id(id),
        Intent::Select(filter) => select(filter),
        Intent::DeleteById(id) => delete_by_id(id),
    }
}

/// `CREATE RULE WITH TAGS [..] "name" DESCRIBE "desc" IN SCOPE "scope" WHEN <condition> THEN <actions>`
pub fn create(rule: &Rule) -> DqlStatement {
    let tags = rule
        .tags()
        .iter()
        .map(|t| quoted(t))
        .collect::<Vec<_>>()
        .join(",");

    DqlStatement(format!(
        "CREATE RULE WITH TAGS [{}] {} DESCRIBE {} IN SCOPE {} WHEN {} THEN {}",
        tags,
        quoted(rule.name()),
        quoted(rule.description()),
        quoted(rule.scope()),
        rule.condition(),
        rule.actions().join(","),
    ))
}

pub fn select_by_id(id: &str) -> DqlStatement {
    DqlStatement(format!("SELECT RULE WHERE id={}", quoted(id)))
}

pub fn select(filter: Option<&str>) -> DqlStatement {
    match filter.filter(|f| !f.trim().is_empty()) {
        Some(filter) => DqlStatement(format!("SELECT RULE WHERE {}", filter)),
        None => DqlStatement(format!("SELECT RULE LIMIT {}", DEFAULT_PAGE_SIZE)),
    }
}

pub fn delete_by_id(id: &str) -> DqlStatement {
    DqlStatement(format!("DELETE RULE {}", quoted(id)))
}

/// 唯一的取值加引号入口：转义反斜杠和双引号
fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}
