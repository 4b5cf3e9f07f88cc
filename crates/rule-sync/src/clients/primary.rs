//! 规则引擎客户端
//!
//! 规则引擎以 DQL 语句为输入，返回单条记录或记录列表。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, header::CONTENT_TYPE};
use rulesync_shared::config::PrimaryEngineConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::dql::DqlStatement;

/// 规则引擎执行结果
#[derive(Debug, Clone, PartialEq)]
pub enum PrimaryResult {
    /// 针对单个 id 的语句
    Record(Value),
    /// 过滤查询
    List(Vec<Value>),
}

impl PrimaryResult {
    /// 统一展开为记录列表
    pub fn into_records(self) -> Vec<Value> {
        match self {
            Self::Record(record) => vec![record],
            Self::List(records) => records,
        }
    }
}

/// 规则引擎错误，区分"无匹配"与传输故障
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrimaryError {
    #[error("规则引擎无匹配记录")]
    NoMatch,

    #[error("规则引擎传输失败: {0}")]
    Transport(String),

    #[error("规则引擎响应格式无效: {0}")]
    Malformed(String),
}

/// 规则引擎对一条 DQL 语句的底层请求描述（不执行）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRequest {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub body: Option<Value>,
}

/// 规则引擎的抽象接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrimaryEngine: Send + Sync {
    /// 执行一条 DQL 语句
    async fn execute(&self, statement: &DqlStatement) -> Result<PrimaryResult, PrimaryError>;

    /// 返回语句翻译后的底层请求，不落库
    async fn explain(&self, statement: &DqlStatement) -> Result<EngineRequest, PrimaryError>;
}

/// 基于 HTTP 的规则引擎客户端
///
/// `POST {url}/execute` 执行语句，`POST {url}/explain` 获取底层请求。
/// reqwest::Client 内部带连接池，clone 是廉价操作。
#[derive(Clone)]
pub struct HttpPrimaryEngine {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPrimaryEngine {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PrimaryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PrimaryError::Transport(format!("创建 HTTP 客户端失败: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &PrimaryEngineConfig) -> Result<Self, PrimaryError> {
        Self::new(&config.url, Duration::from_secs(config.timeout_seconds))
    }

    async fn post_statement(
        &self,
        endpoint: &str,
        statement: &DqlStatement,
    ) -> Result<Value, PrimaryError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        debug!(%url, statement = %statement, "发送 DQL 语句到规则引擎");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(statement.as_str().to_string())
            .send()
            .await
            .map_err(|e| PrimaryError::Transport(format!("{url}: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PrimaryError::NoMatch);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PrimaryError::Transport(format!("HTTP {status}: {body}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PrimaryError::Transport(format!("读取响应失败: {e}")))?;

        serde_json::from_slice(&bytes).map_err(|e| PrimaryError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl PrimaryEngine for HttpPrimaryEngine {
    async fn execute(&self, statement: &DqlStatement) -> Result<PrimaryResult, PrimaryError> {
        let body = self.post_statement("execute", statement).await?;
        parse_result(body)
    }

    async fn explain(&self, statement: &DqlStatement) -> Result<EngineRequest, PrimaryError> {
        let body = self.post_statement("explain", statement).await?;
        if body.is_null() {
            return Err(PrimaryError::Malformed("空响应".to_string()));
        }
        serde_json::from_value(body).map_err(|e| PrimaryError::Malformed(e.to_string()))
    }
}

/// `{"list": [...]}` 或数组为列表，其他对象为单条记录，null 视为协议错误
fn parse_result(body: Value) -> Result<PrimaryResult, PrimaryError> {
    match body {
        Value::Null => Err(PrimaryError::Malformed("空响应".to_string())),
        Value::Array(records) => Ok(PrimaryResult::List(records)),
        Value::Object(mut map) => match map.remove("list") {
            Some(Value::Array(records)) => Ok(PrimaryResult::List(records)),
            Some(Value::Null) => Ok(PrimaryResult::List(Vec::new())),
            Some(other) => Err(PrimaryError::Malformed(format!(
                "list 字段不是数组: {other}"
            ))),
            None => Ok(PrimaryResult::Record(Value::Object(map))),
        },
        other => Err(PrimaryError::Malformed(format!("意外的响应: {other}"))),
    }
}
