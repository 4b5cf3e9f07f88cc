//! 搜索索引客户端
//!
//! 文档式接口：按集合和 id 读写删除。搜索索引只是规则的反范式副本，不具备权威性。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use rulesync_shared::config::SecondaryIndexConfig;
use serde_json::Value;
use tracing::debug;

/// 索引不存在时搜索引擎返回的错误类型
const INDEX_NOT_FOUND: &str = "index_not_found_exception";

/// 搜索索引错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecondaryError {
    #[error("文档不存在")]
    NotFound,

    #[error("索引不存在: {0}")]
    IndexMissing(String),

    #[error("搜索索引拒绝请求: HTTP {status} {body}")]
    Rejected { status: u16, body: String },

    #[error("搜索索引传输失败: {0}")]
    Transport(String),
}

/// 搜索索引的抽象接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecondaryIndex: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Value, SecondaryError>;

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        document: &Value,
    ) -> Result<(), SecondaryError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), SecondaryError>;
}

/// 基于 HTTP 文档 API 的搜索索引客户端
///
/// `GET|PUT|DELETE {url}/{collection}/_doc/{id}`
#[derive(Clone)]
pub struct HttpSecondaryIndex {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpSecondaryIndex {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SecondaryError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SecondaryError::Transport(format!("无效的索引地址 {base_url}: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SecondaryError::Transport(format!("创建 HTTP 客户端失败: {e}")))?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &SecondaryIndexConfig) -> Result<Self, SecondaryError> {
        Self::new(&config.url, Duration::from_secs(config.timeout_seconds))
    }

    /// 路径段逐个追加，id 中的特殊字符会被百分号编码
    fn doc_url(&self, collection: &str, id: &str) -> Result<Url, SecondaryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SecondaryError::Transport(format!("无效的索引地址: {}", self.base_url)))?
            .pop_if_empty()
            .extend([collection, "_doc", id]);
        Ok(url)
    }
}

#[async_trait]
impl SecondaryIndex for HttpSecondaryIndex {
    async fn get(&self, collection: &str, id: &str) -> Result<Value, SecondaryError> {
        let url = self.doc_url(collection, id)?;
        debug!(%url, "读取索引文档");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SecondaryError::Transport(e.to_string()))?;

        let mut body = read_body(collection, response).await?;
        match body.get_mut("_source") {
            Some(source) => Ok(source.take()),
            None => Err(SecondaryError::NotFound),
        }
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        document: &Value,
    ) -> Result<(), SecondaryError> {
        let url = self.doc_url(collection, id)?;
        debug!(%url, "写入索引文档");

        let response = self
            .client
            .put(url)
            .query(&[("refresh", "wait_for")])
            .json(document)
            .send()
            .await
            .map_err(|e| SecondaryError::Transport(e.to_string()))?;

        read_body(collection, response).await.map(|_| ())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), SecondaryError> {
        let url = self.doc_url(collection, id)?;
        debug!(%url, "删除索引文档");

        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| SecondaryError::Transport(e.to_string()))?;

        read_body(collection, response).await.map(|_| ())
    }
}

/// 状态码分类：404 区分文档缺失与索引缺失，其余非 2xx 视为拒绝
async fn read_body(collection: &str, response: reqwest::Response) -> Result<Value, SecondaryError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| SecondaryError::Transport(format!("读取响应失败: {e}")))?;
    let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

    if status == StatusCode::NOT_FOUND {
        let error_type = body
            .pointer("/error/type")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if error_type == INDEX_NOT_FOUND {
            return Err(SecondaryError::IndexMissing(collection.to_string()));
        }
        return Err(SecondaryError::NotFound);
    }

    if !status.is_success() {
        return Err(SecondaryError::Rejected {
            status: status.as_u16(),
            body: text,
        });
    }

    Ok(body)
}
