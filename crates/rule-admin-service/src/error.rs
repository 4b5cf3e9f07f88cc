//! 管理服务错误类型定义
//!
//! 编排层错误到 HTTP 状态码的映射集中在这里

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rule_sync::{FieldError, Store, SyncError, ValidationError};
use serde_json::json;

/// 管理服务错误类型
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    // 验证错误
    #[error("参数验证失败: {0}")]
    Validation(ValidationError),
    #[error("请求体无效: {0}")]
    BadRequest(String),

    // 资源不存在
    #[error("规则不存在: {0}")]
    RuleNotFound(String),
    #[error("搜索索引中无此记录: {0}")]
    DocumentNotFound(String),

    // 上游错误
    #[error("规则引擎不可用: {0}")]
    RuleEngineUnavailable(String),
    #[error("搜索索引不可用: {0}")]
    SearchIndexUnavailable(String),

    // 系统错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl AdminError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::PRECONDITION_FAILED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RuleNotFound(_) | Self::DocumentNotFound(_) => StatusCode::NOT_FOUND,
            Self::RuleEngineUnavailable(_) | Self::SearchIndexUnavailable(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::RuleNotFound(_) => "RULE_NOT_FOUND",
            Self::DocumentNotFound(_) => "DOCUMENT_NOT_FOUND",
            Self::RuleEngineUnavailable(_) => "RULE_ENGINE_UNAVAILABLE",
            Self::SearchIndexUnavailable(_) => "SEARCH_INDEX_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn field_errors(&self) -> Option<&[FieldError]> {
        match self {
            Self::Validation(v) => Some(&v.fields),
            _ => None,
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 上游与系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::RuleEngineUnavailable(e) => {
                tracing::error!(error = %e, "规则引擎调用失败");
                "规则引擎暂时不可用，请稍后重试".to_string()
            }
            Self::SearchIndexUnavailable(e) => {
                tracing::error!(error = %e, "搜索索引调用失败");
                "搜索索引暂时不可用，请稍后重试".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let data = match self.field_errors() {
            Some(fields) => json!(fields),
            None => serde_json::Value::Null,
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": data
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 从编排层错误转换
impl From<SyncError> for AdminError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Validation(v) => Self::Validation(v),
            SyncError::RecordNotFound {
                store: Store::Primary,
                id,
            } => Self::RuleNotFound(id),
            SyncError::RecordNotFound {
                store: Store::Secondary,
                id,
            } => Self::DocumentNotFound(id),
            SyncError::UpstreamUnavailable(msg) => Self::RuleEngineUnavailable(msg),
            SyncError::SecondaryUnavailable(msg) => Self::SearchIndexUnavailable(msg),
        }
    }
}

/// 从 JSON 提取失败转换
impl From<JsonRejection> for AdminError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, AdminError>;
