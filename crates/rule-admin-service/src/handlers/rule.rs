//! 规则 API 处理器
//!
//! 每个处理器只做请求解析和结果包装，双存储语义全部由编排器负责。
//! 搜索索引降级不会让请求失败，只表现为响应中缺少搜索索引部分。

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use rule_sync::{DeleteAck, EngineRequest, MergedRule, RuleInput, StoredRule};
use serde_json::Value;
use tracing::info;

use crate::{dto::ApiResponse, error::AdminError, state::AppState};

/// 创建规则
///
/// POST /api/rules
pub async fn create_rule(
    State(state): State<AppState>,
    payload: Result<Json<RuleInput>, JsonRejection>,
) -> Result<Json<ApiResponse<StoredRule>>, AdminError> {
    let Json(input) = payload?;

    let outcome = state.orchestrator.create_rule(input).await?;

    info!(rule_id = %outcome.value.id, completeness = ?outcome.completeness(), "Rule created via API");

    Ok(Json(ApiResponse::success(outcome.into_inner())))
}

/// 按过滤条件查询规则
///
/// POST /api/rules/select
///
/// 请求体为原始过滤条件文本，为空时返回默认分页
pub async fn select_rules(
    State(state): State<AppState>,
    filter: String,
) -> Result<Json<ApiResponse<Vec<Value>>>, AdminError> {
    let filter = Some(filter.trim()).filter(|f| !f.is_empty());

    let rules = state.orchestrator.list_rules(filter).await?;

    Ok(Json(ApiResponse::success(rules)))
}

/// 解释 DQL 语句
///
/// POST /api/rules/query/json
pub async fn explain_statement(
    State(state): State<AppState>,
    statement: String,
) -> Result<Json<ApiResponse<EngineRequest>>, AdminError> {
    let request = state.orchestrator.explain_statement(&statement).await?;

    Ok(Json(ApiResponse::success(request)))
}

/// 获取规则详情
///
/// GET /api/rules/{id}
pub async fn get_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MergedRule>>, AdminError> {
    let outcome = state.orchestrator.get_rule(&id).await?;

    Ok(Json(ApiResponse::success(outcome.into_inner())))
}

/// 更新搜索索引中的规则文档
///
/// PUT /api/rules/{id}
pub async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApiResponse<Value>>, AdminError> {
    let Json(patch) = payload?;

    let document = state.orchestrator.update_rule_document(&id, patch).await?;

    Ok(Json(ApiResponse::success(document)))
}

/// 删除规则
///
/// DELETE /api/rules/{id}
pub async fn delete_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DeleteAck>>, AdminError> {
    let outcome = state.orchestrator.delete_rule(&id).await?;

    info!(rule_id = %id, completeness = ?outcome.completeness(), "Rule deleted via API");

    Ok(Json(ApiResponse::success(outcome.into_inner())))
}

/// 获取规则统计
///
/// GET /api/rules/stats/{id}
pub async fn get_rule_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Value>>, AdminError> {
    let stats = state.orchestrator.get_rule_stats(&id).await?;

    Ok(Json(ApiResponse::success(stats)))
}
