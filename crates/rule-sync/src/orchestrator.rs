//! 双存储编排
//!
//! 每个操作先对规则引擎执行翻译后的语句，再尽力对搜索索引做镜像：
//!
//! ```text
//! Started → PrimaryDone → Reconciled(Complete | PartialSecondaryMissing) → Terminal
//! ```
//!
//! - 规则引擎失败是致命的，直接返回，不再访问搜索索引
//! - 搜索索引失败不影响操作结果，转换为 `SecondaryDegraded` 随成功结果返回
//! - 两次存储调用顺序执行，副存储的输入（分配的 id）依赖主存储的结果
//! - 不做重试、不做跨存储事务，并发的创建/删除可能让副存储短暂不一致
//!
//! 更新权威划分：规则引擎对 DQL 中出现的字段（名称、作用域、条件、动作、标签、描述）
//! 具有唯一权威，这些字段目前没有更新路径；搜索索引只对镜像文档上的附加字段具有权威，
//! 通过 `update_rule_document` 修改。

use std::sync::Arc;
use std::time::Instant;

use rulesync_shared::observability::metrics;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{Instrument, Span, debug, info, info_span, warn};
use uuid::Uuid;

use crate::clients::{EngineRequest, PrimaryEngine, PrimaryError, SecondaryError, SecondaryIndex};
use crate::dql::{DEFAULT_PAGE_SIZE, DqlStatement, Intent, translate};
use crate::error::{
    FieldError, Operation, Result, SecondaryDegraded, Store, SyncError, ValidationError,
};
use crate::model::{Rule, RuleDocument, RuleInput};
use crate::reconciler::{self, MergedRule};

/// 操作最终的完整度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completeness {
    Complete,
    PartialSecondaryMissing,
}

/// 带副存储降级信号的成功结果
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome<T> {
    pub value: T,
    pub degraded: Option<SecondaryDegraded>,
}

impl<T> SyncOutcome<T> {
    fn new(value: T, degraded: Option<SecondaryDegraded>) -> Self {
        Self { value, degraded }
    }

    pub fn completeness(&self) -> Completeness {
        if self.degraded.is_some() {
            Completeness::PartialSecondaryMissing
        } else {
            Completeness::Complete
        }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

/// 已写入规则引擎的规则
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRule {
    pub id: String,
    pub rule: Rule,
    /// 规则引擎创建接口的原始返回
    pub primary: Value,
}

/// 删除确认
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteAck {
    pub id: String,
}

/// 状态机阶段，仅用于调试日志
#[derive(Debug, Clone, Copy)]
enum Phase {
    Started,
    PrimaryDone,
    Reconciled(Completeness),
    Terminal,
}

/// 单次操作的上下文：操作 id、span 与计时
struct OpContext {
    id: Uuid,
    operation: Operation,
    started: Instant,
    span: Span,
}

impl OpContext {
    fn start(operation: Operation, rule_id: Option<&str>) -> Self {
        let id = Uuid::new_v4();
        let span = info_span!(
            "rule_sync",
            operation = operation.as_str(),
            operation_id = %id,
            rule_id = rule_id.unwrap_or_default(),
        );
        let ctx = Self {
            id,
            operation,
            started: Instant::now(),
            span,
        };
        ctx.phase(Phase::Started);
        ctx
    }

    fn phase(&self, phase: Phase) {
        self.span.in_scope(|| match phase {
            Phase::Reconciled(completeness) => {
                debug!(phase = "Reconciled", ?completeness, "rule sync phase")
            }
            other => debug!(phase = ?other, "rule sync phase"),
        });
    }

    fn finish(&self, outcome: &str) {
        self.phase(Phase::Terminal);
        metrics::record_rule_operation(
            self.operation.as_str(),
            outcome,
            self.started.elapsed().as_secs_f64(),
        );
    }

    /// 记录副存储失败并生成降级信号
    fn degrade(&self, rule_id: &str, err: &SecondaryError) -> SecondaryDegraded {
        let degraded = SecondaryDegraded::new(self.id, self.operation, rule_id, err);

        warn!(
            operation_id = %self.id,
            operation = self.operation.as_str(),
            rule_id,
            kind = degraded.kind.as_str(),
            error = %err,
            "搜索索引操作失败，已降级"
        );
        metrics::record_secondary_degraded(self.operation.as_str(), degraded.kind.as_str());

        degraded
    }
}

fn outcome_label<T>(result: &Result<SyncOutcome<T>>) -> &'static str {
    match result {
        Ok(outcome) => match outcome.completeness() {
            Completeness::Complete => "complete",
            Completeness::PartialSecondaryMissing => "partial",
        },
        Err(_) => "failed",
    }
}

fn plain_label<T>(result: &Result<T>) -> &'static str {
    if result.is_ok() { "complete" } else { "failed" }
}

/// 规则引擎错误一律致命
fn primary_fatal(err: PrimaryError) -> SyncError {
    SyncError::UpstreamUnavailable(err.to_string())
}

/// 规则引擎为新规则分配的 id
fn assigned_id(record: &Value) -> Option<String> {
    ["/id", "/itemId", "/metadata/id"]
        .iter()
        .find_map(|pointer| record.pointer(pointer).and_then(Value::as_str))
        .filter(|id| !id.is_empty())
        .map(String::from)
}

/// 双存储编排器
///
/// 只持有两个存储客户端句柄，不在请求之间保存可变状态，可被任意多个请求并发使用。
#[derive(Clone)]
pub struct Orchestrator {
    primary: Arc<dyn PrimaryEngine>,
    secondary: Arc<dyn SecondaryIndex>,
    rules_index: String,
    stats_index: String,
}

impl Orchestrator {
    pub fn new(
        primary: Arc<dyn PrimaryEngine>,
        secondary: Arc<dyn SecondaryIndex>,
        rules_index: impl Into<String>,
        stats_index: impl Into<String>,
    ) -> Self {
        Self {
            primary,
            secondary,
            rules_index: rules_index.into(),
            stats_index: stats_index.into(),
        }
    }

    /// 创建规则
    ///
    /// 校验失败不会触达任何存储；规则引擎失败直接返回；搜索索引写入失败只产生降级信号。
    pub async fn create_rule(&self, input: RuleInput) -> Result<SyncOutcome<StoredRule>> {
        let ctx = OpContext::start(Operation::Create, None);
        let result = self.create_inner(&ctx, input).instrument(ctx.span.clone()).await;
        ctx.finish(outcome_label(&result));
        result
    }

    async fn create_inner(
        &self,
        ctx: &OpContext,
        input: RuleInput,
    ) -> Result<SyncOutcome<StoredRule>> {
        let rule = Rule::from_input(input)?;
        let statement = translate(Intent::Create(&rule));

        let record = self
            .primary
            .execute(&statement)
            .await
            .map_err(primary_fatal)?
            .into_records()
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::UpstreamUnavailable("规则引擎未返回创建结果".to_string()))?;
        let id = assigned_id(&record)
            .ok_or_else(|| SyncError::UpstreamUnavailable("规则引擎未返回规则 id".to_string()))?;
        ctx.phase(Phase::PrimaryDone);

        info!(rule_id = %id, name = rule.name(), scope = rule.scope(), "Rule created");

        let document: Value = RuleDocument::new(&rule, &id, statement.as_str()).into();
        let degraded = match self.secondary.upsert(&self.rules_index, &id, &document).await {
            Ok(()) => None,
            Err(e) => Some(ctx.degrade(&id, &e)),
        };

        let outcome = SyncOutcome::new(
            StoredRule {
                id: id.clone(),
                rule: rule.with_id(id),
                primary: record,
            },
            degraded,
        );
        ctx.phase(Phase::Reconciled(outcome.completeness()));
        Ok(outcome)
    }

    /// 按 id 读取规则
    ///
    /// 规则引擎无匹配时返回 `RecordNotFound`，且不访问搜索索引；
    /// 搜索索引的任何失败都只是让结果缺少副存储部分。
    pub async fn get_rule(&self, id: &str) -> Result<SyncOutcome<MergedRule>> {
        let ctx = OpContext::start(Operation::Get, Some(id));
        let result = self.get_inner(&ctx, id).instrument(ctx.span.clone()).await;
        ctx.finish(outcome_label(&result));
        result
    }

    async fn get_inner(&self, ctx: &OpContext, id: &str) -> Result<SyncOutcome<MergedRule>> {
        let primary = match self.primary.execute(&translate(Intent::SelectById(id))).await {
            Ok(result) => result.into_records().into_iter().next(),
            Err(PrimaryError::NoMatch) => None,
            Err(e) => return Err(primary_fatal(e)),
        }
        .ok_or_else(|| SyncError::not_found(Store::Primary, id))?;
        ctx.phase(Phase::PrimaryDone);

        let (secondary, degraded) = match self.secondary.get(&self.rules_index, id).await {
            Ok(document) => (Some(document), None),
            Err(e) => (None, Some(ctx.degrade(id, &e))),
        };

        let outcome = SyncOutcome::new(reconciler::merge(primary, secondary), degraded);
        ctx.phase(Phase::Reconciled(outcome.completeness()));
        Ok(outcome)
    }

    /// 按过滤条件列出规则
    ///
    /// 只查询规则引擎。过滤条件为空时最多返回默认分页大小条记录；
    /// 空结果不是错误，只有规则引擎传输或协议故障才报错。
    pub async fn list_rules(&self, filter: Option<&str>) -> Result<Vec<Value>> {
        let ctx = OpContext::start(Operation::List, None);
        let result = self.list_inner(&ctx, filter).instrument(ctx.span.clone()).await;
        ctx.finish(plain_label(&result));
        result
    }

    async fn list_inner(&self, ctx: &OpContext, filter: Option<&str>) -> Result<Vec<Value>> {
        let paged = filter.is_none_or(|f| f.trim().is_empty());
        let statement = translate(Intent::Select(filter));

        let mut records = match self.primary.execute(&statement).await {
            Ok(result) => result.into_records(),
            Err(PrimaryError::NoMatch) => Vec::new(),
            Err(e) => return Err(primary_fatal(e)),
        };
        ctx.phase(Phase::PrimaryDone);

        if paged {
            records.truncate(DEFAULT_PAGE_SIZE);
        }
        debug!(count = records.len(), "Rules listed");
        Ok(records)
    }

    /// 删除规则
    ///
    /// 规则引擎删除是必须的；搜索索引中文档不存在视为已删除，其他失败只产生降级信号。
    pub async fn delete_rule(&self, id: &str) -> Result<SyncOutcome<DeleteAck>> {
        let ctx = OpContext::start(Operation::Delete, Some(id));
        let result = self.delete_inner(&ctx, id).instrument(ctx.span.clone()).await;
        ctx.finish(outcome_label(&result));
        result
    }

    async fn delete_inner(&self, ctx: &OpContext, id: &str) -> Result<SyncOutcome<DeleteAck>> {
        match self.primary.execute(&translate(Intent::DeleteById(id))).await {
            Ok(_) => {}
            Err(PrimaryError::NoMatch) => return Err(SyncError::not_found(Store::Primary, id)),
            Err(e) => return Err(primary_fatal(e)),
        }
        ctx.phase(Phase::PrimaryDone);

        info!(rule_id = id, "Rule deleted");

        let degraded = match self.secondary.delete(&self.rules_index, id).await {
            Ok(()) => None,
            Err(SecondaryError::NotFound) => {
                debug!(rule_id = id, "搜索索引中无此规则，跳过");
                None
            }
            Err(e) => Some(ctx.degrade(id, &e)),
        };

        let outcome = SyncOutcome::new(DeleteAck { id: id.to_string() }, degraded);
        ctx.phase(Phase::Reconciled(outcome.completeness()));
        Ok(outcome)
    }

    /// 更新搜索索引中的规则文档
    ///
    /// 只访问搜索索引。规则引擎拥有权威的字段不允许在这里修改，
    /// 其余字段浅合并到现有文档后整体写回。
    pub async fn update_rule_document(&self, id: &str, patch: Value) -> Result<Value> {
        let ctx = OpContext::start(Operation::Update, Some(id));
        let result = self
            .update_inner(id, patch)
            .instrument(ctx.span.clone())
            .await;
        ctx.finish(plain_label(&result));
        result
    }

    async fn update_inner(&self, id: &str, patch: Value) -> Result<Value> {
        let patch = check_secondary_patch(patch)?;

        let mut document = match self.secondary.get(&self.rules_index, id).await {
            Ok(Value::Object(document)) => document,
            Ok(other) => {
                return Err(SyncError::SecondaryUnavailable(format!(
                    "搜索索引中的规则文档格式无效: {other}"
                )));
            }
            Err(e) => return Err(secondary_only_error(Store::Secondary, id, e)),
        };
        document.extend(patch);
        let document = Value::Object(document);

        self.secondary
            .upsert(&self.rules_index, id, &document)
            .await
            .map_err(|e| secondary_only_error(Store::Secondary, id, e))?;

        info!(rule_id = id, "Rule document updated");
        Ok(document)
    }

    /// 读取规则统计，只访问搜索索引
    pub async fn get_rule_stats(&self, id: &str) -> Result<Value> {
        let ctx = OpContext::start(Operation::Stats, Some(id));
        let result = self
            .secondary
            .get(&self.stats_index, id)
            .instrument(ctx.span.clone())
            .await
            .map_err(|e| secondary_only_error(Store::Secondary, id, e));
        ctx.finish(plain_label(&result));
        result
    }

    /// 返回 DQL 语句在规则引擎中对应的底层请求，不执行
    pub async fn explain_statement(&self, statement: &str) -> Result<EngineRequest> {
        let ctx = OpContext::start(Operation::Explain, None);
        let result: Result<EngineRequest> = async {
            if statement.trim().is_empty() {
                return Err(SyncError::from(ValidationError::single(
                    "statement",
                    "DQL 语句不能为空",
                )));
            }
            self.primary
                .explain(&DqlStatement::raw(statement))
                .await
                .map_err(primary_fatal)
        }
        .instrument(ctx.span.clone())
        .await;
        ctx.finish(plain_label(&result));
        result
    }
}

/// 副存储是本次调用唯一的数据来源时，缺失即"不存在"，其他失败即"不可用"
fn secondary_only_error(store: Store, id: &str, err: SecondaryError) -> SyncError {
    match err {
        SecondaryError::NotFound | SecondaryError::IndexMissing(_) => SyncError::not_found(store, id),
        other => SyncError::SecondaryUnavailable(other.to_string()),
    }
}

/// 校验副存储更新：必须是对象，且不包含规则引擎权威字段
fn check_secondary_patch(patch: Value) -> Result<Map<String, Value>> {
    let Value::Object(patch) = patch else {
        return Err(ValidationError::single("document", "更新内容必须是 JSON 对象").into());
    };

    let rejected: Vec<FieldError> = RuleDocument::PRIMARY_OWNED_FIELDS
        .iter()
        .filter(|field| patch.contains_key(**field))
        .map(|field| FieldError::new(*field, "该字段以规则引擎为准，不能在搜索索引中修改"))
        .collect();
    if !rejected.is_empty() {
        return Err(ValidationError::new(rejected).into());
    }

    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{MockPrimaryEngine, MockSecondaryIndex, PrimaryResult};
    use crate::error::DegradedKind;
    use serde_json::json;

    fn orchestrator(primary: MockPrimaryEngine, secondary: MockSecondaryIndex) -> Orchestrator {
        Orchestrator::new(Arc::new(primary), Arc::new(secondary), "rules", "rulestats")
    }

    fn scenario_input() -> RuleInput {
        RuleInput {
            name: "R1".into(),
            scope: "s1".into(),
            condition: r#"eventType="view""#.into(),
            actions: vec!["a1".into()],
            description: String::new(),
            tags: vec![],
        }
    }

    const SCENARIO_DQL: &str =
        r#"CREATE RULE WITH TAGS ["uql"] "R1" DESCRIBE "" IN SCOPE "s1" WHEN eventType="view" THEN a1"#;

    // ---- create ----

    #[tokio::test]
    async fn test_create_survives_missing_index() {
        let mut primary = MockPrimaryEngine::new();
        primary
            .expect_execute()
            .withf(|stmt| stmt.as_str() == SCENARIO_DQL)
            .times(1)
            .returning(|_| Ok(PrimaryResult::Record(json!({"itemId": "id-1"}))));

        let mut secondary = MockSecondaryIndex::new();
        secondary
            .expect_upsert()
            .withf(|collection, id, doc| {
                collection == "rules" && id == "id-1" && doc["dql"] == SCENARIO_DQL
            })
            .times(1)
            .returning(|_, _, _| Err(SecondaryError::IndexMissing("rules".into())));

        let outcome = orchestrator(primary, secondary)
            .create_rule(scenario_input())
            .await
            .unwrap();

        assert_eq!(outcome.completeness(), Completeness::PartialSecondaryMissing);
        let degraded = outcome.degraded.as_ref().unwrap();
        assert_eq!(degraded.kind, DegradedKind::IndexMissing);
        assert_eq!(degraded.operation, Operation::Create);
        assert_eq!(degraded.rule_id, "id-1");
        assert_eq!(outcome.value.id, "id-1");
        assert_eq!(outcome.value.rule.id(), Some("id-1"));
    }

    #[tokio::test]
    async fn test_create_complete_when_both_stores_succeed() {
        let mut primary = MockPrimaryEngine::new();
        primary
            .expect_execute()
            .returning(|_| Ok(PrimaryResult::Record(json!({"metadata": {"id": "id-7"}}))));

        let mut secondary = MockSecondaryIndex::new();
        secondary
            .expect_upsert()
            .withf(|_, id, doc| id == "id-7" && doc["tags"] == json!(["vip", "uql"]))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let outcome = orchestrator(primary, secondary)
            .create_rule(RuleInput {
                tags: vec!["vip".into()],
                ..scenario_input()
            })
            .await
            .unwrap();

        assert_eq!(outcome.completeness(), Completeness::Complete);
        assert!(outcome.degraded.is_none());
        assert_eq!(outcome.value.id, "id-7");
    }

    #[tokio::test]
    async fn test_create_other_secondary_failure_is_also_absorbed() {
        let mut primary = MockPrimaryEngine::new();
        primary
            .expect_execute()
            .returning(|_| Ok(PrimaryResult::Record(json!({"id": "id-2"}))));

        let mut secondary = MockSecondaryIndex::new();
        secondary
            .expect_upsert()
            .times(1)
            .returning(|_, _, _| Err(SecondaryError::Transport("connection reset".into())));

        let outcome = orchestrator(primary, secondary)
            .create_rule(scenario_input())
            .await
            .unwrap();

        assert_eq!(outcome.degraded.unwrap().kind, DegradedKind::Transport);
    }

    #[tokio::test]
    async fn test_create_validation_never_reaches_stores() {
        let mut primary = MockPrimaryEngine::new();
        primary.expect_execute().never();
        let mut secondary = MockSecondaryIndex::new();
        secondary.expect_upsert().never();

        let err = orchestrator(primary, secondary)
            .create_rule(RuleInput {
                scope: String::new(),
                condition: String::new(),
                ..scenario_input()
            })
            .await
            .unwrap_err();

        match err {
            SyncError::Validation(v) => assert_eq!(v.field_names(), vec!["scope", "condition"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_primary_failure_is_fatal_and_skips_secondary() {
        let mut primary = MockPrimaryEngine::new();
        primary
            .expect_execute()
            .times(1)
            .returning(|_| Err(PrimaryError::Transport("connection refused".into())));
        let mut secondary = MockSecondaryIndex::new();
        secondary.expect_upsert().never();

        let err = orchestrator(primary, secondary)
            .create_rule(scenario_input())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_create_without_assigned_id_is_upstream_error() {
        let mut primary = MockPrimaryEngine::new();
        primary
            .expect_execute()
            .returning(|_| Ok(PrimaryResult::Record(json!({"status": "ok"}))));
        let mut secondary = MockSecondaryIndex::new();
        secondary.expect_upsert().never();

        let err = orchestrator(primary, secondary)
            .create_rule(scenario_input())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UpstreamUnavailable(_)));
    }

    // ---- get ----

    #[tokio::test]
    async fn test_get_missing_id_skips_secondary() {
        let mut primary = MockPrimaryEngine::new();
        primary
            .expect_execute()
            .withf(|stmt| stmt.as_str() == r#"SELECT RULE WHERE id="missing-id""#)
            .times(1)
            .returning(|_| Ok(PrimaryResult::List(vec![])));
        let mut secondary = MockSecondaryIndex::new();
        secondary.expect_get().never();

        let err = orchestrator(primary, secondary)
            .get_rule("missing-id")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::RecordNotFound { store: Store::Primary, ref id } if id == "missing-id"
        ));
    }

    #[tokio::test]
    async fn test_get_primary_no_match_is_not_found() {
        let mut primary = MockPrimaryEngine::new();
        primary
            .expect_execute()
            .returning(|_| Err(PrimaryError::NoMatch));
        let mut secondary = MockSecondaryIndex::new();
        secondary.expect_get().never();

        let err = orchestrator(primary, secondary).get_rule("x").await.unwrap_err();
        assert!(matches!(err, SyncError::RecordNotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_secondary_not_found_returns_primary_only() {
        let mut primary = MockPrimaryEngine::new();
        primary
            .expect_execute()
            .returning(|_| Ok(PrimaryResult::List(vec![json!({"itemId": "id-1"})])));
        let mut secondary = MockSecondaryIndex::new();
        secondary
            .expect_get()
            .withf(|collection, id| collection == "rules" && id == "id-1")
            .times(1)
            .returning(|_, _| Err(SecondaryError::NotFound));

        let outcome = orchestrator(primary, secondary)
            .get_rule("id-1")
            .await
            .unwrap();

        assert_eq!(outcome.value.primary, json!({"itemId": "id-1"}));
        assert!(outcome.value.secondary.is_none());
        assert_eq!(outcome.degraded.unwrap().kind, DegradedKind::NotFound);
    }

    async fn get_with_secondary_error(error: fn() -> SecondaryError) -> SyncOutcome<MergedRule> {
        let mut primary = MockPrimaryEngine::new();
        primary
            .expect_execute()
            .times(1)
            .returning(|_| Ok(PrimaryResult::List(vec![json!({"itemId": "id-1"})])));
        let mut secondary = MockSecondaryIndex::new();
        secondary
            .expect_get()
            .times(1)
            .returning(move |_, _| Err(error()));

        orchestrator(primary, secondary)
            .get_rule("id-1")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_secondary_transport_returns_primary_only() {
        let outcome =
            get_with_secondary_error(|| SecondaryError::Transport("connection reset".into())).await;

        assert_eq!(outcome.value.primary, json!({"itemId": "id-1"}));
        assert!(outcome.value.secondary.is_none());
        assert_eq!(outcome.completeness(), Completeness::PartialSecondaryMissing);
        assert_eq!(outcome.degraded.unwrap().kind, DegradedKind::Transport);
    }

    #[tokio::test]
    async fn test_get_secondary_rejected_returns_primary_only() {
        let outcome = get_with_secondary_error(|| SecondaryError::Rejected {
            status: 500,
            body: "shard failure".into(),
        })
        .await;

        assert!(outcome.value.secondary.is_none());
        let degraded = outcome.degraded.unwrap();
        assert_eq!(degraded.kind, DegradedKind::Rejected);
        assert_eq!(degraded.operation, Operation::Get);
        assert_eq!(degraded.rule_id, "id-1");
    }

    #[tokio::test]
    async fn test_get_secondary_index_missing_returns_primary_only() {
        let outcome =
            get_with_secondary_error(|| SecondaryError::IndexMissing("rules".into())).await;

        assert_eq!(outcome.value.primary, json!({"itemId": "id-1"}));
        assert!(outcome.value.secondary.is_none());
        assert_eq!(outcome.degraded.unwrap().kind, DegradedKind::IndexMissing);
    }

    #[tokio::test]
    async fn test_get_is_idempotent() {
        let mut primary = MockPrimaryEngine::new();
        primary
            .expect_execute()
            .times(2)
            .returning(|_| Ok(PrimaryResult::List(vec![json!({"itemId": "id-1"})])));
        let mut secondary = MockSecondaryIndex::new();
        secondary
            .expect_get()
            .times(2)
            .returning(|_, _| Ok(json!({"id": "id-1", "name": "R1"})));

        let orchestrator = orchestrator(primary, secondary);
        let first = orchestrator.get_rule("id-1").await.unwrap();
        let second = orchestrator.get_rule("id-1").await.unwrap();

        assert_eq!(first.value, second.value);
        assert_eq!(first.completeness(), Completeness::Complete);
    }

    #[tokio::test]
    async fn test_get_upstream_failure() {
        let mut primary = MockPrimaryEngine::new();
        primary
            .expect_execute()
            .returning(|_| Err(PrimaryError::Malformed("null".into())));
        let mut secondary = MockSecondaryIndex::new();
        secondary.expect_get().never();

        let err = orchestrator(primary, secondary).get_rule("id-1").await.unwrap_err();
        assert!(matches!(err, SyncError::UpstreamUnavailable(_)));
    }

    // ---- list ----

    #[tokio::test]
    async fn test_list_without_filter_is_capped() {
        let mut primary = MockPrimaryEngine::new();
        primary
            .expect_execute()
            .withf(|stmt| stmt.as_str() == "SELECT RULE LIMIT 20")
            .returning(|_| {
                Ok(PrimaryResult::List(
                    (0..30).map(|i| json!({"itemId": i})).collect(),
                ))
            });
        let mut secondary = MockSecondaryIndex::new();
        secondary.expect_get().never();

        let rules = orchestrator(primary, secondary).list_rules(None).await.unwrap();
        assert_eq!(rules.len(), DEFAULT_PAGE_SIZE);
    }

    #[tokio::test]
    async fn test_list_with_filter_is_verbatim() {
        let mut primary = MockPrimaryEngine::new();
        primary
            .expect_execute()
            .withf(|stmt| stmt.as_str() == r#"SELECT RULE WHERE scope="s1""#)
            .times(1)
            .returning(|_| Ok(PrimaryResult::List(vec![json!({"itemId": "a"})])));

        let rules = orchestrator(primary, MockSecondaryIndex::new())
            .list_rules(Some(r#"scope="s1""#))
            .await
            .unwrap();
        assert_eq!(rules, vec![json!({"itemId": "a"})]);
    }

    #[tokio::test]
    async fn test_list_empty_is_not_an_error() {
        let mut primary = MockPrimaryEngine::new();
        primary
            .expect_execute()
            .returning(|_| Ok(PrimaryResult::List(vec![])));

        let rules = orchestrator(primary, MockSecondaryIndex::new())
            .list_rules(Some("x=1"))
            .await
            .unwrap();
        assert!(rules.is_empty());
    }

    #[tokio::test]
    async fn test_list_malformed_primary_response_is_error() {
        let mut primary = MockPrimaryEngine::new();
        primary
            .expect_execute()
            .returning(|_| Err(PrimaryError::Malformed("空响应".into())));

        let err = orchestrator(primary, MockSecondaryIndex::new())
            .list_rules(None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UpstreamUnavailable(_)));
    }

    // ---- delete ----

    #[tokio::test]
    async fn test_delete_tolerates_missing_secondary_document() {
        let mut primary = MockPrimaryEngine::new();
        primary
            .expect_execute()
            .withf(|stmt| stmt.as_str() == r#"DELETE RULE "id-1""#)
            .times(1)
            .returning(|_| Ok(PrimaryResult::Record(json!({"deleted": true}))));
        let mut secondary = MockSecondaryIndex::new();
        secondary
            .expect_delete()
            .times(1)
            .returning(|_, _| Err(SecondaryError::NotFound));

        let outcome = orchestrator(primary, secondary)
            .delete_rule("id-1")
            .await
            .unwrap();

        assert_eq!(outcome.value.id, "id-1");
        assert_eq!(outcome.completeness(), Completeness::Complete);
    }

    #[tokio::test]
    async fn test_delete_secondary_failure_is_degraded_not_fatal() {
        let mut primary = MockPrimaryEngine::new();
        primary
            .expect_execute()
            .returning(|_| Ok(PrimaryResult::Record(json!({}))));
        let mut secondary = MockSecondaryIndex::new();
        secondary.expect_delete().returning(|_, _| {
            Err(SecondaryError::Rejected {
                status: 503,
                body: "unavailable".into(),
            })
        });

        let outcome = orchestrator(primary, secondary)
            .delete_rule("id-1")
            .await
            .unwrap();
        assert_eq!(outcome.degraded.unwrap().kind, DegradedKind::Rejected);
    }

    #[tokio::test]
    async fn test_delete_missing_in_primary() {
        let mut primary = MockPrimaryEngine::new();
        primary
            .expect_execute()
            .returning(|_| Err(PrimaryError::NoMatch));
        let mut secondary = MockSecondaryIndex::new();
        secondary.expect_delete().never();

        let err = orchestrator(primary, secondary)
            .delete_rule("gone")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::RecordNotFound { store: Store::Primary, .. }));
    }

    // ---- update ----

    #[tokio::test]
    async fn test_update_rejects_primary_owned_fields() {
        let mut primary = MockPrimaryEngine::new();
        primary.expect_execute().never();
        let mut secondary = MockSecondaryIndex::new();
        secondary.expect_get().never();
        secondary.expect_upsert().never();

        let err = orchestrator(primary, secondary)
            .update_rule_document("id-1", json!({"name": "renamed", "condition": "x=2", "notes": "n"}))
            .await
            .unwrap_err();

        match err {
            SyncError::Validation(v) => assert_eq!(v.field_names(), vec!["name", "condition"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_merges_into_existing_document() {
        let mut primary = MockPrimaryEngine::new();
        primary.expect_execute().never();
        let mut secondary = MockSecondaryIndex::new();
        secondary
            .expect_get()
            .returning(|_, _| Ok(json!({"id": "id-1", "name": "R1", "enabled": true})));
        secondary
            .expect_upsert()
            .withf(|_, id, doc| id == "id-1" && doc["enabled"] == false && doc["name"] == "R1")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let doc = orchestrator(primary, secondary)
            .update_rule_document("id-1", json!({"enabled": false, "owner": "ops"}))
            .await
            .unwrap();

        assert_eq!(doc, json!({"id": "id-1", "name": "R1", "enabled": false, "owner": "ops"}));
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let mut secondary = MockSecondaryIndex::new();
        secondary
            .expect_get()
            .returning(|_, _| Err(SecondaryError::NotFound));
        secondary.expect_upsert().never();

        let err = orchestrator(MockPrimaryEngine::new(), secondary)
            .update_rule_document("id-1", json!({"enabled": false}))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::RecordNotFound { store: Store::Secondary, .. }));
    }

    #[tokio::test]
    async fn test_update_malformed_stored_document_is_unavailable() {
        let mut secondary = MockSecondaryIndex::new();
        secondary
            .expect_get()
            .times(1)
            .returning(|_, _| Ok(json!(["not", "a", "document"])));
        secondary.expect_upsert().never();

        let err = orchestrator(MockPrimaryEngine::new(), secondary)
            .update_rule_document("id-1", json!({"enabled": false}))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::SecondaryUnavailable(_)));
    }

    #[tokio::test]
    async fn test_update_requires_object() {
        let err = orchestrator(MockPrimaryEngine::new(), MockSecondaryIndex::new())
            .update_rule_document("id-1", json!(["not", "an", "object"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    // ---- stats / explain ----

    #[tokio::test]
    async fn test_stats_reads_secondary_only() {
        let mut primary = MockPrimaryEngine::new();
        primary.expect_execute().never();
        let mut secondary = MockSecondaryIndex::new();
        secondary
            .expect_get()
            .withf(|collection, id| collection == "rulestats" && id == "id-1")
            .returning(|_, _| Ok(json!({"hits": 42})));

        let stats = orchestrator(primary, secondary)
            .get_rule_stats("id-1")
            .await
            .unwrap();
        assert_eq!(stats, json!({"hits": 42}));
    }

    #[tokio::test]
    async fn test_stats_missing_is_not_found() {
        let mut secondary = MockSecondaryIndex::new();
        secondary
            .expect_get()
            .returning(|_, _| Err(SecondaryError::IndexMissing("rulestats".into())));

        let err = orchestrator(MockPrimaryEngine::new(), secondary)
            .get_rule_stats("id-1")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::RecordNotFound { store: Store::Secondary, .. }));
    }

    #[tokio::test]
    async fn test_stats_transport_failure_is_secondary_unavailable() {
        let mut secondary = MockSecondaryIndex::new();
        secondary
            .expect_get()
            .returning(|_, _| Err(SecondaryError::Transport("timeout".into())));

        let err = orchestrator(MockPrimaryEngine::new(), secondary)
            .get_rule_stats("id-1")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::SecondaryUnavailable(_)));
    }

    #[tokio::test]
    async fn test_explain_passes_statement_through() {
        let mut primary = MockPrimaryEngine::new();
        primary
            .expect_explain()
            .withf(|stmt| stmt.as_str() == "SELECT RULE LIMIT 20")
            .returning(|_| {
                Ok(EngineRequest {
                    url: "/cxs/rules/query".into(),
                    method: "POST".into(),
                    body: None,
                })
            });

        let request = orchestrator(primary, MockSecondaryIndex::new())
            .explain_statement("SELECT RULE LIMIT 20")
            .await
            .unwrap();
        assert_eq!(request.method, "POST");
    }

    #[tokio::test]
    async fn test_explain_rejects_empty_statement() {
        let mut primary = MockPrimaryEngine::new();
        primary.expect_explain().never();

        let err = orchestrator(primary, MockSecondaryIndex::new())
            .explain_statement("  ")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[test]
    fn test_assigned_id_lookup_order() {
        assert_eq!(assigned_id(&json!({"id": "a", "itemId": "b"})), Some("a".into()));
        assert_eq!(assigned_id(&json!({"itemId": "b"})), Some("b".into()));
        assert_eq!(assigned_id(&json!({"metadata": {"id": "c"}})), Some("c".into()));
        assert_eq!(assigned_id(&json!({"id": ""})), None);
        assert_eq!(assigned_id(&json!({"id": 5})), None);
    }
}
