//! 规则双存储同步核心
//!
//! 规则同时存在于两个独立的存储中：
//! - 规则引擎（主存储）：接受 DQL 语句，分配规则 id，是规则存在与否的唯一权威
//! - 搜索索引（副存储）：保存规则的反范式副本和统计文档，仅用于快速查询，尽力而为
//!
//! ## 模块结构
//!
//! - `model`: 规则模型与输入校验
//! - `dql`: 规则到 DQL 语句的翻译
//! - `clients`: 两个存储的协作方接口及 HTTP 实现
//! - `orchestrator`: 双存储编排与部分失败策略
//! - `reconciler`: 主副读取结果合并
//! - `error`: 错误分类与副存储降级信号

pub mod clients;
pub mod dql;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod reconciler;

pub use clients::{
    EngineRequest, HttpPrimaryEngine, HttpSecondaryIndex, PrimaryEngine, PrimaryError,
    PrimaryResult, SecondaryError, SecondaryIndex,
};
pub use dql::{DEFAULT_PAGE_SIZE, DqlStatement, Intent};
pub use error::{
    DegradedKind, FieldError, Operation, Result, SecondaryDegraded, Store, SyncError,
    ValidationError,
};
pub use model::{Rule, RuleInput, UQL_TAG};
pub use orchestrator::{Completeness, DeleteAck, Orchestrator, StoredRule, SyncOutcome};
pub use reconciler::MergedRule;
