//! 应用状态定义

use std::sync::Arc;

use rule_sync::{Orchestrator, PrimaryEngine, SecondaryIndex};
use rulesync_shared::config::SecondaryIndexConfig;

/// Axum 应用共享状态
///
/// 编排器本身只持有两个客户端句柄，clone 是廉价操作
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    /// 由两个存储客户端和索引配置组装
    pub fn from_clients(
        primary: Arc<dyn PrimaryEngine>,
        secondary: Arc<dyn SecondaryIndex>,
        index: &SecondaryIndexConfig,
    ) -> Self {
        Self::new(Orchestrator::new(
            primary,
            secondary,
            index.rules_index.clone(),
            index.stats_index.clone(),
        ))
    }
}
