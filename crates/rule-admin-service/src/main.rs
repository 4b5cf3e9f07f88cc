//! 规则同步管理服务
//!
//! 提供规则的创建、查询、更新、删除和统计 REST API。

use std::sync::Arc;

use anyhow::Context;
use rule_admin_service::{routes, state::AppState};
use rule_sync::{HttpPrimaryEngine, HttpSecondaryIndex};
use rulesync_shared::{config::AppConfig, observability};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 统一加载配置：default → 环境 → 服务专属 → RULESYNC__ 环境变量
    // 配置错误直接退出，不带着空的服务名和环境继续运行
    let config = AppConfig::load("rule-admin-service").context("加载配置失败")?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(
        environment = %config.environment,
        primary = %config.primary.url,
        secondary = %config.secondary.url,
        "Starting rule-admin-service on {}",
        config.server_addr()
    );

    let primary = HttpPrimaryEngine::from_config(&config.primary).context("规则引擎客户端初始化失败")?;
    let secondary =
        HttpSecondaryIndex::from_config(&config.secondary).context("搜索索引客户端初始化失败")?;

    let state = AppState::from_clients(Arc::new(primary), Arc::new(secondary), &config.secondary);
    if config.is_production() && config.server.cors_origins.iter().any(|o| o == "*") {
        warn!("cors_origins=\"*\" 在生产环境中不安全，请设置为具体域名");
    }
    let app = routes::app(state, &config.server.cors_origins);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    // 优雅关闭：收到 SIGTERM 或 Ctrl+C 时停止接收新连接并等待已有请求处理完毕
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("注册 Ctrl+C 处理器失败");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("注册 SIGTERM 处理器失败")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
