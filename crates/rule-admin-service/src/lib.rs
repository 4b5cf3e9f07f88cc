//! 规则同步管理服务
//!
//! 把 REST 请求映射为规则双存储编排操作，并把编排结果映射为 HTTP 状态码。
//!
//! ## 模块结构
//!
//! - `dto`: 响应信封
//! - `error`: 错误类型及 HTTP 映射
//! - `handlers`: HTTP 请求处理器
//! - `routes`: 路由配置
//! - `state`: 应用状态
//!
//! ## 技术栈
//!
//! - Web 框架：Axum
//! - 存储协作方：`rule-sync` 提供的规则引擎与搜索索引客户端

pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use dto::ApiResponse;
pub use error::{AdminError, Result};
pub use state::AppState;
