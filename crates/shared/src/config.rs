//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// 服务配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 允许的跨域来源，`*` 表示全部放行
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8686,
            cors_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

/// 规则引擎（主存储）配置
///
/// 规则引擎接受 DQL 语句，是规则是否存在以及 id 分配的唯一权威来源。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrimaryEngineConfig {
    pub url: String,
    /// 单次请求超时，超时由客户端负责，编排层不做超时控制
    pub timeout_seconds: u64,
}

impl Default for PrimaryEngineConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8181/dql".to_string(),
            timeout_seconds: 10,
        }
    }
}

/// 搜索索引（副存储）配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecondaryIndexConfig {
    pub url: String,
    /// 规则镜像文档所在的集合
    pub rules_index: String,
    /// 规则统计文档所在的集合
    pub stats_index: String,
    pub timeout_seconds: u64,
}

impl Default for SecondaryIndexConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            rules_index: "rules".to_string(),
            stats_index: "rulestats".to_string(),
            timeout_seconds: 10,
        }
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// 服务名称，由 AppConfig 在加载后注入
    pub service_name: String,
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown-service".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_port: 9090,
        }
    }
}

impl ObservabilityConfig {
    pub fn with_service_name(mut self, service_name: &str) -> Self {
        self.service_name = service_name.to_string();
        self
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub server: ServerConfig,
    pub primary: PrimaryEngineConfig,
    pub secondary: SecondaryIndexConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. .env 文件（如存在，仅填充进程环境变量）
    /// 2. config/default.toml（默认配置）
    /// 3. config/{environment}.toml（环境特定配置）
    /// 4. config/{service_name}.toml（服务特定配置）
    /// 5. 环境变量（RULESYNC 前缀，双下划线分隔层级，如 RULESYNC__PRIMARY__URL -> primary.url）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let env = std::env::var("RULESYNC_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(Path::new(&config_dir), &env, service_name)
    }

    /// 从指定目录和环境加载配置，不读取 RULESYNC_ENV / CONFIG_DIR
    pub fn load_from(config_dir: &Path, env: &str, service_name: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            // 字段名本身含下划线（rules_index），层级分隔符必须用双下划线
            .add_source(
                Environment::with_prefix("RULESYNC")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;
        config.observability.service_name = config.service_name.clone();

        Ok(config)
    }

    /// 获取服务地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
