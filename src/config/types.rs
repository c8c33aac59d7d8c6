//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑

use crate::alert::{AlertDedupPolicy, AlertThresholds};
use crate::endpoint::{validate_new_endpoint, NewEndpoint, DEFAULT_CHECK_INTERVAL_SECS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 并发检测数上限
pub const MAX_CONCURRENT_CHECKS_LIMIT: usize = 500;

/// 可用率统计窗口上限（小时），即30天
pub const MAX_UPTIME_WINDOW_HOURS: u64 = 720;

/// 主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// 全局配置项
    #[serde(default)]
    pub global: GlobalConfig,
    /// Web 服务器配置
    #[serde(default)]
    pub web: WebConfig,
    /// 告警配置
    #[serde(default)]
    pub alerts: AlertConfig,
    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,
    /// 启动时写入存储的端点
    #[serde(default)]
    pub endpoints: Vec<EndpointSeed>,
}

/// 全局配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 请求超时时间（秒）
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    /// 最大并发检测数
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_checks: usize,
    /// 内置触发间隔（秒），不设置时只能由外部触发
    #[serde(default)]
    pub trigger_interval_seconds: Option<u64>,
}

impl GlobalConfig {
    /// 请求超时时间
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            request_timeout_seconds: default_timeout(),
            max_concurrent_checks: default_max_concurrent(),
            trigger_interval_seconds: None,
        }
    }
}

/// Web 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebConfig {
    /// 绑定地址
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// 端口
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// 触发接口的共享密钥
    #[serde(default)]
    pub trigger_secret: Option<String>,
    /// 是否允许跨域
    #[serde(default = "default_cors_enabled")]
    pub cors_enabled: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_web_port(),
            trigger_secret: None,
            cors_enabled: default_cors_enabled(),
        }
    }
}

/// 告警配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertConfig {
    /// 是否启用告警评估
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 最大响应时间（毫秒）
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,
    /// 最低可用率（百分比）
    #[serde(default = "default_min_uptime_pct")]
    pub min_uptime_pct: f64,
    /// 可用率统计窗口（小时）
    #[serde(default = "default_uptime_window_hours")]
    pub uptime_window_hours: u64,
    /// 去重策略
    #[serde(default)]
    pub dedup: AlertDedupPolicy,
}

impl AlertConfig {
    /// 阈值
    pub fn thresholds(&self) -> AlertThresholds {
        AlertThresholds {
            max_latency_ms: self.max_latency_ms,
            min_uptime_pct: self.min_uptime_pct,
        }
    }

    /// 可用率统计窗口，超出上限时按上限处理
    pub fn uptime_window(&self) -> chrono::Duration {
        let hours = self.uptime_window_hours.clamp(1, MAX_UPTIME_WINDOW_HOURS);
        chrono::Duration::hours(hours as i64)
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_latency_ms: default_max_latency_ms(),
            min_uptime_pct: default_min_uptime_pct(),
            uptime_window_hours: default_uptime_window_hours(),
            dedup: AlertDedupPolicy::default(),
        }
    }
}

/// 存储后端
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// SQLite 数据库
    #[default]
    Sqlite,
    /// 进程内存
    Memory,
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// 存储后端
    #[serde(default)]
    pub backend: StorageBackend,
    /// 数据库连接串
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_url: default_database_url(),
        }
    }
}

/// 配置文件中预置的端点
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndpointSeed {
    /// 名称
    pub name: String,
    /// URL
    pub url: String,
    /// 检测间隔（秒）
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: i64,
    /// 是否启用
    #[serde(default = "default_enabled")]
    pub active: bool,
}

impl From<&EndpointSeed> for NewEndpoint {
    fn from(seed: &EndpointSeed) -> Self {
        NewEndpoint {
            name: seed.name.clone(),
            url: seed.url.clone(),
            check_interval_seconds: seed.check_interval_seconds,
            active: seed.active,
        }
    }
}

// 默认值函数
fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_max_concurrent() -> usize {
    50
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_web_port() -> u16 {
    8080
}

fn default_cors_enabled() -> bool {
    true
}

fn default_enabled() -> bool {
    true
}

fn default_max_latency_ms() -> u64 {
    2000
}

fn default_min_uptime_pct() -> f64 {
    95.0
}

fn default_uptime_window_hours() -> u64 {
    24
}

fn default_database_url() -> String {
    "sqlite://endpoint-vitals.db".to_string()
}

fn default_check_interval() -> i64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    // 验证全局配置
    if config.global.request_timeout_seconds == 0 {
        return Err("请求超时时间不能为0".to_string());
    }

    if !(1..=MAX_CONCURRENT_CHECKS_LIMIT).contains(&config.global.max_concurrent_checks) {
        return Err(format!(
            "最大并发检测数 {} 超出范围 [1, {}]",
            config.global.max_concurrent_checks, MAX_CONCURRENT_CHECKS_LIMIT
        ));
    }

    if config.global.trigger_interval_seconds == Some(0) {
        return Err("触发间隔不能为0".to_string());
    }

    // 验证日志级别
    let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&config.global.log_level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            config.global.log_level, valid_log_levels
        ));
    }

    // 验证Web配置
    if config.web.port == 0 {
        return Err("无效的Web服务器端口: 0，端口不能为0".to_string());
    }
    if config.web.bind_address.trim().is_empty() {
        return Err("Web服务器绑定地址不能为空".to_string());
    }
    if let Some(secret) = &config.web.trigger_secret {
        if secret.trim().is_empty() {
            return Err("触发密钥不能为空字符串".to_string());
        }
    }

    // 验证告警配置
    if !(0.0..=100.0).contains(&config.alerts.min_uptime_pct) {
        return Err(format!(
            "最低可用率 {} 必须在 0 到 100 之间",
            config.alerts.min_uptime_pct
        ));
    }
    if !(1..=MAX_UPTIME_WINDOW_HOURS).contains(&config.alerts.uptime_window_hours) {
        return Err(format!(
            "可用率统计窗口 {} 小时超出范围 [1, {}]",
            config.alerts.uptime_window_hours, MAX_UPTIME_WINDOW_HOURS
        ));
    }

    // 验证存储配置
    if config.storage.backend == StorageBackend::Sqlite
        && !config.storage.database_url.starts_with("sqlite:")
    {
        return Err(format!(
            "无效的数据库连接串: {}，必须以 sqlite: 开头",
            config.storage.database_url
        ));
    }

    // 验证预置端点
    for seed in &config.endpoints {
        validate_new_endpoint(&NewEndpoint::from(seed))
            .map_err(|e| format!("端点 {} 配置无效: {}", seed.name, e))?;
    }

    Ok(())
}
