//! Endpoint Vitals - 端点健康检测调度工具
//!
//! 这是一个用Rust编写的端点健康检测服务，支持：
//! - 按端点各自的检测间隔选出到期端点
//! - 受限并发的HTTP探测与健康状态分类
//! - 延迟和可用率阈值告警
//! - 外部触发的检测周期与管理接口
//! - 结构化日志记录

pub mod alert;
pub mod cli;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod health;
pub mod logging;
pub mod stats;
pub mod storage;
pub mod web;

// 重新导出主要类型
pub use alert::{Alert, AlertEvaluator, AlertSeverity, AlertThresholds};
pub use config::{Config, GlobalConfig};
pub use endpoint::{Endpoint, EndpointId, NewEndpoint};
pub use error::MonitorError;
pub use health::{classify, select_due, CycleReport, CycleRunner, HealthStatus, Prober};
pub use storage::Storage;

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
