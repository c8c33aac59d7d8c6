//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use thiserror::Error;

/// Endpoint Vitals 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum MonitorError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 存储相关错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),

    /// 输入校验错误
    #[error("校验失败: {0}")]
    Validation(#[from] ValidationError),

    /// 已有检测周期在运行
    #[error("检测周期正在运行中，拒绝并发触发")]
    CycleInProgress,

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 探测错误类型
///
/// 只描述没有拿到HTTP响应的情况；收到 4xx/5xx 属于分类结果而不是错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// 超时
    #[error("Request timeout")]
    Timeout,

    /// 网络错误（DNS、连接被拒绝、TLS 等）
    #[error("{0}")]
    Network(String),
}

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    /// 记录不存在
    #[error("{entity} 不存在: {id}")]
    NotFound { entity: &'static str, id: String },

    /// 后端错误
    #[error("存储后端错误: {0}")]
    Backend(String),

    /// SQLx 错误
    #[error("数据库错误: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// 迁移错误
    #[error("数据库迁移失败: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// 输入校验错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// 缺少必填字段
    #[error("缺少必填字段: {0}")]
    MissingField(&'static str),

    /// URL 无效
    #[error("URL格式无效: {0}")]
    InvalidUrl(String),

    /// 检测间隔越界
    #[error("检测间隔 {value} 秒超出范围 [{min}, {max}]")]
    IntervalOutOfRange { value: i64, min: i64, max: i64 },

    /// 字段取值无效
    #[error("字段 {field} 的取值无效: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// 存储层结果类型别名
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// 结果类型别名
pub type Result<T> = std::result::Result<T, MonitorError>;
