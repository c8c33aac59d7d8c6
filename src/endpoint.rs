//! 被监控端点的数据结构
//!
//! 定义端点实体、创建请求以及创建时的校验规则

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 端点ID
pub type EndpointId = Uuid;

/// 检测间隔下限（秒）
pub const MIN_CHECK_INTERVAL_SECS: i64 = 30;

/// 检测间隔上限（秒）
pub const MAX_CHECK_INTERVAL_SECS: i64 = 3600;

/// 新建端点的默认检测间隔（秒）
pub const DEFAULT_CHECK_INTERVAL_SECS: i64 = 300;

/// 被监控的端点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    /// 端点ID
    pub id: EndpointId,
    /// 显示名称
    pub name: String,
    /// 目标URL
    pub url: String,
    /// 检测间隔（秒）
    ///
    /// 存储中读出的值可能不合法，选择器对 `<= 0` 按“总是到期”处理
    pub check_interval_seconds: i64,
    /// 最后检测时间
    pub last_checked_at: Option<DateTime<Utc>>,
    /// 是否启用
    pub active: bool,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl Endpoint {
    /// 从已校验的创建请求构造端点
    pub fn from_new(new: NewEndpoint) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: new.name.trim().to_string(),
            url: new.url.trim().to_string(),
            check_interval_seconds: new.check_interval_seconds,
            last_checked_at: None,
            active: new.active,
            created_at: Utc::now(),
        }
    }

    /// 设置最后检测时间
    pub fn with_last_checked(mut self, at: DateTime<Utc>) -> Self {
        self.last_checked_at = Some(at);
        self
    }
}

/// 新建端点请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEndpoint {
    /// 显示名称
    pub name: String,
    /// 目标URL
    pub url: String,
    /// 检测间隔（秒）
    pub check_interval_seconds: i64,
    /// 是否启用
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl NewEndpoint {
    /// 创建新的端点请求
    pub fn new(name: impl Into<String>, url: impl Into<String>, check_interval_seconds: i64) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            check_interval_seconds,
            active: true,
        }
    }

    /// 校验请求并转换为端点实体
    pub fn validate(self) -> Result<Endpoint, ValidationError> {
        validate_new_endpoint(&self)?;
        Ok(Endpoint::from_new(self))
    }
}

/// 校验新建端点请求
///
/// 名称不能为空，URL 必须是 http/https，间隔必须落在 [30, 3600] 内
pub fn validate_new_endpoint(new: &NewEndpoint) -> Result<(), ValidationError> {
    if new.name.trim().is_empty() {
        return Err(ValidationError::MissingField("name"));
    }

    let url = new.url.trim();
    if url.is_empty() {
        return Err(ValidationError::MissingField("url"));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ValidationError::InvalidUrl(url.to_string()));
    }
    if reqwest::Url::parse(url).is_err() {
        return Err(ValidationError::InvalidUrl(url.to_string()));
    }

    validate_check_interval(new.check_interval_seconds)
}

/// 校验检测间隔
pub fn validate_check_interval(value: i64) -> Result<(), ValidationError> {
    if !(MIN_CHECK_INTERVAL_SECS..=MAX_CHECK_INTERVAL_SECS).contains(&value) {
        return Err(ValidationError::IntervalOutOfRange {
            value,
            min: MIN_CHECK_INTERVAL_SECS,
            max: MAX_CHECK_INTERVAL_SECS,
        });
    }
    Ok(())
}
