//! 告警模块
//!
//! 定义告警实体、阈值配置以及根据检测记录决定是否产生新告警的评估逻辑。
//! 评估器只负责产生告警，告警的解决只能通过用户显式操作完成

use crate::endpoint::{Endpoint, EndpointId};
use crate::error::ValidationError;
use crate::health::result::HealthCheckRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 告警ID
pub type AlertId = Uuid;

/// 高延迟告警类型
pub const ALERT_TYPE_HIGH_LATENCY: &str = "high_latency";

/// 低可用率告警类型
pub const ALERT_TYPE_LOW_UPTIME: &str = "low_uptime";

/// 告警级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// 提示
    Info,
    /// 警告
    Warning,
    /// 严重
    Critical,
}

impl AlertSeverity {
    /// 存储中使用的字符串形式
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AlertSeverity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(AlertSeverity::Info),
            "warning" => Ok(AlertSeverity::Warning),
            "critical" => Ok(AlertSeverity::Critical),
            other => Err(ValidationError::InvalidValue {
                field: "severity",
                value: other.to_string(),
            }),
        }
    }
}

/// 告警
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// 告警ID
    pub id: AlertId,
    /// 所属端点
    pub endpoint_id: EndpointId,
    /// 告警类型
    pub alert_type: String,
    /// 告警级别
    pub severity: AlertSeverity,
    /// 告警内容
    pub message: String,
    /// 是否已解决
    pub is_resolved: bool,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// 创建新的未解决告警
    pub fn new(
        endpoint_id: EndpointId,
        alert_type: impl Into<String>,
        severity: AlertSeverity,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint_id,
            alert_type: alert_type.into(),
            severity,
            message: message.into(),
            is_resolved: false,
            created_at,
        }
    }
}

/// 用户手动创建告警的请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlert {
    /// 所属端点
    pub endpoint_id: Option<EndpointId>,
    /// 告警类型
    pub alert_type: String,
    /// 告警级别
    pub severity: String,
    /// 告警内容
    pub message: String,
}

impl NewAlert {
    /// 校验请求并转换为告警实体
    pub fn validate(self) -> Result<Alert, ValidationError> {
        let endpoint_id = self
            .endpoint_id
            .ok_or(ValidationError::MissingField("endpointId"))?;
        if self.alert_type.trim().is_empty() {
            return Err(ValidationError::MissingField("type"));
        }
        if self.severity.trim().is_empty() {
            return Err(ValidationError::MissingField("severity"));
        }
        if self.message.trim().is_empty() {
            return Err(ValidationError::MissingField("message"));
        }
        let severity = self.severity.trim().parse::<AlertSeverity>()?;

        Ok(Alert::new(
            endpoint_id,
            self.alert_type.trim(),
            severity,
            self.message.trim(),
            Utc::now(),
        ))
    }
}

/// 告警列表过滤条件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertFilter {
    /// 全部
    #[default]
    All,
    /// 未解决
    Active,
    /// 已解决
    Resolved,
}

impl AlertFilter {
    /// 判断告警是否符合过滤条件
    pub fn matches(&self, alert: &Alert) -> bool {
        match self {
            AlertFilter::All => true,
            AlertFilter::Active => !alert.is_resolved,
            AlertFilter::Resolved => alert.is_resolved,
        }
    }
}

/// 告警阈值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// 最大可接受响应时间（毫秒），超过即告警
    pub max_latency_ms: u64,
    /// 最低可接受可用率（百分比），低于即告警
    pub min_uptime_pct: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            max_latency_ms: 2000,
            min_uptime_pct: 95.0,
        }
    }
}

/// 告警去重策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertDedupPolicy {
    /// 每次超阈值都产生新告警
    #[default]
    Always,
    /// 同一端点存在同类型未解决告警时跳过
    SkipUnresolved,
}

impl AlertDedupPolicy {
    /// 判断是否应当写入候选告警
    pub fn should_insert(&self, candidate: &Alert, existing: &[Alert]) -> bool {
        match self {
            AlertDedupPolicy::Always => true,
            AlertDedupPolicy::SkipUnresolved => !existing.iter().any(|alert| {
                !alert.is_resolved
                    && alert.endpoint_id == candidate.endpoint_id
                    && alert.alert_type == candidate.alert_type
            }),
        }
    }
}

/// 评估单条检测记录，决定是否产生新告警
///
/// 可用率低于阈值产生 `low_uptime`（critical），延迟超过阈值产生 `high_latency`（warning）。
/// 两者同时满足时只返回级别更高的 `low_uptime`
pub fn evaluate(
    endpoint: &Endpoint,
    record: &HealthCheckRecord,
    thresholds: &AlertThresholds,
    uptime_pct: Option<f64>,
) -> Option<Alert> {
    if let Some(uptime) = uptime_pct {
        if uptime < thresholds.min_uptime_pct {
            return Some(Alert::new(
                endpoint.id,
                ALERT_TYPE_LOW_UPTIME,
                AlertSeverity::Critical,
                format!(
                    "{} 可用率 {:.1}% 低于阈值 {:.1}%",
                    endpoint.name, uptime, thresholds.min_uptime_pct
                ),
                record.created_at,
            ));
        }
    }

    if record.latency_ms > thresholds.max_latency_ms {
        return Some(Alert::new(
            endpoint.id,
            ALERT_TYPE_HIGH_LATENCY,
            AlertSeverity::Warning,
            format!(
                "{} 响应时间 {}ms 超过阈值 {}ms",
                endpoint.name, record.latency_ms, thresholds.max_latency_ms
            ),
            record.created_at,
        ));
    }

    None
}

/// 告警评估器
///
/// 持有阈值和去重策略，供检测周期调用
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertEvaluator {
    thresholds: AlertThresholds,
    dedup: AlertDedupPolicy,
}

impl AlertEvaluator {
    /// 创建新的告警评估器
    pub fn new(thresholds: AlertThresholds, dedup: AlertDedupPolicy) -> Self {
        Self { thresholds, dedup }
    }

    /// 当前阈值
    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// 当前去重策略
    pub fn dedup_policy(&self) -> AlertDedupPolicy {
        self.dedup
    }

    /// 评估检测记录
    pub fn evaluate(
        &self,
        endpoint: &Endpoint,
        record: &HealthCheckRecord,
        uptime_pct: Option<f64>,
    ) -> Option<Alert> {
        evaluate(endpoint, record, &self.thresholds, uptime_pct)
    }
}
