//! 健康检测结果数据结构
//!
//! 定义探测结果、健康状态枚举以及状态分类规则

use crate::endpoint::EndpointId;
use crate::error::ProbeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// 健康检测记录ID
pub type RecordId = Uuid;

/// 健康状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// 服务正常
    Healthy,
    /// 服务降级（收到 4xx/5xx 响应）
    Degraded,
    /// 服务不可达
    Down,
    /// 服务状态未知
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "正常"),
            HealthStatus::Degraded => write!(f, "降级"),
            HealthStatus::Down => write!(f, "异常"),
            HealthStatus::Unknown => write!(f, "未知"),
        }
    }
}

impl HealthStatus {
    /// 判断状态是否为健康
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// 存储中使用的字符串形式
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Down => "down",
            HealthStatus::Unknown => "unknown",
        }
    }
}

impl std::str::FromStr for HealthStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "healthy" => Ok(HealthStatus::Healthy),
            "degraded" => Ok(HealthStatus::Degraded),
            "down" => Ok(HealthStatus::Down),
            "unknown" => Ok(HealthStatus::Unknown),
            other => Err(format!("未知的健康状态: {}", other)),
        }
    }
}

/// 单次探测的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 收到了HTTP响应（任意状态码）
    Response {
        status_code: u16,
        latency: Duration,
    },
    /// 没有收到响应
    Failed { latency: Duration, error: ProbeError },
}

impl ProbeOutcome {
    /// 探测耗时
    pub fn latency(&self) -> Duration {
        match self {
            ProbeOutcome::Response { latency, .. } | ProbeOutcome::Failed { latency, .. } => {
                *latency
            }
        }
    }

    /// 探测耗时（毫秒）
    pub fn latency_ms(&self) -> u64 {
        self.latency().as_millis() as u64
    }

    /// HTTP状态码，未收到响应时为 0
    pub fn status_code(&self) -> u16 {
        match self {
            ProbeOutcome::Response { status_code, .. } => *status_code,
            ProbeOutcome::Failed { .. } => 0,
        }
    }

    /// 错误信息
    pub fn error_message(&self) -> Option<String> {
        match self {
            ProbeOutcome::Response { .. } => None,
            ProbeOutcome::Failed { error, .. } => Some(error.to_string()),
        }
    }
}

/// 将探测结果映射为健康状态
///
/// 200-399 为正常，400-599 为降级，没有响应为异常，其余状态码为未知
pub fn classify(outcome: &ProbeOutcome) -> HealthStatus {
    match outcome {
        ProbeOutcome::Response { status_code, .. } => match status_code {
            200..=399 => HealthStatus::Healthy,
            400..=599 => HealthStatus::Degraded,
            _ => HealthStatus::Unknown,
        },
        ProbeOutcome::Failed { .. } => HealthStatus::Down,
    }
}

/// 健康检测记录
///
/// 写入后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckRecord {
    /// 记录ID
    pub id: RecordId,
    /// 所属端点
    pub endpoint_id: EndpointId,
    /// 健康状态
    pub status: HealthStatus,
    /// 响应时间（毫秒）
    pub latency_ms: u64,
    /// HTTP状态码，未收到响应时为 0
    pub status_code: u16,
    /// 错误信息（如果有）
    pub error_message: Option<String>,
    /// 检测时间
    pub created_at: DateTime<Utc>,
}

impl HealthCheckRecord {
    /// 创建新的健康检测记录
    pub fn new(endpoint_id: EndpointId, status: HealthStatus, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint_id,
            status,
            latency_ms: 0,
            status_code: 0,
            error_message: None,
            created_at,
        }
    }

    /// 根据探测结果创建记录
    pub fn from_outcome(
        endpoint_id: EndpointId,
        outcome: &ProbeOutcome,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut record = Self::new(endpoint_id, classify(outcome), created_at)
            .with_latency_ms(outcome.latency_ms())
            .with_status_code(outcome.status_code());
        record.error_message = outcome.error_message();
        record
    }

    /// 设置HTTP状态码
    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    /// 设置响应时间
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// 设置错误信息
    pub fn with_error(mut self, error_message: impl Into<String>) -> Self {
        self.error_message = Some(error_message.into());
        self
    }
}
