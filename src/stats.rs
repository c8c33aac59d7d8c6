//! 统计计算
//!
//! 基于检测记录计算可用率、响应时间统计以及端点摘要

use crate::endpoint::{Endpoint, EndpointId};
use crate::health::result::{HealthCheckRecord, HealthStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 统计时间范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeRange {
    /// 最近24小时
    #[default]
    #[serde(rename = "24h")]
    Last24Hours,
    /// 最近7天
    #[serde(rename = "7d")]
    Last7Days,
    /// 最近30天
    #[serde(rename = "30d")]
    Last30Days,
}

impl TimeRange {
    /// 时间范围对应的小时数
    pub fn hours(&self) -> i64 {
        match self {
            TimeRange::Last24Hours => 24,
            TimeRange::Last7Days => 7 * 24,
            TimeRange::Last30Days => 30 * 24,
        }
    }

    /// 时间范围的起点
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::hours(self.hours())
    }

    /// 字符串形式
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Last24Hours => "24h",
            TimeRange::Last7Days => "7d",
            TimeRange::Last30Days => "30d",
        }
    }
}

/// 计算可用率（百分比）
///
/// 健康记录数除以总记录数，没有记录时为 0
pub fn uptime_percent(records: &[HealthCheckRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let healthy = records.iter().filter(|r| r.status.is_healthy()).count();
    healthy as f64 / records.len() as f64 * 100.0
}

/// 计算平均响应时间（毫秒，四舍五入）
pub fn average_latency_ms(records: &[HealthCheckRecord]) -> u64 {
    if records.is_empty() {
        return 0;
    }
    let total: u64 = records.iter().map(|r| r.latency_ms).sum();
    (total as f64 / records.len() as f64).round() as u64
}

/// 响应时间统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsStats {
    /// 平均响应时间（毫秒）
    pub avg_response_time: u64,
    /// 最大响应时间（毫秒）
    pub max_response_time: u64,
    /// 最小响应时间（毫秒），没有记录时为 0
    pub min_response_time: u64,
    /// 总检测次数
    pub total_requests: usize,
    /// 成功率（百分比，取整）
    pub success_rate: u64,
}

impl MetricsStats {
    /// 根据检测记录计算统计信息
    pub fn from_records(records: &[HealthCheckRecord]) -> Self {
        let max_response_time = records.iter().map(|r| r.latency_ms).max().unwrap_or(0);
        let min_response_time = records.iter().map(|r| r.latency_ms).min().unwrap_or(0);

        Self {
            avg_response_time: average_latency_ms(records),
            max_response_time,
            min_response_time,
            total_requests: records.len(),
            success_rate: uptime_percent(records).round() as u64,
        }
    }
}

/// 时间序列中的一个点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricPoint {
    pub time: DateTime<Utc>,
    pub response_time: u64,
    pub status_code: u16,
    pub status: HealthStatus,
}

impl From<&HealthCheckRecord> for MetricPoint {
    fn from(record: &HealthCheckRecord) -> Self {
        Self {
            time: record.created_at,
            response_time: record.latency_ms,
            status_code: record.status_code,
            status: record.status,
        }
    }
}

/// 某个端点在时间范围内的指标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointMetrics {
    pub endpoint_id: EndpointId,
    pub time_range: TimeRange,
    pub stats: MetricsStats,
    pub metrics: Vec<MetricPoint>,
}

impl EndpointMetrics {
    /// 由按时间升序排列的检测记录构建
    pub fn new(endpoint_id: EndpointId, time_range: TimeRange, records: &[HealthCheckRecord]) -> Self {
        Self {
            endpoint_id,
            time_range,
            stats: MetricsStats::from_records(records),
            metrics: records.iter().map(MetricPoint::from).collect(),
        }
    }
}

/// 端点摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSummary {
    pub id: EndpointId,
    pub name: String,
    pub url: String,
    /// 最近一次检测状态，没有记录时为 unknown
    pub status: HealthStatus,
    /// 可用率（百分比）
    pub uptime: f64,
    /// 平均响应时间（毫秒）
    pub avg_response_time: u64,
    /// 最近一次检测时间
    pub last_check: Option<DateTime<Utc>>,
    pub check_interval: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl EndpointSummary {
    /// 由端点和按时间升序排列的检测记录构建
    pub fn new(endpoint: &Endpoint, records: &[HealthCheckRecord]) -> Self {
        let latest = records.last();

        Self {
            id: endpoint.id,
            name: endpoint.name.clone(),
            url: endpoint.url.clone(),
            status: latest.map(|r| r.status).unwrap_or(HealthStatus::Unknown),
            uptime: uptime_percent(records),
            avg_response_time: average_latency_ms(records),
            last_check: latest.map(|r| r.created_at).or(endpoint.last_checked_at),
            check_interval: endpoint.check_interval_seconds,
            active: endpoint.active,
            created_at: endpoint.created_at,
        }
    }
}
