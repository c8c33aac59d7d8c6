//! SQLite存储实现
//!
//! 时间戳以定宽的 RFC 3339 UTC 字符串保存，字符串比较与时间顺序一致

use super::Storage;
use crate::alert::{Alert, AlertFilter, AlertId, AlertSeverity};
use crate::endpoint::{Endpoint, EndpointId};
use crate::error::{StorageError, StorageResult};
use crate::health::result::{HealthCheckRecord, HealthStatus, RecordId};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use uuid::Uuid;

/// 基于sqlx连接池的SQLite存储
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// 连接数据库并执行迁移
    ///
    /// 内存数据库只使用一个连接，否则每个连接都会看到独立的空库
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// 使用已有连接池创建存储并执行迁移
    pub async fn from_pool(pool: SqlitePool) -> StorageResult<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// 底层连接池
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Backend(format!("无效的时间戳 {}: {}", value, e)))
}

fn parse_uuid(value: &str) -> StorageResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| StorageError::Backend(format!("无效的ID {}: {}", value, e)))
}

#[derive(sqlx::FromRow)]
struct EndpointRow {
    id: String,
    name: String,
    url: String,
    check_interval_seconds: i64,
    last_checked_at: Option<String>,
    active: bool,
    created_at: String,
}

impl TryFrom<EndpointRow> for Endpoint {
    type Error = StorageError;

    fn try_from(row: EndpointRow) -> StorageResult<Self> {
        Ok(Endpoint {
            id: parse_uuid(&row.id)?,
            name: row.name,
            url: row.url,
            check_interval_seconds: row.check_interval_seconds,
            last_checked_at: row
                .last_checked_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            active: row.active,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HealthCheckRow {
    id: String,
    endpoint_id: String,
    status: String,
    latency_ms: i64,
    status_code: i64,
    error_message: Option<String>,
    created_at: String,
}

impl TryFrom<HealthCheckRow> for HealthCheckRecord {
    type Error = StorageError;

    fn try_from(row: HealthCheckRow) -> StorageResult<Self> {
        Ok(HealthCheckRecord {
            id: parse_uuid(&row.id)?,
            endpoint_id: parse_uuid(&row.endpoint_id)?,
            status: row.status.parse::<HealthStatus>().map_err(StorageError::Backend)?,
            latency_ms: row.latency_ms.max(0) as u64,
            status_code: u16::try_from(row.status_code).unwrap_or(0),
            error_message: row.error_message,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AlertRow {
    id: String,
    endpoint_id: String,
    alert_type: String,
    severity: String,
    message: String,
    is_resolved: bool,
    created_at: String,
}

impl TryFrom<AlertRow> for Alert {
    type Error = StorageError;

    fn try_from(row: AlertRow) -> StorageResult<Self> {
        Ok(Alert {
            id: parse_uuid(&row.id)?,
            endpoint_id: parse_uuid(&row.endpoint_id)?,
            alert_type: row.alert_type,
            severity: row
                .severity
                .parse::<AlertSeverity>()
                .map_err(|e| StorageError::Backend(e.to_string()))?,
            message: row.message,
            is_resolved: row.is_resolved,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

#[async_trait]
impl Storage for SqliteStore {
    async fn list_endpoints(&self) -> StorageResult<Vec<Endpoint>> {
        let rows = sqlx::query_as::<_, EndpointRow>(
            r#"
            SELECT id, name, url, check_interval_seconds, last_checked_at, active, created_at
            FROM endpoints
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Endpoint::try_from).collect()
    }

    async fn get_endpoint(&self, id: EndpointId) -> StorageResult<Option<Endpoint>> {
        let row = sqlx::query_as::<_, EndpointRow>(
            r#"
            SELECT id, name, url, check_interval_seconds, last_checked_at, active, created_at
            FROM endpoints
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Endpoint::try_from).transpose()
    }

    async fn insert_endpoint(&self, endpoint: &Endpoint) -> StorageResult<EndpointId> {
        sqlx::query(
            r#"
            INSERT INTO endpoints (
                id, name, url, check_interval_seconds, last_checked_at, active, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(endpoint.id.to_string())
        .bind(&endpoint.name)
        .bind(&endpoint.url)
        .bind(endpoint.check_interval_seconds)
        .bind(endpoint.last_checked_at.as_ref().map(format_timestamp))
        .bind(endpoint.active)
        .bind(format_timestamp(&endpoint.created_at))
        .execute(&self.pool)
        .await?;

        Ok(endpoint.id)
    }

    async fn update_endpoint_last_checked(
        &self,
        id: EndpointId,
        checked_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let result = sqlx::query("UPDATE endpoints SET last_checked_at = ? WHERE id = ?")
            .bind(format_timestamp(&checked_at))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "endpoint",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn insert_health_check(&self, record: &HealthCheckRecord) -> StorageResult<RecordId> {
        sqlx::query(
            r#"
            INSERT INTO health_checks (
                id, endpoint_id, status, latency_ms, status_code, error_message, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.endpoint_id.to_string())
        .bind(record.status.as_str())
        .bind(record.latency_ms as i64)
        .bind(record.status_code as i64)
        .bind(&record.error_message)
        .bind(format_timestamp(&record.created_at))
        .execute(&self.pool)
        .await?;

        Ok(record.id)
    }

    async fn list_health_checks(
        &self,
        endpoint_id: EndpointId,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<HealthCheckRecord>> {
        let rows = sqlx::query_as::<_, HealthCheckRow>(
            r#"
            SELECT id, endpoint_id, status, latency_ms, status_code, error_message, created_at
            FROM health_checks
            WHERE endpoint_id = ? AND created_at >= ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(endpoint_id.to_string())
        .bind(format_timestamp(&since))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HealthCheckRecord::try_from).collect()
    }

    async fn insert_alert(&self, alert: &Alert) -> StorageResult<AlertId> {
        sqlx::query(
            r#"
            INSERT INTO alerts (
                id, endpoint_id, alert_type, severity, message, is_resolved, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(alert.id.to_string())
        .bind(alert.endpoint_id.to_string())
        .bind(&alert.alert_type)
        .bind(alert.severity.as_str())
        .bind(&alert.message)
        .bind(alert.is_resolved)
        .bind(format_timestamp(&alert.created_at))
        .execute(&self.pool)
        .await?;

        Ok(alert.id)
    }

    async fn update_alert_resolved(&self, id: AlertId, resolved: bool) -> StorageResult<()> {
        let result = sqlx::query("UPDATE alerts SET is_resolved = ? WHERE id = ?")
            .bind(resolved)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "alert",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn list_alerts(&self, filter: AlertFilter) -> StorageResult<Vec<Alert>> {
        let sql = match filter {
            AlertFilter::All => {
                "SELECT id, endpoint_id, alert_type, severity, message, is_resolved, created_at \
                 FROM alerts ORDER BY created_at DESC"
            }
            AlertFilter::Active => {
                "SELECT id, endpoint_id, alert_type, severity, message, is_resolved, created_at \
                 FROM alerts WHERE is_resolved = 0 ORDER BY created_at DESC"
            }
            AlertFilter::Resolved => {
                "SELECT id, endpoint_id, alert_type, severity, message, is_resolved, created_at \
                 FROM alerts WHERE is_resolved = 1 ORDER BY created_at DESC"
            }
        };

        let rows = sqlx::query_as::<_, AlertRow>(sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Alert::try_from).collect()
    }
}
