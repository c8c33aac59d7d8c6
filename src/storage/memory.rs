//! 内存存储实现

use super::Storage;
use crate::alert::{Alert, AlertFilter, AlertId};
use crate::endpoint::{Endpoint, EndpointId};
use crate::error::{StorageError, StorageResult};
use crate::health::result::{HealthCheckRecord, RecordId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// 基于读写锁的内存存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// 端点，保持插入顺序
    endpoints: RwLock<Vec<Endpoint>>,
    /// 检测记录，只追加
    health_checks: RwLock<Vec<HealthCheckRecord>>,
    /// 告警
    alerts: RwLock<Vec<Alert>>,
}

impl MemoryStore {
    /// 创建空的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用给定端点创建内存存储
    pub fn with_endpoints(endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints: RwLock::new(endpoints),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn list_endpoints(&self) -> StorageResult<Vec<Endpoint>> {
        let mut endpoints = self.endpoints.read().await.clone();
        endpoints.sort_by_key(|e| e.created_at);
        Ok(endpoints)
    }

    async fn get_endpoint(&self, id: EndpointId) -> StorageResult<Option<Endpoint>> {
        let endpoints = self.endpoints.read().await;
        Ok(endpoints.iter().find(|e| e.id == id).cloned())
    }

    async fn insert_endpoint(&self, endpoint: &Endpoint) -> StorageResult<EndpointId> {
        let mut endpoints = self.endpoints.write().await;
        if endpoints.iter().any(|e| e.id == endpoint.id) {
            return Err(StorageError::Backend(format!("端点已存在: {}", endpoint.id)));
        }
        endpoints.push(endpoint.clone());
        Ok(endpoint.id)
    }

    async fn update_endpoint_last_checked(
        &self,
        id: EndpointId,
        checked_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let mut endpoints = self.endpoints.write().await;
        let endpoint = endpoints
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StorageError::NotFound {
                entity: "endpoint",
                id: id.to_string(),
            })?;
        endpoint.last_checked_at = Some(checked_at);
        Ok(())
    }

    async fn insert_health_check(&self, record: &HealthCheckRecord) -> StorageResult<RecordId> {
        self.health_checks.write().await.push(record.clone());
        Ok(record.id)
    }

    async fn list_health_checks(
        &self,
        endpoint_id: EndpointId,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<HealthCheckRecord>> {
        let mut records: Vec<HealthCheckRecord> = self
            .health_checks
            .read()
            .await
            .iter()
            .filter(|r| r.endpoint_id == endpoint_id && r.created_at >= since)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn insert_alert(&self, alert: &Alert) -> StorageResult<AlertId> {
        self.alerts.write().await.push(alert.clone());
        Ok(alert.id)
    }

    async fn update_alert_resolved(&self, id: AlertId, resolved: bool) -> StorageResult<()> {
        let mut alerts = self.alerts.write().await;
        let alert = alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StorageError::NotFound {
                entity: "alert",
                id: id.to_string(),
            })?;
        alert.is_resolved = resolved;
        Ok(())
    }

    async fn list_alerts(&self, filter: AlertFilter) -> StorageResult<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self
            .alerts
            .read()
            .await
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertSeverity;
    use crate::endpoint::NewEndpoint;
    use crate::health::result::HealthStatus;
    use chrono::Duration;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    fn endpoint(name: &str) -> Endpoint {
        NewEndpoint::new(name, "http://localhost/health", 60)
            .validate()
            .unwrap()
    }

    #[tokio::test]
    async fn test_endpoint_crud() {
        let store = MemoryStore::new();
        let endpoint = endpoint("api");

        assert_ok!(store.insert_endpoint(&endpoint).await);
        assert_err!(store.insert_endpoint(&endpoint).await);
        assert_eq!(store.list_endpoints().await.unwrap().len(), 1);

        let now = Utc::now();
        assert_ok!(store.update_endpoint_last_checked(endpoint.id, now).await);
        let stored = store.get_endpoint(endpoint.id).await.unwrap().unwrap();
        assert_eq!(stored.last_checked_at, Some(now));

        let missing = store.update_endpoint_last_checked(Uuid::new_v4(), now).await;
        assert!(matches!(missing, Err(StorageError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_health_checks_window_and_order() {
        let store = MemoryStore::new();
        let endpoint_id = Uuid::new_v4();
        let now = Utc::now();

        let old = HealthCheckRecord::new(endpoint_id, HealthStatus::Down, now - Duration::days(2));
        let newer = HealthCheckRecord::new(endpoint_id, HealthStatus::Healthy, now);
        let older = HealthCheckRecord::new(endpoint_id, HealthStatus::Degraded, now - Duration::hours(1));
        let other = HealthCheckRecord::new(Uuid::new_v4(), HealthStatus::Healthy, now);

        for record in [&old, &newer, &older, &other] {
            store.insert_health_check(record).await.unwrap();
        }

        let records = store
            .list_health_checks(endpoint_id, now - Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, older.id);
        assert_eq!(records[1].id, newer.id);
    }

    #[tokio::test]
    async fn test_alert_resolution_and_filter() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let first = Alert::new(Uuid::new_v4(), "manual", AlertSeverity::Info, "a", now - Duration::minutes(5));
        let second = Alert::new(Uuid::new_v4(), "manual", AlertSeverity::Warning, "b", now);

        store.insert_alert(&first).await.unwrap();
        store.insert_alert(&second).await.unwrap();

        let all = store.list_alerts(AlertFilter::All).await.unwrap();
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);

        store.update_alert_resolved(first.id, true).await.unwrap();
        let active = store.list_alerts(AlertFilter::Active).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.id);
        let resolved = store.list_alerts(AlertFilter::Resolved).await.unwrap();
        assert_eq!(resolved[0].id, first.id);

        let missing = store.update_alert_resolved(Uuid::new_v4(), true).await;
        assert!(matches!(missing, Err(StorageError::NotFound { .. })));
    }
}
